// SPDX-License-Identifier: Apache-2.0
// Copyright Krouter Authors

//! In-memory [`HostNetwork`] for pipeline tests: keeps the modeled host
//! state, records mutating calls, and injects failures per resource.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::HostError;
use crate::params::{
    L2VniParams, L3VniParams, PassthroughParams, UnderlayParams, VniParams,
};
use crate::HostNetwork;

/// Where a failure is injected.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum FailPoint {
    Underlay,
    L3Vni(u32),
    L2Vni(u32),
    Passthrough,
}

/// What the injected failure looks like.
#[derive(Clone, Debug)]
pub enum Failure {
    UnderlayExists,
    DeviceNotFound(String),
    HostMasterMissing(String),
}

impl Failure {
    fn to_error(&self) -> HostError {
        match self {
            Failure::UnderlayExists => {
                HostError::UnderlayExists("injected conflict".to_string())
            }
            Failure::DeviceNotFound(name) => HostError::DeviceNotFound(name.clone()),
            Failure::HostMasterMissing(name) => HostError::HostMasterMissing(name.clone()),
        }
    }
}

#[derive(Default)]
struct HostState {
    underlay: Option<UnderlayParams>,
    l3vnis: BTreeMap<u32, L3VniParams>,
    l2vnis: BTreeMap<u32, L2VniParams>,
    passthrough: Option<PassthroughParams>,
}

/// A recording host network.  Applying a desired state equal to the stored
/// one records no mutation, which is what the idempotence tests assert on.
#[derive(Default)]
pub struct RecordingHostNetwork {
    state: Mutex<HostState>,
    mutations: Mutex<Vec<String>>,
    failures: Mutex<BTreeMap<FailPoint, Failure>>,
}

impl RecordingHostNetwork {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate an underlay, as if a previous run had configured one.
    #[must_use]
    pub fn with_underlay(self, params: UnderlayParams) -> Self {
        self.state_mut(|state| state.underlay = Some(params));
        self
    }

    /// Make the given operation fail until [`Self::clear_failure`].
    pub fn fail_with(&self, point: FailPoint, failure: Failure) {
        self.locked(&self.failures).insert(point, failure);
    }

    pub fn clear_failure(&self, point: FailPoint) {
        self.locked(&self.failures).remove(&point);
    }

    /// Every mutating call recorded so far, in order.
    #[must_use]
    pub fn mutations(&self) -> Vec<String> {
        self.locked(&self.mutations).clone()
    }

    pub fn reset_mutations(&self) {
        self.locked(&self.mutations).clear();
    }

    fn locked<'a, T>(&self, mutex: &'a Mutex<T>) -> std::sync::MutexGuard<'a, T> {
        mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn state_mut<T>(&self, f: impl FnOnce(&mut HostState) -> T) -> T {
        f(&mut self.locked(&self.state))
    }

    fn record(&self, call: String) {
        self.locked(&self.mutations).push(call);
    }

    fn check_failure(&self, point: FailPoint) -> Result<(), HostError> {
        match self.locked(&self.failures).get(&point) {
            Some(failure) => Err(failure.to_error()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl HostNetwork for RecordingHostNetwork {
    async fn has_underlay_interface(&self) -> Result<bool, HostError> {
        Ok(self.state_mut(|state| state.underlay.is_some()))
    }

    async fn ensure_ipv6_forwarding(&self) -> Result<(), HostError> {
        Ok(())
    }

    async fn setup_underlay(&self, params: &UnderlayParams) -> Result<(), HostError> {
        self.check_failure(FailPoint::Underlay)?;
        let changed = self.state_mut(|state| {
            let changed = state.underlay.as_ref() != Some(params);
            state.underlay = Some(params.clone());
            changed
        });
        if changed {
            self.record("setup_underlay".to_string());
        }
        Ok(())
    }

    async fn setup_l3vni(&self, params: &L3VniParams) -> Result<(), HostError> {
        let vni = params.base.vni.as_u32();
        self.check_failure(FailPoint::L3Vni(vni))?;
        let changed = self.state_mut(|state| {
            let changed = state.l3vnis.get(&vni) != Some(params);
            state.l3vnis.insert(vni, params.clone());
            changed
        });
        if changed {
            self.record(format!("setup_l3vni {vni}"));
        }
        Ok(())
    }

    async fn setup_l2vni(&self, params: &L2VniParams) -> Result<(), HostError> {
        let vni = params.base.vni.as_u32();
        self.check_failure(FailPoint::L2Vni(vni))?;
        let changed = self.state_mut(|state| {
            let changed = state.l2vnis.get(&vni) != Some(params);
            state.l2vnis.insert(vni, params.clone());
            changed
        });
        if changed {
            self.record(format!("setup_l2vni {vni}"));
        }
        Ok(())
    }

    async fn setup_passthrough(&self, params: &PassthroughParams) -> Result<(), HostError> {
        self.check_failure(FailPoint::Passthrough)?;
        let changed = self.state_mut(|state| {
            let changed = state.passthrough.as_ref() != Some(params);
            state.passthrough = Some(params.clone());
            changed
        });
        if changed {
            self.record("setup_passthrough".to_string());
        }
        Ok(())
    }

    async fn remove_stale_vnis(&self, desired: &[VniParams]) -> Result<(), HostError> {
        let keep: Vec<u32> = desired.iter().map(|p| p.vni.as_u32()).collect();
        let removed = self.state_mut(|state| {
            let stale: Vec<u32> = state
                .l3vnis
                .keys()
                .chain(state.l2vnis.keys())
                .copied()
                .filter(|vni| !keep.contains(vni))
                .collect();
            for vni in &stale {
                state.l3vnis.remove(vni);
                state.l2vnis.remove(vni);
            }
            stale
        });
        for vni in removed {
            self.record(format!("remove_vni {vni}"));
        }
        Ok(())
    }

    async fn remove_passthrough(&self) -> Result<(), HostError> {
        let removed = self.state_mut(|state| state.passthrough.take().is_some());
        if removed {
            self.record("remove_passthrough".to_string());
        }
        Ok(())
    }
}
