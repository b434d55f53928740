// SPDX-License-Identifier: Apache-2.0
// Copyright Krouter Authors

//! In-memory aggregation of per-resource configuration outcomes.
//!
//! The manager is the single owner of the failure cache; the two
//! reconcile loops only ever touch it through the reporter/reader traits.
//! Every mutation also pushes a token onto a bounded trigger channel to
//! wake the status loop.  The token carries no payload and is dropped
//! when the channel is full: the consumer re-reads the whole cache on
//! every wake, so a lost token is recovered by the next mutation.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::RwLock;
use std::time::SystemTime;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use config::status::{
    FailedResourceInfo, ResourceKind, StatusReader, StatusReporter, StatusSummary,
};

/// Capacity of the trigger channel.  Mutation bursts beyond this simply
/// coalesce.
const TRIGGER_CAPACITY: usize = 100;

#[derive(Clone, Debug)]
struct FailedEntry {
    kind: ResourceKind,
    name: String,
    message: String,
    timestamp: SystemTime,
}

/// The owned status cache shared by both reconcile loops.
pub struct StatusManager {
    cache: RwLock<BTreeMap<String, FailedEntry>>,
    trigger: mpsc::Sender<()>,
}

impl StatusManager {
    /// Create the manager and the trigger stream consumed by the status
    /// loop.  An initial token is queued so the per-node status object
    /// gets created even when nothing ever fails.
    #[must_use]
    pub fn new() -> (Self, mpsc::Receiver<()>) {
        let (trigger, receiver) = mpsc::channel(TRIGGER_CAPACITY);
        let manager = Self {
            cache: RwLock::new(BTreeMap::new()),
            trigger,
        };
        manager.send_trigger();
        (manager, receiver)
    }

    fn key(kind: ResourceKind, name: &str) -> String {
        format!("{kind}:{name}")
    }

    fn send_trigger(&self) {
        if self.trigger.try_send(()).is_err() {
            warn!("status trigger channel full, dropping event");
        }
    }

    fn with_cache<T>(&self, f: impl FnOnce(&mut BTreeMap<String, FailedEntry>) -> T) -> T {
        let mut cache = self
            .cache
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&mut cache)
    }
}

impl StatusReporter for StatusManager {
    fn report_resource_success(&self, kind: ResourceKind, name: &str) {
        self.with_cache(|cache| cache.remove(&Self::key(kind, name)));
        self.send_trigger();
        debug!("reported success for {kind} {name}");
    }

    fn report_resource_failure(&self, kind: ResourceKind, name: &str, err: &dyn Display) {
        let entry = FailedEntry {
            kind,
            name: name.to_string(),
            message: format!("failed: {err}"),
            timestamp: SystemTime::now(),
        };
        self.with_cache(|cache| cache.insert(Self::key(kind, name), entry));
        self.send_trigger();
        debug!("reported failure for {kind} {name}: {err}");
    }

    fn report_resource_removed(&self, kind: ResourceKind, name: &str) {
        let existed = self.with_cache(|cache| cache.remove(&Self::key(kind, name)).is_some());
        // only wake the status loop when the removal changed anything
        if existed {
            self.send_trigger();
            debug!("reported removal of {kind} {name}");
        }
    }
}

impl StatusReader for StatusManager {
    fn status_summary(&self) -> StatusSummary {
        let cache = self
            .cache
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let mut last_update_time: Option<SystemTime> = None;
        let failed_resources = cache
            .values()
            .map(|entry| {
                if last_update_time.is_none_or(|latest| entry.timestamp > latest) {
                    last_update_time = Some(entry.timestamp);
                }
                FailedResourceInfo {
                    kind: entry.kind,
                    name: entry.name.clone(),
                    message: entry.message.clone(),
                }
            })
            .collect();

        StatusSummary {
            failed_resources,
            last_update_time,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn drain(rx: &mut mpsc::Receiver<()>) -> usize {
        let mut count = 0;
        while rx.try_recv().is_ok() {
            count += 1;
        }
        count
    }

    #[test]
    fn failure_then_success_clears_the_entry() {
        let (manager, mut rx) = StatusManager::new();
        assert_eq!(drain(&mut rx), 1, "initial trigger");

        manager.report_resource_failure(ResourceKind::L3VNI, "red", &"boom");
        let summary = manager.status_summary();
        assert_eq!(summary.failed_resources.len(), 1);
        assert_eq!(summary.failed_resources[0].name, "red");
        assert_eq!(summary.failed_resources[0].message, "failed: boom");
        assert!(summary.last_update_time.is_some());
        assert_eq!(drain(&mut rx), 1);

        manager.report_resource_success(ResourceKind::L3VNI, "red");
        assert!(manager.status_summary().failed_resources.is_empty());
        assert_eq!(drain(&mut rx), 1);
    }

    #[test]
    fn latest_failure_wins_per_resource() {
        let (manager, _rx) = StatusManager::new();
        manager.report_resource_failure(ResourceKind::Underlay, "under", &"first");
        manager.report_resource_failure(ResourceKind::Underlay, "under", &"second");
        let summary = manager.status_summary();
        assert_eq!(summary.failed_resources.len(), 1);
        assert_eq!(summary.failed_resources[0].message, "failed: second");
    }

    #[test]
    fn removal_only_triggers_when_present() {
        let (manager, mut rx) = StatusManager::new();
        drain(&mut rx);

        manager.report_resource_removed(ResourceKind::L2VNI, "ghost");
        assert_eq!(drain(&mut rx), 0, "absent entry must not wake the loop");

        manager.report_resource_failure(ResourceKind::L2VNI, "segment", &"boom");
        drain(&mut rx);
        manager.report_resource_removed(ResourceKind::L2VNI, "segment");
        assert_eq!(drain(&mut rx), 1);
        assert!(manager.status_summary().failed_resources.is_empty());
    }

    #[test]
    fn overflowing_the_channel_drops_triggers_without_blocking() {
        let (manager, mut rx) = StatusManager::new();
        for i in 0..(TRIGGER_CAPACITY * 2) {
            manager.report_resource_failure(ResourceKind::L3VNI, &format!("vni{i}"), &"boom");
        }
        assert_eq!(drain(&mut rx), TRIGGER_CAPACITY);
        // state is complete even though triggers were dropped
        assert_eq!(
            manager.status_summary().failed_resources.len(),
            TRIGGER_CAPACITY * 2
        );
    }

    #[test]
    fn kinds_do_not_collide() {
        let (manager, _rx) = StatusManager::new();
        manager.report_resource_failure(ResourceKind::L3VNI, "same", &"boom");
        manager.report_resource_failure(ResourceKind::L2VNI, "same", &"boom");
        assert_eq!(manager.status_summary().failed_resources.len(), 2);
    }
}
