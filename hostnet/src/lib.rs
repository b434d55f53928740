// SPDX-License-Identifier: Apache-2.0
// Copyright Krouter Authors

//! Host-network model of the router: which VRFs, VXLAN devices, bridges
//! and host-facing veth pairs should exist in the router's network
//! namespace, and the operations to make it so.
//!
//! The decision logic (device naming, what is stale, what counts as an
//! underlay conflict) lives here; the netlink mechanics are confined to
//! [`netlink::NetlinkHostNetwork`].

#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

pub mod error;
pub mod netlink;
pub mod netns;
pub mod params;

#[cfg(any(test, feature = "testing"))]
pub mod recording;

pub use error::HostError;
pub use params::{
    HostMasterParams, L2VniParams, L3VniParams, PassthroughParams, SessionAddrs, UnderlayParams,
    VniParams,
};

use async_trait::async_trait;
use net::Vni;

/// The operations the reconciliation pipeline performs against the host
/// network state of one node.
///
/// Every operation is idempotent: applying the same desired state twice
/// must leave the namespace unchanged and succeed.
#[async_trait]
pub trait HostNetwork: Send + Sync {
    /// Whether the target namespace already carries underlay
    /// configuration.
    async fn has_underlay_interface(&self) -> Result<bool, HostError>;

    /// Make sure IPv6 forwarding is enabled in the target namespace.
    async fn ensure_ipv6_forwarding(&self) -> Result<(), HostError>;

    /// Create or update the underlay: the anchor device carrying the VTEP
    /// address and the fabric-facing NIC.
    ///
    /// Returns [`HostError::UnderlayExists`] when the namespace carries a
    /// conflicting underlay that cannot be patched in place.
    async fn setup_underlay(&self, params: &UnderlayParams) -> Result<(), HostError>;

    /// Create or update the VRF + VXLAN pair of a layer-3 VNI, and its
    /// host session veth pair if any.
    async fn setup_l3vni(&self, params: &L3VniParams) -> Result<(), HostError>;

    /// Create or update the bridge + VXLAN pair of a layer-2 VNI and its
    /// attachment to the host master.
    async fn setup_l2vni(&self, params: &L2VniParams) -> Result<(), HostError>;

    /// Create or update the passthrough host session.
    async fn setup_passthrough(&self, params: &PassthroughParams) -> Result<(), HostError>;

    /// Remove every previously configured VNI whose number is not in
    /// `desired`, including its bridge, veth pair and, for layer-3 VNIs,
    /// the VRF device when its name is no longer in `desired`.
    async fn remove_stale_vnis(&self, desired: &[VniParams]) -> Result<(), HostError>;

    /// Remove the passthrough session devices, if present.
    async fn remove_passthrough(&self) -> Result<(), HostError>;
}

/// Name of the VXLAN device for a VNI.
#[must_use]
pub fn vxlan_device(vni: Vni) -> String {
    format!("vni{vni}")
}

/// Name of the per-VNI bridge device.
#[must_use]
pub fn bridge_device(vni: Vni) -> String {
    format!("br{vni}")
}

/// Router-side name of the host-session veth pair for a layer-3 VNI.
#[must_use]
pub fn session_device_router(vni: Vni) -> String {
    format!("per{vni}")
}

/// Host-side name of the host-session veth pair for a layer-3 VNI.
#[must_use]
pub fn session_device_host(vni: Vni) -> String {
    format!("host{vni}")
}

/// Router-side name of the layer-2 extension veth pair.
#[must_use]
pub fn l2_device_router(vni: Vni) -> String {
    format!("l2r{vni}")
}

/// Host-side name of the layer-2 extension veth pair.
#[must_use]
pub fn l2_device_host(vni: Vni) -> String {
    format!("l2h{vni}")
}

/// Router-side name of the passthrough veth pair.
pub const PASSTHROUGH_DEVICE_ROUTER: &str = "pe-pt";
/// Host-side name of the passthrough veth pair.
pub const PASSTHROUGH_DEVICE_HOST: &str = "host-pt";
/// The dummy device anchoring the underlay configuration (and the VTEP
/// address, when EVPN is enabled) in the target namespace.
pub const UNDERLAY_DEVICE: &str = "underlay";
