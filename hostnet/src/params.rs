// SPDX-License-Identifier: Apache-2.0
// Copyright Krouter Authors

//! Desired host-network state, as produced by the configuration
//! converter.

use ipnet::IpNet;
use net::{InterfaceName, Vni};
use serde::{Deserialize, Serialize};

/// Desired underlay state of the target namespace.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct UnderlayParams {
    /// The fabric-facing NIC to move into the target namespace, if any.
    pub nic: Option<InterfaceName>,
    /// The node's VTEP address, present when EVPN is configured.
    pub vtep_ip: Option<IpNet>,
}

/// The VXLAN identity shared by layer-2 and layer-3 VNIs.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct VniParams {
    /// The VRF the VNI belongs to.  For a layer-2 VNI without a declared
    /// VRF this is the resource name; no VRF device is created for it.
    pub vrf: InterfaceName,
    /// The VXLAN network identifier.
    pub vni: Vni,
    /// The node's VTEP address, used as the VXLAN device's local
    /// address.  Absent when the underlay has no EVPN configuration.
    pub vtep_ip: Option<std::net::IpAddr>,
}

/// Point-to-point addressing of a host session, one entry per configured
/// address family.  The router side terminates the session inside the
/// target namespace, the host side in the node's namespace.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct SessionAddrs {
    pub router_side: IpNet,
    pub host_side: IpNet,
}

/// Desired state of one layer-3 VNI.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct L3VniParams {
    pub base: VniParams,
    /// Addressing of the host session veth pair, when a session is
    /// declared.  IPv4 and/or IPv6.
    pub sessions: Vec<SessionAddrs>,
}

/// Desired state of one layer-2 VNI.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct L2VniParams {
    pub base: VniParams,
    /// Whether a VRF device exists for this VNI (it routes through an
    /// L3VNI's domain).
    pub has_vrf: bool,
    /// The host-side master bridge, when the segment is extended to the
    /// host.
    pub host_master: Option<HostMasterParams>,
    /// Anycast gateway addresses assigned to the per-VNI bridge.
    pub gateway_ips: Vec<IpNet>,
}

/// The host-side bridge a layer-2 segment is attached to.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct HostMasterParams {
    pub name: InterfaceName,
    /// Create the bridge if it does not exist.  When false and the bridge
    /// is missing, setup fails.
    pub auto_create: bool,
    /// OVS bridges need the OVS integration; only plain Linux bridges are
    /// handled by the netlink backend.
    pub ovs: bool,
}

/// Desired state of the passthrough host session.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct PassthroughParams {
    pub sessions: Vec<SessionAddrs>,
}
