// SPDX-License-Identifier: Apache-2.0
// Copyright Krouter Authors

use kube::CustomResource;
use kube::ResourceExt;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A layer-2 VXLAN network, optionally attached to an [`super::L3VNI`]'s
/// routing domain via its VRF.
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "krouter.io",
    version = "v1alpha1",
    kind = "L2VNI",
    namespaced,
    derive = "Default",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct L2VNISpec {
    /// VRF of the L3VNI this network routes through.  When unset the
    /// network is purely layer-2.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vrf: Option<String>,

    /// The VXLAN network identifier.
    pub vni: u32,

    /// Host-side bridge the network is exposed on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_master: Option<HostMaster>,

    /// Anycast gateway addresses for the segment, in CIDR notation.  At
    /// most one per address family.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub l2_gateway_ips: Vec<String>,
}

/// The host-side master device of an L2 network.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HostMaster {
    /// Name of the bridge device.
    #[serde(default)]
    pub name: String,
    /// Create the bridge if it does not exist.
    #[serde(default)]
    pub auto_create: bool,
    /// The flavor of bridge to attach to.
    #[serde(default, rename = "type")]
    pub kind: HostMasterKind,
}

/// Bridge flavors supported as L2 host masters.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum HostMasterKind {
    #[default]
    Linux,
    Ovs,
}

impl L2VNI {
    /// The VRF name used for uniqueness checks and for linking to an
    /// L3VNI: the declared one, or the resource name when none is
    /// declared.
    #[must_use]
    pub fn vrf_name(&self) -> String {
        self.spec.vrf.clone().unwrap_or_else(|| self.name_any())
    }
}
