// SPDX-License-Identifier: Apache-2.0
// Copyright Krouter Authors

use kube::CustomResource;
use kube::ResourceExt;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::session::HostSession;

/// A VRF-scoped layer-3 VXLAN network.
///
/// Each `L3VNI` materializes as a VRF plus a VXLAN device in the router's
/// network namespace, and an EVPN L3 VNI in the BGP configuration.
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "krouter.io",
    version = "v1alpha1",
    kind = "L3VNI",
    namespaced,
    derive = "Default",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct L3VNISpec {
    /// Name of the VRF the network lives in.  Defaults to the resource
    /// name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vrf: Option<String>,

    /// The VXLAN network identifier.
    pub vni: u32,

    /// Optional BGP session offered to the node's host network stack for
    /// this routing domain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_session: Option<HostSession>,
}

impl L3VNI {
    /// The VRF name for this network: the declared one, or the resource
    /// name when none is declared.
    #[must_use]
    pub fn vrf_name(&self) -> String {
        self.spec.vrf.clone().unwrap_or_else(|| self.name_any())
    }
}
