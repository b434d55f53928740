// SPDX-License-Identifier: Apache-2.0
// Copyright Krouter Authors

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The fabric-facing side of the router: the local BGP ASN, the physical
/// NIC handed to the router pod and the sessions towards the fabric.
///
/// At most one `Underlay` may exist in the cluster.
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "krouter.io",
    version = "v1alpha1",
    kind = "Underlay",
    namespaced,
    derive = "Default",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct UnderlaySpec {
    /// The local ASN the router peers to the fabric with.
    pub asn: u32,

    /// Physical or VLAN interfaces moved into the router's network
    /// namespace to reach the fabric.  At most one entry.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nics: Vec<String>,

    /// BGP sessions towards the fabric (typically the node's leaves).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub neighbors: Vec<Neighbor>,

    /// EVPN overlay parameters.  Absent when the underlay only carries
    /// plain BGP sessions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evpn: Option<EvpnConfig>,
}

/// A single fabric BGP neighbor.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Neighbor {
    /// The neighbor's ASN.
    pub asn: u32,
    /// The neighbor's address.
    pub address: String,
}

/// EVPN parameters of the underlay.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EvpnConfig {
    /// CIDR the per-node VTEP addresses are allocated from.
    pub vtep_cidr: String,
}
