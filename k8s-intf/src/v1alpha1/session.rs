// SPDX-License-Identifier: Apache-2.0
// Copyright Krouter Authors

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A BGP session offered to the node's host network stack for a given
/// routing domain.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HostSession {
    /// The router-side ASN of the session.
    pub asn: u32,
    /// The ASN the host stack peers with.
    pub host_asn: u32,
    /// CIDRs the point-to-point addresses of the session are carved from,
    /// one per address family.
    #[serde(default)]
    pub local_cidr: LocalCidr,
}

/// Per-family local CIDRs for a [`HostSession`].  At least one family must
/// be set.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LocalCidr {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv4: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv6: Option<String>,
}
