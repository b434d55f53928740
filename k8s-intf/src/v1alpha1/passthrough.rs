// SPDX-License-Identifier: Apache-2.0
// Copyright Krouter Authors

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::session::HostSession;

/// A direct host-to-fabric BGP session not tied to any VRF or VNI.
///
/// At most one `L3Passthrough` may exist in the cluster.
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "krouter.io",
    version = "v1alpha1",
    kind = "L3Passthrough",
    namespaced,
    derive = "Default",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct L3PassthroughSpec {
    /// The BGP session offered to the node's host network stack.
    pub host_session: HostSession,
}
