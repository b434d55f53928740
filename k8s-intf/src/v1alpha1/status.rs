// SPDX-License-Identifier: Apache-2.0
// Copyright Krouter Authors

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{Condition, Time};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Per-node configuration status, one instance per node running a
/// controller.  The object carries no desired state; everything lives in
/// its status subresource.
///
/// Created lazily by the controller, owned by the corresponding Node
/// object so it is garbage collected with the node.
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "krouter.io",
    version = "v1alpha1",
    kind = "RouterNodeConfigurationStatus",
    namespaced,
    status = "RouterNodeConfigurationStatusStatus",
    derive = "Default",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct RouterNodeConfigurationStatusSpec {}

/// The observed state of a node's router configuration.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouterNodeConfigurationStatusStatus {
    /// When the configuration status was last updated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_time: Option<Time>,

    /// Resources that failed configuration on this node.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_resources: Vec<FailedResource>,

    /// `Ready` and `Degraded` conditions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

/// A resource that failed configuration.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FailedResource {
    /// The kind of resource that failed (Underlay, L2VNI, L3VNI or
    /// L3Passthrough).
    pub kind: String,

    /// The name of the specific resource instance.
    pub name: String,

    /// Why the configuration failed.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}
