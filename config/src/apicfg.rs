// SPDX-License-Identifier: Apache-2.0
// Copyright Krouter Authors

//! The declared resource set, snapshotted from the cluster.

use k8s_intf::v1alpha1::{L2VNI, L3Passthrough, L3VNI, Underlay};

/// An immutable value copy of the full in-cluster resource set for one
/// reconcile pass, together with the node's index.
///
/// The validator and converter never mutate these objects; watch-cache
/// objects are cloned into this snapshot before the pipeline runs.
#[derive(Clone, Debug, Default)]
pub struct ApiConfig {
    /// Dense per-node index, allocated by the node marker.
    pub node_index: u32,
    pub underlays: Vec<Underlay>,
    pub l3vnis: Vec<L3VNI>,
    pub l2vnis: Vec<L2VNI>,
    pub passthroughs: Vec<L3Passthrough>,
}
