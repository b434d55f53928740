// SPDX-License-Identifier: Apache-2.0
// Copyright Krouter Authors

//! Custom resource definitions and cluster access helpers for the router
//! controller.

#![deny(clippy::all, clippy::pedantic)]

pub mod v1alpha1;

#[cfg(feature = "client")]
pub mod client;

/// Node annotation carrying the per-node router index, set by the node
/// marker and consumed by the pod-backed router provider.
pub const NODE_INDEX_ANNOTATION: &str = "krouter.io/node-index";

/// Label selecting the per-node router data-plane pod.
pub const ROUTER_POD_LABEL: (&str, &str) = ("app", "router");
