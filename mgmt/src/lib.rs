// SPDX-License-Identifier: Apache-2.0
// Copyright Krouter Authors

//! The router management controller: reconciliation of declared network
//! intent into the data-plane target, and per-node status reporting.

#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

pub mod frr;
pub mod launch;
pub mod nodeindex;
pub mod provider;
pub mod reconcile;
pub mod staticcfg;
pub mod status;
pub mod watch;

pub use launch::{ControllerParams, LaunchError, Mode, run};
pub use reconcile::{ReconcileError, reconcile};
pub use status::StatusManager;
