// SPDX-License-Identifier: Apache-2.0
// Copyright Krouter Authors

//! Configuration model of the router controller: validation of the
//! declared API objects, conversion into the host-network model, and FRR
//! configuration rendering.

#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

pub mod apicfg;
pub mod convert;
pub mod errors;
pub mod frr;
pub mod hostcfg;
pub mod ipam;
pub mod status;
pub mod validate;

pub use apicfg::ApiConfig;
pub use convert::api_to_host_config;
pub use errors::{ConfigError, ConfigResult};
pub use hostcfg::HostConfig;
