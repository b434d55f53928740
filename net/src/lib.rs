// SPDX-License-Identifier: Apache-2.0
// Copyright Krouter Authors

//! Basic network types shared by the router controller crates.

#![deny(clippy::all, clippy::pedantic)]

pub mod interface;
pub mod vxlan;

pub use interface::{IllegalInterfaceName, InterfaceName};
pub use vxlan::{InvalidVni, Vni};
