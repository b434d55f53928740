// SPDX-License-Identifier: Apache-2.0
// Copyright Krouter Authors

//! FRR configuration rendering.

pub mod builder;
pub mod render;

pub use builder::{ConfigBuilder, MARKER, Render};
pub use render::render_frr_config;
