// SPDX-License-Identifier: Apache-2.0
// Copyright Krouter Authors

//! Static configuration for the host-backed provider: what a Node
//! annotation and a router pod provide in cluster mode comes from a YAML
//! file on machines running the router as a plain service.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StaticConfig {
    /// The node's dense index, allocated by the operator.
    pub node_index: u32,

    /// Path of the router's network namespace (e.g.
    /// `/run/netns/router` or `/proc/<pid>/ns/net`).
    pub target_netns: PathBuf,

    /// Systemd unit restarted on a non-recoverable error.
    #[serde(default)]
    pub restart_unit: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum StaticConfigError {
    #[error("failed to read configuration {path}: {err}")]
    Read { path: PathBuf, err: std::io::Error },

    #[error("failed to parse configuration {path}: {err}")]
    Parse {
        path: PathBuf,
        err: serde_yaml_ng::Error,
    },
}

impl StaticConfig {
    pub fn read_from_file(path: impl AsRef<Path>) -> Result<Self, StaticConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|err| StaticConfigError::Read {
            path: path.to_path_buf(),
            err,
        })?;
        serde_yaml_ng::from_str(&raw).map_err(|err| StaticConfigError::Parse {
            path: path.to_path_buf(),
            err,
        })
    }
}
