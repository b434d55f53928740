// SPDX-License-Identifier: Apache-2.0
// Copyright Krouter Authors

//! Pushing rendered configuration to the FRR instance in the data-plane
//! target.
//!
//! The reloader next to FRR watches a unix socket: the updater writes the
//! configuration file, asks for a reload and waits for the verdict line.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum FrrError {
    #[error("failed to write frr config {path}: {err}")]
    WriteConfig { path: PathBuf, err: std::io::Error },

    #[error("failed to talk to the reloader socket {path}: {err}")]
    Socket { path: PathBuf, err: std::io::Error },

    #[error("frr reload rejected: {0}")]
    ReloadRejected(String),
}

/// Applies a rendered FRR configuration to the router.
#[async_trait]
pub trait FrrUpdater: Send + Sync {
    async fn apply(&self, rendered: &str) -> Result<(), FrrError>;
}

/// The production updater: config file plus reload socket.
pub struct SocketReloader {
    config_path: PathBuf,
    socket_path: PathBuf,
}

/// The line the reloader answers with on success.
const RELOADED: &str = "reloaded";

impl SocketReloader {
    #[must_use]
    pub fn new(config_path: impl Into<PathBuf>, socket_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            socket_path: socket_path.into(),
        }
    }

    async fn request_reload(&self) -> Result<String, FrrError> {
        let socket = |err| FrrError::Socket {
            path: self.socket_path.clone(),
            err,
        };
        let mut stream = UnixStream::connect(&self.socket_path).await.map_err(socket)?;
        stream.write_all(b"reload\n").await.map_err(socket)?;

        let mut response = String::new();
        BufReader::new(stream)
            .read_line(&mut response)
            .await
            .map_err(socket)?;
        Ok(response.trim().to_string())
    }
}

#[async_trait]
impl FrrUpdater for SocketReloader {
    async fn apply(&self, rendered: &str) -> Result<(), FrrError> {
        debug!(
            "writing {} bytes of frr config to {}",
            rendered.len(),
            self.config_path.display()
        );
        write_config(&self.config_path, rendered).await?;

        let response = self.request_reload().await?;
        if response != RELOADED {
            return Err(FrrError::ReloadRejected(response));
        }
        info!("frr successfully reloaded");
        Ok(())
    }
}

async fn write_config(path: &Path, rendered: &str) -> Result<(), FrrError> {
    tokio::fs::write(path, rendered)
        .await
        .map_err(|err| FrrError::WriteConfig {
            path: path.to_path_buf(),
            err,
        })
}
