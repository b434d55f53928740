// SPDX-License-Identifier: Apache-2.0
// Copyright Krouter Authors

//! Scoped entry into a target network namespace.

use std::fs::File;
use std::os::fd::AsFd;
use std::path::{Path, PathBuf};

use nix::sched::{CloneFlags, setns};

use crate::error::HostError;

/// Path of the current thread's network namespace.
const SELF_NS: &str = "/proc/self/ns/net";

/// A handle on a target network namespace, identified by its bind-mount
/// path (e.g. `/run/netns/<name>` or `/proc/<pid>/ns/net`).
#[derive(Clone, Debug)]
pub struct NetnsPath(PathBuf);

impl NetnsPath {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        NetnsPath(path.into())
    }

    #[must_use]
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Run `f` on a dedicated thread whose network namespace is switched
    /// to the target for the duration of the call.
    ///
    /// Netlink sockets and `/proc/sys/net` files opened inside `f` are
    /// bound to the target namespace and stay valid after the thread
    /// returns, so `f` typically opens resources and hands them back.
    pub async fn enter<T, F>(&self, f: F) -> Result<T, HostError>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, HostError> + Send + 'static,
    {
        let ns = self.0.clone();
        tokio::task::spawn_blocking(move || {
            let original = File::open(SELF_NS).map_err(|err| HostError::Namespace {
                ns: SELF_NS.to_string(),
                err,
            })?;
            let target = File::open(&ns).map_err(|err| HostError::Namespace {
                ns: ns.display().to_string(),
                err,
            })?;
            setns(target.as_fd(), CloneFlags::CLONE_NEWNET).map_err(|errno| {
                HostError::Namespace {
                    ns: ns.display().to_string(),
                    err: std::io::Error::from(errno),
                }
            })?;
            let result = f();
            // The thread goes back to the pool; restore its namespace no
            // matter how `f` went.
            setns(original.as_fd(), CloneFlags::CLONE_NEWNET).map_err(|errno| {
                HostError::Namespace {
                    ns: SELF_NS.to_string(),
                    err: std::io::Error::from(errno),
                }
            })?;
            result
        })
        .await
        .map_err(|err| HostError::Io(std::io::Error::other(err)))?
    }
}

impl std::fmt::Display for NetnsPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.display())
    }
}
