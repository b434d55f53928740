// SPDX-License-Identifier: Apache-2.0
// Copyright Krouter Authors

//! Locating the data-plane target for this node.
//!
//! Two providers share one capability set: the pod-backed provider finds
//! the per-node router pod through the API server and resolves its
//! network namespace via the container runtime; the host provider runs
//! against a statically configured target on machines without a
//! kubelet-managed router.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Node, Pod};
use kube::api::ListParams;
use kube::{Api, Client, ResourceExt};
use tokio::process::Command;
use tracing::{error, info};

use hostnet::netns::NetnsPath;
use k8s_intf::{NODE_INDEX_ANNOTATION, ROUTER_POD_LABEL};

use crate::staticcfg::StaticConfig;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("client error: {0}")]
    Kube(#[from] kube::Error),

    #[error("node {0} has no index annotation")]
    NoIndexAnnotation(String),

    #[error("failed to parse index {index} of node {node}: {err}")]
    BadIndexAnnotation {
        node: String,
        index: String,
        err: std::num::ParseIntError,
    },

    #[error("no router pods found for node {0}")]
    NoRouterPod(String),

    #[error("more than one router pod found for node {0}")]
    TooManyRouterPods(String),

    #[error("failed to resolve network namespace for pod {uid}: {reason}")]
    RuntimeFailure { uid: String, reason: String },

    #[error("no restart unit configured for the host router")]
    NoRestartUnit,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Access to one node's data-plane target.
#[async_trait]
pub trait RouterProvider: Send + Sync {
    /// The node's stable dense index.
    async fn node_index(&self) -> Result<u32, ProviderError>;

    /// Locate the current data-plane target.
    async fn router(&self) -> Result<Box<dyn Router>, ProviderError>;
}

/// One located data-plane target.
#[async_trait]
pub trait Router: Send + Sync {
    /// The network namespace to configure.
    async fn target_ns(&self) -> Result<NetnsPath, ProviderError>;

    /// Whether the target is ready to be configured.
    async fn can_reconcile(&self) -> Result<bool, ProviderError>;

    /// Tear the target down so the orchestrator recreates it with a
    /// clean namespace.
    async fn handle_non_recoverable_error(&self) -> Result<(), ProviderError>;
}

/// Resolves a pod's network namespace through the container runtime.
#[async_trait]
pub trait PodRuntime: Send + Sync {
    async fn network_namespace(&self, pod_uid: &str) -> Result<String, ProviderError>;
}

// ---------------------------------------------------------------------
// pod-backed provider
// ---------------------------------------------------------------------

pub struct PodRouterProvider {
    pub client: Client,
    pub node: String,
    pub namespace: String,
    pub runtime: Arc<dyn PodRuntime>,
}

#[async_trait]
impl RouterProvider for PodRouterProvider {
    async fn node_index(&self) -> Result<u32, ProviderError> {
        let nodes: Api<Node> = Api::all(self.client.clone());
        let node = nodes.get(&self.node).await?;
        let index = node
            .annotations()
            .get(NODE_INDEX_ANNOTATION)
            .ok_or_else(|| ProviderError::NoIndexAnnotation(self.node.clone()))?;
        index
            .parse()
            .map_err(|err| ProviderError::BadIndexAnnotation {
                node: self.node.clone(),
                index: index.clone(),
                err,
            })
    }

    async fn router(&self) -> Result<Box<dyn Router>, ProviderError> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), &self.namespace);
        let (label, value) = ROUTER_POD_LABEL;
        let params = ListParams::default()
            .labels(&format!("{label}={value}"))
            .fields(&format!("spec.nodeName={}", self.node));
        let mut found = pods.list(&params).await?.items;
        if found.len() > 1 {
            return Err(ProviderError::TooManyRouterPods(self.node.clone()));
        }
        let pod = found
            .pop()
            .ok_or_else(|| ProviderError::NoRouterPod(self.node.clone()))?;
        Ok(Box::new(PodRouter {
            pods,
            pod,
            runtime: self.runtime.clone(),
        }))
    }
}

pub struct PodRouter {
    pods: Api<Pod>,
    pod: Pod,
    runtime: Arc<dyn PodRuntime>,
}

#[async_trait]
impl Router for PodRouter {
    async fn target_ns(&self) -> Result<NetnsPath, ProviderError> {
        let uid = self.pod.uid().unwrap_or_default();
        let ns = self.runtime.network_namespace(&uid).await?;
        // runtimes report either a bare name or a full path
        if ns.starts_with('/') {
            Ok(NetnsPath::new(ns))
        } else {
            Ok(NetnsPath::new(Path::new("/run/netns").join(ns)))
        }
    }

    async fn can_reconcile(&self) -> Result<bool, ProviderError> {
        let ready = pod_is_ready(&self.pod);
        if !ready {
            info!(
                "router pod {} is not ready, waiting before configuring",
                self.pod.name_any()
            );
        }
        Ok(ready)
    }

    async fn handle_non_recoverable_error(&self) -> Result<(), ProviderError> {
        info!("deleting router pod {}", self.pod.name_any());
        self.pods
            .delete(&self.pod.name_any(), &kube::api::DeleteParams::default())
            .await
            .map_err(|err| {
                error!("failed to delete router pod: {err}");
                err
            })?;
        Ok(())
    }
}

/// A pod is reconcilable once both `Ready` and `ContainersReady` report
/// true.
#[must_use]
pub fn pod_is_ready(pod: &Pod) -> bool {
    let Some(conditions) = pod.status.as_ref().and_then(|s| s.conditions.as_ref()) else {
        return false;
    };
    let is_true = |kind: &str| {
        conditions
            .iter()
            .any(|c| c.type_ == kind && c.status == "True")
    };
    is_true("Ready") && is_true("ContainersReady")
}

/// [`PodRuntime`] shelling out to `crictl` against the node's CRI socket.
pub struct CrictlRuntime {
    socket: String,
}

impl CrictlRuntime {
    #[must_use]
    pub fn new(socket: impl Into<String>) -> Self {
        Self {
            socket: socket.into(),
        }
    }

    async fn crictl(&self, args: &[&str]) -> Result<Vec<u8>, ProviderError> {
        let output = Command::new("crictl")
            .arg("--runtime-endpoint")
            .arg(&self.socket)
            .args(args)
            .output()
            .await?;
        if !output.status.success() {
            return Err(ProviderError::RuntimeFailure {
                uid: String::new(),
                reason: format!(
                    "crictl {args:?} failed: {}",
                    String::from_utf8_lossy(&output.stderr)
                ),
            });
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl PodRuntime for CrictlRuntime {
    async fn network_namespace(&self, pod_uid: &str) -> Result<String, ProviderError> {
        let fail = |reason: String| ProviderError::RuntimeFailure {
            uid: pod_uid.to_string(),
            reason,
        };

        let label = format!("io.kubernetes.pod.uid={pod_uid}");
        let sandboxes = self
            .crictl(&["pods", "--label", &label, "-o", "json"])
            .await?;
        let sandboxes: serde_json::Value = serde_json::from_slice(&sandboxes)
            .map_err(|err| fail(format!("unparseable sandbox list: {err}")))?;
        let sandbox_id = sandboxes["items"][0]["id"]
            .as_str()
            .ok_or_else(|| fail("no sandbox for pod".to_string()))?
            .to_string();

        let inspect = self.crictl(&["inspectp", &sandbox_id]).await?;
        let inspect: serde_json::Value = serde_json::from_slice(&inspect)
            .map_err(|err| fail(format!("unparseable sandbox info: {err}")))?;

        let namespaces = inspect["info"]["runtimeSpec"]["linux"]["namespaces"]
            .as_array()
            .ok_or_else(|| fail("sandbox info carries no namespaces".to_string()))?;
        namespaces
            .iter()
            .find(|ns| ns["type"] == "network")
            .and_then(|ns| ns["path"].as_str())
            .map(ToString::to_string)
            .ok_or_else(|| fail("no network namespace in sandbox info".to_string()))
    }
}

// ---------------------------------------------------------------------
// host-backed provider
// ---------------------------------------------------------------------

pub struct HostRouterProvider {
    config: StaticConfig,
}

impl HostRouterProvider {
    #[must_use]
    pub fn new(config: StaticConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl RouterProvider for HostRouterProvider {
    async fn node_index(&self) -> Result<u32, ProviderError> {
        Ok(self.config.node_index)
    }

    async fn router(&self) -> Result<Box<dyn Router>, ProviderError> {
        Ok(Box::new(HostRouter {
            target_netns: self.config.target_netns.clone(),
            restart_unit: self.config.restart_unit.clone(),
        }))
    }
}

pub struct HostRouter {
    target_netns: PathBuf,
    restart_unit: Option<String>,
}

#[async_trait]
impl Router for HostRouter {
    async fn target_ns(&self) -> Result<NetnsPath, ProviderError> {
        Ok(NetnsPath::new(self.target_netns.clone()))
    }

    async fn can_reconcile(&self) -> Result<bool, ProviderError> {
        // a statically configured target has no readiness gate
        Ok(true)
    }

    async fn handle_non_recoverable_error(&self) -> Result<(), ProviderError> {
        let unit = self
            .restart_unit
            .as_ref()
            .ok_or(ProviderError::NoRestartUnit)?;
        info!("restarting router unit {unit}");
        let status = Command::new("systemctl")
            .arg("restart")
            .arg(unit)
            .status()
            .await?;
        if !status.success() {
            return Err(ProviderError::Io(std::io::Error::other(format!(
                "systemctl restart {unit} exited with {status}"
            ))));
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use k8s_openapi::api::core::v1::{PodCondition, PodStatus};

    fn pod_with_conditions(conditions: &[(&str, &str)]) -> Pod {
        Pod {
            status: Some(PodStatus {
                conditions: Some(
                    conditions
                        .iter()
                        .map(|(kind, value)| PodCondition {
                            type_: (*kind).to_string(),
                            status: (*value).to_string(),
                            ..PodCondition::default()
                        })
                        .collect(),
                ),
                ..PodStatus::default()
            }),
            ..Pod::default()
        }
    }

    #[test]
    fn pod_readiness_requires_both_conditions() {
        assert!(pod_is_ready(&pod_with_conditions(&[
            ("Ready", "True"),
            ("ContainersReady", "True"),
        ])));
        assert!(!pod_is_ready(&pod_with_conditions(&[
            ("Ready", "True"),
            ("ContainersReady", "False"),
        ])));
        assert!(!pod_is_ready(&pod_with_conditions(&[("Ready", "True")])));
        assert!(!pod_is_ready(&pod_with_conditions(&[])));
        assert!(!pod_is_ready(&Pod::default()));
    }
}
