// SPDX-License-Identifier: Apache-2.0
// Copyright Krouter Authors

//! The two level-triggered loops of the controller.
//!
//! Watch events never carry payload into the loops: every watcher pushes
//! a unit token onto a bounded channel and the consumer re-reads the full
//! current state.  Dropped tokens (channel full) are harmless, the next
//! mutation re-triggers.

use std::sync::Arc;
use std::time::Duration;

use futures::{StreamExt, TryStreamExt};
use k8s_openapi::api::core::v1::{Node, Pod};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{Condition, OwnerReference, Time};
use kube::api::{Patch, PatchParams, PostParams};
use kube::runtime::{WatchStreamExt, watcher};
use kube::{Api, Client, Resource, ResourceExt};
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{error, info};

use config::ApiConfig;
use config::status::{StatusReader, StatusSummary};
use hostnet::netlink::NetlinkHostNetwork;
use k8s_intf::v1alpha1::{
    L2VNI, L3Passthrough, L3VNI, RouterNodeConfigurationStatus,
    RouterNodeConfigurationStatusSpec, RouterNodeConfigurationStatusStatus, Underlay,
};
use k8s_intf::ROUTER_POD_LABEL;

use crate::provider::{ProviderError, RouterProvider};
use crate::reconcile::{non_recoverable, reconcile, sweep_removed_resources, ReconcileError};
use crate::status::StatusManager;
use crate::frr::FrrUpdater;

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("client error: {0}")]
    Kube(#[from] kube::Error),

    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
}

/// Delay before re-checking a target that was not ready, and before
/// retrying a failed pass.
const REQUEUE_DELAY: Duration = Duration::from_secs(5);
const TRIGGER_CAPACITY: usize = 100;

enum PassOutcome {
    /// The pass ran to a conclusion; wait for the next trigger.
    Settled,
    /// Come back soon without waiting for a trigger.
    Requeue,
}

/// Wait for either a trigger token or, when set, the requeue timer.
/// Returns false when the trigger channel is gone.
async fn next_wakeup(rx: &mut mpsc::Receiver<()>, requeue: Option<Duration>) -> bool {
    let alive = match requeue {
        Some(delay) => tokio::select! {
            () = tokio::time::sleep(delay) => true,
            received = rx.recv() => received.is_some(),
        },
        None => rx.recv().await.is_some(),
    };
    // coalesce every queued token into this wakeup
    while rx.try_recv().is_ok() {}
    alive
}

// ---------------------------------------------------------------------
// router configuration loop
// ---------------------------------------------------------------------

pub struct RouterLoop {
    pub client: Client,
    pub node: String,
    pub namespace: String,
    pub provider: Arc<dyn RouterProvider>,
    pub updater: Arc<dyn FrrUpdater>,
    pub status: Arc<StatusManager>,
}

impl RouterLoop {
    /// Run until the process is shut down.
    pub async fn run(self) -> Result<(), WatchError> {
        let (tx, mut rx) = mpsc::channel::<()>(TRIGGER_CAPACITY);
        self.spawn_watches(&tx);

        // initial pass before the first event
        let mut requeue = Some(Duration::ZERO);
        loop {
            if !next_wakeup(&mut rx, requeue).await {
                return Ok(());
            }
            info!("start reconcile");
            requeue = match self.reconcile_pass().await {
                Ok(PassOutcome::Settled) => None,
                Ok(PassOutcome::Requeue) => Some(REQUEUE_DELAY),
                Err(err) => {
                    // infrastructure errors: api server or runtime
                    // hiccups, not attributable to any resource
                    error!("reconcile pass failed: {err}");
                    Some(REQUEUE_DELAY)
                }
            };
            info!("end reconcile");
        }
    }

    fn spawn_watches(&self, tx: &mpsc::Sender<()>) {
        spawn_watch(
            Api::<Underlay>::all(self.client.clone()),
            watcher::Config::default(),
            tx.clone(),
        );
        spawn_watch(
            Api::<L3VNI>::all(self.client.clone()),
            watcher::Config::default(),
            tx.clone(),
        );
        spawn_watch(
            Api::<L2VNI>::all(self.client.clone()),
            watcher::Config::default(),
            tx.clone(),
        );
        spawn_watch(
            Api::<L3Passthrough>::all(self.client.clone()),
            watcher::Config::default(),
            tx.clone(),
        );
        // only this node's router pod is interesting
        let (label, value) = ROUTER_POD_LABEL;
        spawn_watch(
            Api::<Pod>::namespaced(self.client.clone(), &self.namespace),
            watcher::Config::default()
                .labels(&format!("{label}={value}"))
                .fields(&format!("spec.nodeName={}", self.node)),
            tx.clone(),
        );
    }

    async fn list_api_config(&self) -> Result<ApiConfig, WatchError> {
        let params = kube::api::ListParams::default();
        let underlays = Api::<Underlay>::all(self.client.clone()).list(&params).await?;
        let l3vnis = Api::<L3VNI>::all(self.client.clone()).list(&params).await?;
        let l2vnis = Api::<L2VNI>::all(self.client.clone()).list(&params).await?;
        let passthroughs = Api::<L3Passthrough>::all(self.client.clone())
            .list(&params)
            .await?;
        let node_index = self.provider.node_index().await?;

        Ok(ApiConfig {
            node_index,
            underlays: underlays.items,
            l3vnis: l3vnis.items,
            l2vnis: l2vnis.items,
            passthroughs: passthroughs.items,
        })
    }

    async fn reconcile_pass(&self) -> Result<PassOutcome, WatchError> {
        let api_config = self.list_api_config().await?;

        // resources deleted while marked failed must not linger in status
        sweep_removed_resources(&api_config, self.status.as_ref(), self.status.as_ref());

        let router = self.provider.router().await?;
        if !router.can_reconcile().await? {
            info!("router is not ready for reconciliation, requeueing");
            return Ok(PassOutcome::Requeue);
        }
        let target = router.target_ns().await?;
        let host = NetlinkHostNetwork::new(target);

        let result = reconcile(
            &api_config,
            self.updater.as_ref(),
            &host,
            self.status.as_ref(),
        )
        .await;

        match result {
            Ok(()) => {
                self.report_underlays_ok(&api_config);
                Ok(PassOutcome::Settled)
            }
            Err(err) if non_recoverable(&err) => {
                info!("breaking configuration change due to non-recoverable error");
                self.report_underlays_failed(&api_config, &err);
                router.handle_non_recoverable_error().await?;
                // the pod watcher fires once the target is recreated
                Ok(PassOutcome::Settled)
            }
            Err(err) => {
                error!("failed to configure the host: {err}");
                self.report_underlays_failed(&api_config, &err);
                match err {
                    // user-input class: only a resource change can fix it
                    ReconcileError::Config(_) => Ok(PassOutcome::Settled),
                    _ => Ok(PassOutcome::Requeue),
                }
            }
        }
    }

    fn report_underlays_ok(&self, api_config: &ApiConfig) {
        use config::status::{ResourceKind, StatusReporter};
        for underlay in &api_config.underlays {
            self.status
                .report_resource_success(ResourceKind::Underlay, &underlay.name_any());
        }
    }

    fn report_underlays_failed(&self, api_config: &ApiConfig, err: &ReconcileError) {
        use config::status::{ResourceKind, StatusReporter};
        for underlay in &api_config.underlays {
            self.status
                .report_resource_failure(ResourceKind::Underlay, &underlay.name_any(), err);
        }
    }
}

/// Forward every watch event for one resource type as a trigger token.
fn spawn_watch<K>(api: Api<K>, cfg: watcher::Config, tx: mpsc::Sender<()>)
where
    K: Resource + Clone + serde::de::DeserializeOwned + std::fmt::Debug + Send + 'static,
    K::DynamicType: Default + Clone + Eq + std::hash::Hash,
{
    tokio::spawn(async move {
        let mut stream = watcher(api, cfg).default_backoff().touched_objects().boxed();
        loop {
            match stream.try_next().await {
                Ok(Some(_)) => {
                    // lossy by design: the loop re-reads everything
                    let _ = tx.try_send(());
                }
                Ok(None) => return,
                Err(err) => {
                    error!("watcher error: {err}");
                }
            }
        }
    });
}

// ---------------------------------------------------------------------
// status materialization loop
// ---------------------------------------------------------------------

pub struct StatusLoop {
    pub client: Client,
    pub node: String,
    pub namespace: String,
    pub reader: Arc<dyn StatusReader>,
}

impl StatusLoop {
    /// Consume the status manager's trigger stream, one reconcile at a
    /// time.
    pub async fn run(self, mut trigger: mpsc::Receiver<()>) -> Result<(), WatchError> {
        let mut requeue = None;
        loop {
            if !next_wakeup(&mut trigger, requeue).await {
                return Ok(());
            }
            requeue = match self.reconcile_status().await {
                Ok(()) => None,
                Err(err) => {
                    error!("status reconcile failed: {err}");
                    Some(REQUEUE_DELAY)
                }
            };
        }
    }

    async fn reconcile_status(&self) -> Result<(), WatchError> {
        let api: Api<RouterNodeConfigurationStatus> =
            Api::namespaced(self.client.clone(), &self.namespace);

        let existing = match api.get_opt(&self.node).await? {
            Some(existing) => existing,
            None => {
                self.create_status_object(&api).await?;
                api.get(&self.node).await?
            }
        };

        let desired = build_status(&self.reader.status_summary());
        let current = existing.status.unwrap_or_default();
        if status_equal(&current, &desired) {
            return Ok(());
        }

        api.patch_status(
            &self.node,
            &PatchParams::default(),
            &Patch::Merge(&json!({ "status": desired })),
        )
        .await?;
        info!("patched RouterNodeConfigurationStatus {}", self.node);
        Ok(())
    }

    /// Create the per-node status object, owned by the Node so it is
    /// garbage collected with it.
    async fn create_status_object(
        &self,
        api: &Api<RouterNodeConfigurationStatus>,
    ) -> Result<(), WatchError> {
        let nodes: Api<Node> = Api::all(self.client.clone());
        let node = nodes.get(&self.node).await?;

        let mut object = RouterNodeConfigurationStatus::new(
            &self.node,
            RouterNodeConfigurationStatusSpec::default(),
        );
        object.meta_mut().namespace = Some(self.namespace.clone());
        object.meta_mut().owner_references = Some(vec![OwnerReference {
            api_version: "v1".to_string(),
            kind: "Node".to_string(),
            name: node.name_any(),
            uid: node.uid().unwrap_or_default(),
            ..OwnerReference::default()
        }]);

        api.create(&PostParams::default(), &object).await?;
        info!("created RouterNodeConfigurationStatus {}", self.node);
        Ok(())
    }
}

/// Materialize the aggregated summary as CRD status.
fn build_status(summary: &StatusSummary) -> RouterNodeConfigurationStatusStatus {
    let failed_resources = summary
        .failed_resources
        .iter()
        .map(|failed| k8s_intf::v1alpha1::FailedResource {
            kind: failed.kind.to_string(),
            name: failed.name.clone(),
            message: failed.message.clone(),
        })
        .collect::<Vec<_>>();

    RouterNodeConfigurationStatusStatus {
        last_update_time: Some(Time(chrono::Utc::now())),
        conditions: build_conditions(failed_resources.len()),
        failed_resources,
    }
}

/// The `Ready`/`Degraded` condition pair for a given failure count.
fn build_conditions(failed_count: usize) -> Vec<Condition> {
    let now = Time(chrono::Utc::now());
    let condition = |type_: &str, status: &str, reason: &str, message: String| Condition {
        type_: type_.to_string(),
        status: status.to_string(),
        reason: reason.to_string(),
        message,
        last_transition_time: now.clone(),
        observed_generation: None,
    };

    if failed_count > 0 {
        vec![
            condition(
                "Ready",
                "False",
                "ConfigurationFailed",
                "Some router configurations failed".to_string(),
            ),
            condition(
                "Degraded",
                "True",
                "ConfigurationFailed",
                format!("{failed_count} resource(s) failed"),
            ),
        ]
    } else {
        vec![
            condition(
                "Ready",
                "True",
                "ConfigurationSuccessful",
                "All router configurations are successful".to_string(),
            ),
            condition(
                "Degraded",
                "False",
                "ConfigurationSuccessful",
                "All configurations are healthy".to_string(),
            ),
        ]
    }
}

/// Equality after normalizing away the timestamps, so a pass where only
/// time advanced does not patch.
fn status_equal(
    a: &RouterNodeConfigurationStatusStatus,
    b: &RouterNodeConfigurationStatusStatus,
) -> bool {
    normalized(a) == normalized(b)
}

fn normalized(status: &RouterNodeConfigurationStatusStatus) -> RouterNodeConfigurationStatusStatus {
    let epoch = Time(chrono::DateTime::<chrono::Utc>::UNIX_EPOCH);
    let mut out = status.clone();
    out.last_update_time = None;
    for condition in &mut out.conditions {
        condition.last_transition_time = epoch.clone();
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;
    use config::status::{FailedResourceInfo, ResourceKind};
    use pretty_assertions::assert_eq;

    fn summary_with_failures(count: usize) -> StatusSummary {
        StatusSummary {
            failed_resources: (0..count)
                .map(|i| FailedResourceInfo {
                    kind: ResourceKind::L3VNI,
                    name: format!("vni{i}"),
                    message: "failed: boom".to_string(),
                })
                .collect(),
            last_update_time: Some(std::time::SystemTime::now()),
        }
    }

    #[test]
    fn healthy_summary_builds_ready_conditions() {
        let status = build_status(&StatusSummary::default());
        assert!(status.failed_resources.is_empty());
        assert_eq!(status.conditions.len(), 2);
        let ready = &status.conditions[0];
        assert_eq!((ready.type_.as_str(), ready.status.as_str()), ("Ready", "True"));
        let degraded = &status.conditions[1];
        assert_eq!(
            (degraded.type_.as_str(), degraded.status.as_str()),
            ("Degraded", "False")
        );
    }

    #[test]
    fn failures_flip_the_conditions() {
        let status = build_status(&summary_with_failures(2));
        assert_eq!(status.failed_resources.len(), 2);
        let ready = &status.conditions[0];
        assert_eq!((ready.type_.as_str(), ready.status.as_str()), ("Ready", "False"));
        let degraded = &status.conditions[1];
        assert_eq!(
            (degraded.type_.as_str(), degraded.status.as_str()),
            ("Degraded", "True")
        );
        assert_eq!(degraded.message, "2 resource(s) failed");
    }

    #[test]
    fn equality_ignores_advancing_time() {
        let first = build_status(&summary_with_failures(1));
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = build_status(&summary_with_failures(1));
        assert!(status_equal(&first, &second), "only time advanced");
    }

    #[test]
    fn equality_sees_content_changes() {
        let healthy = build_status(&StatusSummary::default());
        let degraded = build_status(&summary_with_failures(1));
        assert!(!status_equal(&healthy, &degraded));

        let mut renamed = build_status(&summary_with_failures(1));
        renamed.failed_resources[0].name = "other".to_string();
        assert!(!status_equal(&degraded, &renamed));
    }
}
