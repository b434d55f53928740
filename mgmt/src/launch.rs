// SPDX-License-Identifier: Apache-2.0
// Copyright Krouter Authors

//! Wiring: connect to the cluster, build the provider for the requested
//! mode and keep both reconcile loops running.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use kube::Client;
use tracing::{debug, warn};

use config::status::StatusReader;
use k8s_intf::client::wait_for_api_server;

use crate::frr::SocketReloader;
use crate::nodeindex::run_node_marker;
use crate::provider::{CrictlRuntime, HostRouterProvider, PodRouterProvider, RouterProvider};
use crate::staticcfg::{StaticConfig, StaticConfigError};
use crate::status::StatusManager;
use crate::watch::{RouterLoop, StatusLoop, WatchError};

/// What backs the data-plane target on this machine.
#[derive(Copy, Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum Mode {
    /// Router pod managed by the kubelet, located through the API server.
    K8s,
    /// Statically configured router service on the host.
    Host,
    /// No router at all: only assign node indexes.
    Nodemarker,
}

pub struct ControllerParams {
    pub mode: Mode,
    pub node: String,
    pub namespace: String,
    pub frr_config_path: PathBuf,
    pub reloader_socket: PathBuf,
    pub cri_socket: String,
    pub host_configuration: PathBuf,
    pub k8s_wait_interval: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("failed to load the static configuration file: {0}")]
    StaticConfig(#[from] StaticConfigError),

    #[error("error in router configuration loop: {0}")]
    RouterLoop(WatchError),

    #[error("error in status loop: {0}")]
    StatusLoop(WatchError),

    #[error("error in node marker: {0}")]
    NodeMarker(kube::Error),

    #[error("error waiting for a controller task: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("router configuration loop exited prematurely")]
    PrematureRouterExit,

    #[error("status loop exited prematurely")]
    PrematureStatusExit,
}

/// Run the controller until it fails or is killed.
pub async fn run(params: ControllerParams) -> Result<(), LaunchError> {
    let client = wait_for_api_server(params.k8s_wait_interval).await;

    if params.mode == Mode::Nodemarker {
        warn!("running in node-marker mode, no router will be configured");
        return run_node_marker(client).await.map_err(LaunchError::NodeMarker);
    }

    let provider = build_provider(&params, &client)?;

    let (manager, status_trigger) = StatusManager::new();
    let manager = Arc::new(manager);
    let reader: Arc<dyn StatusReader> = manager.clone();

    debug!("starting reconcile loops for node {}", params.node);
    let router_loop = RouterLoop {
        client: client.clone(),
        node: params.node.clone(),
        namespace: params.namespace.clone(),
        provider,
        updater: Arc::new(SocketReloader::new(
            params.frr_config_path.clone(),
            params.reloader_socket.clone(),
        )),
        status: manager,
    };
    let status_loop = StatusLoop {
        client,
        node: params.node,
        namespace: params.namespace,
        reader,
    };

    let mut router_handle = tokio::spawn(router_loop.run());
    let mut status_handle = tokio::spawn(status_loop.run(status_trigger));

    tokio::select! {
        result = &mut router_handle => match result? {
            Ok(()) => Err(LaunchError::PrematureRouterExit),
            Err(err) => Err(LaunchError::RouterLoop(err)),
        },
        result = &mut status_handle => match result? {
            Ok(()) => Err(LaunchError::PrematureStatusExit),
            Err(err) => Err(LaunchError::StatusLoop(err)),
        },
    }
}

fn build_provider(
    params: &ControllerParams,
    client: &Client,
) -> Result<Arc<dyn RouterProvider>, LaunchError> {
    match params.mode {
        Mode::K8s => Ok(Arc::new(PodRouterProvider {
            client: client.clone(),
            node: params.node.clone(),
            namespace: params.namespace.clone(),
            runtime: Arc::new(CrictlRuntime::new(params.cri_socket.clone())),
        })),
        Mode::Host => {
            let config = StaticConfig::read_from_file(&params.host_configuration)?;
            Ok(Arc::new(HostRouterProvider::new(config)))
        }
        Mode::Nodemarker => unreachable!("node marker handled before provider construction"),
    }
}
