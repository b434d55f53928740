// SPDX-License-Identifier: Apache-2.0
// Copyright Krouter Authors

//! Cluster access helpers.

use std::time::Duration;

use kube::Client;
use tracing::{debug, info};

/// Wait until the Kubernetes API server answers, polling at the given
/// interval.
///
/// All failures are retried; the loop runs until the server responds.
/// Callers cancel it by dropping the future (e.g. from a `select!` against
/// a shutdown signal).
pub async fn wait_for_api_server(interval: Duration) -> Client {
    loop {
        match ping_api_server().await {
            Ok(client) => {
                info!("successfully connected to the kubernetes api server");
                return client;
            }
            Err(err) => {
                debug!("ping api server failed: {err}");
            }
        }
        tokio::time::sleep(interval).await;
    }
}

async fn ping_api_server() -> Result<Client, kube::Error> {
    let client = Client::try_default().await?;
    client.apiserver_version().await?;
    Ok(client)
}
