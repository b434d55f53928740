// SPDX-License-Identifier: Apache-2.0
// Copyright Krouter Authors

//! Dense per-node index assignment.
//!
//! The node marker annotates every Node with a small stable integer; the
//! router providers read it back to derive per-node addresses.  Indexes
//! are never reassigned: a node keeps its index for its lifetime, and the
//! lowest free index goes to the next unannotated node.

use std::collections::BTreeSet;
use std::time::Duration;

use k8s_openapi::api::core::v1::Node;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use serde_json::json;
use tracing::{info, warn};

use k8s_intf::NODE_INDEX_ANNOTATION;

/// How often the marker loop re-checks the node set.
const SYNC_INTERVAL: Duration = Duration::from_secs(30);

/// Assign indexes to nodes that have none yet.  Returns how many nodes
/// were annotated.
pub async fn sync_node_indexes(client: &Client) -> Result<usize, kube::Error> {
    let nodes: Api<Node> = Api::all(client.clone());
    let node_list = nodes.list(&kube::api::ListParams::default()).await?;

    let current: Vec<(String, Option<u32>)> = node_list
        .items
        .iter()
        .map(|node| {
            let index = node
                .annotations()
                .get(NODE_INDEX_ANNOTATION)
                .and_then(|raw| raw.parse().ok());
            (node.name_any(), index)
        })
        .collect();

    let assignments = plan_assignments(&current);
    for (name, index) in &assignments {
        info!("assigning index {index} to node {name}");
        let patch = json!({
            "metadata": {
                "annotations": { NODE_INDEX_ANNOTATION: index.to_string() }
            }
        });
        nodes
            .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
    }
    Ok(assignments.len())
}

/// Lowest-free-index assignment for the unannotated nodes.  Existing
/// annotations are never changed, even when they collide.
fn plan_assignments(nodes: &[(String, Option<u32>)]) -> Vec<(String, u32)> {
    let used: BTreeSet<u32> = nodes.iter().filter_map(|(_, index)| *index).collect();

    let mut free = (0..).filter(|candidate| !used.contains(candidate));
    let mut unassigned: Vec<&String> = nodes
        .iter()
        .filter(|(_, index)| index.is_none())
        .map(|(name, _)| name)
        .collect();
    // stable assignment order regardless of list order
    unassigned.sort();

    unassigned
        .into_iter()
        .filter_map(|name| free.next().map(|index| (name.clone(), index)))
        .collect()
}

/// The node-marker loop: periodically reconcile the node set.
pub async fn run_node_marker(client: Client) -> Result<(), kube::Error> {
    let mut ticker = tokio::time::interval(SYNC_INTERVAL);
    loop {
        ticker.tick().await;
        match sync_node_indexes(&client).await {
            Ok(0) => {}
            Ok(assigned) => info!("annotated {assigned} nodes"),
            Err(err) => warn!("node index sync failed: {err}"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn named(name: &str, index: Option<u32>) -> (String, Option<u32>) {
        (name.to_string(), index)
    }

    #[test]
    fn assigns_lowest_free_indexes() {
        let nodes = [
            named("node-a", Some(0)),
            named("node-b", None),
            named("node-c", Some(2)),
            named("node-d", None),
        ];
        assert_eq!(
            plan_assignments(&nodes),
            vec![("node-b".to_string(), 1), ("node-d".to_string(), 3)]
        );
    }

    #[test]
    fn fully_annotated_set_needs_nothing() {
        let nodes = [named("node-a", Some(0)), named("node-b", Some(1))];
        assert!(plan_assignments(&nodes).is_empty());
    }

    #[test]
    fn fresh_cluster_gets_dense_indexes() {
        let nodes = [named("node-b", None), named("node-a", None)];
        assert_eq!(
            plan_assignments(&nodes),
            vec![("node-a".to_string(), 0), ("node-b".to_string(), 1)]
        );
    }

    #[test]
    fn existing_indexes_are_never_touched() {
        // a collision left behind by an operator: both keep their index
        let nodes = [
            named("node-a", Some(1)),
            named("node-b", Some(1)),
            named("node-c", None),
        ];
        assert_eq!(plan_assignments(&nodes), vec![("node-c".to_string(), 0)]);
    }
}
