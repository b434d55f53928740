// SPDX-License-Identifier: Apache-2.0
// Copyright Krouter Authors

//! End-to-end exercises of the reconciliation pipeline against the
//! in-memory host network.

use std::sync::Mutex;

use async_trait::async_trait;

use config::ApiConfig;
use config::status::{ResourceKind, StatusReader, StatusReporter};
use hostnet::recording::{FailPoint, Failure, RecordingHostNetwork};
use hostnet::UnderlayParams;
use k8s_intf::v1alpha1::{
    EvpnConfig, HostMaster, HostMasterKind, HostSession, L2VNI, L2VNISpec, L3Passthrough,
    L3PassthroughSpec, L3VNI, L3VNISpec, LocalCidr, Neighbor, Underlay, UnderlaySpec,
};
use krouter_mgmt::frr::{FrrError, FrrUpdater};
use krouter_mgmt::reconcile::{non_recoverable, reconcile, sweep_removed_resources};
use krouter_mgmt::status::StatusManager;
use krouter_mgmt::ReconcileError;
use tracing_test::traced_test;

#[derive(Default)]
struct RecordingUpdater {
    applies: Mutex<Vec<String>>,
}

impl RecordingUpdater {
    fn apply_count(&self) -> usize {
        self.applies.lock().unwrap().len()
    }
}

#[async_trait]
impl FrrUpdater for RecordingUpdater {
    async fn apply(&self, rendered: &str) -> Result<(), FrrError> {
        self.applies.lock().unwrap().push(rendered.to_string());
        Ok(())
    }
}

fn underlay(name: &str, nics: &[&str]) -> Underlay {
    Underlay::new(
        name,
        UnderlaySpec {
            asn: 64514,
            nics: nics.iter().map(ToString::to_string).collect(),
            neighbors: vec![Neighbor {
                asn: 64512,
                address: "192.168.11.2".to_string(),
            }],
            evpn: Some(EvpnConfig {
                vtep_cidr: "100.65.0.0/24".to_string(),
            }),
        },
    )
}

fn l3vni(name: &str, vni: u32, vrf: &str) -> L3VNI {
    L3VNI::new(
        name,
        L3VNISpec {
            vrf: Some(vrf.to_string()),
            vni,
            host_session: None,
        },
    )
}

fn l2vni(name: &str, vni: u32) -> L2VNI {
    L2VNI::new(
        name,
        L2VNISpec {
            vrf: None,
            vni,
            host_master: None,
            l2_gateway_ips: vec![],
        },
    )
}

fn full_api_config() -> ApiConfig {
    ApiConfig {
        node_index: 0,
        underlays: vec![underlay("test-underlay", &["toswitch"])],
        l3vnis: vec![l3vni("red", 100, "red")],
        l2vnis: vec![l2vni("segment", 110)],
        passthroughs: vec![L3Passthrough::new(
            "pt",
            L3PassthroughSpec {
                host_session: HostSession {
                    asn: 64514,
                    host_asn: 64515,
                    local_cidr: LocalCidr {
                        ipv4: Some("192.169.12.0/24".to_string()),
                        ipv6: None,
                    },
                },
            },
        )],
    }
}

fn failed_names(manager: &StatusManager) -> Vec<(ResourceKind, String)> {
    manager
        .status_summary()
        .failed_resources
        .into_iter()
        .map(|f| (f.kind, f.name))
        .collect()
}

#[tokio::test]
#[traced_test]
async fn applies_everything_in_order() {
    let host = RecordingHostNetwork::new();
    let updater = RecordingUpdater::default();
    let (manager, _rx) = StatusManager::new();

    reconcile(&full_api_config(), &updater, &host, &manager)
        .await
        .expect("reconcile succeeds");

    assert_eq!(updater.apply_count(), 1, "one frr apply per pass");
    assert_eq!(
        host.mutations(),
        vec![
            "setup_underlay".to_string(),
            "setup_l3vni 100".to_string(),
            "setup_l2vni 110".to_string(),
            "setup_passthrough".to_string(),
        ],
        "underlay strictly before the vnis"
    );
    assert!(failed_names(&manager).is_empty());
}

#[tokio::test]
async fn second_pass_with_unchanged_config_is_a_noop() {
    let host = RecordingHostNetwork::new();
    let updater = RecordingUpdater::default();
    let (manager, _rx) = StatusManager::new();
    let api = full_api_config();

    reconcile(&api, &updater, &host, &manager).await.unwrap();
    let first_pass = host.mutations();
    let first_summary = manager.status_summary();

    reconcile(&api, &updater, &host, &manager).await.unwrap();

    assert_eq!(
        host.mutations(),
        first_pass,
        "identical desired state must apply no further host mutations"
    );
    assert_eq!(
        manager.status_summary().failed_resources,
        first_summary.failed_resources,
        "status content unchanged on the second pass"
    );
}

#[tokio::test]
async fn duplicate_vrf_fails_validation_before_any_host_call() {
    let host = RecordingHostNetwork::new();
    let updater = RecordingUpdater::default();
    let (manager, _rx) = StatusManager::new();

    let api = ApiConfig {
        l3vnis: vec![l3vni("vni1", 100, "red"), l3vni("vni2", 101, "red")],
        l2vnis: vec![],
        passthroughs: vec![],
        ..full_api_config()
    };

    let err = reconcile(&api, &updater, &host, &manager)
        .await
        .expect_err("duplicate vrf must fail");
    assert!(matches!(err, ReconcileError::Config(_)), "{err}");
    assert!(!non_recoverable(&err));

    assert_eq!(updater.apply_count(), 0, "no frr apply after validation failure");
    assert!(host.mutations().is_empty(), "zero host-network calls");
    // the later-processed resource carries the failure
    assert_eq!(
        failed_names(&manager),
        vec![(ResourceKind::L3VNI, "vni2".to_string())]
    );
}

#[tokio::test]
async fn equal_session_asns_fail_validation() {
    let host = RecordingHostNetwork::new();
    let updater = RecordingUpdater::default();
    let (manager, _rx) = StatusManager::new();

    let mut api = full_api_config();
    api.passthroughs[0].spec.host_session.host_asn = 64514;

    let err = reconcile(&api, &updater, &host, &manager)
        .await
        .expect_err("equal asns must fail");
    assert!(
        err.to_string()
            .contains("local ASN 64514 must be different from remote ASN 64514"),
        "{err}"
    );
}

#[tokio::test]
async fn failed_underlay_apply_is_reported_and_clears_after_fix() {
    let host = RecordingHostNetwork::new();
    let updater = RecordingUpdater::default();
    let (manager, _rx) = StatusManager::new();

    // the declared nic does not exist on this machine
    host.fail_with(
        FailPoint::Underlay,
        Failure::DeviceNotFound("nonexistent".to_string()),
    );
    let mut api = full_api_config();
    api.underlays = vec![underlay("test-underlay", &["nonexistent"])];

    let err = reconcile(&api, &updater, &host, &manager)
        .await
        .expect_err("underlay apply must fail");
    assert!(matches!(err, ReconcileError::Host(_)), "{err}");
    assert!(!non_recoverable(&err), "a missing nic is recoverable");
    assert_eq!(
        failed_names(&manager),
        vec![(ResourceKind::Underlay, "test-underlay".to_string())]
    );
    assert_eq!(updater.apply_count(), 1, "frr was configured before the host step");

    // the user fixes the nic name
    host.clear_failure(FailPoint::Underlay);
    api.underlays = vec![underlay("test-underlay", &["toswitch"])];
    reconcile(&api, &updater, &host, &manager).await.unwrap();
    assert!(failed_names(&manager).is_empty(), "failure cleared after fix");
}

#[tokio::test]
async fn failed_l2vni_clears_once_the_resource_is_deleted() {
    let host = RecordingHostNetwork::new();
    let updater = RecordingUpdater::default();
    let (manager, _rx) = StatusManager::new();

    host.fail_with(
        FailPoint::L2Vni(110),
        Failure::HostMasterMissing("nonexist-br".to_string()),
    );
    let mut api = full_api_config();
    api.l2vnis[0].spec.host_master = Some(HostMaster {
        name: "nonexist-br".to_string(),
        auto_create: false,
        kind: HostMasterKind::Linux,
    });

    let err = reconcile(&api, &updater, &host, &manager)
        .await
        .expect_err("missing host master must fail");
    assert!(matches!(err, ReconcileError::Host(_)), "{err}");
    assert_eq!(
        failed_names(&manager),
        vec![(ResourceKind::L2VNI, "segment".to_string())]
    );
    // earlier resources in the pass were applied and reported
    assert!(host.mutations().contains(&"setup_l3vni 100".to_string()));

    // deleting the l2vni removes the entry, not merely leaves it absent
    api.l2vnis.clear();
    sweep_removed_resources(&api, &manager, &manager);
    assert!(failed_names(&manager).is_empty());

    reconcile(&api, &updater, &host, &manager).await.unwrap();
    assert!(
        host.mutations().contains(&"remove_vni 110".to_string()),
        "stale vni swept from the host"
    );
}

#[tokio::test]
#[traced_test]
async fn removed_underlay_with_live_host_state_is_non_recoverable() {
    let host = RecordingHostNetwork::new().with_underlay(UnderlayParams {
        nic: None,
        vtep_ip: None,
    });
    let updater = RecordingUpdater::default();
    let (manager, _rx) = StatusManager::new();

    let api = ApiConfig {
        underlays: vec![],
        ..full_api_config()
    };

    let err = reconcile(&api, &updater, &host, &manager)
        .await
        .expect_err("underlay removal with live state must fail");
    assert!(matches!(err, ReconcileError::UnderlayRemoved), "{err}");
    assert!(non_recoverable(&err));
}

#[tokio::test]
async fn conflicting_underlay_is_non_recoverable() {
    let host = RecordingHostNetwork::new();
    let updater = RecordingUpdater::default();
    let (manager, _rx) = StatusManager::new();

    host.fail_with(FailPoint::Underlay, Failure::UnderlayExists);

    let err = reconcile(&full_api_config(), &updater, &host, &manager)
        .await
        .expect_err("conflicting underlay must fail");
    assert!(non_recoverable(&err), "{err}");
}

#[tokio::test]
async fn no_underlay_and_clean_host_is_a_successful_noop() {
    let host = RecordingHostNetwork::new();
    let updater = RecordingUpdater::default();
    let (manager, _rx) = StatusManager::new();

    let api = ApiConfig {
        underlays: vec![],
        ..full_api_config()
    };

    reconcile(&api, &updater, &host, &manager).await.unwrap();
    assert!(host.mutations().is_empty(), "nothing declared, nothing done");
}

#[tokio::test]
async fn dropping_the_passthrough_removes_it_from_the_host() {
    let host = RecordingHostNetwork::new();
    let updater = RecordingUpdater::default();
    let (manager, _rx) = StatusManager::new();

    let mut api = full_api_config();
    reconcile(&api, &updater, &host, &manager).await.unwrap();
    assert!(host.mutations().contains(&"setup_passthrough".to_string()));

    api.passthroughs.clear();
    sweep_removed_resources(&api, &manager, &manager);
    reconcile(&api, &updater, &host, &manager).await.unwrap();
    assert!(
        host.mutations().contains(&"remove_passthrough".to_string()),
        "undeclared passthrough is torn down"
    );
}
