// SPDX-License-Identifier: Apache-2.0
// Copyright Krouter Authors

//! The configuration reconciliation pipeline: validate, push FRR
//! configuration, apply host-network state, sweep what is gone.

use tracing::{debug, info};

use config::status::{ResourceKind, StatusReader, StatusReporter};
use config::validate::{
    validate_host_sessions, validate_l2vnis, validate_l3vnis, validate_underlays,
};
use config::{ApiConfig, ConfigError, HostConfig, api_to_host_config};
use config::frr::render_frr_config;
use hostnet::{HostError, HostNetwork};
use kube::ResourceExt;

use crate::frr::{FrrError, FrrUpdater};

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to reload frr config: {0}")]
    Frr(#[from] FrrError),

    #[error("failed to configure the host: {0}")]
    Host(#[from] HostError),

    /// The underlay disappeared from the desired set while the target
    /// namespace still carries one.  Incremental teardown is unsafe; the
    /// data-plane target must be recreated.
    #[error("underlay was removed, the router target must be recreated")]
    UnderlayRemoved,
}

/// Whether the error requires recreating the data-plane target instead of
/// retrying: either the underlay was removed under us, or the host layer
/// found an underlay with conflicting parameters.
#[must_use]
pub fn non_recoverable(err: &ReconcileError) -> bool {
    match err {
        ReconcileError::UnderlayRemoved => true,
        ReconcileError::Host(host) => host.is_underlay_exists(),
        _ => false,
    }
}

/// One reconcile pass: validation, FRR configuration, host interfaces.
///
/// Steps run strictly in order and the first failure aborts the rest.
/// Each per-resource apply reports its outcome immediately, so status
/// always shows which resources were actually (re)configured before an
/// abort.
pub async fn reconcile(
    api: &ApiConfig,
    updater: &dyn FrrUpdater,
    host: &dyn HostNetwork,
    reporter: &dyn StatusReporter,
) -> Result<(), ReconcileError> {
    validate_underlays(&api.underlays, reporter)?;
    validate_l3vnis(&api.l3vnis, reporter)?;
    validate_l2vnis(&api.l2vnis, &api.l3vnis, reporter)?;
    validate_host_sessions(&api.l3vnis, &api.passthroughs, reporter)?;

    let host_config = api_to_host_config(api)?;

    updater.apply(&render_frr_config(&host_config)).await?;

    configure_interfaces(&host_config, host, reporter).await
}

async fn configure_interfaces(
    host_config: &HostConfig,
    host: &dyn HostNetwork,
    reporter: &dyn StatusReporter,
) -> Result<(), ReconcileError> {
    let has_underlay = host.has_underlay_interface().await?;
    if has_underlay && host_config.underlay.is_none() {
        return Err(ReconcileError::UnderlayRemoved);
    }
    let Some(underlay) = &host_config.underlay else {
        // nothing is configured and nothing is declared
        return Ok(());
    };

    info!("configure interface start");

    host.ensure_ipv6_forwarding().await?;

    // the underlay first: every VNI hangs off its VTEP
    debug!("setting up underlay {}", underlay.name);
    if let Err(err) = host.setup_underlay(&underlay.params).await {
        reporter.report_resource_failure(ResourceKind::Underlay, &underlay.name, &err);
        return Err(err.into());
    }
    reporter.report_resource_success(ResourceKind::Underlay, &underlay.name);

    for vni in &host_config.l3vnis {
        debug!("setting up l3vni {} (vni {})", vni.name, vni.params.base.vni);
        if let Err(err) = host.setup_l3vni(&vni.params).await {
            reporter.report_resource_failure(ResourceKind::L3VNI, &vni.name, &err);
            return Err(err.into());
        }
        reporter.report_resource_success(ResourceKind::L3VNI, &vni.name);
    }

    for vni in &host_config.l2vnis {
        debug!("setting up l2vni {} (vni {})", vni.name, vni.params.base.vni);
        if let Err(err) = host.setup_l2vni(&vni.params).await {
            reporter.report_resource_failure(ResourceKind::L2VNI, &vni.name, &err);
            return Err(err.into());
        }
        reporter.report_resource_success(ResourceKind::L2VNI, &vni.name);
    }

    if let Some(passthrough) = &host_config.passthrough {
        debug!("setting up passthrough {}", passthrough.name);
        if let Err(err) = host.setup_passthrough(&passthrough.params).await {
            reporter.report_resource_failure(
                ResourceKind::L3Passthrough,
                &passthrough.name,
                &err,
            );
            return Err(err.into());
        }
        reporter.report_resource_success(ResourceKind::L3Passthrough, &passthrough.name);
    }

    debug!("removing deleted vnis");
    host.remove_stale_vnis(&host_config.desired_vnis()).await?;

    if host_config.passthrough.is_none() {
        host.remove_passthrough().await?;
    }

    info!("configure interface end");
    Ok(())
}

/// Drop status entries for resources that no longer exist in the desired
/// set, for every kind, so stale failures never outlive their resource.
/// Runs on every pass, in both provider modes.
pub fn sweep_removed_resources(
    api: &ApiConfig,
    reader: &dyn StatusReader,
    reporter: &dyn StatusReporter,
) {
    let present = |kind: ResourceKind, name: &str| -> bool {
        match kind {
            ResourceKind::Underlay => api.underlays.iter().any(|o| o.name_any() == name),
            ResourceKind::L3VNI => api.l3vnis.iter().any(|o| o.name_any() == name),
            ResourceKind::L2VNI => api.l2vnis.iter().any(|o| o.name_any() == name),
            ResourceKind::L3Passthrough => {
                api.passthroughs.iter().any(|o| o.name_any() == name)
            }
        }
    };

    for failed in reader.status_summary().failed_resources {
        if !present(failed.kind, &failed.name) {
            reporter.report_resource_removed(failed.kind, &failed.name);
        }
    }
}
