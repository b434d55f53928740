// SPDX-License-Identifier: Apache-2.0
// Copyright Krouter Authors

//! The status-reporting contract between the validation/apply pipeline
//! and the status aggregation machinery.

use std::fmt::Display;
use std::time::SystemTime;

/// The kinds of declared resources tracked in per-node status.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceKind {
    Underlay,
    L3VNI,
    L2VNI,
    L3Passthrough,
}

impl ResourceKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Underlay => "Underlay",
            ResourceKind::L3VNI => "L3VNI",
            ResourceKind::L2VNI => "L2VNI",
            ResourceKind::L3Passthrough => "L3Passthrough",
        }
    }
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sink for per-resource configuration outcomes.
///
/// Both validation and apply steps report here immediately, independent of
/// whether the surrounding pipeline then aborts: the report and the
/// returned error are two separate channels.
pub trait StatusReporter: Send + Sync {
    /// The resource was configured successfully.
    fn report_resource_success(&self, kind: ResourceKind, name: &str);

    /// Configuring the resource failed.
    fn report_resource_failure(&self, kind: ResourceKind, name: &str, err: &dyn Display);

    /// The resource disappeared from the desired set; any recorded
    /// failure for it must not linger.
    fn report_resource_removed(&self, kind: ResourceKind, name: &str);
}

/// Read access to the aggregated status.
pub trait StatusReader: Send + Sync {
    fn status_summary(&self) -> StatusSummary;
}

/// One failed resource, as aggregated in memory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FailedResourceInfo {
    pub kind: ResourceKind,
    pub name: String,
    pub message: String,
}

/// Aggregated snapshot of the in-memory status cache.
#[derive(Clone, Debug, Default)]
pub struct StatusSummary {
    pub failed_resources: Vec<FailedResourceInfo>,
    pub last_update_time: Option<SystemTime>,
}

/// Reporter that drops everything, for admission-time validation where no
/// per-node status exists.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopReporter;

impl StatusReporter for NoopReporter {
    fn report_resource_success(&self, _kind: ResourceKind, _name: &str) {}
    fn report_resource_failure(&self, _kind: ResourceKind, _name: &str, _err: &dyn Display) {}
    fn report_resource_removed(&self, _kind: ResourceKind, _name: &str) {}
}
