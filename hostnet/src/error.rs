// SPDX-License-Identifier: Apache-2.0
// Copyright Krouter Authors

use net::Vni;

/// Errors from host-network operations.
///
/// [`HostError::UnderlayExists`] is a distinguished marker: it signals a
/// conflict that cannot be fixed by re-applying configuration, and the
/// caller is expected to tear the data-plane target down and start over.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("underlay already exists with conflicting parameters: {0}")]
    UnderlayExists(String),

    #[error("device {0} not found in target namespace")]
    DeviceNotFound(String),

    #[error("host master bridge {0} does not exist and autocreate is disabled")]
    HostMasterMissing(String),

    #[error("OVS host master {0} requires the OVS integration")]
    OvsUnsupported(String),

    #[error("layer-2 vni {0} declares a vrf but no vrf device exists for it")]
    MissingVrfDevice(Vni),

    #[error("failed to enter namespace {ns}: {err}")]
    Namespace { ns: String, err: std::io::Error },

    #[error("netlink error: {0}")]
    Netlink(#[from] rtnetlink::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl HostError {
    /// Whether this error is the "underlay exists with conflicting
    /// parameters" marker consumed by the non-recoverable-error
    /// classifier.
    #[must_use]
    pub fn is_underlay_exists(&self) -> bool {
        matches!(self, HostError::UnderlayExists(_))
    }
}
