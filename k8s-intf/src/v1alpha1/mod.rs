// SPDX-License-Identifier: Apache-2.0
// Copyright Krouter Authors

//! The `krouter.io/v1alpha1` API group.

pub mod l2vni;
pub mod l3vni;
pub mod passthrough;
pub mod session;
pub mod status;
pub mod underlay;

pub use l2vni::{HostMaster, HostMasterKind, L2VNI, L2VNISpec};
pub use l3vni::{L3VNI, L3VNISpec};
pub use passthrough::{L3Passthrough, L3PassthroughSpec};
pub use session::{HostSession, LocalCidr};
pub use status::{
    FailedResource, RouterNodeConfigurationStatus, RouterNodeConfigurationStatusSpec,
    RouterNodeConfigurationStatusStatus,
};
pub use underlay::{EvpnConfig, Neighbor, Underlay, UnderlaySpec};

use kube::CustomResourceExt;

/// Render the CRD manifests for the whole API group as a multi-document
/// YAML stream.
///
/// # Errors
///
/// Returns an error if any CRD fails to serialize.
pub fn crds_yaml() -> Result<String, serde_yaml_ng::Error> {
    let crds = [
        underlay::Underlay::crd(),
        l3vni::L3VNI::crd(),
        l2vni::L2VNI::crd(),
        passthrough::L3Passthrough::crd(),
        status::RouterNodeConfigurationStatus::crd(),
    ];
    let mut out = String::new();
    for crd in crds {
        out.push_str("---\n");
        out.push_str(&serde_yaml_ng::to_string(&crd)?);
    }
    Ok(out)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn crd_manifests_render() {
        let yaml = crds_yaml().expect("failed to render CRDs");
        for kind in [
            "underlays.krouter.io",
            "l3vnis.krouter.io",
            "l2vnis.krouter.io",
            "l3passthroughs.krouter.io",
            "routernodeconfigurationstatuses.krouter.io",
        ] {
            assert!(yaml.contains(kind), "missing CRD for {kind}");
        }
    }
}
