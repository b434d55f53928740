// SPDX-License-Identifier: Apache-2.0
// Copyright Krouter Authors

//! Cross-resource validation of the declared API objects.
//!
//! Validation is global: every function takes the whole candidate set and
//! returns on the first violation, after reporting it against the
//! offending resource.  The admission helpers at the bottom run the same
//! checks against the union of the existing objects and an incoming one,
//! so webhooks reject bad objects before they ever reach the store.

mod session;
mod underlay;
mod vni;

pub use session::validate_host_sessions;
pub use underlay::validate_underlays;
pub use vni::{validate_l2vnis, validate_l3vnis};

use ipnet::IpNet;
use kube::Resource;
use kube::ResourceExt;

use k8s_intf::v1alpha1::{L2VNI, L3Passthrough, L3VNI, Underlay};

use crate::errors::{ConfigError, ConfigResult};
use crate::status::NoopReporter;

/// Two CIDRs overlap iff either network address falls inside the other.
pub(crate) fn cidrs_overlap(first: &IpNet, second: &IpNet) -> bool {
    first.contains(&second.network()) || second.contains(&first.network())
}

/// Replace the object with the same name/namespace, or append.
fn upsert<T>(existing: &[T], incoming: &T) -> Vec<T>
where
    T: Resource<DynamicType = ()> + Clone,
{
    let mut out: Vec<T> = existing
        .iter()
        .filter(|o| o.name_any() != incoming.name_any() || o.namespace() != incoming.namespace())
        .cloned()
        .collect();
    out.push(incoming.clone());
    out
}

/// Admission-time validation of an incoming `Underlay` against the
/// existing set.
pub fn validate_underlay_admission(existing: &[Underlay], incoming: &Underlay) -> ConfigResult {
    validate_underlays(&upsert(existing, incoming), &NoopReporter)
}

/// Admission-time validation of an incoming `L3VNI` against the existing
/// sets.
pub fn validate_l3vni_admission(
    existing: &[L3VNI],
    passthroughs: &[L3Passthrough],
    incoming: &L3VNI,
) -> ConfigResult {
    let candidate = upsert(existing, incoming);
    validate_l3vnis(&candidate, &NoopReporter)?;
    validate_host_sessions(&candidate, passthroughs, &NoopReporter)
}

/// Admission-time validation of an incoming `L2VNI` against the existing
/// sets.
pub fn validate_l2vni_admission(
    existing: &[L2VNI],
    l3vnis: &[L3VNI],
    incoming: &L2VNI,
) -> ConfigResult {
    validate_l2vnis(&upsert(existing, incoming), l3vnis, &NoopReporter)
}

/// Admission-time validation of an incoming `L3Passthrough` against the
/// existing sets.
pub fn validate_passthrough_admission(
    existing: &[L3Passthrough],
    l3vnis: &[L3VNI],
    incoming: &L3Passthrough,
) -> ConfigResult {
    let candidate = upsert(existing, incoming);
    if candidate.len() > 1 {
        return Err(ConfigError::MoreThanOnePassthrough);
    }
    validate_host_sessions(l3vnis, &candidate, &NoopReporter)
}

#[cfg(test)]
mod test {
    use super::*;
    use k8s_intf::v1alpha1::{HostSession, L3VNISpec, LocalCidr};

    fn l3vni(name: &str, vni: u32, vrf: &str) -> L3VNI {
        let mut obj = L3VNI::new(
            name,
            L3VNISpec {
                vrf: Some(vrf.to_string()),
                vni,
                host_session: None,
            },
        );
        obj.meta_mut().namespace = Some("default".to_string());
        obj
    }

    #[test]
    fn overlap_is_symmetric_containment() {
        let cases = [
            ("10.0.0.0/24", "10.0.0.128/25", true),
            ("10.0.0.128/25", "10.0.0.0/24", true),
            ("10.0.0.0/24", "10.0.1.0/24", false),
            ("0.0.0.0/0", "192.168.1.0/24", true),
            ("2001:db8::/64", "2001:db8::/120", true),
            ("2001:db8::/64", "2001:db9::/64", false),
        ];
        for (first, second, want) in cases {
            let first: IpNet = first.parse().expect("bad cidr in test");
            let second: IpNet = second.parse().expect("bad cidr in test");
            assert_eq!(
                cidrs_overlap(&first, &second),
                want,
                "{first} vs {second}"
            );
        }
    }

    #[test]
    fn admission_accepts_replacement_of_same_object() {
        let existing = vec![l3vni("red", 100, "red")];
        // same name, updated vni: the union replaces, it does not duplicate
        let incoming = l3vni("red", 101, "red");
        validate_l3vni_admission(&existing, &[], &incoming).expect("replacement must be valid");
    }

    #[test]
    fn admission_rejects_duplicate_vni() {
        let existing = vec![l3vni("red", 100, "red")];
        let incoming = l3vni("blue", 100, "blue");
        let err = validate_l3vni_admission(&existing, &[], &incoming)
            .expect_err("duplicate vni must be rejected");
        assert!(matches!(err, ConfigError::DuplicateVni { vni: 100, .. }));
    }

    #[test]
    fn admission_rejects_second_passthrough() {
        let first = L3Passthrough::new(
            "pt-a",
            k8s_intf::v1alpha1::L3PassthroughSpec {
                host_session: HostSession {
                    asn: 65001,
                    host_asn: 65002,
                    local_cidr: LocalCidr {
                        ipv4: Some("192.168.1.0/24".to_string()),
                        ipv6: None,
                    },
                },
            },
        );
        let mut second = first.clone();
        second.meta_mut().name = Some("pt-b".to_string());
        second.spec.host_session.local_cidr.ipv4 = Some("192.168.2.0/24".to_string());
        let err = validate_passthrough_admission(std::slice::from_ref(&first), &[], &second)
            .expect_err("second passthrough must be rejected");
        assert!(matches!(err, ConfigError::MoreThanOnePassthrough));
    }
}
