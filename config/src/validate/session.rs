// SPDX-License-Identifier: Apache-2.0
// Copyright Krouter Authors

use std::collections::BTreeMap;

use ipnet::IpNet;
use kube::ResourceExt;

use k8s_intf::v1alpha1::{HostSession, L3Passthrough, L3VNI};

use crate::errors::{ConfigError, ConfigResult};
use crate::status::{ResourceKind, StatusReporter};
use crate::validate::cidrs_overlap;

/// A host session together with the resource that declared it.
struct SessionInfo<'a> {
    session: &'a HostSession,
    kind: ResourceKind,
    name: String,
}

impl SessionInfo<'_> {
    /// Human-readable identity used in error messages: "L3VNI red".
    fn label(&self) -> String {
        format!("{} {}", self.kind, self.name)
    }
}

/// Validate every host session in the cluster: distinct local/host ASNs,
/// at least one local CIDR, parseable CIDRs and, across *all* sessions,
/// no same-family CIDR overlap.
///
/// The overlap check is pairwise over the whole cluster's sessions.  That
/// is quadratic in session count, which is bounded by node/VNI counts and
/// stays trivially small in practice.
pub fn validate_host_sessions(
    l3vnis: &[L3VNI],
    passthroughs: &[L3Passthrough],
    reporter: &dyn StatusReporter,
) -> ConfigResult {
    let mut sessions: Vec<SessionInfo> = Vec::new();
    for vni in l3vnis {
        if let Some(session) = &vni.spec.host_session {
            sessions.push(SessionInfo {
                session,
                kind: ResourceKind::L3VNI,
                name: vni.name_any(),
            });
        }
    }
    for passthrough in passthroughs {
        sessions.push(SessionInfo {
            session: &passthrough.spec.host_session,
            kind: ResourceKind::L3Passthrough,
            name: passthrough.name_any(),
        });
    }

    // per-family maps from accepted CIDR to the session that claimed it
    let mut seen_v4: BTreeMap<IpNet, String> = BTreeMap::new();
    let mut seen_v6: BTreeMap<IpNet, String> = BTreeMap::new();

    for info in &sessions {
        if info.session.asn == info.session.host_asn {
            let err = ConfigError::SessionAsnClash {
                session: info.label(),
                asn: info.session.host_asn,
                remote: info.session.asn,
            };
            reporter.report_resource_failure(info.kind, &info.name, &err);
            return Err(err);
        }

        let cidrs = [
            (info.session.local_cidr.ipv4.as_deref(), &mut seen_v4),
            (info.session.local_cidr.ipv6.as_deref(), &mut seen_v6),
        ];
        let mut have_any = false;
        for (cidr, seen) in cidrs {
            let Some(cidr) = cidr else {
                continue;
            };
            have_any = true;
            let net = check_cidr(info, cidr, seen, reporter)?;
            seen.insert(net, info.label());
        }

        if !have_any {
            let err = ConfigError::MissingLocalCidr(info.label());
            reporter.report_resource_failure(info.kind, &info.name, &err);
            return Err(err);
        }
    }
    Ok(())
}

/// Parse one CIDR and check it against every CIDR of the same family
/// already accepted.
fn check_cidr(
    info: &SessionInfo,
    cidr: &str,
    seen: &BTreeMap<IpNet, String>,
    reporter: &dyn StatusReporter,
) -> Result<IpNet, ConfigError> {
    let net: IpNet = match cidr.parse() {
        Ok(net) => net,
        Err(_) => {
            let err = ConfigError::InvalidSessionCidr {
                session: info.label(),
                cidr: cidr.to_string(),
            };
            reporter.report_resource_failure(info.kind, &info.name, &err);
            return Err(err);
        }
    };
    for (existing, owner) in seen {
        if cidrs_overlap(existing, &net) {
            let err = ConfigError::OverlappingCidrs {
                first_cidr: existing.to_string(),
                second_cidr: cidr.to_string(),
                first: owner.clone(),
                second: info.label(),
            };
            reporter.report_resource_failure(info.kind, &info.name, &err);
            return Err(err);
        }
    }
    Ok(net)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::status::NoopReporter;
    use k8s_intf::v1alpha1::{L3PassthroughSpec, L3VNISpec, LocalCidr};

    fn l3vni_with_session(name: &str, vni: u32, session: HostSession) -> L3VNI {
        L3VNI::new(
            name,
            L3VNISpec {
                vrf: None,
                vni,
                host_session: Some(session),
            },
        )
    }

    fn session(asn: u32, host_asn: u32, ipv4: Option<&str>, ipv6: Option<&str>) -> HostSession {
        HostSession {
            asn,
            host_asn,
            local_cidr: LocalCidr {
                ipv4: ipv4.map(ToString::to_string),
                ipv6: ipv6.map(ToString::to_string),
            },
        }
    }

    #[test]
    fn valid_sessions_all_families() {
        let vnis = [
            l3vni_with_session("vni1", 100, session(65001, 65002, Some("192.168.1.0/24"), None)),
            l3vni_with_session(
                "vni2",
                101,
                session(65003, 65004, Some("192.168.2.0/24"), Some("2001:db8::/64")),
            ),
        ];
        validate_host_sessions(&vnis, &[], &NoopReporter).expect("valid sessions");
    }

    #[test]
    fn equal_asns_are_rejected() {
        let vnis = [l3vni_with_session(
            "vni1",
            100,
            session(64514, 64514, Some("192.168.1.0/24"), None),
        )];
        let err = validate_host_sessions(&vnis, &[], &NoopReporter).expect_err("equal asns");
        assert!(
            err.to_string().contains("must be different from remote ASN"),
            "{err}"
        );
    }

    #[test]
    fn missing_cidr_is_rejected() {
        let vnis = [l3vni_with_session("vni1", 100, session(65001, 65002, None, None))];
        let err = validate_host_sessions(&vnis, &[], &NoopReporter).expect_err("no cidr");
        assert!(matches!(err, ConfigError::MissingLocalCidr(_)), "{err}");
    }

    #[test]
    fn same_family_overlap_is_rejected() {
        let vnis = [
            l3vni_with_session("vni1", 100, session(65001, 65002, Some("192.168.1.0/24"), None)),
            l3vni_with_session("vni2", 101, session(65003, 65004, Some("192.168.1.128/25"), None)),
        ];
        let err = validate_host_sessions(&vnis, &[], &NoopReporter).expect_err("overlap");
        assert!(matches!(err, ConfigError::OverlappingCidrs { .. }), "{err}");
    }

    #[test]
    fn different_family_never_overlaps() {
        let vnis = [
            l3vni_with_session("vni1", 100, session(65001, 65002, Some("192.168.1.0/24"), None)),
            l3vni_with_session("vni2", 101, session(65003, 65004, None, Some("2001:db8::/64"))),
        ];
        validate_host_sessions(&vnis, &[], &NoopReporter).expect("no cross-family overlap");
    }

    #[test]
    fn passthrough_sessions_share_the_overlap_space() {
        let vnis = [l3vni_with_session(
            "vni1",
            100,
            session(65001, 65002, Some("192.168.1.0/24"), None),
        )];
        let passthroughs = [L3Passthrough::new(
            "pt",
            L3PassthroughSpec {
                host_session: session(65005, 65006, Some("192.168.1.0/26"), None),
            },
        )];
        let err = validate_host_sessions(&vnis, &passthroughs, &NoopReporter)
            .expect_err("passthrough overlaps vni session");
        assert!(matches!(err, ConfigError::OverlappingCidrs { .. }), "{err}");
    }

    #[test]
    fn identical_cidrs_overlap() {
        let vnis = [
            l3vni_with_session("vni1", 100, session(65001, 65002, Some("192.168.1.0/24"), None)),
            l3vni_with_session("vni2", 101, session(65003, 65004, Some("192.168.1.0/24"), None)),
        ];
        assert!(validate_host_sessions(&vnis, &[], &NoopReporter).is_err());
    }
}
