// SPDX-License-Identifier: Apache-2.0
// Copyright Krouter Authors

use std::net::IpAddr;

use ipnet::IpNet;
use kube::ResourceExt;

use k8s_intf::v1alpha1::Underlay;
use net::InterfaceName;

use crate::errors::{ConfigError, ConfigResult};
use crate::status::{ResourceKind, StatusReporter};

/// Validate the underlay set: at most one underlay, a sane ASN, neighbors
/// in a different AS with parseable addresses, a parseable VTEP CIDR and
/// at most one well-named NIC.
pub fn validate_underlays(
    underlays: &[Underlay],
    reporter: &dyn StatusReporter,
) -> ConfigResult {
    if underlays.len() > 1 {
        return Err(ConfigError::MoreThanOneUnderlay);
    }

    for underlay in underlays {
        let name = underlay.name_any();

        if underlay.spec.asn == 0 {
            let err = ConfigError::InvalidUnderlayAsn(name.clone());
            reporter.report_resource_failure(ResourceKind::Underlay, &name, &err);
            return Err(err);
        }

        for neighbor in &underlay.spec.neighbors {
            if underlay.spec.asn == neighbor.asn {
                let err = ConfigError::UnderlayAsnClash {
                    underlay: name.clone(),
                    asn: underlay.spec.asn,
                    remote: neighbor.asn,
                };
                reporter.report_resource_failure(ResourceKind::Underlay, &name, &err);
                return Err(err);
            }
            if neighbor.address.parse::<IpAddr>().is_err() {
                let err = ConfigError::InvalidNeighborAddress {
                    underlay: name.clone(),
                    address: neighbor.address.clone(),
                };
                reporter.report_resource_failure(ResourceKind::Underlay, &name, &err);
                return Err(err);
            }
        }

        if let Some(evpn) = &underlay.spec.evpn {
            if evpn.vtep_cidr.parse::<IpNet>().is_err() {
                let err = ConfigError::InvalidVtepCidr {
                    underlay: name.clone(),
                    cidr: evpn.vtep_cidr.clone(),
                };
                reporter.report_resource_failure(ResourceKind::Underlay, &name, &err);
                return Err(err);
            }
        }

        if underlay.spec.nics.len() > 1 {
            let err = ConfigError::TooManyNics(name.clone(), underlay.spec.nics.len());
            reporter.report_resource_failure(ResourceKind::Underlay, &name, &err);
            return Err(err);
        }

        for nic in &underlay.spec.nics {
            if let Err(err) = InterfaceName::try_from(nic.as_str()) {
                let err = ConfigError::InvalidNicName {
                    underlay: name.clone(),
                    err,
                };
                reporter.report_resource_failure(ResourceKind::Underlay, &name, &err);
                return Err(err);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::status::NoopReporter;
    use k8s_intf::v1alpha1::{EvpnConfig, Neighbor, UnderlaySpec};

    fn underlay(name: &str, spec: UnderlaySpec) -> Underlay {
        Underlay::new(name, spec)
    }

    fn valid_spec() -> UnderlaySpec {
        UnderlaySpec {
            asn: 64514,
            nics: vec!["toswitch".to_string()],
            neighbors: vec![Neighbor {
                asn: 64512,
                address: "192.168.11.2".to_string(),
            }],
            evpn: Some(EvpnConfig {
                vtep_cidr: "100.65.0.0/24".to_string(),
            }),
        }
    }

    struct Case {
        name: &'static str,
        underlays: Vec<Underlay>,
        want_err: bool,
    }

    #[test]
    fn validate_underlays_cases() {
        let cases = [
            Case {
                name: "empty set",
                underlays: vec![],
                want_err: false,
            },
            Case {
                name: "valid underlay",
                underlays: vec![underlay("under", valid_spec())],
                want_err: false,
            },
            Case {
                name: "two underlays",
                underlays: vec![underlay("a", valid_spec()), underlay("b", valid_spec())],
                want_err: true,
            },
            Case {
                name: "zero asn",
                underlays: vec![underlay(
                    "under",
                    UnderlaySpec {
                        asn: 0,
                        ..valid_spec()
                    },
                )],
                want_err: true,
            },
            Case {
                name: "neighbor in same as",
                underlays: vec![underlay(
                    "under",
                    UnderlaySpec {
                        neighbors: vec![Neighbor {
                            asn: 64514,
                            address: "192.168.11.2".to_string(),
                        }],
                        ..valid_spec()
                    },
                )],
                want_err: true,
            },
            Case {
                name: "unparseable neighbor address",
                underlays: vec![underlay(
                    "under",
                    UnderlaySpec {
                        neighbors: vec![Neighbor {
                            asn: 64512,
                            address: "not-an-ip".to_string(),
                        }],
                        ..valid_spec()
                    },
                )],
                want_err: true,
            },
            Case {
                name: "bad vtep cidr",
                underlays: vec![underlay(
                    "under",
                    UnderlaySpec {
                        evpn: Some(EvpnConfig {
                            vtep_cidr: "100.65.0.0/33".to_string(),
                        }),
                        ..valid_spec()
                    },
                )],
                want_err: true,
            },
            Case {
                name: "two nics",
                underlays: vec![underlay(
                    "under",
                    UnderlaySpec {
                        nics: vec!["eth0".to_string(), "eth1".to_string()],
                        ..valid_spec()
                    },
                )],
                want_err: true,
            },
            Case {
                name: "bad nic name",
                underlays: vec![underlay(
                    "under",
                    UnderlaySpec {
                        nics: vec![".hidden".to_string()],
                        ..valid_spec()
                    },
                )],
                want_err: true,
            },
        ];

        for case in cases {
            let got = validate_underlays(&case.underlays, &NoopReporter);
            assert_eq!(got.is_err(), case.want_err, "case {}: {got:?}", case.name);
        }
    }
}
