// SPDX-License-Identifier: Apache-2.0
// Copyright Krouter Authors

//! Conversion of the validated resource set into the per-node host
//! configuration.
//!
//! The conversion is pure and deterministic.  Anything that fails here
//! was supposed to be ruled out by validation, so failures surface as
//! [`ConfigError::Internal`] rather than per-resource status entries.

use ipnet::IpNet;
use kube::ResourceExt;
use tracing::debug;

use hostnet::{
    HostMasterParams, L2VniParams, L3VniParams, PassthroughParams, SessionAddrs, UnderlayParams,
    VniParams,
};
use k8s_intf::v1alpha1::{HostMasterKind, HostSession, L2VNI, L3VNI, Underlay};
use net::{InterfaceName, Vni};

use crate::apicfg::ApiConfig;
use crate::errors::ConfigError;
use crate::hostcfg::{
    BgpNeighbor, HostConfig, L2VniConfig, L3VniConfig, PassthroughConfig, SessionConfig,
    UnderlayConfig,
};
use crate::ipam;

/// Map the declared resources to the node's host configuration.
pub fn api_to_host_config(api: &ApiConfig) -> Result<HostConfig, ConfigError> {
    debug!(
        "converting api config for node index {}: {} l3vnis, {} l2vnis",
        api.node_index,
        api.l3vnis.len(),
        api.l2vnis.len()
    );

    let underlay = match api.underlays.first() {
        Some(underlay) => Some(convert_underlay(underlay, api.node_index)?),
        None => None,
    };
    // the VNIs inherit the node's VTEP as their local address
    let vtep = underlay
        .as_ref()
        .and_then(|u| u.params.vtep_ip)
        .map(|net| net.addr());

    let l3vnis = api
        .l3vnis
        .iter()
        .map(|vni| convert_l3vni(vni, api.node_index, vtep))
        .collect::<Result<Vec<_>, _>>()?;

    let l2vnis = api
        .l2vnis
        .iter()
        .map(|vni| convert_l2vni(vni, &api.l3vnis, vtep))
        .collect::<Result<Vec<_>, _>>()?;

    let passthrough = match api.passthroughs.first() {
        Some(passthrough) => {
            let session =
                convert_session(&passthrough.spec.host_session, api.node_index, "passthrough")?;
            Some(PassthroughConfig {
                name: passthrough.name_any(),
                params: PassthroughParams {
                    sessions: session.addrs.clone(),
                },
                session,
            })
        }
        None => None,
    };

    Ok(HostConfig {
        underlay,
        l3vnis,
        l2vnis,
        passthrough,
    })
}

fn internal(what: &str, detail: impl std::fmt::Display) -> ConfigError {
    ConfigError::Internal(format!("{what}: {detail}"))
}

fn convert_underlay(underlay: &Underlay, node_index: u32) -> Result<UnderlayConfig, ConfigError> {
    let name = underlay.name_any();

    let nic = underlay
        .spec
        .nics
        .first()
        .map(|nic| InterfaceName::try_from(nic.as_str()))
        .transpose()
        .map_err(|e| internal("unvalidated nic name", e))?;

    let vtep_ip = underlay
        .spec
        .evpn
        .as_ref()
        .map(|evpn| {
            let cidr: IpNet = evpn
                .vtep_cidr
                .parse()
                .map_err(|e| internal("unvalidated vtep cidr", e))?;
            ipam::vtep_ip(cidr, node_index)
        })
        .transpose()?;

    let neighbors = underlay
        .spec
        .neighbors
        .iter()
        .map(|neighbor| {
            Ok(BgpNeighbor {
                asn: neighbor.asn,
                address: neighbor
                    .address
                    .parse()
                    .map_err(|e| internal("unvalidated neighbor address", e))?,
            })
        })
        .collect::<Result<Vec<_>, ConfigError>>()?;

    Ok(UnderlayConfig {
        name,
        asn: underlay.spec.asn,
        neighbors,
        evpn: underlay.spec.evpn.is_some(),
        params: UnderlayParams { nic, vtep_ip },
    })
}

fn convert_session(
    session: &HostSession,
    node_index: u32,
    owner: &str,
) -> Result<SessionConfig, ConfigError> {
    let mut addrs: Vec<SessionAddrs> = Vec::new();
    for cidr in [&session.local_cidr.ipv4, &session.local_cidr.ipv6]
        .into_iter()
        .flatten()
    {
        let cidr: IpNet = cidr
            .parse()
            .map_err(|e| internal(&format!("unvalidated session cidr for {owner}"), e))?;
        addrs.push(ipam::session_addrs(cidr, node_index)?);
    }
    Ok(SessionConfig {
        asn: session.asn,
        host_asn: session.host_asn,
        addrs,
    })
}

fn convert_l3vni(
    vni: &L3VNI,
    node_index: u32,
    vtep: Option<std::net::IpAddr>,
) -> Result<L3VniConfig, ConfigError> {
    let name = vni.name_any();
    let vrf = InterfaceName::try_from(vni.vrf_name())
        .map_err(|e| internal("unvalidated vrf name", e))?;
    let number = Vni::new(vni.spec.vni).map_err(|e| internal("unvalidated vni value", e))?;

    let session = vni
        .spec
        .host_session
        .as_ref()
        .map(|session| convert_session(session, node_index, &name))
        .transpose()?;

    let sessions = session
        .as_ref()
        .map(|s| s.addrs.clone())
        .unwrap_or_default();

    Ok(L3VniConfig {
        name,
        params: L3VniParams {
            base: VniParams {
                vrf,
                vni: number,
                vtep_ip: vtep,
            },
            sessions,
        },
        session,
    })
}

fn convert_l2vni(
    vni: &L2VNI,
    l3vnis: &[L3VNI],
    vtep: Option<std::net::IpAddr>,
) -> Result<L2VniConfig, ConfigError> {
    let name = vni.name_any();
    let vrf = InterfaceName::try_from(vni.vrf_name())
        .map_err(|e| internal("unvalidated vrf name", e))?;
    let number = Vni::new(vni.spec.vni).map_err(|e| internal("unvalidated vni value", e))?;

    // a declared vrf links the segment into an L3VNI's routing domain;
    // validation guaranteed the domain exists
    let has_vrf = match &vni.spec.vrf {
        Some(declared) => {
            if !l3vnis.iter().any(|l3| &l3.vrf_name() == declared) {
                return Err(internal("l2vni references unknown vrf", declared));
            }
            true
        }
        None => false,
    };

    let host_master = vni
        .spec
        .host_master
        .as_ref()
        .filter(|master| !master.name.is_empty())
        .map(|master| {
            Ok(HostMasterParams {
                name: InterfaceName::try_from(master.name.as_str())
                    .map_err(|e| internal("unvalidated host master name", e))?,
                auto_create: master.auto_create,
                ovs: master.kind == HostMasterKind::Ovs,
            })
        })
        .transpose()?;

    let gateway_ips = vni
        .spec
        .l2_gateway_ips
        .iter()
        .map(|gateway| {
            gateway
                .parse::<IpNet>()
                .map_err(|e| internal("unvalidated gateway ip", e))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(L2VniConfig {
        name,
        params: L2VniParams {
            base: VniParams {
                vrf,
                vni: number,
                vtep_ip: vtep,
            },
            has_vrf,
            host_master,
            gateway_ips,
        },
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod test {
    use super::*;
    use crate::status::NoopReporter;
    use crate::validate::{validate_l2vnis, validate_l3vnis, validate_underlays};
    use k8s_intf::v1alpha1::{
        EvpnConfig, L2VNISpec, L3VNISpec, LocalCidr, Neighbor, UnderlaySpec,
    };
    use pretty_assertions::assert_eq;
    use std::collections::BTreeSet;

    fn api_fixture() -> ApiConfig {
        let underlay = Underlay::new(
            "under",
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
            },
        );
        let red = L3VNI::new(
            "red",
            L3VNISpec {
                vrf: None,
                vni: 100,
                host_session: Some(HostSession {
                    asn: 64514,
                    host_asn: 64515,
                    local_cidr: LocalCidr {
                        ipv4: Some("192.169.10.0/24".to_string()),
                        ipv6: None,
                    },
                }),
            },
        );
        let blue = L3VNI::new(
            "blue",
            L3VNISpec {
                vrf: Some("blue-vrf".to_string()),
                vni: 101,
                host_session: None,
            },
        );
        let segment = L2VNI::new(
            "segment",
            L2VNISpec {
                vrf: Some("red".to_string()),
                vni: 110,
                host_master: None,
                l2_gateway_ips: vec!["192.168.50.1/24".to_string()],
            },
        );
        ApiConfig {
            node_index: 2,
            underlays: vec![underlay],
            l3vnis: vec![red, blue],
            l2vnis: vec![segment],
            passthroughs: vec![],
        }
    }

    #[test]
    fn round_trip_one_descriptor_per_vni() {
        let api = api_fixture();
        validate_underlays(&api.underlays, &NoopReporter).unwrap();
        validate_l3vnis(&api.l3vnis, &NoopReporter).unwrap();
        validate_l2vnis(&api.l2vnis, &api.l3vnis, &NoopReporter).unwrap();

        let host = api_to_host_config(&api).unwrap();

        let declared: BTreeSet<u32> = api
            .l3vnis
            .iter()
            .map(|v| v.spec.vni)
            .chain(api.l2vnis.iter().map(|v| v.spec.vni))
            .collect();
        let produced: BTreeSet<u32> = host
            .desired_vnis()
            .iter()
            .map(|p| p.vni.as_u32())
            .collect();
        assert_eq!(declared, produced, "exactly one descriptor per vni");
        assert_eq!(host.desired_vnis().len(), declared.len(), "no duplicates");
    }

    #[test]
    fn vtep_ip_follows_the_node_index() {
        let host = api_to_host_config(&api_fixture()).unwrap();
        let underlay = host.underlay.unwrap();
        assert_eq!(
            underlay.params.vtep_ip.unwrap().to_string(),
            "100.65.0.2/32"
        );
        assert_eq!(underlay.asn, 64514);
        assert_eq!(underlay.params.nic.unwrap().as_ref(), "toswitch");
    }

    #[test]
    fn session_addresses_follow_the_node_index() {
        let host = api_to_host_config(&api_fixture()).unwrap();
        let red = host
            .l3vnis
            .iter()
            .find(|vni| vni.name == "red")
            .unwrap();
        let session = red.session.as_ref().unwrap();
        assert_eq!(session.addrs.len(), 1);
        assert_eq!(session.addrs[0].router_side.to_string(), "192.169.10.4/31");
        assert_eq!(session.addrs[0].host_side.to_string(), "192.169.10.5/31");
        assert_eq!(red.params.sessions, session.addrs);
    }

    #[test]
    fn l2vni_links_to_declared_vrf() {
        let host = api_to_host_config(&api_fixture()).unwrap();
        let segment = &host.l2vnis[0];
        assert!(segment.params.has_vrf);
        assert_eq!(segment.params.base.vrf.as_ref(), "red");
        assert_eq!(segment.params.gateway_ips[0].to_string(), "192.168.50.1/24");
        assert_eq!(
            segment.params.base.vtep_ip.unwrap().to_string(),
            "100.65.0.2",
            "vnis inherit the node vtep as their local address"
        );
    }

    #[test]
    fn no_underlay_converts_to_none() {
        let api = ApiConfig {
            underlays: vec![],
            ..api_fixture()
        };
        let host = api_to_host_config(&api).unwrap();
        assert!(host.underlay.is_none());
    }

    #[test]
    fn dangling_l2_vrf_is_an_internal_error() {
        let mut api = api_fixture();
        api.l2vnis[0].spec.vrf = Some("missing".to_string());
        let err = api_to_host_config(&api).unwrap_err();
        assert!(matches!(err, ConfigError::Internal(_)), "{err}");
    }
}
