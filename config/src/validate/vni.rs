// SPDX-License-Identifier: Apache-2.0
// Copyright Krouter Authors

use std::collections::BTreeMap;

use ipnet::IpNet;
use kube::ResourceExt;

use k8s_intf::v1alpha1::{L2VNI, L3VNI};
use net::{InterfaceName, Vni};

use crate::errors::{ConfigError, ConfigResult};
use crate::status::{ResourceKind, StatusReporter};

/// VNI identity shared by both kinds.
struct VniEntry {
    name: String,
    vni: u32,
    vrf: String,
}

fn entries_from_l3(l3vnis: &[L3VNI]) -> Vec<VniEntry> {
    l3vnis
        .iter()
        .map(|vni| VniEntry {
            name: vni.name_any(),
            vni: vni.spec.vni,
            vrf: vni.vrf_name(),
        })
        .collect()
}

fn entries_from_l2(l2vnis: &[L2VNI]) -> Vec<VniEntry> {
    l2vnis
        .iter()
        .map(|vni| VniEntry {
            name: vni.name_any(),
            vni: vni.spec.vni,
            vrf: vni.vrf_name(),
        })
        .collect()
}

/// Validate the layer-3 VNIs: legal VNI values, well-formed VRF names, no
/// duplicate VRF or VNI within the set.
pub fn validate_l3vnis(l3vnis: &[L3VNI], reporter: &dyn StatusReporter) -> ConfigResult {
    validate_entries(
        &entries_from_l3(l3vnis),
        ResourceKind::L3VNI,
        reporter,
        &mut BTreeMap::new(),
    )
}

/// Validate the layer-2 VNIs.
///
/// VNI numbers share one namespace with the layer-3 VNIs (the `l3vnis`
/// set seeds the duplicate check), while a layer-2 VRF *equal* to a
/// layer-3 VRF is the link into that routing domain, not a clash.  A
/// declared VRF must name an existing layer-3 VRF; host-master names and
/// gateway addresses are checked here too.
pub fn validate_l2vnis(
    l2vnis: &[L2VNI],
    l3vnis: &[L3VNI],
    reporter: &dyn StatusReporter,
) -> ConfigResult {
    let mut seen_vnis: BTreeMap<u32, String> = l3vnis
        .iter()
        .map(|vni| (vni.spec.vni, vni.name_any()))
        .collect();

    validate_entries(
        &entries_from_l2(l2vnis),
        ResourceKind::L2VNI,
        reporter,
        &mut seen_vnis,
    )?;

    for vni in l2vnis {
        let name = vni.name_any();

        if let Some(vrf) = &vni.spec.vrf {
            if !l3vnis.iter().any(|l3| &l3.vrf_name() == vrf) {
                let err = ConfigError::NoSuchVrf {
                    name: name.clone(),
                    vrf: vrf.clone(),
                };
                reporter.report_resource_failure(ResourceKind::L2VNI, &name, &err);
                return Err(err);
            }
        }

        if let Some(master) = &vni.spec.host_master {
            if !master.name.is_empty() {
                if let Err(err) = InterfaceName::try_from(master.name.as_str()) {
                    let err = ConfigError::InvalidHostMasterName {
                        name: name.clone(),
                        master: master.name.clone(),
                        err,
                    };
                    reporter.report_resource_failure(ResourceKind::L2VNI, &name, &err);
                    return Err(err);
                }
            }
        }

        if let Err(reason) = check_gateway_ips(&vni.spec.l2_gateway_ips) {
            let err = ConfigError::InvalidGatewayIps {
                name: name.clone(),
                reason,
            };
            reporter.report_resource_failure(ResourceKind::L2VNI, &name, &err);
            return Err(err);
        }
    }
    Ok(())
}

/// Gateway addresses must parse as CIDRs, with at most one entry per
/// address family.
fn check_gateway_ips(gateways: &[String]) -> Result<(), String> {
    let mut have_v4 = false;
    let mut have_v6 = false;
    for gateway in gateways {
        let net: IpNet = gateway
            .parse()
            .map_err(|err| format!("invalid CIDR {gateway}: {err}"))?;
        let have = match net {
            IpNet::V4(_) => &mut have_v4,
            IpNet::V6(_) => &mut have_v6,
        };
        if *have {
            return Err(format!(
                "more than one gateway of the same family: {gateway}"
            ));
        }
        *have = true;
    }
    Ok(())
}

fn validate_entries(
    entries: &[VniEntry],
    kind: ResourceKind,
    reporter: &dyn StatusReporter,
    seen_vnis: &mut BTreeMap<u32, String>,
) -> ConfigResult {
    // map of VRF name to the instance declaring it, within this kind only
    let mut seen_vrfs: BTreeMap<&str, &str> = BTreeMap::new();

    for entry in entries {
        if let Err(err) = Vni::new(entry.vni) {
            let err = ConfigError::InvalidVniValue {
                name: entry.name.clone(),
                err,
            };
            reporter.report_resource_failure(kind, &entry.name, &err);
            return Err(err);
        }

        if let Err(err) = InterfaceName::try_from(entry.vrf.as_str()) {
            let err = ConfigError::InvalidVrfName {
                name: entry.name.clone(),
                err,
            };
            reporter.report_resource_failure(kind, &entry.name, &err);
            return Err(err);
        }

        if let Some(first) = seen_vrfs.get(entry.vrf.as_str()) {
            let err = ConfigError::DuplicateVrf {
                vrf: entry.vrf.clone(),
                first: (*first).to_string(),
                second: entry.name.clone(),
            };
            reporter.report_resource_failure(kind, &entry.name, &err);
            return Err(err);
        }
        seen_vrfs.insert(&entry.vrf, &entry.name);

        if let Some(first) = seen_vnis.get(&entry.vni) {
            let err = ConfigError::DuplicateVni {
                vni: entry.vni,
                first: first.clone(),
                second: entry.name.clone(),
            };
            reporter.report_resource_failure(kind, &entry.name, &err);
            return Err(err);
        }
        seen_vnis.insert(entry.vni, entry.name.clone());
    }
    Ok(())
}
