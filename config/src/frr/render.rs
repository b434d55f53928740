// SPDX-License-Identifier: Apache-2.0
// Copyright Krouter Authors

//! Renderers for the host configuration: one BGP instance for the
//! underlay, a VRF plus BGP-VRF instance per layer-3 VNI, and a
//! default-VRF session block for the passthrough.  Layer-2 VNIs need no
//! FRR stanza of their own: `advertise-all-vni` picks their devices up.

use crate::frr::builder::{ConfigBuilder, MARKER, Render};
use crate::hostcfg::{HostConfig, L3VniConfig, PassthroughConfig, SessionConfig, UnderlayConfig};

/// Render the complete FRR configuration for one node.
#[must_use]
pub fn render_frr_config(cfg: &HostConfig) -> String {
    let mut out = ConfigBuilder::new();
    out += "frr defaults datacenter";
    out += MARKER;

    if let Some(underlay) = &cfg.underlay {
        out += underlay.render(&());
        out += MARKER;
    }

    let underlay_asn = cfg.underlay.as_ref().map(|u| u.asn);
    for vni in &cfg.l3vnis {
        out += vni.render(&underlay_asn);
        out += MARKER;
    }

    if let Some(passthrough) = &cfg.passthrough {
        out += passthrough.render(&());
        out += MARKER;
    }

    out.to_string()
}

impl Render for UnderlayConfig {
    type Context = ();
    type Output = ConfigBuilder;

    fn render(&self, (): &Self::Context) -> Self::Output {
        let mut cfg = ConfigBuilder::new();
        cfg += format!("router bgp {}", self.asn);
        cfg += " no bgp ebgp-requires-policy";
        cfg += " no bgp default ipv4-unicast";

        if let Some(vtep) = self.params.vtep_ip {
            cfg += format!(" bgp router-id {}", vtep.addr());
        }

        for neighbor in &self.neighbors {
            cfg += format!(" neighbor {} remote-as {}", neighbor.address, neighbor.asn);
        }

        cfg += " address-family ipv4 unicast";
        for neighbor in &self.neighbors {
            cfg += format!("  neighbor {} activate", neighbor.address);
        }
        if let Some(vtep) = self.params.vtep_ip {
            cfg += format!("  network {vtep}");
        }
        cfg += " exit-address-family";

        if self.evpn {
            cfg += " address-family l2vpn evpn";
            for neighbor in &self.neighbors {
                cfg += format!("  neighbor {} activate", neighbor.address);
            }
            cfg += "  advertise-all-vni";
            cfg += "  advertise-svi-ip";
            cfg += " exit-address-family";
        }
        cfg += "exit";
        cfg
    }
}

impl Render for L3VniConfig {
    /// The underlay's ASN; a declared host session overrides it.
    type Context = Option<u32>;
    type Output = ConfigBuilder;

    fn render(&self, underlay_asn: &Self::Context) -> Self::Output {
        let mut cfg = ConfigBuilder::new();
        let vrf = &self.params.base.vrf;

        cfg += format!("vrf {vrf}");
        cfg += format!(" vni {}", self.params.base.vni);
        cfg += "exit-vrf";

        let asn = self.session.as_ref().map(|s| s.asn).or(*underlay_asn);
        let Some(asn) = asn else {
            return cfg;
        };

        cfg += format!("router bgp {asn} vrf {vrf}");
        if let Some(session) = &self.session {
            cfg += session.render(&());
        } else {
            cfg += " address-family ipv4 unicast";
            cfg += "  redistribute connected";
            cfg += " exit-address-family";
        }
        cfg += " address-family l2vpn evpn";
        cfg += "  advertise ipv4 unicast";
        cfg += "  advertise ipv6 unicast";
        cfg += " exit-address-family";
        cfg += "exit";
        cfg
    }
}

impl Render for SessionConfig {
    type Context = ();
    type Output = ConfigBuilder;

    /// The session's neighbor statements and per-family activations,
    /// valid inside any `router bgp` block.
    fn render(&self, (): &Self::Context) -> Self::Output {
        let mut cfg = ConfigBuilder::new();
        for addrs in &self.addrs {
            cfg += format!(
                " neighbor {} remote-as {}",
                addrs.host_side.addr(),
                self.host_asn
            );
        }
        cfg += " address-family ipv4 unicast";
        cfg += "  redistribute connected";
        for addrs in self.addrs.iter().filter(|a| a.host_side.addr().is_ipv4()) {
            cfg += format!("  neighbor {} activate", addrs.host_side.addr());
        }
        cfg += " exit-address-family";

        let v6: Vec<_> = self
            .addrs
            .iter()
            .filter(|a| a.host_side.addr().is_ipv6())
            .collect();
        if !v6.is_empty() {
            cfg += " address-family ipv6 unicast";
            cfg += "  redistribute connected";
            for addrs in v6 {
                cfg += format!("  neighbor {} activate", addrs.host_side.addr());
            }
            cfg += " exit-address-family";
        }
        cfg
    }
}

impl Render for PassthroughConfig {
    type Context = ();
    type Output = ConfigBuilder;

    /// Passthrough sessions live in the default VRF next to the fabric
    /// sessions: the block re-opens the main BGP instance.
    fn render(&self, (): &Self::Context) -> Self::Output {
        let mut cfg = ConfigBuilder::new();
        cfg += format!("router bgp {}", self.session.asn);
        cfg += self.session.render(&());
        cfg += "exit";
        cfg
    }
}
