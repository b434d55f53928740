// SPDX-License-Identifier: Apache-2.0
// Copyright Krouter Authors

//! The host-level configuration model: everything the FRR renderer and
//! the host-network layer need, derived from the declared resources and
//! the node index.

use std::net::IpAddr;

use hostnet::{L2VniParams, L3VniParams, PassthroughParams, SessionAddrs, UnderlayParams};

/// The complete desired state for one node.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HostConfig {
    pub underlay: Option<UnderlayConfig>,
    pub l3vnis: Vec<L3VniConfig>,
    pub l2vnis: Vec<L2VniConfig>,
    pub passthrough: Option<PassthroughConfig>,
}

impl HostConfig {
    /// The VNI identities of every desired VNI, the input to the
    /// stale-object sweep.
    #[must_use]
    pub fn desired_vnis(&self) -> Vec<hostnet::VniParams> {
        self.l3vnis
            .iter()
            .map(|vni| vni.params.base.clone())
            .chain(self.l2vnis.iter().map(|vni| vni.params.base.clone()))
            .collect()
    }
}

/// The underlay, annotated with its BGP identity for FRR rendering.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnderlayConfig {
    /// Name of the declaring resource.
    pub name: String,
    pub asn: u32,
    pub neighbors: Vec<BgpNeighbor>,
    pub evpn: bool,
    pub params: UnderlayParams,
}

/// One fabric BGP neighbor with a parsed address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BgpNeighbor {
    pub asn: u32,
    pub address: IpAddr,
}

/// The BGP side of a host session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    pub asn: u32,
    pub host_asn: u32,
    pub addrs: Vec<SessionAddrs>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct L3VniConfig {
    pub name: String,
    pub params: L3VniParams,
    pub session: Option<SessionConfig>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct L2VniConfig {
    pub name: String,
    pub params: L2VniParams,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PassthroughConfig {
    pub name: String,
    pub params: PassthroughParams,
    pub session: SessionConfig,
}
