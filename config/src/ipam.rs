// SPDX-License-Identifier: Apache-2.0
// Copyright Krouter Authors

//! Stable per-node address allocation inside user-declared CIDRs.
//!
//! Every node gets the same answer on every pass: addresses are a pure
//! function of the CIDR and the node's dense index.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use ipnet::IpNet;

use crate::errors::ConfigError;

/// The node's VTEP address: the CIDR base plus the node index, as a host
/// address (/32 or /128).
pub fn vtep_ip(cidr: IpNet, index: u32) -> Result<IpNet, ConfigError> {
    let addr = offset_addr(cidr, u128::from(index))?;
    full_host(addr)
}

/// Point-to-point addressing of a host session for one node: the CIDR is
/// sliced into consecutive address pairs, pair `index` belongs to this
/// node.  The router side takes the first address of the pair, the host
/// side the second; both carry the pair's /31 (or /127) prefix.
pub fn session_addrs(cidr: IpNet, index: u32) -> Result<hostnet::SessionAddrs, ConfigError> {
    let router = offset_addr(cidr, u128::from(index) * 2)?;
    let host = offset_addr(cidr, u128::from(index) * 2 + 1)?;
    let pair_prefix = match cidr {
        IpNet::V4(_) => 31,
        IpNet::V6(_) => 127,
    };
    Ok(hostnet::SessionAddrs {
        router_side: IpNet::new(router, pair_prefix)
            .map_err(|e| ConfigError::Internal(e.to_string()))?,
        host_side: IpNet::new(host, pair_prefix)
            .map_err(|e| ConfigError::Internal(e.to_string()))?,
    })
}

/// The `offset`-th address of the CIDR, failing when it falls outside.
fn offset_addr(cidr: IpNet, offset: u128) -> Result<IpAddr, ConfigError> {
    let exhausted = || ConfigError::CidrExhausted {
        cidr: cidr.to_string(),
        index: u32::try_from(offset / 2).unwrap_or(u32::MAX),
    };
    let addr = match cidr.network() {
        IpAddr::V4(base) => {
            let offset = u32::try_from(offset).map_err(|_| exhausted())?;
            let raw = u32::from(base).checked_add(offset).ok_or_else(exhausted)?;
            IpAddr::V4(Ipv4Addr::from(raw))
        }
        IpAddr::V6(base) => {
            let raw = u128::from(base).checked_add(offset).ok_or_else(exhausted)?;
            IpAddr::V6(Ipv6Addr::from(raw))
        }
    };
    if !cidr.contains(&addr) {
        return Err(exhausted());
    }
    Ok(addr)
}

fn full_host(addr: IpAddr) -> Result<IpNet, ConfigError> {
    let prefix = match addr {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    };
    IpNet::new(addr, prefix).map_err(|e| ConfigError::Internal(e.to_string()))
}
