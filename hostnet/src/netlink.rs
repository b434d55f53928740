// SPDX-License-Identifier: Apache-2.0
// Copyright Krouter Authors

//! rtnetlink-backed implementation of [`HostNetwork`].
//!
//! All mutating operations run against netlink sockets opened inside the
//! target namespace (see [`NetnsPath::enter`]); the host-side ends of veth
//! pairs are managed through a second socket in the controller's own
//! namespace.

use std::collections::BTreeSet;
use std::fs::File;
use std::os::fd::AsRawFd;

use async_trait::async_trait;
use futures::TryStreamExt;
use ipnet::IpNet;
use netlink_packet_route::link::{InfoKind, LinkAttribute, LinkInfo, LinkMessage};
use rtnetlink::{Handle, LinkBridge, LinkDummy, LinkUnspec, LinkVeth, LinkVrf, LinkVxlan};
use tracing::{debug, info};

use net::Vni;

use crate::error::HostError;
use crate::netns::NetnsPath;
use crate::params::{
    HostMasterParams, L2VniParams, L3VniParams, PassthroughParams, SessionAddrs, UnderlayParams,
    VniParams,
};
use crate::{
    HostNetwork, PASSTHROUGH_DEVICE_HOST, PASSTHROUGH_DEVICE_ROUTER, UNDERLAY_DEVICE,
    bridge_device, l2_device_host, l2_device_router, session_device_host, session_device_router,
    vxlan_device,
};

const VXLAN_PORT: u16 = 4789;
const EEXIST: i32 = 17;
const IPV6_FORWARDING: &str = "/proc/sys/net/ipv6/conf/all/forwarding";
const SELF_NS: &str = "/proc/self/ns/net";

/// [`HostNetwork`] against a live network namespace.
pub struct NetlinkHostNetwork {
    target: NetnsPath,
}

impl NetlinkHostNetwork {
    #[must_use]
    pub fn new(target: NetnsPath) -> Self {
        Self { target }
    }

    /// Netlink handle bound to the target namespace.
    async fn target_handle(&self) -> Result<Handle, HostError> {
        let (connection, handle, _) = self
            .target
            .enter(|| rtnetlink::new_connection().map_err(HostError::from))
            .await?;
        tokio::spawn(connection);
        Ok(handle)
    }

    /// Netlink handle bound to the controller's own namespace.
    fn host_handle() -> Result<Handle, HostError> {
        let (connection, handle, _) = rtnetlink::new_connection()?;
        tokio::spawn(connection);
        Ok(handle)
    }

    /// Open the target namespace, for moving devices into it.
    fn target_ns_file(&self) -> Result<File, HostError> {
        File::open(self.target.as_path()).map_err(|err| HostError::Namespace {
            ns: self.target.to_string(),
            err,
        })
    }
}

fn is_exists(err: &rtnetlink::Error) -> bool {
    matches!(err, rtnetlink::Error::NetlinkError(e) if e.raw_code() == -EEXIST)
}

fn link_name(msg: &LinkMessage) -> Option<&str> {
    msg.attributes.iter().find_map(|attr| match attr {
        LinkAttribute::IfName(name) => Some(name.as_str()),
        _ => None,
    })
}

fn link_is_vrf(msg: &LinkMessage) -> bool {
    msg.attributes.iter().any(|attr| {
        matches!(attr, LinkAttribute::LinkInfo(infos)
            if infos.iter().any(|info| matches!(info, LinkInfo::Kind(InfoKind::Vrf))))
    })
}

async fn get_link(handle: &Handle, name: &str) -> Result<Option<LinkMessage>, HostError> {
    let mut links = handle.link().get().match_name(name.to_string()).execute();
    match links.try_next().await {
        Ok(link) => Ok(link),
        // a dump restricted by name reports "no such device" as an error
        Err(rtnetlink::Error::NetlinkError(_)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn list_links(handle: &Handle) -> Result<Vec<LinkMessage>, HostError> {
    let mut links = handle.link().get().execute();
    let mut out = Vec::new();
    while let Some(link) = links.try_next().await? {
        out.push(link);
    }
    Ok(out)
}

/// Add an address, tolerating it being there already.
async fn ensure_address(handle: &Handle, index: u32, net: IpNet) -> Result<(), HostError> {
    match handle
        .address()
        .add(index, net.addr(), net.prefix_len())
        .execute()
        .await
    {
        Ok(()) => Ok(()),
        Err(e) if is_exists(&e) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Bring a device up and optionally enslave it.
async fn set_up(handle: &Handle, index: u32, controller: Option<u32>) -> Result<(), HostError> {
    let mut builder = LinkUnspec::new_with_index(index).up();
    if let Some(controller) = controller {
        builder = builder.controller(controller);
    }
    handle.link().set(builder.build()).execute().await?;
    Ok(())
}

/// Get-or-create a device, returning its index.  `add` only runs when the
/// device is missing; the device is brought up and enslaved either way.
async fn ensure_link<F>(
    handle: &Handle,
    name: &str,
    controller: Option<u32>,
    add: F,
) -> Result<u32, HostError>
where
    F: AsyncFnOnce(&Handle) -> Result<(), rtnetlink::Error>,
{
    if get_link(handle, name).await?.is_none() {
        debug!("creating device {name}");
        match add(handle).await {
            Ok(()) => {}
            Err(e) if is_exists(&e) => {}
            Err(e) => return Err(e.into()),
        }
    }
    let link = get_link(handle, name)
        .await?
        .ok_or_else(|| HostError::DeviceNotFound(name.to_string()))?;
    let index = link.header.index;
    set_up(handle, index, controller).await?;
    Ok(index)
}

/// Classify a device name as one of ours, returning the VNI number it
/// belongs to.
fn managed_vni(name: &str) -> Option<u32> {
    for prefix in ["vni", "br", "per", "host", "l2r", "l2h"] {
        if let Some(rest) = name.strip_prefix(prefix) {
            if !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()) {
                return rest.parse().ok();
            }
        }
    }
    None
}

#[async_trait]
impl HostNetwork for NetlinkHostNetwork {
    async fn has_underlay_interface(&self) -> Result<bool, HostError> {
        let handle = self.target_handle().await?;
        Ok(get_link(&handle, UNDERLAY_DEVICE).await?.is_some())
    }

    async fn ensure_ipv6_forwarding(&self) -> Result<(), HostError> {
        self.target
            .enter(|| std::fs::write(IPV6_FORWARDING, "1").map_err(HostError::from))
            .await
    }

    async fn setup_underlay(&self, params: &UnderlayParams) -> Result<(), HostError> {
        let handle = self.target_handle().await?;

        // Reject namespaces polluted by an earlier underlay with a
        // different NIC: patching around a half-torn-down fabric
        // attachment is not safe, the caller must recreate the target.
        let declared = params.nic.as_ref().map(ToString::to_string);
        for link in list_links(&handle).await? {
            let Some(name) = link_name(&link) else {
                continue;
            };
            if name == "lo"
                || name == UNDERLAY_DEVICE
                || name == PASSTHROUGH_DEVICE_ROUTER
                || name == PASSTHROUGH_DEVICE_HOST
                || managed_vni(name).is_some()
                || Some(name) == declared.as_deref()
                || link_is_vrf(&link)
            {
                continue;
            }
            return Err(HostError::UnderlayExists(format!(
                "unexpected device {name} in target namespace"
            )));
        }

        let anchor = ensure_link(&handle, UNDERLAY_DEVICE, None, async |h: &Handle| {
            h.link()
                .add(LinkDummy::new(UNDERLAY_DEVICE).build())
                .execute()
                .await
        })
        .await?;

        if let Some(vtep_ip) = params.vtep_ip {
            ensure_address(&handle, anchor, vtep_ip).await?;
        }

        if let Some(nic) = &params.nic {
            if get_link(&handle, nic.as_ref()).await?.is_none() {
                // the NIC still lives in the node's namespace: move it
                let host = Self::host_handle()?;
                let link = get_link(&host, nic.as_ref())
                    .await?
                    .ok_or_else(|| HostError::DeviceNotFound(nic.to_string()))?;
                let ns_file = self.target_ns_file()?;
                info!("moving nic {nic} into target namespace");
                host.link()
                    .set(
                        LinkUnspec::new_with_index(link.header.index)
                            .setns_by_fd(ns_file.as_raw_fd())
                            .build(),
                    )
                    .execute()
                    .await?;
            }
            let link = get_link(&handle, nic.as_ref())
                .await?
                .ok_or_else(|| HostError::DeviceNotFound(nic.to_string()))?;
            set_up(&handle, link.header.index, None).await?;
        }
        Ok(())
    }

    async fn setup_l3vni(&self, params: &L3VniParams) -> Result<(), HostError> {
        let handle = self.target_handle().await?;
        let vni = params.base.vni;
        let vrf_name = params.base.vrf.to_string();

        // route table id keyed by the vni keeps tables stable across nodes
        let table = vni.as_u32();
        let vrf = ensure_link(&handle, &vrf_name, None, async |h: &Handle| {
            h.link()
                .add(LinkVrf::new(&vrf_name, table).build())
                .execute()
                .await
        })
        .await?;

        ensure_bridge_and_vxlan(&handle, &params.base, Some(vrf)).await?;

        if !params.sessions.is_empty() {
            setup_session_veth(
                &handle,
                &session_device_router(vni),
                &session_device_host(vni),
                Some(vrf),
                &params.sessions,
            )
            .await?;
        }
        Ok(())
    }

    async fn setup_l2vni(&self, params: &L2VniParams) -> Result<(), HostError> {
        let handle = self.target_handle().await?;
        let vni = params.base.vni;

        let vrf = if params.has_vrf {
            let link = get_link(&handle, params.base.vrf.as_ref())
                .await?
                .ok_or(HostError::MissingVrfDevice(vni))?;
            Some(link.header.index)
        } else {
            None
        };

        let bridge = ensure_bridge_and_vxlan(&handle, &params.base, vrf).await?;

        for gateway in &params.gateway_ips {
            ensure_address(&handle, bridge, *gateway).await?;
        }

        if let Some(master) = &params.host_master {
            setup_host_master(&handle, vni, bridge, master).await?;
        }
        Ok(())
    }

    async fn setup_passthrough(&self, params: &PassthroughParams) -> Result<(), HostError> {
        let handle = self.target_handle().await?;
        setup_session_veth(
            &handle,
            PASSTHROUGH_DEVICE_ROUTER,
            PASSTHROUGH_DEVICE_HOST,
            None,
            &params.sessions,
        )
        .await
    }

    async fn remove_stale_vnis(&self, desired: &[VniParams]) -> Result<(), HostError> {
        let handle = self.target_handle().await?;
        let keep_vnis: BTreeSet<u32> = desired.iter().map(|p| p.vni.as_u32()).collect();
        let keep_vrfs: BTreeSet<&str> = desired.iter().map(|p| p.vrf.as_ref()).collect();

        for link in list_links(&handle).await? {
            let Some(name) = link_name(&link) else {
                continue;
            };
            let stale = match managed_vni(name) {
                Some(number) => !keep_vnis.contains(&number),
                // user-named devices are only swept when they are VRFs we
                // no longer want
                None => link_is_vrf(&link) && !keep_vrfs.contains(name),
            };
            if stale {
                info!("removing stale device {name}");
                handle.link().del(link.header.index).execute().await?;
            }
        }
        Ok(())
    }

    async fn remove_passthrough(&self) -> Result<(), HostError> {
        let handle = self.target_handle().await?;
        // deleting one end of the veth pair removes the host side too
        if let Some(link) = get_link(&handle, PASSTHROUGH_DEVICE_ROUTER).await? {
            info!("removing passthrough devices");
            handle.link().del(link.header.index).execute().await?;
        }
        Ok(())
    }
}

/// Bridge + VXLAN pair shared by the L2 and L3 setup paths.
async fn ensure_bridge_and_vxlan(
    handle: &Handle,
    base: &VniParams,
    vrf: Option<u32>,
) -> Result<u32, HostError> {
    let vni = base.vni;
    let bridge_name = bridge_device(vni);
    let bridge = ensure_link(handle, &bridge_name, vrf, async |h: &Handle| {
        h.link()
            .add(LinkBridge::new(&bridge_name).build())
            .execute()
            .await
    })
    .await?;

    let vxlan_name = vxlan_device(vni);
    ensure_link(handle, &vxlan_name, Some(bridge), async |h: &Handle| {
        let mut builder = LinkVxlan::new(&vxlan_name, vni.as_u32()).port(VXLAN_PORT);
        if let Some(vtep_ip) = base.vtep_ip {
            builder = match vtep_ip {
                std::net::IpAddr::V4(addr) => builder.local(addr),
                std::net::IpAddr::V6(addr) => builder.local6(addr),
            };
        }
        h.link().add(builder.build()).execute().await
    })
    .await?;
    Ok(bridge)
}

/// Veth pair with the router side in the target namespace and the host
/// side moved out to the node, with the point-to-point session addresses
/// on each end.
async fn setup_session_veth(
    handle: &Handle,
    router_name: &str,
    host_name: &str,
    vrf: Option<u32>,
    sessions: &[SessionAddrs],
) -> Result<(), HostError> {
    let host_handle = NetlinkHostNetwork::host_handle()?;

    if get_link(handle, router_name).await?.is_none()
        && get_link(&host_handle, host_name).await?.is_none()
    {
        debug!("creating session veth pair {router_name}/{host_name}");
        handle
            .link()
            .add(LinkVeth::new(router_name, host_name).build())
            .execute()
            .await?;
        // veth ends start out together in the target namespace
        let peer = get_link(handle, host_name)
            .await?
            .ok_or_else(|| HostError::DeviceNotFound(host_name.to_string()))?;
        let self_ns = File::open(SELF_NS)?;
        handle
            .link()
            .set(
                LinkUnspec::new_with_index(peer.header.index)
                    .setns_by_fd(self_ns.as_raw_fd())
                    .build(),
            )
            .execute()
            .await?;
    }

    let router = get_link(handle, router_name)
        .await?
        .ok_or_else(|| HostError::DeviceNotFound(router_name.to_string()))?;
    set_up(handle, router.header.index, vrf).await?;
    for session in sessions {
        ensure_address(handle, router.header.index, session.router_side).await?;
    }

    let host_link = get_link(&host_handle, host_name)
        .await?
        .ok_or_else(|| HostError::DeviceNotFound(host_name.to_string()))?;
    set_up(&host_handle, host_link.header.index, None).await?;
    for session in sessions {
        ensure_address(&host_handle, host_link.header.index, session.host_side).await?;
    }
    Ok(())
}

/// Attach the layer-2 segment to its host master bridge through a veth
/// pair.
async fn setup_host_master(
    handle: &Handle,
    vni: Vni,
    bridge: u32,
    master: &HostMasterParams,
) -> Result<(), HostError> {
    if master.ovs {
        return Err(HostError::OvsUnsupported(master.name.to_string()));
    }
    let host_handle = NetlinkHostNetwork::host_handle()?;

    let master_index = match get_link(&host_handle, master.name.as_ref()).await? {
        Some(link) => link.header.index,
        None if master.auto_create => {
            let name = master.name.to_string();
            ensure_link(&host_handle, &name, None, async |h: &Handle| {
                h.link().add(LinkBridge::new(&name).build()).execute().await
            })
            .await?
        }
        None => return Err(HostError::HostMasterMissing(master.name.to_string())),
    };

    let router_name = l2_device_router(vni);
    let host_name = l2_device_host(vni);
    if get_link(handle, &router_name).await?.is_none()
        && get_link(&host_handle, &host_name).await?.is_none()
    {
        debug!("creating l2 extension veth pair {router_name}/{host_name}");
        handle
            .link()
            .add(LinkVeth::new(&router_name, &host_name).build())
            .execute()
            .await?;
        let peer = get_link(handle, &host_name)
            .await?
            .ok_or_else(|| HostError::DeviceNotFound(host_name.clone()))?;
        let self_ns = File::open(SELF_NS)?;
        handle
            .link()
            .set(
                LinkUnspec::new_with_index(peer.header.index)
                    .setns_by_fd(self_ns.as_raw_fd())
                    .build(),
            )
            .execute()
            .await?;
    }

    let router = get_link(handle, &router_name)
        .await?
        .ok_or_else(|| HostError::DeviceNotFound(router_name.clone()))?;
    set_up(handle, router.header.index, Some(bridge)).await?;

    let host_link = get_link(&host_handle, &host_name)
        .await?
        .ok_or_else(|| HostError::DeviceNotFound(host_name.clone()))?;
    set_up(&host_handle, host_link.header.index, Some(master_index)).await?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn managed_names() {
        assert_eq!(managed_vni("vni110"), Some(110));
        assert_eq!(managed_vni("br110"), Some(110));
        assert_eq!(managed_vni("per110"), Some(110));
        assert_eq!(managed_vni("host110"), Some(110));
        assert_eq!(managed_vni("l2r110"), Some(110));
        assert_eq!(managed_vni("l2h110"), Some(110));
        assert_eq!(managed_vni("vni"), None);
        assert_eq!(managed_vni("eth0"), None);
        assert_eq!(managed_vni("brx1"), None);
        assert_eq!(managed_vni("red"), None);
    }
}
