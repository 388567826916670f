//! [`Kernel`] over a live rtnetlink connection.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use ipnet::IpNet;

use super::{Address, Kernel, Link};
use crate::desired::{RouteSpec, RuleSpec, VlanSpec};
use crate::netlink::link::VlanLink;
use crate::netlink::messages::{RouteMessage, RuleMessage};
use crate::netlink::route::RouteBuilder;
use crate::netlink::rule::RuleBuilder;
use crate::netlink::types::route::rtnh_f;
use crate::netlink::{Connection, Error, Result};

/// The production kernel.
pub struct NetlinkKernel {
    conn: Connection,
}

impl NetlinkKernel {
    /// Open an rtnetlink connection in the current network namespace.
    pub fn new() -> Result<Self> {
        Ok(Self {
            conn: Connection::new()?,
        })
    }

    /// Get the underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn rule_spec(msg: &RuleMessage) -> Option<RuleSpec> {
    if !msg.is_lookup() {
        return None;
    }
    // No FRA_SRC means "from all".
    let addr = match msg.source {
        Some(addr) => addr,
        None if msg.src_len() != 0 => return None,
        None if msg.family() == libc::AF_INET6 as u8 => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        None => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
    };
    let source = IpNet::new(addr, msg.src_len()).ok()?;
    Some(RuleSpec {
        source: source.trunc(),
        table: msg.table_id(),
    })
}

fn route_spec(msg: &RouteMessage) -> Option<RouteSpec> {
    let dst = match msg.destination() {
        Some(addr) => *addr,
        None if msg.family() == libc::AF_INET6 as u8 => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        None if msg.family() == libc::AF_INET as u8 => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        None => return None,
    };
    Some(RouteSpec {
        destination: IpNet::new(dst, msg.dst_len()).ok()?,
        gateway: msg.gateway().copied(),
        table: msg.table_id(),
        oif: msg.oif().unwrap_or(0),
        protocol: msg.protocol(),
        scope: msg.scope(),
        // Drop kernel-maintained state such as RTNH_F_LINKDOWN.
        flags: msg.flags() & (rtnh_f::ONLINK | rtnh_f::PERVASIVE),
        route_type: msg.route_type(),
    })
}

fn rule_builder(rule: &RuleSpec) -> RuleBuilder {
    RuleBuilder::from_addr(rule.source.addr(), rule.source.prefix_len()).table(rule.table)
}

fn route_builder(route: &RouteSpec) -> RouteBuilder {
    let mut builder = RouteBuilder::new(route.destination.addr(), route.destination.prefix_len())
        .table(route.table)
        .protocol(route.protocol)
        .scope(route.scope)
        .route_type(route.route_type)
        .flags(route.flags);
    if let Some(gw) = route.gateway {
        builder = builder.gateway(gw);
    }
    if route.oif != 0 {
        builder = builder.oif(route.oif);
    }
    builder
}

impl Kernel for NetlinkKernel {
    async fn links(&self) -> Result<Vec<Link>> {
        let links = self.conn.get_links().await?;
        Ok(links
            .into_iter()
            .filter_map(|l| {
                let index = l.ifindex();
                l.name.map(|name| Link::new(index, name))
            })
            .collect())
    }

    async fn addresses(&self) -> Result<Vec<Address>> {
        let addrs = self.conn.get_addresses().await?;
        Ok(addrs
            .iter()
            .filter_map(|a| {
                let net = IpNet::new(a.primary_address()?, a.prefix_len()).ok()?;
                Some(Address::new(a.ifindex(), net))
            })
            .collect())
    }

    async fn rules(&self) -> Result<Vec<RuleSpec>> {
        let rules = self.conn.get_rules().await?;
        Ok(rules.iter().filter_map(rule_spec).collect())
    }

    async fn add_rule(&self, rule: &RuleSpec) -> Result<()> {
        self.conn.add_rule(rule_builder(rule)).await
    }

    async fn del_rule(&self, rule: &RuleSpec) -> Result<()> {
        self.conn.del_rule(rule_builder(rule)).await
    }

    async fn routes(&self, table: Option<u32>) -> Result<Vec<RouteSpec>> {
        let routes = match table {
            Some(table) => self.conn.get_routes_for_table(table).await?,
            None => self.conn.get_routes().await?,
        };
        Ok(routes
            .iter()
            .filter(|r| !r.is_cloned() && !r.is_local_table())
            .filter_map(route_spec)
            .collect())
    }

    async fn add_route(&self, route: &RouteSpec) -> Result<()> {
        self.conn.add_route(route_builder(route)).await
    }

    async fn del_route(&self, route: &RouteSpec) -> Result<()> {
        self.conn.del_route(route_builder(route)).await
    }

    async fn vlans(&self) -> Result<Vec<VlanSpec>> {
        let links = self.conn.get_links().await?;
        Ok(links
            .into_iter()
            .filter_map(|l| {
                let vlan = l.vlan?;
                Some(VlanSpec {
                    name: l.name?,
                    parent: l.link.unwrap_or(0),
                    id: vlan.id,
                    protocol: vlan.protocol,
                    mtu: l.mtu,
                    txqlen: l.txqlen,
                })
            })
            .collect())
    }

    async fn add_vlan(&self, vlan: &VlanSpec) -> Result<()> {
        if vlan.parent == 0 {
            return Err(Error::InterfaceNotFound {
                name: format!("parent of {}", vlan.name),
            });
        }
        let mut link = VlanLink::new(&vlan.name, vlan.parent, vlan.id).protocol(vlan.protocol);
        if let Some(mtu) = vlan.mtu {
            link = link.mtu(mtu);
        }
        if let Some(txqlen) = vlan.txqlen {
            link = link.txqlen(txqlen);
        }
        self.conn.add_link(link).await
    }

    async fn del_vlan(&self, vlan: &VlanSpec) -> Result<()> {
        self.conn.del_link(&vlan.name).await
    }

    async fn set_up(&self, name: &str) -> Result<()> {
        self.conn.set_link_state(name, true).await
    }
}
