//! Turning document entries into kernel resource descriptors.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use ipnet::IpNet;
use tracing::debug;

use crate::desired::{RouteSpec, RuleSpec, VlanSpec, main_if_unspec};
use crate::document::{RouteEntry, RuleEntry, VlanEntry};
use crate::error::{Error, Result};
use crate::kernel::{Address, Kernel, Link};
use crate::netlink::link::ETH_P_8021Q;
use crate::netlink::types::route::{rt_scope, rtn, rtprot};
use crate::util::names;

/// Highest valid 802.1Q VLAN identifier.
const VLAN_ID_MAX: u16 = 4094;

/// First placeholder index handed to a planned VLAN. Kernel ifindexes are
/// positive `i32`s and never reach it.
const PLANNED_BASE: u32 = 1 << 31;

/// Resolves entries against one snapshot of the host's links and addresses.
#[derive(Debug, Clone, Default)]
pub struct Resolver {
    links: Vec<Link>,
    addresses: Vec<Address>,
    planned: Vec<String>,
}

impl Resolver {
    /// Build a resolver over an explicit snapshot.
    pub fn new(links: Vec<Link>, addresses: Vec<Address>) -> Self {
        Self {
            links,
            addresses,
            planned: Vec::new(),
        }
    }

    /// Accept these VLAN names as route devices even though they don't exist
    /// yet. Routes on them get a placeholder `oif` (see [`is_planned`]) until
    /// the links are created and the document is resolved again.
    pub fn with_planned_vlans<'a>(mut self, names: impl IntoIterator<Item = &'a str>) -> Self {
        for name in names {
            let live = self.links.iter().any(|l| l.name == name);
            if !live && !self.planned.iter().any(|p| p == name) {
                self.planned.push(name.to_string());
            }
        }
        self
    }

    /// Snapshot the kernel's links and addresses.
    pub async fn snapshot<K: Kernel>(kernel: &K) -> Result<Self> {
        let links = kernel
            .links()
            .await
            .map_err(|e| Error::kernel("list links", e))?;
        let addresses = kernel
            .addresses()
            .await
            .map_err(|e| Error::kernel("list addresses", e))?;
        Ok(Self::new(links, addresses))
    }

    /// Resolve a rule entry.
    pub fn rule(&self, entry: &RuleEntry) -> Result<RuleSpec> {
        Ok(RuleSpec {
            source: parse_net(&entry.from)?,
            table: main_if_unspec(entry.table),
        })
    }

    /// Resolve a route entry.
    pub fn route(&self, entry: &RouteEntry) -> Result<RouteSpec> {
        let gateway = entry
            .via
            .as_deref()
            .map(|via| {
                via.parse::<IpAddr>()
                    .map_err(|_| Error::UnresolvableAddress(via.to_string()))
            })
            .transpose()?;

        let destination = if entry.to == "default" {
            let any: IpAddr = match gateway {
                Some(IpAddr::V6(_)) => Ipv6Addr::UNSPECIFIED.into(),
                _ => Ipv4Addr::UNSPECIFIED.into(),
            };
            IpNet::new(any, 0).map_err(|_| Error::UnresolvableAddress(entry.to.clone()))?
        } else {
            parse_net(&entry.to)?
        };

        let oif = match (entry.dev.as_deref(), gateway) {
            (Some(dev), _) => self.route_dev(dev)?,
            (None, Some(gw)) => self.link_for_gateway(gw)?,
            (None, None) => {
                return Err(Error::UnresolvableGateway(format!(
                    "none (route to {} has neither via nor dev)",
                    entry.to
                )));
            }
        };

        let protocol = match entry.protocol.as_deref() {
            Some(name) => names::route_protocol_id(name).ok_or_else(|| symbol("protocol", name))?,
            None => rtprot::BOOT,
        };
        let scope = match entry.scope.as_deref() {
            Some(name) => names::route_scope_id(name).ok_or_else(|| symbol("scope", name))?,
            None => rt_scope::UNIVERSE,
        };
        let flags = if entry.on_link {
            names::route_flag_id("onlink").ok_or_else(|| symbol("flag", "onlink"))?
        } else {
            0
        };

        Ok(RouteSpec {
            destination,
            gateway,
            table: main_if_unspec(entry.table),
            oif,
            protocol,
            scope,
            flags,
            route_type: rtn::UNICAST,
        })
    }

    /// Resolve a VLAN entry.
    pub fn vlan(&self, entry: &VlanEntry) -> Result<VlanSpec> {
        if entry.id == 0 || entry.id > VLAN_ID_MAX {
            return Err(symbol("vlan id", &entry.id.to_string()));
        }

        let protocol = match entry.protocol.as_deref() {
            Some(name) => {
                names::vlan_protocol_id(name).ok_or_else(|| symbol("vlan protocol", name))?
            }
            None => ETH_P_8021Q,
        };

        Ok(VlanSpec {
            name: entry.name.clone(),
            parent: self.link_index(&entry.link)?,
            id: entry.id,
            protocol,
            mtu: entry.mtu,
            txqlen: entry.txqlen,
        })
    }

    fn link_index(&self, name: &str) -> Result<u32> {
        self.links
            .iter()
            .find(|l| l.name == name)
            .map(|l| l.index)
            .ok_or_else(|| Error::UnresolvableDevice(name.to_string()))
    }

    /// Like [`Self::link_index`], falling back to planned VLANs.
    fn route_dev(&self, name: &str) -> Result<u32> {
        self.link_index(name).or_else(|err| {
            self.planned
                .iter()
                .position(|p| p == name)
                .map(|pos| PLANNED_BASE + pos as u32)
                .ok_or(err)
        })
    }

    /// First link, in kernel order, with an address whose subnet holds `gw`.
    fn link_for_gateway(&self, gw: IpAddr) -> Result<u32> {
        let index = self
            .links
            .iter()
            .find(|link| {
                self.addresses
                    .iter()
                    .any(|a| a.index == link.index && a.network.contains(&gw))
            })
            .map(|link| link.index)
            .ok_or_else(|| Error::UnresolvableGateway(gw.to_string()))?;

        debug!(gateway = %gw, index, "resolved gateway to link");
        Ok(index)
    }
}

fn symbol(field: &'static str, value: &str) -> Error {
    Error::UnresolvableSymbol {
        field,
        value: value.to_string(),
    }
}

/// Whether `index` is a placeholder for a VLAN not created yet.
pub fn is_planned(index: u32) -> bool {
    index >= PLANNED_BASE
}

/// Parse `addr/len` (or a bare address as a host prefix) and drop host bits.
fn parse_net(s: &str) -> Result<IpNet> {
    let s = s.trim();
    if let Ok(net) = s.parse::<IpNet>() {
        return Ok(net.trunc());
    }
    s.parse::<IpAddr>()
        .map(IpNet::from)
        .map_err(|_| Error::UnresolvableAddress(s.to_string()))
}
