//! Resolved desired state.
//!
//! A [`Config`] is built once per accepted document and never mutated; the
//! engine keeps the current and the previous one.

use std::collections::BTreeSet;
use std::fmt;
use std::net::IpAddr;

use ipnet::IpNet;

use crate::document::Document;
use crate::error::Result;
use crate::netlink::types::route::{rt_table, rtnh_f};
use crate::resolve::{self, Resolver};
use crate::util::names;

/// `from <source> lookup <table>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RuleSpec {
    /// Source network, truncated to its prefix.
    pub source: IpNet,
    pub table: u32,
}

impl RuleSpec {
    /// Rules are the same when they select the same table for the same
    /// source network.
    pub fn matches(&self, other: &Self) -> bool {
        self == other
    }
}

impl fmt::Display for RuleSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "from {} lookup {}", self.source, self.table)
    }
}

/// A fully resolved unicast (or live, any-type) route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RouteSpec {
    /// Destination network; a zero-length prefix is the default route.
    pub destination: IpNet,
    pub gateway: Option<IpAddr>,
    pub table: u32,
    /// Outgoing link index.
    pub oif: u32,
    /// RTPROT_*.
    pub protocol: u8,
    /// RT_SCOPE_*.
    pub scope: u8,
    /// RTNH_F_ONLINK / RTNH_F_PERVASIVE.
    pub flags: u32,
    /// RTN_*.
    pub route_type: u8,
}

impl RouteSpec {
    /// Check if this is a default route.
    pub fn is_default(&self) -> bool {
        self.destination.prefix_len() == 0
    }

    /// Routes are the same only when every kernel-relevant field is.
    pub fn matches(&self, other: &Self) -> bool {
        self == other
    }
}

impl fmt::Display for RouteSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_default() {
            write!(f, "default")?;
        } else {
            write!(f, "{}", self.destination)?;
        }
        if let Some(gw) = self.gateway {
            write!(f, " via {}", gw)?;
        }
        write!(
            f,
            " dev #{} table {} proto {} scope {}",
            self.oif,
            self.table,
            names::route_protocol_name(self.protocol),
            names::route_scope_name(self.scope)
        )?;
        for flag in [rtnh_f::ONLINK, rtnh_f::PERVASIVE] {
            if self.flags & flag != 0 {
                write!(f, " {}", names::route_flag_name(flag))?;
            }
        }
        Ok(())
    }
}

/// A VLAN sub-interface.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VlanSpec {
    pub name: String,
    /// Parent link index.
    pub parent: u32,
    pub id: u16,
    /// Tag protocol ethertype.
    pub protocol: u16,
    pub mtu: Option<u32>,
    pub txqlen: Option<u32>,
}

impl VlanSpec {
    /// Compare everything but the VLAN's own link index, which the kernel
    /// assigns anew on every creation. An unset MTU or queue length on
    /// either side matches any value.
    pub fn matches(&self, other: &Self) -> bool {
        fn loose(a: Option<u32>, b: Option<u32>) -> bool {
            match (a, b) {
                (Some(a), Some(b)) => a == b,
                _ => true,
            }
        }

        self.id == other.id
            && self.protocol == other.protocol
            && self.parent == other.parent
            && self.name == other.name
            && loose(self.mtu, other.mtu)
            && loose(self.txqlen, other.txqlen)
    }
}

impl fmt::Display for VlanSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} link #{} id {} protocol {}",
            self.name,
            self.parent,
            self.id,
            names::vlan_protocol_name(self.protocol)
        )?;
        if let Some(mtu) = self.mtu {
            write!(f, " mtu {}", mtu)?;
        }
        if let Some(txqlen) = self.txqlen {
            write!(f, " txqlen {}", txqlen)?;
        }
        Ok(())
    }
}

/// Engine-wide settings from the `settings` block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    /// Tables under hard-sync enforcement.
    pub table_hard_sync: BTreeSet<u32>,
}

/// One resolved desired-state snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub rules: Vec<RuleSpec>,
    pub routes: Vec<RouteSpec>,
    pub vlans: Vec<VlanSpec>,
    pub settings: Settings,
}

impl Config {
    /// Resolve every entry of `doc`. Fails on the first entry that cannot
    /// be resolved; nothing partial is returned.
    ///
    /// Routes may name a VLAN declared in the same document. Until that link
    /// exists their `oif` is a placeholder, see [`Config::has_planned_links`].
    pub fn build(doc: &Document, resolver: &Resolver) -> Result<Self> {
        let settings = Settings {
            table_hard_sync: doc
                .settings
                .table_hard_sync
                .iter()
                .map(|&t| main_if_unspec(t))
                .collect(),
        };

        let vlans = doc
            .vlans
            .iter()
            .map(|v| resolver.vlan(v))
            .collect::<Result<Vec<_>>>()?;
        let with_vlans = resolver
            .clone()
            .with_planned_vlans(doc.vlans.iter().map(|v| v.name.as_str()));
        let routes = doc
            .routes
            .iter()
            .map(|r| with_vlans.route(r))
            .collect::<Result<Vec<_>>>()?;
        let rules = doc
            .rules
            .iter()
            .map(|r| resolver.rule(r))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            rules,
            routes,
            vlans,
            settings,
        })
    }

    /// Whether any route still points at a VLAN that did not exist when
    /// this config was built.
    pub fn has_planned_links(&self) -> bool {
        self.routes.iter().any(|r| resolve::is_planned(r.oif))
    }

    /// Check if a table is under hard-sync enforcement.
    pub fn is_hard_synced(&self, table: u32) -> bool {
        self.settings.table_hard_sync.contains(&table)
    }
}

/// Table 0 in a document means "main", as it does for `ip`.
pub(crate) fn main_if_unspec(table: u32) -> u32 {
    if table == rt_table::UNSPEC {
        rt_table::MAIN
    } else {
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{RouteEntry, RuleEntry, SettingsEntry, VlanEntry};
    use crate::error::Error;
    use crate::kernel::{Address, Link};

    fn vlan(mtu: Option<u32>) -> VlanSpec {
        VlanSpec {
            name: "eth0.100".into(),
            parent: 2,
            id: 100,
            protocol: 0x8100,
            mtu,
            txqlen: None,
        }
    }

    fn resolver() -> Resolver {
        Resolver::new(
            vec![Link::new(1, "lo"), Link::new(2, "eth0")],
            vec![Address::new(2, "172.31.201.10/24".parse().unwrap())],
        )
    }

    #[test]
    fn test_vlan_unset_fields_are_loose() {
        assert!(vlan(None).matches(&vlan(Some(1500))));
        assert!(vlan(Some(1500)).matches(&vlan(Some(1500))));
        assert!(!vlan(Some(1400)).matches(&vlan(Some(1500))));

        let mut renamed = vlan(None);
        renamed.name = "vlan100".into();
        assert!(!renamed.matches(&vlan(None)));
    }

    #[test]
    fn test_build() {
        let doc = Document {
            settings: SettingsEntry {
                table_hard_sync: vec![101, 0],
            },
            rules: vec![RuleEntry {
                from: "172.31.201.11/32".into(),
                table: 101,
            }],
            vlans: vec![VlanEntry {
                name: "eth0.100".into(),
                link: "eth0".into(),
                id: 100,
                ..Default::default()
            }],
            ..Default::default()
        };

        let config = Config::build(&doc, &resolver()).unwrap();
        assert!(config.is_hard_synced(101));
        assert!(config.is_hard_synced(254));
        assert_eq!(config.rules.len(), 1);
        assert_eq!(config.vlans[0], vlan(None));
        assert!(!config.has_planned_links());
    }

    #[test]
    fn test_build_route_on_declared_vlan() {
        let mut doc = Document {
            routes: vec![RouteEntry {
                to: "10.100.0.0/24".into(),
                dev: Some("eth0.100".into()),
                table: 102,
                ..Default::default()
            }],
            ..Default::default()
        };
        assert!(matches!(
            Config::build(&doc, &resolver()),
            Err(Error::UnresolvableDevice(_))
        ));

        doc.vlans.push(VlanEntry {
            name: "eth0.100".into(),
            link: "eth0".into(),
            id: 100,
            ..Default::default()
        });
        let config = Config::build(&doc, &resolver()).unwrap();
        assert!(config.has_planned_links());

        // Once the link exists the same document resolves to its index.
        let created = Resolver::new(
            vec![Link::new(1, "lo"), Link::new(2, "eth0"), Link::new(7, "eth0.100")],
            Vec::new(),
        );
        let config = Config::build(&doc, &created).unwrap();
        assert!(!config.has_planned_links());
        assert_eq!(config.routes[0].oif, 7);
    }

    #[test]
    fn test_build_fails_on_any_bad_entry() {
        let doc = Document {
            rules: vec![
                RuleEntry {
                    from: "10.0.0.0/8".into(),
                    table: 1,
                },
                RuleEntry {
                    from: "10.0.0/33".into(),
                    table: 2,
                },
            ],
            ..Default::default()
        };
        assert!(matches!(
            Config::build(&doc, &resolver()),
            Err(Error::UnresolvableAddress(_))
        ));
    }

    #[test]
    fn test_display() {
        let rule = RuleSpec {
            source: "10.1.0.0/16".parse().unwrap(),
            table: 7,
        };
        assert_eq!(rule.to_string(), "from 10.1.0.0/16 lookup 7");
        assert_eq!(
            vlan(Some(1400)).to_string(),
            "eth0.100 link #2 id 100 protocol 802.1Q mtu 1400"
        );
    }
}
