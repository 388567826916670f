//! Link message.

use zerocopy::IntoBytes;

use crate::netlink::attr::{AttrIter, get};
use crate::netlink::parse::{FromNetlink, PResult, cut, parse_attr, parse_header};
use crate::netlink::types::link::{IfInfoMsg, iff, ifla, ifla_info, ifla_vlan};

/// VLAN parameters from IFLA_INFO_DATA.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VlanInfo {
    /// 802.1Q VLAN identifier.
    pub id: u16,
    /// Tag protocol ethertype (0x8100 or 0x88a8).
    pub protocol: u16,
}

/// Link as reported by `RTM_GETLINK`.
#[derive(Debug, Clone, Default)]
pub struct LinkMessage {
    /// Fixed-size header.
    pub header: IfInfoMsg,
    /// Interface name (IFLA_IFNAME).
    pub name: Option<String>,
    /// MTU (IFLA_MTU).
    pub mtu: Option<u32>,
    /// Transmit queue length (IFLA_TXQLEN).
    pub txqlen: Option<u32>,
    /// Parent link index for stacked devices (IFLA_LINK).
    pub link: Option<u32>,
    /// Link kind from IFLA_LINKINFO (e.g. "vlan").
    pub kind: Option<String>,
    /// VLAN data, present only for kind "vlan".
    pub vlan: Option<VlanInfo>,
}

impl LinkMessage {
    /// Get the interface index.
    pub fn ifindex(&self) -> u32 {
        self.header.ifi_index as u32
    }

    /// Get the interface name.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Check if the interface is administratively up.
    pub fn is_up(&self) -> bool {
        self.header.ifi_flags & iff::UP != 0
    }

    /// Check if this link is an 802.1Q/802.1ad sub-interface.
    pub fn is_vlan(&self) -> bool {
        self.kind.as_deref() == Some("vlan")
    }

    fn parse_link_info(&mut self, data: &[u8]) {
        for (kind, payload) in AttrIter::new(data) {
            match kind {
                ifla_info::KIND => {
                    self.kind = get::string(payload).ok().map(str::to_string);
                }
                ifla_info::DATA => {
                    let mut vlan = VlanInfo::default();
                    for (attr, value) in AttrIter::new(payload) {
                        match attr {
                            ifla_vlan::ID => vlan.id = get::u16_ne(value).unwrap_or(0),
                            // Protocol travels in network byte order.
                            ifla_vlan::PROTOCOL => {
                                vlan.protocol = get::u16_be(value).unwrap_or(0)
                            }
                            _ => {}
                        }
                    }
                    self.vlan = Some(vlan);
                }
                _ => {}
            }
        }
        if !self.is_vlan() {
            self.vlan = None;
        }
    }
}

impl FromNetlink for LinkMessage {
    fn write_dump_header(buf: &mut Vec<u8>) {
        buf.extend_from_slice(IfInfoMsg::new().as_bytes());
    }

    fn parse(input: &mut &[u8]) -> PResult<Self> {
        let header_bytes = parse_header(input, IfInfoMsg::SIZE)?;
        let header = *IfInfoMsg::from_bytes(header_bytes).map_err(|_| cut())?;

        let mut msg = LinkMessage {
            header,
            ..Default::default()
        };

        while input.len() >= 4 {
            let (attr_type, data) = parse_attr(input)?;

            match attr_type {
                ifla::IFNAME => {
                    msg.name = get::string(data).ok().map(str::to_string);
                }
                ifla::MTU => msg.mtu = get::u32_ne(data).ok(),
                ifla::TXQLEN => msg.txqlen = get::u32_ne(data).ok(),
                ifla::LINK => msg.link = get::u32_ne(data).ok(),
                ifla::LINKINFO => msg.parse_link_info(data),
                _ => {}
            }
        }

        Ok(msg)
    }
}
