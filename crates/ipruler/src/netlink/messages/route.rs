//! Route message.

use std::net::IpAddr;

use zerocopy::IntoBytes;

use crate::netlink::attr::get;
use crate::netlink::parse::{FromNetlink, PResult, cut, parse_attr, parse_header, parse_ip_addr};
use crate::netlink::types::route::{RtMsg, rt_table, rta, rtm_f};

/// Route as reported by `RTM_GETROUTE`.
#[derive(Debug, Clone, Default)]
pub struct RouteMessage {
    /// Fixed-size header.
    pub header: RtMsg,
    /// Destination address (RTA_DST).
    pub destination: Option<IpAddr>,
    /// Output interface index (RTA_OIF).
    pub oif: Option<u32>,
    /// Gateway address (RTA_GATEWAY).
    pub gateway: Option<IpAddr>,
    /// Priority/metric (RTA_PRIORITY).
    pub priority: Option<u32>,
    /// Routing table ID (RTA_TABLE).
    pub table: Option<u32>,
}

impl RouteMessage {
    /// Get the address family.
    pub fn family(&self) -> u8 {
        self.header.rtm_family
    }

    /// Get the destination prefix length.
    pub fn dst_len(&self) -> u8 {
        self.header.rtm_dst_len
    }

    /// Get the raw route protocol.
    pub fn protocol(&self) -> u8 {
        self.header.rtm_protocol
    }

    /// Get the raw route scope.
    pub fn scope(&self) -> u8 {
        self.header.rtm_scope
    }

    /// Get the raw route type.
    pub fn route_type(&self) -> u8 {
        self.header.rtm_type
    }

    /// Get the route flags.
    pub fn flags(&self) -> u32 {
        self.header.rtm_flags
    }

    /// Get the routing table ID.
    pub fn table_id(&self) -> u32 {
        self.table.unwrap_or(self.header.rtm_table as u32)
    }

    /// Get the destination address.
    pub fn destination(&self) -> Option<&IpAddr> {
        self.destination.as_ref()
    }

    /// Get the output interface index.
    pub fn oif(&self) -> Option<u32> {
        self.oif
    }

    /// Get the gateway address.
    pub fn gateway(&self) -> Option<&IpAddr> {
        self.gateway.as_ref()
    }

    /// Get the priority/metric.
    pub fn priority(&self) -> Option<u32> {
        self.priority
    }

    /// Check if this is a default route (0.0.0.0/0 or ::/0).
    pub fn is_default(&self) -> bool {
        self.header.rtm_dst_len == 0
    }

    /// Check if this is a cached clone rather than a FIB entry.
    pub fn is_cloned(&self) -> bool {
        self.header.rtm_flags & rtm_f::CLONED != 0
    }

    /// Check if this route lives in the local table (addresses, broadcasts).
    pub fn is_local_table(&self) -> bool {
        self.table_id() == rt_table::LOCAL
    }
}

impl FromNetlink for RouteMessage {
    fn write_dump_header(buf: &mut Vec<u8>) {
        buf.extend_from_slice(RtMsg::new().as_bytes());
    }

    fn parse(input: &mut &[u8]) -> PResult<Self> {
        let header_bytes = parse_header(input, RtMsg::SIZE)?;
        let header = *RtMsg::from_bytes(header_bytes).map_err(|_| cut())?;

        let mut msg = RouteMessage {
            header,
            ..Default::default()
        };

        while input.len() >= 4 {
            let (attr_type, data) = parse_attr(input)?;

            match attr_type {
                rta::DST => {
                    msg.destination = parse_ip_addr(data, header.rtm_family).ok();
                }
                rta::OIF => {
                    msg.oif = get::u32_ne(data).ok();
                }
                rta::GATEWAY => {
                    msg.gateway = parse_ip_addr(data, header.rtm_family).ok();
                }
                rta::PRIORITY => {
                    msg.priority = get::u32_ne(data).ok();
                }
                rta::TABLE => {
                    msg.table = get::u32_ne(data).ok();
                }
                _ => {}
            }
        }

        Ok(msg)
    }
}
