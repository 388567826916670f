//! Route management.
//!
//! # Example
//!
//! ```ignore
//! use ipruler::netlink::Connection;
//! use ipruler::netlink::route::RouteBuilder;
//!
//! let conn = Connection::new()?;
//!
//! // ip route add to 0.0.0.0/0 via 172.31.201.1 table 102 dev eth0
//! conn.add_route(
//!     RouteBuilder::new("0.0.0.0".parse()?, 0)
//!         .gateway("172.31.201.1".parse()?)
//!         .oif(2)
//!         .table(102)
//! ).await?;
//! ```

use std::net::IpAddr;

use super::builder::MessageBuilder;
use super::connection::{Connection, ack_request, create_request};
use super::error::{Error, Result};
use super::message::NlMsgType;
use super::parse::{family_of, ip_octets};
use super::types::route::{RtMsg, rt_scope, rt_table, rta, rtn, rtprot};

/// Builder for unicast routes.
#[derive(Debug, Clone)]
pub struct RouteBuilder {
    destination: IpAddr,
    prefix_len: u8,
    gateway: Option<IpAddr>,
    oif: Option<u32>,
    table: u32,
    protocol: u8,
    scope: u8,
    route_type: u8,
    flags: u32,
}

impl RouteBuilder {
    /// Create a route to `destination/prefix_len` in the main table.
    pub fn new(destination: IpAddr, prefix_len: u8) -> Self {
        Self {
            destination,
            prefix_len,
            gateway: None,
            oif: None,
            table: rt_table::MAIN,
            protocol: rtprot::BOOT,
            scope: rt_scope::UNIVERSE,
            route_type: rtn::UNICAST,
            flags: 0,
        }
    }

    /// Set the next-hop gateway.
    pub fn gateway(mut self, gateway: IpAddr) -> Self {
        self.gateway = Some(gateway);
        self
    }

    /// Set the output interface index.
    pub fn oif(mut self, index: u32) -> Self {
        self.oif = Some(index);
        self
    }

    /// Set the routing table.
    pub fn table(mut self, table: u32) -> Self {
        self.table = table;
        self
    }

    /// Set the route protocol (RTPROT_*).
    pub fn protocol(mut self, protocol: u8) -> Self {
        self.protocol = protocol;
        self
    }

    /// Set the route scope (RT_SCOPE_*).
    pub fn scope(mut self, scope: u8) -> Self {
        self.scope = scope;
        self
    }

    /// Set the route type (RTN_*).
    pub fn route_type(mut self, route_type: u8) -> Self {
        self.route_type = route_type;
        self
    }

    /// Set next-hop flags (RTNH_F_ONLINK, RTNH_F_PERVASIVE).
    pub fn flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    fn check_family(&self) -> Result<()> {
        match self.gateway {
            Some(gw) if family_of(&gw) != family_of(&self.destination) => {
                Err(Error::InvalidMessage(format!(
                    "gateway {} does not match family of {}",
                    gw, self.destination
                )))
            }
            _ => Ok(()),
        }
    }

    /// Build the netlink message for adding this route.
    pub fn build(&self) -> Result<MessageBuilder> {
        self.check_family()?;
        let builder = create_request(NlMsgType::RTM_NEWROUTE);
        Ok(self.build_internal(builder, self.scope))
    }

    /// Build the netlink message for deleting this route.
    pub fn build_delete(&self) -> Result<MessageBuilder> {
        self.check_family()?;
        let builder = ack_request(NlMsgType::RTM_DELROUTE);
        Ok(self.build_internal(builder, rt_scope::NOWHERE))
    }

    fn build_internal(&self, mut builder: MessageBuilder, scope: u8) -> MessageBuilder {
        let rtmsg = RtMsg {
            rtm_family: family_of(&self.destination),
            rtm_dst_len: self.prefix_len,
            rtm_table: u8::try_from(self.table).unwrap_or(rt_table::UNSPEC as u8),
            rtm_protocol: self.protocol,
            rtm_scope: scope,
            rtm_type: self.route_type,
            rtm_flags: self.flags,
            ..Default::default()
        };

        builder.append(&rtmsg);

        // RTA_DST is omitted for default routes
        if self.prefix_len > 0 {
            builder.append_attr(rta::DST, &ip_octets(&self.destination));
        }

        if let Some(gw) = self.gateway {
            builder.append_attr(rta::GATEWAY, &ip_octets(&gw));
        }

        if let Some(oif) = self.oif {
            builder.append_attr_u32(rta::OIF, oif);
        }

        builder.append_attr_u32(rta::TABLE, self.table);

        builder
    }
}

impl Connection {
    /// Add a route.
    pub async fn add_route(&self, route: RouteBuilder) -> Result<()> {
        self.request_ack(route.build()?)
            .await
            .map_err(|e| e.with_context("add route"))
    }

    /// Delete a route.
    pub async fn del_route(&self, route: RouteBuilder) -> Result<()> {
        self.request_ack(route.build_delete()?)
            .await
            .map_err(|e| e.with_context("delete route"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlink::message::NLMSG_HDRLEN;
    use crate::netlink::messages::RouteMessage;
    use crate::netlink::parse::FromNetlink;
    use crate::netlink::types::route::rtnh_f;

    #[test]
    fn test_default_route_has_no_dst() {
        let msg = RouteBuilder::new("0.0.0.0".parse().unwrap(), 0)
            .gateway("172.31.201.1".parse().unwrap())
            .oif(3)
            .table(102)
            .build()
            .unwrap()
            .finish();

        let route = RouteMessage::from_bytes(&msg[NLMSG_HDRLEN..]).unwrap();
        assert!(route.is_default());
        assert_eq!(route.destination(), None);
        assert_eq!(route.table_id(), 102);
        assert_eq!(route.oif(), Some(3));
        assert_eq!(route.protocol(), rtprot::BOOT);
        assert_eq!(route.route_type(), rtn::UNICAST);
    }

    #[test]
    fn test_onlink_link_scope() {
        let msg = RouteBuilder::new("10.9.0.0".parse().unwrap(), 16)
            .oif(4)
            .table(300)
            .scope(rt_scope::LINK)
            .protocol(rtprot::STATIC)
            .flags(rtnh_f::ONLINK)
            .build()
            .unwrap()
            .finish();

        let route = RouteMessage::from_bytes(&msg[NLMSG_HDRLEN..]).unwrap();
        assert_eq!(route.destination(), Some(&"10.9.0.0".parse().unwrap()));
        assert_eq!(route.dst_len(), 16);
        assert_eq!(route.header.rtm_table, rt_table::UNSPEC as u8);
        assert_eq!(route.table_id(), 300);
        assert_eq!(route.scope(), rt_scope::LINK);
        assert_eq!(route.flags(), rtnh_f::ONLINK);
    }

    #[test]
    fn test_delete_uses_wildcard_scope() {
        let msg = RouteBuilder::new("10.0.0.0".parse().unwrap(), 8)
            .scope(rt_scope::LINK)
            .build_delete()
            .unwrap()
            .finish();
        let route = RouteMessage::from_bytes(&msg[NLMSG_HDRLEN..]).unwrap();
        assert_eq!(route.scope(), rt_scope::NOWHERE);
    }

    #[test]
    fn test_mixed_family_rejected() {
        let route = RouteBuilder::new("2001:db8::".parse().unwrap(), 32)
            .gateway("10.0.0.1".parse().unwrap());
        assert!(route.build().is_err());
    }
}
