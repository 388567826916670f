//! Routing rule management.
//!
//! Only the rule shape the reconciler manages is expressible here: a
//! source prefix looked up in a table.
//!
//! # Example
//!
//! ```ignore
//! use std::net::IpAddr;
//! use ipruler::netlink::Connection;
//! use ipruler::netlink::rule::RuleBuilder;
//!
//! let conn = Connection::new()?;
//! let src: IpAddr = "10.1.2.0".parse()?;
//!
//! // ip rule add from 10.1.2.0/24 table 1001
//! conn.add_rule(RuleBuilder::from_addr(src, 24).table(1001)).await?;
//! ```

use std::net::IpAddr;

use super::builder::MessageBuilder;
use super::connection::{Connection, ack_request, create_request};
use super::error::Result;
use super::message::NlMsgType;
use super::parse::{family_of, ip_octets};
use super::types::route::rt_table;
use super::types::rule::{FibRuleHdr, fr_act, fra};

/// Builder for routing rules.
#[derive(Debug, Clone)]
pub struct RuleBuilder {
    family: u8,
    src: IpAddr,
    src_len: u8,
    table: u32,
}

impl RuleBuilder {
    /// Start a rule matching packets sourced from `addr/prefix_len`.
    pub fn from_addr(addr: IpAddr, prefix_len: u8) -> Self {
        Self {
            family: family_of(&addr),
            src: addr,
            src_len: prefix_len,
            table: rt_table::MAIN,
        }
    }

    /// Set the table to look up.
    pub fn table(mut self, table: u32) -> Self {
        self.table = table;
        self
    }

    /// Build the netlink message for adding this rule.
    pub fn build(&self) -> MessageBuilder {
        self.build_internal(create_request(NlMsgType::RTM_NEWRULE))
    }

    /// Build the netlink message for deleting this rule.
    pub fn build_delete(&self) -> MessageBuilder {
        self.build_internal(ack_request(NlMsgType::RTM_DELRULE))
    }

    fn build_internal(&self, mut builder: MessageBuilder) -> MessageBuilder {
        let mut hdr = FibRuleHdr::new().with_family(self.family);
        hdr.src_len = self.src_len;
        hdr.action = fr_act::TO_TBL;
        // Tables above 255 only fit in FRA_TABLE.
        hdr.table = u8::try_from(self.table).unwrap_or(0);

        builder.append(&hdr);

        builder.append_attr(fra::SRC, &ip_octets(&self.src));
        builder.append_attr_u32(fra::TABLE, self.table);

        builder
    }
}

impl Connection {
    /// Add a routing rule.
    pub async fn add_rule(&self, rule: RuleBuilder) -> Result<()> {
        self.request_ack(rule.build())
            .await
            .map_err(|e| e.with_context("add rule"))
    }

    /// Delete a routing rule.
    pub async fn del_rule(&self, rule: RuleBuilder) -> Result<()> {
        self.request_ack(rule.build_delete())
            .await
            .map_err(|e| e.with_context("delete rule"))
    }
}
