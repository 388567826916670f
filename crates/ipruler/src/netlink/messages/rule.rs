//! Routing rule message.

use std::net::IpAddr;

use zerocopy::IntoBytes;

use crate::netlink::attr::get;
use crate::netlink::parse::{FromNetlink, PResult, cut, parse_attr, parse_header, parse_ip_addr};
use crate::netlink::types::rule::{FibRuleHdr, fr_act, fra};

/// Routing rule as reported by `RTM_GETRULE`.
#[derive(Debug, Clone, Default)]
pub struct RuleMessage {
    /// Fixed-size header.
    pub header: FibRuleHdr,
    /// Rule priority (FRA_PRIORITY).
    pub priority: u32,
    /// Source address (FRA_SRC).
    pub source: Option<IpAddr>,
    /// Routing table ID (FRA_TABLE, overrides header.table).
    pub table: u32,
}

impl RuleMessage {
    /// Get the address family.
    pub fn family(&self) -> u8 {
        self.header.family
    }

    /// Get the source prefix length.
    pub fn src_len(&self) -> u8 {
        self.header.src_len
    }

    /// Check if this is a table lookup rule.
    pub fn is_lookup(&self) -> bool {
        self.header.action == fr_act::TO_TBL
    }

    /// Get the routing table ID.
    pub fn table_id(&self) -> u32 {
        self.table
    }
}

impl FromNetlink for RuleMessage {
    fn write_dump_header(buf: &mut Vec<u8>) {
        buf.extend_from_slice(FibRuleHdr::new().as_bytes());
    }

    fn parse(input: &mut &[u8]) -> PResult<Self> {
        let header_bytes = parse_header(input, FibRuleHdr::SIZE)?;
        let header = *FibRuleHdr::from_bytes(header_bytes).map_err(|_| cut())?;

        let mut msg = RuleMessage {
            table: header.table as u32,
            header,
            ..Default::default()
        };

        while input.len() >= 4 {
            let (attr_type, data) = parse_attr(input)?;

            match attr_type {
                fra::PRIORITY => {
                    if let Ok(prio) = get::u32_ne(data) {
                        msg.priority = prio;
                    }
                }
                fra::SRC => {
                    msg.source = parse_ip_addr(data, msg.header.family).ok();
                }
                fra::TABLE => {
                    if let Ok(table) = get::u32_ne(data) {
                        msg.table = table;
                    }
                }
                _ => {}
            }
        }

        Ok(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attr(kind: u16, data: &[u8]) -> Vec<u8> {
        let len = 4 + data.len();
        let mut out = (len as u16).to_le_bytes().to_vec();
        out.extend_from_slice(&kind.to_le_bytes());
        out.extend_from_slice(data);
        out.resize((len + 3) & !3, 0);
        out
    }

    #[test]
    fn test_parse_source_rule_in_high_table() {
        let mut hdr = FibRuleHdr::new().with_family(libc::AF_INET as u8);
        hdr.src_len = 32;
        hdr.action = fr_act::TO_TBL;
        let mut buf = hdr.as_bytes().to_vec();
        buf.extend(attr(fra::TABLE, &1001u32.to_ne_bytes()));
        buf.extend(attr(fra::PRIORITY, &32765u32.to_ne_bytes()));
        buf.extend(attr(fra::SRC, &[172, 31, 201, 11]));

        let msg = RuleMessage::from_bytes(&buf).unwrap();
        assert!(msg.is_lookup());
        assert_eq!(msg.table_id(), 1001);
        assert_eq!(msg.priority, 32765);
        assert_eq!(msg.src_len(), 32);
        assert_eq!(msg.source, Some("172.31.201.11".parse().unwrap()));
    }

    #[test]
    fn test_parse_truncated_header() {
        assert!(RuleMessage::from_bytes(&[2, 0, 0]).is_err());
    }
}
