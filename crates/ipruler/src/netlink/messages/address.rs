//! Interface address message.

use std::net::IpAddr;

use zerocopy::IntoBytes;

use crate::netlink::parse::{FromNetlink, PResult, cut, parse_attr, parse_header, parse_ip_addr};
use crate::netlink::types::addr::{IfAddrMsg, ifa};

/// Address as reported by `RTM_GETADDR`.
#[derive(Debug, Clone, Default)]
pub struct AddressMessage {
    /// Fixed-size header.
    pub header: IfAddrMsg,
    /// Peer or interface address (IFA_ADDRESS).
    pub address: Option<IpAddr>,
    /// Local address (IFA_LOCAL), differs from IFA_ADDRESS on point-to-point links.
    pub local: Option<IpAddr>,
}

impl AddressMessage {
    /// Index of the owning interface.
    pub fn ifindex(&self) -> u32 {
        self.header.ifa_index
    }

    /// Prefix length of the assigned subnet.
    pub fn prefix_len(&self) -> u8 {
        self.header.ifa_prefixlen
    }

    /// The address that defines the on-link subnet.
    pub fn primary_address(&self) -> Option<IpAddr> {
        self.local.or(self.address)
    }
}

impl FromNetlink for AddressMessage {
    fn write_dump_header(buf: &mut Vec<u8>) {
        buf.extend_from_slice(IfAddrMsg::new().as_bytes());
    }

    fn parse(input: &mut &[u8]) -> PResult<Self> {
        let header_bytes = parse_header(input, IfAddrMsg::SIZE)?;
        let header = *IfAddrMsg::from_bytes(header_bytes).map_err(|_| cut())?;

        let mut msg = AddressMessage {
            header,
            ..Default::default()
        };

        while input.len() >= 4 {
            let (attr_type, data) = parse_attr(input)?;
            match attr_type {
                ifa::ADDRESS => msg.address = parse_ip_addr(data, header.ifa_family).ok(),
                ifa::LOCAL => msg.local = parse_ip_addr(data, header.ifa_family).ok(),
                _ => {}
            }
        }

        Ok(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefers_local_address() {
        let hdr = IfAddrMsg {
            ifa_family: libc::AF_INET as u8,
            ifa_prefixlen: 24,
            ifa_index: 2,
            ..Default::default()
        };
        let mut buf = hdr.as_bytes().to_vec();
        for (kind, octets) in [(ifa::ADDRESS, [10, 0, 0, 2]), (ifa::LOCAL, [10, 0, 0, 1])] {
            buf.extend_from_slice(&8u16.to_le_bytes());
            buf.extend_from_slice(&kind.to_le_bytes());
            buf.extend_from_slice(&octets);
        }

        let msg = AddressMessage::from_bytes(&buf).unwrap();
        assert_eq!(msg.ifindex(), 2);
        assert_eq!(msg.prefix_len(), 24);
        assert_eq!(msg.primary_address(), Some("10.0.0.1".parse().unwrap()));
    }
}
