//! winnow-based parsing of rtnetlink payloads.
//!
//! Every dump reply type implements [`FromNetlink`]: a fixed header
//! followed by a run of aligned attributes, consumed with [`parse_attr`].

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use winnow::binary::le_u16;
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::take;

use super::error::{Error, Result};

/// Result type for winnow parsers.
pub type PResult<T> = core::result::Result<T, ErrMode<ContextError>>;

/// Trait for types that can be parsed from netlink wire format.
pub trait FromNetlink: Sized {
    /// Parse from a mutable byte slice reference.
    /// The slice is advanced past the consumed bytes.
    fn parse(input: &mut &[u8]) -> PResult<Self>;

    /// Parse from a complete message payload (without nlmsghdr).
    fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut input = data;
        Self::parse(&mut input).map_err(|e| Error::Parse(format!("{}", e)))
    }

    /// Write the header required for dump requests.
    /// This is appended to the netlink message after the nlmsghdr.
    fn write_dump_header(_buf: &mut Vec<u8>) {}
}

/// Build a hard parse failure.
pub(crate) fn cut() -> ErrMode<ContextError> {
    ErrMode::Cut(ContextError::new())
}

/// Take a fixed-size header of `size` bytes.
pub(crate) fn parse_header<'a>(input: &mut &'a [u8], size: usize) -> PResult<&'a [u8]> {
    if input.len() < size {
        return Err(cut());
    }
    take(size).parse_next(input)
}

/// Parse a netlink attribute header and return (type without flags, payload).
pub fn parse_attr<'a>(input: &mut &'a [u8]) -> PResult<(u16, &'a [u8])> {
    let len = le_u16.parse_next(input)? as usize;
    let attr_type = le_u16.parse_next(input)?;

    if len < 4 {
        return Err(cut());
    }

    let payload_len = len - 4;
    if input.len() < payload_len {
        return Err(cut());
    }
    let payload: &[u8] = take(payload_len).parse_next(input)?;

    // Align to 4 bytes; the last attribute may omit its padding.
    let padding = ((len + 3) & !3) - len;
    let padding = padding.min(input.len());
    let _: &[u8] = take(padding).parse_next(input)?;

    Ok((attr_type & 0x3fff, payload))
}

/// Parse an IP address based on address family.
pub fn parse_ip_addr(data: &[u8], family: u8) -> Result<IpAddr> {
    match family as i32 {
        libc::AF_INET => {
            let octets: [u8; 4] = data
                .get(..4)
                .and_then(|b| b.try_into().ok())
                .ok_or(Error::Truncated {
                    expected: 4,
                    actual: data.len(),
                })?;
            Ok(IpAddr::V4(Ipv4Addr::from(octets)))
        }
        libc::AF_INET6 => {
            let octets: [u8; 16] = data
                .get(..16)
                .and_then(|b| b.try_into().ok())
                .ok_or(Error::Truncated {
                    expected: 16,
                    actual: data.len(),
                })?;
            Ok(IpAddr::V6(Ipv6Addr::from(octets)))
        }
        _ => Err(Error::InvalidMessage(format!(
            "unknown address family: {}",
            family
        ))),
    }
}

/// Encode an address as the raw octets carried in RTA_*/FRA_* attributes.
pub fn ip_octets(addr: &IpAddr) -> Vec<u8> {
    match addr {
        IpAddr::V4(v4) => v4.octets().to_vec(),
        IpAddr::V6(v6) => v6.octets().to_vec(),
    }
}

/// Address family constant for an address.
pub fn family_of(addr: &IpAddr) -> u8 {
    match addr {
        IpAddr::V4(_) => libc::AF_INET as u8,
        IpAddr::V6(_) => libc::AF_INET6 as u8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_attr_with_padding() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&5u16.to_le_bytes());
        buf.extend_from_slice(&6u16.to_le_bytes());
        buf.extend_from_slice(&[0xaa, 0, 0, 0]);
        buf.extend_from_slice(&8u16.to_le_bytes());
        buf.extend_from_slice(&15u16.to_le_bytes());
        buf.extend_from_slice(&101u32.to_le_bytes());

        let mut input = buf.as_slice();
        let (kind, payload) = parse_attr(&mut input).unwrap();
        assert_eq!(kind, 6);
        assert_eq!(payload, &[0xaa]);
        let (kind, payload) = parse_attr(&mut input).unwrap();
        assert_eq!(kind, 15);
        assert_eq!(payload, &101u32.to_le_bytes());
        assert!(input.is_empty());
    }

    #[test]
    fn test_parse_attr_rejects_short_length() {
        let buf = [2u8, 0, 1, 0];
        let mut input = &buf[..];
        assert!(parse_attr(&mut input).is_err());
    }

    #[test]
    fn test_parse_ip_addr() {
        let v4 = parse_ip_addr(&[172, 31, 201, 1], libc::AF_INET as u8).unwrap();
        assert_eq!(v4, "172.31.201.1".parse::<IpAddr>().unwrap());
        assert!(parse_ip_addr(&[1, 2], libc::AF_INET as u8).is_err());
        assert!(parse_ip_addr(&[0; 16], 99).is_err());

        let v6: IpAddr = "2001:db8::1".parse().unwrap();
        assert_eq!(
            parse_ip_addr(&ip_octets(&v6), family_of(&v6)).unwrap(),
            v6
        );
    }
}
