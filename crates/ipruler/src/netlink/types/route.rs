//! Route message types.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::netlink::error::{Error, Result};

/// Route message (struct rtmsg).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct RtMsg {
    /// Address family.
    pub rtm_family: u8,
    /// Destination prefix length.
    pub rtm_dst_len: u8,
    /// Source prefix length.
    pub rtm_src_len: u8,
    /// TOS filter.
    pub rtm_tos: u8,
    /// Routing table ID (RT_TABLE_UNSPEC when RTA_TABLE carries it).
    pub rtm_table: u8,
    /// Routing protocol (RTPROT_*).
    pub rtm_protocol: u8,
    /// Distance to destination (RT_SCOPE_*).
    pub rtm_scope: u8,
    /// Route type (RTN_*).
    pub rtm_type: u8,
    /// Route flags (RTNH_F_*, RTM_F_*).
    pub rtm_flags: u32,
}

impl RtMsg {
    /// Size of this structure.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Create a new route message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from bytes.
    pub fn from_bytes(data: &[u8]) -> Result<&Self> {
        Self::ref_from_prefix(data)
            .map(|(r, _)| r)
            .map_err(|_| Error::Truncated {
                expected: Self::SIZE,
                actual: data.len(),
            })
    }
}

/// Route attributes (RTA_*).
pub mod rta {
    pub const DST: u16 = 1;
    pub const OIF: u16 = 4;
    pub const GATEWAY: u16 = 5;
    pub const PRIORITY: u16 = 6;
    pub const TABLE: u16 = 15;
}

/// Routing tables.
pub mod rt_table {
    pub const UNSPEC: u32 = 0;
    pub const MAIN: u32 = 254;
    pub const LOCAL: u32 = 255;
}

/// Route protocols (who installed the route).
pub mod rtprot {
    pub const KERNEL: u8 = 2;
    pub const BOOT: u8 = 3;
    pub const STATIC: u8 = 4;
}

/// Route scopes.
pub mod rt_scope {
    pub const UNIVERSE: u8 = 0;
    pub const LINK: u8 = 253;
    pub const HOST: u8 = 254;
    /// Wildcard scope; matches any route on delete.
    pub const NOWHERE: u8 = 255;
}

/// Route types.
pub mod rtn {
    pub const UNICAST: u8 = 1;
}

/// Next-hop flags carried in rtm_flags.
pub mod rtnh_f {
    pub const PERVASIVE: u32 = 2;
    pub const ONLINK: u32 = 4;
}

/// Route message flags.
pub mod rtm_f {
    /// Cached (cloned) route, not a FIB entry.
    pub const CLONED: u32 = 0x200;
}
