//! Async rtnetlink implementation for Linux.
//!
//! Covers exactly what a policy-routing reconciler needs: dumping links,
//! addresses, routes and rules, and creating or deleting rules, routes
//! and VLAN links.
//!
//! # Quick Start
//!
//! ```ignore
//! use ipruler::netlink::Connection;
//!
//! let conn = Connection::new()?;
//!
//! for rule in conn.get_rules().await? {
//!     println!("{:?}/{} -> {}", rule.source, rule.src_len(), rule.table_id());
//! }
//! ```

pub mod attr;
mod builder;
pub mod connection;
mod error;
pub mod link;
pub mod message;
pub mod messages;
pub mod parse;
pub mod route;
pub mod rule;
mod socket;
pub mod types;

pub use attr::{AttrIter, NlAttr};
pub use builder::{MessageBuilder, NestToken};
pub use connection::Connection;
pub use error::{Error, Result};
pub use message::{MessageIter, NLMSG_HDRLEN, NlMsgHdr, NlMsgType};
pub use parse::FromNetlink;
pub use socket::NetlinkSocket;
