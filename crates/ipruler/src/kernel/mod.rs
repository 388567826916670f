//! The seam between the reconciler and the host's routing state.
//!
//! [`NetlinkKernel`] talks to the running kernel; [`MemoryKernel`] (feature
//! `testing`) keeps everything in memory and records each mutation.

use std::future::Future;

use ipnet::IpNet;

use crate::desired::{RouteSpec, RuleSpec, VlanSpec};
use crate::netlink::Result;

#[cfg(any(test, feature = "testing"))]
mod memory;
mod netlink;

#[cfg(any(test, feature = "testing"))]
pub use memory::{Call, MemoryKernel, Op};
pub use netlink::NetlinkKernel;

/// A network interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub index: u32,
    pub name: String,
}

impl Link {
    pub fn new(index: u32, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
        }
    }
}

/// An address assigned to a link, with its on-link prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    /// Owning link index.
    pub index: u32,
    pub network: IpNet,
}

impl Address {
    pub fn new(index: u32, network: IpNet) -> Self {
        Self { index, network }
    }
}

/// Live routing state and the mutations the reconciler needs.
///
/// Errors are transport errors so callers can tell "already exists" and
/// "not found" apart from real failures with
/// [`Error::is_already_exists`](crate::netlink::Error::is_already_exists) and
/// [`Error::is_not_found`](crate::netlink::Error::is_not_found).
pub trait Kernel: Send + Sync {
    /// All links, in kernel order.
    fn links(&self) -> impl Future<Output = Result<Vec<Link>>> + Send;

    /// All addresses of every family.
    fn addresses(&self) -> impl Future<Output = Result<Vec<Address>>> + Send;

    /// Source-selector rules that look up a table.
    fn rules(&self) -> impl Future<Output = Result<Vec<RuleSpec>>> + Send;

    fn add_rule(&self, rule: &RuleSpec) -> impl Future<Output = Result<()>> + Send;

    fn del_rule(&self, rule: &RuleSpec) -> impl Future<Output = Result<()>> + Send;

    /// Routes, optionally restricted to one table.
    fn routes(&self, table: Option<u32>) -> impl Future<Output = Result<Vec<RouteSpec>>> + Send;

    fn add_route(&self, route: &RouteSpec) -> impl Future<Output = Result<()>> + Send;

    fn del_route(&self, route: &RouteSpec) -> impl Future<Output = Result<()>> + Send;

    /// VLAN sub-interfaces.
    fn vlans(&self) -> impl Future<Output = Result<Vec<VlanSpec>>> + Send;

    fn add_vlan(&self, vlan: &VlanSpec) -> impl Future<Output = Result<()>> + Send;

    fn del_vlan(&self, vlan: &VlanSpec) -> impl Future<Output = Result<()>> + Send;

    /// Bring a link administratively up.
    fn set_up(&self, name: &str) -> impl Future<Output = Result<()>> + Send;
}
