//! In-memory [`Kernel`] for tests.
//!
//! Behaves like the real kernel where the reconciler cares: adding a
//! duplicate fails with `EEXIST`, deleting something absent fails with
//! the errno the kernel uses for that object (`ENOENT` for rules, `ESRCH`
//! for routes, `ENODEV` for links).

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{Address, Kernel, Link};
use crate::desired::{RouteSpec, RuleSpec, VlanSpec};
use crate::netlink::{Error, Result};

/// A mutating operation, for error injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    AddRule,
    DelRule,
    AddRoute,
    DelRoute,
    AddVlan,
    DelVlan,
    SetUp,
}

/// A recorded mutating call, successful or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    AddRule(RuleSpec),
    DelRule(RuleSpec),
    AddRoute(RouteSpec),
    DelRoute(RouteSpec),
    AddVlan(VlanSpec),
    DelVlan(String),
    SetUp(String),
}

#[derive(Debug, Default)]
struct State {
    links: Vec<Link>,
    addresses: Vec<Address>,
    up: Vec<String>,
    rules: Vec<RuleSpec>,
    routes: Vec<RouteSpec>,
    vlans: Vec<VlanSpec>,
    calls: Vec<Call>,
    failures: HashMap<Op, i32>,
}

impl State {
    fn fail(&self, op: Op) -> Result<()> {
        match self.failures.get(&op) {
            Some(&errno) => Err(Error::from_errno(-errno)),
            None => Ok(()),
        }
    }

    fn next_index(&self) -> u32 {
        self.links.iter().map(|l| l.index).max().unwrap_or(0) + 1
    }
}

/// A kernel that lives in memory.
#[derive(Debug, Default)]
pub struct MemoryKernel {
    state: Mutex<State>,
}

impl MemoryKernel {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a link.
    pub fn with_link(self, index: u32, name: &str) -> Self {
        self.state().links.push(Link::new(index, name));
        self
    }

    /// Assign an address (`addr/len`) to a link.
    pub fn with_address(self, index: u32, cidr: &str) -> Self {
        if let Ok(network) = cidr.parse() {
            self.state().addresses.push(Address::new(index, network));
        }
        self
    }

    /// Seed a rule without recording a call.
    pub fn with_rule(self, rule: RuleSpec) -> Self {
        self.state().rules.push(rule);
        self
    }

    /// Seed a route without recording a call.
    pub fn with_route(self, route: RouteSpec) -> Self {
        self.state().routes.push(route);
        self
    }

    /// Make every future `op` fail with `errno` (a positive errno value).
    pub fn fail(&self, op: Op, errno: i32) {
        self.state().failures.insert(op, errno);
    }

    /// Stop failing `op`.
    pub fn heal(&self, op: Op) {
        self.state().failures.remove(&op);
    }

    /// All mutating calls so far.
    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Current rules.
    pub fn current_rules(&self) -> Vec<RuleSpec> {
        self.state().rules.clone()
    }

    /// Current routes.
    pub fn current_routes(&self) -> Vec<RouteSpec> {
        self.state().routes.clone()
    }

    /// Current VLANs.
    pub fn current_vlans(&self) -> Vec<VlanSpec> {
        self.state().vlans.clone()
    }

    /// Check if a link is administratively up.
    pub fn is_up(&self, name: &str) -> bool {
        self.state().up.iter().any(|n| n == name)
    }
}

impl Kernel for MemoryKernel {
    async fn links(&self) -> Result<Vec<Link>> {
        Ok(self.state().links.clone())
    }

    async fn addresses(&self) -> Result<Vec<Address>> {
        Ok(self.state().addresses.clone())
    }

    async fn rules(&self) -> Result<Vec<RuleSpec>> {
        Ok(self.state().rules.clone())
    }

    async fn add_rule(&self, rule: &RuleSpec) -> Result<()> {
        let mut state = self.state();
        state.calls.push(Call::AddRule(*rule));
        state.fail(Op::AddRule)?;
        if state.rules.contains(rule) {
            return Err(Error::from_errno(-libc::EEXIST));
        }
        state.rules.push(*rule);
        Ok(())
    }

    async fn del_rule(&self, rule: &RuleSpec) -> Result<()> {
        let mut state = self.state();
        state.calls.push(Call::DelRule(*rule));
        state.fail(Op::DelRule)?;
        let pos = state
            .rules
            .iter()
            .position(|r| r == rule)
            .ok_or_else(|| Error::from_errno(-libc::ENOENT))?;
        state.rules.remove(pos);
        Ok(())
    }

    async fn routes(&self, table: Option<u32>) -> Result<Vec<RouteSpec>> {
        Ok(self
            .state()
            .routes
            .iter()
            .filter(|r| table.is_none_or(|t| r.table == t))
            .copied()
            .collect())
    }

    async fn add_route(&self, route: &RouteSpec) -> Result<()> {
        let mut state = self.state();
        state.calls.push(Call::AddRoute(*route));
        state.fail(Op::AddRoute)?;
        if state.routes.contains(route) {
            return Err(Error::from_errno(-libc::EEXIST));
        }
        if !state.links.iter().any(|l| l.index == route.oif) {
            return Err(Error::from_errno(-libc::ENODEV));
        }
        state.routes.push(*route);
        Ok(())
    }

    async fn del_route(&self, route: &RouteSpec) -> Result<()> {
        let mut state = self.state();
        state.calls.push(Call::DelRoute(*route));
        state.fail(Op::DelRoute)?;
        let pos = state
            .routes
            .iter()
            .position(|r| r == route)
            .ok_or_else(|| Error::from_errno(-libc::ESRCH))?;
        state.routes.remove(pos);
        Ok(())
    }

    async fn vlans(&self) -> Result<Vec<VlanSpec>> {
        Ok(self.state().vlans.clone())
    }

    async fn add_vlan(&self, vlan: &VlanSpec) -> Result<()> {
        let mut state = self.state();
        state.calls.push(Call::AddVlan(vlan.clone()));
        state.fail(Op::AddVlan)?;
        if state.links.iter().any(|l| l.name == vlan.name) {
            return Err(Error::from_errno(-libc::EEXIST));
        }
        if !state.links.iter().any(|l| l.index == vlan.parent) {
            return Err(Error::from_errno(-libc::ENODEV));
        }
        let index = state.next_index();
        state.links.push(Link::new(index, vlan.name.clone()));
        state.vlans.push(vlan.clone());
        Ok(())
    }

    async fn del_vlan(&self, vlan: &VlanSpec) -> Result<()> {
        let mut state = self.state();
        state.calls.push(Call::DelVlan(vlan.name.clone()));
        state.fail(Op::DelVlan)?;
        let pos = state
            .links
            .iter()
            .position(|l| l.name == vlan.name)
            .ok_or_else(|| Error::from_errno(-libc::ENODEV))?;
        let index = state.links.remove(pos).index;
        state.vlans.retain(|v| v.name != vlan.name);
        state.up.retain(|n| n != &vlan.name);
        state.addresses.retain(|a| a.index != index);
        Ok(())
    }

    async fn set_up(&self, name: &str) -> Result<()> {
        let mut state = self.state();
        state.calls.push(Call::SetUp(name.to_string()));
        state.fail(Op::SetUp)?;
        if !state.links.iter().any(|l| l.name == name) {
            return Err(Error::from_errno(-libc::ENODEV));
        }
        if !state.up.iter().any(|n| n == name) {
            state.up.push(name.to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(src: &str, table: u32) -> RuleSpec {
        RuleSpec {
            source: src.parse().unwrap(),
            table,
        }
    }

    #[tokio::test]
    async fn test_rule_errnos() {
        let kernel = MemoryKernel::new();
        let r = rule("10.0.0.0/8", 100);

        kernel.add_rule(&r).await.unwrap();
        assert!(kernel.add_rule(&r).await.unwrap_err().is_already_exists());
        kernel.del_rule(&r).await.unwrap();
        assert!(kernel.del_rule(&r).await.unwrap_err().is_not_found());
        assert_eq!(kernel.calls().len(), 4);
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let kernel = MemoryKernel::new();
        kernel.fail(Op::AddRule, libc::EPERM);
        let err = kernel.add_rule(&rule("10.0.0.0/8", 100)).await.unwrap_err();
        assert!(err.is_permission_denied());
        assert!(kernel.current_rules().is_empty());

        kernel.heal(Op::AddRule);
        kernel.add_rule(&rule("10.0.0.0/8", 100)).await.unwrap();
    }

    #[tokio::test]
    async fn test_vlan_becomes_link() {
        let kernel = MemoryKernel::new().with_link(2, "eth0");
        let vlan = VlanSpec {
            name: "eth0.100".into(),
            parent: 2,
            id: 100,
            protocol: 0x8100,
            mtu: None,
            txqlen: None,
        };

        kernel.add_vlan(&vlan).await.unwrap();
        kernel.set_up("eth0.100").await.unwrap();
        assert!(kernel.is_up("eth0.100"));
        assert!(kernel.links().await.unwrap().iter().any(|l| l.index == 3));

        kernel.del_vlan(&vlan).await.unwrap();
        assert!(kernel.del_vlan(&vlan).await.unwrap_err().is_not_found());
        assert!(kernel.set_up("eth0.100").await.unwrap_err().is_not_found());
    }
}
