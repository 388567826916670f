//! VLAN link creation and link state management.
//!
//! # Example
//!
//! ```ignore
//! use ipruler::netlink::Connection;
//! use ipruler::netlink::link::VlanLink;
//!
//! let conn = Connection::new()?;
//!
//! // ip link add link eth0 name eth0.100 type vlan id 100 protocol 802.1Q
//! conn.add_link(VlanLink::new("eth0.100", 2, 100).protocol(0x8100)).await?;
//! conn.set_link_state("eth0.100", true).await?;
//! ```

use super::builder::MessageBuilder;
use super::connection::{Connection, ack_request, create_request};
use super::error::Result;
use super::message::NlMsgType;
use super::types::link::{IfInfoMsg, iff, ifla, ifla_info, ifla_vlan};

/// 802.1Q tag protocol ethertype.
pub const ETH_P_8021Q: u16 = 0x8100;
/// 802.1ad (QinQ) tag protocol ethertype.
pub const ETH_P_8021AD: u16 = 0x88a8;

/// Configuration for a VLAN interface.
#[derive(Debug, Clone)]
pub struct VlanLink {
    name: String,
    parent_index: u32,
    vlan_id: u16,
    protocol: u16,
    mtu: Option<u32>,
    txqlen: Option<u32>,
}

impl VlanLink {
    /// Create a new VLAN interface configuration.
    ///
    /// * `name` - Name for the VLAN interface (e.g., "eth0.100")
    /// * `parent_index` - Index of the parent interface
    /// * `vlan_id` - VLAN ID (1-4094)
    pub fn new(name: impl Into<String>, parent_index: u32, vlan_id: u16) -> Self {
        Self {
            name: name.into(),
            parent_index,
            vlan_id,
            protocol: ETH_P_8021Q,
            mtu: None,
            txqlen: None,
        }
    }

    /// Set the tag protocol ethertype.
    pub fn protocol(mut self, protocol: u16) -> Self {
        self.protocol = protocol;
        self
    }

    /// Set the MTU.
    pub fn mtu(mut self, mtu: u32) -> Self {
        self.mtu = Some(mtu);
        self
    }

    /// Set the transmit queue length.
    pub fn txqlen(mut self, txqlen: u32) -> Self {
        self.txqlen = Some(txqlen);
        self
    }

    /// Get the interface name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Build the `RTM_NEWLINK` request.
    pub fn build(&self) -> MessageBuilder {
        let mut builder = create_request(NlMsgType::RTM_NEWLINK);
        builder.append(&IfInfoMsg::new());
        builder.append_attr_str(ifla::IFNAME, &self.name);
        builder.append_attr_u32(ifla::LINK, self.parent_index);

        if let Some(mtu) = self.mtu {
            builder.append_attr_u32(ifla::MTU, mtu);
        }
        if let Some(txqlen) = self.txqlen {
            builder.append_attr_u32(ifla::TXQLEN, txqlen);
        }

        let linkinfo = builder.nest_start(ifla::LINKINFO);
        builder.append_attr_str(ifla_info::KIND, "vlan");

        let data = builder.nest_start(ifla_info::DATA);
        builder.append_attr_u16(ifla_vlan::ID, self.vlan_id);
        builder.append_attr_u16_be(ifla_vlan::PROTOCOL, self.protocol);
        builder.nest_end(data);

        builder.nest_end(linkinfo);

        builder
    }
}

/// Build a request addressing an existing link by name.
fn named_link_request(msg_type: u16, ifinfo: IfInfoMsg, name: &str) -> MessageBuilder {
    let mut builder = ack_request(msg_type);
    builder.append(&ifinfo);
    builder.append_attr_str(ifla::IFNAME, name);
    builder
}

impl Connection {
    /// Create a VLAN interface.
    pub async fn add_link(&self, link: VlanLink) -> Result<()> {
        let context = format!("add link {}", link.name());
        self.request_ack(link.build())
            .await
            .map_err(|e| e.with_context(context))
    }

    /// Delete a network interface by name.
    pub async fn del_link(&self, ifname: &str) -> Result<()> {
        let builder = named_link_request(NlMsgType::RTM_DELLINK, IfInfoMsg::new(), ifname);
        self.request_ack(builder)
            .await
            .map_err(|e| e.with_context(format!("delete link {}", ifname)))
    }

    /// Set the administrative state of a network interface by name.
    pub async fn set_link_state(&self, ifname: &str, up: bool) -> Result<()> {
        let mut ifinfo = IfInfoMsg::new();
        ifinfo.ifi_flags = if up { iff::UP } else { 0 };
        ifinfo.ifi_change = iff::UP;

        let builder = named_link_request(NlMsgType::RTM_SETLINK, ifinfo, ifname);
        self.request_ack(builder)
            .await
            .map_err(|e| e.with_context(format!("set link {} state", ifname)))
    }
}
