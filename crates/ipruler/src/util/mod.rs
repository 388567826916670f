//! Shared utilities.

pub mod names;

pub use names::{
    route_flag_id, route_flag_name, route_protocol_id, route_protocol_name, route_scope_id,
    route_scope_name, vlan_protocol_id, vlan_protocol_name,
};
