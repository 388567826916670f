//! Symbol tables for the names a document may use.
//!
//! Lookups are case-insensitive and strict: unlike `ip`, numeric values
//! are not accepted in place of a name.

/// Get the name of a routing protocol.
pub fn route_protocol_name(id: u8) -> &'static str {
    match id {
        2 => "kernel",
        3 => "boot",
        4 => "static",
        _ => "unknown",
    }
}

/// Get protocol ID from name.
pub fn route_protocol_id(name: &str) -> Option<u8> {
    match name.to_lowercase().as_str() {
        "kernel" => Some(2),
        "boot" => Some(3),
        "static" => Some(4),
        _ => None,
    }
}

/// Get the name of a route scope.
pub fn route_scope_name(id: u8) -> &'static str {
    match id {
        0 => "global",
        253 => "link",
        254 => "host",
        _ => "unknown",
    }
}

/// Get scope ID from name.
pub fn route_scope_id(name: &str) -> Option<u8> {
    match name.to_lowercase().as_str() {
        "global" | "universe" => Some(0),
        "link" => Some(253),
        "host" => Some(254),
        _ => None,
    }
}

/// Get the name of a next-hop flag.
pub fn route_flag_name(id: u32) -> &'static str {
    match id {
        2 => "pervasive",
        4 => "onlink",
        _ => "unknown",
    }
}

/// Get next-hop flag value from name.
pub fn route_flag_id(name: &str) -> Option<u32> {
    match name.to_lowercase().as_str() {
        "pervasive" => Some(2),
        "onlink" => Some(4),
        _ => None,
    }
}

/// Get the name of a VLAN tag protocol, spelled the way `ip link` takes it.
pub fn vlan_protocol_name(ethertype: u16) -> &'static str {
    match ethertype {
        0x8100 => "802.1Q",
        0x88a8 => "802.1ad",
        _ => "unknown",
    }
}

/// Get VLAN tag protocol ethertype from name.
pub fn vlan_protocol_id(name: &str) -> Option<u16> {
    match name.to_lowercase().as_str() {
        "802.1q" => Some(0x8100),
        "802.1ad" => Some(0x88a8),
        _ => None,
    }
}
