//! The declarative document, as submitted over HTTP or read from disk.
//!
//! ```yaml
//! settings:
//!   table-hard-sync: [101]
//! vlans:
//!   - { name: eth0.100, link: eth0, id: 100 }
//! routes:
//!   - { to: default, via: 172.31.201.1, table: 102 }
//! rules:
//!   - { from: 172.31.201.11/32, table: 101 }
//! ```
//!
//! Fields are kept as plain strings here; turning them into kernel
//! values is the job of [`crate::resolve`].

use serde::Deserialize;

use crate::error::{Error, Result};

/// A parsed document. Every section is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Document {
    pub settings: SettingsEntry,
    pub rules: Vec<RuleEntry>,
    pub routes: Vec<RouteEntry>,
    pub vlans: Vec<VlanEntry>,
}

/// `settings` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SettingsEntry {
    /// Tables in which undeclared rules and routes are purged.
    pub table_hard_sync: Vec<u32>,
}

/// `ip rule add from <from> table <table>`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RuleEntry {
    pub from: String,
    pub table: u32,
}

/// `ip route add to <to> [via <via>] table <table> [dev <dev>] ...`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RouteEntry {
    /// Destination CIDR, or `default`.
    pub to: String,
    pub via: Option<String>,
    pub table: u32,
    pub dev: Option<String>,
    pub protocol: Option<String>,
    pub on_link: bool,
    pub scope: Option<String>,
}

/// `ip link add link <link> name <name> type vlan id <id> ...`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct VlanEntry {
    pub name: String,
    /// Parent interface name.
    pub link: String,
    pub id: u16,
    pub protocol: Option<String>,
    pub mtu: Option<u32>,
    pub txqlen: Option<u32>,
}

impl Document {
    /// Parse a document from raw bytes.
    ///
    /// An empty byte string (or one holding only whitespace and comments)
    /// is the empty document rather than an error.
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(data)
            .map_err(|e| Error::MalformedDocument(format!("not UTF-8: {}", e)))?;

        let blank = text
            .lines()
            .map(str::trim)
            .all(|line| line.is_empty() || line.starts_with('#'));
        if blank {
            return Ok(Self::default());
        }

        // `null`/`~` deserialize as unit; treat them like an empty file.
        let doc: Option<Document> =
            serde_yaml::from_str(text).map_err(|e| Error::MalformedDocument(e.to_string()))?;
        Ok(doc.unwrap_or_default())
    }

    /// Check if the document declares nothing at all.
    pub fn is_empty(&self) -> bool {
        self.settings.table_hard_sync.is_empty()
            && self.rules.is_empty()
            && self.routes.is_empty()
            && self.vlans.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_document() {
        let doc = Document::from_slice(
            br#"
settings:
  table-hard-sync:
    - 101
vlans:
  - name: eth0.100
    link: eth0
    id: 100
    protocol: 802.1ad
    mtu: 1400
routes:
  - to: default
    via: 172.31.201.1
    table: 102
  - to: 10.9.0.0/16
    dev: eth0
    table: 300
    protocol: static
    scope: link
    on-link: true
rules:
  - from: 172.31.201.11/32
    table: 101
"#,
        )
        .unwrap();

        assert_eq!(doc.settings.table_hard_sync, vec![101]);
        assert_eq!(doc.vlans[0].protocol.as_deref(), Some("802.1ad"));
        assert_eq!(doc.vlans[0].mtu, Some(1400));
        assert_eq!(doc.vlans[0].txqlen, None);
        assert_eq!(doc.routes[0].via.as_deref(), Some("172.31.201.1"));
        assert!(!doc.routes[0].on_link);
        assert!(doc.routes[1].on_link);
        assert_eq!(doc.routes[1].scope.as_deref(), Some("link"));
        assert_eq!(
            doc.rules[0],
            RuleEntry {
                from: "172.31.201.11/32".into(),
                table: 101
            }
        );
        assert!(!doc.is_empty());
    }

    #[test]
    fn test_blank_is_empty() {
        let inputs: [&[u8]; 4] = [b"", b"   \n", b"# nothing yet\n", b"~"];
        for input in inputs {
            let doc = Document::from_slice(input).unwrap();
            assert!(doc.is_empty(), "{:?}", String::from_utf8_lossy(input));
        }
        assert!(Document::from_slice(b"rules: []\nsettings: {}").unwrap().is_empty());
    }

    #[test]
    fn test_settings_alone_is_not_empty() {
        let doc = Document::from_slice(b"settings:\n  table-hard-sync: [101]\n").unwrap();
        assert!(!doc.is_empty());
    }

    #[test]
    fn test_malformed() {
        assert!(matches!(
            Document::from_slice(b"rules: [from: x"),
            Err(Error::MalformedDocument(_))
        ));
        assert!(matches!(
            Document::from_slice(b"rules:\n  - table: eleven\n"),
            Err(Error::MalformedDocument(_))
        ));
        assert!(matches!(
            Document::from_slice(&[0xff, 0xfe]),
            Err(Error::MalformedDocument(_))
        ));
    }
}
