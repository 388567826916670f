//! Error taxonomy of a reconcile cycle.

use std::io;
use std::path::PathBuf;

use crate::netlink;

/// Result type for reconciler operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can end a reconcile cycle.
///
/// Only [`Error::Kernel`] is fatal; every other variant leaves the engine
/// state untouched and the caller may simply try again with a new document.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The document is not valid YAML for the expected schema.
    #[error("malformed document: {0}")]
    MalformedDocument(String),

    /// The document declares nothing at all.
    #[error("The given config is parsed as an empty config. skipped")]
    EmptyDocument,

    /// A protocol, scope, flag or VLAN protocol name is not recognized.
    #[error("unknown {field} '{value}'")]
    UnresolvableSymbol {
        /// Which document field carried the symbol.
        field: &'static str,
        /// The offending value.
        value: String,
    },

    /// An address or CIDR does not parse.
    #[error("invalid address '{0}'")]
    UnresolvableAddress(String),

    /// No link owns a subnet containing the gateway.
    #[error("no interface found supporting the address {0}")]
    UnresolvableGateway(String),

    /// A named device does not exist.
    #[error("device '{0}' not found")]
    UnresolvableDevice(String),

    /// The kernel refused a query or mutation.
    #[error("{op}: {source}")]
    Kernel {
        /// What was being attempted.
        op: String,
        /// The underlying transport error.
        #[source]
        source: netlink::Error,
    },

    /// Writing the boot-time replay script failed.
    #[error("failed to persist to {}: {source}", path.display())]
    Persistence {
        /// Target file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Wrap a kernel error with the operation that produced it.
    pub fn kernel(op: impl Into<String>, source: netlink::Error) -> Self {
        Self::Kernel {
            op: op.into(),
            source,
        }
    }

    /// Check whether the process should stop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Kernel { .. })
    }

    /// Check whether the error is a rejection of the submitted document.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::MalformedDocument(_)
                | Self::EmptyDocument
                | Self::UnresolvableSymbol { .. }
                | Self::UnresolvableAddress(_)
                | Self::UnresolvableGateway(_)
                | Self::UnresolvableDevice(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_kernel_is_fatal() {
        let err = Error::kernel("add rule", netlink::Error::from_errno(-libc::EPERM));
        assert!(err.is_fatal());
        assert!(!err.is_rejection());
        assert!(err.to_string().starts_with("add rule:"));

        assert!(!Error::EmptyDocument.is_fatal());
        assert!(Error::EmptyDocument.is_rejection());
        assert!(
            !Error::Persistence {
                path: "/tmp/x".into(),
                source: io::Error::other("disk full"),
            }
            .is_fatal()
        );
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            Error::EmptyDocument.to_string(),
            "The given config is parsed as an empty config. skipped"
        );
        let err = Error::UnresolvableSymbol {
            field: "protocol",
            value: "bgp".into(),
        };
        assert_eq!(err.to_string(), "unknown protocol 'bgp'");
    }
}
