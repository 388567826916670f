//! Reconcile Linux policy routing against a declarative document.
//!
//! A document lists policy rules, routes and VLAN sub-interfaces. Each
//! [`Engine::apply`] call resolves it against the host's links and
//! addresses, then converges the kernel: missing resources are added,
//! resources dropped from the document are deleted, and tables under
//! hard-sync are purged of anything not declared.
//!
//! # Example
//!
//! ```ignore
//! use ipruler::{Engine, NetlinkKernel};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = Engine::new(NetlinkKernel::new()?);
//!
//!     let report = engine
//!         .apply(&b"rules:\n  - from: 172.31.201.11/32\n    table: 101\n"[..])
//!         .await?;
//!     println!("{}", report);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `testing` - [`MemoryKernel`], an in-memory kernel recording each call

pub mod desired;
pub mod document;
pub mod engine;
pub mod error;
pub mod kernel;
pub mod netlink;
pub mod persist;
pub mod reconcile;
pub mod resolve;
pub mod util;

pub use desired::{Config, RouteSpec, RuleSpec, Settings, VlanSpec};
pub use document::Document;
pub use engine::{CycleReport, Engine, EngineOptions};
pub use error::{Error, Result};
#[cfg(any(test, feature = "testing"))]
pub use kernel::MemoryKernel;
pub use kernel::{Kernel, NetlinkKernel};
pub use persist::ScriptWriter;
pub use reconcile::PhaseReport;
