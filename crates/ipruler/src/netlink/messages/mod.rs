//! Strongly-typed rtnetlink dump replies.
//!
//! Each type parses one `RTM_NEW*` payload with winnow and keeps only the
//! attributes the reconciler compares or displays.

mod address;
mod link;
mod route;
mod rule;

pub use address::*;
pub use link::*;
pub use route::*;
pub use rule::*;
