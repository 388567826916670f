//! Fixed-size rtnetlink wire structures and their constants.

pub mod addr;
pub mod link;
pub mod route;
pub mod rule;
