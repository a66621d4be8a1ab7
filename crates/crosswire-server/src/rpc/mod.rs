//! Channel registry and middleware composition.

pub mod middleware;
pub mod registry;
