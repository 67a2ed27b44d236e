//! CLI command implementations.

pub mod convert;
pub mod replay;
