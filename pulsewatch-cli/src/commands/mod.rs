//! CLI command implementations.

pub mod probe;
