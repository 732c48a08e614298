//! Core types: errors, configuration, shared limits.

pub mod config;
pub mod errors;
