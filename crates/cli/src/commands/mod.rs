//! Subcommand implementations

pub mod cluster;
pub mod nodes;
pub mod pods;
