//! Cluster controller process: configuration and request surface

pub mod api;
pub mod config;
