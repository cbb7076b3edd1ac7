//! Configuration management for claude-slash.
//!
//! A single global TOML file controls where releases come from
//! ([`UpdateConfig`]) and where installations are searched for
//! ([`InstallConfig`]). See [`global`] for the file format.

pub mod global;

pub use global::{GlobalConfig, InstallConfig, UpdateConfig};
