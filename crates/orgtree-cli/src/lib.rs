//! orgtree CLI - configuration and wiring for the `orgtree` binary
//!
//! The binary runs every command against a fresh in-memory deployment:
//! - Configuration from TOML, environment and flags ([`config`])
//! - Directory seeding, organization bootstrap and the command
//!   operations themselves ([`deployment`])

pub mod config;
pub mod deployment;

pub use config::OrgtreeConfig;
pub use deployment::{Deployment, RoleReport};
