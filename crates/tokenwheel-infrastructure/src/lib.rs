//! # tokenwheel-infrastructure
//!
//! Adapters behind the core traits: configuration loading, HTTP and
//! fixed-table model oracles, and the load-on-demand oracle registry.

pub mod config_service;
pub mod oracle;
pub mod paths;

pub use crate::config_service::{ConfigService, ConfigSource};
pub use crate::oracle::{FixedOracle, HttpOracle, OracleRegistry};
pub use crate::paths::TokenWheelPaths;
