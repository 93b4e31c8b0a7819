//! Oracle backends and the registry that loads them.

mod fixed;
mod http;
mod registry;

pub use fixed::FixedOracle;
pub use http::HttpOracle;
pub use registry::{OracleRegistry, fixed_model_config};
