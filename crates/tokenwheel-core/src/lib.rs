//! # tokenwheel-core
//!
//! Domain layer for Token Wheel: interactive, token-by-token text building
//! against a language model's next-token distribution.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`distribution`] | Full-vocabulary probability snapshots, temperature scaling |
//! | [`categorizer`] | Threshold partitioning and Other-bucket sampling |
//! | [`session`] | Session state machine and the in-memory `SessionStore` |
//! | [`oracle`] | Traits for the external model/tokenizer and its provider |
//! | [`config`] | Configuration model |
//! | [`error`] | `WheelError` taxonomy |

pub mod categorizer;
pub mod config;
pub mod distribution;
pub mod error;
pub mod oracle;
pub mod session;

// Re-export common error type
pub use error::{Result, WheelError};
