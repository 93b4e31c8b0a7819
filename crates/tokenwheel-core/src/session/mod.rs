//! Session domain module.
//!
//! This module contains the session model and the in-memory store that owns
//! every live session.
//!
//! # Module Structure
//!
//! - `model`: Core session domain model (`Session`, `TokenSelection`, `SessionSnapshot`)
//! - `store`: Session lifecycle management (`SessionStore`)
//!
//! # Usage
//!
//! ```ignore
//! use tokenwheel_core::session::{SessionStore, TokenSelection};
//!
//! let store = SessionStore::new();
//! let id = store.create("gpt2").await.session_id;
//! store.with_session(&id, |s| s.set_prompt("Hello")).await?;
//! ```

mod model;
mod store;

// Re-export public API
pub use model::{Session, SessionSnapshot, SessionState, TokenSelection};
pub use store::{SessionHandle, SessionStore};
