//! Session management for SSO.
//!
//! Sessions live in a [`SessionStore`]; the default [`MemorySessionStore`]
//! keeps them for the life of the process.

pub mod store;
pub mod types;

pub use store::{MemorySessionStore, RetentionPolicy, SessionStore};
pub use types::{Session, SessionId, SessionState, SessionValidation, SESSION_TTL_SECS};
