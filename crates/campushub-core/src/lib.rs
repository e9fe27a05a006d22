//! CampusHub client core.
//!
//! Session state for CampusHub clients: a `SessionStore` that signs users in
//! against the CampusHub API, keeps the issued token in persistent storage,
//! and restores the session on the next start.

pub mod api;
pub mod auth;
pub mod config;

pub use api::{ApiClient, ApiError};
pub use auth::{AuthFailure, Session, SessionSnapshot, SessionStore};
pub use config::{Config, StorageBackend};
