//! Authentication module for managing the signed-in session.
//!
//! This module provides:
//! - `SessionStore`: the single owner of session state, with login,
//!   register, logout and startup re-hydration
//! - `Session`: the decoded token claims merged with server profile fields
//! - `TokenStorage`: where the raw token lives between runs (file, OS
//!   keychain, or memory)
//!
//! Token claims are decoded without signature verification and are used
//! for display only.

pub mod credentials;
pub mod session;
pub mod storage;
pub mod store;
pub mod token;

pub use credentials::KeyringTokenStorage;
pub use session::{Session, SessionSnapshot};
pub use storage::{FileTokenStorage, MemoryTokenStorage, TokenStorage, TOKEN_KEY};
pub use store::{
    AuthError, AuthFailure, SessionStore, LOGIN_FAILED_MESSAGE, REGISTER_FAILED_MESSAGE,
    VERIFY_FAILED_MESSAGE,
};
pub use token::{decode_claims, Claims, TokenError};
