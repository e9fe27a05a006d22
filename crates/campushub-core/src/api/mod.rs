//! REST API client module for the CampusHub backend.
//!
//! This module provides the `ApiClient` for the `/auth` endpoints.
//! The backend issues JWT bearer tokens from `/auth/login` and
//! `/auth/register` and echoes their claims back from `/auth/me`.

pub mod client;
pub mod error;

pub use client::{ApiClient, AuthResponse, DEFAULT_REQUEST_TIMEOUT_SECS};
pub use error::ApiError;
