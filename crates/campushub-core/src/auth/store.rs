//! The session store: one owned authority for "who is signed in".
//!
//! Consumers hold an `Arc<SessionStore>`, issue commands (`login`,
//! `register`, `logout`) and observe the result through `snapshot()` or a
//! `watch` receiver from `subscribe()`.
//!
//! Every login/register takes a fresh request generation when it starts;
//! logout, expiry and every committed token advance the generation too. A call whose generation is
//! no longer current when its response arrives is discarded, so a slow
//! login can never resurrect a session the user has since signed out of.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::api::{ApiClient, ApiError, AuthResponse};

use super::session::{Session, SessionSnapshot};
use super::storage::TokenStorage;
use super::token::{decode_claims, TokenError};

/// Fallback message when a login fails without a server-provided reason
pub const LOGIN_FAILED_MESSAGE: &str = "Login failed";

/// Fallback message when a registration fails without a server-provided reason
pub const REGISTER_FAILED_MESSAGE: &str = "Registration failed";

/// Fallback message when `/auth/me` fails without a server-provided reason
pub const VERIFY_FAILED_MESSAGE: &str = "Session verification failed";

#[derive(Error, Debug)]
pub enum AuthError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("server issued a malformed token: {0}")]
    Token(#[from] TokenError),

    #[error("server issued an already expired token")]
    Expired,

    #[error("failed to persist token: {0:#}")]
    Storage(anyhow::Error),

    #[error("not signed in")]
    NotSignedIn,

    #[error("superseded by a later sign-in or sign-out")]
    Superseded,
}

/// Failure result of a login/register/verify call.
///
/// `message` is what to show the user: the server's `error` text when it
/// sent one, otherwise a fixed fallback for the operation.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct AuthFailure {
    pub message: String,
    #[source]
    pub cause: AuthError,
}

impl AuthFailure {
    fn new(cause: AuthError, fallback: &str) -> Self {
        let message = match &cause {
            AuthError::Api(e) => e.server_message().map(str::to_string),
            _ => None,
        }
        .unwrap_or_else(|| fallback.to_string());
        Self { message, cause }
    }
}

pub struct SessionStore {
    api: ApiClient,
    storage: Arc<dyn TokenStorage>,
    state: watch::Sender<SessionSnapshot>,
    /// Request generation; also serializes storage writes with publishes.
    generation: Mutex<u64>,
}

impl SessionStore {
    pub fn new(api: ApiClient, storage: Arc<dyn TokenStorage>) -> Self {
        let (state, _) = watch::channel(SessionSnapshot::default());
        Self {
            api,
            storage,
            state,
            generation: Mutex::new(0),
        }
    }

    fn lock_generation(&self) -> MutexGuard<'_, u64> {
        self.generation.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn clear_storage(&self) {
        if let Err(e) = self.storage.clear() {
            warn!(error = %e, "Failed to clear stored token");
        }
    }

    fn publish_session(&self, session: Option<Session>) {
        self.state.send_modify(|s| s.session = session);
    }

    // =========================================================================
    // Observation
    // =========================================================================

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    pub fn session(&self) -> Option<Session> {
        self.state.borrow().session.clone()
    }

    pub fn is_ready(&self) -> bool {
        self.state.borrow().ready
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().session.is_some()
    }

    /// Receiver that is notified whenever the snapshot changes
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    /// Resolve once startup re-hydration has completed
    pub async fn wait_until_ready(&self) {
        let mut rx = self.subscribe();
        // The sender lives in `self`, so the channel cannot close under us.
        let _ = rx.wait_for(|s| s.ready).await;
    }

    /// The persisted bearer token, while a session is present
    pub fn token(&self) -> Option<String> {
        if !self.is_authenticated() {
            return None;
        }
        match self.storage.load() {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Failed to read stored token");
                None
            }
        }
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Re-hydrate the session from storage. Always leaves the store ready.
    pub fn initialize(&self) {
        let _guard = self.lock_generation();

        let session = match self.storage.load() {
            Ok(None) => {
                debug!("No stored token found");
                None
            }
            Ok(Some(token)) => match decode_claims(&token) {
                Err(e) => {
                    warn!(error = %e, "Stored token could not be decoded, clearing it");
                    self.clear_storage();
                    None
                }
                Ok(claims) if claims.is_expired_at(Utc::now().timestamp_millis()) => {
                    info!(exp = claims.exp(), "Stored token has expired, clearing it");
                    self.clear_storage();
                    None
                }
                Ok(claims) => {
                    let session = Session::from_claims(claims);
                    info!(subject = ?session.subject(), "Session restored from storage");
                    Some(session)
                }
            },
            Err(e) => {
                warn!(error = %e, "Failed to read stored token, starting signed out");
                None
            }
        };

        self.state.send_modify(|s| {
            s.session = session;
            s.ready = true;
        });
    }

    /// Sign in with email and password
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AuthFailure> {
        let generation = self.begin_request();
        let result = self.api.login(email, password).await;
        self.complete(generation, result, LOGIN_FAILED_MESSAGE)
            .inspect(|_| info!(email = %email, "Login successful"))
            .inspect_err(|failure| {
                let cause = &failure.cause;
                error!(email = %email, error = %cause, "Login failed");
            })
    }

    /// Create an account and sign in to it
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<Session, AuthFailure> {
        let generation = self.begin_request();
        let result = self.api.register(email, password, full_name).await;
        self.complete(generation, result, REGISTER_FAILED_MESSAGE)
            .inspect(|_| info!(email = %email, "Registration successful"))
            .inspect_err(|failure| {
                let cause = &failure.cause;
                error!(email = %email, error = %cause, "Registration failed");
            })
    }

    /// Forget the session locally. Idempotent; never touches the network.
    pub fn logout(&self) {
        let mut generation = self.lock_generation();
        *generation += 1;
        self.clear_storage();
        self.publish_session(None);
        info!("Logged out");
    }

    /// Drop the session if its `exp` has passed. Returns true if it was dropped.
    pub fn expire_if_stale(&self) -> bool {
        let mut generation = self.lock_generation();
        let stale = self
            .state
            .borrow()
            .session
            .as_ref()
            .is_some_and(Session::is_expired);
        if stale {
            *generation += 1;
            self.clear_storage();
            self.publish_session(None);
            info!("Session expired");
        }
        stale
    }

    /// Ask the server whether the current token is still honored.
    ///
    /// A 401 clears the session as a logout would. Other failures leave
    /// local state alone.
    pub async fn verify(&self) -> Result<Map<String, Value>, AuthFailure> {
        let token = self
            .token()
            .ok_or_else(|| AuthFailure::new(AuthError::NotSignedIn, VERIFY_FAILED_MESSAGE))?;
        let generation = *self.lock_generation();

        match self.api.me(&token).await {
            Ok(user) => Ok(user),
            Err(e) => {
                if e.is_unauthorized() {
                    let mut current = self.lock_generation();
                    if *current == generation {
                        *current += 1;
                        self.clear_storage();
                        self.publish_session(None);
                        warn!("Server rejected stored token, session cleared");
                    }
                } else {
                    warn!(error = %e, "Session verification failed");
                }
                Err(AuthFailure::new(e.into(), VERIFY_FAILED_MESSAGE))
            }
        }
    }

    fn begin_request(&self) -> u64 {
        let mut generation = self.lock_generation();
        *generation += 1;
        *generation
    }

    /// Commit a login/register response if `generation` is still current.
    fn complete(
        &self,
        generation: u64,
        result: Result<AuthResponse, ApiError>,
        fallback: &str,
    ) -> Result<Session, AuthFailure> {
        let fail = |cause: AuthError| AuthFailure::new(cause, fallback);

        let response = result.map_err(|e| fail(e.into()))?;
        let claims = decode_claims(&response.token).map_err(|e| fail(e.into()))?;
        if claims.is_expired_at(Utc::now().timestamp_millis()) {
            return Err(fail(AuthError::Expired));
        }

        let mut current = self.lock_generation();
        if *current != generation {
            debug!(generation, current = *current, "Discarding superseded auth response");
            return Err(fail(AuthError::Superseded));
        }
        // A newly stored token outdates any verify still in flight for the old one.
        *current += 1;

        self.storage
            .store(&response.token)
            .map_err(|e| fail(AuthError::Storage(e)))?;

        let session = Session::merged(claims, response.user);
        self.publish_session(Some(session.clone()));
        Ok(session)
    }
}
