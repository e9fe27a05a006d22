//! Claims extraction for compact JWTs.
//!
//! This does NOT verify the signature. The decoded claims are only fit for
//! display and UX decisions such as hiding a stale session; the server
//! remains the sole authority on whether a token is genuine.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TokenError {
    #[error("expected 3 dot-separated segments, found {0}")]
    SegmentCount(usize),

    #[error("payload is not valid base64url: {0}")]
    Base64(String),

    #[error("payload is not valid JSON: {0}")]
    Json(String),

    #[error("payload is not a JSON object")]
    NotAnObject,

    #[error("payload has no numeric `exp` claim")]
    MissingExpiry,
}

/// Claims decoded from a token payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Claims {
    map: Map<String, Value>,
    exp: i64,
}

impl Claims {
    /// Expiration time in seconds since the Unix epoch
    pub fn exp(&self) -> i64 {
        self.exp
    }

    /// A token is expired once `exp * 1000` is strictly before `now_ms`.
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        self.exp.saturating_mul(1000) < now_ms
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.map.get(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.map
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.map
    }
}

/// Decode the payload segment of `token` into its claims.
pub fn decode_claims(token: &str) -> Result<Claims, TokenError> {
    let segments: Vec<&str> = token.trim().split('.').collect();
    if segments.len() != 3 {
        return Err(TokenError::SegmentCount(segments.len()));
    }

    // Some issuers pad base64url segments; the decoder wants them bare.
    let payload = segments[1].trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| TokenError::Base64(e.to_string()))?;

    let value: Value =
        serde_json::from_slice(&bytes).map_err(|e| TokenError::Json(e.to_string()))?;
    let Value::Object(map) = value else {
        return Err(TokenError::NotAnObject);
    };

    let exp = match map.get("exp") {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .ok_or(TokenError::MissingExpiry)?,
        _ => return Err(TokenError::MissingExpiry),
    };

    Ok(Claims { map, exp })
}
