use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::token::Claims;

/// Buffer time before expiry at which a session counts as expiring soon (5 minutes)
const EXPIRY_WARNING_MINUTES: i64 = 5;

/// The authenticated identity: token claims, optionally overlaid with the
/// profile fields the API returned at login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Session {
    fields: Map<String, Value>,
}

impl Session {
    /// Session derived from a token alone (startup path).
    pub fn from_claims(claims: Claims) -> Self {
        Self {
            fields: claims.into_map(),
        }
    }

    /// Claims first, then profile on top: profile wins on key collisions.
    pub fn merged(claims: Claims, profile: Map<String, Value>) -> Self {
        let mut fields = claims.into_map();
        fields.extend(profile);
        Self { fields }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Token subject (the user id as issued by the server)
    pub fn subject(&self) -> Option<&str> {
        self.str_field("sub")
    }

    pub fn role(&self) -> Option<&str> {
        self.str_field("role")
    }

    pub fn email(&self) -> Option<&str> {
        self.str_field("email")
    }

    pub fn full_name(&self) -> Option<&str> {
        self.str_field("full_name")
    }

    /// Numeric user id from the profile, falling back to a numeric `sub`.
    pub fn user_id(&self) -> Option<i64> {
        self.fields
            .get("id")
            .and_then(Value::as_i64)
            .or_else(|| self.subject().and_then(|s| s.parse().ok()))
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let exp = self.fields.get("exp")?;
        let secs = exp.as_i64().or_else(|| exp.as_f64().map(|f| f as i64))?;
        Utc.timestamp_opt(secs, 0).single()
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at().map(|at| Utc::now() > at).unwrap_or(false)
    }

    /// Check if the session will expire within the warning window
    pub fn expires_soon(&self) -> bool {
        self.expires_at()
            .map(|at| Utc::now() + Duration::minutes(EXPIRY_WARNING_MINUTES) > at)
            .unwrap_or(false)
    }

    /// Get minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self) -> Option<i64> {
        self.expires_at()
            .map(|at| (at - Utc::now()).num_minutes().max(0))
    }

    /// Name to greet the user with: full name, then email, then subject
    pub fn display_name(&self) -> &str {
        self.full_name()
            .or_else(|| self.email())
            .or_else(|| self.subject())
            .unwrap_or("unknown user")
    }
}

/// What subscribers observe: the current session and whether startup
/// re-hydration has finished.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    pub session: Option<Session>,
    pub ready: bool,
}

impl SessionSnapshot {
    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }
}
