use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unauthorized: {}", .message.as_deref().unwrap_or("token may be expired"))]
    Unauthorized { message: Option<String> },

    #[error("Request rejected ({status}): {}", .message.as_deref().unwrap_or("no details"))]
    Rejected {
        status: reqwest::StatusCode,
        message: Option<String>,
    },

    #[error("Server error ({status}): {body}")]
    ServerError {
        status: reqwest::StatusCode,
        message: Option<String>,
        body: String,
    },

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Error payload shape returned by the CampusHub backend: `{"error": "..."}`.
/// A non-string `error` fails to parse and the caller falls back to its
/// generic message.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Pull the `error` field out of a JSON error body, if there is one.
    pub fn extract_message(body: &str) -> Option<String> {
        serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.error)
            .filter(|m| !m.trim().is_empty())
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let message = Self::extract_message(body);
        match status.as_u16() {
            401 => ApiError::Unauthorized { message },
            500..=599 => ApiError::ServerError {
                status,
                message,
                body: Self::truncate_body(body),
            },
            _ => ApiError::Rejected { status, message },
        }
    }

    /// The human-readable message the server attached to this failure.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiError::Unauthorized { message }
            | ApiError::Rejected { message, .. }
            | ApiError::ServerError { message, .. } => message.as_deref(),
            ApiError::NetworkError(_) | ApiError::InvalidResponse(_) => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_extract_message() {
        assert_eq!(
            ApiError::extract_message(r#"{"error": "Invalid credentials"}"#).as_deref(),
            Some("Invalid credentials")
        );
        assert_eq!(ApiError::extract_message(r#"{"error": ""}"#), None);
        assert_eq!(ApiError::extract_message(r#"{"detail": "nope"}"#), None);
        assert_eq!(ApiError::extract_message("<html>Bad Gateway</html>"), None);
        assert_eq!(ApiError::extract_message(""), None);
    }

    #[test]
    fn test_non_string_error_field_is_ignored() {
        assert_eq!(ApiError::extract_message(r#"{"error": 42}"#), None);
        assert_eq!(ApiError::extract_message(r#"{"error": {"code": "E1"}}"#), None);
        assert_eq!(ApiError::extract_message(r#"{"error": null}"#), None);

        let err = ApiError::from_status(reqwest::StatusCode::BAD_REQUEST, r#"{"error": true}"#);
        assert_eq!(err.server_message(), None);
    }

    #[test]
    fn test_from_status_classification() {
        let err = ApiError::from_status(StatusCode::UNAUTHORIZED, r#"{"error": "Invalid credentials"}"#);
        assert!(err.is_unauthorized());
        assert_eq!(err.server_message(), Some("Invalid credentials"));

        let err = ApiError::from_status(StatusCode::BAD_REQUEST, r#"{"error": "Email already exists"}"#);
        assert!(matches!(err, ApiError::Rejected { status, .. } if status == StatusCode::BAD_REQUEST));
        assert_eq!(err.server_message(), Some("Email already exists"));

        let err = ApiError::from_status(StatusCode::INTERNAL_SERVER_ERROR, "boom");
        assert!(matches!(err, ApiError::ServerError { .. }));
        assert_eq!(err.server_message(), None);
    }

    #[test]
    fn test_truncate_body() {
        let long = "x".repeat(MAX_ERROR_BODY_LENGTH + 10);
        let truncated = ApiError::truncate_body(&long);
        assert!(truncated.starts_with(&"x".repeat(MAX_ERROR_BODY_LENGTH)));
        assert!(truncated.ends_with("(truncated, 510 total bytes)"));

        assert_eq!(ApiError::truncate_body("short"), "short");
    }
}
