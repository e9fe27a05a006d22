//! API client for the CampusHub authentication endpoints.
//!
//! This module provides the `ApiClient` struct for the three calls the
//! session store needs: login, register, and fetching the current user.

use std::time::Duration;

use anyhow::Result;
use reqwest::{header, Client};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    email: &'a str,
    password: &'a str,
    full_name: &'a str,
}

/// Successful login/register payload: the issued token plus the profile
/// fields the server chose to return alongside it.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub user: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct MeResponse {
    #[serde(default, deserialize_with = "null_as_empty")]
    user: Map<String, Value>,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Map<String, Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}

/// API client for CampusHub.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client rooted at `base_url`
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Exchange credentials for a token
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ApiError> {
        debug!(email = %email, "Sending login request");
        self.post_json("/auth/login", &LoginRequest { email, password })
            .await
    }

    /// Create an account and receive a token for it
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<AuthResponse, ApiError> {
        debug!(email = %email, "Sending register request");
        self.post_json(
            "/auth/register",
            &RegisterRequest {
                email,
                password,
                full_name,
            },
        )
        .await
    }

    /// Ask the server who the bearer of `token` is
    pub async fn me(&self, token: &str) -> Result<Map<String, Value>, ApiError> {
        let response = self
            .client
            .get(self.url("/auth/me"))
            .header(header::ACCEPT, "application/json")
            .bearer_auth(token)
            .send()
            .await?;

        let me: MeResponse = Self::parse(response).await?;
        Ok(me.user)
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self
            .client
            .post(self.url(path))
            .header(header::ACCEPT, "application/json")
            .json(body)
            .send()
            .await?;

        Self::parse(response).await
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn parse<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        let response = Self::check_response(response).await?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header as header_eq, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> ApiClient {
        ApiClient::new(&server.uri(), Duration::from_secs(5)).expect("client")
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let api = ApiClient::new("http://localhost:8000/", Duration::from_secs(1)).unwrap();
        assert_eq!(api.base_url(), "http://localhost:8000");
        assert_eq!(api.url("/auth/login"), "http://localhost:8000/auth/login");
    }

    #[test]
    fn test_parse_auth_response_without_user() {
        let resp: AuthResponse = serde_json::from_str(r#"{"token": "abc"}"#).unwrap();
        assert_eq!(resp.token, "abc");
        assert!(resp.user.is_empty());

        let resp: AuthResponse = serde_json::from_str(r#"{"token": "abc", "user": null}"#).unwrap();
        assert!(resp.user.is_empty());
    }

    #[tokio::test]
    async fn test_login_sends_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .and(body_json(json!({"email": "ada@uni.edu", "password": "pw"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token": "t.o.k",
                "user": {"id": 7, "email": "ada@uni.edu"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let resp = client_for(&server).login("ada@uni.edu", "pw").await.unwrap();
        assert_eq!(resp.token, "t.o.k");
        assert_eq!(resp.user.get("id"), Some(&json!(7)));
    }

    #[tokio::test]
    async fn test_register_sends_full_name() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/register"))
            .and(body_json(json!({
                "email": "ada@uni.edu",
                "password": "pw",
                "full_name": "Ada Lovelace"
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "token": "t.o.k",
                "user": {"full_name": "Ada Lovelace"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let resp = client_for(&server)
            .register("ada@uni.edu", "pw", "Ada Lovelace")
            .await
            .unwrap();
        assert_eq!(resp.user.get("full_name"), Some(&json!("Ada Lovelace")));
    }

    #[tokio::test]
    async fn test_login_error_carries_server_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"error": "Invalid credentials"})),
            )
            .mount(&server)
            .await;

        let err = client_for(&server).login("ada@uni.edu", "bad").await.unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(err.server_message(), Some("Invalid credentials"));
    }

    #[tokio::test]
    async fn test_garbage_success_body_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client_for(&server).login("a", "b").await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_me_uses_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/me"))
            .and(header_eq("authorization", "Bearer t.o.k"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"user": {"sub": "7", "role": "student"}})),
            )
            .mount(&server)
            .await;

        let user = client_for(&server).me("t.o.k").await.unwrap();
        assert_eq!(user.get("role"), Some(&json!("student")));
    }
}
