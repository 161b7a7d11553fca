//! Backend HTTP client.

use reqwest::{Client, ClientBuilder, StatusCode, header};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use super::request::ApiRequest;
use crate::error::{Error, Result};

/// Default user agent for the application.
pub const USER_AGENT: &str = concat!("heartline-session/", env!("CARGO_PKG_VERSION"));

/// Default connection timeout.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Executes single calls against the backend.
///
/// Cheap to clone: clones share one connection pool. No overall request
/// timeout is set by default; callers that need one use
/// [`ApiClientBuilder::request_timeout`].
#[derive(Debug, Clone)]
pub struct ApiClient {
    inner: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a client for `base_url` with default settings.
    pub fn new(base_url: &str) -> Result<Self> {
        Self::builder(base_url).build()
    }

    /// Create a new builder.
    pub fn builder(base_url: &str) -> ApiClientBuilder {
        ApiClientBuilder {
            builder: Client::builder()
                .user_agent(USER_AGENT)
                .connect_timeout(CONNECT_TIMEOUT),
            base_url: base_url.to_string(),
        }
    }

    /// Base address requests are resolved against.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Perform `request` and deserialize the 2xx JSON body as `T`.
    ///
    /// An empty success body deserializes as JSON `null`, so `()` and
    /// `Option<_>` work for endpoints that return nothing. Non-2xx responses
    /// become [`Error::Http`] with the backend's message.
    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    pub async fn send<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T> {
        let mut builder = self
            .inner
            .request(request.method.into(), self.endpoint(&request.path))
            .header(header::CONTENT_TYPE, "application/json");

        if let Some(token) = &request.access_token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = error_message(status, &body);
            debug!(status = status.as_u16(), %message, "Backend returned an error");
            return Err(Error::http(status.as_u16(), message));
        }

        if body.trim().is_empty() {
            return Ok(serde_json::from_value(serde_json::Value::Null)?);
        }
        serde_json::from_str(&body).map_err(|e| {
            warn!(error = %e, "Backend returned an unexpected body");
            Error::Json(e)
        })
    }
}

/// Extract a human-readable message from an error response.
///
/// Prefers the JSON `message` field, then `error`, then the raw body. An
/// empty or non-JSON body yields `HTTP_<status>`.
fn error_message(status: StatusCode, body: &str) -> String {
    let fallback = format!("HTTP_{}", status.as_u16());
    if body.trim().is_empty() {
        return fallback;
    }
    let Ok(json) = serde_json::from_str::<serde_json::Value>(body) else {
        return fallback;
    };
    ["message", "error"]
        .iter()
        .filter_map(|field| json.get(field).and_then(|v| v.as_str()))
        .find(|s| !s.is_empty())
        .map_or_else(|| body.to_string(), String::from)
}

/// Builder for [`ApiClient`].
pub struct ApiClientBuilder {
    builder: ClientBuilder,
    base_url: String,
}

impl ApiClientBuilder {
    /// Set a custom user agent.
    pub fn user_agent(mut self, ua: &str) -> Self {
        self.builder = self.builder.user_agent(ua);
        self
    }

    /// Set connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.builder = self.builder.connect_timeout(timeout);
        self
    }

    /// Set an overall request timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.builder = self.builder.timeout(timeout);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<ApiClient> {
        let parsed = url::Url::parse(&self.base_url)
            .map_err(|e| Error::Config(format!("Invalid backend URL '{}': {e}", self.base_url)))?;
        if parsed.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "Backend URL '{}' cannot be a base address",
                self.base_url
            )));
        }
        let inner = self.builder.build()?;
        Ok(ApiClient {
            inner,
            base_url: self.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::Method;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_error_message_prefers_message_field() {
        let msg = error_message(
            StatusCode::BAD_REQUEST,
            r#"{"message":"Invalid code","error":"bad_request"}"#,
        );
        assert_eq!(msg, "Invalid code");
    }

    #[test]
    fn test_error_message_falls_back_to_error_field() {
        let msg = error_message(StatusCode::UNAUTHORIZED, r#"{"error":"token_expired"}"#);
        assert_eq!(msg, "token_expired");
    }

    #[test]
    fn test_error_message_raw_json_without_fields() {
        let msg = error_message(StatusCode::CONFLICT, r#"{"code":42}"#);
        assert_eq!(msg, r#"{"code":42}"#);
    }

    #[test]
    fn test_error_message_synthetic_label() {
        assert_eq!(error_message(StatusCode::UNAUTHORIZED, ""), "HTTP_401");
        assert_eq!(error_message(StatusCode::BAD_GATEWAY, "<html>oops</html>"), "HTTP_502");
    }

    #[test]
    fn test_endpoint_joins_paths() {
        let client = ApiClient::new("http://localhost:3000/").unwrap();
        assert_eq!(client.endpoint("/auth/me"), "http://localhost:3000/auth/me");
        assert_eq!(client.endpoint("auth/me"), "http://localhost:3000/auth/me");
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(ApiClient::new("::nope"), Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_send_attaches_bearer_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh"))
            .and(header("content-type", "application/json"))
            .and(header("authorization", "Bearer A1"))
            .and(body_json(json!({"refreshToken": "R1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri()).unwrap();
        let request = ApiRequest::get("/auth/refresh")
            .method(Method::Post)
            .json(&json!({"refreshToken": "R1"}))
            .unwrap()
            .bearer("A1");
        let value: serde_json::Value = client.send(&request).await.unwrap();
        assert_eq!(value["ok"], true);
    }

    #[tokio::test]
    async fn test_send_without_token_has_no_authorization() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/public"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([1, 2])))
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri()).unwrap();
        let value: Vec<u32> = client.send(&ApiRequest::get("/public")).await.unwrap();
        assert_eq!(value, vec![1, 2]);

        let received = server.received_requests().await.unwrap();
        assert!(received[0].headers.get("authorization").is_none());
    }

    #[tokio::test]
    async fn test_send_empty_success_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/logout"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri()).unwrap();
        client
            .send::<()>(&ApiRequest::post("/auth/logout").bearer("A1"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_send_maps_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/me"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri()).unwrap();
        let err = client
            .send::<serde_json::Value>(&ApiRequest::get("/auth/me").bearer("A1"))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(401));
        assert_eq!(err.to_string(), "HTTP_401");
        assert!(err.is_unauthorized());
    }
}
