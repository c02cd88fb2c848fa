//! `reqwest`-backed [`ApiClient`].

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use serde_json::Value;
use tracing::{debug, trace};

use ferrogram_core::{ApiClient, ApiError, ApiResult, TransportError, TransportResult};

use crate::status::classify_response;

/// Public endpoint of the Bot HTTP API.
pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Default per-request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Extra time granted to a long poll on top of its own `timeout`.
const LONG_POLL_GRACE: Duration = Duration::from_secs(10);

/// Calls the Bot HTTP API: every method is a JSON `POST` to
/// `{api_url}/bot{token}/{method}`.
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Clone)]
pub struct HttpApiClient {
    client: Client,
    api_url: String,
    token: String,
    timeout: Duration,
}

impl HttpApiClient {
    /// Creates a client for `token` against the public endpoint.
    pub fn new(token: impl Into<String>) -> TransportResult<Self> {
        Self::builder(token).build()
    }

    /// Starts configuring a client for `token`.
    pub fn builder(token: impl Into<String>) -> HttpApiClientBuilder {
        HttpApiClientBuilder {
            token: token.into(),
            api_url: DEFAULT_API_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Base URL requests are sent to.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_url, self.token, method)
    }

    /// Long polls hold the connection open for `params.timeout` seconds, so
    /// the request deadline has to outlive it.
    fn request_timeout(&self, params: &Value) -> Duration {
        let poll = params
            .get("timeout")
            .and_then(Value::as_u64)
            .map(|secs| Duration::from_secs(secs) + LONG_POLL_GRACE)
            .unwrap_or_default();
        self.timeout.max(poll)
    }
}

impl fmt::Debug for HttpApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpApiClient")
            .field("api_url", &self.api_url)
            .field("token", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[async_trait]
impl ApiClient for HttpApiClient {
    async fn request(&self, method: &str, params: Value) -> ApiResult<Vec<u8>> {
        trace!(method, "API request");

        let resp = self
            .client
            .post(self.method_url(method))
            .timeout(self.request_timeout(&params))
            .json(&params)
            .send()
            .await
            .map_err(|e| send_error(method, e))?;

        let status = resp.status().as_u16();
        let body = resp
            .bytes()
            .await
            .map_err(|e| match e.is_timeout() {
                true => ApiError::Timeout,
                false => TransportError::Body(e.without_url().to_string()).into(),
            })?
            .to_vec();

        debug!(method, status, bytes = body.len(), "API response");
        classify_response(status, body)
    }
}

/// The URL carries the token, so it is stripped before the error is kept.
fn send_error(method: &str, err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::Timeout;
    }
    TransportError::RequestFailed {
        method: method.to_string(),
        reason: err.without_url().to_string(),
    }
    .into()
}

/// Builder for [`HttpApiClient`].
#[derive(Debug, Clone)]
pub struct HttpApiClientBuilder {
    token: String,
    api_url: String,
    timeout: Duration,
}

impl HttpApiClientBuilder {
    /// Overrides the API base URL (a local Bot API server, a test double).
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the per-request timeout. Long polls get at least their own
    /// timeout plus a grace period.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds the client.
    pub fn build(self) -> TransportResult<HttpApiClient> {
        if self.token.trim().is_empty() {
            return Err(TransportError::InvalidConfig("bot token is empty".into()));
        }
        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            return Err(TransportError::InvalidConfig(format!(
                "api url must be http(s): {}",
                self.api_url
            )));
        }

        let client = ClientBuilder::new()
            .timeout(self.timeout)
            .build()
            .map_err(|e| TransportError::InvalidConfig(e.to_string()))?;

        Ok(HttpApiClient {
            client,
            api_url: self.api_url,
            token: self.token,
            timeout: self.timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_method_url() {
        let client = HttpApiClient::builder("123:ABC")
            .api_url("http://localhost:8081/")
            .build()
            .unwrap();
        assert_eq!(
            client.method_url("getMe"),
            "http://localhost:8081/bot123:ABC/getMe"
        );
    }

    #[test]
    fn test_long_poll_timeout_extends_deadline() {
        let client = HttpApiClient::builder("t")
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        assert_eq!(
            client.request_timeout(&json!({"timeout": 30})),
            Duration::from_secs(40)
        );
        assert_eq!(
            client.request_timeout(&json!({"chat_id": 1})),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            HttpApiClient::new(" "),
            Err(TransportError::InvalidConfig(_))
        ));
        assert!(matches!(
            HttpApiClient::builder("t").api_url("ftp://x").build(),
            Err(TransportError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_debug_redacts_token() {
        let client = HttpApiClient::new("123:SECRET").unwrap();
        assert!(!format!("{client:?}").contains("SECRET"));
    }
}
