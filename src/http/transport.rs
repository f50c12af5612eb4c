//! HTTP transport
//!
//! The access layer only needs one thing from HTTP: send a request, get back
//! status, body and headers. [`Transport`] captures that boundary so the
//! pagination and cache layers can be exercised without a network, and
//! [`HttpTransport`] implements it with reqwest.
//!
//! Non-success statuses are returned as responses, not errors. Interpreting
//! them is the caller's job.

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::types::{JsonValue, Method, QueryParams};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Media type used by the API for requests and responses
pub const JSON_API_MEDIA_TYPE: &str = "application/vnd.api+json";

/// Raw response from one HTTP exchange
#[derive(Debug, Clone, Default)]
pub struct TransportResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body as text
    pub body: String,
    /// Response headers, names lowercased
    pub headers: HashMap<String, String>,
}

impl TransportResponse {
    /// Create a response with a status and body
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            headers: HashMap::new(),
        }
    }

    /// Add a header
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// 2xx status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Look up a header by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Parse the `Retry-After` header (delay seconds or HTTP-date)
    pub fn retry_after(&self) -> Option<Duration> {
        self.header("retry-after").and_then(parse_retry_after)
    }

    /// Parse the body as JSON; an empty body (e.g. `204`) is `null`
    pub fn json(&self) -> Result<JsonValue> {
        if self.body.trim().is_empty() {
            return Ok(JsonValue::Null);
        }
        serde_json::from_str(&self.body)
            .map_err(|e| Error::malformed(format!("response body is not valid JSON: {e}")))
    }
}

/// One HTTP exchange against the remote service
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request.
    ///
    /// `path` is relative to the transport's base URL unless absolute.
    /// Failures to complete the exchange come back as `Error::Transport`
    /// or `Error::Timeout`.
    async fn request(
        &self,
        method: Method,
        path: &str,
        params: &QueryParams,
        body: Option<&JsonValue>,
    ) -> Result<TransportResponse>;
}

/// reqwest-backed transport
pub struct HttpTransport {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpTransport {
    /// Build a transport from client configuration
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(JSON_API_MEDIA_TYPE));
        for (key, value) in &config.default_headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| Error::invalid_config("default_headers", e.to_string()))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::invalid_config("default_headers", e.to_string()))?;
            headers.insert(name, value);
        }

        let timeout = config.request_timeout();
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.effective_base_url().to_string(),
            timeout,
        })
    }

    /// Base URL requests are resolved against
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build full URL from path
    fn build_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }

        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(
        &self,
        method: Method,
        path: &str,
        params: &QueryParams,
        body: Option<&JsonValue>,
    ) -> Result<TransportResponse> {
        let url = self.build_url(path);
        let mut req = self.client.request(method.into(), &url);

        if !params.is_empty() {
            req = req.query(params);
        }

        if let Some(body) = body {
            req = req
                .header(CONTENT_TYPE, JSON_API_MEDIA_TYPE)
                .body(serde_json::to_vec(body)?);
        }

        let response = req
            .send()
            .await
            .map_err(|e| Error::from_reqwest(&e, self.timeout))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        // the server has seen the request by now, so body failures count as sent
        let body = response
            .text()
            .await
            .map_err(|e| Error::from_reqwest(&e, self.timeout))?;

        debug!("{} {} -> {}", method, url, status);

        Ok(TransportResponse {
            status,
            body,
            headers,
        })
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Parse a `Retry-After` value
pub(crate) fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    let date = chrono::DateTime::parse_from_rfc2822(value).ok()?;
    let delta = date.with_timezone(&chrono::Utc) - chrono::Utc::now();
    // a date in the past means "now"
    Some(delta.to_std().unwrap_or(Duration::ZERO))
}
