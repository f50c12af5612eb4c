//! Error types for the IT Glue client
//!
//! This module defines the error hierarchy for the entire crate.
//! All public APIs return `Result<T, Error>` where Error is defined here.

use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// The main error type for the IT Glue client
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ============================================================================
    // Response Shape Errors
    // ============================================================================
    #[error("Malformed response: {message}")]
    MalformedResponse { message: String },

    #[error(
        "Invalid pagination state on '{endpoint}': requested page {requested}, \
         server reported current page {current} with next page {next}"
    )]
    InvalidPaginationState {
        endpoint: String,
        requested: u32,
        current: u32,
        next: u32,
    },

    // ============================================================================
    // Remote Errors
    // ============================================================================
    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("Rate limit exceeded{}", retry_hint(.retry_after_seconds))]
    RateLimitExceeded { retry_after_seconds: Option<u64> },

    #[error("Validation failed (HTTP {status}): {message}")]
    Validation { status: u16, message: String },

    #[error("Server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    // ============================================================================
    // Transport Errors
    // ============================================================================
    #[error("Transport error: {message}")]
    Transport {
        message: String,
        /// Whether the request may have reached the server
        sent: bool,
    },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

#[allow(clippy::ref_option)]
fn retry_hint(retry_after_seconds: &Option<u64>) -> String {
    match retry_after_seconds {
        Some(secs) => format!(", retry after {secs}s"),
        None => String::new(),
    }
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid config value error
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfigValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a malformed response error
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Create a validation error
    pub fn validation(status: u16, message: impl Into<String>) -> Self {
        Self::Validation {
            status,
            message: message.into(),
        }
    }

    /// Create a transport error
    pub fn transport(message: impl Into<String>, sent: bool) -> Self {
        Self::Transport {
            message: message.into(),
            sent,
        }
    }

    /// Classify a reqwest failure.
    ///
    /// Connection and request-building failures happen before any byte is
    /// written, so they are marked as not sent.
    pub fn from_reqwest(err: &reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            return Self::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            };
        }
        let sent = !(err.is_connect() || err.is_builder());
        Self::transport(err.to_string(), sent)
    }

    /// Map a non-success HTTP status and its body to the error taxonomy
    pub fn from_status(status: u16, body: &str, retry_after: Option<Duration>) -> Self {
        let message = error_message_from_body(body);
        match status {
            404 => Self::NotFound { resource: message },
            429 => Self::RateLimitExceeded {
                retry_after_seconds: retry_after.map(|d| d.as_secs()),
            },
            400..=499 => Self::Validation { status, message },
            500..=599 => Self::Server { status, message },
            _ => Self::malformed(format!("unexpected HTTP status {status}: {message}")),
        }
    }

    /// Check if this error may be retried.
    ///
    /// `idempotent` is false for mutations, which are only retried when the
    /// server is known not to have applied the request.
    pub fn is_retryable(&self, idempotent: bool) -> bool {
        match self {
            Error::RateLimitExceeded { .. } => true,
            Error::Transport { sent: false, .. } => true,
            Error::Transport { sent: true, .. } | Error::Timeout { .. } | Error::Server { .. } => {
                idempotent
            }
            _ => false,
        }
    }

    /// Check if this is a `NotFound` error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// Server-provided retry hint, if any
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Error::RateLimitExceeded {
                retry_after_seconds: Some(secs),
            } => Some(Duration::from_secs(*secs)),
            _ => None,
        }
    }
}

/// Pull a readable message out of a JSON:API error document.
///
/// Falls back to the raw body when it is not an `errors` document.
fn error_message_from_body(body: &str) -> String {
    let Ok(doc) = serde_json::from_str::<Value>(body) else {
        return body.trim().to_string();
    };
    let Some(errors) = doc.get("errors").and_then(Value::as_array) else {
        return body.trim().to_string();
    };

    let parts: Vec<String> = errors
        .iter()
        .filter_map(|e| {
            let title = e.get("title").and_then(Value::as_str);
            let detail = e.get("detail").and_then(Value::as_str);
            match (title, detail) {
                (Some(t), Some(d)) => Some(format!("{t}: {d}")),
                (Some(t), None) => Some(t.to_string()),
                (None, Some(d)) => Some(d.to_string()),
                (None, None) => None,
            }
        })
        .collect();

    if parts.is_empty() {
        body.trim().to_string()
    } else {
        parts.join("; ")
    }
}

/// Result type alias for the IT Glue client
pub type Result<T> = std::result::Result<T, Error>;
