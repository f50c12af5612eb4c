//! Client configuration
//!
//! Everything the access layer needs is injected through [`ClientConfig`].
//! It can be built in code with [`ClientConfig::builder`], loaded from a
//! YAML/JSON document, or read from `ITGLUE_*` environment variables.

use crate::error::{Error, Result};
use crate::http::RetryPolicy;
use crate::types::BackoffType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Largest page size the API accepts
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Upper bound on pages walked by one stream when the caller sets no limit
pub const DEFAULT_MAX_PAGES: u32 = 10_000;

/// Prefix of the variables read by [`ClientConfig::from_env`]
pub const ENV_PREFIX: &str = "ITGLUE_";

/// Header carrying the API key
pub const API_KEY_HEADER: &str = "x-api-key";

// ============================================================================
// Region
// ============================================================================

/// API data-center region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    #[default]
    Us,
    Eu,
    Au,
}

impl FromStr for Region {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "us" => Ok(Region::Us),
            "eu" => Ok(Region::Eu),
            "au" => Ok(Region::Au),
            other => Err(Error::invalid_config(
                "region",
                format!("unknown region '{other}', expected us, eu or au"),
            )),
        }
    }
}

impl Region {
    /// Base URL for this region
    pub fn base_url(self) -> &'static str {
        match self {
            Region::Us => "https://api.itglue.com",
            Region::Eu => "https://api.eu.itglue.com",
            Region::Au => "https://api.au.itglue.com",
        }
    }
}

// ============================================================================
// Client Config
// ============================================================================

/// Configuration for the access layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Explicit base URL; overrides `region` when set
    pub base_url: Option<String>,
    /// Region used when no explicit base URL is configured
    pub region: Region,

    /// Requests allowed per rate window
    pub requests_per_window: u32,
    /// Length of the rate window in seconds
    pub window_duration_secs: u64,
    /// Apply the local rate budget at all
    pub rate_limit_enabled: bool,

    /// Default time-to-live for cache entries in seconds
    pub default_ttl_secs: u64,
    /// Serve reads from the cache at all
    pub cache_enabled: bool,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    /// Maximum number of retries per request
    pub max_retries: u32,
    /// First retry delay in milliseconds
    pub retry_base_delay_ms: u64,
    /// Upper bound on a single retry delay in milliseconds
    pub retry_max_delay_ms: u64,
    /// How the retry delay grows between attempts
    pub backoff_type: BackoffType,

    /// `page[size]` sent with collection requests
    pub page_size: u32,
    /// Page cap for streams started without an explicit limit
    pub max_pages: u32,

    /// Operations in flight at once during bulk calls
    pub bulk_concurrency: usize,

    /// User agent string
    pub user_agent: String,
    /// Headers sent with every request (the API key goes here)
    pub default_headers: HashMap<String, String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            region: Region::Us,
            requests_per_window: 3000,
            window_duration_secs: 300,
            rate_limit_enabled: true,
            default_ttl_secs: 300,
            cache_enabled: true,
            request_timeout_secs: 30,
            max_retries: 3,
            retry_base_delay_ms: 1000,
            retry_max_delay_ms: 60_000,
            backoff_type: BackoffType::Exponential,
            page_size: 50,
            max_pages: DEFAULT_MAX_PAGES,
            bulk_concurrency: 4,
            user_agent: format!("itglue-client/{}", env!("CARGO_PKG_VERSION")),
            default_headers: HashMap::new(),
        }
    }
}

impl ClientConfig {
    /// Create a new config builder
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Parse a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a `.json`, `.yaml` or `.yml` file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("Failed to read {}: {e}", path.display())))?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&contents),
            Some("yaml" | "yml") => Self::from_yaml_str(&contents),
            other => Err(Error::config(format!(
                "Unsupported config file extension: {}",
                other.unwrap_or("<none>")
            ))),
        }
    }

    /// Read the configuration from `ITGLUE_*` environment variables.
    ///
    /// `ITGLUE_API_KEY` is required. Optional: `ITGLUE_REGION`,
    /// `ITGLUE_BASE_URL`, `ITGLUE_RATE_LIMIT_REQUESTS`,
    /// `ITGLUE_RATE_LIMIT_WINDOW` (seconds), `ITGLUE_RATE_LIMIT_ENABLED`,
    /// `ITGLUE_CACHE_TTL` (seconds), `ITGLUE_CACHE_ENABLED`,
    /// `ITGLUE_TIMEOUT` (seconds), `ITGLUE_MAX_RETRIES` and
    /// `ITGLUE_PAGE_SIZE`. Anything unset keeps its default.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an explicit variable lookup
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |suffix: &str| {
            lookup(&format!("{ENV_PREFIX}{suffix}"))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_key = var("API_KEY")
            .ok_or_else(|| Error::config(format!("{ENV_PREFIX}API_KEY is not set")))?;

        let mut config = Self::default();
        config
            .default_headers
            .insert(API_KEY_HEADER.to_string(), api_key);

        if let Some(region) = var("REGION") {
            config.region = region.parse()?;
        }
        config.base_url = var("BASE_URL");
        if let Some(v) = var("RATE_LIMIT_REQUESTS") {
            config.requests_per_window = parse_var("RATE_LIMIT_REQUESTS", &v)?;
        }
        if let Some(v) = var("RATE_LIMIT_WINDOW") {
            config.window_duration_secs = parse_var("RATE_LIMIT_WINDOW", &v)?;
        }
        if let Some(v) = var("RATE_LIMIT_ENABLED") {
            config.rate_limit_enabled = parse_flag("RATE_LIMIT_ENABLED", &v)?;
        }
        if let Some(v) = var("CACHE_TTL") {
            config.default_ttl_secs = parse_var("CACHE_TTL", &v)?;
        }
        if let Some(v) = var("CACHE_ENABLED") {
            config.cache_enabled = parse_flag("CACHE_ENABLED", &v)?;
        }
        if let Some(v) = var("TIMEOUT") {
            config.request_timeout_secs = parse_var("TIMEOUT", &v)?;
        }
        if let Some(v) = var("MAX_RETRIES") {
            config.max_retries = parse_var("MAX_RETRIES", &v)?;
        }
        if let Some(v) = var("PAGE_SIZE") {
            config.page_size = parse_var("PAGE_SIZE", &v)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if self.requests_per_window == 0 {
            return Err(Error::invalid_config(
                "requests_per_window",
                "must be greater than zero",
            ));
        }
        if self.window_duration_secs == 0 {
            return Err(Error::invalid_config(
                "window_duration_secs",
                "must be greater than zero",
            ));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(Error::invalid_config(
                "page_size",
                format!("must be between 1 and {MAX_PAGE_SIZE}"),
            ));
        }
        if self.max_pages == 0 {
            return Err(Error::invalid_config("max_pages", "must be greater than zero"));
        }
        if self.bulk_concurrency == 0 {
            return Err(Error::invalid_config(
                "bulk_concurrency",
                "must be greater than zero",
            ));
        }
        if self.retry_base_delay_ms > self.retry_max_delay_ms {
            return Err(Error::invalid_config(
                "retry_base_delay_ms",
                "must not exceed retry_max_delay_ms",
            ));
        }
        if let Some(url) = &self.base_url {
            url::Url::parse(url)?;
        }
        Ok(())
    }

    /// Effective base URL
    pub fn effective_base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.region.base_url())
    }

    pub fn window_duration(&self) -> Duration {
        Duration::from_secs(self.window_duration_secs)
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Retry policy derived from the retry settings
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
            backoff_type: self.backoff_type,
        }
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`ClientConfig`]
#[derive(Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    /// Set the region
    pub fn region(mut self, region: Region) -> Self {
        self.config.region = region;
        self
    }

    /// Set the rate budget
    pub fn rate_limit(mut self, requests_per_window: u32, window: Duration) -> Self {
        self.config.requests_per_window = requests_per_window;
        self.config.window_duration_secs = window.as_secs().max(1);
        self.config.rate_limit_enabled = true;
        self
    }

    /// Disable the local rate budget
    pub fn no_rate_limit(mut self) -> Self {
        self.config.rate_limit_enabled = false;
        self
    }

    /// Set the default cache TTL
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.config.default_ttl_secs = ttl.as_secs();
        self
    }

    /// Disable caching
    pub fn no_cache(mut self) -> Self {
        self.config.cache_enabled = false;
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout_secs = timeout.as_secs().max(1);
        self
    }

    /// Set max retries
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Set backoff configuration
    pub fn backoff(mut self, backoff_type: BackoffType, base: Duration, max: Duration) -> Self {
        self.config.backoff_type = backoff_type;
        self.config.retry_base_delay_ms = base.as_millis() as u64;
        self.config.retry_max_delay_ms = max.as_millis() as u64;
        self
    }

    /// Set the page size
    pub fn page_size(mut self, size: u32) -> Self {
        self.config.page_size = size;
        self
    }

    /// Set the default page cap
    pub fn max_pages(mut self, pages: u32) -> Self {
        self.config.max_pages = pages;
        self
    }

    /// Set bulk operation concurrency
    pub fn bulk_concurrency(mut self, n: usize) -> Self {
        self.config.bulk_concurrency = n;
        self
    }

    /// Add a default header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.insert(key.into(), value.into());
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Build and validate the config
    pub fn build(self) -> Result<ClientConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

fn parse_var<T>(suffix: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e| {
        Error::invalid_config(format!("{ENV_PREFIX}{suffix}"), format!("'{value}': {e}"))
    })
}

fn parse_flag(suffix: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::invalid_config(
            format!("{ENV_PREFIX}{suffix}"),
            format!("'{value}' is not a boolean"),
        )),
    }
}
