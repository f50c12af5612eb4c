//! Common types used throughout the client
//!
//! Shared type aliases, the HTTP method enum and the backoff strategy type.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// JSON object type
pub type JsonObject = serde_json::Map<String, JsonValue>;

/// One resource as returned by the API, left opaque for the model layer
pub type Record = JsonObject;

/// Query parameters, kept sorted so equal parameter sets compare equal
pub type QueryParams = BTreeMap<String, String>;

// ============================================================================
// HTTP Types
// ============================================================================

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    GET,
    POST,
    PATCH,
    DELETE,
}

impl Method {
    /// Reads can be replayed freely; everything else mutates server state
    pub fn is_idempotent_read(self) -> bool {
        matches!(self, Method::GET)
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::GET => reqwest::Method::GET,
            Method::POST => reqwest::Method::POST,
            Method::PATCH => reqwest::Method::PATCH,
            Method::DELETE => reqwest::Method::DELETE,
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PATCH => "PATCH",
            Method::DELETE => "DELETE",
        };
        f.write_str(s)
    }
}

// ============================================================================
// Backoff Type
// ============================================================================

/// Type of backoff for retries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffType {
    /// Constant delay between retries
    Constant,
    /// Linear increase in delay
    Linear,
    /// Exponential increase in delay
    #[default]
    Exponential,
}

// ============================================================================
// JSON:API query helpers
// ============================================================================

/// Builder for JSON:API style query parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    params: QueryParams,
}

impl Query {
    /// Create an empty query
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `filter[field]=value`
    #[must_use]
    pub fn filter(mut self, field: &str, value: impl Into<String>) -> Self {
        self.params.insert(format!("filter[{field}]"), value.into());
        self
    }

    /// Set the `sort` parameter (prefix a field with `-` for descending)
    #[must_use]
    pub fn sort(mut self, fields: impl Into<String>) -> Self {
        self.params.insert("sort".to_string(), fields.into());
        self
    }

    /// Set the `include` parameter for related resources
    #[must_use]
    pub fn include(mut self, relations: impl Into<String>) -> Self {
        self.params.insert("include".to_string(), relations.into());
        self
    }

    /// Add an arbitrary parameter
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Borrow the collected parameters
    pub fn params(&self) -> &QueryParams {
        &self.params
    }

    /// Take the collected parameters
    pub fn into_params(self) -> QueryParams {
        self.params
    }
}

impl From<Query> for QueryParams {
    fn from(query: Query) -> Self {
        query.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_conversion() {
        let get: reqwest::Method = Method::GET.into();
        assert_eq!(reqwest::Method::GET, get);
        let patch: reqwest::Method = Method::PATCH.into();
        assert_eq!(reqwest::Method::PATCH, patch);
    }

    #[test]
    fn test_method_idempotency() {
        assert!(Method::GET.is_idempotent_read());
        assert!(!Method::POST.is_idempotent_read());
        assert!(!Method::PATCH.is_idempotent_read());
        assert!(!Method::DELETE.is_idempotent_read());
    }

    #[test]
    fn test_backoff_type_serde() {
        let backoff: BackoffType = serde_json::from_str("\"linear\"").unwrap();
        assert_eq!(backoff, BackoffType::Linear);
        assert_eq!(BackoffType::default(), BackoffType::Exponential);
    }

    #[test]
    fn test_query_builder() {
        let params = Query::new()
            .filter("name", "Acme")
            .filter("organization_status_id", "1")
            .sort("-updated_at")
            .include("configurations")
            .into_params();

        assert_eq!(params.get("filter[name]"), Some(&"Acme".to_string()));
        assert_eq!(
            params.get("filter[organization_status_id]"),
            Some(&"1".to_string())
        );
        assert_eq!(params.get("sort"), Some(&"-updated_at".to_string()));
        assert_eq!(params.get("include"), Some(&"configurations".to_string()));
    }

    #[test]
    fn test_query_params_are_sorted() {
        let params: QueryParams = Query::new().param("z", "1").param("a", "2").into();
        let keys: Vec<_> = params.keys().cloned().collect();
        assert_eq!(keys, vec!["a".to_string(), "z".to_string()]);
    }
}
