//! Cache keys
//!
//! A [`Fingerprint`] names one cached value. It keeps the canonical endpoint
//! path in clear text, so entries can be invalidated by prefix, plus a
//! SHA-256 digest over the endpoint, the sorted query parameters and the
//! page number.

use crate::types::QueryParams;
use sha2::{Digest, Sha256};
use std::fmt;

/// Selects a page rather than a result set; the page number is hashed separately
const PAGE_NUMBER_PARAM: &str = "page[number]";

/// Stable key for an (endpoint, parameters, page) combination
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    endpoint: String,
    digest: String,
}

impl Fingerprint {
    /// Key for a single resource, e.g. `organizations/123`
    pub fn for_resource(endpoint: &str, id: &str) -> Self {
        let endpoint = format!("{}/{}", canonical_endpoint(endpoint), id.trim_matches('/'));
        Self::compute(endpoint, &QueryParams::new(), None)
    }

    /// Key for one page of a collection.
    ///
    /// A `page[number]` entry in `params` is ignored; the page is identified
    /// by `page_number` alone. `page[size]` is part of the key.
    pub fn for_page(endpoint: &str, params: &QueryParams, page_number: u32) -> Self {
        Self::compute(canonical_endpoint(endpoint), params, Some(page_number))
    }

    fn compute(endpoint: String, params: &QueryParams, page: Option<u32>) -> Self {
        let mut hasher = Sha256::new();
        hash_field(&mut hasher, &endpoint);
        // BTreeMap iteration is already sorted by key
        for (key, value) in params.iter().filter(|(k, _)| *k != PAGE_NUMBER_PARAM) {
            hash_field(&mut hasher, key);
            hash_field(&mut hasher, value);
        }
        if let Some(page) = page {
            hasher.update(b"#");
            hasher.update(page.to_be_bytes());
        }

        Self {
            endpoint,
            digest: hex::encode(hasher.finalize()),
        }
    }

    /// Canonical endpoint path this key belongs to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Hex-encoded digest
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Whether this key lives under `prefix`, matching whole path segments
    /// (`organizations` matches `organizations/1` but not `organizations-x`)
    pub fn belongs_to(&self, prefix: &str) -> bool {
        let prefix = canonical_endpoint(prefix);
        if prefix.is_empty() {
            return true;
        }
        match self.endpoint.strip_prefix(prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.endpoint, &self.digest[..12])
    }
}

/// Length-prefixed, so no two parameter sets share a byte stream
fn hash_field(hasher: &mut Sha256, field: &str) {
    hasher.update((field.len() as u64).to_be_bytes());
    hasher.update(field.as_bytes());
}

/// Strip surrounding slashes so `/organizations/` and `organizations` agree
fn canonical_endpoint(endpoint: &str) -> String {
    endpoint.trim().trim_matches('/').to_string()
}
