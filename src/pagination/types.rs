//! Pagination types
//!
//! [`PageMetadata`] and [`Page`] are parsed once from the JSON:API envelope
//! (`{data, meta, links, errors?}`). The hyphenated wire keys such as
//! `current-page` stop here; the rest of the crate only sees typed fields.

use crate::error::{Error, Result};
use crate::types::{JsonValue, Record};
use std::collections::BTreeMap;
use tracing::warn;

/// Pagination metadata reported by the server for one page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageMetadata {
    pub current_page: u32,
    pub next_page: Option<u32>,
    pub prev_page: Option<u32>,
    pub total_pages: u32,
    pub total_count: u64,
}

impl Default for PageMetadata {
    fn default() -> Self {
        Self {
            current_page: 1,
            next_page: None,
            prev_page: None,
            total_pages: 1,
            total_count: 0,
        }
    }
}

impl PageMetadata {
    /// Parse the `meta` member.
    ///
    /// The service omits metadata on small result sets and is loose about
    /// types, so absent, null, or non-numeric fields fall back to the
    /// single-page defaults instead of failing.
    pub fn from_meta(meta: &JsonValue) -> Self {
        let defaults = Self::default();
        let Some(meta) = meta.as_object() else {
            return defaults;
        };

        let read = |key: &str| meta.get(key).and_then(read_count);

        let metadata = Self {
            current_page: read("current-page")
                .map_or(defaults.current_page, clamp_page),
            next_page: read("next-page").map(clamp_page),
            prev_page: read("prev-page").map(clamp_page),
            total_pages: read("total-pages").map_or(defaults.total_pages, clamp_page),
            total_count: read("total-count").unwrap_or(defaults.total_count),
        };
        if !metadata.is_consistent() {
            warn!(
                "Inconsistent page metadata: current={}, next={:?}, total={}",
                metadata.current_page, metadata.next_page, metadata.total_pages
            );
        }
        metadata
    }

    /// A reported next page implies `current_page < total_pages`
    pub fn is_consistent(&self) -> bool {
        self.next_page.is_none() || self.current_page < self.total_pages
    }

    /// More pages follow this one
    pub fn has_next(&self) -> bool {
        self.next_page.is_some()
    }

    /// Pages precede this one
    pub fn has_prev(&self) -> bool {
        self.prev_page.is_some()
    }

    pub fn is_first_page(&self) -> bool {
        self.current_page == 1
    }

    pub fn is_last_page(&self) -> bool {
        self.current_page >= self.total_pages
    }
}

/// Accept numbers and numeric strings
fn read_count(value: &JsonValue) -> Option<u64> {
    match value {
        JsonValue::Number(n) => n.as_u64(),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn clamp_page(n: u64) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX).max(1)
}

/// One page of records
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Page {
    /// Records in server order
    pub items: Vec<Record>,
    /// Pagination metadata
    pub metadata: PageMetadata,
    /// Relation name (`self`, `next`, `last`, ...) to URL
    pub links: BTreeMap<String, String>,
}

impl Page {
    /// Parse a JSON:API document into a page.
    ///
    /// `data` may be a list of records, a single record (wrapped as a
    /// one-item page) or `null` (an empty page). Anything else is a
    /// `MalformedResponse`.
    pub fn from_document(document: &JsonValue) -> Result<Self> {
        let Some(root) = document.as_object() else {
            return Err(Error::malformed("expected a JSON object at the top level"));
        };

        let items = match root.get("data") {
            None => return Err(Error::malformed("document has no 'data' member")),
            Some(JsonValue::Null) => Vec::new(),
            Some(JsonValue::Object(record)) => vec![record.clone()],
            Some(JsonValue::Array(values)) => values
                .iter()
                .enumerate()
                .map(|(i, value)| {
                    value.as_object().cloned().ok_or_else(|| {
                        Error::malformed(format!("data[{i}] is not a record object"))
                    })
                })
                .collect::<Result<Vec<_>>>()?,
            Some(other) => {
                return Err(Error::malformed(format!(
                    "'data' must be a record or a list of records, got {}",
                    json_kind(other)
                )))
            }
        };

        let metadata = match root.get("meta") {
            None | Some(JsonValue::Null) => PageMetadata::default(),
            Some(meta @ JsonValue::Object(_)) => PageMetadata::from_meta(meta),
            Some(other) => {
                warn!("Ignoring non-object 'meta' member ({})", json_kind(other));
                PageMetadata::default()
            }
        };

        let links = root
            .get("links")
            .and_then(JsonValue::as_object)
            .map(|links| {
                links
                    .iter()
                    .filter_map(|(rel, url)| url.as_str().map(|u| (rel.clone(), u.to_string())))
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            items,
            metadata,
            links,
        })
    }

    /// Number of records on this page
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate over the records on this page
    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.items.iter()
    }

    /// Look up a link by relation name
    pub fn link(&self, rel: &str) -> Option<&str> {
        self.links.get(rel).map(String::as_str)
    }
}

impl IntoIterator for Page {
    type Item = Record;
    type IntoIter = std::vec::IntoIter<Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}
