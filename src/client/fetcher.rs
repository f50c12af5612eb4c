//! Cache-aware page fetcher
//!
//! Implements [`PageFetcher`] on top of the dispatcher. Each page is cached
//! under its own fingerprint; flattened collections are never cached.

use super::dispatch::Dispatcher;
use crate::cache::{CacheManager, CacheValue, Fingerprint};
use crate::error::Result;
use crate::pagination::{Page, PageFetcher};
use crate::types::{Method, QueryParams};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

pub(crate) const PAGE_NUMBER: &str = "page[number]";
pub(crate) const PAGE_SIZE: &str = "page[size]";

/// Fetches collection pages through the cache
#[derive(Debug, Clone)]
pub struct CachingFetcher {
    dispatcher: Dispatcher,
    cache: Arc<CacheManager>,
    page_size: u32,
    force_refresh: bool,
}

impl CachingFetcher {
    pub(crate) fn new(dispatcher: Dispatcher, cache: Arc<CacheManager>, page_size: u32) -> Self {
        Self {
            dispatcher,
            cache,
            page_size,
            force_refresh: false,
        }
    }

    /// Skip cache reads; fetched pages still refresh the cache
    #[must_use]
    pub fn force_refresh(mut self, force: bool) -> Self {
        self.force_refresh = force;
        self
    }
}

#[async_trait]
impl PageFetcher for CachingFetcher {
    async fn fetch_page(
        &self,
        endpoint: &str,
        params: &QueryParams,
        page_number: u32,
    ) -> Result<Page> {
        let mut query = params.clone();
        query
            .entry(PAGE_SIZE.to_string())
            .or_insert_with(|| self.page_size.to_string());
        let key = Fingerprint::for_page(endpoint, &query, page_number);

        if self.force_refresh {
            debug!("Bypassing cache for {} page {}", endpoint, page_number);
        } else if let Some(page) = self.cache.get(&key).await.and_then(CacheValue::into_page) {
            return Ok(page);
        }

        let generation = self.cache.generation();
        query.insert(PAGE_NUMBER.to_string(), page_number.to_string());
        let document = self
            .dispatcher
            .send(Method::GET, endpoint, &query, None)
            .await?;
        let page = Page::from_document(&document)?;

        debug!(
            "Fetched {} page {}: {} records, next={:?}",
            endpoint,
            page_number,
            page.len(),
            page.metadata.next_page
        );
        self.cache.put_if_unchanged(key, page.clone(), generation).await;
        Ok(page)
    }
}
