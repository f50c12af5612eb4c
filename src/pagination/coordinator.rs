//! Pagination coordinator
//!
//! Turns single-page fetches into lazy streams of pages or records.
//! Each stream owns its own cursor, so calling `stream_pages` again starts
//! over from page 1 and concurrent streams never share iteration state.
//! Dropping a stream stops it; nothing past the last polled page is fetched.

use super::types::Page;
use crate::config::DEFAULT_MAX_PAGES;
use crate::error::{Error, Result};
use crate::types::{QueryParams, Record};
use async_trait::async_trait;
use futures::stream::{self, Stream, TryStreamExt};
use tracing::{debug, info, warn};

/// Fetches one page of a collection
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch page `page_number` (1-based) of `endpoint` filtered by `params`
    async fn fetch_page(
        &self,
        endpoint: &str,
        params: &QueryParams,
        page_number: u32,
    ) -> Result<Page>;
}

/// Drives a [`PageFetcher`] across a whole collection
#[derive(Debug, Clone)]
pub struct PaginationCoordinator<F> {
    fetcher: F,
    page_cap: u32,
}

struct Cursor<F> {
    fetcher: F,
    endpoint: String,
    params: QueryParams,
    next: Option<u32>,
    yielded: u32,
    limit: u32,
    capped_by_default: bool,
}

impl<F: PageFetcher> PaginationCoordinator<F> {
    /// Create a coordinator with the default page cap
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            page_cap: DEFAULT_MAX_PAGES,
        }
    }

    /// Change the cap used when a stream is started without `max_pages`
    #[must_use]
    pub fn with_page_cap(mut self, cap: u32) -> Self {
        self.page_cap = cap.max(1);
        self
    }

    /// Get the underlying fetcher
    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Fetch one page
    pub async fn fetch_page(
        &self,
        endpoint: &str,
        params: &QueryParams,
        page_number: u32,
    ) -> Result<Page> {
        self.fetcher
            .fetch_page(endpoint, params, page_number.max(1))
            .await
    }

    /// Fetch the page after `page`, or `None` on the last page
    pub async fn next_page(
        &self,
        endpoint: &str,
        params: &QueryParams,
        page: &Page,
    ) -> Result<Option<Page>> {
        let current = page.metadata.current_page;
        match page.metadata.next_page {
            None => Ok(None),
            Some(next) => {
                check_progress(endpoint, current, current, next)?;
                self.fetch_page(endpoint, params, next).await.map(Some)
            }
        }
    }

    /// Fetch the page before `page`, or `None` on the first page
    pub async fn prev_page(
        &self,
        endpoint: &str,
        params: &QueryParams,
        page: &Page,
    ) -> Result<Option<Page>> {
        match page.metadata.prev_page {
            Some(prev) if prev < page.metadata.current_page => {
                self.fetch_page(endpoint, params, prev).await.map(Some)
            }
            Some(_) => Err(Error::malformed(format!(
                "prev-page is not before current page {}",
                page.metadata.current_page
            ))),
            None => Ok(None),
        }
    }
}

impl<F> PaginationCoordinator<F>
where
    F: PageFetcher + Clone + 'static,
{
    /// Lazily stream pages in ascending order starting at page 1.
    ///
    /// Ends when the server reports no next page or `max_pages` pages have
    /// been produced. Without `max_pages` the coordinator's page cap
    /// applies, so a server that always claims another page cannot keep
    /// the stream alive forever. A next page that does not move forward
    /// yields `InvalidPaginationState` and ends the stream.
    pub fn stream_pages(
        &self,
        endpoint: &str,
        params: QueryParams,
        max_pages: Option<u32>,
    ) -> impl Stream<Item = Result<Page>> + Send + 'static {
        let endpoint = endpoint.to_string();
        debug!(
            "Starting page iteration: endpoint={}, max_pages={:?}",
            endpoint, max_pages
        );

        let cursor = Cursor {
            fetcher: self.fetcher.clone(),
            endpoint,
            params,
            next: Some(1),
            yielded: 0,
            limit: max_pages.unwrap_or(self.page_cap),
            capped_by_default: max_pages.is_none(),
        };

        stream::try_unfold(cursor, |mut cursor| async move {
            let Some(page_number) = cursor.next else {
                info!(
                    "Completed page iteration: endpoint={}, pages={}",
                    cursor.endpoint, cursor.yielded
                );
                return Ok(None);
            };

            if cursor.yielded >= cursor.limit {
                if cursor.capped_by_default {
                    warn!(
                        "Reached max pages limit ({}) on '{}' while the server still reports more pages",
                        cursor.limit, cursor.endpoint
                    );
                } else {
                    debug!(
                        "Stopping at max_pages={} on '{}'",
                        cursor.limit, cursor.endpoint
                    );
                }
                return Ok(None);
            }

            let page = cursor
                .fetcher
                .fetch_page(&cursor.endpoint, &cursor.params, page_number)
                .await?;

            if let Some(next) = page.metadata.next_page {
                check_progress(
                    &cursor.endpoint,
                    page_number,
                    page.metadata.current_page,
                    next,
                )?;
            }

            cursor.next = page.metadata.next_page;
            cursor.yielded += 1;
            Ok(Some((page, cursor)))
        })
    }

    /// Lazily stream records: page order first, then order within the page
    pub fn stream_items(
        &self,
        endpoint: &str,
        params: QueryParams,
        max_pages: Option<u32>,
    ) -> impl Stream<Item = Result<Record>> + Send + 'static {
        self.stream_pages(endpoint, params, max_pages)
            .map_ok(|page| stream::iter(page.items.into_iter().map(Ok)))
            .try_flatten()
    }

    /// Collect every record of a collection
    pub async fn collect_items(
        &self,
        endpoint: &str,
        params: QueryParams,
        max_pages: Option<u32>,
    ) -> Result<Vec<Record>> {
        self.stream_items(endpoint, params, max_pages)
            .try_collect()
            .await
    }
}

/// Reject a next page that would not move the cursor forward
fn check_progress(endpoint: &str, requested: u32, current: u32, next: u32) -> Result<()> {
    if next <= current || next <= requested {
        return Err(Error::InvalidPaginationState {
            endpoint: endpoint.to_string(),
            requested,
            current,
            next,
        });
    }
    Ok(())
}

#[async_trait]
impl<T: PageFetcher + ?Sized> PageFetcher for std::sync::Arc<T> {
    async fn fetch_page(
        &self,
        endpoint: &str,
        params: &QueryParams,
        page_number: u32,
    ) -> Result<Page> {
        (**self).fetch_page(endpoint, params, page_number).await
    }
}
