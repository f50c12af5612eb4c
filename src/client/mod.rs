//! Client module
//!
//! Composes the transport, rate limiter, retry policy, cache and pagination
//! coordinator behind one cloneable handle.
//!
//! # Overview
//!
//! The client module provides:
//! - `Client` - Entry point owning the shared rate budget and cache
//! - `ResourceApi` - Reads, writes and bulk operations on one collection
//! - `ResourceType` - The collections the API exposes
//! - `BulkOperationResult` - Per-item outcomes of a batch
//!
//! Clones of a `Client` share one rate budget and one cache; separate
//! `Client::new` calls do not.

mod bulk;
mod dispatch;
mod fetcher;
mod resource;

pub use bulk::BulkOperationResult;
pub use fetcher::CachingFetcher;
pub use resource::{ResourceApi, ResourceType};

use crate::cache::{CacheManager, CacheStats};
use crate::config::ClientConfig;
use crate::error::Result;
use crate::http::{HttpTransport, RateLimiter, RateLimiterConfig, Transport};
use crate::pagination::PaginationCoordinator;
use dispatch::Dispatcher;
use std::sync::Arc;
use tracing::info;

/// IT Glue API client
#[derive(Debug, Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

#[derive(Debug)]
struct ClientInner {
    config: ClientConfig,
    dispatcher: Dispatcher,
    cache: Arc<CacheManager>,
}

impl Client {
    /// Create a client talking HTTP to the configured base URL
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = HttpTransport::new(&config)?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Create a client from `ITGLUE_*` environment variables, see
    /// [`ClientConfig::from_env`]
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env()?)
    }

    /// Create a client on top of any transport
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;

        let limiter = if config.rate_limit_enabled {
            Some(RateLimiter::new(&RateLimiterConfig::new(
                config.requests_per_window,
                config.window_duration(),
            ))?)
        } else {
            None
        };

        let cache = if config.cache_enabled {
            CacheManager::new(config.default_ttl())
        } else {
            CacheManager::disabled()
        };

        info!(
            "Created client: base_url={}, rate_limit={}, cache={}",
            config.effective_base_url(),
            config.rate_limit_enabled,
            config.cache_enabled
        );

        let dispatcher = Dispatcher::new(transport, limiter, config.retry_policy());
        Ok(Self {
            inner: Arc::new(ClientInner {
                config,
                dispatcher,
                cache: Arc::new(cache),
            }),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Shared response cache
    pub fn cache(&self) -> &CacheManager {
        &self.inner.cache
    }

    /// Shared rate limiter, `None` when rate limiting is disabled
    pub fn rate_limiter(&self) -> Option<&RateLimiter> {
        self.inner.dispatcher.limiter()
    }

    /// Cache hit/miss counters
    pub fn get_stats(&self) -> CacheStats {
        self.inner.cache.get_stats()
    }

    pub(crate) fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    /// Page fetcher going through this client's cache and rate budget
    pub fn fetcher(&self, force_refresh: bool) -> CachingFetcher {
        CachingFetcher::new(
            self.inner.dispatcher.clone(),
            Arc::clone(&self.inner.cache),
            self.inner.config.page_size,
        )
        .force_refresh(force_refresh)
    }

    /// Pagination coordinator bounded by the configured page cap
    pub fn coordinator(&self, force_refresh: bool) -> PaginationCoordinator<CachingFetcher> {
        PaginationCoordinator::new(self.fetcher(force_refresh))
            .with_page_cap(self.inner.config.max_pages)
    }

    /// Operations on a known collection
    pub fn resource(&self, resource: ResourceType) -> ResourceApi {
        ResourceApi::new(self.clone(), resource.endpoint(), resource.json_api_type())
    }

    /// Operations on an arbitrary collection path, e.g.
    /// `organizations/12/relationships/contacts`
    pub fn resource_at(&self, endpoint: &str, json_api_type: &str) -> ResourceApi {
        ResourceApi::new(self.clone(), endpoint, json_api_type)
    }

    pub fn organizations(&self) -> ResourceApi {
        self.resource(ResourceType::Organizations)
    }

    pub fn configurations(&self) -> ResourceApi {
        self.resource(ResourceType::Configurations)
    }

    pub fn flexible_assets(&self) -> ResourceApi {
        self.resource(ResourceType::FlexibleAssets)
    }
}

#[cfg(test)]
mod tests;
