// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::needless_pass_by_value)]

//! # IT Glue Client
//!
//! A paginated, cached, rate-limited access layer for the IT Glue JSON:API.
//!
//! ## Features
//!
//! - **Pagination**: Lazy, restartable streams over page-number collections,
//!   with a guard against servers whose `next-page` never advances
//! - **Rate Limiting**: Fixed-window request budget shared by every clone of
//!   a client, FIFO among waiters
//! - **Caching**: Per-page and per-record TTL cache with invalidation on write
//! - **Retries**: Exponential backoff that honours `Retry-After` and never
//!   replays a mutation the server may have applied
//! - **Bulk Operations**: Bounded concurrent dispatch with per-item results
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use itglue_client::{Client, ClientConfig, Query, Result};
//! use futures::TryStreamExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = ClientConfig::builder()
//!         .header("x-api-key", "ITG.xxxx")
//!         .build()?;
//!     let client = Client::new(config)?;
//!
//!     // Single record, cached for the default TTL
//!     let org = client.organizations().get_one("123", false).await?;
//!
//!     // Every matching record, one page at a time
//!     let params = Query::new().filter("name", "Acme").into_params();
//!     let mut records = Box::pin(client.configurations().iter(params, false));
//!     while let Some(record) = records.try_next().await? {
//!         // Process record
//!     }
//!
//!     println!("{:?}", client.get_stats());
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Client / ResourceApi                         │
//! │  get_one  get_all  iter  create  update  delete  bulk_*         │
//! └─────────────────────────────────────────────────────────────────┘
//!                                │
//! ┌──────────────┬───────────────┴───────────┬──────────────────────┐
//! │    Cache     │       Pagination          │        HTTP          │
//! ├──────────────┼───────────────────────────┼──────────────────────┤
//! │ Fingerprint  │ PageMetadata / Page       │ Rate Limit (window)  │
//! │ TTL, lazy    │ Coordinator streams       │ Retry / Backoff      │
//! │ Invalidation │ Loop guard, page cap      │ Transport (JSON:API) │
//! └──────────────┴───────────────────────────┴──────────────────────┘
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types for the client
pub mod error;

/// Common types and type aliases
pub mod types;

/// Client configuration
pub mod config;

/// Transport, retry and rate limiting
pub mod http;

/// Page parsing and iteration
pub mod pagination;

/// Response cache
pub mod cache;

/// Client and resource operations
pub mod client;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

// Re-export commonly used types
pub use cache::{CacheManager, CacheStats, Fingerprint};
pub use client::{BulkOperationResult, Client, ResourceApi, ResourceType};
pub use config::{ClientConfig, ClientConfigBuilder, Region};
pub use http::{RateLimiter, RetryPolicy, Transport, TransportResponse};
pub use pagination::{Page, PageFetcher, PageMetadata, PaginationCoordinator};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
