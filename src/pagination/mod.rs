//! Pagination module
//!
//! Page-number pagination over JSON:API collections.
//!
//! # Overview
//!
//! - [`Page`] / [`PageMetadata`] - one parsed page and its `meta` block
//! - [`PageFetcher`] - the single-page fetch boundary
//! - [`PaginationCoordinator`] - lazy, restartable streams of pages or records
//!   with a loop guard against servers whose `next-page` never advances

mod coordinator;
mod types;

pub use coordinator::{PageFetcher, PaginationCoordinator};
pub use types::{Page, PageMetadata};
