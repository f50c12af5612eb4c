//! HTTP layer
//!
//! Provides the transport boundary, retry policy and the shared rate budget.
//!
//! # Features
//!
//! - **Transport**: a small trait over one HTTP exchange, with a reqwest
//!   implementation speaking JSON:API
//! - **Retry Policy**: exponential backoff that only replays requests which
//!   are safe to replay
//! - **Rate Limiting**: fixed-window request budget with FIFO waiters

mod rate_limit;
mod retry;
mod transport;

pub use rate_limit::{BudgetSnapshot, RateLimiter, RateLimiterConfig, RatePermit};
pub use retry::RetryPolicy;
pub use transport::{HttpTransport, Transport, TransportResponse, JSON_API_MEDIA_TYPE};
