//! Rate limiting implementation
//!
//! A fixed-window request budget shared by every caller of one client.
//! `consumed` never exceeds `limit` inside a window; the window restarts on
//! the first request made after it has fully elapsed.
//!
//! Blocked callers queue on a fair (FIFO) async mutex, so the caller that
//! started waiting first is granted first and nobody starves.

use crate::error::{Error, Result};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Configuration for rate limiting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimiterConfig {
    /// Requests allowed per window
    pub limit: u32,
    /// Window length
    pub window: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        // IT Glue allows 3000 requests per 5 minutes
        Self {
            limit: 3000,
            window: Duration::from_secs(300),
        }
    }
}

impl RateLimiterConfig {
    /// Create a new rate limiter config
    pub fn new(limit: u32, window: Duration) -> Self {
        Self { limit, window }
    }
}

/// Proof that budget was granted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct RatePermit {
    cost: u32,
}

impl RatePermit {
    /// Number of requests this permit accounts for
    pub fn cost(&self) -> u32 {
        self.cost
    }
}

/// Point-in-time view of the budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BudgetSnapshot {
    pub limit: u32,
    pub consumed: u32,
    pub remaining: u32,
    /// Time until the current window may be reset
    pub resets_in: Duration,
}

#[derive(Debug)]
struct RateBudget {
    window_start: Instant,
    window_duration: Duration,
    limit: u32,
    consumed: u32,
}

impl RateBudget {
    fn roll(&mut self, now: Instant) {
        if now.duration_since(self.window_start) >= self.window_duration {
            self.window_start = now;
            self.consumed = 0;
        }
    }

    fn try_consume(&mut self, cost: u32, now: Instant) -> bool {
        self.roll(now);
        if self.consumed + cost <= self.limit {
            self.consumed += cost;
            true
        } else {
            false
        }
    }

    fn resets_in(&self, now: Instant) -> Duration {
        (self.window_start + self.window_duration).saturating_duration_since(now)
    }

    fn snapshot(&mut self, now: Instant) -> BudgetSnapshot {
        self.roll(now);
        BudgetSnapshot {
            limit: self.limit,
            consumed: self.consumed,
            remaining: self.limit - self.consumed,
            resets_in: self.resets_in(now),
        }
    }
}

struct Shared {
    budget: Mutex<RateBudget>,
    // held by the caller at the head of the line while it waits for budget
    queue: tokio::sync::Mutex<()>,
}

/// Fixed-window rate limiter
#[derive(Clone)]
pub struct RateLimiter {
    shared: Arc<Shared>,
}

impl RateLimiter {
    /// Create a new rate limiter with the given config
    pub fn new(config: &RateLimiterConfig) -> Result<Self> {
        if config.limit == 0 {
            return Err(Error::invalid_config("limit", "must be greater than zero"));
        }
        if config.window.is_zero() {
            return Err(Error::invalid_config("window", "must be greater than zero"));
        }

        Ok(Self {
            shared: Arc::new(Shared {
                budget: Mutex::new(RateBudget {
                    window_start: Instant::now(),
                    window_duration: config.window,
                    limit: config.limit,
                    consumed: 0,
                }),
                queue: tokio::sync::Mutex::new(()),
            }),
        })
    }

    fn budget(&self) -> MutexGuard<'_, RateBudget> {
        // the budget is plain counters, a panic elsewhere cannot leave it torn
        self.shared
            .budget
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn check_cost(&self, cost: u32) -> Result<()> {
        let limit = self.budget().limit;
        if cost == 0 || cost > limit {
            return Err(Error::invalid_config(
                "cost",
                format!("must be between 1 and the window limit ({limit})"),
            ));
        }
        Ok(())
    }

    /// Wait until `cost` requests fit in the current window, then take them
    pub async fn acquire(&self, cost: u32) -> Result<RatePermit> {
        self.check_cost(cost)?;
        let _turn = self.shared.queue.lock().await;

        loop {
            let wait = {
                let mut budget = self.budget();
                let now = Instant::now();
                if budget.try_consume(cost, now) {
                    return Ok(RatePermit { cost });
                }
                budget.resets_in(now)
            };
            debug!("Rate budget exhausted, waiting {:?} for the next window", wait);
            tokio::time::sleep(wait).await;
        }
    }

    /// Take `cost` requests if they fit right now.
    ///
    /// Returns `None` when the budget is short or other callers are already
    /// queued ahead.
    pub fn try_acquire(&self, cost: u32) -> Option<RatePermit> {
        self.check_cost(cost).ok()?;
        let _turn = self.shared.queue.try_lock().ok()?;
        let mut budget = self.budget();
        if budget.try_consume(cost, Instant::now()) {
            Some(RatePermit { cost })
        } else {
            None
        }
    }

    /// Requests left in the current window
    pub fn remaining(&self) -> u32 {
        self.snapshot().remaining
    }

    /// Current budget state
    pub fn snapshot(&self) -> BudgetSnapshot {
        self.budget().snapshot(Instant::now())
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("budget", &*self.budget())
            .finish()
    }
}
