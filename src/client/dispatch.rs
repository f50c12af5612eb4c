//! Request dispatch
//!
//! Every request the client makes passes through [`Dispatcher::send`]: one
//! rate permit per attempt, the transport call, status mapping, and the
//! retry policy around all of it.

use crate::error::{Error, Result};
use crate::http::{RateLimiter, RetryPolicy, Transport, TransportResponse};
use crate::types::{JsonValue, Method, QueryParams};
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub(crate) struct Dispatcher {
    transport: Arc<dyn Transport>,
    limiter: Option<RateLimiter>,
    retry: RetryPolicy,
}

impl Dispatcher {
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        limiter: Option<RateLimiter>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            limiter,
            retry,
        }
    }

    pub(crate) fn limiter(&self) -> Option<&RateLimiter> {
        self.limiter.as_ref()
    }

    /// Send a request and return the decoded JSON body.
    ///
    /// GETs are retried on any retryable failure; mutations only when the
    /// server cannot have applied them.
    pub(crate) async fn send(
        &self,
        method: Method,
        path: &str,
        params: &QueryParams,
        body: Option<&JsonValue>,
    ) -> Result<JsonValue> {
        let label = format!("{method} {path}");
        let this = self;

        self.retry
            .run(method.is_idempotent_read(), &label, move |attempt| async move {
                if let Some(limiter) = &this.limiter {
                    let _permit = limiter.acquire(1).await?;
                }
                if attempt > 0 {
                    debug!("{} {}: attempt {}", method, path, attempt + 1);
                }
                let response = this.transport.request(method, path, params, body).await?;
                interpret(path, &response)
            })
            .await
    }
}

/// Decode a successful response or turn the status into an error
fn interpret(path: &str, response: &TransportResponse) -> Result<JsonValue> {
    if response.is_success() {
        return response.json();
    }

    match Error::from_status(response.status, &response.body, response.retry_after()) {
        Error::NotFound { resource } if resource.is_empty() => Err(Error::not_found(path)),
        Error::NotFound { resource } => Err(Error::not_found(format!("{path} ({resource})"))),
        err => Err(err),
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("limiter", &self.limiter)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}
