//! Minimum spacing between consecutive requests to one upstream API.

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::sync::Arc;
use std::time::Duration;

/// Enforces a minimum interval between requests sharing this throttle
///
/// Clones share the same limiter, so an esearch call and the batch fetches
/// that follow it are spaced out together. A zero interval disables waiting.
#[derive(Clone)]
pub struct Throttle {
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
    min_interval: Duration,
}

impl Throttle {
    pub fn new(min_interval: Duration) -> Self {
        // burst of one: each request waits a full period after the previous one
        let limiter = Quota::with_period(min_interval).map(|quota| Arc::new(RateLimiter::direct(quota)));

        Self {
            limiter,
            min_interval,
        }
    }

    /// A throttle that never waits
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Wait until the next request may be sent
    pub async fn ready(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }
}

impl std::fmt::Debug for Throttle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Throttle")
            .field("min_interval", &self.min_interval)
            .finish()
    }
}
