//! # Fixed-Window Rate Limiter
//!
//! Request throttling keyed by an arbitrary string, shared across server
//! instances through the atomic KV.
//!
//! ## Semantics
//!
//! - `check(key, max, window)` increments `rateLimit:<key>` atomically.
//! - Only the caller whose increment returned 1 sets the window expiry,
//!   so a key can never be left counting forever without one, and a
//!   concurrent burst cannot reset a window early.
//! - `allowed` is `current <= max`; denied requests become allowed again
//!   once the window key expires.
//!
//! Sensitive endpoints apply this at two granularities (`ip:<addr>` and
//! `claimer:<addr>`) so neither axis can be starved through the other.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::kv::AtomicKv;
use crate::Result;

/// Outcome of one rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub allowed: bool,
    pub current: i64,
}

/// KV-backed fixed-window limiter.
#[derive(Clone)]
pub struct RateLimiter {
    kv: Arc<dyn AtomicKv>,
}

impl RateLimiter {
    pub fn new(kv: Arc<dyn AtomicKv>) -> Self {
        Self { kv }
    }

    /// Count one request against `key` and report whether it fits within
    /// `max_requests` per `window_secs`.
    ///
    /// KV failures propagate; the caller decides, but the claim endpoints
    /// fail closed: a store outage must not void the anti-abuse layer.
    pub async fn check(
        &self,
        key: &str,
        max_requests: i64,
        window_secs: u64,
    ) -> Result<RateLimitStatus> {
        let kv_key = format!("rateLimit:{}", key);
        let current = self.kv.incr(&kv_key).await?;
        if current == 1 {
            // First hit of the window owns the expiry.
            self.kv
                .expire(&kv_key, Duration::from_secs(window_secs))
                .await?;
        }

        let allowed = current <= max_requests;
        if !allowed {
            warn!(key, current, max_requests, "rate limit exceeded");
        }
        Ok(RateLimitStatus { allowed, current })
    }
}

// ════════════════════════════════════════════════════════════════════════════
// UNIT TESTS
// ════════════════════════════════════════════════════════════════════════════
