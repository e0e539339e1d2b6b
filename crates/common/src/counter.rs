//! # Daily-Claim Counter
//!
//! Atomic, idempotent counting of confirmed claim transactions.
//!
//! ## Flow Diagram
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────┐
//! │                 process_once(tx_hash, daily_limit)                 │
//! │                                                                    │
//! │  STEP 1 ─ DEDUP MARKER (atomic gate)                              │
//! │  │  set_if_absent("processedTx:<hash>", "1", 25h)                  │
//! │  │  ← lost the race? → read counter → AlreadyProcessed { count }  │
//! │  │                                                                 │
//! │  STEP 2 ─ COUNT (winner only)                                     │
//! │  │  incr("dailyClaims:<YYYY-MM-DD>") → count                       │
//! │  │  ← count == 1? → expire(day key, 25h)   (first hit of the day) │
//! │  │                                                                 │
//! │  STEP 3 ─ COMPARE                                                 │
//! │     count >  limit → LimitExceeded { count }                       │
//! │     count <= limit → NewlyCounted  { count }                       │
//! └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Atomicity Guarantee
//!
//! The dedup marker is the point of no return. Among N concurrent reports
//! of the same hash, exactly one caller wins `set_if_absent`; only the
//! winner touches the shared counter, so the counter moves by exactly 1
//! per distinct hash. `incr` returns the post-increment value atomically,
//! so the compare-to-limit in step 3 is race-free: two callers near the
//! ceiling observe different counts and at most one is under the limit.
//!
//! ## Terminal States
//!
//! Per transaction hash: `unseen → {counted-under-limit | counted-over-
//! limit}`. Both outcomes leave the marker set, so a retry (including a
//! retry after a post-marker failure further down the request) lands on
//! `AlreadyProcessed` and never re-increments.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::day::{daily_claims_key, processed_tx_key, DAY_KEY_TTL_SECS};
use crate::kv::AtomicKv;
use crate::Result;

// ════════════════════════════════════════════════════════════════════════════
// OUTCOME
// ════════════════════════════════════════════════════════════════════════════

/// Result of reporting one transaction hash to the counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// This call won the dedup race and the count stayed within the limit.
    NewlyCounted { count: i64 },
    /// The hash was counted by an earlier call; `count` is the current total.
    AlreadyProcessed { count: i64 },
    /// This call won the dedup race but the increment landed past the
    /// daily ceiling. The hash stays marked processed.
    LimitExceeded { count: i64 },
}

impl ProcessOutcome {
    /// Current day's count as observed by this call.
    #[must_use]
    pub fn count(&self) -> i64 {
        match self {
            ProcessOutcome::NewlyCounted { count }
            | ProcessOutcome::AlreadyProcessed { count }
            | ProcessOutcome::LimitExceeded { count } => *count,
        }
    }

    /// Whether the claim fit under the daily ceiling.
    #[must_use]
    pub fn allowed(&self) -> bool {
        !matches!(self, ProcessOutcome::LimitExceeded { .. })
    }
}

// ════════════════════════════════════════════════════════════════════════════
// COUNTER
// ════════════════════════════════════════════════════════════════════════════

/// Day-partitioned claim counter backed by the shared atomic KV.
#[derive(Clone)]
pub struct DailyClaimCounter {
    kv: Arc<dyn AtomicKv>,
}

impl DailyClaimCounter {
    pub fn new(kv: Arc<dyn AtomicKv>) -> Self {
        Self { kv }
    }

    /// Count `tx_hash` exactly once against `daily_limit`.
    ///
    /// Errors from the KV propagate as `Transient`; an error *before* the
    /// marker leaves no state behind, and an error *after* the marker is
    /// safe because the retry deterministically gets `AlreadyProcessed`.
    pub async fn process_once(&self, tx_hash: &str, daily_limit: i64) -> Result<ProcessOutcome> {
        let ttl = Duration::from_secs(DAY_KEY_TTL_SECS);
        let marker = processed_tx_key(tx_hash);
        let day_key = daily_claims_key();

        // STEP 1: the atomic gate. Losers never touch the counter.
        let won = self.kv.set_if_absent(&marker, "1", ttl).await?;
        if !won {
            let count = self.count_today().await?;
            debug!(tx_hash, count, "claim already processed");
            return Ok(ProcessOutcome::AlreadyProcessed { count });
        }

        // STEP 2: winner increments the shared day counter. Only the
        // caller that observes 1 sets the expiry, so the key can never be
        // left without one.
        let count = self.kv.incr(&day_key).await?;
        if count == 1 {
            self.kv.expire(&day_key, ttl).await?;
        }

        // STEP 3: race-free compare against the ceiling.
        if count > daily_limit {
            debug!(tx_hash, count, daily_limit, "claim counted over limit");
            return Ok(ProcessOutcome::LimitExceeded { count });
        }

        debug!(tx_hash, count, "claim newly counted");
        Ok(ProcessOutcome::NewlyCounted { count })
    }

    /// Current day's counted-claims total.
    pub async fn count_today(&self) -> Result<i64> {
        let raw = self.kv.get(&daily_claims_key()).await?;
        Ok(raw.and_then(|s| s.parse::<i64>().ok()).unwrap_or(0))
    }
}

// ════════════════════════════════════════════════════════════════════════════
// UNIT TESTS
// ════════════════════════════════════════════════════════════════════════════
