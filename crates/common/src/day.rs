//! UTC day-key helpers.
//!
//! Daily counters are partitioned per UTC calendar day and expire after
//! roughly 25 hours, which bounds storage without losing same-day reads
//! near the midnight boundary.

use chrono::Utc;

/// TTL for day-scoped keys: 25 hours in seconds.
pub const DAY_KEY_TTL_SECS: u64 = 25 * 60 * 60;

/// Current UTC day formatted as `YYYY-MM-DD`.
#[must_use]
pub fn utc_day() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}

/// KV key for the current day's claim counter.
#[must_use]
pub fn daily_claims_key() -> String {
    format!("dailyClaims:{}", utc_day())
}

/// KV key for a processed-transaction dedup marker.
#[must_use]
pub fn processed_tx_key(tx_hash: &str) -> String {
    format!("processedTx:{}", tx_hash)
}
