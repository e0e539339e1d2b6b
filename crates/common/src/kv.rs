//! # Atomic KV Abstraction
//!
//! The daily counter and the per-hash dedup marker are the only shared
//! mutable resources in this system, and multiple server instances may run
//! behind a load balancer. So both are owned by an external atomic KV and
//! mutated exclusively through two primitives:
//!
//! - `set_if_absent(key, value, ttl)`: atomic SET NX EX, returns whether
//!   this caller won the race
//! - `incr(key)`: atomic increment, returns the new value
//!
//! In-process locks are never sufficient here; `MemoryKv` exists for tests
//! and single-instance development only.
//!
//! ## Semantics
//!
//! - Every key carries a TTL at most one write after creation.
//! - `incr` on a missing key creates it at 1.
//! - `expire` is a no-op on a missing key.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::AppError;
use crate::Result;

// ════════════════════════════════════════════════════════════════════════════
// TRAIT
// ════════════════════════════════════════════════════════════════════════════

/// Atomic key-value primitives shared across server instances.
///
/// Implementations must make each method atomic with respect to concurrent
/// callers on the same key. Errors are `AppError::Transient`; callers on
/// the money path must treat them as a hard failure, never as "absent".
#[async_trait]
pub trait AtomicKv: Send + Sync {
    /// Set `key` to `value` only if it does not exist, with `ttl`.
    /// Returns `true` if this call created the key.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool>;

    /// Atomically increment the integer at `key`, creating it at 1.
    async fn incr(&self, key: &str) -> Result<i64>;

    /// Read the raw string value at `key`.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Set the TTL on an existing key. Missing keys are ignored.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<()>;
}

// ════════════════════════════════════════════════════════════════════════════
// MEMORY BACKEND
// ════════════════════════════════════════════════════════════════════════════

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn live(&self) -> bool {
        match self.expires_at {
            Some(t) => Instant::now() < t,
            None => true,
        }
    }
}

/// In-memory backend for tests and single-instance development.
///
/// A single mutex makes each primitive atomic; expired entries are treated
/// as absent on every access.
#[derive(Default)]
pub struct MemoryKv {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryKv {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys. Test helper.
    #[must_use]
    pub fn live_keys(&self) -> usize {
        self.entries.lock().values().filter(|e| e.live()).count()
    }
}

#[async_trait]
impl AtomicKv for MemoryKv {
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let mut entries = self.entries.lock();
        if entries.get(key).map(Entry::live).unwrap_or(false) {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(true)
    }

    async fn incr(&self, key: &str) -> Result<i64> {
        let mut entries = self.entries.lock();
        let next = match entries.get(key) {
            Some(e) if e.live() => e.value.parse::<i64>().unwrap_or(0) + 1,
            _ => 1,
        };
        let expires_at = entries
            .get(key)
            .filter(|e| e.live())
            .and_then(|e| e.expires_at);
        entries.insert(
            key.to_string(),
            Entry {
                value: next.to_string(),
                expires_at,
            },
        );
        Ok(next)
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock();
        Ok(entries
            .get(key)
            .filter(|e| e.live())
            .map(|e| e.value.clone()))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<()> {
        let mut entries = self.entries.lock();
        if let Some(e) = entries.get_mut(key) {
            if e.live() {
                e.expires_at = Some(Instant::now() + ttl);
            }
        }
        Ok(())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// REST BACKEND
// ════════════════════════════════════════════════════════════════════════════

/// Redis-over-REST backend (Upstash-style).
///
/// Commands are posted as JSON arrays to the base URL with a bearer token;
/// the store executes each command atomically server-side, which is what
/// gives `set_if_absent`/`incr` their cross-instance guarantees.
pub struct RestKv {
    base_url: String,
    token: String,
    client: reqwest::Client,
}

impl RestKv {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::Config(format!("kv client: {}", e)))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            client,
        })
    }

    /// Execute a single Redis command, returning the `result` field.
    async fn command(&self, cmd: &[&str]) -> Result<Value> {
        let resp = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.token)
            .json(&cmd)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AppError::Transient(format!(
                "kv command {} failed: {} {}",
                cmd.first().unwrap_or(&"?"),
                status,
                body
            )));
        }
        let mut body: Value = resp.json().await?;
        Ok(body
            .get_mut("result")
            .map(Value::take)
            .unwrap_or(Value::Null))
    }
}

#[async_trait]
impl AtomicKv for RestKv {
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let ttl_secs = ttl.as_secs().max(1).to_string();
        let result = self
            .command(&["SET", key, value, "NX", "EX", &ttl_secs])
            .await?;
        // SET NX returns "OK" on success, null when the key already exists.
        Ok(result.as_str() == Some("OK"))
    }

    async fn incr(&self, key: &str) -> Result<i64> {
        let result = self.command(&["INCR", key]).await?;
        result
            .as_i64()
            .ok_or_else(|| AppError::Transient(format!("INCR {} returned {}", key, result)))
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let result = self.command(&["GET", key]).await?;
        Ok(match result {
            Value::Null => None,
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        })
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<()> {
        let ttl_secs = ttl.as_secs().max(1).to_string();
        self.command(&["EXPIRE", key, &ttl_secs]).await?;
        Ok(())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// UNIT TESTS
// ════════════════════════════════════════════════════════════════════════════
