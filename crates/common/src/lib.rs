//! # OnePulse Common Crate
//!
//! Shared infrastructure for the claim backend.
//!
//! ## Modules
//! - `error`: the caller-facing error taxonomy
//! - `config`: TOML + environment configuration
//! - `kv`: AtomicKv trait definition with REST and in-memory backends
//! - `counter`: atomic, idempotent daily-claim counter
//! - `rate_limit`: fixed-window rate limiter over the KV
//! - `day`: UTC day-key helpers
//! - `retry`: bounded retry with exponential backoff
//!
//! ## KV Architecture
//! ```text
//! ┌─────────────────┐
//! │    AtomicKv     │  <- Abstract trait
//! └────────┬────────┘
//!          │
//!    ┌─────┴─────┐
//!    │           │
//! ┌──▼───┐   ┌───▼────┐
//! │RestKv│   │MemoryKv│
//! └──────┘   └────────┘
//! ```
//!
//! The counter and the rate limiter only ever talk to the trait, so every
//! deployment shape (shared Redis behind a load balancer, or a single
//! in-process map in tests) goes through the same two primitives:
//! `set_if_absent` and `incr`.

pub mod config;
pub mod counter;
pub mod day;
pub mod error;
pub mod kv;
pub mod rate_limit;
pub mod retry;

pub use config::{AppConfig, ChainConfig};
pub use counter::{DailyClaimCounter, ProcessOutcome};
pub use error::AppError;
pub use kv::{AtomicKv, MemoryKv, RestKv};
pub use rate_limit::{RateLimitStatus, RateLimiter};

pub type Result<T> = std::result::Result<T, AppError>;
