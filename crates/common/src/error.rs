//! # Error Taxonomy
//!
//! One enum for everything a request handler can surface to a caller.
//!
//! ## Variants
//!
//! | Variant | HTTP | Retryable | Audience |
//! |---------|------|-----------|----------|
//! | `Validation` | 400 | no | caller |
//! | `RateLimited` | 429 | after window | caller |
//! | `Config` | 500 | no | operator |
//! | `Transient` | 500 | yes | operator |
//!
//! `Validation` always carries a human-readable reason so the client can
//! present "already claimed", "wrong contract", "recipient mismatch" etc.
//! distinctly instead of a generic failure. `Transient` covers network and
//! serialization trouble talking to the ledger or the KV store; it is never
//! silently swallowed on the issuance or counting paths.

use thiserror::Error;

/// Request-level error for the claim backend.
///
/// Every rejection reason a caller can observe maps to exactly one
/// variant. Unexpected upstream failures are `Transient`, server
/// misconfiguration is `Config`; both deliberately carry no caller
/// guidance beyond "try later" / "contact operator".
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed input or an on-chain verification mismatch.
    #[error("{0}")]
    Validation(String),

    /// A rate-limit axis was exceeded. Retryable after the window rolls.
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Server-side misconfiguration (missing signing key, missing
    /// contract address for the active chain).
    #[error("configuration error: {0}")]
    Config(String),

    /// Network/timeout/serialization failure talking to an upstream
    /// (ledger RPC, KV store, identity endpoint). Safe to retry.
    #[error("transient upstream failure: {0}")]
    Transient(String),
}

impl AppError {
    /// Shorthand for a validation failure with a formatted reason.
    pub fn validation(reason: impl Into<String>) -> Self {
        AppError::Validation(reason.into())
    }

    /// HTTP status code this error maps to at the API boundary.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::Validation(_) => 400,
            AppError::RateLimited { .. } => 429,
            AppError::Config(_) | AppError::Transient(_) => 500,
        }
    }

    /// True for failures the caller may retry without changing the request.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::RateLimited { .. } | AppError::Transient(_)
        )
    }
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        AppError::Transient(format!("http: {}", e))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Transient(format!("json: {}", e))
    }
}

// ════════════════════════════════════════════════════════════════════════════
// UNIT TESTS
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    // ── 1. STATUS CODE MAPPING ──────────────────────────────────────────

    #[test]
    fn test_status_code_mapping() {
        assert_eq!(AppError::validation("bad").status_code(), 400);
        assert_eq!(
            AppError::RateLimited { retry_after_secs: 60 }.status_code(),
            429
        );
        assert_eq!(AppError::Config("no key".into()).status_code(), 500);
        assert_eq!(AppError::Transient("rpc down".into()).status_code(), 500);
    }

    // ── 2. RETRYABILITY ─────────────────────────────────────────────────

    #[test]
    fn test_retryability() {
        assert!(!AppError::validation("bad").is_retryable());
        assert!(AppError::RateLimited { retry_after_secs: 1 }.is_retryable());
        assert!(!AppError::Config("x".into()).is_retryable());
        assert!(AppError::Transient("x".into()).is_retryable());
    }

    // ── 3. VALIDATION DISPLAY IS THE REASON VERBATIM ────────────────────

    #[test]
    fn test_validation_display_verbatim() {
        let err = AppError::validation("Claimed event recipient does not match claimer");
        assert_eq!(
            err.to_string(),
            "Claimed event recipient does not match claimer"
        );
    }
}
