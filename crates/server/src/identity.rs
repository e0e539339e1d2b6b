//! Bearer-token identity verification against an external auth service.
//!
//! The service takes the token from the client's session and answers with
//! the fid it belongs to. The check fails closed: any failure to verify,
//! including upstream outages after retries, leaves the request
//! unauthenticated.

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use onepulse_common::retry::{retry_with_backoff, DEFAULT_INITIAL_DELAY, DEFAULT_MAX_ATTEMPTS};
use onepulse_common::{AppError, Result};

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    fid: u64,
}

/// Client for the identity verification endpoint.
#[derive(Clone)]
pub struct IdentityVerifier {
    client: reqwest::Client,
    url: String,
}

impl IdentityVerifier {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::Config(format!("identity http client: {}", e)))?;
        Ok(IdentityVerifier {
            client,
            url: url.into(),
        })
    }

    /// Resolve a bearer token to the fid it authenticates.
    ///
    /// Retries timeouts, 5xx and 429; a definitive rejection (any other
    /// 4xx) is returned immediately.
    pub async fn verify_bearer(&self, token: &str) -> Result<u64> {
        let out = retry_with_backoff(
            DEFAULT_MAX_ATTEMPTS,
            DEFAULT_INITIAL_DELAY,
            || self.verify_once(token),
            AppError::is_retryable,
        )
        .await;
        match &out {
            Ok(fid) => debug!(fid, "bearer token verified"),
            Err(e) => warn!(error = %e, "bearer token verification failed"),
        }
        out
    }

    async fn verify_once(&self, token: &str) -> Result<u64> {
        let resp = self
            .client
            .post(&self.url)
            .bearer_auth(token)
            .send()
            .await?;
        let status = resp.status();
        if status.is_server_error() || status.as_u16() == 429 {
            return Err(AppError::Transient(format!(
                "identity service returned {}",
                status
            )));
        }
        if !status.is_success() {
            return Err(AppError::validation("Invalid or expired session token"));
        }
        let body: VerifyResponse = resp.json().await?;
        Ok(body.fid)
    }
}
