//! Config loader using TOML and serde, with environment overrides for the
//! deployment-specific pieces (bind address, KV endpoint, secrets).
//!
//! The backend signing key is intentionally NOT part of the file: it only
//! ever comes from `BACKEND_SIGNER_PRIVATE_KEY`, is read once at startup,
//! and is never logged.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::Result;

/// Environment variable holding the voucher signing key (hex, 0x-prefixed).
pub const SIGNER_KEY_ENV: &str = "BACKEND_SIGNER_PRIVATE_KEY";

/// How claim transactions are verified on a given contract deployment.
///
/// Selected per deployed contract version, not per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VerifyStrategy {
    /// Scan the receipt for a `Claimed` event from the rewards contract.
    /// Works for sponsored/smart-wallet transactions where the outer
    /// sender is a paymaster or entrypoint.
    #[default]
    ClaimedEvent,
    /// Require a direct call: `to` is the contract, call-data selector is
    /// `claim(...)`, first argument is the recipient.
    CallData,
}

/// Per-chain deployment parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub rpc_url: String,
    /// Rewards contract address (`0x`-prefixed). Absent means claims are
    /// not enabled on this chain; issuance fails closed.
    pub rewards_contract: Option<String>,
    #[serde(default)]
    pub verify_strategy: VerifyStrategy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Bind address for the HTTP server.
    pub bind_addr: Option<String>,

    /// Chain used for claim confirmation and admin owner checks.
    pub default_chain_id: u64,

    /// Global ceiling of counted claims per UTC day.
    pub daily_claim_limit: i64,

    /// Confirm endpoint: requests per window by caller IP.
    pub confirm_ip_max: i64,
    /// Confirm endpoint: requests per window by claimant address.
    pub confirm_claimer_max: i64,
    /// Rate-limit window length in seconds.
    pub rate_limit_window_secs: u64,

    /// Upstash-style Redis REST endpoint. Absent selects the in-memory
    /// backend (single-instance development only).
    pub kv_rest_url: Option<String>,

    /// Identity verification endpoint. When set, `/claims/execute`
    /// requires a bearer token that resolves to the requested fid.
    pub auth_verify_url: Option<String>,

    /// Deployed chains.
    pub chains: Vec<ChainConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            bind_addr: Some("127.0.0.1:8080".to_string()),
            default_chain_id: 8453,
            daily_claim_limit: 500,
            confirm_ip_max: 10,
            confirm_claimer_max: 5,
            rate_limit_window_secs: 60,
            kv_rest_url: None,
            auth_verify_url: None,
            chains: vec![ChainConfig {
                chain_id: 8453,
                rpc_url: "https://mainnet.base.org".to_string(),
                rewards_contract: None,
                verify_strategy: VerifyStrategy::ClaimedEvent,
            }],
        }
    }
}

impl AppConfig {
    /// Load from a TOML file, then apply environment overrides.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<AppConfig> {
        let s = fs::read_to_string(path.as_ref())
            .map_err(|e| AppError::Config(format!("read config: {}", e)))?;
        let mut cfg: AppConfig =
            toml::from_str(&s).map_err(|e| AppError::Config(format!("parse config: {}", e)))?;
        cfg.apply_env();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Environment overrides for deployment-specific fields.
    pub fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("BIND_ADDR") {
            self.bind_addr = Some(v);
        }
        if let Ok(v) = std::env::var("KV_REST_API_URL") {
            self.kv_rest_url = Some(v);
        }
        if let Ok(v) = std::env::var("AUTH_VERIFY_URL") {
            self.auth_verify_url = Some(v);
        }
    }

    /// The signing key from the environment, if configured.
    ///
    /// Callers decide whether its absence is fatal; the server refuses to
    /// start the issuance surface without it.
    pub fn signing_key() -> Option<String> {
        std::env::var(SIGNER_KEY_ENV).ok().filter(|s| !s.is_empty())
    }

    /// KV REST token, paired with `kv_rest_url`.
    pub fn kv_rest_token() -> Option<String> {
        std::env::var("KV_REST_API_TOKEN").ok().filter(|s| !s.is_empty())
    }

    pub fn chain(&self, chain_id: u64) -> Option<&ChainConfig> {
        self.chains.iter().find(|c| c.chain_id == chain_id)
    }

    pub fn default_chain(&self) -> Option<&ChainConfig> {
        self.chain(self.default_chain_id)
    }

    /// Chains keyed by id; duplicate ids are a config error caught by
    /// `validate`, so later entries never shadow earlier ones silently.
    pub fn chain_map(&self) -> HashMap<u64, &ChainConfig> {
        self.chains.iter().map(|c| (c.chain_id, c)).collect()
    }

    /// Fail closed on anything that would otherwise surface as a silently
    /// rejected voucher: malformed contract addresses, duplicate chains,
    /// a default chain that is not deployed, nonsense limits.
    pub fn validate(&self) -> Result<()> {
        if self.daily_claim_limit <= 0 {
            return Err(AppError::Config("daily_claim_limit must be positive".into()));
        }
        if self.rate_limit_window_secs == 0 {
            return Err(AppError::Config("rate_limit_window_secs must be positive".into()));
        }
        if self.chains.is_empty() {
            return Err(AppError::Config("at least one chain must be configured".into()));
        }
        let mut seen = std::collections::HashSet::new();
        for chain in &self.chains {
            if !seen.insert(chain.chain_id) {
                return Err(AppError::Config(format!(
                    "duplicate chain id {}",
                    chain.chain_id
                )));
            }
            if let Some(addr) = &chain.rewards_contract {
                if !is_hex_address(addr) {
                    return Err(AppError::Config(format!(
                        "chain {}: malformed rewards_contract {}",
                        chain.chain_id, addr
                    )));
                }
            }
        }
        if self.default_chain().is_none() {
            return Err(AppError::Config(format!(
                "default_chain_id {} has no chain entry",
                self.default_chain_id
            )));
        }
        Ok(())
    }
}

/// `0x` + 40 hex chars.
fn is_hex_address(s: &str) -> bool {
    s.len() == 42
        && s.starts_with("0x")
        && s[2..].bytes().all(|b| b.is_ascii_hexdigit())
}
