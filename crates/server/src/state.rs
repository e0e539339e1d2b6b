//! Shared application state for the HTTP surface.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use onepulse_chain::{ClaimVoucherSigner, Ledger};
use onepulse_common::{AppConfig, AtomicKv, DailyClaimCounter, RateLimiter};

use crate::identity::IdentityVerifier;

/// Everything the handlers need, built once at startup.
pub struct AppState {
    pub config: AppConfig,
    pub kv: Arc<dyn AtomicKv>,
    /// One ledger per configured chain, keyed by chain id.
    pub ledgers: HashMap<u64, Arc<dyn Ledger>>,
    /// Absent when no signing key is configured; issuance then refuses
    /// with a config error instead of minting unsigned vouchers.
    pub signer: Option<ClaimVoucherSigner>,
    pub counter: DailyClaimCounter,
    pub rate_limiter: RateLimiter,
    /// Absent when no verification endpoint is configured; execute then
    /// skips the identity check entirely.
    pub identity: Option<IdentityVerifier>,
    /// Admin-toggled chain visibility. A chain missing from the map is
    /// visible; an explicit `false` hides it from issuance.
    pub visibility: RwLock<HashMap<u64, bool>>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        kv: Arc<dyn AtomicKv>,
        ledgers: HashMap<u64, Arc<dyn Ledger>>,
        signer: Option<ClaimVoucherSigner>,
        identity: Option<IdentityVerifier>,
    ) -> Self {
        let counter = DailyClaimCounter::new(kv.clone());
        let rate_limiter = RateLimiter::new(kv.clone());
        AppState {
            config,
            kv,
            ledgers,
            signer,
            counter,
            rate_limiter,
            identity,
            visibility: RwLock::new(HashMap::new()),
        }
    }

    pub fn ledger(&self, chain_id: u64) -> Option<Arc<dyn Ledger>> {
        self.ledgers.get(&chain_id).cloned()
    }

    pub fn chain_visible(&self, chain_id: u64) -> bool {
        self.visibility
            .read()
            .get(&chain_id)
            .copied()
            .unwrap_or(true)
    }

    pub fn set_chain_visible(&self, chain_id: u64, visible: bool) {
        self.visibility.write().insert(chain_id, visible);
    }
}
