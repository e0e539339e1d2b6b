//! Ledger trait and an in-memory mock for testing.
//!
//! The trait covers the five reads the backend performs against a rewards
//! deployment: the claimer's voucher nonce, the eligibility view, the
//! contract owner, and a mined transaction's receipt and body. Writes are
//! deliberately absent; only claimers transact.

use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

use onepulse_common::Result;

use crate::eligibility::ClaimStatus;
use crate::types::{TxBody, TxReceipt};

// ════════════════════════════════════════════════════════════════════════════
// LEDGER TRAIT
// ════════════════════════════════════════════════════════════════════════════

/// Read-only access to a rewards contract deployment.
///
/// One instance per configured chain. All methods return owned snapshots;
/// nothing is cached here because voucher issuance and verification both
/// need current state.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Current voucher nonce for `claimer`, from `nonces(address)`.
    async fn nonce_of(&self, contract: Address, claimer: Address) -> Result<U256>;

    /// Eligibility snapshot from `canClaimToday(address,uint256)`.
    async fn claim_status(
        &self,
        contract: Address,
        claimer: Address,
        fid: U256,
    ) -> Result<ClaimStatus>;

    /// Contract owner from `owner()`. Gates the admin surface.
    async fn owner(&self, contract: Address) -> Result<Address>;

    /// Receipt of a mined transaction, `None` if the hash is unknown.
    async fn transaction_receipt(&self, tx: B256) -> Result<Option<TxReceipt>>;

    /// Body of a mined transaction, `None` if the hash is unknown.
    async fn transaction_by_hash(&self, tx: B256) -> Result<Option<TxBody>>;
}

// ════════════════════════════════════════════════════════════════════════════
// MOCK LEDGER
// ════════════════════════════════════════════════════════════════════════════

/// In-memory ledger for tests. Fully scriptable, no network calls.
///
/// State is installed through the `set_*` helpers; reads that hit nothing
/// scripted return zero nonces, unknown transactions, and an error for
/// `claim_status` (an unscripted eligibility read is a test bug, not an
/// eligible claimer).
#[derive(Default)]
pub struct MockLedger {
    nonces: Mutex<HashMap<Address, U256>>,
    statuses: Mutex<HashMap<Address, ClaimStatus>>,
    owner: Mutex<Option<Address>>,
    receipts: Mutex<HashMap<B256, TxReceipt>>,
    bodies: Mutex<HashMap<B256, TxBody>>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_nonce(&self, claimer: Address, nonce: U256) {
        self.nonces.lock().insert(claimer, nonce);
    }

    pub fn set_claim_status(&self, claimer: Address, status: ClaimStatus) {
        self.statuses.lock().insert(claimer, status);
    }

    pub fn set_owner(&self, owner: Address) {
        *self.owner.lock() = Some(owner);
    }

    pub fn set_receipt(&self, tx: B256, receipt: TxReceipt) {
        self.receipts.lock().insert(tx, receipt);
    }

    pub fn set_body(&self, tx: B256, body: TxBody) {
        self.bodies.lock().insert(tx, body);
    }
}

#[async_trait]
impl Ledger for MockLedger {
    async fn nonce_of(&self, _contract: Address, claimer: Address) -> Result<U256> {
        Ok(self
            .nonces
            .lock()
            .get(&claimer)
            .copied()
            .unwrap_or(U256::ZERO))
    }

    async fn claim_status(
        &self,
        _contract: Address,
        claimer: Address,
        _fid: U256,
    ) -> Result<ClaimStatus> {
        self.statuses.lock().get(&claimer).copied().ok_or_else(|| {
            onepulse_common::AppError::Transient(format!(
                "no scripted claim status for {}",
                claimer
            ))
        })
    }

    async fn owner(&self, _contract: Address) -> Result<Address> {
        Ok(self.owner.lock().unwrap_or(Address::ZERO))
    }

    async fn transaction_receipt(&self, tx: B256) -> Result<Option<TxReceipt>> {
        Ok(self.receipts.lock().get(&tx).cloned())
    }

    async fn transaction_by_hash(&self, tx: B256) -> Result<Option<TxBody>> {
        Ok(self.bodies.lock().get(&tx).cloned())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// UNIT TESTS
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TxLog;

    fn addr(n: u8) -> Address {
        Address::repeat_byte(n)
    }

    // ── 1. NONCE DEFAULTS AND SCRIPTING ─────────────────────────────────

    #[tokio::test]
    async fn test_nonce_defaults_to_zero() {
        let ledger = MockLedger::new();
        let n = ledger.nonce_of(addr(0xcc), addr(1)).await.unwrap();
        assert_eq!(n, U256::ZERO);

        ledger.set_nonce(addr(1), U256::from(7u64));
        let n = ledger.nonce_of(addr(0xcc), addr(1)).await.unwrap();
        assert_eq!(n, U256::from(7u64));
    }

    // ── 2. UNSCRIPTED CLAIM STATUS IS AN ERROR ──────────────────────────

    #[tokio::test]
    async fn test_unscripted_claim_status_errors() {
        let ledger = MockLedger::new();
        let res = ledger
            .claim_status(addr(0xcc), addr(2), U256::from(1234u64))
            .await;
        assert!(res.is_err());
    }

    // ── 3. RECEIPTS AND BODIES ARE KEYED BY HASH ────────────────────────

    #[tokio::test]
    async fn test_receipt_and_body_lookup() {
        let ledger = MockLedger::new();
        let tx = B256::repeat_byte(0xab);
        ledger.set_receipt(
            tx,
            TxReceipt {
                status: true,
                logs: vec![TxLog {
                    address: addr(0xcc),
                    topics: vec![B256::ZERO],
                    data: vec![],
                }],
            },
        );
        ledger.set_body(
            tx,
            TxBody {
                to: Some(addr(0xcc)),
                input: vec![1, 2, 3, 4],
            },
        );

        let receipt = ledger.transaction_receipt(tx).await.unwrap().unwrap();
        assert!(receipt.status);
        assert_eq!(receipt.logs.len(), 1);

        let body = ledger.transaction_by_hash(tx).await.unwrap().unwrap();
        assert_eq!(body.to, Some(addr(0xcc)));

        let missing = ledger
            .transaction_receipt(B256::repeat_byte(0x01))
            .await
            .unwrap();
        assert!(missing.is_none());
    }
}
