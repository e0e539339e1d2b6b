//! # Claim Voucher Signing
//!
//! A voucher is the backend's authorization for one claim: the claimer's
//! address, their fid, the claimer's current contract nonce, an expiry
//! deadline and a signature over all of it plus the contract address.
//!
//! ## Voucher Flow
//! ```text
//! POST /claims/execute
//!        │
//!        ▼
//! ┌──────────────┐  nonces(claimer)  ┌─────────┐
//! │ ClaimVoucher │ ────────────────> │ Ledger  │
//! │    Signer    │ <──────────────── │         │
//! └──────┬───────┘      nonce        └─────────┘
//!        │ sign(claimer, fid, nonce, deadline, contract)
//!        ▼
//! IssuedVoucher ──> claimer submits claim(...) on-chain
//! ```
//!
//! ## Replay Protection
//!
//! The nonce is read from the contract at issuance and checked again by
//! the contract at redemption; a redeemed voucher advances the nonce and
//! every outstanding voucher for that claimer dies with it. The deadline
//! bounds how long an unredeemed voucher stays live. The backend keeps no
//! voucher state at all.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use alloy::primitives::{keccak256, Address, B256, U256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use serde::Serialize;
use tracing::info;

use onepulse_common::{AppError, Result};

use crate::ledger::Ledger;

/// Default voucher lifetime.
pub const DEFAULT_VOUCHER_TTL: Duration = Duration::from_secs(10 * 60);
/// Upper bound on a caller-supplied deadline.
pub const MAX_VOUCHER_TTL: Duration = Duration::from_secs(24 * 60 * 60);

// ════════════════════════════════════════════════════════════════════════════
// SIGNING SCHEME
// ════════════════════════════════════════════════════════════════════════════

/// How the voucher digest is built before ECDSA signing.
///
/// Fixed per contract deployment; the contract recovers the signer with
/// the same scheme or every voucher is rejected on-chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningScheme {
    /// keccak-256 of the packed fields, then the EIP-191
    /// `"\x19Ethereum Signed Message:\n32"` prefix over that hash.
    Eip191Packed,
}

/// Packed voucher message: claimer(20) fid(32) nonce(32) deadline(32)
/// contract(20), 136 bytes total. Matches Solidity
/// `abi.encodePacked(claimer, fid, nonce, deadline, address(this))`.
fn packed_message(
    claimer: Address,
    fid: U256,
    nonce: U256,
    deadline: U256,
    contract: Address,
) -> Vec<u8> {
    let mut msg = Vec::with_capacity(136);
    msg.extend_from_slice(claimer.as_slice());
    msg.extend_from_slice(&fid.to_be_bytes::<32>());
    msg.extend_from_slice(&nonce.to_be_bytes::<32>());
    msg.extend_from_slice(&deadline.to_be_bytes::<32>());
    msg.extend_from_slice(contract.as_slice());
    msg
}

/// Final digest for `Eip191Packed`.
fn eip191_digest(packed: &[u8]) -> B256 {
    let inner = keccak256(packed);
    let mut prefixed = Vec::with_capacity(28 + 32);
    prefixed.extend_from_slice(b"\x19Ethereum Signed Message:\n32");
    prefixed.extend_from_slice(inner.as_slice());
    keccak256(&prefixed)
}

// ════════════════════════════════════════════════════════════════════════════
// ISSUED VOUCHER
// ════════════════════════════════════════════════════════════════════════════

/// A signed claim authorization, returned verbatim to the client.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedVoucher {
    pub claimer: Address,
    pub fid: U256,
    pub nonce: U256,
    /// Unix seconds after which the contract rejects the voucher.
    pub deadline: U256,
    /// 65-byte r || s || v signature, hex with `0x` prefix, v in {27, 28}.
    pub signature: String,
}

// ════════════════════════════════════════════════════════════════════════════
// SIGNER
// ════════════════════════════════════════════════════════════════════════════

/// Issues claim vouchers with the backend's secp256k1 key.
pub struct ClaimVoucherSigner {
    signer: PrivateKeySigner,
    scheme: SigningScheme,
    ttl: Duration,
}

impl ClaimVoucherSigner {
    /// Build from a `0x`-prefixed hex private key. The key material is
    /// consumed here and never surfaced again; `Debug` is not derived.
    pub fn from_hex_key(key: &str, scheme: SigningScheme) -> Result<Self> {
        let signer: PrivateKeySigner = key
            .trim()
            .parse()
            .map_err(|_| AppError::Config("malformed backend signing key".into()))?;
        Ok(ClaimVoucherSigner {
            signer,
            scheme,
            ttl: DEFAULT_VOUCHER_TTL,
        })
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Address the contract must hold as its trusted backend signer.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Issue a voucher for `claimer`/`fid` against `contract`.
    ///
    /// Reads the claimer's current nonce from the ledger; eligibility is
    /// the caller's concern and is checked before this is invoked. A
    /// caller-supplied deadline must lie in the future and within
    /// `MAX_VOUCHER_TTL`; absent, the default lifetime applies.
    pub async fn issue(
        &self,
        ledger: &dyn Ledger,
        contract: Address,
        claimer: Address,
        fid: U256,
        deadline: Option<u64>,
    ) -> Result<IssuedVoucher> {
        let nonce = ledger.nonce_of(contract, claimer).await?;
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| AppError::Transient(format!("system clock: {}", e)))?;
        let deadline = match deadline {
            Some(d) => {
                if d <= now.as_secs() {
                    return Err(AppError::validation("Voucher deadline is in the past"));
                }
                if d > (now + MAX_VOUCHER_TTL).as_secs() {
                    return Err(AppError::validation("Voucher deadline is too far out"));
                }
                U256::from(d)
            }
            None => U256::from((now + self.ttl).as_secs()),
        };
        let voucher = self.sign(contract, claimer, fid, nonce, deadline)?;
        info!(
            claimer = %claimer,
            fid = %fid,
            nonce = %nonce,
            deadline = %deadline,
            "issued claim voucher"
        );
        Ok(voucher)
    }

    /// Deterministic signing step, separated from the clock and the
    /// ledger so tests can pin every field.
    pub fn sign(
        &self,
        contract: Address,
        claimer: Address,
        fid: U256,
        nonce: U256,
        deadline: U256,
    ) -> Result<IssuedVoucher> {
        let digest = match self.scheme {
            SigningScheme::Eip191Packed => {
                eip191_digest(&packed_message(claimer, fid, nonce, deadline, contract))
            }
        };
        let sig = self
            .signer
            .sign_hash_sync(&digest)
            .map_err(|e| AppError::Transient(format!("voucher signing failed: {}", e)))?;
        Ok(IssuedVoucher {
            claimer,
            fid,
            nonce,
            deadline,
            signature: format!("0x{}", hex::encode(sig.as_bytes())),
        })
    }
}

// ════════════════════════════════════════════════════════════════════════════
// UNIT TESTS
// ════════════════════════════════════════════════════════════════════════════
