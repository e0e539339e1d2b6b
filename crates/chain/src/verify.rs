//! # Claim Transaction Verification
//!
//! Confirms, after the fact, that a transaction hash the client reports
//! really is a successful claim by that claimer on the configured rewards
//! contract. The verdict gates the daily counter: only verified claims
//! are counted.
//!
//! ## Strategies
//!
//! - `ClaimedEvent`: scan the receipt's logs for the contract's
//!   `Claimed` event and match its indexed recipient. Robust against
//!   sponsored and smart-wallet transactions where the outer `to` is an
//!   entrypoint or paymaster rather than the rewards contract.
//! - `CallData`: require a direct `claim(...)` call to the contract and
//!   match the recipient argument in the call-data. Only for deployments
//!   predating the `Claimed` event.
//!
//! Every rejection is a `Validation` error with a reason the client can
//! display; transport problems stay `Transient` so the client retries
//! instead of treating the claim as fraudulent.

use alloy::primitives::{Address, B256, U256};
use tracing::{debug, warn};

use onepulse_common::{AppError, Result};
use onepulse_common::config::VerifyStrategy;

use crate::ledger::Ledger;
use crate::rpc::{event_topic, selector, SIG_CLAIM, SIG_CLAIMED_EVENT};
use crate::types::{TxBody, TxReceipt};

/// Outcome of a successful verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedClaim {
    pub tx_hash: B256,
    pub claimer: Address,
    /// Reward amount from the event data, when the strategy exposes it.
    pub amount: Option<U256>,
}

/// Verify that `tx_hash` is a successful claim by `claimer` on
/// `contract`, using the deployment's configured strategy.
pub async fn verify_claim_tx(
    ledger: &dyn Ledger,
    strategy: VerifyStrategy,
    contract: Address,
    claimer: Address,
    tx_hash: B256,
) -> Result<VerifiedClaim> {
    match strategy {
        VerifyStrategy::ClaimedEvent => {
            let receipt = fetch_receipt(ledger, tx_hash).await?;
            verify_by_event(&receipt, contract, claimer, tx_hash)
        }
        VerifyStrategy::CallData => {
            // The body shows intent, the receipt shows success. Both are
            // needed and independent, so fetch them together.
            let (receipt, body) = tokio::join!(
                fetch_receipt(ledger, tx_hash),
                ledger.transaction_by_hash(tx_hash),
            );
            let receipt = receipt?;
            let body = body?.ok_or_else(|| {
                AppError::validation("Transaction not found on-chain")
            })?;
            verify_by_call_data(&receipt, &body, contract, claimer, tx_hash)
        }
    }
}

async fn fetch_receipt(ledger: &dyn Ledger, tx_hash: B256) -> Result<TxReceipt> {
    ledger
        .transaction_receipt(tx_hash)
        .await?
        .ok_or_else(|| AppError::validation("Transaction not found on-chain"))
}

fn require_success(receipt: &TxReceipt, tx_hash: B256) -> Result<()> {
    if !receipt.status {
        warn!(tx = %tx_hash, "claim transaction reverted");
        return Err(AppError::validation("Transaction reverted on-chain"));
    }
    Ok(())
}

// ════════════════════════════════════════════════════════════════════════════
// EVENT STRATEGY
// ════════════════════════════════════════════════════════════════════════════

fn verify_by_event(
    receipt: &TxReceipt,
    contract: Address,
    claimer: Address,
    tx_hash: B256,
) -> Result<VerifiedClaim> {
    require_success(receipt, tx_hash)?;
    let topic = event_topic(SIG_CLAIMED_EVENT);
    let claimed = receipt
        .logs
        .iter()
        .find(|log| log.address == contract && log.topics.first() == Some(&topic))
        .ok_or_else(|| {
            AppError::validation("No Claimed event found from the rewards contract")
        })?;

    // Claimed(address indexed claimer, uint256 indexed fid, uint256 amount):
    // topic 1 holds the recipient, left-padded to 32 bytes.
    let recipient_topic = claimed
        .topics
        .get(1)
        .ok_or_else(|| AppError::validation("Claimed event missing recipient topic"))?;
    let recipient = Address::from_slice(&recipient_topic.as_slice()[12..]);
    if recipient != claimer {
        warn!(tx = %tx_hash, %recipient, expected = %claimer, "claim recipient mismatch");
        return Err(AppError::validation(
            "Claimed event recipient does not match claimer",
        ));
    }

    let amount = (claimed.data.len() >= 32)
        .then(|| U256::from_be_slice(&claimed.data[..32]));
    debug!(tx = %tx_hash, %claimer, "claim verified via Claimed event");
    Ok(VerifiedClaim {
        tx_hash,
        claimer,
        amount,
    })
}

// ════════════════════════════════════════════════════════════════════════════
// CALL-DATA STRATEGY
// ════════════════════════════════════════════════════════════════════════════

fn verify_by_call_data(
    receipt: &TxReceipt,
    body: &TxBody,
    contract: Address,
    claimer: Address,
    tx_hash: B256,
) -> Result<VerifiedClaim> {
    require_success(receipt, tx_hash)?;
    if body.to != Some(contract) {
        return Err(AppError::validation(
            "Transaction was not sent to the rewards contract",
        ));
    }
    let sel = selector(SIG_CLAIM);
    if body.input.len() < 4 + 32 || body.input[..4] != sel {
        return Err(AppError::validation(
            "Transaction is not a claim call",
        ));
    }
    // claim(address claimer, ...): first argument word, address in the
    // low 20 bytes.
    let recipient = Address::from_slice(&body.input[16..36]);
    if recipient != claimer {
        warn!(tx = %tx_hash, %recipient, expected = %claimer, "claim recipient mismatch");
        return Err(AppError::validation(
            "Claim call recipient does not match claimer",
        ));
    }
    debug!(tx = %tx_hash, %claimer, "claim verified via call-data");
    Ok(VerifiedClaim {
        tx_hash,
        claimer,
        amount: None,
    })
}

// ════════════════════════════════════════════════════════════════════════════
// UNIT TESTS
// ════════════════════════════════════════════════════════════════════════════
