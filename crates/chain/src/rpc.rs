//! # JSON-RPC Ledger
//!
//! `RpcLedger` implements the `Ledger` trait against a standard Ethereum
//! JSON-RPC endpoint over HTTP.
//!
//! ## Encoding
//!
//! The contract surface is small enough that call-data is assembled by
//! hand: a 4-byte selector (`keccak256(signature)[..4]`) followed by
//! 32-byte words, addresses left-padded. Selectors are computed once at
//! construction, never hard-coded as magic bytes.
//!
//! ## Failure Policy
//!
//! Transport failures, non-200 responses and RPC error objects all map to
//! `AppError::Transient`. A malformed but successful response (short
//! return data) is also `Transient`; it usually means the contract at the
//! configured address is not the rewards contract.

use alloy::primitives::{keccak256, Address, B256, U256};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use onepulse_common::{AppError, Result};

use crate::eligibility::ClaimStatus;
use crate::ledger::Ledger;
use crate::types::{TxBody, TxLog, TxReceipt};

// ════════════════════════════════════════════════════════════════════════════
// SELECTORS
// ════════════════════════════════════════════════════════════════════════════

const SIG_NONCES: &str = "nonces(address)";
const SIG_CAN_CLAIM_TODAY: &str = "canClaimToday(address,uint256)";
const SIG_OWNER: &str = "owner()";
/// The claim entrypoint; verification matches redeemed call-data against it.
pub const SIG_CLAIM: &str = "claim(address,uint256,uint256,uint256,bytes)";
/// Event emitted by the rewards contract on a successful claim.
pub const SIG_CLAIMED_EVENT: &str = "Claimed(address,uint256,uint256)";

/// First four bytes of the keccak-256 of a function signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Topic 0 for an event signature.
pub fn event_topic(signature: &str) -> B256 {
    keccak256(signature.as_bytes())
}

// ════════════════════════════════════════════════════════════════════════════
// ABI WORDS
// ════════════════════════════════════════════════════════════════════════════

fn word_from_address(addr: Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(addr.as_slice());
    word
}

fn word_from_u256(value: U256) -> [u8; 32] {
    value.to_be_bytes()
}

/// The `i`-th 32-byte word of ABI return data.
fn return_word(data: &[u8], i: usize) -> Result<[u8; 32]> {
    let start = i * 32;
    let end = start + 32;
    if data.len() < end {
        return Err(AppError::Transient(format!(
            "short return data: {} bytes, need {}",
            data.len(),
            end
        )));
    }
    let mut word = [0u8; 32];
    word.copy_from_slice(&data[start..end]);
    Ok(word)
}

fn word_to_u256(word: [u8; 32]) -> U256 {
    U256::from_be_bytes(word)
}

fn word_to_bool(word: [u8; 32]) -> bool {
    word_to_u256(word) != U256::ZERO
}

fn word_to_address(word: [u8; 32]) -> Address {
    Address::from_slice(&word[12..])
}

// ════════════════════════════════════════════════════════════════════════════
// RPC LEDGER
// ════════════════════════════════════════════════════════════════════════════

/// `Ledger` over an Ethereum JSON-RPC HTTP endpoint.
pub struct RpcLedger {
    client: reqwest::Client,
    url: String,
    sel_nonces: [u8; 4],
    sel_can_claim_today: [u8; 4],
    sel_owner: [u8; 4],
}

impl RpcLedger {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        RpcLedger {
            client,
            url: url.into(),
            sel_nonces: selector(SIG_NONCES),
            sel_can_claim_today: selector(SIG_CAN_CLAIM_TODAY),
            sel_owner: selector(SIG_OWNER),
        }
    }

    /// One JSON-RPC request. Returns the `result` value; an `error`
    /// object in the response is a transient failure.
    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| AppError::Transient(format!("rpc {}: {}", method, e)))?;
        let mut payload: Value = resp.json().await?;
        if let Some(err) = payload.get("error") {
            return Err(AppError::Transient(format!(
                "rpc {} error: {}",
                method, err
            )));
        }
        Ok(payload
            .get_mut("result")
            .map(Value::take)
            .unwrap_or(Value::Null))
    }

    /// `eth_call` against `contract` at the latest block, returning the
    /// raw return data.
    async fn eth_call(&self, contract: Address, data: Vec<u8>) -> Result<Vec<u8>> {
        let params = json!([
            { "to": format!("{:#x}", contract), "data": format!("0x{}", hex::encode(&data)) },
            "latest",
        ]);
        let result = self.request("eth_call", params).await?;
        let hex_str = result
            .as_str()
            .ok_or_else(|| AppError::Transient("eth_call: non-string result".into()))?;
        decode_hex(hex_str)
    }

    fn call_data(sel: [u8; 4], words: &[[u8; 32]]) -> Vec<u8> {
        let mut data = Vec::with_capacity(4 + words.len() * 32);
        data.extend_from_slice(&sel);
        for w in words {
            data.extend_from_slice(w);
        }
        data
    }
}

fn decode_hex(s: &str) -> Result<Vec<u8>> {
    let stripped = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(stripped).map_err(|e| AppError::Transient(format!("bad hex from rpc: {}", e)))
}

fn parse_hex_field(obj: &Value, field: &str) -> Result<Vec<u8>> {
    let s = obj
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::Transient(format!("rpc object missing {}", field)))?;
    decode_hex(s)
}

#[async_trait]
impl Ledger for RpcLedger {
    async fn nonce_of(&self, contract: Address, claimer: Address) -> Result<U256> {
        let data = Self::call_data(self.sel_nonces, &[word_from_address(claimer)]);
        let ret = self.eth_call(contract, data).await?;
        Ok(word_to_u256(return_word(&ret, 0)?))
    }

    async fn claim_status(
        &self,
        contract: Address,
        claimer: Address,
        fid: U256,
    ) -> Result<ClaimStatus> {
        let data = Self::call_data(
            self.sel_can_claim_today,
            &[word_from_address(claimer), word_from_u256(fid)],
        );
        let ret = self.eth_call(contract, data).await?;
        debug!(claimer = %claimer, bytes = ret.len(), "canClaimToday returned");
        Ok(ClaimStatus {
            ok: word_to_bool(return_word(&ret, 0)?),
            fid_is_blacklisted: word_to_bool(return_word(&ret, 1)?),
            fid_claimed_today: word_to_bool(return_word(&ret, 2)?),
            global_limit_reached: word_to_bool(return_word(&ret, 3)?),
            has_sent_gm_today: word_to_bool(return_word(&ret, 4)?),
            reward: word_to_u256(return_word(&ret, 5)?),
            vault_balance: word_to_u256(return_word(&ret, 6)?),
            min_reserve: word_to_u256(return_word(&ret, 7)?),
            global_claims_today: word_to_u256(return_word(&ret, 8)?),
            global_claim_limit: word_to_u256(return_word(&ret, 9)?),
        })
    }

    async fn owner(&self, contract: Address) -> Result<Address> {
        let data = Self::call_data(self.sel_owner, &[]);
        let ret = self.eth_call(contract, data).await?;
        Ok(word_to_address(return_word(&ret, 0)?))
    }

    async fn transaction_receipt(&self, tx: B256) -> Result<Option<TxReceipt>> {
        let result = self
            .request("eth_getTransactionReceipt", json!([format!("{:#x}", tx)]))
            .await?;
        if result.is_null() {
            return Ok(None);
        }
        let status = result
            .get("status")
            .and_then(Value::as_str)
            .map(|s| s == "0x1")
            .unwrap_or(false);
        let mut logs = Vec::new();
        for log in result
            .get("logs")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
        {
            let address = log
                .get("address")
                .and_then(Value::as_str)
                .and_then(|s| s.parse::<Address>().ok())
                .ok_or_else(|| AppError::Transient("receipt log missing address".into()))?;
            let mut topics = Vec::new();
            for t in log
                .get("topics")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
            {
                let topic = t
                    .as_str()
                    .and_then(|s| s.parse::<B256>().ok())
                    .ok_or_else(|| AppError::Transient("receipt log bad topic".into()))?;
                topics.push(topic);
            }
            let data = parse_hex_field(log, "data")?;
            logs.push(TxLog {
                address,
                topics,
                data,
            });
        }
        Ok(Some(TxReceipt { status, logs }))
    }

    async fn transaction_by_hash(&self, tx: B256) -> Result<Option<TxBody>> {
        let result = self
            .request("eth_getTransactionByHash", json!([format!("{:#x}", tx)]))
            .await?;
        if result.is_null() {
            return Ok(None);
        }
        let to = match result.get("to") {
            Some(Value::String(s)) => Some(
                s.parse::<Address>()
                    .map_err(|e| AppError::Transient(format!("bad tx to field: {}", e)))?,
            ),
            _ => None,
        };
        let input = parse_hex_field(&result, "input")?;
        Ok(Some(TxBody { to, input }))
    }
}

// ════════════════════════════════════════════════════════════════════════════
// UNIT TESTS
// ════════════════════════════════════════════════════════════════════════════
