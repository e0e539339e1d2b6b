//! Lightweight views of on-chain data.
//!
//! The verifier only needs a receipt's status and logs plus a
//! transaction's target and call-data, so the ledger trait returns these
//! small owned types instead of leaking a provider's full RPC structs.

use alloy::primitives::{Address, B256};

/// One log entry from a transaction receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxLog {
    /// Emitting contract.
    pub address: Address,
    /// Topic 0 is the event signature hash; indexed args follow.
    pub topics: Vec<B256>,
    /// Non-indexed event data.
    pub data: Vec<u8>,
}

/// Receipt of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    /// True when the transaction succeeded.
    pub status: bool,
    pub logs: Vec<TxLog>,
}

/// Body of a mined transaction, as much of it as verification needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxBody {
    /// Direct target. `None` for contract creation.
    pub to: Option<Address>,
    /// Raw call-data.
    pub input: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_topics_keep_order() {
        let log = TxLog {
            address: Address::ZERO,
            topics: vec![B256::with_last_byte(1), B256::with_last_byte(2)],
            data: vec![],
        };
        assert_eq!(log.topics[0], B256::with_last_byte(1));
        assert_eq!(log.topics[1], B256::with_last_byte(2));
    }
}
