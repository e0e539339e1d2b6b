//! # OnePulse Chain Crate
//!
//! Everything that touches the rewards ledger.
//!
//! ## Modules
//! - `types`: lightweight receipt/transaction/log types
//! - `ledger`: Ledger trait definition with a scriptable mock
//! - `rpc`: JSON-RPC implementation over HTTP
//! - `voucher`: backend-signed claim authorizations
//! - `verify`: post-hoc verification of redeemed claims
//! - `eligibility`: the on-chain claim-status projection
//!
//! ## Ledger Architecture
//! ```text
//! ┌─────────────────┐
//! │     Ledger      │  <- Abstract trait
//! └────────┬────────┘
//!          │
//!    ┌─────┴─────┐
//!    │           │
//! ┌──▼──────┐ ┌──▼───────┐
//! │RpcLedger│ │MockLedger│
//! └─────────┘ └──────────┘
//! ```
//!
//! The ledger is the single source of nonce truth: the voucher issuer
//! reads nonces, it never advances them. Redemption (or explicit
//! invalidation) on-chain is what retires a voucher.

pub mod eligibility;
pub mod ledger;
pub mod rpc;
pub mod types;
pub mod verify;
pub mod voucher;

pub use eligibility::{ClaimGate, ClaimStatus};
pub use ledger::{Ledger, MockLedger};
pub use rpc::RpcLedger;
pub use types::{TxBody, TxLog, TxReceipt};
pub use verify::{verify_claim_tx, VerifiedClaim};
pub use voucher::{ClaimVoucherSigner, IssuedVoucher, SigningScheme};
