//! # OnePulse Server Crate
//!
//! HTTP surface for the daily claim backend: voucher issuance, claim
//! confirmation, eligibility reads, stats and the admin visibility
//! toggle. Built on axum with one shared `AppState`.

pub mod handlers;
pub mod identity;
pub mod state;

pub use handlers::router;
pub use identity::IdentityVerifier;
pub use state::AppState;
