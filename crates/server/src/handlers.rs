//! # HTTP Handlers
//!
//! The full claim surface of the backend.
//!
//! ## Endpoints
//!
//! | Endpoint | Method | Description |
//! |----------|--------|-------------|
//! | `/health` | GET | Liveness probe |
//! | `/claims/execute` | POST | Issue a signed claim voucher |
//! | `/claims/confirm` | POST | Verify a claim tx and count it |
//! | `/claims/eligibility` | GET | On-chain eligibility snapshot |
//! | `/claims/stats` | GET | Today's counted claims vs the limit |
//! | `/admin/chains/visibility` | GET | Current chain visibility map |
//! | `/admin/chains/visibility` | POST | Owner-gated visibility toggle |
//!
//! ## Confirm Ordering
//!
//! Rate limits are checked before any chain read, verification before
//! any counting, and the dedup marker before the counter increment. A
//! request that fails any step leaves the day's count untouched.

use std::sync::Arc;

use alloy::primitives::{Address, B256, U256};
use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use onepulse_chain::{verify_claim_tx, ClaimGate, Ledger};
use onepulse_common::{AppError, ChainConfig, ProcessOutcome, Result};

use crate::state::AppState;

// ════════════════════════════════════════════════════════════════════════════
// REQUEST TYPES
// ════════════════════════════════════════════════════════════════════════════

/// Request body for voucher issuance.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecuteClaimReq {
    pub claimer: String,
    pub fid: u64,
    /// Requested expiry, unix seconds. Defaults to the signer's TTL.
    pub deadline: Option<u64>,
    /// Defaults to the configured default chain.
    #[serde(alias = "chainId")]
    pub chain_id: Option<u64>,
}

/// Request body for claim confirmation.
///
/// Aliases keep clients speaking the older camelCase wire format working.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmClaimReq {
    #[serde(alias = "transactionHash")]
    pub tx_hash: String,
    pub claimer: String,
}

/// Query params for the eligibility snapshot.
#[derive(Debug, Clone, Deserialize)]
pub struct EligibilityQuery {
    pub claimer: String,
    pub fid: u64,
    #[serde(alias = "chainId")]
    pub chain_id: Option<u64>,
}

/// Request body for the visibility toggle.
#[derive(Debug, Clone, Deserialize)]
pub struct VisibilityReq {
    /// Must match the rewards contract owner on the default chain.
    pub caller: String,
    #[serde(alias = "chainId")]
    pub chain_id: u64,
    pub visible: bool,
}

// ════════════════════════════════════════════════════════════════════════════
// ROUTER
// ════════════════════════════════════════════════════════════════════════════

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/claims/execute", post(execute_claim_handler))
        .route("/claims/confirm", post(confirm_claim_handler))
        .route("/claims/eligibility", get(eligibility_handler))
        .route("/claims/stats", get(stats_handler))
        .route(
            "/admin/chains/visibility",
            get(get_visibility_handler).post(set_visibility_handler),
        )
        .with_state(state)
}

// ════════════════════════════════════════════════════════════════════════════
// HELPERS
// ════════════════════════════════════════════════════════════════════════════

fn error_json(err: &AppError) -> (StatusCode, Json<Value>) {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut body = json!({"error": err.to_string()});
    if let AppError::RateLimited { retry_after_secs } = err {
        body["retry_after_secs"] = json!(retry_after_secs);
    }
    (status, Json(body))
}

fn parse_address(s: &str) -> Result<Address> {
    s.parse::<Address>()
        .map_err(|_| AppError::validation("Malformed claimer address"))
}

fn parse_tx_hash(s: &str) -> Result<B256> {
    s.parse::<B256>()
        .map_err(|_| AppError::validation("Malformed transaction hash"))
}

/// Caller IP for rate limiting. Behind a proxy the first entry of
/// `x-forwarded-for` is the client; direct connections fall into one
/// shared bucket.
fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

struct ActiveChain {
    cfg: ChainConfig,
    ledger: Arc<dyn Ledger>,
    contract: Address,
}

/// Resolve a request's chain, failing closed on anything not fully
/// deployed: unknown id, hidden chain, missing contract, missing ledger.
///
/// `require_visible` is false only for the admin path, which must keep
/// working after the default chain itself has been hidden.
fn resolve_chain(
    state: &AppState,
    chain_id: Option<u64>,
    require_visible: bool,
) -> Result<ActiveChain> {
    let id = chain_id.unwrap_or(state.config.default_chain_id);
    let cfg = state
        .config
        .chain(id)
        .ok_or_else(|| AppError::validation(format!("Unsupported chain {}", id)))?
        .clone();
    if require_visible && !state.chain_visible(id) {
        return Err(AppError::validation(format!(
            "Claims are currently disabled on chain {}",
            id
        )));
    }
    let contract = cfg
        .rewards_contract
        .as_deref()
        .ok_or_else(|| AppError::Config(format!("chain {}: no rewards contract", id)))?
        .parse::<Address>()
        .map_err(|_| AppError::Config(format!("chain {}: bad rewards contract", id)))?;
    let ledger = state
        .ledger(id)
        .ok_or_else(|| AppError::Config(format!("chain {}: no ledger", id)))?;
    Ok(ActiveChain {
        cfg,
        ledger,
        contract,
    })
}

// ════════════════════════════════════════════════════════════════════════════
// HEALTH
// ════════════════════════════════════════════════════════════════════════════

/// GET /health
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "ok": true,
        "chains": state.config.chains.iter().map(|c| c.chain_id).collect::<Vec<_>>(),
        "issuance_enabled": state.signer.is_some(),
    }))
}

// ════════════════════════════════════════════════════════════════════════════
// EXECUTE
// ════════════════════════════════════════════════════════════════════════════

/// POST /claims/execute - Issue a signed claim voucher
///
/// Identity first (when configured), then a fresh eligibility snapshot,
/// then issuance. The snapshot is advisory in the response; redemption
/// is where ineligibility actually bites. Nothing is counted here.
pub async fn execute_claim_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<ExecuteClaimReq>,
) -> (StatusCode, Json<Value>) {
    match execute_claim(&state, &headers, payload).await {
        Ok(resp) => (StatusCode::OK, Json(resp)),
        Err(e) => error_json(&e),
    }
}

async fn execute_claim(
    state: &AppState,
    headers: &HeaderMap,
    payload: ExecuteClaimReq,
) -> Result<Value> {
    let claimer = parse_address(&payload.claimer)?;
    if payload.fid == 0 {
        return Err(AppError::validation("Missing or zero fid"));
    }
    let fid = U256::from(payload.fid);

    if let Some(identity) = &state.identity {
        let token = bearer_token(headers)
            .ok_or_else(|| AppError::validation("Missing bearer token"))?;
        let verified_fid = identity.verify_bearer(&token).await?;
        if verified_fid != payload.fid {
            warn!(
                requested = payload.fid,
                verified = verified_fid,
                "fid does not match session"
            );
            return Err(AppError::validation("fid does not match session"));
        }
    }

    let chain = resolve_chain(state, payload.chain_id, true)?;
    // Issuance is deliberately decoupled from the eligibility verdict:
    // the ledger re-checks every gate at redemption and reverts there.
    // The fresh snapshot rides along so the client can warn up front.
    let status = chain
        .ledger
        .claim_status(chain.contract, claimer, fid)
        .await?;
    let gate = ClaimGate::derive(Some(&status), true, false, false);

    let signer = state
        .signer
        .as_ref()
        .ok_or_else(|| AppError::Config("voucher signing is not configured".into()))?;
    let voucher = signer
        .issue(
            chain.ledger.as_ref(),
            chain.contract,
            claimer,
            fid,
            payload.deadline,
        )
        .await?;
    info!(claimer = %claimer, chain = chain.cfg.chain_id, "voucher issued");
    Ok(json!({
        "claimer": format!("{:#x}", voucher.claimer),
        "fid": voucher.fid.to::<u64>(),
        "nonce": voucher.nonce.to_string(),
        "deadline": voucher.deadline.to_string(),
        "signature": voucher.signature,
        "chain_id": chain.cfg.chain_id,
        "reward": status.reward.to_string(),
        "eligible": status.ok,
        "gate": gate,
    }))
}

// ════════════════════════════════════════════════════════════════════════════
// CONFIRM
// ════════════════════════════════════════════════════════════════════════════

/// POST /claims/confirm - Verify a redeemed claim and count it
///
/// Pinned to the default chain. The dedup marker makes the outcome for a
/// given hash terminal; replays report the original verdict.
pub async fn confirm_claim_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<ConfirmClaimReq>,
) -> (StatusCode, Json<Value>) {
    match confirm_claim(&state, &headers, payload).await {
        Ok(resp) => (StatusCode::OK, Json(resp)),
        Err(e) => error_json(&e),
    }
}

async fn confirm_claim(
    state: &AppState,
    headers: &HeaderMap,
    payload: ConfirmClaimReq,
) -> Result<Value> {
    let claimer = parse_address(&payload.claimer)?;
    let tx_hash = parse_tx_hash(&payload.tx_hash)?;

    let window = state.config.rate_limit_window_secs;
    let ip = client_ip(headers);
    let ip_status = state
        .rate_limiter
        .check(&format!("ip:{}", ip), state.config.confirm_ip_max, window)
        .await?;
    if !ip_status.allowed {
        return Err(AppError::RateLimited {
            retry_after_secs: window,
        });
    }
    let claimer_status = state
        .rate_limiter
        .check(
            &format!("claimer:{:#x}", claimer),
            state.config.confirm_claimer_max,
            window,
        )
        .await?;
    if !claimer_status.allowed {
        return Err(AppError::RateLimited {
            retry_after_secs: window,
        });
    }

    let chain = resolve_chain(state, None, true)?;
    let verified = verify_claim_tx(
        chain.ledger.as_ref(),
        chain.cfg.verify_strategy,
        chain.contract,
        claimer,
        tx_hash,
    )
    .await?;

    // Key the dedup marker on the parsed hash, not the raw client string:
    // the same transaction must map to one marker regardless of hex casing.
    let outcome = state
        .counter
        .process_once(&format!("{:#x}", tx_hash), state.config.daily_claim_limit)
        .await?;
    let message = match &outcome {
        ProcessOutcome::NewlyCounted { count } => {
            info!(tx = %tx_hash, count, "claim confirmed and counted");
            "Claim confirmed and counted"
        }
        ProcessOutcome::AlreadyProcessed { count } => {
            info!(tx = %tx_hash, count, "claim replayed, already counted");
            "Transaction already processed"
        }
        ProcessOutcome::LimitExceeded { count } => {
            warn!(tx = %tx_hash, count, "claim verified but over the daily limit");
            "Daily claim limit exceeded"
        }
    };
    Ok(json!({
        "success": true,
        "count": outcome.count(),
        "allowed": outcome.allowed(),
        "message": message,
        "already_processed": matches!(outcome, ProcessOutcome::AlreadyProcessed { .. }),
        "amount": verified.amount.map(|a| a.to_string()),
    }))
}

// ════════════════════════════════════════════════════════════════════════════
// ELIGIBILITY & STATS
// ════════════════════════════════════════════════════════════════════════════

/// GET /claims/eligibility - On-chain eligibility snapshot
pub async fn eligibility_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EligibilityQuery>,
) -> (StatusCode, Json<Value>) {
    match eligibility(&state, query).await {
        Ok(resp) => (StatusCode::OK, Json(resp)),
        Err(e) => error_json(&e),
    }
}

async fn eligibility(state: &AppState, query: EligibilityQuery) -> Result<Value> {
    let claimer = parse_address(&query.claimer)?;
    let chain = resolve_chain(state, query.chain_id, true)?;
    let status = chain
        .ledger
        .claim_status(chain.contract, claimer, U256::from(query.fid))
        .await?;
    let gate = ClaimGate::derive(Some(&status), true, false, false);
    Ok(json!({
        "chain_id": chain.cfg.chain_id,
        "gate": gate,
        "status": status,
    }))
}

/// GET /claims/stats - Today's counted claims vs the configured limit
///
/// Briefly cacheable; the count only needs to be fresh to ~10s for
/// display purposes.
pub async fn stats_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.counter.count_today().await {
        Ok(count) => (
            StatusCode::OK,
            [(header::CACHE_CONTROL, "public, max-age=10")],
            Json(json!({
                "count": count,
                "daily_limit": state.config.daily_claim_limit,
                "limit_reached": count >= state.config.daily_claim_limit,
            })),
        )
            .into_response(),
        Err(e) => error_json(&e).into_response(),
    }
}

// ════════════════════════════════════════════════════════════════════════════
// ADMIN
// ════════════════════════════════════════════════════════════════════════════

/// GET /admin/chains/visibility - Current visibility per configured chain
pub async fn get_visibility_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let chains: Vec<Value> = state
        .config
        .chains
        .iter()
        .map(|c| {
            json!({
                "chain_id": c.chain_id,
                "visible": state.chain_visible(c.chain_id),
            })
        })
        .collect();
    Json(json!({"chains": chains}))
}

/// POST /admin/chains/visibility - Toggle a chain, owner-gated
///
/// The caller must be the rewards contract owner on the default chain,
/// read live for every request so an ownership transfer takes effect
/// immediately.
pub async fn set_visibility_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<VisibilityReq>,
) -> (StatusCode, Json<Value>) {
    match set_visibility(&state, payload).await {
        Ok(resp) => (StatusCode::OK, Json(resp)),
        Err(e) => error_json(&e),
    }
}

async fn set_visibility(state: &AppState, payload: VisibilityReq) -> Result<Value> {
    let caller = parse_address(&payload.caller)?;
    if state.config.chain(payload.chain_id).is_none() {
        return Err(AppError::validation(format!(
            "Unsupported chain {}",
            payload.chain_id
        )));
    }

    let default = resolve_chain(state, None, false)?;
    let owner = default.ledger.owner(default.contract).await?;
    if owner != caller {
        warn!(caller = %caller, %owner, "visibility change rejected");
        return Err(AppError::validation("Caller is not the contract owner"));
    }

    state.set_chain_visible(payload.chain_id, payload.visible);
    info!(
        chain = payload.chain_id,
        visible = payload.visible,
        "chain visibility updated"
    );
    Ok(json!({
        "ok": true,
        "chain_id": payload.chain_id,
        "visible": payload.visible,
    }))
}
