//! End-to-end claim flow against a scripted ledger and an in-memory KV.
//!
//! Exercises the handlers directly: issuance, confirmation with dedup
//! and the daily ceiling, rate limiting, stats and the admin toggle.

use std::collections::HashMap;
use std::sync::Arc;

use alloy::primitives::{Address, B256, U256};
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde_json::Value;

use onepulse_chain::rpc::{event_topic, SIG_CLAIMED_EVENT};
use onepulse_chain::{
    ClaimStatus, ClaimVoucherSigner, Ledger, MockLedger, SigningScheme, TxLog, TxReceipt,
};
use onepulse_common::{AppConfig, MemoryKv};
use onepulse_server::handlers::{
    confirm_claim_handler, eligibility_handler, execute_claim_handler, get_visibility_handler,
    set_visibility_handler, stats_handler, ConfirmClaimReq, EligibilityQuery, ExecuteClaimReq,
    VisibilityReq,
};
use onepulse_server::AppState;

const TEST_KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

const CONTRACT: Address = Address::repeat_byte(0xcc);
const CLAIMER: Address = Address::repeat_byte(0x11);
const OWNER: Address = Address::repeat_byte(0xaa);

fn eligible_status() -> ClaimStatus {
    ClaimStatus {
        ok: true,
        fid_is_blacklisted: false,
        fid_claimed_today: false,
        global_limit_reached: false,
        has_sent_gm_today: true,
        reward: U256::from(1_000u64),
        vault_balance: U256::from(1_000_000u64),
        min_reserve: U256::from(1_000u64),
        global_claims_today: U256::ZERO,
        global_claim_limit: U256::from(500u64),
    }
}

fn claimed_receipt(recipient: Address) -> TxReceipt {
    let mut topic = [0u8; 32];
    topic[12..].copy_from_slice(recipient.as_slice());
    TxReceipt {
        status: true,
        logs: vec![TxLog {
            address: CONTRACT,
            topics: vec![
                event_topic(SIG_CLAIMED_EVENT),
                B256::from(topic),
                B256::with_last_byte(0x07),
            ],
            data: U256::from(1_000u64).to_be_bytes::<32>().to_vec(),
        }],
    }
}

fn test_config(daily_limit: i64, claimer_max: i64) -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.daily_claim_limit = daily_limit;
    cfg.confirm_claimer_max = claimer_max;
    cfg.confirm_ip_max = 1_000;
    cfg.chains[0].rewards_contract = Some(format!("{:#x}", CONTRACT));
    cfg
}

fn build_state(cfg: AppConfig, ledger: Arc<MockLedger>) -> Arc<AppState> {
    let mut ledgers: HashMap<u64, Arc<dyn Ledger>> = HashMap::new();
    ledgers.insert(8453, ledger);
    let signer =
        ClaimVoucherSigner::from_hex_key(TEST_KEY, SigningScheme::Eip191Packed).unwrap();
    Arc::new(AppState::new(
        cfg,
        Arc::new(MemoryKv::new()),
        ledgers,
        Some(signer),
        None,
    ))
}

fn scripted_ledger() -> Arc<MockLedger> {
    let ledger = Arc::new(MockLedger::new());
    ledger.set_nonce(CLAIMER, U256::from(5u64));
    ledger.set_claim_status(CLAIMER, eligible_status());
    ledger.set_owner(OWNER);
    ledger
}

async fn stats_body(resp: axum::response::Response) -> Value {
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()[axum::http::header::CACHE_CONTROL],
        "public, max-age=10"
    );
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn confirm(
    state: &Arc<AppState>,
    tx_hash: &str,
    ip: &str,
) -> (StatusCode, Value) {
    let mut headers = HeaderMap::new();
    headers.insert("x-forwarded-for", ip.parse().unwrap());
    let (status, Json(body)) = confirm_claim_handler(
        State(state.clone()),
        headers,
        Json(ConfirmClaimReq {
            tx_hash: tx_hash.to_string(),
            claimer: format!("{:#x}", CLAIMER),
        }),
    )
    .await;
    (status, body)
}

// ── 1. EXECUTE ISSUES A VOUCHER FOR AN ELIGIBLE CLAIMER ─────────────────

#[tokio::test]
async fn test_execute_issues_voucher() {
    let state = build_state(test_config(500, 5), scripted_ledger());
    let (status, Json(body)) = execute_claim_handler(
        State(state),
        HeaderMap::new(),
        Json(ExecuteClaimReq {
            claimer: format!("{:#x}", CLAIMER),
            fid: 777,
            deadline: None,
            chain_id: None,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["nonce"], "5");
    assert_eq!(body["fid"], 777);
    assert_eq!(body["chain_id"], 8453);
    let sig = body["signature"].as_str().unwrap();
    assert!(sig.starts_with("0x"));
    assert_eq!(sig.len(), 2 + 65 * 2);
}

// ── 2. EXECUTE STAYS DECOUPLED FROM THE ELIGIBILITY VERDICT ─────────────

#[tokio::test]
async fn test_execute_issues_despite_claimed_today() {
    // The ledger re-checks every gate at redemption; issuance still
    // succeeds and the response flags the snapshot verdict.
    let ledger = scripted_ledger();
    let mut s = eligible_status();
    s.ok = false;
    s.fid_claimed_today = true;
    ledger.set_claim_status(CLAIMER, s);

    let state = build_state(test_config(500, 5), ledger);
    let (status, Json(body)) = execute_claim_handler(
        State(state),
        HeaderMap::new(),
        Json(ExecuteClaimReq {
            claimer: format!("{:#x}", CLAIMER),
            fid: 777,
            deadline: None,
            chain_id: None,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["eligible"], false);
    assert_eq!(body["gate"], "already_claimed");
    assert!(body["signature"].as_str().unwrap().starts_with("0x"));
}

// ── 3. EXECUTE FAILS CLOSED WITHOUT A CONTRACT ──────────────────────────

#[tokio::test]
async fn test_execute_fails_closed_without_contract() {
    let mut cfg = test_config(500, 5);
    cfg.chains[0].rewards_contract = None;
    let state = build_state(cfg, scripted_ledger());
    let (status, _) = execute_claim_handler(
        State(state),
        HeaderMap::new(),
        Json(ExecuteClaimReq {
            claimer: format!("{:#x}", CLAIMER),
            fid: 777,
            deadline: None,
            chain_id: None,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

// ── 4. CONFIRM COUNTS ONCE, REPLAYS ARE TERMINAL ────────────────────────

#[tokio::test]
async fn test_confirm_counts_once() {
    let ledger = scripted_ledger();
    let tx = B256::repeat_byte(0xab);
    ledger.set_receipt(tx, claimed_receipt(CLAIMER));

    let state = build_state(test_config(500, 5), ledger);
    let hash = format!("{:#x}", tx);

    let (status, body) = confirm(&state, &hash, "10.0.0.1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["allowed"], true);
    assert_eq!(body["count"], 1);
    assert_eq!(body["already_processed"], false);

    // Replay: verified again, never re-counted.
    let (status, body) = confirm(&state, &hash, "10.0.0.1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["already_processed"], true);
    assert_eq!(body["message"], "Transaction already processed");
    assert_eq!(body["count"], 1);
}

// ── 5. CONFIRM REJECTS A RECIPIENT MISMATCH ─────────────────────────────

#[tokio::test]
async fn test_confirm_rejects_recipient_mismatch() {
    let ledger = scripted_ledger();
    let tx = B256::repeat_byte(0xab);
    ledger.set_receipt(tx, claimed_receipt(Address::repeat_byte(0x99)));

    let state = build_state(test_config(500, 5), ledger);
    let (status, body) = confirm(&state, &format!("{:#x}", tx), "10.0.0.1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("does not match"));
}

// ── 6. CONFIRM ENFORCES THE DAILY CEILING ───────────────────────────────

#[tokio::test]
async fn test_confirm_daily_ceiling() {
    let ledger = scripted_ledger();
    let tx1 = B256::repeat_byte(0x01);
    let tx2 = B256::repeat_byte(0x02);
    ledger.set_receipt(tx1, claimed_receipt(CLAIMER));
    ledger.set_receipt(tx2, claimed_receipt(CLAIMER));

    let state = build_state(test_config(1, 5), ledger);

    let (_, body) = confirm(&state, &format!("{:#x}", tx1), "10.0.0.1").await;
    assert_eq!(body["allowed"], true);

    let (status, body) = confirm(&state, &format!("{:#x}", tx2), "10.0.0.1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["allowed"], false);
    assert_eq!(body["message"], "Daily claim limit exceeded");
    assert_eq!(body["count"], 2);
}

// ── 7. CONFIRM RATE LIMITS BY CLAIMER ───────────────────────────────────

#[tokio::test]
async fn test_confirm_rate_limited_by_claimer() {
    let ledger = scripted_ledger();
    for b in 1..=3u8 {
        ledger.set_receipt(B256::repeat_byte(b), claimed_receipt(CLAIMER));
    }

    let state = build_state(test_config(500, 2), ledger);
    for b in 1..=2u8 {
        let (status, _) =
            confirm(&state, &format!("{:#x}", B256::repeat_byte(b)), "10.0.0.1").await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, body) =
        confirm(&state, &format!("{:#x}", B256::repeat_byte(3)), "10.0.0.1").await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["retry_after_secs"], 60);
}

// ── 8. STATS REFLECT THE COUNTER ────────────────────────────────────────

#[tokio::test]
async fn test_stats_reflect_counter() {
    let ledger = scripted_ledger();
    let tx = B256::repeat_byte(0xab);
    ledger.set_receipt(tx, claimed_receipt(CLAIMER));

    let state = build_state(test_config(500, 5), ledger);
    let body = stats_body(stats_handler(State(state.clone())).await).await;
    assert_eq!(body["count"], 0);

    confirm(&state, &format!("{:#x}", tx), "10.0.0.1").await;
    let body = stats_body(stats_handler(State(state)).await).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["limit_reached"], false);
}

// ── 9. ELIGIBILITY SNAPSHOT ─────────────────────────────────────────────

#[tokio::test]
async fn test_eligibility_snapshot() {
    let state = build_state(test_config(500, 5), scripted_ledger());
    let (status, Json(body)) = eligibility_handler(
        State(state),
        Query(EligibilityQuery {
            claimer: format!("{:#x}", CLAIMER),
            fid: 777,
            chain_id: None,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["gate"], "claimable");
    assert_eq!(body["status"]["ok"], true);
}

// ── 10. ADMIN VISIBILITY IS OWNER-GATED ─────────────────────────────────

#[tokio::test]
async fn test_visibility_owner_gated() {
    let state = build_state(test_config(500, 5), scripted_ledger());

    // Not the owner: rejected, chain stays visible.
    let (status, _) = set_visibility_handler(
        State(state.clone()),
        Json(VisibilityReq {
            caller: format!("{:#x}", CLAIMER),
            chain_id: 8453,
            visible: false,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let Json(body) = get_visibility_handler(State(state.clone())).await;
    assert_eq!(body["chains"][0]["visible"], true);

    // Owner hides the chain; issuance on it now refuses.
    let (status, _) = set_visibility_handler(
        State(state.clone()),
        Json(VisibilityReq {
            caller: format!("{:#x}", OWNER),
            chain_id: 8453,
            visible: false,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = {
        let (status, Json(body)) = execute_claim_handler(
            State(state),
            HeaderMap::new(),
            Json(ExecuteClaimReq {
                claimer: format!("{:#x}", CLAIMER),
                fid: 777,
                deadline: None,
                chain_id: None,
            }),
        )
        .await;
        (status, body)
    };
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("disabled"));
}

// ── 11. CONFIRM DEDUPES ACROSS HEX CASING ───────────────────────────────

#[tokio::test]
async fn test_confirm_dedupes_across_hex_casing() {
    // One transaction reported twice with different hex casing must hit
    // the same dedup marker and stay counted once.
    let ledger = scripted_ledger();
    let tx = B256::repeat_byte(0xab);
    ledger.set_receipt(tx, claimed_receipt(CLAIMER));

    let state = build_state(test_config(500, 5), ledger);
    let lower = format!("{:#x}", tx);
    let upper = format!("0x{}", lower.trim_start_matches("0x").to_uppercase());

    let (status, body) = confirm(&state, &lower, "10.0.0.1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);

    let (status, body) = confirm(&state, &upper, "10.0.0.1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["already_processed"], true);
    assert_eq!(body["count"], 1);
    assert_eq!(body["message"], "Transaction already processed");
}

// ── 12. EXECUTE REJECTS A ZERO FID ──────────────────────────────────────

#[tokio::test]
async fn test_execute_rejects_zero_fid() {
    let state = build_state(test_config(500, 5), scripted_ledger());
    let (status, Json(body)) = execute_claim_handler(
        State(state),
        HeaderMap::new(),
        Json(ExecuteClaimReq {
            claimer: format!("{:#x}", CLAIMER),
            fid: 0,
            deadline: None,
            chain_id: None,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("fid"));
    assert!(body.get("signature").is_none());
}

// ── 13. REQUEST BODIES ACCEPT CAMELCASE FIELD NAMES ─────────────────────

#[test]
fn test_request_bodies_accept_camelcase() {
    let confirm: ConfirmClaimReq = serde_json::from_value(serde_json::json!({
        "transactionHash": format!("{:#x}", B256::repeat_byte(0xab)),
        "claimer": format!("{:#x}", CLAIMER),
    }))
    .unwrap();
    assert_eq!(confirm.tx_hash, format!("{:#x}", B256::repeat_byte(0xab)));

    let execute: ExecuteClaimReq = serde_json::from_value(serde_json::json!({
        "claimer": format!("{:#x}", CLAIMER),
        "fid": 777,
        "chainId": 8453,
    }))
    .unwrap();
    assert_eq!(execute.chain_id, Some(8453));
    assert!(execute.deadline.is_none());
}
