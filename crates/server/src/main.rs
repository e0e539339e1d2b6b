//! Binary entrypoint: load config, wire the KV, ledgers and signer,
//! then serve.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use onepulse_chain::{ClaimVoucherSigner, Ledger, RpcLedger, SigningScheme};
use onepulse_common::{AppConfig, AtomicKv, MemoryKv, RestKv};
use onepulse_server::{handlers, AppState, IdentityVerifier};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = match std::env::var("CONFIG_PATH") {
        Ok(path) => AppConfig::load_from_file(&path)?,
        Err(_) => {
            let mut cfg = AppConfig::default();
            cfg.apply_env();
            cfg.validate()?;
            warn!("CONFIG_PATH not set, using default configuration");
            cfg
        }
    };

    let kv: Arc<dyn AtomicKv> = match (&config.kv_rest_url, AppConfig::kv_rest_token()) {
        (Some(url), Some(token)) => {
            info!("using REST KV backend");
            Arc::new(RestKv::new(url.clone(), token)?)
        }
        _ => {
            warn!("no KV endpoint configured, using in-memory KV (single instance only)");
            Arc::new(MemoryKv::new())
        }
    };

    let rpc_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;
    let mut ledgers: HashMap<u64, Arc<dyn Ledger>> = HashMap::new();
    for chain in &config.chains {
        ledgers.insert(
            chain.chain_id,
            Arc::new(RpcLedger::new(rpc_client.clone(), chain.rpc_url.clone())),
        );
        info!(chain = chain.chain_id, rpc = %chain.rpc_url, "chain configured");
    }

    let signer = match AppConfig::signing_key() {
        Some(key) => {
            let signer = ClaimVoucherSigner::from_hex_key(&key, SigningScheme::Eip191Packed)?;
            info!(signer = %signer.address(), "voucher issuance enabled");
            Some(signer)
        }
        None => {
            warn!("no signing key configured, voucher issuance disabled");
            None
        }
    };

    let identity = match &config.auth_verify_url {
        Some(url) => Some(IdentityVerifier::new(url.clone())?),
        None => {
            warn!("no identity endpoint configured, execute runs unauthenticated");
            None
        }
    };

    let bind_addr = config
        .bind_addr
        .clone()
        .unwrap_or_else(|| "127.0.0.1:8080".to_string());
    let state = Arc::new(AppState::new(config, kv, ledgers, signer, identity));
    let app = handlers::router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
