//! ChetuPamoja donation engine — entry point.
//!
//! Keeps the linked ETH/USD amount fields, the cached ETH price, and the
//! on-chain campaign totals consistent with each other, and exposes them
//! through a small Axum REST API for the donation front end.  Two background
//! tasks (price refresher, campaign poller) keep the state current.

mod amounts;
mod api;
mod campaign;
mod config;
mod db;
mod donate;
mod errors;
mod impact;
mod price;
mod progress;
mod rpc;
mod state;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use chrono::Utc;
use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::Config;
use state::EngineState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Load optional .env file (ignored if missing).
    let _ = dotenvy::dotenv();

    // Load config from environment.
    let config = Config::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;

    // Set up the SQLite connection pool and run migrations.
    let pool = db::init_pool(&config.database_url).await?;

    // HTTP client shared between the price oracle and the contract gateway.
    let client = Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()?;

    let state = Arc::new(EngineState::new(config, pool, client));

    // Reuse the previous session's quote while it is still fresh, then make
    // sure some rate exists before the amount fields are seeded.
    match db::load_quote(&state.pool).await {
        Ok(Some(quote)) => {
            if state.price.write().await.seed_if_fresh(quote, Utc::now()) {
                info!("price cache seeded from previous session");
            }
        }
        Ok(None) => {}
        Err(e) => warn!("ignoring unreadable persisted quote: {e}"),
    }
    price::refresh_once(&state).await;

    {
        let rate = state.price.read().await.rate();
        if state
            .amounts
            .lock()
            .await
            .set_default(state.config.reference_usd, rate)
        {
            info!(
                "amount fields seeded from the ${} reference donation",
                state.config.reference_usd
            );
        }
    }

    // ─── Background tasks ─────────────────────────────────
    let shutdown = CancellationToken::new();
    tokio::spawn(price::run(state.clone(), shutdown.clone()));
    tokio::spawn(campaign::run(state.clone(), shutdown.clone()));

    // ─── REST API ─────────────────────────────────────────
    let app = Router::new()
        .route("/health", get(api::health))
        .route("/price", get(api::get_price))
        .route("/campaign", get(api::get_campaign))
        .route("/campaign/project", post(api::set_project))
        .route("/amounts", get(api::get_amounts))
        .route("/amounts/eth", post(api::set_eth_amount))
        .route("/amounts/usd", post(api::set_usd_amount))
        .route("/amounts/reset", post(api::reset_amounts))
        .route("/impact", post(api::compute_impact))
        .route("/donate", post(api::donate))
        .route("/donations", get(api::list_donations))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    let addr = format!("0.0.0.0:{}", state.config.api_port);
    info!("API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            shutdown.cancel();
        })
        .await?;

    Ok(())
}
