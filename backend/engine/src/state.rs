//! Shared application state.

use std::sync::atomic::AtomicBool;

use reqwest::Client;
use sqlx::SqlitePool;
use tokio::sync::{Mutex, RwLock};

use crate::amounts::AmountPair;
use crate::campaign::CampaignTracker;
use crate::config::Config;
use crate::price::{CoinGeckoOracle, PriceCache};
use crate::rpc::JsonRpcGateway;

/// Everything the API handlers and background tasks share.  Each sub-state
/// has its own lock so user edits, price ticks, and campaign polls interleave
/// freely.
pub struct EngineState {
    pub config: Config,
    pub pool: SqlitePool,
    pub oracle: CoinGeckoOracle,
    pub gateway: JsonRpcGateway,
    pub price: RwLock<PriceCache>,
    pub amounts: Mutex<AmountPair>,
    pub tracker: RwLock<CampaignTracker>,
    pub donation_in_flight: AtomicBool,
}

impl EngineState {
    pub fn new(config: Config, pool: SqlitePool, client: Client) -> Self {
        let oracle = CoinGeckoOracle::new(client.clone(), config.price_api_url.clone());
        let gateway = JsonRpcGateway::new(client, &config);
        Self {
            price: RwLock::new(PriceCache::new(config.price_max_age_secs)),
            amounts: Mutex::new(AmountPair::default()),
            tracker: RwLock::new(CampaignTracker::new(config.project_id)),
            donation_in_flight: AtomicBool::new(false),
            oracle,
            gateway,
            config,
            pool,
        }
    }
}
