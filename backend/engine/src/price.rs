//! ETH/USD price feed — cache, refresh policy, and the background refresher.
//!
//! ## Resilience
//!
//! * A fetch failure never propagates: the last good quote is kept, and when
//!   no quote has ever been obtained a fixed fallback rate stands in.
//! * Failed fetches are not retried in a tight loop; the next scheduled tick
//!   (or the next stale `get_rate`) retries.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::db;
use crate::errors::{EngineError, Result};
use crate::state::EngineState;

/// Rate used when the price source has never answered: 2500 USD/ETH.
pub const FALLBACK_USD_PER_ETH: Decimal = Decimal::from_parts(2500, 0, 0, false, 0);

/// A point-in-time exchange rate.  Replaced wholesale on refresh, never
/// partially mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceQuote {
    pub usd_per_eth: Decimal,
    pub fetched_at: DateTime<Utc>,
}

impl PriceQuote {
    pub fn is_fresh(&self, now: DateTime<Utc>, max_age_secs: u64) -> bool {
        (now - self.fetched_at).num_seconds() < max_age_secs as i64
    }
}

// ─────────────────────────────────────────────────────────
// Oracle
// ─────────────────────────────────────────────────────────

/// External source of the current USD/ETH rate.
#[allow(async_fn_in_trait)]
pub trait PriceOracle {
    async fn fetch_usd_per_eth(&self) -> Result<Decimal>;
}

/// Fetches the spot price from a CoinGecko-style simple-price endpoint.
pub struct CoinGeckoOracle {
    client: Client,
    url: String,
}

impl CoinGeckoOracle {
    pub fn new(client: Client, url: String) -> Self {
        Self { client, url }
    }
}

impl PriceOracle for CoinGeckoOracle {
    async fn fetch_usd_per_eth(&self) -> Result<Decimal> {
        let body: serde_json::Value = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        parse_rate(&body)
    }
}

/// Pull the rate out of a `{"ethereum":{"usd":N}}` response body.
fn parse_rate(body: &serde_json::Value) -> Result<Decimal> {
    let usd = body
        .get("ethereum")
        .and_then(|e| e.get("usd"))
        .ok_or_else(|| EngineError::Parse("missing ethereum.usd in price response".to_string()))?;

    let rate: Decimal = usd
        .to_string()
        .parse()
        .map_err(|_| EngineError::Parse(format!("unparseable rate: {usd}")))?;

    if rate <= Decimal::ZERO {
        return Err(EngineError::Parse(format!("non-positive rate: {rate}")));
    }
    Ok(rate)
}

// ─────────────────────────────────────────────────────────
// Cache
// ─────────────────────────────────────────────────────────

/// Owns the current quote and the freshness policy.
#[derive(Debug)]
pub struct PriceCache {
    quote: Option<PriceQuote>,
    max_age_secs: u64,
}

impl PriceCache {
    pub fn new(max_age_secs: u64) -> Self {
        Self {
            quote: None,
            max_age_secs,
        }
    }

    /// Install a quote recovered from a previous session, but only while it
    /// is still inside the freshness window.
    pub fn seed_if_fresh(&mut self, quote: PriceQuote, now: DateTime<Utc>) -> bool {
        if quote.is_fresh(now, self.max_age_secs) {
            self.quote = Some(quote);
            true
        } else {
            false
        }
    }

    pub fn current(&self) -> Option<&PriceQuote> {
        self.quote.as_ref()
    }

    /// The current rate, stale or not.  `None` only before the first refresh.
    pub fn rate(&self) -> Option<Decimal> {
        self.quote.as_ref().map(|q| q.usd_per_eth)
    }

    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.fresh_quote(now).is_none()
    }

    fn fresh_quote(&self, now: DateTime<Utc>) -> Option<PriceQuote> {
        self.quote
            .as_ref()
            .filter(|q| q.is_fresh(now, self.max_age_secs))
            .cloned()
    }

    /// Fold a fetch outcome into the cache.  Returns the quote callers should
    /// use plus whether it came fresh from the oracle (and is worth
    /// persisting).  Failures keep the previous quote; with no previous quote
    /// the fallback rate is installed so there is always a usable number.
    pub fn absorb(&mut self, outcome: Result<Decimal>, now: DateTime<Utc>) -> (PriceQuote, bool) {
        match outcome {
            Ok(rate) if rate > Decimal::ZERO => {
                let quote = PriceQuote {
                    usd_per_eth: rate,
                    fetched_at: now,
                };
                self.quote = Some(quote.clone());
                (quote, true)
            }
            Ok(rate) => {
                warn!("price source returned non-positive rate {rate}, ignoring");
                (self.previous_or_fallback(now), false)
            }
            Err(e) => {
                warn!("price fetch failed, keeping previous rate: {e}");
                (self.previous_or_fallback(now), false)
            }
        }
    }

    fn previous_or_fallback(&mut self, now: DateTime<Utc>) -> PriceQuote {
        match &self.quote {
            Some(q) => q.clone(),
            None => {
                let quote = PriceQuote {
                    usd_per_eth: FALLBACK_USD_PER_ETH,
                    fetched_at: now,
                };
                self.quote = Some(quote.clone());
                quote
            }
        }
    }
}

/// Return the cached quote while fresh, otherwise refresh.
///
/// The boolean is `true` when the quote came fresh from the oracle.
pub async fn get_rate<O: PriceOracle>(
    cache: &RwLock<PriceCache>,
    oracle: &O,
    now: DateTime<Utc>,
) -> (PriceQuote, bool) {
    if let Some(quote) = cache.read().await.fresh_quote(now) {
        return (quote, false);
    }
    refresh(cache, oracle, now).await
}

/// Fetch from the oracle and fold the outcome into the cache.  The lock is
/// not held across the fetch.
pub async fn refresh<O: PriceOracle>(
    cache: &RwLock<PriceCache>,
    oracle: &O,
    now: DateTime<Utc>,
) -> (PriceQuote, bool) {
    let outcome = oracle.fetch_usd_per_eth().await;
    cache.write().await.absorb(outcome, now)
}

// ─────────────────────────────────────────────────────────
// Background refresher
// ─────────────────────────────────────────────────────────

/// Spawned from `main`; refreshes the quote on a fixed tick until shutdown.
pub async fn run(state: Arc<EngineState>, shutdown: CancellationToken) {
    info!(
        "price refresher starting — every {}s from {}",
        state.config.price_refresh_secs, state.config.price_api_url
    );

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("price refresher stopping");
                return;
            }
            _ = tokio::time::sleep(Duration::from_secs(state.config.price_refresh_secs)) => {}
        }
        refresh_once(&state).await;
    }
}

/// One refresh tick: update the quote, persist it when newly fetched, and
/// recompute the derived amount field.  Never touches the field the user
/// last edited.
pub async fn refresh_once(state: &EngineState) {
    let now = Utc::now();
    let (quote, fetched) = get_rate(&state.price, &state.oracle, now).await;

    if fetched {
        if let Err(e) = db::save_quote(&state.pool, &quote).await {
            warn!("failed to persist price quote: {e}");
        }
    }

    state.amounts.lock().await.reprice(Some(quote.usd_per_eth));
    debug!("price tick: {} USD/ETH (fetched={fetched})", quote.usd_per_eth);
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
