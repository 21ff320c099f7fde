//! Axum REST API handlers.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::amounts::{self, EditedField};
use crate::campaign;
use crate::db::{self, DonationRecord};
use crate::donate;
use crate::errors::EngineError;
use crate::impact::{self, Days, ImpactBreakdown, MealsPerDay};
use crate::progress::{self, CampaignProgress};
use crate::state::EngineState;

// ─────────────────────────────────────────────────────────
// Request / response shapes
// ─────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct PriceResponse {
    pub usd_per_eth: Decimal,
    pub fetched_at: i64,
    pub stale: bool,
}

#[derive(Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ProgressView {
    Loading,
    Known {
        raised_eth: Decimal,
        raised_usd: Decimal,
        raised_usd_formatted: String,
        percent_complete: Decimal,
        deposit_count: Option<u64>,
    },
}

#[derive(Serialize)]
pub struct CampaignResponse {
    pub title: String,
    pub project_id: u64,
    pub project_name: Option<String>,
    pub goal_usd: Decimal,
    pub goal_usd_formatted: String,
    pub progress: ProgressView,
    pub donor_contribution_eth: Option<Decimal>,
}

#[derive(Deserialize)]
pub struct AmountRequest {
    pub value: String,
}

#[derive(Serialize)]
pub struct AmountsResponse {
    pub eth: String,
    pub usd: String,
    pub last_edited: EditedField,
}

#[derive(Deserialize)]
pub struct ProjectRequest {
    pub project_id: u64,
}

#[derive(Serialize)]
pub struct ProjectResponse {
    pub project_id: u64,
}

#[derive(Deserialize)]
pub struct ImpactRequest {
    pub usd: String,
    pub meals_per_day: u8,
    pub days: u8,
}

#[derive(Serialize)]
pub struct ImpactResponse {
    pub students_fed: u64,
    pub breakdown: ImpactBreakdown,
}

#[derive(Serialize)]
pub struct DonateResponse {
    pub tx_hash: String,
    pub block_number: Option<u64>,
    pub amount_eth: String,
    pub amount_usd: Option<String>,
}

#[derive(Serialize)]
pub struct DonationsResponse {
    pub count: usize,
    pub donations: Vec<DonationRecord>,
}

fn error_response(err: &EngineError) -> Response {
    let status = match err {
        EngineError::InvalidAmount(_) | EngineError::Precondition(_) => StatusCode::BAD_REQUEST,
        EngineError::SubmissionInFlight => StatusCode::CONFLICT,
        EngineError::Wallet(_) | EngineError::Rpc(_) | EngineError::Http(_) => {
            StatusCode::BAD_GATEWAY
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}

// ─────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `GET /price`
///
/// The cached quote; `stale` flags a quote past the freshness window.
pub async fn get_price(State(state): State<Arc<EngineState>>) -> impl IntoResponse {
    let now = Utc::now();
    let cache = state.price.read().await;
    match cache.current() {
        Some(quote) => Json(PriceResponse {
            usd_per_eth: quote.usd_per_eth,
            fetched_at: quote.fetched_at.timestamp(),
            stale: cache.is_stale(now),
        })
        .into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse {
                error: "price not yet available".to_string(),
            }),
        )
            .into_response(),
    }
}

/// `GET /campaign`
///
/// Campaign metadata plus the progress snapshot; progress reads as
/// `loading` until both the on-chain total and a price quote exist.
pub async fn get_campaign(State(state): State<Arc<EngineState>>) -> impl IntoResponse {
    let rate = state.price.read().await.rate();
    let (snapshot, project_id) = {
        let tracker = state.tracker.read().await;
        (tracker.snapshot().clone(), tracker.project_id())
    };

    let progress = progress::compute_progress(
        snapshot.total_deposited_eth,
        rate,
        state.config.goal_usd,
        snapshot.deposit_count,
    );
    let view = match progress {
        CampaignProgress::Unknown => ProgressView::Loading,
        CampaignProgress::Known {
            total_eth,
            total_usd,
            percent_complete,
            deposit_count,
        } => ProgressView::Known {
            raised_eth: total_eth,
            raised_usd: total_usd,
            raised_usd_formatted: progress::format_usd(total_usd),
            percent_complete,
            deposit_count,
        },
    };

    Json(CampaignResponse {
        title: state.config.campaign_title.clone(),
        project_id,
        project_name: snapshot.project_name,
        goal_usd: state.config.goal_usd,
        goal_usd_formatted: progress::format_usd(state.config.goal_usd),
        progress: view,
        donor_contribution_eth: snapshot.donor_contribution_eth,
    })
}

/// `POST /campaign/project`
///
/// Switch the tracked campaign.  The snapshot resets to unknown and a
/// refresh starts immediately; any in-flight read for the old project is
/// discarded when it lands.
pub async fn set_project(
    State(state): State<Arc<EngineState>>,
    Json(request): Json<ProjectRequest>,
) -> impl IntoResponse {
    let changed = state
        .tracker
        .write()
        .await
        .set_project(request.project_id);

    if changed {
        let state = state.clone();
        tokio::spawn(async move { campaign::poll_once(&state).await });
    }

    Json(ProjectResponse {
        project_id: request.project_id,
    })
}

/// `GET /amounts`
pub async fn get_amounts(State(state): State<Arc<EngineState>>) -> impl IntoResponse {
    let pair = state.amounts.lock().await;
    Json(AmountsResponse {
        eth: pair.eth.clone(),
        usd: pair.usd.clone(),
        last_edited: pair.last_edited,
    })
}

/// `POST /amounts/eth`
pub async fn set_eth_amount(
    State(state): State<Arc<EngineState>>,
    Json(request): Json<AmountRequest>,
) -> impl IntoResponse {
    let rate = state.price.read().await.rate();
    let mut pair = state.amounts.lock().await;
    match pair.on_eth_changed(&request.value, rate) {
        Ok(()) => Json(AmountsResponse {
            eth: pair.eth.clone(),
            usd: pair.usd.clone(),
            last_edited: pair.last_edited,
        })
        .into_response(),
        Err(e) => error_response(&e),
    }
}

/// `POST /amounts/usd`
pub async fn set_usd_amount(
    State(state): State<Arc<EngineState>>,
    Json(request): Json<AmountRequest>,
) -> impl IntoResponse {
    let rate = state.price.read().await.rate();
    let mut pair = state.amounts.lock().await;
    match pair.on_usd_changed(&request.value, rate) {
        Ok(()) => Json(AmountsResponse {
            eth: pair.eth.clone(),
            usd: pair.usd.clone(),
            last_edited: pair.last_edited,
        })
        .into_response(),
        Err(e) => error_response(&e),
    }
}

/// `POST /amounts/reset`
pub async fn reset_amounts(State(state): State<Arc<EngineState>>) -> impl IntoResponse {
    let mut pair = state.amounts.lock().await;
    pair.reset();
    Json(AmountsResponse {
        eth: pair.eth.clone(),
        usd: pair.usd.clone(),
        last_edited: pair.last_edited,
    })
}

/// `POST /impact`
pub async fn compute_impact(
    State(state): State<Arc<EngineState>>,
    Json(request): Json<ImpactRequest>,
) -> impl IntoResponse {
    let Some(meals) = MealsPerDay::from_count(request.meals_per_day) else {
        return error_response(&EngineError::InvalidAmount(format!(
            "meals_per_day must be 1 or 2, got {}",
            request.meals_per_day
        )));
    };
    let Some(days) = Days::from_count(request.days) else {
        return error_response(&EngineError::InvalidAmount(format!(
            "days must be 1 or 2, got {}",
            request.days
        )));
    };

    Json(ImpactResponse {
        students_fed: impact::students_fed(&request.usd, state.config.meal_cost_usd, meals, days),
        breakdown: impact::impact_breakdown(&request.usd),
    })
    .into_response()
}

/// `POST /donate`
///
/// Runs one donation attempt.  409 while another attempt is pending, 400 on
/// an unmet precondition, 502 when the wallet or contract refuses.
pub async fn donate(State(state): State<Arc<EngineState>>) -> impl IntoResponse {
    if !state.gateway.can_submit() {
        return error_response(&EngineError::Precondition(
            "donations are disabled: no wallet bridge configured".to_string(),
        ));
    }

    let rate = state.price.read().await.rate();
    let project_id = state.tracker.read().await.project_id();

    let outcome = donate::submit_donation(
        &state.gateway,
        &state.amounts,
        &state.donation_in_flight,
        project_id,
        state.config.donor_address.as_deref(),
        rate,
    )
    .await;

    match outcome {
        Ok(outcome) => {
            let record = db::NewDonation {
                tx_hash: outcome.receipt.tx_hash.clone(),
                project_id: project_id as i64,
                donor: state.config.donor_address.clone().unwrap_or_default(),
                amount_wei: outcome.amount_wei.to_string(),
                amount_usd: outcome
                    .amount_usd
                    .map(|usd| amounts::format_fixed(usd, amounts::USD_DECIMALS)),
                block_number: outcome.receipt.block_number.map(|n| n as i64),
            };
            if let Err(e) = db::insert_donation(&state.pool, &record).await {
                warn!("failed to record donation {}: {e}", record.tx_hash);
            }

            // Refresh the totals in the background so the new donation shows up.
            let state = state.clone();
            tokio::spawn(async move { campaign::poll_once(&state).await });

            Json(DonateResponse {
                tx_hash: outcome.receipt.tx_hash,
                block_number: outcome.receipt.block_number,
                amount_eth: outcome.amount_eth,
                amount_usd: record.amount_usd,
            })
            .into_response()
        }
        Err(e) => error_response(&e),
    }
}

/// `GET /donations`
pub async fn list_donations(State(state): State<Arc<EngineState>>) -> impl IntoResponse {
    match db::list_donations(&state.pool).await {
        Ok(donations) => Json(DonationsResponse {
            count: donations.len(),
            donations,
        })
        .into_response(),
        Err(e) => error_response(&e),
    }
}
