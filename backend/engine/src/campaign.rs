//! Long-running campaign tracking — snapshot state, the stale-response
//! guard, and the background poll loop.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::rpc::{self, CampaignReader};
use crate::state::EngineState;

/// What is currently known about the tracked campaign.  Every field is
/// independently unknown until its read has succeeded; a failed read shows
/// as "loading" again rather than a stale number presented as current.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CampaignSnapshot {
    pub project_name: Option<String>,
    pub total_deposited_eth: Option<Decimal>,
    pub deposit_count: Option<u64>,
    pub donor_contribution_eth: Option<Decimal>,
}

/// Issued by [`CampaignTracker::begin_refresh`]; a fetched snapshot is only
/// installed while the ticket still matches, so a late response for a
/// superseded project can never overwrite current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshTicket {
    generation: u64,
    project_id: u64,
}

impl RefreshTicket {
    pub fn project_id(&self) -> u64 {
        self.project_id
    }
}

#[derive(Debug)]
pub struct CampaignTracker {
    project_id: u64,
    generation: u64,
    snapshot: CampaignSnapshot,
}

impl CampaignTracker {
    pub fn new(project_id: u64) -> Self {
        Self {
            project_id,
            generation: 0,
            snapshot: CampaignSnapshot::default(),
        }
    }

    pub fn project_id(&self) -> u64 {
        self.project_id
    }

    pub fn snapshot(&self) -> &CampaignSnapshot {
        &self.snapshot
    }

    /// Switch to another campaign.  Resets the snapshot to unknown and
    /// invalidates every outstanding refresh ticket.
    pub fn set_project(&mut self, project_id: u64) -> bool {
        if project_id == self.project_id {
            return false;
        }
        self.project_id = project_id;
        self.generation += 1;
        self.snapshot = CampaignSnapshot::default();
        true
    }

    pub fn begin_refresh(&self) -> RefreshTicket {
        RefreshTicket {
            generation: self.generation,
            project_id: self.project_id,
        }
    }

    /// Install a fetched snapshot.  Returns `false` (leaving state untouched)
    /// when the ticket no longer matches the tracked campaign.
    pub fn apply(&mut self, ticket: RefreshTicket, snapshot: CampaignSnapshot) -> bool {
        if ticket.generation != self.generation || ticket.project_id != self.project_id {
            return false;
        }
        self.snapshot = snapshot;
        true
    }
}

// ─────────────────────────────────────────────────────────
// Fetching
// ─────────────────────────────────────────────────────────

/// Gather a snapshot from the contract reader.  The three reads are
/// independent: each failure is logged with its cause and degrades only its
/// own field to unknown.
pub async fn fetch_snapshot<R: CampaignReader>(
    reader: &R,
    project_id: u64,
    donor: Option<&str>,
) -> CampaignSnapshot {
    let mut snapshot = CampaignSnapshot::default();

    match reader.get_project_info(project_id).await {
        Ok(info) => {
            snapshot.project_name = Some(info.name);
            match rpc::wei_to_eth(info.total_deposited_wei) {
                Ok(eth) => snapshot.total_deposited_eth = Some(eth),
                Err(e) => warn!("project {project_id}: {e}"),
            }
        }
        Err(e) => warn!("project {project_id}: info read failed: {e}"),
    }

    match reader.get_project_deposits(project_id).await {
        Ok(ids) => snapshot.deposit_count = Some(ids.len() as u64),
        Err(e) => warn!("project {project_id}: deposits read failed: {e}"),
    }

    if let Some(donor) = donor {
        match reader.get_donor_amount(project_id, donor).await {
            Ok(wei) => match rpc::wei_to_eth(wei) {
                Ok(eth) => snapshot.donor_contribution_eth = Some(eth),
                Err(e) => warn!("project {project_id}: {e}"),
            },
            Err(e) => warn!("project {project_id}: donor amount read failed: {e}"),
        }
    }

    snapshot
}

/// One poll iteration against the currently tracked project.
pub async fn poll_once(state: &EngineState) {
    let ticket = state.tracker.read().await.begin_refresh();
    let snapshot = fetch_snapshot(
        &state.gateway,
        ticket.project_id(),
        state.config.donor_address.as_deref(),
    )
    .await;

    let mut tracker = state.tracker.write().await;
    if tracker.apply(ticket, snapshot) {
        debug!("campaign snapshot updated for project {}", ticket.project_id());
    } else {
        warn!(
            "discarding stale snapshot for project {}",
            ticket.project_id()
        );
    }
}

/// Spawned from `main`; polls the contract until shutdown.
pub async fn run(state: Arc<EngineState>, shutdown: CancellationToken) {
    info!(
        "campaign tracker starting — contract {}, project {}",
        state.config.contract_address, state.config.project_id
    );

    loop {
        poll_once(&state).await;

        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("campaign tracker stopping");
                return;
            }
            _ = tokio::time::sleep(Duration::from_secs(state.config.campaign_poll_secs)) => {}
        }
    }
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
