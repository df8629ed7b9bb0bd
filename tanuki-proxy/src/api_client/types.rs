//! Wire types shared by the management API and its clients.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Snapshot of the whole proxy, as served by `/v0/proxy`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProxyState {
    pub version: String,
    pub uptime_secs: u64,
    /// The round the miner is (or was last) scanning.
    pub current_round: Option<RoundState>,
    /// Rounds waiting for the miner, best weight first.
    pub queued_rounds: Vec<RoundState>,
    pub upstreams: Vec<UpstreamState>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RoundState {
    pub upstream: String,
    pub height: u64,
    pub base_target: u64,
    /// Coin-adjusted network difficulty in TiB.
    pub net_diff: u64,
    pub weight: f64,
    /// Scan progress, 0-100.
    pub progress: f64,
    pub scan_done: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpstreamState {
    pub name: String,
    pub coin: String,
    /// Effective scheduling weight after the fallback chain.
    pub weight: f64,
    pub current_height: Option<u64>,
    pub net_diff: Option<u64>,
    /// Best coin-adjusted deadline seen this round, in seconds.
    pub best_deadline: Option<u64>,
    pub round_progress: f64,
    /// Capacity in GiB as last reported by the miner.
    pub capacity_gib: Option<u64>,
    /// Per-round statistical deadline cutoff, when submit-probability
    /// gating is configured.
    pub dynamic_target_deadline: Option<u64>,
}
