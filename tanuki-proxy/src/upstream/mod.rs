//! Upstream pool connections.
//!
//! One `Upstream` per configured pool. The struct here is the pool's
//! *state* as the serialized core sees it: its config, the latest round it
//! announced, and the per-round statistics (best deadline, progress,
//! reported capacity, dynamic deadline cutoff). The network side lives in
//! [`generic`] and runs as an independent task per upstream, re-entering
//! the core only through the [`UpstreamEvent`] channel.

pub mod generic;
pub mod outage;

use std::sync::Arc;
use std::time::Instant;

use crate::config::UpstreamConfig;
use crate::mining_info::MiningInfo;
use crate::tracing::prelude::*;

pub use generic::{GenericClient, PoolClient, SubmitterMeta};

/// Unique identifier for an upstream, assigned at registration.
pub type UpstreamId = slotmap::DefaultKey;

/// Weight used when neither config nor profitability provides one.
pub const DEFAULT_WEIGHT: f64 = 10.0;

/// Events an upstream's transport task pushes into the serialized core.
#[derive(Debug)]
pub enum UpstreamEvent {
    /// The pool announced a round we haven't seen (dedup by
    /// (height, baseTarget) already applied by the transport).
    NewRound(MiningInfo),
}

/// Per-pool state owned by the proxy core.
pub struct Upstream {
    pub config: UpstreamConfig,

    /// Transport used for forwarding submissions. Shared with spawned
    /// forward tasks so pool I/O never runs inside the core.
    pub client: Arc<dyn PoolClient>,

    /// The most recent round this pool announced. Submission routing
    /// matches against this, not against the scheduler's active round.
    pub mining_info: Option<MiningInfo>,

    /// Best (lowest) coin-adjusted deadline seen this round.
    pub best_deadline: Option<u64>,

    pub round_start: Option<Instant>,

    /// Scan progress (0–100) mirrored from miner reports while this
    /// upstream's round is active.
    pub round_progress: f64,

    /// Capacity in GiB as last reported by the miner on a submission.
    pub last_capacity_gib: Option<u64>,

    /// Statistical deadline cutoff for the current round, recomputed on
    /// every new round from capacity and net difficulty.
    pub dynamic_target_deadline: Option<u64>,

    /// Profitability-derived weight, refreshed by the orchestrator.
    pub dynamic_weight: Option<f64>,

    /// `-ln(1 - p) * blockTime`, fixed at construction from the
    /// configured submit probability.
    target_dl_factor: Option<f64>,
}

impl Upstream {
    pub fn new(config: UpstreamConfig, client: Arc<dyn PoolClient>) -> Self {
        let target_dl_factor = config
            .submit_probability
            .map(|p| target_dl_factor(p, config.coin.block_time()));
        Self {
            config,
            client,
            mining_info: None,
            best_deadline: None,
            round_start: None,
            round_progress: 0.0,
            last_capacity_gib: None,
            dynamic_target_deadline: None,
            dynamic_weight: None,
            target_dl_factor,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Scheduling weight: explicit config weight, then the
    /// profitability-derived one, then the default. Zero counts as unset,
    /// so a pool the profitability service can't price never outranks
    /// one with real numbers.
    pub fn resolved_weight(&self) -> f64 {
        self.config
            .weight
            .filter(|w| *w > 0.0)
            .or(self.dynamic_weight.filter(|w| *w > 0.0))
            .unwrap_or(DEFAULT_WEIGHT)
    }

    /// Begin a new round: store the snapshot and reset per-round stats.
    ///
    /// If submit-probability gating is enabled and the miner has reported
    /// capacity, recompute the dynamic deadline cutoff for this round.
    pub fn apply_new_round(&mut self, info: MiningInfo) {
        self.best_deadline = None;
        self.round_progress = 0.0;
        self.round_start = Some(Instant::now());

        self.dynamic_target_deadline = None;
        if let (Some(factor), Some(capacity_gib)) =
            (self.target_dl_factor, self.last_capacity_gib)
        {
            if capacity_gib > 0 {
                let capacity_tib = capacity_gib as f64 / 1024.0;
                let cutoff = (factor * info.net_diff() as f64 / capacity_tib).round() as u64;
                debug!(
                    upstream = %self.config.name,
                    target_deadline = cutoff,
                    "Submit probability cutoff for this round"
                );
                self.dynamic_target_deadline = Some(cutoff);
            }
        }

        self.mining_info = Some(info);
    }

    /// Track the lowest coin-adjusted deadline seen this round.
    pub fn record_best_deadline(&mut self, adjusted: u64) {
        if self.best_deadline.is_none_or(|best| adjusted < best) {
            self.best_deadline = Some(adjusted);
        }
    }
}

/// Deadline factor for a desired submit probability.
///
/// Deadlines below `factor * netDiff / capacityTiB` have roughly
/// probability `p` of improving on the pool's eventual winning deadline,
/// given the reported capacity. Percent-form inputs (anything above 10)
/// are scaled down; probabilities at or above 1 are clamped just below it
/// to keep the logarithm finite.
pub fn target_dl_factor(submit_probability: f64, block_time: u64) -> f64 {
    let mut p = if submit_probability > 10.0 {
        submit_probability / 100.0
    } else {
        submit_probability
    };
    if p >= 1.0 {
        p = 0.999999;
    }
    -(1.0 - p).ln() * block_time as f64
}
