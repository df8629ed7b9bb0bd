//! Round arbitration: which upstream's round is the miner scanning now?
//!
//! The manager holds at most one active round plus a pending queue sorted
//! descending by weight (stable ties, at most one entry per upstream).
//! All transitions run inside the serialized proxy core, so each call
//! sees and leaves a consistent queue; dispatch is a directive pushed to
//! the miner link, never an awaited operation.
//!
//! Idle is the absence of a current round, not a sentinel with a magic
//! weight. A started round that finished with an empty queue stays
//! current (it is what getMiningInfo keeps serving) but its
//! `scan_done` flag makes it yield to any newcomer.

use std::time::Instant;

use tokio::sync::mpsc;

use crate::miner::MinerDirective;
use crate::mining_info::MiningInfo;
use crate::tracing::prelude::*;
use crate::upstream::UpstreamId;

/// One enqueued (or active) unit of mining work.
#[derive(Debug, Clone)]
pub struct Round {
    pub upstream: UpstreamId,
    pub upstream_name: String,
    pub info: MiningInfo,

    /// Scheduling weight, resolved at enqueue time.
    pub weight: f64,

    /// Copied from the upstream's config at enqueue time so the manager
    /// needs no back-reference to judge preemption.
    pub do_not_interrupt_above_percent: Option<f64>,

    /// Set while dispatched; cleared on cancel. Bookkeeping only -- the
    /// upstream's own per-round stats survive dispatch cycling.
    pub started_at: Option<Instant>,

    pub scan_done: bool,

    /// Miner-reported scan progress, 0–100.
    pub progress: f64,
}

impl Round {
    pub fn new(
        upstream: UpstreamId,
        upstream_name: String,
        info: MiningInfo,
        weight: f64,
        do_not_interrupt_above_percent: Option<f64>,
    ) -> Self {
        Self {
            upstream,
            upstream_name,
            info,
            weight,
            do_not_interrupt_above_percent,
            started_at: None,
            scan_done: false,
            progress: 0.0,
        }
    }

    fn start(&mut self) {
        self.started_at = Some(Instant::now());
    }

    fn cancel(&mut self) {
        self.started_at = None;
    }
}

/// The round scheduler.
pub struct RoundManager {
    queue: Vec<Round>,
    current: Option<Round>,

    /// Queue length cap (`max_number_of_chains`); excess lowest-weight
    /// rounds are dropped after sorting.
    max_queued: Option<usize>,

    directive_tx: mpsc::UnboundedSender<MinerDirective>,
}

impl RoundManager {
    pub fn new(
        max_queued: Option<usize>,
        directive_tx: mpsc::UnboundedSender<MinerDirective>,
    ) -> Self {
        Self {
            queue: Vec::new(),
            current: None,
            max_queued,
            directive_tx,
        }
    }

    pub fn current(&self) -> Option<&Round> {
        self.current.as_ref()
    }

    pub fn queue(&self) -> &[Round] {
        &self.queue
    }

    /// Parameters of the round the miner should be scanning.
    pub fn current_mining_info(&self) -> Option<&MiningInfo> {
        self.current.as_ref().map(|round| &round.info)
    }

    /// Admit a new round and arbitrate.
    ///
    /// The newcomer replaces any queued round from the same upstream
    /// (newer supersedes older, even undispatched). It is then dispatched
    /// now, queued for later, or -- when the in-flight round is nearly
    /// done and marked do-not-interrupt -- left waiting without any
    /// preemption this call.
    pub fn add_new_round(&mut self, round: Round) {
        self.queue.retain(|queued| queued.upstream != round.upstream);
        self.queue.push(round);
        self.sort_queue();
        if let Some(max) = self.max_queued {
            self.queue.truncate(max);
        }
        let Some(top) = self.queue.first() else {
            return;
        };

        // A pool re-announcing its own round always wins over itself,
        // regardless of progress or weight.
        if let Some(current) = &self.current {
            if current.upstream == top.upstream {
                self.dispatch_next();
                return;
            }
        }

        // Almost-finished rounds are not worth interrupting: the partial
        // scan would be thrown away for a sliver of saved time.
        if let Some(current) = &self.current {
            let nearly_done = current
                .do_not_interrupt_above_percent
                .is_some_and(|limit| current.progress >= limit);
            if !current.scan_done && nearly_done {
                debug!(
                    upstream = %current.upstream_name,
                    progress = current.progress,
                    "Round nearly finished, holding newcomers back"
                );
                return;
            }
        }

        // Strictly heavier newcomer preempts; the interrupted round goes
        // back into the queue to resume later.
        if let Some(current) = &self.current {
            if current.weight < self.queue[0].weight {
                let mut preempted = self.current.take().expect("checked above");
                if !preempted.scan_done {
                    debug!(
                        upstream = %preempted.upstream_name,
                        height = preempted.info.height,
                        progress = preempted.progress,
                        "Round interrupted, re-queued"
                    );
                    preempted.cancel();
                    self.queue.push(preempted);
                    self.sort_queue();
                }
                self.dispatch_next();
                return;
            }
        }

        // Nothing active (or the active round already finished): take the
        // best pending round regardless of relative weight.
        if self.current.as_ref().is_none_or(|current| current.scan_done) {
            self.dispatch_next();
        }
    }

    /// Handle a round-finished signal from the miner.
    ///
    /// Signals carrying any height other than the active round's are
    /// stale traffic from preempted rounds and are ignored -- that is
    /// expected, not an error.
    pub fn finish_round(&mut self, height: u64) {
        let Some(current) = &mut self.current else {
            return;
        };
        if current.info.height != height {
            trace!(
                height,
                active_height = current.info.height,
                "Ignoring stale round-finished signal"
            );
            return;
        }
        current.scan_done = true;
        current.progress = 100.0;

        if self.queue.is_empty() {
            let _ = self.directive_tx.send(MinerDirective::Idle);
        } else {
            self.dispatch_next();
        }
    }

    /// Mirror miner-reported progress into the active round.
    ///
    /// Returns the owning upstream so the caller can update that
    /// upstream's own stats too.
    pub fn update_progress(&mut self, percent: f64) -> Option<UpstreamId> {
        let current = self.current.as_mut().filter(|round| !round.scan_done)?;
        current.progress = percent;
        Some(current.upstream)
    }

    fn dispatch_next(&mut self) {
        if self.queue.is_empty() {
            return;
        }
        let mut next = self.queue.remove(0);
        next.start();
        debug!(
            upstream = %next.upstream_name,
            height = next.info.height,
            weight = next.weight,
            "Starting round"
        );
        let _ = self.directive_tx.send(MinerDirective::StartRound {
            upstream: next.upstream,
            upstream_name: next.upstream_name.clone(),
            mining_info: next.info.clone(),
        });
        self.current = Some(next);
    }

    // Descending by weight; Vec::sort_by is stable, so equal weights keep
    // insertion order.
    fn sort_queue(&mut self) {
        self.queue.sort_by(|a, b| b.weight.total_cmp(&a.weight));
    }
}
