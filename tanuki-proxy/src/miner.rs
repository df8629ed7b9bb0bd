//! Typed boundary to the miner-process collaborator.
//!
//! The proxy never supervises the mining binary itself; it exchanges
//! structured messages with whatever does. Directives flow out of the
//! round manager (scan this round / go idle), events flow back in (round
//! finished, scan progress). The link task also feeds the directive
//! stream into a watch channel so the miner-facing HTTP endpoint always
//! has the active round at hand without entering the core.

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::mining_info::MiningInfo;
use crate::tracing::prelude::*;
use crate::upstream::UpstreamId;

/// Directives published to the miner process.
#[derive(Debug, Clone)]
pub enum MinerDirective {
    /// Start scanning this round's parameters.
    StartRound {
        upstream: UpstreamId,
        upstream_name: String,
        mining_info: MiningInfo,
    },

    /// Every queued round has been scanned; nothing to do.
    Idle,
}

/// Events reported by the miner process.
#[derive(Debug, Clone)]
pub enum MinerEvent {
    /// The miner finished scanning the round at this height. Height is
    /// carried explicitly: a finish signal for a round that was already
    /// preempted must not complete its successor.
    RoundFinished { height: u64 },

    /// Scan progress for the currently active round.
    Progress {
        percent: f64,
        scan_speed_gib_s: Option<f64>,
        remaining_secs: Option<u64>,
    },
}

/// Bridge directives to the miner-visible watch channel.
///
/// `mining_info_tx` holds the projection served to getMiningInfo polls;
/// updating it is what actually redirects the miner to a new round.
pub async fn link_task(
    mut directive_rx: mpsc::UnboundedReceiver<MinerDirective>,
    mining_info_tx: watch::Sender<Option<MiningInfo>>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            directive = directive_rx.recv() => {
                let Some(directive) = directive else { return };
                match directive {
                    MinerDirective::StartRound { upstream_name, mining_info, .. } => {
                        info!(
                            upstream = %upstream_name,
                            height = mining_info.height,
                            "Directing miner to new round"
                        );
                        mining_info_tx.send_replace(Some(mining_info));
                    }
                    MinerDirective::Idle => {
                        debug!("All rounds finished, miner idle");
                        // The last round's parameters stay served; the
                        // miner has already scanned them and idles on its
                        // own.
                    }
                }
            }
            _ = shutdown.cancelled() => return,
        }
    }
}
