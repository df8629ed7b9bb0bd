//! The serialized proxy core.
//!
//! All cross-upstream state (the upstream registry, round arbitration,
//! per-round statistics) is owned by a single task and mutated only from
//! its event loop, so no arbitration decision ever races a submission or
//! a pool announcement. Everything long-running happens elsewhere: pool
//! polling in per-upstream tasks, submission forwarding in spawned tasks
//! that carry their own reply channel.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use slotmap::SlotMap;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{StreamExt, StreamMap};
use tokio_util::sync::CancellationToken;

use crate::api_client::{ProxyState, RoundState, UpstreamState};
use crate::config::{Config, UpstreamConfig};
use crate::miner::{MinerDirective, MinerEvent};
use crate::mining_info::MiningInfo;
use crate::profitability::ProfitabilityService;
use crate::round_manager::{Round, RoundManager};
use crate::submission::Submission;
use crate::tracing::prelude::*;
use crate::upstream::{PoolClient, SubmitterMeta, Upstream, UpstreamEvent, UpstreamId};

/// Error body returned to the miner, mirroring the pool protocol's
/// `{"error": {"message": ..., "code": ...}}` shape.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SubmitError {
    pub message: String,
    pub code: u8,
}

impl SubmitError {
    /// Code 1: the request is missing or mangling required fields.
    pub fn wrong_format() -> Self {
        Self {
            message: "submission has wrong format".into(),
            code: 1,
        }
    }

    /// Code 2: no upstream currently runs a round at the submitted
    /// height.
    pub fn different_round() -> Self {
        Self {
            message: "submission is for different round".into(),
            code: 2,
        }
    }

    /// Code 3: the upstream could not be reached (or kept failing).
    pub fn unreachable() -> Self {
        Self {
            message: "error reaching upstream".into(),
            code: 3,
        }
    }

    /// Code 4: unsupported requestType on the miner endpoint.
    pub fn unknown_request_type() -> Self {
        Self {
            message: "unknown request type".into(),
            code: 4,
        }
    }
}

/// Raw submitNonce query parameters, pre-validation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubmitNonceParams {
    pub account_id: Option<String>,
    pub blockheight: Option<String>,
    pub nonce: Option<String>,
    pub deadline: Option<String>,
    pub secret_phrase: Option<String>,
}

/// Commands entering the core from the HTTP surfaces.
pub enum ProxyCommand {
    SubmitNonce {
        params: SubmitNonceParams,
        meta: SubmitterMeta,
        reply: oneshot::Sender<std::result::Result<serde_json::Value, SubmitError>>,
    },
    GetState {
        reply: oneshot::Sender<ProxyState>,
    },
}

/// Everything the core needs to drive one upstream.
pub struct UpstreamRegistration {
    pub config: UpstreamConfig,
    pub client: Arc<dyn PoolClient>,
    pub events: mpsc::Receiver<UpstreamEvent>,
}

/// Run the proxy core until shutdown.
pub async fn task(
    config: Config,
    registrations: Vec<UpstreamRegistration>,
    mut miner_rx: mpsc::Receiver<MinerEvent>,
    mut command_rx: mpsc::Receiver<ProxyCommand>,
    directive_tx: mpsc::UnboundedSender<MinerDirective>,
    profitability: Option<Arc<ProfitabilityService>>,
    shutdown: CancellationToken,
) {
    let mut core = Core::new(&config, directive_tx, profitability);
    let mut events: StreamMap<UpstreamId, ReceiverStream<UpstreamEvent>> = StreamMap::new();
    for registration in registrations {
        let id = core.register(registration.config, registration.client);
        events.insert(id, ReceiverStream::new(registration.events));
    }

    loop {
        let scan_deadline = core.scan_deadline.map(|(when, _)| when);
        tokio::select! {
            Some((id, event)) = events.next() => {
                match event {
                    UpstreamEvent::NewRound(info) => core.handle_new_round(id, info),
                }
            }
            Some(event) = miner_rx.recv() => core.handle_miner_event(event),
            Some(command) = command_rx.recv() => core.handle_command(command),
            _ = sleep_until_or_forever(scan_deadline) => core.assume_scanned(),
            _ = shutdown.cancelled() => return,
        }
    }
}

async fn sleep_until_or_forever(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(when) => tokio::time::sleep_until(when).await,
        None => futures::future::pending().await,
    }
}

/// What the core decided to do with a submission. Forwarding leaves the
/// core before any I/O happens.
enum SubmitAction {
    Reply(std::result::Result<serde_json::Value, SubmitError>),
    Forward {
        client: Arc<dyn PoolClient>,
        submission: Submission,
        meta: SubmitterMeta,
    },
}

struct Core {
    upstreams: SlotMap<UpstreamId, Upstream>,
    manager: RoundManager,
    max_chains: Option<usize>,
    use_profitability: bool,
    profitability: Option<Arc<ProfitabilityService>>,
    assume_scanned_after: Option<Duration>,

    /// Pending synthesized-finish timer: fire time plus the height it
    /// will finish.
    scan_deadline: Option<(tokio::time::Instant, u64)>,
    /// Dispatch the timer was armed for; re-arming only on a fresh
    /// dispatch keeps queued events from postponing the deadline.
    armed_dispatch: Option<std::time::Instant>,

    started_at: std::time::Instant,
}

impl Core {
    fn new(
        config: &Config,
        directive_tx: mpsc::UnboundedSender<MinerDirective>,
        profitability: Option<Arc<ProfitabilityService>>,
    ) -> Self {
        Self {
            upstreams: SlotMap::new(),
            manager: RoundManager::new(config.max_number_of_chains, directive_tx),
            max_chains: config.max_number_of_chains,
            use_profitability: config.use_profitability,
            profitability,
            assume_scanned_after: config.assume_scanned_after_secs.map(Duration::from_secs),
            scan_deadline: None,
            armed_dispatch: None,
            started_at: std::time::Instant::now(),
        }
    }

    fn register(&mut self, config: UpstreamConfig, client: Arc<dyn PoolClient>) -> UpstreamId {
        self.upstreams.insert(Upstream::new(config, client))
    }

    /// A pool announced a new round: refresh its weight, record the
    /// round on the upstream, then run the admission filters before
    /// handing it to arbitration.
    fn handle_new_round(&mut self, id: UpstreamId, info: MiningInfo) {
        if self.use_profitability {
            if let Some(service) = &self.profitability {
                let upstream = &mut self.upstreams[id];
                let weight = service.profitability(
                    &info,
                    upstream.config.coin,
                    upstream.config.block_reward,
                );
                debug!(
                    upstream = %upstream.config.name,
                    weight,
                    "Profitability weight for new round"
                );
                upstream.dynamic_weight = Some(weight);
            }
        }

        // The upstream's own view updates even when the round is not
        // admitted; submissions can still be routed to it.
        self.upstreams[id].apply_new_round(info.clone());

        let upstream = &self.upstreams[id];
        let name = upstream.config.name.clone();
        info!(
            upstream = %name,
            height = info.height,
            base_target = info.base_target,
            net_diff = info.net_diff(),
            "New round announced"
        );

        if upstream.config.allow_mining_halted && info.mining_halted {
            info!(upstream = %name, height = info.height, "Mining halted, round not queued");
            return;
        }
        let weight = upstream.resolved_weight();
        if upstream.config.min_weight.is_some_and(|min| weight < min) {
            info!(
                upstream = %name,
                weight,
                "Weight below minimum, round not queued"
            );
            return;
        }
        if let Some(cap) = self.max_chains {
            if !self.makes_chain_cut(id, weight, cap) {
                info!(
                    upstream = %name,
                    weight,
                    max_chains = cap,
                    "Weight outside the top chains, round not queued"
                );
                return;
            }
        }

        let round = Round::new(
            id,
            name,
            info,
            weight,
            upstream.config.do_not_interrupt_above_percent,
        );
        self.manager.add_new_round(round);
        self.arm_scan_timer();
    }

    /// Top-N admission: an upstream already holding a top slot always
    /// passes; an outsider must strictly beat the weakest slot holder.
    fn makes_chain_cut(&self, id: UpstreamId, weight: f64, cap: usize) -> bool {
        let mut ranked: Vec<(UpstreamId, f64)> = self
            .upstreams
            .iter()
            .map(|(key, upstream)| (key, upstream.resolved_weight()))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        let top = &ranked[..cap.min(ranked.len())];
        top.iter().any(|(key, _)| *key == id)
            || top.last().is_none_or(|(_, weakest)| weight > *weakest)
    }

    fn handle_miner_event(&mut self, event: MinerEvent) {
        match event {
            MinerEvent::RoundFinished { height } => self.finish_round(height),
            MinerEvent::Progress {
                percent,
                scan_speed_gib_s,
                remaining_secs,
            } => {
                if let Some(id) = self.manager.update_progress(percent) {
                    self.upstreams[id].round_progress = percent;
                    trace!(
                        upstream = %self.upstreams[id].config.name,
                        percent,
                        scan_speed_gib_s,
                        remaining_secs,
                        "Scan progress"
                    );
                }
            }
        }
    }

    fn finish_round(&mut self, height: u64) {
        self.manager.finish_round(height);
        self.arm_scan_timer();
    }

    /// (Re)arm the synthesized-finish timer after anything that may have
    /// dispatched a round.
    fn arm_scan_timer(&mut self) {
        let Some(after) = self.assume_scanned_after else {
            return;
        };
        match self.manager.current() {
            Some(current) if !current.scan_done => {
                if self.armed_dispatch != current.started_at {
                    self.armed_dispatch = current.started_at;
                    self.scan_deadline =
                        Some((tokio::time::Instant::now() + after, current.info.height));
                }
            }
            _ => {
                self.armed_dispatch = None;
                self.scan_deadline = None;
            }
        }
    }

    /// The miner never told us it finished; move on anyway.
    fn assume_scanned(&mut self) {
        let Some((_, height)) = self.scan_deadline.take() else {
            return;
        };
        self.armed_dispatch = None;
        debug!(height, "No scan completion reported, assuming round scanned");
        self.finish_round(height);
    }

    fn handle_command(&mut self, command: ProxyCommand) {
        match command {
            ProxyCommand::SubmitNonce {
                params,
                meta,
                reply,
            } => match self.submit(params, meta) {
                SubmitAction::Reply(result) => {
                    let _ = reply.send(result);
                }
                SubmitAction::Forward {
                    client,
                    submission,
                    meta,
                } => {
                    tokio::spawn(async move {
                        let result = client.submit_nonce(&submission, &meta).await;
                        let _ = reply.send(result);
                    });
                }
            },
            ProxyCommand::GetState { reply } => {
                let _ = reply.send(self.state());
            }
        }
    }

    /// Validate, route, and gate a submission. Runs synchronously; the
    /// returned action tells the caller whether to reply now or forward.
    fn submit(&mut self, params: SubmitNonceParams, meta: SubmitterMeta) -> SubmitAction {
        // Some miners omit blockheight; they mean the round we sent them.
        let fallback_height;
        let height = match params.blockheight.as_deref() {
            Some(height) => Some(height),
            None => {
                fallback_height = self
                    .manager
                    .current_mining_info()
                    .map(|info| info.height.to_string());
                fallback_height.as_deref()
            }
        };
        let Some(submission) = Submission::parse(
            params.account_id.as_deref(),
            height,
            params.nonce.as_deref(),
            params.deadline.as_deref(),
            params.secret_phrase,
        ) else {
            debug!("Rejecting malformed submission");
            return SubmitAction::Reply(Err(SubmitError::wrong_format()));
        };

        // Route by the heights the upstreams themselves report, not by
        // the scheduler's active round: a preempted round's late
        // submissions still belong to its pool.
        let Some(id) = self.upstreams.iter().find_map(|(key, upstream)| {
            upstream
                .mining_info
                .as_ref()
                .is_some_and(|info| info.height == submission.height)
                .then_some(key)
        }) else {
            debug!(
                height = submission.height,
                "No upstream runs a round at this height"
            );
            return SubmitAction::Reply(Err(SubmitError::different_round()));
        };

        let upstream = &mut self.upstreams[id];
        if let Some(capacity) = meta.capacity_gib {
            upstream.last_capacity_gib = Some(capacity);
        }

        let info = upstream.mining_info.clone().expect("routed by mining_info");
        if let Some(adjusted) = submission.adjusted_deadline(info.base_target) {
            // Best deadline is recorded before any cutoff: the statistic
            // tracks what the plots produced, not what was forwarded.
            upstream.record_best_deadline(upstream.config.coin.modify_deadline(adjusted));

            let over_static = upstream
                .config
                .target_deadline
                .is_some_and(|target| adjusted > target);
            let over_dynamic = upstream
                .dynamic_target_deadline
                .is_some_and(|target| adjusted > target);
            if over_static || over_dynamic {
                debug!(
                    upstream = %upstream.config.name,
                    deadline = adjusted,
                    "Deadline over target, acknowledged without forwarding"
                );
                return SubmitAction::Reply(Ok(json!({
                    "result": "success",
                    "deadline": adjusted,
                })));
            }
        }

        SubmitAction::Forward {
            client: upstream.client.clone(),
            submission,
            meta,
        }
    }

    fn state(&self) -> ProxyState {
        let round_state = |round: &Round| RoundState {
            upstream: round.upstream_name.clone(),
            height: round.info.height,
            base_target: round.info.base_target,
            net_diff: round.info.net_diff(),
            weight: round.weight,
            progress: round.progress,
            scan_done: round.scan_done,
        };
        ProxyState {
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_secs: self.started_at.elapsed().as_secs(),
            current_round: self.manager.current().map(round_state),
            queued_rounds: self.manager.queue().iter().map(round_state).collect(),
            upstreams: self
                .upstreams
                .values()
                .map(|upstream| UpstreamState {
                    name: upstream.config.name.clone(),
                    coin: upstream.config.coin.to_string(),
                    weight: upstream.resolved_weight(),
                    current_height: upstream.mining_info.as_ref().map(|info| info.height),
                    net_diff: upstream.mining_info.as_ref().map(|info| info.net_diff()),
                    best_deadline: upstream.best_deadline,
                    round_progress: upstream.round_progress,
                    capacity_gib: upstream.last_capacity_gib,
                    dynamic_target_deadline: upstream.dynamic_target_deadline,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::coin::Coin;
    use crate::error::Result;

    /// Client that records forwarded submissions instead of doing I/O.
    #[derive(Default)]
    struct RecordingClient {
        submitted: Mutex<Vec<Submission>>,
    }

    #[async_trait]
    impl PoolClient for RecordingClient {
        async fn fetch_mining_info(&self) -> Result<MiningInfo> {
            unimplemented!("polling is not exercised in core tests")
        }

        async fn submit_nonce(
            &self,
            submission: &Submission,
            _meta: &SubmitterMeta,
        ) -> std::result::Result<serde_json::Value, SubmitError> {
            self.submitted.lock().push(submission.clone());
            Ok(json!({"result": "success"}))
        }
    }

    struct Fixture {
        core: Core,
        directive_rx: mpsc::UnboundedReceiver<MinerDirective>,
    }

    impl Fixture {
        fn new(config_toml: &str) -> Self {
            let config: Config = toml::from_str(config_toml).unwrap();
            let (directive_tx, directive_rx) = mpsc::unbounded_channel();
            let profitability = config
                .use_profitability
                .then(|| Arc::new(ProfitabilityService::new(config.use_eco_block_rewards)));
            let mut core = Core::new(&config, directive_tx, profitability);
            for upstream in config.enabled_upstreams() {
                core.register(upstream.clone(), Arc::new(RecordingClient::default()));
            }
            Self { core, directive_rx }
        }

        fn id(&self, name: &str) -> UpstreamId {
            self.core
                .upstreams
                .iter()
                .find_map(|(key, up)| (up.config.name == name).then_some(key))
                .unwrap()
        }

        fn announce(&mut self, name: &str, height: u64, base_target: u64) {
            let coin = self.core.upstreams[self.id(name)].config.coin;
            self.core.handle_new_round(
                self.id(name),
                MiningInfo {
                    height,
                    base_target,
                    generation_signature: "ab".repeat(32),
                    target_deadline: None,
                    mining_halted: false,
                    coin: Some(coin),
                },
            );
        }

        fn started_heights(&mut self) -> Vec<u64> {
            let mut out = Vec::new();
            while let Ok(directive) = self.directive_rx.try_recv() {
                if let MinerDirective::StartRound { mining_info, .. } = directive {
                    out.push(mining_info.height);
                }
            }
            out
        }

        fn submit(&mut self, params: SubmitNonceParams, meta: SubmitterMeta) -> SubmitAction {
            self.core.submit(params, meta)
        }
    }

    fn params(height: Option<&str>, deadline: &str) -> SubmitNonceParams {
        SubmitNonceParams {
            account_id: Some("12297376156869634540".into()),
            blockheight: height.map(String::from),
            nonce: Some("68101793".into()),
            deadline: Some(deadline.into()),
            secret_phrase: None,
        }
    }

    const TWO_UPSTREAMS: &str = r#"
        [[upstream]]
        name = "signa"
        url = "http://localhost:8124"
        coin = "SIGNA"
        weight = 10

        [[upstream]]
        name = "bhd"
        url = "http://localhost:8732"
        coin = "BHD"
        weight = 20
    "#;

    #[test]
    fn rounds_flow_from_announcement_to_dispatch() {
        let mut fx = Fixture::new(TWO_UPSTREAMS);
        fx.announce("signa", 100, 4000);
        fx.announce("bhd", 5000, 6000);
        // Heavier bhd preempted signa; signa resumes after bhd finishes.
        assert_eq!(fx.started_heights(), vec![100, 5000]);
        fx.core.finish_round(5000);
        assert_eq!(fx.started_heights(), vec![100]);
    }

    #[test]
    fn submissions_route_by_upstream_height_not_active_round() {
        let mut fx = Fixture::new(TWO_UPSTREAMS);
        fx.announce("signa", 100, 4000);
        fx.announce("bhd", 5000, 6000); // bhd is now active

        // A late submission for signa's preempted round still reaches
        // signa's client.
        let action = fx.submit(params(Some("100"), "1000000"), SubmitterMeta::default());
        let SubmitAction::Forward { submission, .. } = action else {
            panic!("expected forward");
        };
        assert_eq!(submission.height, 100);

        let signa = fx.id("signa");
        assert_eq!(
            fx.core.upstreams[signa].best_deadline,
            Some(Coin::Signa.modify_deadline(1_000_000 / 4000))
        );
    }

    #[test]
    fn unknown_height_is_a_different_round() {
        let mut fx = Fixture::new(TWO_UPSTREAMS);
        fx.announce("signa", 100, 4000);
        let action = fx.submit(params(Some("999"), "1000000"), SubmitterMeta::default());
        let SubmitAction::Reply(Err(err)) = action else {
            panic!("expected code 2");
        };
        assert_eq!(err, SubmitError::different_round());
    }

    #[test]
    fn malformed_submission_is_wrong_format() {
        let mut fx = Fixture::new(TWO_UPSTREAMS);
        fx.announce("signa", 100, 4000);
        let mut bad = params(Some("100"), "1000000");
        bad.nonce = None;
        let SubmitAction::Reply(Err(err)) = fx.submit(bad, SubmitterMeta::default()) else {
            panic!("expected code 1");
        };
        assert_eq!(err, SubmitError::wrong_format());
    }

    #[test]
    fn missing_blockheight_defaults_to_the_active_round() {
        let mut fx = Fixture::new(TWO_UPSTREAMS);
        fx.announce("signa", 100, 4000);
        let action = fx.submit(params(None, "1000000"), SubmitterMeta::default());
        let SubmitAction::Forward { submission, .. } = action else {
            panic!("expected forward");
        };
        assert_eq!(submission.height, 100);
    }

    #[test]
    fn deadline_over_static_target_gets_courtesy_success() {
        let config = r#"
            [[upstream]]
            name = "signa"
            url = "http://localhost:8124"
            coin = "SIGNA"
            target_deadline = 100
        "#;
        let mut fx = Fixture::new(config);
        fx.announce("signa", 100, 4000);

        // 1000000 / 4000 = 250 > 100: acknowledged, not forwarded.
        let action = fx.submit(params(Some("100"), "1000000"), SubmitterMeta::default());
        let SubmitAction::Reply(Ok(body)) = action else {
            panic!("expected courtesy success");
        };
        assert_eq!(body["result"], "success");
        assert_eq!(body["deadline"], 250);

        // The suppressed deadline still counts toward the round's best.
        let signa = fx.id("signa");
        assert_eq!(
            fx.core.upstreams[signa].best_deadline,
            Some(Coin::Signa.modify_deadline(250))
        );

        // A deadline under the target is forwarded.
        let action = fx.submit(params(Some("100"), "200000"), SubmitterMeta::default());
        assert!(matches!(action, SubmitAction::Forward { .. }));
    }

    #[test]
    fn capacity_report_enables_dynamic_cutoff_next_round() {
        let config = r#"
            [[upstream]]
            name = "bhd"
            url = "http://localhost:8732"
            coin = "BHD"
            submit_probability = 0.5
        "#;
        let mut fx = Fixture::new(config);
        fx.announce("bhd", 100, 4000);

        let meta = SubmitterMeta {
            capacity_gib: Some(2048),
            ..SubmitterMeta::default()
        };
        assert!(matches!(
            fx.submit(params(Some("100"), "8000"), meta),
            SubmitAction::Forward { .. }
        ));

        fx.announce("bhd", 101, 4000);
        let bhd = fx.id("bhd");
        let cutoff = fx.core.upstreams[bhd].dynamic_target_deadline.unwrap();

        // Over the cutoff: courtesy success. Under it: forwarded.
        let over = (cutoff + 1) * 4000;
        let action = fx.submit(params(Some("101"), &over.to_string()), SubmitterMeta::default());
        assert!(matches!(action, SubmitAction::Reply(Ok(_))));
        let action = fx.submit(params(Some("101"), "4000"), SubmitterMeta::default());
        assert!(matches!(action, SubmitAction::Forward { .. }));
    }

    #[test]
    fn halted_round_is_not_queued_when_configured() {
        let config = r#"
            [[upstream]]
            name = "bhd"
            url = "http://localhost:8732"
            coin = "BHD"
            allow_mining_halted = true
        "#;
        let mut fx = Fixture::new(config);
        let id = fx.id("bhd");
        fx.core.handle_new_round(
            id,
            MiningInfo {
                height: 100,
                base_target: 4000,
                generation_signature: "ab".repeat(32),
                target_deadline: None,
                mining_halted: true,
                coin: Some(Coin::Bhd),
            },
        );
        assert!(fx.started_heights().is_empty());
        // Submissions for it still route.
        assert!(matches!(
            fx.submit(params(Some("100"), "8000"), SubmitterMeta::default()),
            SubmitAction::Forward { .. }
        ));
    }

    #[test]
    fn min_weight_suppresses_light_rounds() {
        let config = r#"
            [[upstream]]
            name = "signa"
            url = "http://localhost:8124"
            coin = "SIGNA"
            weight = 5
            min_weight = 8
        "#;
        let mut fx = Fixture::new(config);
        fx.announce("signa", 100, 4000);
        assert!(fx.started_heights().is_empty());
    }

    #[test]
    fn chain_cap_admits_only_top_weights() {
        let config = r#"
            max_number_of_chains = 1

            [[upstream]]
            name = "signa"
            url = "http://localhost:8124"
            coin = "SIGNA"
            weight = 10

            [[upstream]]
            name = "bhd"
            url = "http://localhost:8732"
            coin = "BHD"
            weight = 20
        "#;
        let mut fx = Fixture::new(config);
        fx.announce("signa", 100, 4000); // outside the top 1
        assert!(fx.started_heights().is_empty());
        fx.announce("bhd", 5000, 6000); // holds the top slot
        assert_eq!(fx.started_heights(), vec![5000]);
    }

    #[test]
    fn state_snapshot_reflects_rounds_and_upstreams() {
        let mut fx = Fixture::new(TWO_UPSTREAMS);
        fx.announce("signa", 100, 4000);
        fx.announce("bhd", 5000, 6000);
        let state = fx.core.state();
        assert_eq!(state.current_round.as_ref().unwrap().upstream, "bhd");
        assert_eq!(state.queued_rounds.len(), 1);
        assert_eq!(state.queued_rounds[0].height, 100);
        assert_eq!(state.upstreams.len(), 2);
        let signa = state.upstreams.iter().find(|u| u.name == "signa").unwrap();
        assert_eq!(signa.current_height, Some(100));
        assert_eq!(signa.coin, "SIGNA");
    }

    #[tokio::test(start_paused = true)]
    async fn unreported_scans_finish_on_the_assume_timer() {
        let config = format!("assume_scanned_after_secs = 30\n{TWO_UPSTREAMS}");
        let mut fx = Fixture::new(&config);
        fx.announce("signa", 100, 4000);
        fx.announce("bhd", 5000, 6000);
        fx.started_heights();

        // The timer is armed for the active (bhd) round.
        let (_, height) = fx.core.scan_deadline.unwrap();
        assert_eq!(height, 5000);

        tokio::time::advance(Duration::from_secs(31)).await;
        fx.core.assume_scanned();

        // bhd's round was synthesized as finished; signa resumed and the
        // timer re-armed for it.
        assert_eq!(fx.started_heights(), vec![100]);
        let (_, height) = fx.core.scan_deadline.unwrap();
        assert_eq!(height, 100);
    }
}
