//! Generic burst-protocol pool transport.
//!
//! Covers every pool and wallet that speaks the plain HTTP getMiningInfo /
//! submitNonce protocol. The transport side of an upstream is a poll task
//! plus a submit client; both normalize to the same interface the core
//! sees ([`PoolClient`] + [`UpstreamEvent`]), so protocol variants can be
//! added without touching arbitration.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::coin::Coin;
use crate::config::UpstreamConfig;
use crate::error::{Error, Result};
use crate::mining_info::{MiningInfo, RoundKey};
use crate::proxy::SubmitError;
use crate::submission::Submission;
use crate::tracing::prelude::*;
use crate::upstream::UpstreamEvent;
use crate::upstream::outage::{LinkStatus, OutageAlarm};

/// Submission attempts before giving up on the pool.
const SUBMIT_ATTEMPTS: u32 = 5;

/// Metadata accompanying a submission, scraped from the miner's request
/// headers and forwarded to the pool.
#[derive(Debug, Clone, Default)]
pub struct SubmitterMeta {
    /// Miner software identification (User-Agent or X-Miner).
    pub miner_software: Option<String>,
    pub miner_name: Option<String>,
    pub miner_alias: Option<String>,
    /// Total plot capacity in GiB (X-Capacity).
    pub capacity_gib: Option<u64>,
    /// Miner-supplied pool account key (X-Account).
    pub account_key: Option<String>,
}

/// Capability set every pool transport provides to the core.
#[async_trait]
pub trait PoolClient: Send + Sync {
    /// One poll of the pool's round parameters.
    async fn fetch_mining_info(&self) -> Result<MiningInfo>;

    /// Forward a validated submission. `Ok` carries the pool's response
    /// body verbatim; `Err` is already shaped for the miner.
    async fn submit_nonce(
        &self,
        submission: &Submission,
        meta: &SubmitterMeta,
    ) -> std::result::Result<serde_json::Value, SubmitError>;
}

/// HTTP client for one generic upstream.
pub struct GenericClient {
    http: reqwest::Client,
    url: String,
    coin: Coin,
    user_agent: String,
    default_miner_name: String,
    account_key: Option<String>,
    miner_name: Option<String>,
    miner_alias: Option<String>,
}

impl GenericClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        let user_agent = format!("Tanuki-Proxy {}", env!("CARGO_PKG_VERSION"));
        let hostname =
            std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            url: config.url.trim_end_matches('/').to_string(),
            coin: config.coin,
            default_miner_name: format!("{user_agent}/{hostname}"),
            user_agent,
            account_key: config.account_key.clone(),
            miner_name: config.miner_name.clone(),
            miner_alias: config.miner_alias.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/burst", self.url)
    }

    async fn submit_once(
        &self,
        submission: &Submission,
        meta: &SubmitterMeta,
    ) -> std::result::Result<serde_json::Value, SubmitAttemptError> {
        let mut request = self
            .http
            .post(self.endpoint())
            .query(&[
                ("requestType", "submitNonce".to_string()),
                ("accountId", submission.account_id.to_string()),
                ("nonce", submission.nonce.to_string()),
                ("blockheight", submission.height.to_string()),
            ])
            .header(
                "User-Agent",
                match &meta.miner_software {
                    Some(software) => format!("{} | {software}", self.user_agent),
                    None => self.user_agent.clone(),
                },
            )
            .header("X-Miner", &self.default_miner_name)
            .header(
                "X-MinerName",
                self.miner_name
                    .as_deref()
                    .or(meta.miner_name.as_deref())
                    .unwrap_or(&self.default_miner_name),
            )
            .header("X-Plotfile", &self.default_miner_name);

        if let Some(secret_phrase) = &submission.secret_phrase {
            request = request.query(&[("secretPhrase", secret_phrase)]);
        } else if let Some(deadline) = submission.deadline {
            request = request.query(&[("deadline", deadline.to_string())]);
        }
        if let Some(capacity) = meta.capacity_gib {
            request = request.header("X-Capacity", capacity);
        }
        // Miner can supply its own account key.
        if let Some(key) = self.account_key.as_deref().or(meta.account_key.as_deref()) {
            request = request.header("X-Account", key);
        }
        if let Some(alias) = self.miner_alias.as_deref().or(meta.miner_alias.as_deref()) {
            request = request.header("X-MinerAlias", alias);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SubmitAttemptError::Transport(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SubmitAttemptError::Transport(e.to_string()))?;

        if status.is_success() {
            serde_json::from_str(&body)
                .map_err(|e| SubmitAttemptError::Transport(format!("malformed body: {e}")))
        } else {
            // Pools report rejections (deadline above target, wrong key)
            // as an error body; pass those through untouched.
            match serde_json::from_str::<ErrorBody>(&body) {
                Ok(parsed) => Err(SubmitAttemptError::Pool(parsed.error)),
                Err(_) => Err(SubmitAttemptError::Pool(SubmitError::unreachable())),
            }
        }
    }
}

#[derive(Debug)]
enum SubmitAttemptError {
    /// Network-level failure, worth retrying.
    Transport(String),
    /// The pool answered with a definitive error; retrying won't help.
    Pool(SubmitError),
}

#[async_trait]
impl PoolClient for GenericClient {
    async fn fetch_mining_info(&self) -> Result<MiningInfo> {
        let response = self
            .http
            .get(self.endpoint())
            .query(&[("requestType", "getMiningInfo")])
            .header("User-Agent", &self.user_agent)
            .timeout(Duration::from_secs(20))
            .send()
            .await?
            .error_for_status()?;

        let mut info: MiningInfo = response
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("invalid getMiningInfo response: {e}")))?;
        if hex::decode(&info.generation_signature).is_err() {
            return Err(Error::Upstream(format!(
                "invalid generation signature {:?}",
                info.generation_signature
            )));
        }
        info.coin = Some(self.coin);
        Ok(info)
    }

    async fn submit_nonce(
        &self,
        submission: &Submission,
        meta: &SubmitterMeta,
    ) -> std::result::Result<serde_json::Value, SubmitError> {
        let mut backoff = ExponentialBackoff::new(
            Duration::from_millis(500),
            Duration::from_secs(4),
        );
        let mut attempt = 0;
        loop {
            match self.submit_once(submission, meta).await {
                Ok(body) => return Ok(body),
                Err(SubmitAttemptError::Pool(error)) => return Err(error),
                Err(SubmitAttemptError::Transport(err)) => {
                    attempt += 1;
                    if attempt >= SUBMIT_ATTEMPTS {
                        debug!(url = %self.url, error = %err, "Submission failed, giving up");
                        return Err(SubmitError::unreachable());
                    }
                    debug!(
                        url = %self.url,
                        error = %err,
                        attempt,
                        "Submission failed, retrying"
                    );
                    tokio::time::sleep(backoff.next_delay()).await;
                }
            }
        }
    }
}

#[derive(serde::Deserialize)]
struct ErrorBody {
    error: SubmitError,
}

/// Exponential backoff for submit retries.
///
/// Starts at `initial` and doubles after each call to `next_delay()`,
/// capping at `max`. Each returned delay is jittered to [0.5, 1.0) of the
/// nominal value so a flock of proxies doesn't retry in lockstep.
struct ExponentialBackoff {
    current: Duration,
    max: Duration,
    jitter_state: std::collections::hash_map::RandomState,
    jitter_step: u64,
}

impl ExponentialBackoff {
    fn new(initial: Duration, max: Duration) -> Self {
        Self {
            current: initial,
            max,
            jitter_state: std::collections::hash_map::RandomState::new(),
            jitter_step: 0,
        }
    }

    fn next_delay(&mut self) -> Duration {
        use std::hash::{BuildHasher, Hasher};

        let nominal = self.current;
        self.current = (self.current * 2).min(self.max);

        let mut hasher = self.jitter_state.build_hasher();
        hasher.write_u64(self.jitter_step);
        self.jitter_step = self.jitter_step.wrapping_add(1);
        let jitter = 0.5 + (hasher.finish() as f64 / u64::MAX as f64) * 0.5;

        nominal.mul_f64(jitter)
    }
}

/// Duplicate suppression for polled rounds.
///
/// A pool re-announcing the same (height, baseTarget) pair -- even with a
/// different generation signature -- must produce exactly one new-round
/// event.
#[derive(Debug, Default)]
pub struct RoundDedup {
    last: Option<RoundKey>,
}

impl RoundDedup {
    /// `true` iff this snapshot is a round we haven't announced yet.
    pub fn is_new(&mut self, info: &MiningInfo) -> bool {
        let key = info.round_key();
        if self.last == Some(key) {
            return false;
        }
        self.last = Some(key);
        true
    }
}

/// Poll loop for one upstream.
///
/// Fetches mining info on the configured cadence, deduplicates rounds,
/// and pushes genuine new rounds into the core. Connection health is
/// smoothed through [`OutageAlarm`] once per second so a single missed
/// poll never raises an alarm.
pub async fn poll_task(
    name: String,
    client: Arc<dyn PoolClient>,
    poll_interval: Duration,
    event_tx: mpsc::Sender<UpstreamEvent>,
    shutdown: CancellationToken,
) {
    let mut dedup = RoundDedup::default();
    let mut alarm = OutageAlarm::for_poll_interval(poll_interval);
    let mut connected = true;

    let mut poll = tokio::time::interval(poll_interval);
    poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut outage_tick = tokio::time::interval(Duration::from_secs(1));
    outage_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = poll.tick() => {
                match client.fetch_mining_info().await {
                    Ok(info) => {
                        connected = true;
                        if !dedup.is_new(&info) {
                            continue;
                        }
                        info!(
                            upstream = %name,
                            height = info.height,
                            base_target = info.base_target,
                            net_diff_tib = info.net_diff(),
                            target_deadline = info.target_deadline,
                            "New block"
                        );
                        if event_tx.send(UpstreamEvent::NewRound(info)).await.is_err() {
                            return;
                        }
                    }
                    Err(err) => {
                        connected = false;
                        debug!(upstream = %name, error = %err, "getMiningInfo failed");
                    }
                }
            }

            _ = outage_tick.tick() => {
                match alarm.check(connected) {
                    LinkStatus::OutageStarted => {
                        error!(upstream = %name, "Connection outage detected");
                    }
                    LinkStatus::Restored => {
                        info!(upstream = %name, "Connection outage resolved");
                    }
                    _ => {}
                }
            }

            _ = shutdown.cancelled() => return,
        }
    }
}
