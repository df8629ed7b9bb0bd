//! Configuration loading and validation.
//!
//! The proxy reads a single TOML file: global knobs plus one `[[upstream]]`
//! table per pool. Upstream tables accept `prio` as a legacy alias for
//! `weight`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::coin::Coin;
use crate::error::{Error, Result};

fn default_listen_addr() -> String {
    "127.0.0.1:5000".to_string()
}

fn default_api_listen_addr() -> String {
    "127.0.0.1:7785".to_string()
}

fn default_poll_interval_ms() -> u64 {
    1000
}

/// Top-level proxy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Address the miner-facing endpoint binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Address the management API binds to.
    #[serde(default = "default_api_listen_addr")]
    pub api_listen_addr: String,

    /// Cap on concurrently tracked chains. Rounds from upstreams whose
    /// weight doesn't make the top-N cut are not queued.
    #[serde(default)]
    pub max_number_of_chains: Option<usize>,

    /// Derive upstream weights from coin profitability instead of static
    /// configuration.
    #[serde(default)]
    pub use_profitability: bool,

    /// Use eco block rewards in profitability math.
    #[serde(default)]
    pub use_eco_block_rewards: bool,

    /// Assume a round finished this many seconds after it was started,
    /// for miners that never report scan completion.
    #[serde(default)]
    pub assume_scanned_after_secs: Option<u64>,

    #[serde(rename = "upstream")]
    pub upstreams: Vec<UpstreamConfig>,
}

/// Configuration for one upstream pool.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    pub name: String,
    pub url: String,
    pub coin: Coin,

    /// Static scheduling weight; higher wins arbitration. `prio` is the
    /// legacy spelling.
    #[serde(default, alias = "prio")]
    pub weight: Option<f64>,

    /// Rounds resolving below this weight are not queued at all.
    #[serde(default)]
    pub min_weight: Option<f64>,

    /// Static deadline cutoff; worse deadlines are acknowledged but not
    /// forwarded to the pool.
    #[serde(default)]
    pub target_deadline: Option<u64>,

    /// Desired probability (0–1, or percent) of improving on the pool's
    /// winning deadline; enables the dynamic deadline cutoff.
    #[serde(default)]
    pub submit_probability: Option<f64>,

    /// Don't preempt this upstream's round once its scan progress reaches
    /// this percentage.
    #[serde(default)]
    pub do_not_interrupt_above_percent: Option<f64>,

    /// Honor the pool's miningHalted flag by suppressing the round.
    #[serde(default)]
    pub allow_mining_halted: bool,

    /// Poll cadence for getMiningInfo.
    #[serde(default = "default_poll_interval_ms")]
    pub update_mining_info_interval_ms: u64,

    /// Pool account key forwarded on submissions (X-Account).
    #[serde(default)]
    pub account_key: Option<String>,

    /// Overrides the miner-reported name on submissions.
    #[serde(default)]
    pub miner_name: Option<String>,

    #[serde(default)]
    pub miner_alias: Option<String>,

    /// Pins the block reward used for profitability, overriding the
    /// per-coin table.
    #[serde(default)]
    pub block_reward: Option<f64>,

    #[serde(default)]
    pub disabled: bool,
}

impl Config {
    /// Load and validate a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::Config(format!("cannot read {}: {e}", path.as_ref().display()))
        })?;
        let config: Config =
            toml::from_str(&raw).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        validate_listen_addr(&self.listen_addr)?;
        validate_listen_addr(&self.api_listen_addr)?;

        let enabled: Vec<_> = self.upstreams.iter().filter(|u| !u.disabled).collect();
        if enabled.is_empty() {
            return Err(Error::Config("no enabled upstreams defined".into()));
        }
        for upstream in &self.upstreams {
            if upstream.name.is_empty() {
                return Err(Error::Config("upstream without a name".into()));
            }
            if upstream.url.is_empty() {
                return Err(Error::Config(format!(
                    "upstream {}: no url defined",
                    upstream.name
                )));
            }
            if let Some(p) = upstream.submit_probability {
                if p <= 0.0 {
                    return Err(Error::Config(format!(
                        "upstream {}: submit_probability must be positive",
                        upstream.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Upstreams that should actually be driven.
    pub fn enabled_upstreams(&self) -> impl Iterator<Item = &UpstreamConfig> {
        self.upstreams.iter().filter(|u| !u.disabled)
    }
}

fn validate_listen_addr(addr: &str) -> Result<()> {
    let mut parts = addr.split(':');
    let (host, port) = (parts.next(), parts.next());
    if host.is_none_or(str::is_empty)
        || port.is_none_or(|p| p.parse::<u16>().is_err())
        || parts.next().is_some()
    {
        return Err(Error::Config(format!("invalid listen address {addr:?}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        listen_addr = "127.0.0.1:5000"

        [[upstream]]
        name = "signa pool"
        url = "http://pool.example:8124"
        coin = "SIGNA"
        prio = 11
        do_not_interrupt_above_percent = 90

        [[upstream]]
        name = "bhd wallet"
        url = "http://localhost:8732"
        coin = "BHD"
        weight = 10
        submit_probability = 0.95
    "#;

    #[test]
    fn parses_sample_with_prio_alias() {
        let config: Config = toml::from_str(SAMPLE).unwrap();
        assert_eq!(config.upstreams.len(), 2);
        assert_eq!(config.upstreams[0].weight, Some(11.0));
        assert_eq!(config.upstreams[0].coin, Coin::Signa);
        assert_eq!(
            config.upstreams[0].do_not_interrupt_above_percent,
            Some(90.0)
        );
        assert_eq!(config.upstreams[1].update_mining_info_interval_ms, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_empty_upstreams() {
        let config: Config = toml::from_str("upstream = []").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_bad_listen_addr() {
        let mut config: Config = toml::from_str(SAMPLE).unwrap();
        config.listen_addr = "no-port".into();
        assert!(config.validate().is_err());
        config.listen_addr = "127.0.0.1:99999".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_nonpositive_submit_probability() {
        let mut config: Config = toml::from_str(SAMPLE).unwrap();
        config.upstreams[1].submit_probability = Some(0.0);
        assert!(config.validate().is_err());
    }
}
