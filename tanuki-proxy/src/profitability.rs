//! Profitability-derived scheduling weights.
//!
//! When enabled, upstream weights come from coin economics instead of
//! static configuration: USD rates are pulled from an external ticker on
//! a slow cadence and combined with the chain's block reward and current
//! network difficulty. The proxy core only ever reads the cached rates;
//! refreshing happens in its own task.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::coin::Coin;
use crate::error::Result;
use crate::mining_info::MiningInfo;
use crate::tracing::prelude::*;

const TICKER_URL: &str = "https://api.coingecko.com/api/v3/simple/price";
const REFRESH_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// USD rate cache plus the weight formula.
pub struct ProfitabilityService {
    /// USD per coin, keyed by ticker id. Written by the refresh task,
    /// read by the proxy core.
    rates: RwLock<HashMap<String, f64>>,
    use_eco_block_rewards: bool,
    http: reqwest::Client,
}

impl ProfitabilityService {
    pub fn new(use_eco_block_rewards: bool) -> Self {
        Self {
            rates: RwLock::new(HashMap::new()),
            use_eco_block_rewards,
            http: reqwest::Client::new(),
        }
    }

    /// Weight for a round: expected USD yield of 1 TiB against this
    /// chain, scaled to a readable integer range. Unpriceable coins get
    /// zero, which the weight fallback chain treats as "unset".
    pub fn profitability(
        &self,
        info: &MiningInfo,
        coin: Coin,
        block_reward_override: Option<f64>,
    ) -> f64 {
        let Some(rate) = self.rate(coin) else {
            return 0.0;
        };
        let reward = block_reward_override
            .unwrap_or_else(|| coin.block_reward(info.height, self.use_eco_block_rewards));
        let net_diff = info.net_diff().max(1) as f64;
        ((1024.0f64.powi(2) / net_diff) * 100.0 * reward * rate).round()
    }

    fn rate(&self, coin: Coin) -> Option<f64> {
        let id = coin.ticker_id()?;
        self.rates.read().get(id).copied()
    }

    #[cfg(test)]
    pub(crate) fn set_rate(&self, id: &str, usd: f64) {
        self.rates.write().insert(id.to_string(), usd);
    }

    async fn refresh(&self) -> Result<()> {
        #[derive(Deserialize)]
        struct Quote {
            usd: f64,
        }

        let ids = "bitcoin-hd,signum";
        let quotes: HashMap<String, Quote> = self
            .http
            .get(TICKER_URL)
            .query(&[("ids", ids), ("vs_currencies", "usd")])
            .timeout(Duration::from_secs(20))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let mut rates = self.rates.write();
        for (id, quote) in quotes {
            rates.insert(id, quote.usd);
        }
        Ok(())
    }

    /// Refresh loop: once at startup, then every five minutes. Rate
    /// failures are logged and retried next interval; stale rates beat
    /// no rates.
    pub async fn task(self: Arc<Self>, shutdown: CancellationToken) {
        let mut tick = tokio::time::interval(REFRESH_INTERVAL);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = tick.tick() => {
                    match self.refresh().await {
                        Ok(()) => trace!("Refreshed coin rates"),
                        Err(err) => debug!(error = %err, "Rate refresh failed"),
                    }
                }
                _ = shutdown.cancelled() => return,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(height: u64, base_target: u64, coin: Coin) -> MiningInfo {
        MiningInfo {
            height,
            base_target,
            generation_signature: "00".repeat(32),
            target_deadline: None,
            mining_halted: false,
            coin: Some(coin),
        }
    }

    #[test]
    fn unpriced_coin_is_worth_zero() {
        let service = ProfitabilityService::new(false);
        assert_eq!(
            service.profitability(&info(1, 4000, Coin::Bhd), Coin::Bhd, None),
            0.0
        );
    }

    #[test]
    fn weight_follows_rate_and_difficulty() {
        let service = ProfitabilityService::new(false);
        service.set_rate("bitcoin-hd", 2.0);
        let i = info(1, 4000, Coin::Bhd);
        let expected =
            ((1024.0f64.powi(2) / i.net_diff() as f64) * 100.0 * 14.25 * 2.0).round();
        assert_eq!(service.profitability(&i, Coin::Bhd, None), expected);

        // Pinned block reward overrides the table.
        let pinned = service.profitability(&i, Coin::Bhd, Some(28.5));
        assert_eq!(pinned, expected * 2.0);
    }

    #[test]
    fn eco_rewards_are_smaller() {
        let full = ProfitabilityService::new(false);
        let eco = ProfitabilityService::new(true);
        full.set_rate("bitcoin-hd", 1.0);
        eco.set_rate("bitcoin-hd", 1.0);
        let i = info(1, 4000, Coin::Bhd);
        assert!(
            eco.profitability(&i, Coin::Bhd, None) < full.profitability(&i, Coin::Bhd, None)
        );
    }
}
