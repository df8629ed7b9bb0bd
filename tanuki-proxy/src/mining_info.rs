//! Round parameters as announced by an upstream.
//!
//! A `MiningInfo` is an immutable snapshot of one round: it is constructed
//! when an upstream reports new work and superseded, never mutated, by the
//! next round's snapshot.

use serde::{Deserialize, Serialize};

use crate::coin::Coin;

/// Identity of a round for duplicate suppression.
///
/// Two announcements describe the same round iff height AND base target
/// match. The generation signature is deliberately not part of the key:
/// pools re-push it out of order, and a legitimately repeated signature
/// must not make a new round look stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RoundKey {
    pub height: u64,
    pub base_target: u64,
}

/// One round's parameters, plus the coin tag used to select the
/// difficulty constants that apply to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiningInfo {
    pub height: u64,
    #[serde(rename = "baseTarget")]
    pub base_target: u64,
    #[serde(rename = "generationSignature")]
    pub generation_signature: String,

    /// Pool-imposed maximum deadline; absent means unbounded. Omitted from
    /// the miner-facing projection when absent -- some miner binaries choke
    /// on unexpected null keys.
    #[serde(rename = "targetDeadline", skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub target_deadline: Option<u64>,

    /// Set by pools that can pause mining for a round. Omitted when false
    /// for the same reason as `target_deadline`.
    #[serde(rename = "miningHalted", skip_serializing_if = "std::ops::Not::not")]
    #[serde(default)]
    pub mining_halted: bool,

    /// Not part of the wire format; attached from the upstream's config.
    #[serde(skip)]
    pub coin: Option<Coin>,
}

impl MiningInfo {
    /// Duplicate-suppression key for this round.
    pub fn round_key(&self) -> RoundKey {
        RoundKey {
            height: self.height,
            base_target: self.base_target,
        }
    }

    /// Network difficulty in TiB, derived from the base target.
    ///
    /// The zero-block base target is coin-specific; BURST/SIGNA divide by
    /// an additional 1.83.
    pub fn net_diff(&self) -> u64 {
        let base = match self.coin {
            Some(coin) => coin.block_zero_base_target(),
            None => Coin::Signa.block_zero_base_target(),
        };
        let raw = (base as f64 / self.base_target as f64).round() as u64;
        match self.coin {
            Some(coin) => coin.modify_net_diff(raw),
            None => raw,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(height: u64, base_target: u64) -> MiningInfo {
        MiningInfo {
            height,
            base_target,
            generation_signature: "ab".repeat(32),
            target_deadline: None,
            mining_halted: false,
            coin: Some(Coin::Bhd),
        }
    }

    #[test]
    fn round_key_ignores_generation_signature() {
        let mut a = info(100, 4000);
        let mut b = info(100, 4000);
        a.generation_signature = "aa".repeat(32);
        b.generation_signature = "bb".repeat(32);
        assert_eq!(a.round_key(), b.round_key());
        assert_ne!(info(100, 4000).round_key(), info(100, 4001).round_key());
        assert_ne!(info(100, 4000).round_key(), info(101, 4000).round_key());
    }

    #[test]
    fn net_diff_uses_coin_constant() {
        // BHD: 24433591728 / 4000 ≈ 6108398
        assert_eq!(info(1, 4000).net_diff(), 6_108_398);

        let mut signa = info(1, 100_000);
        signa.coin = Some(Coin::Signa);
        // 18325193796 / 100000 = 183252 (rounded), then / 1.83 = 100138
        assert_eq!(signa.net_diff(), 100_138);
    }

    #[test]
    fn projection_omits_absent_fields() {
        let value = serde_json::to_value(info(100, 4000)).unwrap();
        let obj = value.as_object().unwrap();
        assert!(obj.contains_key("height"));
        assert!(obj.contains_key("baseTarget"));
        assert!(obj.contains_key("generationSignature"));
        assert!(!obj.contains_key("targetDeadline"));
        assert!(!obj.contains_key("miningHalted"));
    }

    #[test]
    fn projection_keeps_present_fields() {
        let mut i = info(100, 4000);
        i.target_deadline = Some(86400);
        i.mining_halted = true;
        let value = serde_json::to_value(i).unwrap();
        assert_eq!(value["targetDeadline"], 86400);
        assert_eq!(value["miningHalted"], true);
    }
}
