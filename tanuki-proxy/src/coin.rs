//! Per-coin constants and numeric adjustment rules.
//!
//! Each upstream is tagged with the coin it mines. The coin selects the
//! zero-block base target used for network-difficulty math, the chain's
//! block time, and the (chain-specific) transforms applied to deadlines
//! and difficulties before they are compared or displayed.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Coins the proxy knows difficulty constants for.
///
/// Unknown coins still work; they just fall back to the default constants.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
#[serde(rename_all = "UPPERCASE")]
pub enum Coin {
    Bhd,
    Burst,
    Signa,
    Lhd,
    Hdd,
    Xhd,
    Aeth,
    Btb,
}

impl Coin {
    /// Base target of the chain's genesis block, used to derive network
    /// difficulty from a round's base target.
    pub fn block_zero_base_target(self) -> u64 {
        match self {
            Coin::Bhd => 24_433_591_728,
            Coin::Aeth | Coin::Lhd | Coin::Hdd | Coin::Xhd => 14_660_155_037,
            _ => 18_325_193_796,
        }
    }

    /// Target block time in seconds.
    pub fn block_time(self) -> u64 {
        240
    }

    /// Adjust a base-target-normalized deadline for display and best-DL
    /// comparison.
    ///
    /// BURST and SIGNA compress raw seconds into block-time units with a
    /// logarithmic transform; every other chain reports deadlines as-is.
    pub fn modify_deadline(self, deadline: u64) -> u64 {
        match self {
            Coin::Burst | Coin::Signa => {
                if deadline == 0 {
                    return 0;
                }
                let block_time = self.block_time() as f64;
                ((deadline as f64).ln() * (block_time / block_time.ln())).floor() as u64
            }
            _ => deadline,
        }
    }

    /// Adjust a raw network difficulty for this chain.
    ///
    /// BURST and SIGNA carry an extra 1.83 scaling factor.
    pub fn modify_net_diff(self, net_diff: u64) -> u64 {
        match self {
            Coin::Burst | Coin::Signa => (net_diff as f64 / 1.83).round() as u64,
            _ => net_diff,
        }
    }

    /// Block reward at the given height, used by the profitability
    /// service when the config doesn't pin one.
    pub fn block_reward(self, height: u64, eco: bool) -> f64 {
        match self {
            Coin::Bhd => {
                if eco {
                    4.5
                } else {
                    14.25
                }
            }
            Coin::Burst | Coin::Signa => {
                // Reward decays 5% per 10800-block "month".
                let month = (height / 10_800) as i32;
                (10_000.0 * 0.95_f64.powi(month)).floor()
            }
            Coin::Lhd => {
                if eco {
                    10.0
                } else {
                    92.0
                }
            }
            Coin::Hdd => {
                if eco {
                    110.0
                } else {
                    2_200.0
                }
            }
            Coin::Xhd => {
                if eco {
                    1_500.0
                } else {
                    150_000.0
                }
            }
            _ => 0.0,
        }
    }

    /// Identifier on the external rate ticker, if the coin is listed.
    pub fn ticker_id(self) -> Option<&'static str> {
        match self {
            Coin::Bhd => Some("bitcoin-hd"),
            Coin::Burst | Coin::Signa => Some("signum"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use test_case::test_case;

    #[test_case(Coin::Bhd => 24_433_591_728; "bhd")]
    #[test_case(Coin::Lhd => 14_660_155_037; "lhd")]
    #[test_case(Coin::Xhd => 14_660_155_037; "xhd")]
    #[test_case(Coin::Signa => 18_325_193_796; "signa")]
    fn block_zero_base_target(coin: Coin) -> u64 {
        coin.block_zero_base_target()
    }

    #[test]
    fn deadline_compression_is_logarithmic_for_signa() {
        // floor(ln(3003) * 240 / ln(240)) = floor(350.67..) = 350
        assert_eq!(Coin::Signa.modify_deadline(3003), 350);
        // Degenerate inputs must not panic or go negative.
        assert_eq!(Coin::Signa.modify_deadline(0), 0);
        assert_eq!(Coin::Signa.modify_deadline(1), 0);
    }

    #[test]
    fn deadline_unchanged_for_other_chains() {
        assert_eq!(Coin::Bhd.modify_deadline(3003), 3003);
        assert_eq!(Coin::Hdd.modify_deadline(0), 0);
    }

    #[test]
    fn net_diff_scaling() {
        assert_eq!(Coin::Signa.modify_net_diff(183), 100);
        assert_eq!(Coin::Bhd.modify_net_diff(183), 183);
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!(Coin::from_str("bhd").unwrap(), Coin::Bhd);
        assert_eq!(Coin::from_str("SIGNA").unwrap(), Coin::Signa);
        assert_eq!(Coin::Bhd.to_string(), "BHD");
    }

    #[test]
    fn signa_reward_decays_monthly() {
        assert_eq!(Coin::Signa.block_reward(0, false), 10_000.0);
        assert_eq!(Coin::Signa.block_reward(10_800, false), 9_500.0);
        assert_eq!(Coin::Signa.block_reward(21_600, false), 9_025.0);
    }
}
