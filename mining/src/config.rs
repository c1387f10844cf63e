use ember_consensus_core::constants::COIN;
use std::fmt::{Display, Formatter};

pub const DEFAULT_BLOCK_MAX_WEIGHT: u64 = 7_996_000;

/// Default floor fee rate for template inclusion, in base units per kvB.
pub const DEFAULT_BLOCK_MIN_TX_FEE: i64 = 400_000;

pub const DEFAULT_PRINT_PRIORITY: bool = false;
pub const DEFAULT_STAKE: bool = true;

/// Operator options steering block assembly, the struct form of the node's
/// `-blockmaxweight`, `-blockmintxfee`, `-blockversion`,
/// `-disablecontractstaking`, `-printpriority` and `-staking` flags.
#[derive(Clone, Debug)]
pub struct Config {
    /// Requested block weight ceiling; clamped against the governed maximum
    /// when a build starts.
    pub block_max_weight: u64,
    /// Minimum package fee rate admitted into a template, per kvB.
    pub block_min_tx_fee: i64,
    /// Header version override, honored on mine-on-demand networks only.
    pub block_version: Option<u32>,
    /// Refuse every contract inclusion.
    pub disable_contract_staking: bool,
    /// Log fee rate and id of every included transaction.
    pub print_priority: bool,
    /// Master staking switch.
    pub staking: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            block_max_weight: DEFAULT_BLOCK_MAX_WEIGHT,
            block_min_tx_fee: DEFAULT_BLOCK_MIN_TX_FEE,
            block_version: None,
            disable_contract_staking: false,
            print_priority: DEFAULT_PRINT_PRIORITY,
            staking: DEFAULT_STAKE,
        }
    }
}

/// Fee per 1000 virtual bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct FeeRate {
    base_units_per_kvb: i64,
}

impl FeeRate {
    pub fn new(base_units_per_kvb: i64) -> Self {
        Self { base_units_per_kvb }
    }

    /// The rate paid by a transaction of `size` vbytes carrying `fee`.
    pub fn from_total(fee: i64, size: u64) -> Self {
        if size == 0 {
            return Self::new(0);
        }
        Self::new(fee * 1000 / size as i64)
    }

    /// Fee a transaction of `size` vbytes must carry to meet this rate.
    /// A positive rate never rounds down to a zero fee.
    pub fn fee(&self, size: u64) -> i64 {
        let fee = self.base_units_per_kvb * size as i64 / 1000;
        if fee == 0 && size != 0 && self.base_units_per_kvb > 0 {
            return 1;
        }
        fee
    }
}

impl Display for FeeRate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let coin = COIN as i64;
        write!(f, "{}.{:08} EMB/kvB", self.base_units_per_kvb / coin, (self.base_units_per_kvb % coin).abs())
    }
}
