use crate::config::{Config, FeeRate};
use ember_consensus_core::{api::DgpLimits, constants::WITNESS_SCALE_FACTOR};

/// Weight reserved for the coinbase before any package is considered.
pub const COINBASE_WEIGHT_RESERVE: u64 = 4_000;

/// Sigops cost reserved for the coinbase.
pub const COINBASE_SIGOPS_RESERVE: i64 = 400;

/// Policy houses the resource limits controlling the generation of a block
/// template: the operator's clamped weight target, the governed hard caps,
/// and the gas budgets of the contract sub-pass.
#[derive(Clone, Debug)]
pub struct Policy {
    /// Operator weight target, clamped into
    /// `[COINBASE_WEIGHT_RESERVE, max_block_weight - COINBASE_WEIGHT_RESERVE]`.
    pub block_max_weight: u64,
    /// Governed block weight cap (consensus).
    pub max_block_weight: u64,
    /// Governed block sigops cap (consensus).
    pub max_block_sigops: i64,
    pub soft_block_gas_limit: u64,
    pub hard_block_gas_limit: u64,
    pub min_gas_price: u64,
    pub tx_gas_limit: u64,
    pub min_fee_rate: FeeRate,
}

impl Policy {
    pub fn new(config: &Config, limits: DgpLimits) -> Self {
        // Limit weight for sanity: at least one coinbase reserve, and room
        // left under the governed cap for the coinbase itself
        let block_max_weight =
            config.block_max_weight.clamp(COINBASE_WEIGHT_RESERVE, limits.max_block_weight - COINBASE_WEIGHT_RESERVE);
        Self {
            block_max_weight,
            max_block_weight: limits.max_block_weight,
            max_block_sigops: limits.max_block_sigops,
            soft_block_gas_limit: limits.soft_block_gas_limit,
            hard_block_gas_limit: limits.hard_block_gas_limit,
            min_gas_price: limits.min_gas_price,
            tx_gas_limit: limits.tx_gas_limit,
            min_fee_rate: FeeRate::new(config.block_min_tx_fee),
        }
    }

    /// Would a package of `package_size` vbytes and `package_sigops` still
    /// fit into a block currently at `block_weight`/`block_sigops`? The
    /// non-strict comparisons deliberately reserve one unit of headroom.
    pub fn test_package(&self, block_weight: u64, block_sigops: i64, package_size: u64, package_sigops: i64) -> bool {
        if block_weight + WITNESS_SCALE_FACTOR * package_size >= self.block_max_weight {
            return false;
        }
        if block_sigops + package_sigops >= self.max_block_sigops {
            return false;
        }
        true
    }
}
