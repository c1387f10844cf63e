use crate::config::Config;
use ember_consensus_core::config::Params;

/// How far ahead of the wall clock the staker searches for a kernel, seconds.
pub const MAX_STAKE_LOOKAHEAD: u64 = 960;

/// Contract inclusions are refused this close to the build deadline, seconds.
pub const BYTECODE_TIME_BUFFER: u64 = 6;

/// Slack kept between the stake timestamp and the deadline, seconds.
pub const STAKE_TIME_BUFFER: u64 = 2;

/// Staker polling period, milliseconds.
pub const STAKER_POLLING_PERIOD: u64 = 5_000;

/// Polling period when mining with minimum difficulty, milliseconds.
/// Sleeping longer avoids creating blocks every few seconds.
pub const STAKER_POLLING_PERIOD_MIN_DIFFICULTY: u64 = 20_000;

/// Wait between attempts to produce a valid block, milliseconds.
pub const STAKER_WAIT_FOR_VALID_BLOCK: u64 = 3_000;

/// Wait between polls for the best block header, milliseconds.
pub const STAKER_WAIT_FOR_BEST_BLOCK_HEADER: u64 = 250;

/// Height-dependent staker timing constants. After the reduce-block-time
/// fork the target spacing shrinks, so every derived constant is divided by
/// the timestamp downscale factor, floored at one.
#[derive(Clone, Debug)]
pub struct StakerTiming {
    downscale: u64,
    pub max_stake_lookahead: u64,
    pub bytecode_time_buffer: u64,
    pub stake_time_buffer: u64,
    pub miner_sleep: u64,
    pub wait_for_valid_block: u64,
    pub wait_for_best_block_header: u64,
}

impl Default for StakerTiming {
    fn default() -> Self {
        Self {
            downscale: 1,
            max_stake_lookahead: MAX_STAKE_LOOKAHEAD,
            bytecode_time_buffer: BYTECODE_TIME_BUFFER,
            stake_time_buffer: STAKE_TIME_BUFFER,
            miner_sleep: STAKER_POLLING_PERIOD,
            wait_for_valid_block: STAKER_WAIT_FOR_VALID_BLOCK,
            wait_for_best_block_header: STAKER_WAIT_FOR_BEST_BLOCK_HEADER,
        }
    }
}

impl StakerTiming {
    /// Recomputes the derived constants when the downscale factor changes at
    /// `height`. The lookahead is additionally clamped by the target spacing.
    pub fn update(&mut self, height: u64, params: &Params, min_difficulty: bool) {
        let downscale = params.timestamp_downscale_factor(height);
        if self.downscale != downscale {
            self.downscale = downscale;
            let target_spacing = params.target_spacing(height);
            self.max_stake_lookahead = (MAX_STAKE_LOOKAHEAD / downscale).max(1).min(target_spacing);
            self.bytecode_time_buffer = (BYTECODE_TIME_BUFFER / downscale).max(1);
            self.stake_time_buffer = (STAKE_TIME_BUFFER / downscale).max(1);
            self.miner_sleep = (STAKER_POLLING_PERIOD / downscale).max(1);
            self.wait_for_valid_block = (STAKER_WAIT_FOR_VALID_BLOCK / downscale).max(1);
        }

        if min_difficulty && self.miner_sleep != STAKER_POLLING_PERIOD_MIN_DIFFICULTY {
            self.miner_sleep = STAKER_POLLING_PERIOD_MIN_DIFFICULTY;
        }
    }
}

/// Whether this node may stake at all: the operator switch, negated on
/// signet where PoW blocks come from an authorized signer.
pub fn can_stake(config: &Config, params: &Params) -> bool {
    config.staking && !params.signet
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_downscales_after_fork() {
        let params = Params::mainnet();
        let mut timing = StakerTiming::default();

        timing.update(params.reduce_block_time_height - 1, &params, false);
        assert_eq!(timing.miner_sleep, STAKER_POLLING_PERIOD);
        assert_eq!(timing.bytecode_time_buffer, BYTECODE_TIME_BUFFER);

        timing.update(params.reduce_block_time_height, &params, false);
        assert_eq!(timing.miner_sleep, STAKER_POLLING_PERIOD / 4);
        assert_eq!(timing.bytecode_time_buffer, (BYTECODE_TIME_BUFFER / 4).max(1));
        // The lookahead is clamped by the (downscaled) target spacing
        assert_eq!(timing.max_stake_lookahead, params.target_spacing(params.reduce_block_time_height).min(MAX_STAKE_LOOKAHEAD / 4));
    }

    #[test]
    fn test_min_difficulty_overrides_polling() {
        let params = Params::regtest();
        let mut timing = StakerTiming::default();
        timing.update(1, &params, true);
        assert_eq!(timing.miner_sleep, STAKER_POLLING_PERIOD_MIN_DIFFICULTY);
    }

    #[test]
    fn test_can_stake_negated_on_signet() {
        let mut params = Params::mainnet();
        let config = Config::default();
        assert!(can_stake(&config, &params));
        params.signet = true;
        assert!(!can_stake(&config, &params));
        params.signet = false;
        let disabled = Config { staking: false, ..Config::default() };
        assert!(!can_stake(&disabled, &params));
    }
}
