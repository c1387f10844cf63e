/// Consensus parameters consulted by block assembly. The reduce-block-time
/// fork divides the target spacing (and every derived staker timing constant)
/// by `timestamp_downscale`.
#[derive(Clone, Debug)]
pub struct Params {
    pub pow_allow_min_difficulty_blocks: bool,
    /// Regtest: blocks are mined on demand and the template version may be
    /// overridden by the operator.
    pub mine_blocks_on_demand: bool,
    /// Signet produces PoW blocks through an authorized signer, so staking is
    /// disabled there.
    pub signet: bool,
    pub target_spacing_seconds: u64,
    pub reduce_block_time_height: u64,
    pub timestamp_downscale: u64,
}

impl Params {
    pub fn mainnet() -> Self {
        Self {
            pow_allow_min_difficulty_blocks: false,
            mine_blocks_on_demand: false,
            signet: false,
            target_spacing_seconds: 128,
            reduce_block_time_height: 845_000,
            timestamp_downscale: 4,
        }
    }

    pub fn regtest() -> Self {
        Self {
            pow_allow_min_difficulty_blocks: true,
            mine_blocks_on_demand: true,
            signet: false,
            reduce_block_time_height: 0,
            ..Self::mainnet()
        }
    }

    pub fn target_spacing(&self, height: u64) -> u64 {
        self.target_spacing_seconds / self.timestamp_downscale_factor(height)
    }

    pub fn timestamp_downscale_factor(&self, height: u64) -> u64 {
        if height >= self.reduce_block_time_height {
            self.timestamp_downscale
        } else {
            1
        }
    }
}

impl Default for Params {
    fn default() -> Self {
        Self::mainnet()
    }
}
