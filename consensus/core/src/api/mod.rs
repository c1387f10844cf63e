use crate::{block::Block, config::Params, errors::block::RuleError, header::Header};
use ember_hashes::Hash;

/// A snapshot of the active chain tip taken at the start of a template build.
#[derive(Clone, Copy, Debug)]
pub struct ChainTip {
    pub hash: Hash,
    pub height: u64,
    pub time: u64,
    pub median_time_past: u64,
}

/// On-chain governed block resource limits together with the operator-tuned
/// gas ceilings the assembler enforces.
#[derive(Clone, Copy, Debug)]
pub struct DgpLimits {
    pub max_block_weight: u64,
    pub max_block_sigops: i64,
    /// Inclusion ceiling for the gas used by all contract transactions in a
    /// template. Never passed to the VM.
    pub soft_block_gas_limit: u64,
    /// Consensus execution ceiling, always handed to the VM.
    pub hard_block_gas_limit: u64,
    pub min_gas_price: u64,
    /// Per-transaction gas cap applied during template construction.
    pub tx_gas_limit: u64,
}

impl Default for DgpLimits {
    fn default() -> Self {
        Self {
            max_block_weight: 8_000_000,
            max_block_sigops: 80_000,
            soft_block_gas_limit: 40_000_000,
            hard_block_gas_limit: 40_000_000,
            min_gas_price: 40,
            tx_gas_limit: 40_000_000,
        }
    }
}

/// Read access to chain state and the consensus computations block assembly
/// depends on. Handed to the assembler as a pre-acquired read handle; the
/// assembler never mutates chain state through it (the single mutation,
/// `generate_coinbase_commitment`, touches only the candidate block).
pub trait ChainApi {
    fn tip(&self) -> ChainTip;

    fn params(&self) -> &Params;

    fn dgp_limits(&self) -> DgpLimits;

    /// The version-bits block version for a block on top of `tip`.
    fn compute_block_version(&self, tip: &ChainTip) -> u32;

    fn block_subsidy(&self, height: u64) -> u64;

    /// The required difficulty for `header` extending `tip`.
    fn next_work_required(&self, tip: &ChainTip, header: &Header, proof_of_stake: bool) -> u32;

    /// Appends the witness-commitment output to the block's coinbase and
    /// returns the commitment bytes.
    fn generate_coinbase_commitment(&self, block: &mut Block, prev_hash: Hash) -> Vec<u8>;

    /// Network-adjusted wall clock, in seconds.
    fn adjusted_time(&self) -> u64;

    /// Script verification flags applying to contract outputs at `height`.
    fn contract_script_flags(&self, height: u64) -> u32;

    /// Full contextual validation of a candidate block against `tip`,
    /// excluding the proof (PoW/PoS) and merkle checks.
    fn test_block_validity(&self, block: &Block, tip: &ChainTip) -> Result<(), RuleError>;
}
