use crate::{config::Config, mempool::Mempool, staker::StakerTiming};
use ember_consensus_core::{
    api::{ChainApi, ChainTip},
    block::BlockTemplate,
    tx::{Transaction, TransactionId},
    vm::{ContractVm, ExecutionResult},
};
use std::collections::HashSet;

pub mod builder;
pub mod contracts;
pub(crate) mod overlay;
pub mod policy;
pub mod selector;

use policy::Policy;

/// Assembles candidate blocks from the mempool: selects fee-ordered
/// transaction packages, speculatively executes contract transactions, and
/// finalizes a self-validated template for the miner or staker.
///
/// The chain handle and the mempool reference must be read handles acquired
/// under the node's chain-state and mempool locks for the whole build; the
/// assembler itself performs no locking.
pub struct BlockAssembler<'a> {
    chain: &'a dyn ChainApi,
    vm: &'a dyn ContractVm,
    mempool: Option<&'a Mempool>,
    config: &'a Config,
    policy: Policy,
    timing: StakerTiming,

    // State of the build in progress
    template: BlockTemplate,
    tip: ChainTip,
    in_block: HashSet<TransactionId>,
    block_weight: u64,
    block_sigops: i64,
    block_tx_count: u64,
    fees: i64,
    height: u64,
    lock_time_cutoff: u64,
    time_limit: u64,
    proof_of_stake: bool,
    /// The reward transaction as seeded before selection; every refund
    /// rebuild starts over from this capture.
    original_reward_tx: Transaction,
    /// Accumulated contract execution outcome of the block.
    bce_result: ExecutionResult,

    last_block_num_txs: Option<u64>,
    last_block_weight: Option<u64>,
}

impl<'a> BlockAssembler<'a> {
    pub fn new(chain: &'a dyn ChainApi, vm: &'a dyn ContractVm, mempool: Option<&'a Mempool>, config: &'a Config) -> Self {
        let policy = Policy::new(config, chain.dgp_limits());
        let tip = chain.tip();
        Self {
            chain,
            vm,
            mempool,
            config,
            policy,
            timing: StakerTiming::default(),
            template: BlockTemplate::new(),
            tip,
            in_block: HashSet::new(),
            block_weight: 0,
            block_sigops: 0,
            block_tx_count: 0,
            fees: 0,
            height: 0,
            lock_time_cutoff: 0,
            time_limit: 0,
            proof_of_stake: false,
            original_reward_tx: Transaction::default(),
            bce_result: ExecutionResult::default(),
            last_block_num_txs: None,
            last_block_weight: None,
        }
    }

    /// Transaction count of the most recently finalized template, reward
    /// transactions excluded.
    pub fn last_block_num_txs(&self) -> Option<u64> {
        self.last_block_num_txs
    }

    /// Weight consumed by the most recently finalized template, including
    /// the reserved coinbase headroom.
    pub fn last_block_weight(&self) -> Option<u64> {
        self.last_block_weight
    }
}
