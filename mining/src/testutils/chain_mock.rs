use ember_consensus_core::{
    api::{ChainApi, ChainTip, DgpLimits},
    block::Block,
    config::Params,
    constants::{BLOCK_VERSION, WITNESS_COMMITMENT_HEADER},
    errors::block::RuleError,
    header::Header,
    merkle::calc_block_merkle_root,
    script::opcodes::OP_RETURN,
    tx::{is_final_tx, ScriptPublicKey, TransactionOutput},
};
use ember_hashes::Hash;
use parking_lot::RwLock;

/// Chain-state stand-in: a fixed tip, configurable limits and subsidy, and a
/// structural `test_block_validity` covering the checks the assembler is
/// expected to satisfy (proof and merkle checks excluded).
pub(crate) struct ChainStateMock {
    params: Params,
    tip: ChainTip,
    limits: RwLock<DgpLimits>,
    subsidy: u64,
    adjusted_time: u64,
}

impl ChainStateMock {
    pub(crate) fn new(tip_height: u64, subsidy: u64) -> Self {
        let tip_time = 1_700_000_000;
        Self {
            params: Params::regtest(),
            tip: ChainTip { hash: Hash::new_unique(), height: tip_height, time: tip_time, median_time_past: tip_time - 60 },
            limits: RwLock::new(DgpLimits::default()),
            subsidy,
            adjusted_time: tip_time + 16,
        }
    }

    pub(crate) fn set_limits(&self, limits: DgpLimits) {
        *self.limits.write() = limits;
    }
}

impl ChainApi for ChainStateMock {
    fn tip(&self) -> ChainTip {
        self.tip
    }

    fn params(&self) -> &Params {
        &self.params
    }

    fn dgp_limits(&self) -> DgpLimits {
        *self.limits.read()
    }

    fn compute_block_version(&self, _tip: &ChainTip) -> u32 {
        BLOCK_VERSION
    }

    fn block_subsidy(&self, _height: u64) -> u64 {
        self.subsidy
    }

    fn next_work_required(&self, _tip: &ChainTip, _header: &Header, _proof_of_stake: bool) -> u32 {
        0x207f_ffff
    }

    fn generate_coinbase_commitment(&self, block: &mut Block, _prev_hash: Hash) -> Vec<u8> {
        let witness_root = calc_block_merkle_root(&block.transactions);
        let mut script = vec![OP_RETURN, 0x24];
        script.extend_from_slice(&WITNESS_COMMITMENT_HEADER);
        script.extend_from_slice(&witness_root.as_bytes());
        block.transactions[0].outputs.push(TransactionOutput::new(0, ScriptPublicKey::from_vec(script.clone())));
        script
    }

    fn adjusted_time(&self) -> u64 {
        self.adjusted_time
    }

    fn contract_script_flags(&self, _height: u64) -> u32 {
        0
    }

    fn test_block_validity(&self, block: &Block, tip: &ChainTip) -> Result<(), RuleError> {
        if block.transactions.is_empty() {
            return Err(RuleError::NoTransactions);
        }
        if !block.transactions[0].is_coinbase() {
            return Err(RuleError::FirstTxNotCoinbase);
        }
        let limits = self.dgp_limits();
        if block.weight() > limits.max_block_weight {
            return Err(RuleError::ExceedsMaxBlockWeight(block.weight(), limits.max_block_weight));
        }
        if block.header.time <= tip.median_time_past {
            return Err(RuleError::TimeTooOld(block.header.time, tip.median_time_past));
        }
        for tx in block.transactions.iter() {
            if !is_final_tx(tx, tip.height + 1, tip.median_time_past) {
                return Err(RuleError::NonFinalTransaction(tx.id()));
            }
        }
        Ok(())
    }
}
