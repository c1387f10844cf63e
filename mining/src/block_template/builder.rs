use crate::block_template::{
    policy::{COINBASE_SIGOPS_RESERVE, COINBASE_WEIGHT_RESERVE},
    BlockAssembler,
};
use ember_consensus_core::{
    api::{ChainApi, ChainTip},
    block::{witness_commitment_index, Block, BlockTemplate},
    constants::WITNESS_SCALE_FACTOR,
    merkle::calc_block_merkle_root,
    script::{opcodes::OP_0, legacy_sigop_count, ScriptBuilder},
    tx::{ScriptPublicKey, Transaction, TransactionInput, TransactionOutpoint, TransactionOutput, SEQUENCE_FINAL},
    vm::ExecutionResult,
};
use ember_core::{debug, info, time::unix_now};
use ember_mining_errors::block_template::{BuilderError, BuilderResult};

impl<'a> BlockAssembler<'a> {
    fn reset_block(&mut self) {
        self.in_block.clear();

        // Reserve space for the coinbase
        self.block_weight = COINBASE_WEIGHT_RESERVE;
        self.block_sigops = COINBASE_SIGOPS_RESERVE;

        // These counters do not include the reward transactions
        self.block_tx_count = 0;
        self.fees = 0;

        self.bce_result = ExecutionResult::default();
        self.template = BlockTemplate::new();
    }

    /// Builds a new candidate block on top of the current tip.
    ///
    /// For proof-of-work, the coinbase pays `script_pub_key`. For
    /// proof-of-stake the caller provides the `coinstake` carrying the stake
    /// proof, placed right after an empty coinbase, and `tx_proof_time`
    /// seeds the header time. A non-zero `time_limit` (seconds since epoch)
    /// makes the contract sub-pass refuse inclusions close to the deadline.
    ///
    /// The finished template has passed contextual block validation against
    /// the tip; a validation failure means the assembler itself produced an
    /// invalid block and is returned as an error.
    pub fn create_new_block(
        &mut self,
        script_pub_key: ScriptPublicKey,
        proof_of_stake: bool,
        coinstake: Option<Transaction>,
        tx_proof_time: Option<u64>,
        time_limit: u64,
    ) -> BuilderResult<BlockTemplate> {
        let time_start = unix_now();

        self.reset_block();
        self.proof_of_stake = proof_of_stake;
        self.time_limit = time_limit;

        // Dummy reward slot, rewritten below and finalized at the end
        self.template.block.transactions.push(Transaction::default());
        self.template.tx_fees.push(-1);
        self.template.tx_sigops_cost.push(-1);

        let tip = self.chain.tip();
        self.tip = tip;
        self.height = tip.height + 1;
        self.timing.update(self.height, self.chain.params(), self.chain.params().pow_allow_min_difficulty_blocks);

        let mut version = self.chain.compute_block_version(&tip);
        if self.chain.params().mine_blocks_on_demand {
            // Mine-on-demand networks may override the version to test
            // forking scenarios
            version = self.config.block_version.unwrap_or(version);
        }
        self.template.block.header.version = version;

        let now = self.chain.adjusted_time();
        self.template.block.header.time = if proof_of_stake { tx_proof_time.unwrap_or(now) } else { now };
        self.lock_time_cutoff = tip.median_time_past;

        // Seed the reward transaction(s) before selection so every contract
        // inclusion has a reward transaction to rebuild
        if proof_of_stake {
            let coinstake = coinstake.ok_or(BuilderError::MissingCoinstake)?;
            self.template.block.transactions[0] = self.make_coinbase(ScriptPublicKey::default(), 0);
            self.template.block.transactions.push(coinstake.clone());
            self.template.tx_fees.push(-1);
            self.template.tx_sigops_cost.push(-1);
            self.original_reward_tx = coinstake;
        } else {
            let subsidy = self.chain.block_subsidy(self.height);
            let coinbase = self.make_coinbase(script_pub_key, subsidy);
            self.template.block.transactions[0] = coinbase.clone();
            self.original_reward_tx = coinbase;
        }

        let (packages_selected, descendants_updated) = match self.mempool {
            Some(mempool) => self.add_package_txs(mempool),
            None => (0, 0),
        };
        let time_selected = unix_now();

        self.last_block_num_txs = Some(self.block_tx_count);
        self.last_block_weight = Some(self.block_weight);

        // Fold the collected fees (and any contract refunds) into the reward
        // transaction, and let the sentinel carry the negated aggregate
        self.rebuild_refund_transaction();
        self.template.tx_fees[0] = -self.fees;

        self.template.coinbase_commitment = self.chain.generate_coinbase_commitment(&mut self.template.block, tip.hash);
        self.template.tx_sigops_cost[0] =
            WITNESS_SCALE_FACTOR as i64 * legacy_sigop_count(&self.template.block.transactions[0]);

        info!(
            "create_new_block(): block weight: {} txs: {} fees: {} sigops {}",
            self.template.block.weight(),
            self.block_tx_count,
            self.fees,
            self.block_sigops
        );

        // Fill in the header
        self.template.block.header.hash_prev_block = tip.hash;
        if proof_of_stake {
            // The stake proof fixes the time; only enforce the lower bound
            let header = &mut self.template.block.header;
            header.time = header.time.max(tip.median_time_past + 1);
        } else {
            update_block_time(self.chain, &tip, &mut self.template.block, proof_of_stake);
        }
        self.template.block.header.bits = self.chain.next_work_required(&tip, &self.template.block.header, proof_of_stake);
        self.template.block.header.nonce = 0;
        self.template.block.header.hash_merkle_root = calc_block_merkle_root(&self.template.block.transactions);

        self.chain.test_block_validity(&self.template.block, &tip)?;
        let time_validated = unix_now();

        debug!(
            "create_new_block() packages: {}ms ({} packages, {} updated descendants), validity: {}ms (total {}ms)",
            time_selected - time_start,
            packages_selected,
            descendants_updated,
            time_validated - time_selected,
            time_validated - time_start
        );

        Ok(std::mem::take(&mut self.template))
    }

    fn make_coinbase(&self, script_pub_key: ScriptPublicKey, value: u64) -> Transaction {
        let script_sig = ScriptBuilder::new().push_number(self.height as i64).push_opcode(OP_0).build();
        Transaction::new(
            2,
            vec![TransactionInput::new(TransactionOutpoint::null(), script_sig.to_vec(), SEQUENCE_FINAL)],
            vec![TransactionOutput::new(value, script_pub_key)],
            0,
        )
    }

    /// Rebuilds the reward transaction from its original capture: the value
    /// at the reward index becomes subsidy plus fees minus the gas refunded
    /// to contract senders, and all accumulated refund outputs are appended
    /// verbatim after the original outputs.
    pub(crate) fn rebuild_refund_transaction(&mut self) {
        // 0 for the coinbase in PoW, 1 for the coinstake in PoS
        let reward_index = if self.proof_of_stake { 1 } else { 0 };
        let mut reward = self.original_reward_tx.clone();
        let subsidy = self.chain.block_subsidy(self.height);
        let value = self.fees + subsidy as i64 - self.bce_result.refund_sender as i64;
        debug_assert!(value >= 0, "refunds cannot exceed subsidy plus fees");
        reward.outputs[reward_index].value = value as u64;
        reward.outputs.extend(self.bce_result.refund_outputs.iter().cloned());
        self.template.block.transactions[reward_index] = reward;
    }
}

/// Bumps the header time to the later of median-time-past + 1 and the
/// adjusted wall clock. On networks allowing min-difficulty blocks a time
/// change also changes the work required. Returns the applied delta.
pub fn update_block_time(chain: &dyn ChainApi, tip: &ChainTip, block: &mut Block, proof_of_stake: bool) -> i64 {
    let old_time = block.header.time;
    let new_time = (tip.median_time_past + 1).max(chain.adjusted_time());
    if old_time < new_time {
        block.header.time = new_time;
    }

    if chain.params().pow_allow_min_difficulty_blocks {
        block.header.bits = chain.next_work_required(tip, &block.header, proof_of_stake);
    }

    new_time as i64 - old_time as i64
}

/// Rebuilds the commitments of an externally edited block: strips the old
/// witness-commitment output from the coinbase, regenerates the commitment
/// against the recorded parent and recomputes the merkle root.
pub fn regenerate_commitments(block: &mut Block, chain: &dyn ChainApi) {
    if let Some(index) = witness_commitment_index(block) {
        block.transactions[0].outputs.remove(index);
    }
    let prev_hash = block.header.hash_prev_block;
    chain.generate_coinbase_commitment(block, prev_hash);
    block.header.hash_merkle_root = calc_block_merkle_root(&block.transactions);
}
