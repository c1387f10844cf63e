use crate::{block_template::BlockAssembler, mempool::model::tx::MempoolEntry};
use ember_consensus_core::{
    constants::WITNESS_SCALE_FACTOR,
    script::legacy_sigop_count,
    tx::transaction_weight,
};
use ember_core::info;

impl<'a> BlockAssembler<'a> {
    /// Attempts to add a contract-bearing transaction to the block.
    ///
    /// The execution runs against the globally shared contract state, so
    /// both state roots are captured first and restored on every rejection
    /// past that point. Weight and sigops are tried on local copies; only a
    /// fully budgeted attempt is committed to the template.
    pub(crate) fn attempt_to_add_contract(&mut self, entry: &MempoolEntry, min_gas_price: u64) -> bool {
        let tx_id = entry.id();

        if self.time_limit != 0 && self.chain.adjusted_time() >= self.time_limit.saturating_sub(self.timing.bytecode_time_buffer) {
            // Too close to the deadline for bytecode execution; the entry is
            // not marked failed since time keeps advancing
            return false;
        }
        if self.config.disable_contract_staking {
            // Contract staking is disabled for the staker
            return false;
        }

        let old_state_root = self.vm.state_root();
        let old_utxo_root = self.vm.utxo_root();
        // Operate on local copies first, apply to the template on commit
        let mut block_weight = self.block_weight;
        let mut block_sigops = self.block_sigops;

        let contract_flags = self.chain.contract_script_flags(self.height);
        let contract_txs = match self.vm.extract_transactions(&entry.tx, &self.template.block.transactions, contract_flags) {
            Ok(contract_txs) => contract_txs,
            Err(err) => {
                // This check already happens at mempool acceptance, so it can
                // only be triggered by raw transactions on the staker itself
                info!("attempt_to_add_contract(): fail to extract contracts from tx {}: {}", tx_id, err);
                return false;
            }
        };

        let mut tx_gas: u64 = 0;
        for contract_tx in contract_txs.iter() {
            tx_gas += contract_tx.gas();
            if tx_gas > self.policy.tx_gas_limit {
                // Cap the gas a single transaction may consume in a template
                info!("attempt_to_add_contract(): the gas needed exceeds the staker tx gas limit for the contract tx {}", tx_id);
                return false;
            }
            if self.bce_result.used_gas + contract_tx.gas() > self.policy.soft_block_gas_limit {
                // This transaction's gas allowance could push the block over
                // the soft gas limit; log only when it is the lone contract tx
                if self.bce_result.used_gas == 0 {
                    info!(
                        "attempt_to_add_contract(): the gas needed exceeds the soft block gas limit for the contract tx {}",
                        tx_id
                    );
                }
                return false;
            }
            if contract_tx.gas_price < min_gas_price {
                info!("attempt_to_add_contract(): the gas price is below the required minimum for the contract tx {}", tx_id);
                return false;
            }
        }

        // The VM gets the governed block gas limit, not the soft one: the
        // execution ceiling is consensus critical
        let result = match self.vm.execute(&contract_txs, self.policy.hard_block_gas_limit, &self.tip) {
            Ok(result) => result,
            Err(err) => {
                self.vm.set_state_root(old_state_root);
                self.vm.set_utxo_root(old_utxo_root);
                info!("attempt_to_add_contract(): bytecode execution fails for the contract tx {}: {}", tx_id, err);
                return false;
            }
        };

        if self.bce_result.used_gas + result.used_gas > self.policy.soft_block_gas_limit {
            self.vm.set_state_root(old_state_root);
            self.vm.set_utxo_root(old_utxo_root);
            if self.bce_result.used_gas == 0 {
                info!("attempt_to_add_contract(): the gas used exceeds the soft block gas limit for the contract tx {}", tx_id);
            }
            return false;
        }

        // Apply the contract tx costs to the local counters
        block_weight += entry.weight;
        block_sigops += entry.sigop_cost;
        // ... and the value transfers the execution produced
        for transfer in result.value_transfers.iter() {
            block_weight += transaction_weight(transfer);
            block_sigops += legacy_sigop_count(transfer);
        }

        let reward_index = if self.proof_of_stake { 1 } else { 0 };

        // Trial-rebuild the reward transaction to account for its sigop delta
        block_sigops -= legacy_sigop_count(&self.template.block.transactions[reward_index]);
        let mut trial_reward = self.template.block.transactions[reward_index].clone();
        trial_reward.outputs.extend(result.refund_outputs.iter().cloned());
        block_sigops += legacy_sigop_count(&trial_reward);

        // Reject when the block would become too heavy or expensive with
        // this contract execution
        if block_sigops * WITNESS_SCALE_FACTOR as i64 > self.policy.max_block_sigops || block_weight > self.policy.max_block_weight
        {
            self.vm.set_state_root(old_state_root);
            self.vm.set_utxo_root(old_utxo_root);
            return false;
        }

        // Commit: fold the execution outcome into the block state
        self.bce_result.used_gas += result.used_gas;
        self.bce_result.refund_sender += result.refund_sender;
        self.bce_result.refund_outputs.extend(result.refund_outputs);

        self.template.block.transactions.push((*entry.tx).clone());
        self.template.tx_fees.push(entry.fee as i64);
        self.template.tx_sigops_cost.push(entry.sigop_cost);
        self.block_weight += entry.weight;
        self.block_tx_count += 1;
        self.block_sigops += entry.sigop_cost;
        self.fees += entry.fee as i64;
        self.in_block.insert(tx_id);

        for transfer in result.value_transfers {
            let sigops = legacy_sigop_count(&transfer);
            self.block_weight += transaction_weight(&transfer);
            self.block_sigops += sigops;
            self.block_tx_count += 1;
            self.template.tx_fees.push(0);
            self.template.tx_sigops_cost.push(sigops);
            self.template.block.transactions.push(transfer);
        }

        // Swap in the rebuilt reward transaction, tracking its sigop delta
        self.block_sigops -= legacy_sigop_count(&self.template.block.transactions[reward_index]);
        self.rebuild_refund_transaction();
        self.block_sigops += legacy_sigop_count(&self.template.block.transactions[reward_index]);

        true
    }
}
