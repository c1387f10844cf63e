#[cfg(test)]
mod tests {
    use crate::{
        block_template::{builder::regenerate_commitments, BlockAssembler},
        config::Config,
        mempool::Mempool,
        testutils::{chain_mock::ChainStateMock, vm_mock::ContractVmMock},
    };
    use ember_consensus_core::{
        api::{ChainApi, DgpLimits},
        block::{witness_commitment_index, BlockTemplate},
        constants::{COIN, WITNESS_COMMITMENT_HEADER},
        script::opcodes::{OP_CREATE, OP_RETURN, OP_TRUE},
        tx::{
            ScriptPublicKey, Transaction, TransactionId, TransactionInput, TransactionOutpoint, TransactionOutput,
            SEQUENCE_FINAL,
        },
        vm::{ContractVm, ExecutionResult, VmError},
    };
    use ember_hashes::{DoubleSha256, Hash};
    use ember_mining_errors::block_template::BuilderError;
    use std::sync::Arc;

    const TIP_HEIGHT: u64 = 100;
    const SUBSIDY: u64 = 50 * COIN;

    fn miner_script() -> ScriptPublicKey {
        ScriptPublicKey::from_vec(vec![OP_TRUE])
    }

    fn open_config() -> Config {
        // No fee floor, so tests control inclusion purely through fee rates
        Config { block_min_tx_fee: 0, ..Config::default() }
    }

    /// A transaction spending the given outpoints, padded to `target_size`
    /// virtual bytes.
    fn tx_spending(parents: &[(TransactionId, u32)], target_size: u64) -> Arc<Transaction> {
        let inputs = parents
            .iter()
            .map(|(id, index)| TransactionInput::new(TransactionOutpoint::new(*id, *index), vec![], SEQUENCE_FINAL))
            .collect();
        let outputs = vec![TransactionOutput::new(1_000, ScriptPublicKey::from_vec(vec![OP_TRUE]))];
        let mut tx = Transaction::new(2, inputs, outputs, 0);
        let mut pad = target_size.saturating_sub(tx.serialized_size());
        for _ in 0..3 {
            tx.inputs[0].signature_script = vec![0u8; pad as usize];
            let size = tx.serialized_size();
            if size >= target_size {
                break;
            }
            pad += target_size - size;
        }
        Arc::new(tx)
    }

    fn independent_tx(target_size: u64) -> Arc<Transaction> {
        tx_spending(&[(Hash::new_unique(), 0)], target_size)
    }

    /// A contract-carrying transaction: one output script holds OP_CREATE.
    fn contract_tx(target_size: u64) -> Arc<Transaction> {
        let mut tx = (*tx_spending(&[(Hash::new_unique(), 0)], target_size)).clone();
        tx.outputs.push(TransactionOutput::new(0, ScriptPublicKey::from_vec(vec![OP_CREATE])));
        Arc::new(tx)
    }

    fn coinstake_paying(script: ScriptPublicKey) -> Transaction {
        Transaction::new(
            2,
            vec![TransactionInput::new(TransactionOutpoint::new(Hash::new_unique(), 0), vec![0u8; 80], SEQUENCE_FINAL)],
            vec![TransactionOutput::new(0, ScriptPublicKey::default()), TransactionOutput::new(0, script)],
            0,
        )
    }

    fn included_ids(template: &BlockTemplate) -> Vec<TransactionId> {
        template.block.transactions.iter().skip(1).map(|tx| tx.id()).collect()
    }

    fn dirtied(root: Hash, id: TransactionId) -> Hash {
        let mut hasher = DoubleSha256::new();
        hasher.update(root).update(id);
        hasher.finalize()
    }

    // An empty mempool yields a lone-coinbase template paying the full
    // subsidy, with the reserved weight intact.
    #[test]
    fn test_empty_mempool_pow_template() {
        let chain = ChainStateMock::new(TIP_HEIGHT, SUBSIDY);
        let vm = ContractVmMock::new();
        let mempool = Mempool::new();
        let config = open_config();
        let mut assembler = BlockAssembler::new(&chain, &vm, Some(&mempool), &config);

        let template = assembler.create_new_block(miner_script(), false, None, None, 0).unwrap();

        assert_eq!(template.block.transactions.len(), 1);
        let coinbase = &template.block.transactions[0];
        assert!(coinbase.is_coinbase());
        assert_eq!(coinbase.outputs[0].value, SUBSIDY);
        assert_eq!(template.total_fees(), 0);
        assert_eq!(template.tx_fees, vec![0]);
        assert_eq!(assembler.last_block_num_txs(), Some(0));
        assert_eq!(assembler.last_block_weight(), Some(4_000));
        assert!(witness_commitment_index(&template.block).is_some());
    }

    // Independent transactions are included in decreasing fee rate order and
    // their fees all flow into the coinbase.
    #[test]
    fn test_feerate_ordering_of_independent_txs() {
        let chain = ChainStateMock::new(TIP_HEIGHT, SUBSIDY);
        let vm = ContractVmMock::new();
        let mut mempool = Mempool::new();
        let config = open_config();

        let tx_low = independent_tx(250);
        let tx_mid = independent_tx(250);
        let tx_high = independent_tx(250);
        mempool.add_transaction(tx_low.clone(), 1, 0, 1, None).unwrap();
        mempool.add_transaction(tx_high.clone(), 10, 0, 1, None).unwrap();
        mempool.add_transaction(tx_mid.clone(), 5, 0, 1, None).unwrap();

        let mut assembler = BlockAssembler::new(&chain, &vm, Some(&mempool), &config);
        let template = assembler.create_new_block(miner_script(), false, None, None, 0).unwrap();

        assert_eq!(included_ids(&template), vec![tx_high.id(), tx_mid.id(), tx_low.id()]);
        assert_eq!(template.block.transactions[0].outputs[0].value, SUBSIDY + 16);
        assert_eq!(template.total_fees(), 16);
    }

    // A zero-fee parent rides in on its high-fee child: the package feerate
    // beats a mid-fee standalone transaction, and within the package the
    // parent precedes the child.
    #[test]
    fn test_package_selection_orders_parent_before_child() {
        let chain = ChainStateMock::new(TIP_HEIGHT, SUBSIDY);
        let vm = ContractVmMock::new();
        let mut mempool = Mempool::new();
        let config = open_config();

        let parent = independent_tx(250);
        let child = tx_spending(&[(parent.id(), 0)], 250);
        let standalone = independent_tx(250);
        mempool.add_transaction(parent.clone(), 0, 0, 1, None).unwrap();
        mempool.add_transaction(child.clone(), 20_000, 0, 1, None).unwrap();
        mempool.add_transaction(standalone.clone(), 8_000, 0, 1, None).unwrap();

        let mut assembler = BlockAssembler::new(&chain, &vm, Some(&mempool), &config);
        let template = assembler.create_new_block(miner_script(), false, None, None, 0).unwrap();

        // Package feerate 20000/500 beats the standalone 8000/250
        assert_eq!(included_ids(&template), vec![parent.id(), child.id(), standalone.id()]);

        // Every unconfirmed ancestor appears before its descendant
        let ids = included_ids(&template);
        let position = |id: TransactionId| ids.iter().position(|x| *x == id).unwrap();
        assert!(position(parent.id()) < position(child.id()));
    }

    // The fee-rate floor stops selection at the first package below it;
    // later (worse) candidates are never considered.
    #[test]
    fn test_min_feerate_early_exit() {
        let chain = ChainStateMock::new(TIP_HEIGHT, SUBSIDY);
        let vm = ContractVmMock::new();
        let mut mempool = Mempool::new();
        // 10 base units per vbyte
        let config = Config { block_min_tx_fee: 10_000, ..Config::default() };

        let rich = independent_tx(250);
        let poor = independent_tx(250);
        let poorer = independent_tx(250);
        mempool.add_transaction(rich.clone(), 20 * 250, 0, 1, None).unwrap();
        mempool.add_transaction(poor.clone(), 5 * 250, 0, 1, None).unwrap();
        mempool.add_transaction(poorer.clone(), 3 * 250, 0, 1, None).unwrap();

        let mut assembler = BlockAssembler::new(&chain, &vm, Some(&mempool), &config);
        let template = assembler.create_new_block(miner_script(), false, None, None, 0).unwrap();

        assert_eq!(included_ids(&template), vec![rich.id()]);
        assert_eq!(template.total_fees(), 20 * 250);
    }

    // A contract whose execution would push the block past the soft gas
    // limit is refused after execution, and both state roots are restored to
    // their values right after the previously committed contract.
    #[test]
    fn test_soft_gas_limit_overflow_rolls_back_state() {
        let chain = ChainStateMock::new(TIP_HEIGHT, SUBSIDY);
        chain.set_limits(DgpLimits { soft_block_gas_limit: 1_000_000, ..DgpLimits::default() });
        let vm = ContractVmMock::new();
        let mut mempool = Mempool::new();
        let config = open_config();

        let contract_a = contract_tx(250);
        let contract_b = contract_tx(250);
        // A is selected first through its higher fee
        mempool.add_transaction(contract_a.clone(), 10_000, 0, 1, Some(40)).unwrap();
        mempool.add_transaction(contract_b.clone(), 5_000, 0, 1, Some(40)).unwrap();

        vm.script_contract(
            contract_a.id(),
            500_000,
            40,
            Ok(ExecutionResult { used_gas: 900_000, ..ExecutionResult::default() }),
        );
        // B passes the allowance pre-check (900k + 50k <= 1M) but its actual
        // usage overflows the soft limit
        vm.script_contract(
            contract_b.id(),
            50_000,
            40,
            Ok(ExecutionResult { used_gas: 200_000, ..ExecutionResult::default() }),
        );

        let initial_state_root = vm.state_root();
        let initial_utxo_root = vm.utxo_root();

        let mut assembler = BlockAssembler::new(&chain, &vm, Some(&mempool), &config);
        let template = assembler.create_new_block(miner_script(), false, None, None, 0).unwrap();

        assert_eq!(included_ids(&template), vec![contract_a.id()]);

        // Roots equal their values right after A committed: B's execution
        // dirtied them and the refusal restored them
        assert_eq!(vm.state_root(), dirtied(initial_state_root, contract_a.id()));
        assert_eq!(vm.utxo_root(), dirtied(initial_utxo_root, contract_a.id()));
    }

    // When the block is nearly full, a long streak of unfittable candidates
    // terminates selection instead of scanning the whole mempool.
    #[test]
    fn test_consecutive_failure_termination() {
        let chain = ChainStateMock::new(TIP_HEIGHT, SUBSIDY);
        let vm = ContractVmMock::new();
        let mut mempool = Mempool::new();
        let config = Config { block_max_weight: 12_000, block_min_tx_fee: 0, ..Config::default() };

        // Fills the block to 8800 of 12000, within 4000 of the ceiling
        let filler = independent_tx(1_200);
        mempool.add_transaction(filler.clone(), 1_000_000, 0, 1, None).unwrap();

        // None of these fit: 8800 + 4*1500 >= 12000
        for _ in 0..1_001 {
            mempool.add_transaction(independent_tx(1_500), 1_000, 0, 1, None).unwrap();
        }

        let mut assembler = BlockAssembler::new(&chain, &vm, Some(&mempool), &config);
        let template = assembler.create_new_block(miner_script(), false, None, None, 0).unwrap();

        assert_eq!(included_ids(&template), vec![filler.id()]);
    }

    // Contract inclusion rebuilds the coinbase: reward value reconciles
    // subsidy, fees and the sender refund; refund outputs follow verbatim;
    // value transfers ride along with zero-fee template rows.
    #[test]
    fn test_contract_refund_rebuilds_reward() {
        let chain = ChainStateMock::new(TIP_HEIGHT, SUBSIDY);
        let vm = ContractVmMock::new();
        let mut mempool = Mempool::new();
        let config = open_config();

        let contract = contract_tx(250);
        let plain = independent_tx(250);
        mempool.add_transaction(contract.clone(), 9_000, 0, 1, Some(40)).unwrap();
        mempool.add_transaction(plain.clone(), 2_000, 0, 1, None).unwrap();

        let refund_a = TransactionOutput::new(300, ScriptPublicKey::from_vec(vec![OP_TRUE]));
        let refund_b = TransactionOutput::new(200, ScriptPublicKey::from_vec(vec![OP_TRUE, OP_TRUE]));
        let transfer = (*independent_tx(120)).clone();
        vm.script_contract(
            contract.id(),
            500_000,
            40,
            Ok(ExecutionResult {
                used_gas: 100_000,
                refund_sender: 1_500,
                refund_outputs: vec![refund_a.clone(), refund_b.clone()],
                value_transfers: vec![transfer.clone()],
            }),
        );

        let mut assembler = BlockAssembler::new(&chain, &vm, Some(&mempool), &config);
        let template = assembler.create_new_block(miner_script(), false, None, None, 0).unwrap();

        // Contract first (better feerate), its value transfer right after
        assert_eq!(included_ids(&template), vec![contract.id(), transfer.id(), plain.id()]);

        let fees: u64 = 9_000 + 2_000;
        let coinbase = &template.block.transactions[0];
        assert_eq!(coinbase.outputs[0].value, SUBSIDY + fees - 1_500);
        // Refund outputs appended verbatim, before the commitment output
        assert_eq!(coinbase.outputs[1], refund_a);
        assert_eq!(coinbase.outputs[2], refund_b);

        // Fee and sigop columns stay parallel to the transaction sequence
        assert_eq!(template.tx_fees.len(), template.block.transactions.len());
        assert_eq!(template.tx_sigops_cost.len(), template.block.transactions.len());
        assert_eq!(template.tx_fees, vec![-(fees as i64), 9_000, 0, 2_000]);
        assert_eq!(template.total_fees(), fees as i64);
    }

    // In a PoS template the coinstake at index 1 collects reward and refund
    // outputs while the coinbase stays empty.
    #[test]
    fn test_pos_template_rewards_the_coinstake() {
        let chain = ChainStateMock::new(TIP_HEIGHT, SUBSIDY);
        let vm = ContractVmMock::new();
        let mut mempool = Mempool::new();
        let config = open_config();

        let contract = contract_tx(250);
        mempool.add_transaction(contract.clone(), 7_000, 0, 1, Some(40)).unwrap();

        let refund = TransactionOutput::new(450, ScriptPublicKey::from_vec(vec![OP_TRUE]));
        vm.script_contract(
            contract.id(),
            500_000,
            40,
            Ok(ExecutionResult { used_gas: 80_000, refund_sender: 600, refund_outputs: vec![refund.clone()], ..Default::default() }),
        );

        let staker_script = ScriptPublicKey::from_vec(vec![OP_TRUE]);
        let coinstake = coinstake_paying(staker_script.clone());
        let proof_time = chain.tip().time + 8;

        let mut assembler = BlockAssembler::new(&chain, &vm, Some(&mempool), &config);
        let template = assembler
            .create_new_block(ScriptPublicKey::default(), true, Some(coinstake.clone()), Some(proof_time), 0)
            .unwrap();

        assert!(template.block.is_proof_of_stake());
        assert_eq!(template.block.header.time, proof_time);

        let reward = &template.block.transactions[1];
        assert_eq!(reward.inputs, coinstake.inputs);
        assert!(reward.outputs[0].is_empty());
        assert_eq!(reward.outputs[1].value, SUBSIDY + 7_000 - 600);
        assert_eq!(reward.outputs[1].script_public_key, staker_script);
        assert_eq!(reward.outputs[2], refund);

        assert_eq!(template.block.transactions[2].id(), contract.id());
    }

    #[test]
    fn test_pos_template_requires_a_coinstake() {
        let chain = ChainStateMock::new(TIP_HEIGHT, SUBSIDY);
        let vm = ContractVmMock::new();
        let config = open_config();
        let mut assembler = BlockAssembler::new(&chain, &vm, None, &config);

        let result = assembler.create_new_block(ScriptPublicKey::default(), true, None, None, 0);
        assert!(matches!(result, Err(BuilderError::MissingCoinstake)));
    }

    // Two builds over the same mempool and tip produce identical templates.
    #[test]
    fn test_back_to_back_builds_are_idempotent() {
        let chain = ChainStateMock::new(TIP_HEIGHT, SUBSIDY);
        let vm = ContractVmMock::new();
        let mut mempool = Mempool::new();
        let config = open_config();

        let parent = independent_tx(250);
        let child = tx_spending(&[(parent.id(), 0)], 300);
        mempool.add_transaction(parent.clone(), 100, 0, 1, None).unwrap();
        mempool.add_transaction(child.clone(), 9_000, 0, 1, None).unwrap();
        for i in 0..5 {
            mempool.add_transaction(independent_tx(250 + i * 10), 1_000 + i, 0, 1, None).unwrap();
        }

        let mut assembler = BlockAssembler::new(&chain, &vm, Some(&mempool), &config);
        let first = assembler.create_new_block(miner_script(), false, None, None, 0).unwrap();
        let second = assembler.create_new_block(miner_script(), false, None, None, 0).unwrap();

        assert_eq!(included_ids(&first), included_ids(&second));
    }

    // Non-final transactions fail the package finality test and stay out.
    #[test]
    fn test_non_final_transaction_is_excluded() {
        let chain = ChainStateMock::new(TIP_HEIGHT, SUBSIDY);
        let vm = ContractVmMock::new();
        let mut mempool = Mempool::new();
        let config = open_config();

        let mut locked = (*independent_tx(250)).clone();
        locked.lock_time = (TIP_HEIGHT + 10) as u32;
        locked.inputs[0].sequence = 0;
        let locked = Arc::new(locked);
        let final_tx = independent_tx(250);

        mempool.add_transaction(locked.clone(), 50_000, 0, 1, None).unwrap();
        mempool.add_transaction(final_tx.clone(), 1_000, 0, 1, None).unwrap();

        let mut assembler = BlockAssembler::new(&chain, &vm, Some(&mempool), &config);
        let template = assembler.create_new_block(miner_script(), false, None, None, 0).unwrap();

        assert_eq!(included_ids(&template), vec![final_tx.id()]);
    }

    // The operator kill switch refuses every contract while plain traffic
    // keeps flowing.
    #[test]
    fn test_disable_contract_staking() {
        let chain = ChainStateMock::new(TIP_HEIGHT, SUBSIDY);
        let vm = ContractVmMock::new();
        let mut mempool = Mempool::new();
        let config = Config { block_min_tx_fee: 0, disable_contract_staking: true, ..Config::default() };

        let contract = contract_tx(250);
        let plain = independent_tx(250);
        mempool.add_transaction(contract.clone(), 50_000, 0, 1, Some(40)).unwrap();
        mempool.add_transaction(plain.clone(), 1_000, 0, 1, None).unwrap();
        vm.script_contract(contract.id(), 500_000, 40, Ok(ExecutionResult { used_gas: 1, ..Default::default() }));

        let mut assembler = BlockAssembler::new(&chain, &vm, Some(&mempool), &config);
        let template = assembler.create_new_block(miner_script(), false, None, None, 0).unwrap();

        assert_eq!(included_ids(&template), vec![plain.id()]);
    }

    // Within the bytecode buffer of the deadline, contract inclusions are
    // deferred to a later build.
    #[test]
    fn test_time_limit_defers_contracts() {
        let chain = ChainStateMock::new(TIP_HEIGHT, SUBSIDY);
        let vm = ContractVmMock::new();
        let mut mempool = Mempool::new();
        let config = open_config();

        let contract = contract_tx(250);
        let plain = independent_tx(250);
        mempool.add_transaction(contract.clone(), 50_000, 0, 1, Some(40)).unwrap();
        mempool.add_transaction(plain.clone(), 1_000, 0, 1, None).unwrap();
        vm.script_contract(contract.id(), 500_000, 40, Ok(ExecutionResult { used_gas: 1, ..Default::default() }));

        let deadline = chain.adjusted_time() + 1;
        let mut assembler = BlockAssembler::new(&chain, &vm, Some(&mempool), &config);
        let template = assembler.create_new_block(miner_script(), false, None, None, deadline).unwrap();

        assert_eq!(included_ids(&template), vec![plain.id()]);
    }

    // A failing execution leaves no trace: roots restored, transaction
    // skipped, later candidates unaffected.
    #[test]
    fn test_vm_failure_is_contained() {
        let chain = ChainStateMock::new(TIP_HEIGHT, SUBSIDY);
        let vm = ContractVmMock::new();
        let mut mempool = Mempool::new();
        let config = open_config();

        let broken = contract_tx(250);
        let plain = independent_tx(250);
        mempool.add_transaction(broken.clone(), 50_000, 0, 1, Some(40)).unwrap();
        mempool.add_transaction(plain.clone(), 1_000, 0, 1, None).unwrap();
        vm.script_contract(broken.id(), 500_000, 40, Err(VmError::Execution("out of stack".into())));

        let state_root = vm.state_root();
        let utxo_root = vm.utxo_root();

        let mut assembler = BlockAssembler::new(&chain, &vm, Some(&mempool), &config);
        let template = assembler.create_new_block(miner_script(), false, None, None, 0).unwrap();

        assert_eq!(included_ids(&template), vec![plain.id()]);
        assert_eq!(vm.state_root(), state_root);
        assert_eq!(vm.utxo_root(), utxo_root);
    }

    // Editing a block and regenerating commitments yields exactly one fresh
    // commitment output and a matching merkle root.
    #[test]
    fn test_regenerate_commitments_after_edit() {
        let chain = ChainStateMock::new(TIP_HEIGHT, SUBSIDY);
        let vm = ContractVmMock::new();
        let mempool = Mempool::new();
        let config = open_config();

        let mut assembler = BlockAssembler::new(&chain, &vm, Some(&mempool), &config);
        let mut template = assembler.create_new_block(miner_script(), false, None, None, 0).unwrap();

        // An external edit appends a transaction, invalidating commitments
        template.block.transactions.push((*independent_tx(200)).clone());
        regenerate_commitments(&mut template.block, &chain);

        let commitment_count = template.block.transactions[0]
            .outputs
            .iter()
            .filter(|output| {
                let script = output.script_public_key.script();
                script.len() >= 38 && script[0] == OP_RETURN && script[1] == 0x24 && script[2..6] == WITNESS_COMMITMENT_HEADER
            })
            .count();
        assert_eq!(commitment_count, 1);
        assert!(witness_commitment_index(&template.block).is_some());
        assert_eq!(
            template.block.header.hash_merkle_root,
            ember_consensus_core::merkle::calc_block_merkle_root(&template.block.transactions)
        );
    }

    // On mine-on-demand networks the operator may override the header version.
    #[test]
    fn test_block_version_override() {
        let chain = ChainStateMock::new(TIP_HEIGHT, SUBSIDY);
        let vm = ContractVmMock::new();
        let config = Config { block_min_tx_fee: 0, block_version: Some(7), ..Config::default() };

        let mut assembler = BlockAssembler::new(&chain, &vm, None, &config);
        let template = assembler.create_new_block(miner_script(), false, None, None, 0).unwrap();
        assert_eq!(template.block.header.version, 7);
    }
}
