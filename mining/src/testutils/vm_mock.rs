use ember_consensus_core::{
    api::ChainTip,
    tx::{Transaction, TransactionId},
    vm::{ContractTransaction, ContractVm, ExecutionResult, VmError, VmResult},
};
use ember_hashes::{DoubleSha256, Hash};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Scripted contract VM: each contract-bearing transaction id maps to the
/// sub-transactions extraction yields and the outcome execution returns.
/// Every execution dirties the global state roots before reporting its
/// outcome, so root restoration is observable in tests.
pub(crate) struct ContractVmMock {
    state_root: RwLock<Hash>,
    utxo_root: RwLock<Hash>,
    scripted: RwLock<HashMap<TransactionId, ScriptedContract>>,
}

struct ScriptedContract {
    contract_txs: Vec<ContractTransaction>,
    result: VmResult<ExecutionResult>,
}

impl ContractVmMock {
    pub(crate) fn new() -> Self {
        Self {
            state_root: RwLock::new(Hash::from_u64(0xdead)),
            utxo_root: RwLock::new(Hash::from_u64(0xbeef)),
            scripted: RwLock::new(HashMap::new()),
        }
    }

    /// Scripts a single-contract extraction for `id` and the given execution
    /// outcome. The contract sub-transaction embeds the enclosing id so the
    /// mock can route `execute` calls back to this script.
    pub(crate) fn script_contract(&self, id: TransactionId, gas_limit: u64, gas_price: u64, result: VmResult<ExecutionResult>) {
        let contract_tx = ContractTransaction {
            gas_limit,
            gas_price,
            value: 0,
            data: id.as_bytes().to_vec(),
            is_create: true,
        };
        self.scripted.write().insert(id, ScriptedContract { contract_txs: vec![contract_tx], result });
    }

    fn dirty_roots(&self, id: TransactionId) {
        let mut state_root = self.state_root.write();
        let mut hasher = DoubleSha256::new();
        hasher.update(*state_root).update(id);
        *state_root = hasher.finalize();

        let mut utxo_root = self.utxo_root.write();
        let mut hasher = DoubleSha256::new();
        hasher.update(*utxo_root).update(id);
        *utxo_root = hasher.finalize();
    }
}

impl ContractVm for ContractVmMock {
    fn extract_transactions(
        &self,
        tx: &Transaction,
        _block_transactions: &[Transaction],
        _script_flags: u32,
    ) -> VmResult<Vec<ContractTransaction>> {
        match self.scripted.read().get(&tx.id()) {
            Some(scripted) => Ok(scripted.contract_txs.clone()),
            None => Err(VmError::Extraction(format!("no contract outputs in {}", tx.id()))),
        }
    }

    fn execute(&self, transactions: &[ContractTransaction], _hard_gas_limit: u64, _tip: &ChainTip) -> VmResult<ExecutionResult> {
        let id = Hash::from_slice(&transactions[0].data);
        // A real execution mutates the tries even when it fails; the caller
        // is responsible for restoring the captured roots
        self.dirty_roots(id);
        self.scripted.read().get(&id).expect("executed contracts were extracted first").result.clone()
    }

    fn state_root(&self) -> Hash {
        *self.state_root.read()
    }

    fn set_state_root(&self, root: Hash) {
        *self.state_root.write() = root;
    }

    fn utxo_root(&self) -> Hash {
        *self.utxo_root.read()
    }

    fn set_utxo_root(&self, root: Hash) {
        *self.utxo_root.write() = root;
    }
}
