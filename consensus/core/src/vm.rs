use crate::api::ChainTip;
use crate::tx::{Transaction, TransactionOutput};
use ember_hashes::Hash;
use thiserror::Error;

/// A contract operation extracted from the outputs of an enclosing UTXO
/// transaction, ready for VM execution.
#[derive(Clone, Debug)]
pub struct ContractTransaction {
    pub gas_limit: u64,
    pub gas_price: u64,
    pub value: u64,
    pub data: Vec<u8>,
    pub is_create: bool,
}

impl ContractTransaction {
    pub fn gas(&self) -> u64 {
        self.gas_limit
    }
}

/// Outcome of executing a batch of contract transactions. Also used as the
/// per-block accumulator while a template is assembled.
#[derive(Clone, Debug, Default)]
pub struct ExecutionResult {
    pub used_gas: u64,
    /// Unused gas refunded to the sender, deducted from the block reward.
    pub refund_sender: u64,
    /// Refund outputs to append to the reward transaction, in order.
    pub refund_outputs: Vec<TransactionOutput>,
    /// Value-transfer transactions the VM synthesized; they follow their
    /// contract transaction into the block.
    pub value_transfers: Vec<Transaction>,
}

#[derive(Error, Debug, Clone)]
pub enum VmError {
    #[error("failed to extract contract transactions: {0}")]
    Extraction(String),

    #[error("bytecode execution failed: {0}")]
    Execution(String),

    #[error("failed to process execution results: {0}")]
    ResultProcessing(String),
}

pub type VmResult<T> = std::result::Result<T, VmError>;

/// The contract virtual machine together with its globally shared state
/// tries. The root getters/setters are the snapshot-and-restore primitive:
/// capturing both roots before execution and restoring them afterwards must
/// undo every effect of that execution.
pub trait ContractVm {
    /// Extracts the contract sub-transactions of `tx`. `block_transactions`
    /// provides the enclosing candidate block for outpoint resolution.
    fn extract_transactions(
        &self,
        tx: &Transaction,
        block_transactions: &[Transaction],
        script_flags: u32,
    ) -> VmResult<Vec<ContractTransaction>>;

    /// Runs the batch against the global state. `hard_gas_limit` is the
    /// consensus block gas ceiling, not the operator's soft limit.
    fn execute(&self, transactions: &[ContractTransaction], hard_gas_limit: u64, tip: &ChainTip) -> VmResult<ExecutionResult>;

    fn state_root(&self) -> Hash;

    fn set_state_root(&self, root: Hash);

    fn utxo_root(&self) -> Hash;

    fn set_utxo_root(&self, root: Hash);
}
