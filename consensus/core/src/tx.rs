use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt::Display;

use crate::{hashing, script};

/// Size of the underlying script vector of a script.
pub const SCRIPT_VECTOR_SIZE: usize = 36;

/// Represents the ID of an Ember transaction
pub type TransactionId = ember_hashes::Hash;

/// Used as the underlying type for script public key data, optimized for the common p2pkh script size.
pub type ScriptVec = SmallVec<[u8; SCRIPT_VECTOR_SIZE]>;

/// Alias the `smallvec!` macro to ease maintenance
pub use smallvec::smallvec as scriptvec;

/// Lock times at or above this threshold are interpreted as unix timestamps,
/// below it as block heights.
pub const LOCKTIME_THRESHOLD: u32 = 500_000_000;

/// An input carrying this sequence opts out of lock-time enforcement.
pub const SEQUENCE_FINAL: u32 = u32::MAX;

/// Represents an Ember ScriptPublicKey
#[derive(Default, Debug, PartialEq, Eq, Clone, Hash, Serialize, Deserialize)]
pub struct ScriptPublicKey {
    script: ScriptVec, // Kept private to preserve read-only semantics
}

impl ScriptPublicKey {
    pub fn new(script: ScriptVec) -> Self {
        Self { script }
    }

    pub fn from_vec(script: Vec<u8>) -> Self {
        Self { script: ScriptVec::from_vec(script) }
    }

    pub fn script(&self) -> &[u8] {
        &self.script
    }

    pub fn is_empty(&self) -> bool {
        self.script.is_empty()
    }
}

pub type TransactionIndexType = u32;

/// Represents an Ember transaction outpoint
#[derive(Eq, Hash, PartialEq, Debug, Copy, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionOutpoint {
    pub transaction_id: TransactionId,
    pub index: TransactionIndexType,
}

impl TransactionOutpoint {
    pub fn new(transaction_id: TransactionId, index: u32) -> Self {
        Self { transaction_id, index }
    }

    /// The sentinel outpoint carried by the single input of a coinbase.
    pub fn null() -> Self {
        Self { transaction_id: TransactionId::default(), index: u32::MAX }
    }

    pub fn is_null(&self) -> bool {
        self.transaction_id.is_zero() && self.index == u32::MAX
    }
}

impl Display for TransactionOutpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.transaction_id, self.index)
    }
}

/// Represents an Ember transaction input
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionInput {
    pub previous_outpoint: TransactionOutpoint,
    pub signature_script: Vec<u8>,
    pub sequence: u32,
}

impl TransactionInput {
    pub fn new(previous_outpoint: TransactionOutpoint, signature_script: Vec<u8>, sequence: u32) -> Self {
        Self { previous_outpoint, signature_script, sequence }
    }
}

/// Represents an Ember transaction output
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionOutput {
    pub value: u64,
    pub script_public_key: ScriptPublicKey,
}

impl TransactionOutput {
    pub fn new(value: u64, script_public_key: ScriptPublicKey) -> Self {
        Self { value, script_public_key }
    }

    /// An empty output is the zero-value, zero-script marker used as the
    /// first output of a coinstake.
    pub fn is_empty(&self) -> bool {
        self.value == 0 && self.script_public_key.is_empty()
    }
}

/// Represents an Ember transaction
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
    pub lock_time: u32,
}

impl Transaction {
    pub fn new(version: u32, inputs: Vec<TransactionInput>, outputs: Vec<TransactionOutput>, lock_time: u32) -> Self {
        Self { version, inputs, outputs, lock_time }
    }

    /// The double-SHA256 of the canonical serialization.
    pub fn id(&self) -> TransactionId {
        hashing::tx::id(self)
    }

    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].previous_outpoint.is_null()
    }

    /// A coinstake spends real outpoints but marks its first output empty;
    /// the minted value appears from its second output onwards.
    pub fn is_coinstake(&self) -> bool {
        !self.inputs.is_empty()
            && !self.inputs[0].previous_outpoint.is_null()
            && self.outputs.len() >= 2
            && self.outputs[0].is_empty()
    }

    /// Does any output script carry a contract creation or call opcode?
    pub fn has_create_or_call(&self) -> bool {
        self.outputs.iter().any(|output| script::has_contract_op(output.script_public_key.script()))
    }

    pub fn serialized_size(&self) -> u64 {
        let inputs: u64 = self
            .inputs
            .iter()
            .map(|input| 36 + var_int_size(input.signature_script.len() as u64) + input.signature_script.len() as u64 + 4)
            .sum();
        let outputs: u64 = self
            .outputs
            .iter()
            .map(|output| {
                8 + var_int_size(output.script_public_key.script().len() as u64) + output.script_public_key.script().len() as u64
            })
            .sum();
        4 + var_int_size(self.inputs.len() as u64) + inputs + var_int_size(self.outputs.len() as u64) + outputs + 4
    }
}

/// Serialized size of a compact-length prefix.
pub(crate) fn var_int_size(value: u64) -> u64 {
    match value {
        0..=0xfc => 1,
        0xfd..=0xffff => 3,
        0x10000..=0xffff_ffff => 5,
        _ => 9,
    }
}

/// Weight of a transaction for block resource accounting.
pub fn transaction_weight(tx: &Transaction) -> u64 {
    crate::constants::WITNESS_SCALE_FACTOR * tx.serialized_size()
}

/// Can this transaction be included in a block at `height` whose predecessors
/// yield `block_time` as the lock-time cutoff?
pub fn is_final_tx(tx: &Transaction, height: u64, block_time: u64) -> bool {
    if tx.lock_time == 0 {
        return true;
    }
    let cutoff = if tx.lock_time < LOCKTIME_THRESHOLD { height } else { block_time };
    if (tx.lock_time as u64) < cutoff {
        return true;
    }
    // A lock time in the future can still be overridden by finalizing every input
    tx.inputs.iter().all(|input| input.sequence == SEQUENCE_FINAL)
}
