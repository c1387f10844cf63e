use crate::constants::WITNESS_COMMITMENT_HEADER;
use crate::header::Header;
use crate::script::opcodes::OP_RETURN;
use crate::tx::{transaction_weight, Transaction};
use serde::{Deserialize, Serialize};

/// A block under construction: header and transactions are freely mutable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Block {
    pub header: Header,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn new(header: Header, transactions: Vec<Transaction>) -> Self {
        Self { header, transactions }
    }

    /// A proof-of-stake block carries its coinstake right after the coinbase.
    pub fn is_proof_of_stake(&self) -> bool {
        self.transactions.len() > 1 && self.transactions[1].is_coinstake()
    }

    pub fn weight(&self) -> u64 {
        self.transactions.iter().map(transaction_weight).sum()
    }
}

/// Locates the witness-commitment output within the block's coinbase:
/// the highest-index output starting with OP_RETURN, a 36-byte push and the
/// commitment marker.
pub fn witness_commitment_index(block: &Block) -> Option<usize> {
    let coinbase = block.transactions.first()?;
    coinbase
        .outputs
        .iter()
        .enumerate()
        .rev()
        .find(|(_, output)| {
            let script = output.script_public_key.script();
            script.len() >= 38 && script[0] == OP_RETURN && script[1] == 0x24 && script[2..6] == WITNESS_COMMITMENT_HEADER
        })
        .map(|(i, _)| i)
}

/// A block template for the miner or staker: the candidate block plus
/// per-transaction fee and sigop-cost columns. The reward slots are seeded
/// with a −1 sentinel; at finalization the coinbase fee slot carries the
/// negated fee aggregate.
#[derive(Debug, Clone, Default)]
pub struct BlockTemplate {
    pub block: Block,
    pub tx_fees: Vec<i64>,
    pub tx_sigops_cost: Vec<i64>,
    pub coinbase_commitment: Vec<u8>,
}

impl BlockTemplate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Aggregate fees collected by the block, recovered from the sentinel.
    pub fn total_fees(&self) -> i64 {
        -self.tx_fees.first().copied().unwrap_or(0)
    }
}
