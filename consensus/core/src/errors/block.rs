use crate::tx::TransactionId;
use ember_hashes::Hash;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum RuleError {
    #[error("block has no transactions")]
    NoTransactions,

    #[error("first transaction in block is not a coinbase")]
    FirstTxNotCoinbase,

    #[error("block weight {0} exceeds the limit of {1}")]
    ExceedsMaxBlockWeight(u64, u64),

    #[error("block sigops cost {0} exceeds the limit of {1}")]
    ExceedsMaxBlockSigOps(i64, i64),

    #[error("block timestamp {0} is not later than the median time past {1}")]
    TimeTooOld(u64, u64),

    #[error("transaction {0} is not finalized at this height")]
    NonFinalTransaction(TransactionId),

    #[error("block merkle root {0} does not match the computed value {1}")]
    BadMerkleRoot(Hash, Hash),

    #[error("coinbase pays {0} which exceeds the allowed {1}")]
    BadCoinbaseValue(u64, u64),
}

pub type RuleResult<T> = std::result::Result<T, RuleError>;
