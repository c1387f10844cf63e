use ember_consensus_core::tx::{TransactionId, TransactionOutpoint};
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum RuleError {
    #[error("transaction {0} is already in the mempool")]
    RejectDuplicate(TransactionId),

    #[error("output {0} already spent by transaction {1} in the memory pool")]
    RejectDoubleSpendInMempool(TransactionOutpoint, TransactionId),

    #[error("transaction {0} doesn't exist in transaction pool")]
    RejectMissingTransaction(TransactionId),
}

pub type RuleResult<T> = std::result::Result<T, RuleError>;
