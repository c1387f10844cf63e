use crate::mempool::model::feerate_key::AncestorFeerateKey;
use ember_consensus_core::tx::{transaction_weight, Transaction, TransactionId};
use std::sync::Arc;

/// A mempool transaction together with the cached statistics block assembly
/// selects on. The `*_with_ancestors` aggregates include the entry itself
/// and are maintained by the pool on insertion and removal.
#[derive(Clone, Debug)]
pub struct MempoolEntry {
    pub tx: Arc<Transaction>,
    id: TransactionId,
    pub fee: u64,
    /// Base fee adjusted by operator priority deltas.
    pub modified_fee: i64,
    /// Virtual size.
    pub size: u64,
    pub weight: u64,
    pub sigop_cost: i64,
    /// Minimum gas price across the contract outputs; `None` for plain
    /// transactions.
    pub gas_price: Option<u64>,
    pub size_with_ancestors: u64,
    pub mod_fees_with_ancestors: i64,
    pub sigops_with_ancestors: i64,
    pub ancestor_count: u64,
}

impl MempoolEntry {
    pub(crate) fn new(tx: Arc<Transaction>, fee: u64, fee_delta: i64, sigop_cost: i64, gas_price: Option<u64>) -> Self {
        let id = tx.id();
        let size = tx.serialized_size();
        let weight = transaction_weight(&tx);
        let modified_fee = fee as i64 + fee_delta;
        Self {
            tx,
            id,
            fee,
            modified_fee,
            size,
            weight,
            sigop_cost,
            gas_price,
            size_with_ancestors: size,
            mod_fees_with_ancestors: modified_fee,
            sigops_with_ancestors: sigop_cost,
            ancestor_count: 1,
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub(crate) fn ancestor_score_key(&self) -> AncestorFeerateKey {
        AncestorFeerateKey::new(self.mod_fees_with_ancestors, self.size_with_ancestors, self.gas_price.unwrap_or(0), self.id)
    }
}
