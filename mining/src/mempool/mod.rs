use crate::mempool::{
    errors::{RuleError, RuleResult},
    model::{feerate_key::AncestorFeerateKey, tx::MempoolEntry},
};
use ember_consensus_core::tx::{Transaction, TransactionId, TransactionOutpoint};
use ember_core::trace;
use std::{
    collections::{BTreeSet, HashMap, HashSet},
    sync::Arc,
};

pub mod errors;
pub mod model;

/// Pool of unconfirmed transactions indexed for block template assembly.
///
/// Dependencies between in-pool transactions are kept as bijective
/// parent/chained relations so ancestor and descendant closures can be walked
/// in both directions. Every entry caches its with-ancestor statistics, and
/// the pool maintains an index ordered by the ancestor-feerate-or-gas-price
/// key the template selector consumes. The assembler never mutates the pool;
/// it only reads it under the caller's lock.
#[derive(Default)]
pub struct Mempool {
    all_transactions: HashMap<TransactionId, MempoolEntry>,
    /// Dependencies formed by inputs present in pool - ancestor relations.
    parent_transactions: HashMap<TransactionId, HashSet<TransactionId>>,
    /// Dependencies formed by outputs present in pool - successor relations.
    chained_transactions: HashMap<TransactionId, HashSet<TransactionId>>,
    /// Which in-pool transaction spends each outpoint.
    spent_outpoints: HashMap<TransactionOutpoint, TransactionId>,
    ancestor_score_index: BTreeSet<AncestorFeerateKey>,
}

impl Mempool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a validated transaction to the pool. `fee` and `sigop_cost` come
    /// from acceptance validation; `fee_delta` is the operator's priority
    /// adjustment and `gas_price` the minimum gas price over the contract
    /// outputs, when there are any.
    pub fn add_transaction(
        &mut self,
        tx: Arc<Transaction>,
        fee: u64,
        fee_delta: i64,
        sigop_cost: i64,
        gas_price: Option<u64>,
    ) -> RuleResult<&MempoolEntry> {
        let id = tx.id();
        if self.all_transactions.contains_key(&id) {
            return Err(RuleError::RejectDuplicate(id));
        }
        for input in tx.inputs.iter() {
            if let Some(owner) = self.spent_outpoints.get(&input.previous_outpoint) {
                return Err(RuleError::RejectDoubleSpendInMempool(input.previous_outpoint, *owner));
            }
        }

        let mut entry = MempoolEntry::new(tx, fee, fee_delta, sigop_cost, gas_price);

        // Create the bijective parent/chained relations and fold the ancestor
        // closure into the entry's cached statistics
        let parents = self.direct_parents(&entry.tx);
        for ancestor_id in Self::closure(&parents, &self.parent_transactions) {
            let ancestor = &self.all_transactions[&ancestor_id];
            entry.size_with_ancestors += ancestor.size;
            entry.mod_fees_with_ancestors += ancestor.modified_fee;
            entry.sigops_with_ancestors += ancestor.sigop_cost;
            entry.ancestor_count += 1;
        }
        for parent_id in parents.iter() {
            self.chained_transactions.entry(*parent_id).or_default().insert(id);
        }
        self.parent_transactions.insert(id, parents);

        for input in entry.tx.inputs.iter() {
            self.spent_outpoints.insert(input.previous_outpoint, id);
        }
        self.ancestor_score_index.insert(entry.ancestor_score_key());
        self.all_transactions.insert(id, entry);
        trace!("Added transaction {}", id);
        Ok(self.all_transactions.get(&id).unwrap())
    }

    /// Fully removes the transaction from all relational sets and indexes.
    /// The cached ancestor statistics of its remaining descendants are
    /// recomputed.
    pub fn remove_transaction(&mut self, transaction_id: &TransactionId) -> RuleResult<MempoolEntry> {
        let descendants = self.calculate_descendants(transaction_id);

        // Remove all bijective parent/chained relations
        if let Some(parents) = self.parent_transactions.get(transaction_id) {
            for parent in parents.iter() {
                if let Some(chains) = self.chained_transactions.get_mut(parent) {
                    chains.remove(transaction_id);
                }
            }
        }
        if let Some(chains) = self.chained_transactions.get(transaction_id) {
            for chain in chains.iter() {
                if let Some(parents) = self.parent_transactions.get_mut(chain) {
                    parents.remove(transaction_id);
                }
            }
        }
        self.parent_transactions.remove(transaction_id);
        self.chained_transactions.remove(transaction_id);

        let removed = self
            .all_transactions
            .remove(transaction_id)
            .ok_or(RuleError::RejectMissingTransaction(*transaction_id))?;
        self.ancestor_score_index.remove(&removed.ancestor_score_key());
        for input in removed.tx.inputs.iter() {
            self.spent_outpoints.remove(&input.previous_outpoint);
        }

        for descendant_id in descendants {
            self.recompute_ancestor_stats(&descendant_id);
        }

        Ok(removed)
    }

    pub fn get(&self, transaction_id: &TransactionId) -> Option<&MempoolEntry> {
        self.all_transactions.get(transaction_id)
    }

    pub fn contains(&self, transaction_id: &TransactionId) -> bool {
        self.all_transactions.contains_key(transaction_id)
    }

    pub fn len(&self) -> usize {
        self.all_transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all_transactions.is_empty()
    }

    /// All in-pool ancestors of the transaction, transitively, excluding the
    /// transaction itself.
    pub fn calculate_ancestors(&self, transaction_id: &TransactionId) -> HashSet<TransactionId> {
        let seed = self.parent_transactions.get(transaction_id).cloned().unwrap_or_default();
        Self::closure(&seed, &self.parent_transactions)
    }

    /// All in-pool descendants of the transaction, transitively, excluding
    /// the transaction itself.
    pub fn calculate_descendants(&self, transaction_id: &TransactionId) -> HashSet<TransactionId> {
        let seed = self.chained_transactions.get(transaction_id).cloned().unwrap_or_default();
        Self::closure(&seed, &self.chained_transactions)
    }

    /// Entries in decreasing ancestor-feerate-or-gas-price order.
    pub fn iter_by_ancestor_score(&self) -> impl Iterator<Item = &MempoolEntry> {
        self.ancestor_score_index.iter().rev().map(move |key| &self.all_transactions[&key.id])
    }

    fn direct_parents(&self, tx: &Transaction) -> HashSet<TransactionId> {
        tx.inputs
            .iter()
            .map(|input| input.previous_outpoint.transaction_id)
            .filter(|id| self.all_transactions.contains_key(id))
            .collect()
    }

    /// Transitive closure of `seed` over the given relation map.
    fn closure(seed: &HashSet<TransactionId>, edges: &HashMap<TransactionId, HashSet<TransactionId>>) -> HashSet<TransactionId> {
        let mut visited: HashSet<TransactionId> = seed.clone();
        let mut stack: Vec<TransactionId> = seed.iter().copied().collect();
        while let Some(id) = stack.pop() {
            if let Some(next) = edges.get(&id) {
                for next_id in next.iter() {
                    if visited.insert(*next_id) {
                        stack.push(*next_id);
                    }
                }
            }
        }
        visited
    }

    fn recompute_ancestor_stats(&mut self, transaction_id: &TransactionId) {
        let ancestors = self.calculate_ancestors(transaction_id);
        let (mut size, mut fees, mut sigops, mut count) = {
            let entry = &self.all_transactions[transaction_id];
            (entry.size, entry.modified_fee, entry.sigop_cost, 1u64)
        };
        for ancestor_id in ancestors {
            let ancestor = &self.all_transactions[&ancestor_id];
            size += ancestor.size;
            fees += ancestor.modified_fee;
            sigops += ancestor.sigop_cost;
            count += 1;
        }
        let entry = self.all_transactions.get_mut(transaction_id).unwrap();
        self.ancestor_score_index.remove(&entry.ancestor_score_key());
        entry.size_with_ancestors = size;
        entry.mod_fees_with_ancestors = fees;
        entry.sigops_with_ancestors = sigops;
        entry.ancestor_count = count;
        self.ancestor_score_index.insert(entry.ancestor_score_key());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_consensus_core::tx::{ScriptPublicKey, TransactionInput, TransactionOutput, SEQUENCE_FINAL};
    use ember_hashes::Hash;

    fn transaction_spending(parents: &[(TransactionId, u32)]) -> Arc<Transaction> {
        let inputs = parents
            .iter()
            .map(|(id, index)| TransactionInput::new(TransactionOutpoint::new(*id, *index), vec![0u8; 50], SEQUENCE_FINAL))
            .collect();
        let outputs = vec![TransactionOutput::new(1_000, ScriptPublicKey::from_vec(vec![0x51]))];
        Arc::new(Transaction::new(2, inputs, outputs, 0))
    }

    #[test]
    fn test_ancestor_stats_accumulate_down_a_chain() {
        let mut mempool = Mempool::new();
        let grandparent = transaction_spending(&[(Hash::new_unique(), 0)]);
        let parent = transaction_spending(&[(grandparent.id(), 0)]);
        let child = transaction_spending(&[(parent.id(), 0)]);

        mempool.add_transaction(grandparent.clone(), 100, 0, 4, None).unwrap();
        mempool.add_transaction(parent.clone(), 200, 0, 4, None).unwrap();
        mempool.add_transaction(child.clone(), 300, 0, 4, None).unwrap();

        let entry = mempool.get(&child.id()).unwrap();
        assert_eq!(entry.ancestor_count, 3);
        assert_eq!(entry.mod_fees_with_ancestors, 600);
        assert_eq!(entry.sigops_with_ancestors, 12);
        assert_eq!(
            entry.size_with_ancestors,
            grandparent.serialized_size() + parent.serialized_size() + child.serialized_size()
        );

        assert_eq!(mempool.calculate_ancestors(&child.id()).len(), 2);
        assert_eq!(mempool.calculate_descendants(&grandparent.id()).len(), 2);
    }

    #[test]
    fn test_duplicate_and_double_spend_rejection() {
        let mut mempool = Mempool::new();
        let outpoint = (Hash::new_unique(), 0);
        let tx = transaction_spending(&[outpoint]);
        mempool.add_transaction(tx.clone(), 100, 0, 1, None).unwrap();

        assert!(matches!(
            mempool.add_transaction(tx.clone(), 100, 0, 1, None),
            Err(RuleError::RejectDuplicate(_))
        ));

        let mut conflicting = (*transaction_spending(&[outpoint])).clone();
        conflicting.lock_time = 1;
        assert!(matches!(
            mempool.add_transaction(Arc::new(conflicting), 100, 0, 1, None),
            Err(RuleError::RejectDoubleSpendInMempool(_, _))
        ));
    }

    #[test]
    fn test_removal_recomputes_descendant_stats() {
        let mut mempool = Mempool::new();
        let parent = transaction_spending(&[(Hash::new_unique(), 0)]);
        let child = transaction_spending(&[(parent.id(), 0)]);
        mempool.add_transaction(parent.clone(), 500, 0, 4, None).unwrap();
        mempool.add_transaction(child.clone(), 100, 0, 4, None).unwrap();

        mempool.remove_transaction(&parent.id()).unwrap();
        let entry = mempool.get(&child.id()).unwrap();
        assert_eq!(entry.ancestor_count, 1);
        assert_eq!(entry.mod_fees_with_ancestors, 100);
        assert_eq!(entry.size_with_ancestors, child.serialized_size());

        assert!(matches!(
            mempool.remove_transaction(&parent.id()),
            Err(RuleError::RejectMissingTransaction(_))
        ));
    }

    #[test]
    fn test_index_orders_by_ancestor_feerate() {
        let mut mempool = Mempool::new();
        let cheap = transaction_spending(&[(Hash::new_unique(), 0)]);
        let rich = transaction_spending(&[(Hash::new_unique(), 0)]);
        mempool.add_transaction(cheap.clone(), 10, 0, 1, None).unwrap();
        mempool.add_transaction(rich.clone(), 10_000, 0, 1, None).unwrap();

        let order: Vec<TransactionId> = mempool.iter_by_ancestor_score().map(|entry| entry.id()).collect();
        assert_eq!(order, vec![rich.id(), cheap.id()]);
    }
}
