use crate::mempool::model::{feerate_key::AncestorFeerateKey, tx::MempoolEntry};
use ember_consensus_core::tx::TransactionId;
use std::collections::{BTreeSet, HashMap};

/// Shadow record of a mempool entry whose cached ancestor statistics went
/// stale because some of its ancestors were included in the block under
/// construction. Holds the entry's effective statistics with the included
/// ancestors' contributions subtracted.
#[derive(Clone, Debug)]
pub(crate) struct ModifiedEntry {
    id: TransactionId,
    gas_price: u64,
    pub size_with_ancestors: u64,
    pub mod_fees_with_ancestors: i64,
    pub sigops_with_ancestors: i64,
}

impl ModifiedEntry {
    fn new(entry: &MempoolEntry) -> Self {
        Self {
            id: entry.id(),
            gas_price: entry.gas_price.unwrap_or(0),
            size_with_ancestors: entry.size_with_ancestors,
            mod_fees_with_ancestors: entry.mod_fees_with_ancestors,
            sigops_with_ancestors: entry.sigops_with_ancestors,
        }
    }

    fn reduce(&mut self, included_ancestor: &MempoolEntry) {
        self.size_with_ancestors -= included_ancestor.size;
        self.mod_fees_with_ancestors -= included_ancestor.modified_fee;
        self.sigops_with_ancestors -= included_ancestor.sigop_cost;
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn key(&self) -> AncestorFeerateKey {
        AncestorFeerateKey::new(self.mod_fees_with_ancestors, self.size_with_ancestors, self.gas_price, self.id)
    }
}

/// The modified-entry overlay: candidates whose effective ancestor state
/// differs from the mempool's cached one, ordered both by identity and by
/// ancestor score so the selector can erase by id and pop best-first.
#[derive(Default)]
pub(crate) struct ModifiedTxSet {
    entries: HashMap<TransactionId, ModifiedEntry>,
    index: BTreeSet<AncestorFeerateKey>,
}

impl ModifiedTxSet {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &TransactionId) -> bool {
        self.entries.contains_key(id)
    }

    /// The entry with the best effective ancestor score.
    pub fn best(&self) -> Option<&ModifiedEntry> {
        self.index.iter().next_back().map(|key| &self.entries[&key.id])
    }

    pub fn remove(&mut self, id: &TransactionId) -> bool {
        match self.entries.remove(id) {
            Some(entry) => {
                self.index.remove(&entry.key());
                true
            }
            None => false,
        }
    }

    /// Creates or updates the shadow record of `descendant`, subtracting the
    /// newly included ancestor's size, fee and sigops contributions.
    pub fn reduce_for_included_ancestor(&mut self, descendant: &MempoolEntry, included_ancestor: &MempoolEntry) {
        let mut entry = match self.entries.remove(&descendant.id()) {
            Some(existing) => {
                self.index.remove(&existing.key());
                existing
            }
            None => ModifiedEntry::new(descendant),
        };
        entry.reduce(included_ancestor);
        self.index.insert(entry.key());
        self.entries.insert(entry.id(), entry);
    }
}
