use crate::{
    block_template::{overlay::ModifiedTxSet, policy::COINBASE_WEIGHT_RESERVE, BlockAssembler},
    config::FeeRate,
    mempool::{model::tx::MempoolEntry, Mempool},
};
use ember_consensus_core::tx::{is_final_tx, TransactionId};
use ember_core::info;
use std::collections::HashSet;

/// Limit on the attempts to add transactions to the block when it is close
/// to full; a simple heuristic to finish quickly if the mempool has a lot of
/// entries that no longer fit.
const MAX_CONSECUTIVE_FAILURES: u64 = 1000;

/// The effective package statistics of the candidate under evaluation.
struct CandidatePackage {
    id: TransactionId,
    size: u64,
    fees: i64,
    sigops: i64,
    using_modified: bool,
}

impl<'a> BlockAssembler<'a> {
    /// Runs package selection: orders the mempool by the fee rate of each
    /// transaction including its unconfirmed ancestors and fills the block.
    ///
    /// Since selection never removes transactions from the mempool, the fee
    /// rate of a transaction whose ancestors were selected has to be updated
    /// on the side: the descendants of every included transaction get a
    /// shadow record with reduced ancestor state in the modified set. Each
    /// round compares the best shadow record against the next native mempool
    /// entry to decide which package to work on.
    ///
    /// Returns the number of packages selected and of descendant records
    /// updated.
    pub(crate) fn add_package_txs(&mut self, mempool: &'a Mempool) -> (u64, u64) {
        let mut modified = ModifiedTxSet::default();
        // Entries that failed inclusion once are not reconsidered: after an
        // ancestor entered the block their cached statistics in the mempool
        // index are no longer correct, so a re-evaluation through the native
        // stream would select on wrong numbers.
        let mut failed: HashSet<TransactionId> = HashSet::new();
        let mut base = mempool.iter_by_ancestor_score().peekable();

        let mut packages_selected = 0;
        let mut descendants_updated = 0;
        let mut consecutive_failed: u64 = 0;
        let min_gas_price = self.policy.min_gas_price;

        loop {
            // Advance the native stream past entries that are already in the
            // block, shadowed by a modified record, or known failures
            while let Some(entry) = base.peek() {
                let id = entry.id();
                if self.in_block.contains(&id) || modified.contains(&id) || failed.contains(&id) {
                    base.next();
                } else {
                    break;
                }
            }

            // Decide which stream provides the next candidate package: the
            // native mempool order, or the best reduced shadow record
            let candidate = {
                let base_entry = base.peek().copied();
                let modified_best = modified.best();
                match (base_entry, modified_best) {
                    (None, None) => break,
                    (None, Some(shadow)) => CandidatePackage {
                        id: shadow.id(),
                        size: shadow.size_with_ancestors,
                        fees: shadow.mod_fees_with_ancestors,
                        sigops: shadow.sigops_with_ancestors,
                        using_modified: true,
                    },
                    (Some(entry), shadow) => {
                        if shadow.is_some_and(|shadow| shadow.key() > entry.ancestor_score_key()) {
                            let shadow = shadow.unwrap();
                            CandidatePackage {
                                id: shadow.id(),
                                size: shadow.size_with_ancestors,
                                fees: shadow.mod_fees_with_ancestors,
                                sigops: shadow.sigops_with_ancestors,
                                using_modified: true,
                            }
                        } else {
                            let candidate = CandidatePackage {
                                id: entry.id(),
                                size: entry.size_with_ancestors,
                                fees: entry.mod_fees_with_ancestors,
                                sigops: entry.sigops_with_ancestors,
                                using_modified: false,
                            };
                            base.next();
                            candidate
                        }
                    }
                }
            };
            debug_assert!(!self.in_block.contains(&candidate.id));

            if candidate.fees < self.policy.min_fee_rate.fee(candidate.size) {
                // Everything else we might consider has a lower fee rate
                return (packages_selected, descendants_updated);
            }

            if !self.policy.test_package(self.block_weight, self.block_sigops, candidate.size, candidate.sigops) {
                if candidate.using_modified {
                    // The modified set is consumed best-first, so a failed
                    // entry must be erased for the next best one to surface
                    modified.remove(&candidate.id);
                    failed.insert(candidate.id);
                }

                consecutive_failed += 1;
                if consecutive_failed > MAX_CONSECUTIVE_FAILURES
                    && self.block_weight > self.policy.block_max_weight - COINBASE_WEIGHT_RESERVE
                {
                    // Give up if we're close to full and haven't succeeded in a while
                    break;
                }
                continue;
            }

            // The package is the candidate plus its not-yet-included ancestors
            let mut package: Vec<TransactionId> =
                mempool.calculate_ancestors(&candidate.id).into_iter().filter(|id| !self.in_block.contains(id)).collect();
            package.push(candidate.id);

            if !self.test_package_finality(mempool, &package) {
                if candidate.using_modified {
                    modified.remove(&candidate.id);
                    failed.insert(candidate.id);
                }
                continue;
            }

            // This package will make it in; reset the failure streak
            consecutive_failed = 0;

            // Sort by ancestor count: a transaction has strictly more
            // ancestors than any transaction it depends on, so this yields a
            // valid inclusion order
            package.sort_by_key(|id| (mempool.get(id).unwrap().ancestor_count, *id));

            let mut package_added = true;
            for tx_id in package.iter() {
                if package_added {
                    let entry = mempool.get(tx_id).expect("package members are mempool entries");
                    if entry.tx.has_create_or_call() {
                        package_added = self.attempt_to_add_contract(entry, min_gas_price);
                        if !package_added && candidate.using_modified {
                            // One erasure marks the whole package as failed
                            modified.remove(&candidate.id);
                            failed.insert(candidate.id);
                        }
                    } else {
                        self.add_to_block(entry);
                    }
                }
                // Erase from the modified set, if present
                modified.remove(tx_id);
            }
            if !package_added {
                // Leave the already placed prefix in the block but skip the
                // descendant update, matching the package fit accounting
                continue;
            }

            packages_selected += 1;

            // Shrink the effective ancestor state of everything depending on
            // the transactions just included
            descendants_updated += self.update_packages_for_added(mempool, &package, &mut modified);
        }

        (packages_selected, descendants_updated)
    }

    pub(crate) fn add_to_block(&mut self, entry: &MempoolEntry) {
        self.template.block.transactions.push((*entry.tx).clone());
        self.template.tx_fees.push(entry.fee as i64);
        self.template.tx_sigops_cost.push(entry.sigop_cost);
        self.block_weight += entry.weight;
        self.block_tx_count += 1;
        self.block_sigops += entry.sigop_cost;
        self.fees += entry.fee as i64;
        self.in_block.insert(entry.id());

        if self.config.print_priority {
            info!("fee rate {} txid {}", FeeRate::from_total(entry.modified_fee, entry.size), entry.id());
        }
    }

    /// Transaction-level checks before adding a package to the block:
    /// every member must be final at the template height.
    fn test_package_finality(&self, mempool: &Mempool, package: &[TransactionId]) -> bool {
        package.iter().all(|id| is_final_tx(&mempool.get(id).unwrap().tx, self.height, self.lock_time_cutoff))
    }

    /// Visits the in-pool descendants of the newly added transactions and
    /// reduces their effective ancestor statistics in the modified set.
    /// Returns the number of updated descendant records.
    fn update_packages_for_added(&self, mempool: &Mempool, added: &[TransactionId], modified: &mut ModifiedTxSet) -> u64 {
        let mut updated = 0;
        for id in added.iter() {
            let included = mempool.get(id).expect("added transactions are mempool entries");
            for descendant_id in mempool.calculate_descendants(id) {
                if self.in_block.contains(&descendant_id) {
                    continue;
                }
                updated += 1;
                modified.reduce_for_included_ancestor(mempool.get(&descendant_id).unwrap(), included);
            }
        }
        updated
    }
}
