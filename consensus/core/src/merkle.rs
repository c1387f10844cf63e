use crate::tx::Transaction;
use ember_hashes::{DoubleSha256, Hash, ZERO_HASH};

/// Computes the merkle root over the given leaf hashes: pairwise
/// double-SHA256 with the last node duplicated on odd levels.
pub fn calc_merkle_root(hashes: impl Iterator<Item = Hash>) -> Hash {
    let mut level: Vec<Hash> = hashes.collect();
    if level.is_empty() {
        return ZERO_HASH;
    }
    while level.len() > 1 {
        if level.len() % 2 == 1 {
            level.push(*level.last().unwrap());
        }
        level = level
            .chunks_exact(2)
            .map(|pair| {
                let mut hasher = DoubleSha256::new();
                hasher.update(pair[0]).update(pair[1]);
                hasher.finalize()
            })
            .collect();
    }
    level[0]
}

/// The merkle root over the block's transaction ids.
pub fn calc_block_merkle_root(transactions: &[Transaction]) -> Hash {
    calc_merkle_root(transactions.iter().map(|tx| tx.id()))
}
