use ember_hashes::{DoubleSha256, Hash};
use serde::{Deserialize, Serialize};

/// An Ember block header. `time` is in seconds since epoch; `nonce` stays
/// zero in templates and is ground by the miner (PoW) or replaced by the
/// stake proof (PoS).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Header {
    pub version: u32,
    pub hash_prev_block: Hash,
    pub hash_merkle_root: Hash,
    pub time: u64,
    pub bits: u32,
    pub nonce: u64,
}

impl Header {
    pub fn new(version: u32, hash_prev_block: Hash, hash_merkle_root: Hash, time: u64, bits: u32, nonce: u64) -> Self {
        Self { version, hash_prev_block, hash_merkle_root, time, bits, nonce }
    }

    pub fn hash(&self) -> Hash {
        let mut hasher = DoubleSha256::new();
        hasher.update(self.version.to_le_bytes());
        hasher.update(self.hash_prev_block);
        hasher.update(self.hash_merkle_root);
        hasher.update(self.time.to_le_bytes());
        hasher.update(self.bits.to_le_bytes());
        hasher.update(self.nonce.to_le_bytes());
        hasher.finalize()
    }
}
