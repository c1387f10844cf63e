use crate::{Hash, HASH_SIZE};
use sha2::{Digest, Sha256};

/// The double-SHA256 hasher used for transaction ids, block hashes and
/// merkle nodes.
#[derive(Clone)]
pub struct DoubleSha256(Sha256);

impl DoubleSha256 {
    #[inline]
    pub fn new() -> Self {
        Self(Sha256::new())
    }

    #[inline]
    pub fn update<A: AsRef<[u8]>>(&mut self, data: A) -> &mut Self {
        self.0.update(data.as_ref());
        self
    }

    #[inline]
    pub fn finalize(self) -> Hash {
        let first = self.0.finalize();
        let second = Sha256::digest(first);
        let mut bytes = [0u8; HASH_SIZE];
        bytes.copy_from_slice(&second);
        Hash::from_bytes(bytes)
    }

    /// One-shot double-SHA256 over `data`.
    #[inline]
    pub fn hash<A: AsRef<[u8]>>(data: A) -> Hash {
        let mut hasher = Self::new();
        hasher.update(data);
        hasher.finalize()
    }
}

impl Default for DoubleSha256 {
    fn default() -> Self {
        Self::new()
    }
}
