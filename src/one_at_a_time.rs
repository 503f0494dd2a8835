//! Bob Jenkins' one-at-a-time hash, the default hasher of `ChainedTable`.
//!
//! The table feeds raw key bytes straight into `Hasher::write`, so the
//! result for a key equals the classic `one_at_a_time(key, len)` output.

use core::hash::{BuildHasher, Hasher};

/// Streaming one-at-a-time state. The final avalanche runs in `finish`,
/// which leaves the state untouched so it can be called repeatedly.
#[derive(Clone, Copy, Debug, Default)]
pub struct OneAtATime {
    hash: u32,
}

impl OneAtATime {
    pub const fn new() -> Self {
        Self { hash: 0 }
    }

    /// Hash a whole byte string in one call.
    pub fn hash_bytes(bytes: &[u8]) -> u32 {
        let mut h = Self::new();
        h.write(bytes);
        h.finish32()
    }

    #[inline]
    pub fn finish32(&self) -> u32 {
        let mut hash = self.hash;
        hash = hash.wrapping_add(hash << 3);
        hash ^= hash >> 11;
        hash.wrapping_add(hash << 15)
    }
}

impl Hasher for OneAtATime {
    #[inline]
    fn write(&mut self, bytes: &[u8]) {
        let mut hash = self.hash;
        for &b in bytes {
            hash = hash.wrapping_add(u32::from(b));
            hash = hash.wrapping_add(hash << 10);
            hash ^= hash >> 6;
        }
        self.hash = hash;
    }

    #[inline]
    fn finish(&self) -> u64 {
        u64::from(self.finish32())
    }
}

/// Unkeyed builder for `OneAtATime`; every hasher starts from zero.
#[derive(Clone, Copy, Debug, Default)]
pub struct OneAtATimeState;

impl BuildHasher for OneAtATimeState {
    type Hasher = OneAtATime;

    fn build_hasher(&self) -> Self::Hasher {
        OneAtATime::new()
    }
}
