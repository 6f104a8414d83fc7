//! The hash oracle the rest of the crate treats as an external collaborator.
//!
//! [`RobinTable`](crate::robin::RobinTable) and [`ShardedMap`](crate::ShardedMap) only ever see
//! the 64-bit fingerprint produced here; they never hash a key themselves. Swapping the hasher
//! below for any other fast, avalanching 64-bit family is a drop-in change.

use std::hash::{Hash, Hasher};

use wyhash::WyHash;

/// A seed baked into the default fingerprint. Picked once; changing it reshuffles every key's
/// shard and home bucket, but does not affect correctness.
const SEED: u64 = 0x9E37_79B9_7F4A_7C15;

/// Produces the 64-bit fingerprint a [`ShardedMap`](crate::ShardedMap) uses to pick a shard and
/// a [`RobinTable`](crate::robin::RobinTable) uses to pick a home bucket.
///
/// The only contract that matters: equal keys (by the key's `Eq` impl) must fingerprint
/// identically, and the fingerprint should be uniformly distributed across its high 48 bits.
/// `Hash`'s own contract already guarantees the former, so the blanket impl below is sound for
/// any `T: Hash` whose `Hash` and `Eq` impls agree.
pub trait Fingerprint {
    /// Computes this key's 64-bit fingerprint.
    fn fingerprint(&self) -> u64;
}

impl<T: Hash + ?Sized> Fingerprint for T {
    fn fingerprint(&self) -> u64 {
        let mut hasher = WyHash::with_seed(SEED);
        self.hash(&mut hasher);
        hasher.finish()
    }
}
