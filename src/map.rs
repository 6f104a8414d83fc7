//! The sharding and locking layer: dispatches a keyed operation to the shard its fingerprint
//! selects, holding only the lock that operation needs.

use std::fmt;

use crossbeam_utils::CachePadded;
use parking_lot::RwLock;

use crate::default_shard_amount;
use crate::fingerprint::Fingerprint;
use crate::robin::RobinTable;

/// A concurrent hash map partitioned into independently-locked shards.
///
/// Each shard is an entirely separate [`RobinTable`](crate::robin::RobinTable) behind its own
/// cache-padded reader/writer lock, so operations on keys that land in different shards proceed
/// without contending on the same lock. There is no cross-shard atomicity: [`len`](Self::len) and
/// [`range`](Self::range) each visit every shard in turn and never observe the whole map at a
/// single instant.
///
/// `K` only needs [`Fingerprint`] (a blanket impl covers every `Hash` type) and [`Eq`]; `get` and
/// `mutate` additionally require `V: Clone`, since values are handed back by value rather than as
/// reference handles; this map deliberately does not expose reference-stable guards.
pub struct ShardedMap<K, V> {
    shards: Box<[CachePadded<RwLock<RobinTable<K, V>>>]>,
    shard_count: usize,
}

impl<K, V> ShardedMap<K, V>
where
    K: Eq + Fingerprint,
{
    /// Creates a map with roughly `cap` entries worth of pre-sized capacity, spread evenly
    /// across shards. `cap = 0` selects an implementation-default initial capacity per shard.
    ///
    /// The shard count is fixed for the map's lifetime: the smallest power of two that is at
    /// least `16 *` the number of logical CPUs (via [`std::thread::available_parallelism`]).
    pub fn new(cap: usize) -> Self {
        let shard_count = default_shard_amount();
        let per_shard_cap = cap / shard_count;
        let shards = (0..shard_count)
            .map(|_| CachePadded::new(RwLock::new(RobinTable::with_capacity(per_shard_cap))))
            .collect();

        ShardedMap {
            shards,
            shard_count,
        }
    }

    #[inline(always)]
    fn shard_index(&self, hash: u64) -> usize {
        (hash as usize) & (self.shard_count - 1)
    }

    /// Inserts or overwrites `key`. Returns the previous value and whether `key` was already
    /// present.
    ///
    /// **Locking behaviour:** acquires the target shard's exclusive lock for the duration of the
    /// call.
    pub fn set(&self, key: K, value: V) -> (Option<V>, bool) {
        let hash = key.fingerprint();
        let idx = self.shard_index(hash);
        self.shards[idx].write().insert(hash, key, value)
    }

    /// Looks up `key`, cloning the stored value out from under the shard lock.
    ///
    /// **Locking behaviour:** acquires the target shard's shared lock for the duration of the
    /// call.
    pub fn get(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        let hash = key.fingerprint();
        let idx = self.shard_index(hash);
        self.shards[idx].read().get(hash, key).cloned()
    }

    /// Removes `key` if present. Returns the removed value and whether it was present.
    ///
    /// **Locking behaviour:** acquires the target shard's exclusive lock for the duration of the
    /// call.
    pub fn delete(&self, key: &K) -> (Option<V>, bool) {
        let hash = key.fingerprint();
        let idx = self.shard_index(hash);
        self.shards[idx].write().remove(hash, key)
    }

    /// Atomic single-entry read-modify-write.
    ///
    /// `f` receives the key's current value (`None` if absent) and returns the value to store
    /// together with a `keep` flag: `keep = true` inserts/overwrites with the returned value,
    /// `keep = false` deletes the entry (a no-op if it was already absent).
    ///
    /// Returns `+1` if this call created a new entry, `-1` if it deleted an existing one, `0`
    /// otherwise.
    ///
    /// **Locking behaviour:** acquires the target shard's exclusive lock for the duration of the
    /// call, including the call to `f`. `f` must not call back into this map, since doing so
    /// deadlocks: the shard lock is not reentrant. If `f` panics, the entry is left exactly as it
    /// was found; nothing is evicted before `f` has committed to a result.
    pub fn mutate<F>(&self, key: K, f: F) -> i8
    where
        V: Clone,
        F: FnOnce(Option<V>) -> (V, bool),
    {
        let hash = key.fingerprint();
        let idx = self.shard_index(hash);
        let mut shard = self.shards[idx].write();

        let old_value = shard.get(hash, &key).cloned();
        let existed = old_value.is_some();
        let (new_value, keep) = f(old_value);

        if keep {
            shard.insert(hash, key, new_value);
            if existed {
                0
            } else {
                1
            }
        } else if existed {
            shard.remove(hash, &key);
            -1
        } else {
            0
        }
    }

    /// Sums the per-shard sizes over a sequential sweep. Not a consistent snapshot under
    /// concurrent writers; see the crate-level docs.
    ///
    /// **Locking behaviour:** acquires every shard's exclusive lock in turn (to serialize with
    /// pending writers while counting), one at a time.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.write().len()).sum()
    }

    /// `true` iff [`len`](Self::len) is `0`.
    ///
    /// **Locking behaviour:** see [`len`](Self::len).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Visits every entry across every shard, in shard-index order, stopping early if `visit`
    /// returns `false`. There is no cross-shard consistency: entries in a shard visited later may
    /// reflect writes that happened after this call started.
    ///
    /// **Locking behaviour:** acquires each shard's shared lock in turn, one at a time, releasing
    /// it before moving to the next shard. `visit` must not call back into this map.
    pub fn range(&self, mut visit: impl FnMut(&K, &V) -> bool) {
        for shard in self.shards.iter() {
            let table = shard.read();
            if !table.range(&mut visit) {
                break;
            }
        }
    }

    /// Empties every shard, reinitializing each to its original per-shard capacity.
    ///
    /// **Locking behaviour:** acquires each shard's exclusive lock in turn, one at a time.
    pub fn clear(&self) {
        for shard in self.shards.iter() {
            shard.write().clear();
        }
    }

    /// The number of shards backing this map, fixed at construction.
    pub fn shard_count(&self) -> usize {
        self.shard_count
    }
}

impl<K, V> Default for ShardedMap<K, V>
where
    K: Eq + Fingerprint,
{
    fn default() -> Self {
        Self::new(0)
    }
}

impl<K, V> fmt::Debug for ShardedMap<K, V>
where
    K: Eq + Fingerprint + fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        self.range(|k, v| {
            map.entry(k, v);
            true
        });
        map.finish()
    }
}
