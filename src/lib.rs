//! A concurrent, in-memory hash map partitioned into independently-locked shards.
//!
//! [`ShardedMap`] behaves like a conventional hash map (unique keys, last-write-wins), but
//! spreads its entries across `N` shards, each an entirely separate
//! [`RobinTable`](robin::RobinTable) behind its own cache-padded reader/writer lock. A keyed
//! operation hashes the key once, picks exactly one shard from that hash, and only ever locks
//! that shard: unrelated keys landing in different shards never contend.
//!
//! ```
//! use shardmap::ShardedMap;
//!
//! let map: ShardedMap<String, i32> = ShardedMap::new(0);
//! map.set("answer".to_string(), 42);
//! assert_eq!(map.get(&"answer".to_string()), Some(42));
//! assert_eq!(map.mutate("answer".to_string(), |old| (old.unwrap_or(0) + 1, true)), 0);
//! assert_eq!(map.get(&"answer".to_string()), Some(43));
//! ```
//!
//! What this map does *not* give you: ordered iteration, iterator stability across mutation,
//! snapshot isolation across shards, multi-key transactions, or reference-stable value handles.
//! [`ShardedMap::len`] and [`ShardedMap::range`] each sweep every shard in turn and never observe
//! the whole map at one instant; see their docs for exactly what they guarantee.

mod fingerprint;
mod map;
mod robin;

pub use fingerprint::Fingerprint;
pub use map::ShardedMap;

use std::sync::OnceLock;

/// The smallest power of two that is at least `16 *` the number of logical CPUs, computed once
/// and cached for the life of the process.
fn default_shard_amount() -> usize {
    static DEFAULT_SHARD_AMOUNT: OnceLock<usize> = OnceLock::new();
    *DEFAULT_SHARD_AMOUNT.get_or_init(|| {
        (std::thread::available_parallelism().map_or(1, usize::from) * 16).next_power_of_two()
    })
}
