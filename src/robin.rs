//! The per-shard open-addressed hash table: Robin Hood probing over a packed hash/DIB metadata
//! word, with backward-shift deletion and incremental grow/shrink.
//!
//! Everything here is single-threaded; callers (see [`crate::map`]) supply whatever mutual
//! exclusion the shard needs. The table only ever sees a precomputed 64-bit fingerprint; it
//! never hashes a key itself.

/// Slots never shrink below this many entries.
const MIN_CAPACITY: usize = 8;

/// `dib` lives in the low 16 bits of the packed metadata word; `0` marks an empty slot, `1`
/// means "in its ideal home", `k` means "probed `k - 1` steps past home".
const DIB_BITS: u32 = 16;
const DIB_MASK: u64 = 0xFFFF;

#[inline(always)]
fn pack(hash_high: u64, dib: u16) -> u64 {
    (hash_high << DIB_BITS) | dib as u64
}

#[inline(always)]
fn dib_of(meta: u64) -> u16 {
    (meta & DIB_MASK) as u16
}

#[inline(always)]
fn hash_high_of(meta: u64) -> u64 {
    meta >> DIB_BITS
}

/// One independently-owned Robin Hood hash table. Lives behind a shard lock; see
/// [`crate::map::ShardedMap`] for the concurrent wrapper.
pub(crate) struct RobinTable<K, V> {
    meta: Vec<u64>,
    entries: Vec<Option<(K, V)>>,
    len: usize,
    mask: usize,
    /// User-requested minimum capacity floor; shrinking never takes the table below this.
    cap: usize,
}

impl<K: Eq, V> RobinTable<K, V> {
    pub(crate) fn with_capacity(cap: usize) -> Self {
        let size = Self::round_capacity(cap);
        RobinTable {
            meta: vec![0; size],
            entries: (0..size).map(|_| None).collect(),
            len: 0,
            mask: size - 1,
            cap,
        }
    }

    fn round_capacity(cap: usize) -> usize {
        cap.max(MIN_CAPACITY).next_power_of_two()
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn capacity(&self) -> usize {
        self.mask + 1
    }

    fn grow_at(&self) -> usize {
        (self.capacity() * 85) / 100
    }

    fn shrink_at(&self) -> usize {
        (self.capacity() * 15) / 100
    }

    #[inline(always)]
    fn home(&self, hash_high: u64) -> usize {
        (hash_high as usize) & self.mask
    }

    /// Reinitializes this table in place, preserving the original `cap` floor. Used by
    /// `ShardedMap::clear`.
    pub(crate) fn clear(&mut self) {
        *self = Self::with_capacity(self.cap);
    }

    pub(crate) fn get(&self, hash: u64, key: &K) -> Option<&V> {
        let hash_high = hash >> DIB_BITS;
        let mut idx = self.home(hash_high);
        loop {
            let meta = self.meta[idx];
            if dib_of(meta) == 0 {
                return None;
            }
            if hash_high_of(meta) == hash_high {
                if let Some((k, v)) = &self.entries[idx] {
                    if k == key {
                        return Some(v);
                    }
                }
            }
            idx = (idx + 1) & self.mask;
        }
    }

    /// Inserts or overwrites `key`. Returns the previous value and whether `key` was already
    /// present, mirroring `HashMap::insert`'s "previous value" shape but paired with a flag
    /// rather than folding absence into `None` ambiguity.
    pub(crate) fn insert(&mut self, hash: u64, key: K, value: V) -> (Option<V>, bool) {
        if self.len >= self.grow_at() {
            self.resize(self.capacity() * 2);
        }
        let hash_high = hash >> DIB_BITS;
        self.insert_raw(hash_high, key, value)
    }

    /// The Robin Hood displacement loop, parameterized on an already-extracted `hash_high` so
    /// `resize` can reinsert surviving entries without recomputing or re-fingerprinting them.
    fn insert_raw(&mut self, hash_high: u64, key: K, value: V) -> (Option<V>, bool) {
        let mut idx = self.home(hash_high);
        let mut cur_hash_high = hash_high;
        let mut cur_dib: u16 = 1;
        let mut cur_key = key;
        let mut cur_value = value;

        loop {
            let meta = self.meta[idx];
            let slot_dib = dib_of(meta);

            if slot_dib == 0 {
                self.meta[idx] = pack(cur_hash_high, cur_dib);
                self.entries[idx] = Some((cur_key, cur_value));
                self.len += 1;
                return (None, false);
            }

            if hash_high_of(meta) == cur_hash_high {
                let is_match = matches!(&self.entries[idx], Some((k, _)) if *k == cur_key);
                if is_match {
                    let (_, old_value) = self.entries[idx]
                        .replace((cur_key, cur_value))
                        .expect("occupied slot must hold an entry");
                    return (Some(old_value), true);
                }
            }

            if slot_dib < cur_dib {
                let (disp_key, disp_value) = self.entries[idx]
                    .replace((cur_key, cur_value))
                    .expect("occupied slot must hold an entry");
                self.meta[idx] = pack(cur_hash_high, cur_dib);

                cur_hash_high = hash_high_of(meta);
                cur_dib = slot_dib;
                cur_key = disp_key;
                cur_value = disp_value;
            }

            assert!(
                cur_dib < u16::MAX,
                "probe displacement exceeded 65535; unreachable under the 0.85 load factor \
                 unless the hash function is badly broken"
            );
            idx = (idx + 1) & self.mask;
            cur_dib += 1;
        }
    }

    pub(crate) fn remove(&mut self, hash: u64, key: &K) -> (Option<V>, bool) {
        let hash_high = hash >> DIB_BITS;
        let mut idx = self.home(hash_high);
        loop {
            let meta = self.meta[idx];
            if dib_of(meta) == 0 {
                return (None, false);
            }
            if hash_high_of(meta) == hash_high {
                let is_match = matches!(&self.entries[idx], Some((k, _)) if k == key);
                if is_match {
                    let (_, old_value) =
                        self.entries[idx].take().expect("occupied slot must hold an entry");
                    self.meta[idx] = 0;
                    self.len -= 1;
                    self.backward_shift(idx);

                    if self.capacity() > Self::round_capacity(self.cap) && self.len <= self.shrink_at() {
                        self.resize(self.len);
                    }
                    return (Some(old_value), true);
                }
            }
            idx = (idx + 1) & self.mask;
        }
    }

    /// Slides every entry following `empty` one slot back, decrementing its DIB, until a slot
    /// already in (or past) its own home is reached. Tombstone-free: no dead slots accumulate.
    fn backward_shift(&mut self, mut empty: usize) {
        loop {
            let next = (empty + 1) & self.mask;
            let next_meta = self.meta[next];
            let next_dib = dib_of(next_meta);
            if next_dib <= 1 {
                break;
            }

            self.entries[empty] = self.entries[next].take();
            self.meta[empty] = pack(hash_high_of(next_meta), next_dib - 1);
            self.meta[next] = 0;

            empty = next;
        }
    }

    fn resize(&mut self, min_capacity: usize) {
        let new_size = Self::round_capacity(min_capacity.max(self.cap));
        if new_size == self.capacity() {
            return;
        }

        let old_meta = std::mem::replace(&mut self.meta, vec![0; new_size]);
        let old_entries =
            std::mem::replace(&mut self.entries, (0..new_size).map(|_| None).collect());
        self.mask = new_size - 1;
        self.len = 0;

        for (meta, entry) in old_meta.into_iter().zip(old_entries.into_iter()) {
            if dib_of(meta) == 0 {
                continue;
            }
            let (key, value) = entry.expect("occupied slot must hold an entry");
            let hash_high = hash_high_of(meta);
            self.insert_raw(hash_high, key, value);
        }
    }

    pub(crate) fn get_pos(&self, pos: usize) -> Option<(&K, &V)> {
        let start = pos & self.mask;
        for step in 0..self.capacity() {
            let idx = (start + step) & self.mask;
            if dib_of(self.meta[idx]) != 0 {
                return self.entries[idx].as_ref().map(|(k, v)| (k, v));
            }
        }
        None
    }

    /// Visits every occupied slot in index order. Returns `false` if `visit` asked to stop
    /// early. Not safe to call while the same shard is being mutated concurrently.
    pub(crate) fn range(&self, mut visit: impl FnMut(&K, &V) -> bool) -> bool {
        for (meta, entry) in self.meta.iter().zip(self.entries.iter()) {
            if dib_of(*meta) == 0 {
                continue;
            }
            if let Some((k, v)) = entry {
                if !visit(k, v) {
                    return false;
                }
            }
        }
        true
    }

    #[cfg(test)]
    fn check_invariants(&self) {
        let mut counted = 0usize;
        for (idx, &meta) in self.meta.iter().enumerate() {
            let dib = dib_of(meta);
            if dib == 0 {
                assert!(self.entries[idx].is_none(), "empty slot {idx} holds an entry");
                continue;
            }
            counted += 1;
            assert!(self.entries[idx].is_some(), "occupied slot {idx} missing entry");
            let home = self.home(hash_high_of(meta));
            let actual_disp = idx.wrapping_sub(home) & self.mask;
            assert_eq!(
                actual_disp + 1,
                dib as usize,
                "slot {idx} dib does not match its displacement from home {home}"
            );
        }
        assert_eq!(counted, self.len, "len out of sync with occupied slot count");
    }
}
