//! # Hash Index
//!
//! Open hash table mapping sparse 32-bit keys onto dense array indices.
//!
//! The index owns no payload. It stores two flat arrays:
//!
//! ```text
//! hash[key & mask]  -> head index of the key's chain
//! chain[index]      -> next index in the same chain
//! ```
//!
//! Several keys may land in the same bucket, so a chain can hold indices
//! belonging to different keys. Callers resolve that with [`HashIndex::find`]
//! and a predicate that inspects the payload at each candidate index.

/// Hash key type.
pub type Key = u32;

/// Dense array index type.
pub type Index = u32;

/// Default number of hash buckets.
pub const INITIAL_HASH_SIZE: usize = 1024;

/// Default chain growth granularity.
pub const INITIAL_HASH_GRANULARITY: usize = 1024;

/// Open hash index with chained buckets.
///
/// Storage is allocated lazily on the first [`add`](Self::add), so an empty
/// index costs two empty `Vec`s.
#[derive(Clone, Debug)]
pub struct HashIndex {
    /// Bucket heads, `hash_size` entries once allocated.
    hash: Vec<Index>,
    /// Chain links, `chain_size` entries once allocated.
    chain: Vec<Index>,
    /// Number of buckets (power of two).
    hash_size: usize,
    /// Logical chain capacity (may exceed `chain.len()` before allocation).
    chain_size: usize,
    /// Chain growth is rounded up to a multiple of this.
    granularity: usize,
    /// `hash_size - 1`.
    hash_mask: Key,
}

impl HashIndex {
    /// Terminates every chain.
    pub const INVALID: Index = Index::MAX;

    /// Creates an index with `hash_size` buckets and room for `chain_size`
    /// indices.
    ///
    /// # Panics
    ///
    /// Panics if `hash_size` is not a power of two.
    #[must_use]
    pub fn new(hash_size: usize, chain_size: usize) -> Self {
        assert!(
            hash_size.is_power_of_two(),
            "HashIndex hash_size must be a power of 2"
        );

        Self {
            hash: Vec::new(),
            chain: Vec::new(),
            hash_size,
            chain_size,
            granularity: INITIAL_HASH_GRANULARITY,
            hash_mask: (hash_size - 1) as Key,
        }
    }

    /// Overrides the chain growth granularity.
    ///
    /// # Panics
    ///
    /// Panics if `granularity` is zero.
    #[must_use]
    pub fn with_granularity(mut self, granularity: usize) -> Self {
        assert!(granularity > 0, "HashIndex granularity must be non-zero");
        self.granularity = granularity;
        self
    }

    /// Returns the number of hash buckets.
    #[inline]
    #[must_use]
    pub const fn hash_size(&self) -> usize {
        self.hash_size
    }

    /// Returns the chain capacity.
    #[inline]
    #[must_use]
    pub const fn chain_size(&self) -> usize {
        self.chain_size
    }

    /// Checks whether backing storage has been allocated yet.
    #[inline]
    #[must_use]
    pub fn is_allocated(&self) -> bool {
        !self.hash.is_empty()
    }

    fn alloc(&mut self, chain_size: usize) {
        self.chain_size = chain_size;
        self.hash = vec![Self::INVALID; self.hash_size];
        self.chain = vec![Self::INVALID; chain_size];
    }

    /// Grows the chain so that indices below `chain_size` can be added.
    ///
    /// The new size is rounded up to the granularity. Existing associations
    /// are preserved. Shrinking is a no-op.
    pub fn resize(&mut self, chain_size: usize) {
        if chain_size <= self.chain_size {
            return;
        }

        let rem = chain_size % self.granularity;
        let new_size = if rem == 0 {
            chain_size
        } else {
            chain_size + self.granularity - rem
        };

        self.chain_size = new_size;
        if self.is_allocated() {
            self.chain.resize(new_size, Self::INVALID);
        }
    }

    /// Drops every association without releasing memory.
    pub fn clear(&mut self) {
        self.hash.fill(Self::INVALID);
        self.chain.fill(Self::INVALID);
    }

    /// Prepends `idx` to the chain for `key`.
    ///
    /// The index does not deduplicate: adding the same `(key, idx)` pair
    /// twice corrupts the chain.
    pub fn add(&mut self, key: Key, idx: Index) {
        debug_assert!(idx != Self::INVALID, "HashIndex::add() with INVALID index");

        let needed = idx as usize + 1;
        if !self.is_allocated() {
            self.alloc(self.chain_size.max(needed));
        } else if needed > self.chain.len() {
            self.resize(needed);
        }

        let h = (key & self.hash_mask) as usize;
        self.chain[idx as usize] = self.hash[h];
        self.hash[h] = idx;
    }

    /// Unlinks `idx` from the chain for `key`.
    ///
    /// Removing a pair that was never added is a no-op.
    pub fn remove(&mut self, key: Key, idx: Index) {
        if !self.is_allocated() || idx as usize >= self.chain.len() {
            return;
        }

        let h = (key & self.hash_mask) as usize;
        let slot = idx as usize;

        if self.hash[h] == idx {
            self.hash[h] = self.chain[slot];
            self.chain[slot] = Self::INVALID;
            return;
        }

        let mut i = self.hash[h];
        while i != Self::INVALID {
            let link = self.chain[i as usize];
            if link == idx {
                self.chain[i as usize] = self.chain[slot];
                self.chain[slot] = Self::INVALID;
                return;
            }
            i = link;
        }
    }

    /// Returns the head of the chain for `key`, or [`Self::INVALID`].
    #[inline]
    #[must_use]
    pub fn first(&self, key: Key) -> Index {
        if !self.is_allocated() {
            return Self::INVALID;
        }
        self.hash[(key & self.hash_mask) as usize]
    }

    /// Returns the index following `idx` in its chain, or [`Self::INVALID`].
    #[inline]
    #[must_use]
    pub fn next(&self, idx: Index) -> Index {
        debug_assert!(
            (idx as usize) < self.chain_size,
            "Invalid index for HashIndex::next()"
        );
        self.chain.get(idx as usize).copied().unwrap_or(Self::INVALID)
    }

    /// Iterates over every index in the chain for `key`.
    ///
    /// This includes indices of other keys that share the bucket.
    #[must_use]
    pub fn chain(&self, key: Key) -> Chain<'_> {
        Chain {
            index: self,
            current: self.first(key),
        }
    }

    /// Walks the chain for `key` and returns the first index for which
    /// `compare(key, index)` holds, or [`Self::INVALID`].
    #[inline]
    pub fn find<F>(&self, key: Key, mut compare: F) -> Index
    where
        F: FnMut(Key, Index) -> bool,
    {
        let mut index = self.first(key);
        while index != Self::INVALID {
            if compare(key, index) {
                return index;
            }
            index = self.next(index);
        }
        Self::INVALID
    }

    /// Returns how evenly indices are spread over buckets, from 0 to 100.
    ///
    /// 100 means every bucket is within one entry of the average.
    #[must_use]
    pub fn spread(&self) -> u32 {
        if !self.is_allocated() {
            return 100;
        }

        let counts: Vec<usize> = (0..self.hash_size)
            .map(|bucket| {
                let mut n = 0;
                let mut idx = self.hash[bucket];
                while idx != Self::INVALID {
                    n += 1;
                    idx = self.chain[idx as usize];
                }
                n
            })
            .collect();

        let total: usize = counts.iter().sum();
        if total <= 1 {
            return 100;
        }

        let avg = total / self.hash_size;
        let err: usize = counts
            .iter()
            .map(|&n| n.abs_diff(avg))
            .filter(|&e| e > 1)
            .map(|e| e - 1)
            .sum();

        100 - (err * 100 / total).min(100) as u32
    }
}

impl Default for HashIndex {
    fn default() -> Self {
        Self::new(INITIAL_HASH_SIZE, INITIAL_HASH_SIZE)
    }
}

/// Iterator over a single bucket chain.
pub struct Chain<'a> {
    index: &'a HashIndex,
    current: Index,
}

impl Iterator for Chain<'_> {
    type Item = Index;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.current == HashIndex::INVALID {
            return None;
        }
        let idx = self.current;
        self.current = self.index.next(idx);
        Some(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_index() {
        let index = HashIndex::new(16, 16);
        assert!(!index.is_allocated());
        assert_eq!(index.first(42), HashIndex::INVALID);
        assert_eq!(index.find(42, |_, _| true), HashIndex::INVALID);
        assert_eq!(index.spread(), 100);
    }

    #[test]
    fn test_add_find_remove() {
        let keys = [7u32, 23, 39, 1000, 99];
        let mut index = HashIndex::new(16, 8);

        for (i, &k) in keys.iter().enumerate() {
            index.add(k, i as Index);
        }

        for (i, &k) in keys.iter().enumerate() {
            let found = index.find(k, |key, idx| keys[idx as usize] == key);
            assert_eq!(found, i as Index);
        }

        // 7, 23 and 39 share a bucket
        index.remove(7, 0);
        assert_eq!(index.find(7, |key, idx| keys[idx as usize] == key), HashIndex::INVALID);
        assert_eq!(index.find(23, |key, idx| keys[idx as usize] == key), 1);
        assert_eq!(index.find(39, |key, idx| keys[idx as usize] == key), 2);
    }

    #[test]
    fn test_chain_prepends() {
        let mut index = HashIndex::new(4, 4);
        index.add(1, 0);
        index.add(1, 1);
        index.add(1, 2);

        let chain: Vec<_> = index.chain(1).collect();
        assert_eq!(chain, vec![2, 1, 0]);

        index.remove(1, 1);
        let chain: Vec<_> = index.chain(1).collect();
        assert_eq!(chain, vec![2, 0]);
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut index = HashIndex::new(4, 4);
        index.remove(3, 0);

        index.add(1, 0);
        index.add(5, 1); // same bucket as 1
        index.remove(1, 3);
        index.remove(2, 0); // wrong bucket

        let chain: Vec<_> = index.chain(1).collect();
        assert_eq!(chain, vec![1, 0]);
    }

    #[test]
    fn test_grows_and_preserves() {
        let mut index = HashIndex::new(8, 2).with_granularity(4);
        for i in 0..100u32 {
            index.add(i * 31, i);
        }
        assert!(index.chain_size() >= 100);
        assert_eq!(index.chain_size() % 4, 0);

        for i in 0..100u32 {
            assert_eq!(index.find(i * 31, |_, idx| idx == i), i);
        }

        index.resize(1000);
        assert_eq!(index.chain_size(), 1000);
        for i in 0..100u32 {
            assert_eq!(index.find(i * 31, |_, idx| idx == i), i);
        }
    }

    #[test]
    fn test_clear_keeps_capacity() {
        let mut index = HashIndex::new(8, 8);
        index.add(3, 3);
        let chain_size = index.chain_size();

        index.clear();
        assert_eq!(index.first(3), HashIndex::INVALID);
        assert_eq!(index.chain_size(), chain_size);

        index.add(3, 5);
        assert_eq!(index.first(3), 5);
    }

    #[test]
    fn test_spread_uniform() {
        let mut index = HashIndex::new(16, 64);
        for i in 0..64u32 {
            index.add(i, i);
        }
        assert_eq!(index.spread(), 100);

        let mut skewed = HashIndex::new(16, 64);
        for i in 0..64u32 {
            skewed.add(i * 16, i);
        }
        assert!(skewed.spread() < 100);
    }

    #[test]
    #[should_panic(expected = "power of 2")]
    fn test_rejects_non_power_of_two() {
        let _ = HashIndex::new(12, 12);
    }
}
