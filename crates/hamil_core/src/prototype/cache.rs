//! # Prototype Cache
//!
//! Interns [`EntityPrototype`]s. Each distinct component set gets one
//! [`CachedPrototype`] and a dense cache id. Entries live in fixed-size
//! pages so cache ids map to entries with a shift and a mask.

use tracing::debug;

use super::cached::CachedPrototype;
use super::entity_prototype::EntityPrototype;
use crate::util::HashIndex;

/// Entries per cache page (power of two).
pub const CACHE_ENTRIES_PER_PAGE: usize = 16;

const INITIAL_PROTOS: usize = 1024;

/// Lookup table from prototype to [`CachedPrototype`].
pub struct PrototypeCache {
    pages: Vec<Vec<CachedPrototype>>,
    num_protos: usize,
    protos_hash: HashIndex,
}

impl Default for PrototypeCache {
    fn default() -> Self {
        Self::new()
    }
}

impl PrototypeCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pages: Vec::new(),
            num_protos: 0,
            protos_hash: HashIndex::new(INITIAL_PROTOS, INITIAL_PROTOS),
        }
    }

    /// Returns the cache id `proto` was filled under, if any.
    #[must_use]
    pub fn probe(&self, proto: &EntityPrototype) -> Option<u32> {
        let idx = self.protos_hash.find(proto.hash(), |_, idx| {
            self.get(idx)
                .is_some_and(|entry| entry.prototype().equal(proto))
        });
        (idx != HashIndex::INVALID).then_some(idx)
    }

    /// Interns `proto` and returns its new cache id.
    ///
    /// Filling the same prototype twice is a logic error, checked in debug
    /// builds.
    pub fn fill(&mut self, proto: &EntityPrototype) -> u32 {
        debug_assert!(
            self.probe(proto).is_none(),
            "PrototypeCache::fill() called with the same prototype twice"
        );

        let cache_id = self.num_protos as u32;
        if self.num_protos % CACHE_ENTRIES_PER_PAGE == 0 {
            self.pages.push(Vec::with_capacity(CACHE_ENTRIES_PER_PAGE));
        }
        if let Some(page) = self.pages.last_mut() {
            page.push(CachedPrototype::new(proto.clone(), cache_id));
        }
        self.num_protos += 1;
        self.protos_hash.add(proto.hash(), cache_id);

        debug!(
            cache_id,
            components = proto.num_proto_components(),
            capacity = proto.chunk_capacity(),
            "cached entity prototype"
        );
        cache_id
    }

    /// Returns the cache id for `proto`, filling it on a miss.
    pub fn probe_or_fill(&mut self, proto: &EntityPrototype) -> u32 {
        match self.probe(proto) {
            Some(cache_id) => cache_id,
            None => self.fill(proto),
        }
    }

    /// Returns entry `cache_id`.
    #[must_use]
    pub fn get(&self, cache_id: u32) -> Option<&CachedPrototype> {
        let idx = cache_id as usize;
        self.pages
            .get(idx / CACHE_ENTRIES_PER_PAGE)?
            .get(idx % CACHE_ENTRIES_PER_PAGE)
    }

    /// Returns entry `cache_id` mutably.
    pub fn get_mut(&mut self, cache_id: u32) -> Option<&mut CachedPrototype> {
        let idx = cache_id as usize;
        self.pages
            .get_mut(idx / CACHE_ENTRIES_PER_PAGE)?
            .get_mut(idx % CACHE_ENTRIES_PER_PAGE)
    }

    /// Number of cached prototypes.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.num_protos
    }

    /// Checks if nothing has been cached.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.num_protos == 0
    }

    /// Calls `f` on every entry in cache id order.
    pub fn foreach_cached_proto<F: FnMut(&CachedPrototype)>(&self, mut f: F) {
        for entry in self.pages.iter().flatten() {
            f(entry);
        }
    }

    /// Calls `f` on every entry mutably, in cache id order.
    pub fn foreach_cached_proto_mut<F: FnMut(&mut CachedPrototype)>(&mut self, mut f: F) {
        for entry in self.pages.iter_mut().flatten() {
            f(entry);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::ComponentMeta;
    use crate::ecs::components::{GameObject, Light, Transform};

    #[test]
    fn test_probe_fill() {
        let mut cache = PrototypeCache::new();
        let a = EntityPrototype::new().with::<Transform>();
        let b = EntityPrototype::new().with::<Transform>().with::<Light>();

        assert_eq!(cache.probe(&a), None);
        let id_a = cache.fill(&a);
        let id_b = cache.fill(&b);
        assert_ne!(id_a, id_b);
        assert_eq!(cache.probe(&a), Some(id_a));
        assert_eq!(cache.probe(&b), Some(id_b));
        assert_eq!(cache.probe_or_fill(&b), id_b);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(id_b).unwrap().prototype(), &b);
    }

    #[test]
    fn test_pages_roll_over() {
        let mut cache = PrototypeCache::new();
        let base = EntityPrototype::new().with::<GameObject>();
        let ids: Vec<u32> = (10u8..40)
            .map(|proto_id| {
                let proto = base.extend(ComponentMeta {
                    proto_id,
                    tag: "Generated",
                    data_size: 4,
                    align: 4,
                    flags: 0,
                });
                cache.probe_or_fill(&proto)
            })
            .collect();
        assert_eq!(ids, (0..30).collect::<Vec<u32>>());
        assert!(cache.len() > CACHE_ENTRIES_PER_PAGE);

        let mut seen = 0;
        cache.foreach_cached_proto(|entry| {
            assert_eq!(entry.cache_id(), seen);
            assert!(entry.prototype().includes(&base));
            seen += 1;
        });
        assert_eq!(seen, 30);
        assert!(cache.get(30).is_none());
        assert_eq!(cache.get_mut(17).map(|entry| entry.cache_id()), Some(17));
    }
}
