//! # Entity Prototypes
//!
//! A prototype is the set of component types an entity carries: a 128-bit
//! bitmap indexed by `PROTO_ID`, plus the layout metadata of each member.
//!
//! Chunks of a prototype store component data struct-of-arrays. Arrays
//! follow each other in `PROTO_ID` order, each aligned to its component:
//!
//! ```text
//! chunk: [ A A A A .. | pad | B B B B .. | C C C C .. ]
//!          ^ soa(A)          ^ soa(B)      ^ soa(C)
//! ```

use std::hash::Hasher;

use siphasher::sip::SipHasher13;

use crate::ecs::{Component, ComponentMeta, ComponentProtoId, MAX_COMPONENT_TYPES};
use crate::memory::PROTOTYPE_CHUNK_SIZE;

/// Hash of a prototype's component bitmap.
pub type PrototypeHash = u32;

/// Largest component alignment chunk memory guarantees.
pub const MAX_CHUNK_ALIGN: usize = 8;

const BITMAP_WORDS: usize = MAX_COMPONENT_TYPES / 64;

#[inline]
const fn align_up(offset: usize, align: usize) -> usize {
    (offset + align - 1) & !(align - 1)
}

/// Set of component types shared by a group of entities.
#[derive(Clone, Debug, Default)]
pub struct EntityPrototype {
    bits: [u64; BITMAP_WORDS],
    /// Member metadata, sorted by proto id.
    metas: Vec<ComponentMeta>,
}

impl EntityPrototype {
    /// Creates the empty prototype.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns this prototype with `T` added.
    #[must_use]
    pub fn with<T: Component>(self) -> Self {
        self.extend(ComponentMeta::of::<T>())
    }

    /// Returns a copy with `meta`'s component added.
    ///
    /// # Panics
    ///
    /// Panics if the component needs more than [`MAX_CHUNK_ALIGN`] alignment.
    #[must_use]
    pub fn extend(&self, meta: ComponentMeta) -> Self {
        assert!(
            meta.align <= MAX_CHUNK_ALIGN,
            "component {} needs {}-byte alignment, chunks provide {}",
            meta.tag,
            meta.align,
            MAX_CHUNK_ALIGN
        );

        let mut extended = self.clone();
        if !extended.includes_proto(meta.proto_id) {
            let (word, bit) = Self::bit(meta.proto_id);
            extended.bits[word] |= bit;

            let at = extended
                .metas
                .partition_point(|m| m.proto_id < meta.proto_id);
            extended.metas.insert(at, meta);
        }
        extended
    }

    /// Returns a copy without component `id`.
    #[must_use]
    pub fn without(&self, id: ComponentProtoId) -> Self {
        let mut dropped = self.clone();
        let (word, bit) = Self::bit(id);
        dropped.bits[word] &= !bit;
        dropped.metas.retain(|m| m.proto_id != id);
        dropped
    }

    #[inline]
    fn bit(id: ComponentProtoId) -> (usize, u64) {
        let id = usize::from(id);
        assert!(id < MAX_COMPONENT_TYPES, "proto id {id} out of range");
        (id / 64, 1u64 << (id % 64))
    }

    /// Checks if every component of `other` is part of this prototype.
    #[must_use]
    pub fn includes(&self, other: &Self) -> bool {
        self.bits
            .iter()
            .zip(other.bits.iter())
            .all(|(mine, theirs)| mine & theirs == *theirs)
    }

    /// Checks if component `id` is part of this prototype.
    #[inline]
    #[must_use]
    pub fn includes_proto(&self, id: ComponentProtoId) -> bool {
        let (word, bit) = Self::bit(id);
        self.bits[word] & bit != 0
    }

    /// Checks if both prototypes hold the same component set.
    #[inline]
    #[must_use]
    pub fn equal(&self, other: &Self) -> bool {
        self.bits == other.bits
    }

    /// The raw component bitmap, low word first.
    #[inline]
    #[must_use]
    pub const fn components(&self) -> &[u64; BITMAP_WORDS] {
        &self.bits
    }

    /// Layout metadata of component `id`, if included.
    #[must_use]
    pub fn meta(&self, id: ComponentProtoId) -> Option<&ComponentMeta> {
        self.metas.iter().find(|m| m.proto_id == id)
    }

    /// Metadata of every member, in proto id order.
    #[inline]
    #[must_use]
    pub fn metas(&self) -> &[ComponentMeta] {
        &self.metas
    }

    /// Number of component types in the prototype.
    #[must_use]
    pub fn num_proto_components(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Calls `f` with each member's proto id in ascending order.
    pub fn foreach_proto_id<F: FnMut(ComponentProtoId)>(&self, mut f: F) {
        for meta in &self.metas {
            f(meta.proto_id);
        }
    }

    /// Bytes of component data one entity occupies, without padding.
    #[must_use]
    pub fn component_data_size_per_entity(&self) -> usize {
        self.metas.iter().map(|m| m.data_size).sum()
    }

    /// Number of entities that fit in one chunk.
    ///
    /// Prototypes made only of tag components (or of nothing) carry no data;
    /// their chunks hold [`PROTOTYPE_CHUNK_SIZE`] entities.
    #[must_use]
    pub fn chunk_capacity(&self) -> usize {
        let entity_size = self.component_data_size_per_entity();
        if entity_size == 0 {
            return PROTOTYPE_CHUNK_SIZE;
        }

        let mut capacity = PROTOTYPE_CHUNK_SIZE / entity_size;
        while capacity > 0 && self.soa_len(capacity) > PROTOTYPE_CHUNK_SIZE {
            capacity -= 1;
        }
        capacity
    }

    /// Bytes used by a chunk of `capacity` entities, including padding.
    fn soa_len(&self, capacity: usize) -> usize {
        self.metas.iter().fold(0, |offset, m| {
            align_up(offset, m.align) + m.data_size * capacity
        })
    }

    /// Offset of component `id` within one tightly packed entity record.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not part of the prototype.
    #[must_use]
    pub fn component_data_offset_in_aos_entity(&self, id: ComponentProtoId) -> usize {
        assert!(
            self.includes_proto(id),
            "prototype does not include component {id}"
        );
        self.metas
            .iter()
            .take_while(|m| m.proto_id < id)
            .map(|m| m.data_size)
            .sum()
    }

    /// Byte offset of component `id`'s array within a chunk.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not part of the prototype.
    #[must_use]
    pub fn component_data_offset_in_soa_chunk(&self, id: ComponentProtoId) -> usize {
        assert!(
            self.includes_proto(id),
            "prototype does not include component {id}"
        );

        let capacity = self.chunk_capacity();
        let mut offset = 0;
        for meta in &self.metas {
            offset = align_up(offset, meta.align);
            if meta.proto_id == id {
                break;
            }
            offset += meta.data_size * capacity;
        }
        offset
    }

    /// Hash of the component bitmap.
    ///
    /// The 64-bit SipHash of the bitmap is folded to 32 bits with XOR so it
    /// can key a [`HashIndex`](crate::util::HashIndex).
    #[must_use]
    pub fn hash(&self) -> PrototypeHash {
        let mut hasher = SipHasher13::new();
        for word in &self.bits {
            hasher.write(&word.to_le_bytes());
        }
        let wide = hasher.finish();
        (wide as u32) ^ ((wide >> 32) as u32)
    }
}

impl PartialEq for EntityPrototype {
    fn eq(&self, other: &Self) -> bool {
        self.equal(other)
    }
}

impl Eq for EntityPrototype {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::components::{Light, Transform};

    #[allow(dead_code)]
    struct Tag;

    impl Component for Tag {
        const TAG: &'static str = "Tag";
        const PROTO_ID: ComponentProtoId = 70;
    }

    #[allow(dead_code)]
    struct Byte(u8);

    impl Component for Byte {
        const TAG: &'static str = "Byte";
        const PROTO_ID: ComponentProtoId = 3;
    }

    #[allow(dead_code)]
    struct Word(u32);

    impl Component for Word {
        const TAG: &'static str = "Word";
        const PROTO_ID: ComponentProtoId = 4;
    }

    #[test]
    fn test_membership_and_equality() {
        let a = EntityPrototype::new().with::<Transform>().with::<Light>();
        let b = EntityPrototype::new().with::<Light>().with::<Transform>();
        assert_eq!(a, b);
        assert_eq!(a.hash(), b.hash());
        assert_eq!(a.num_proto_components(), 2);
        assert!(a.includes_proto(Transform::PROTO_ID));
        assert!(!a.includes_proto(Tag::PROTO_ID));

        let t = EntityPrototype::new().with::<Transform>();
        assert!(a.includes(&t));
        assert!(!t.includes(&a));
        assert_eq!(a.without(Light::PROTO_ID), t);
        assert_ne!(a.hash(), t.hash());
    }

    #[test]
    fn test_tag_only_capacity() {
        assert_eq!(EntityPrototype::new().chunk_capacity(), PROTOTYPE_CHUNK_SIZE);
        let tags = EntityPrototype::new().with::<Tag>();
        assert_eq!(tags.component_data_size_per_entity(), 0);
        assert_eq!(tags.chunk_capacity(), PROTOTYPE_CHUNK_SIZE);
    }

    #[test]
    fn test_aos_offsets() {
        let proto = EntityPrototype::new().with::<Light>().with::<Transform>();
        assert_eq!(proto.component_data_offset_in_aos_entity(Transform::PROTO_ID), 0);
        assert_eq!(
            proto.component_data_offset_in_aos_entity(Light::PROTO_ID),
            std::mem::size_of::<Transform>()
        );
    }

    #[test]
    fn test_soa_offsets_are_aligned() {
        // Word follows an array of single bytes.
        let proto = EntityPrototype::new()
            .with::<Word>()
            .with::<Byte>()
            .with::<Light>()
            .with::<Transform>();
        let capacity = proto.chunk_capacity();
        assert!(capacity > 0);

        let mut previous_end = 0;
        proto.foreach_proto_id(|id| {
            let meta = proto.meta(id).copied().unwrap();
            let offset = proto.component_data_offset_in_soa_chunk(id);
            assert_eq!(offset % meta.align, 0);
            assert!(offset >= previous_end);
            previous_end = offset + meta.data_size * capacity;
        });
        assert!(previous_end <= PROTOTYPE_CHUNK_SIZE);
    }

    #[test]
    #[should_panic(expected = "does not include")]
    fn test_offset_of_missing_component_panics() {
        let proto = EntityPrototype::new().with::<Transform>();
        let _ = proto.component_data_offset_in_soa_chunk(Light::PROTO_ID);
    }
}
