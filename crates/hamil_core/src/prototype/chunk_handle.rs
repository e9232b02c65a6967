//! Per-chunk bookkeeping of a cached prototype.

use crate::memory::ChunkHandle;

/// Occupancy of one prototype chunk.
///
/// Kept beside the chunk rather than inside it, so chunk memory holds
/// component data only.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PrototypeChunkHeader {
    /// Alloc id of the chunk's first entity, as if every entity of the
    /// prototype sat in one array.
    pub base_offset: u32,
    /// Entities the chunk can hold.
    pub capacity: u32,
    /// Entities currently stored, packed at the front.
    pub num_entities: u32,
}

/// Snapshot of a prototype chunk's header and its memory handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PrototypeChunkHandle {
    header: PrototypeChunkHeader,
    chunk: ChunkHandle,
}

impl PrototypeChunkHandle {
    pub(crate) const fn from_header_and_chunk(
        header: PrototypeChunkHeader,
        chunk: ChunkHandle,
    ) -> Self {
        Self { header, chunk }
    }

    /// Alloc id of the chunk's first entity.
    #[inline]
    #[must_use]
    pub const fn entity_base_index(&self) -> u32 {
        self.header.base_offset
    }

    /// Entities the chunk can hold.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.header.capacity as usize
    }

    /// Entities currently stored.
    #[inline]
    #[must_use]
    pub const fn num_entities(&self) -> usize {
        self.header.num_entities as usize
    }

    /// Checks if every slot is taken.
    #[inline]
    #[must_use]
    pub const fn full(&self) -> bool {
        self.header.num_entities >= self.header.capacity
    }

    /// Checks if no slot is taken.
    #[inline]
    #[must_use]
    pub const fn empty(&self) -> bool {
        self.header.num_entities == 0
    }

    /// Checks if the chunk can be released: it is empty and is not the
    /// prototype's first chunk.
    #[inline]
    #[must_use]
    pub const fn purgeable(&self) -> bool {
        self.header.base_offset > 0 && self.empty()
    }

    /// The chunk's memory.
    #[inline]
    #[must_use]
    pub const fn chunk(&self) -> ChunkHandle {
        self.chunk
    }
}
