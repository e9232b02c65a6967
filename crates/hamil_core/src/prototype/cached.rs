//! # Cached Prototypes
//!
//! A [`CachedPrototype`] owns the chunks holding every entity of one
//! prototype. Entities are addressed by *alloc id*, their position as if
//! all chunks formed one array:
//!
//! ```text
//! alloc id:  0 .. cap-1 | cap .. 2cap-1 | 2cap .. (tail)
//! chunk:     0          | 1             | 2
//! ```
//!
//! Entities stay packed at the front of the chunk list. Only the tail chunk
//! has free slots, and freeing an entity moves the last one into its place.

use bytemuck::Pod;

use super::chunk_handle::{PrototypeChunkHandle, PrototypeChunkHeader};
use super::entity_prototype::EntityPrototype;
use crate::ecs::Component;
use crate::error::{PrototypeError, PrototypeResult};
use crate::memory::{ChunkHandle, ChunkManager};

/// A prototype together with the chunks of its entities.
#[derive(Debug)]
pub struct CachedPrototype {
    proto: EntityPrototype,
    cache_id: u32,
    capacity: u32,
    headers: Vec<PrototypeChunkHeader>,
    chunks: Vec<ChunkHandle>,
}

impl CachedPrototype {
    pub(crate) fn new(proto: EntityPrototype, cache_id: u32) -> Self {
        let capacity = u32::try_from(proto.chunk_capacity()).unwrap_or(u32::MAX);
        Self {
            proto,
            cache_id,
            capacity,
            headers: Vec::new(),
            chunks: Vec::new(),
        }
    }

    /// The prototype.
    #[inline]
    #[must_use]
    pub const fn prototype(&self) -> &EntityPrototype {
        &self.proto
    }

    /// Id of this entry in its [`PrototypeCache`](super::PrototypeCache).
    #[inline]
    #[must_use]
    pub const fn cache_id(&self) -> u32 {
        self.cache_id
    }

    /// Number of chunks owned.
    #[inline]
    #[must_use]
    pub fn num_chunks(&self) -> usize {
        self.chunks.len()
    }

    /// Number of entities stored across all chunks.
    #[must_use]
    pub fn num_entities(&self) -> usize {
        self.headers.iter().map(|h| h.num_entities as usize).sum()
    }

    /// Returns chunk `idx`.
    ///
    /// # Panics
    ///
    /// Panics if `idx >= num_chunks()`.
    #[must_use]
    pub fn chunk_by_index(&self, idx: usize) -> PrototypeChunkHandle {
        assert!(
            idx < self.num_chunks(),
            "chunk index {idx} out of range (num_chunks = {})",
            self.num_chunks()
        );
        PrototypeChunkHandle::from_header_and_chunk(self.headers[idx], self.chunks[idx])
    }

    /// Appends a fresh chunk taken from `chunks`.
    pub fn alloc_chunk(&mut self, chunks: &mut ChunkManager) -> PrototypeChunkHandle {
        let base_offset = self.headers.len() as u32 * self.capacity;
        let header = PrototypeChunkHeader {
            base_offset,
            capacity: self.capacity,
            num_entities: 0,
        };
        let chunk = chunks.alloc_chunk();

        self.headers.push(header);
        self.chunks.push(chunk);
        PrototypeChunkHandle::from_header_and_chunk(header, chunk)
    }

    /// Takes the slot right after the last entity.
    ///
    /// Returns `None` when the chunk that slot falls in has not been
    /// allocated yet; call [`alloc_chunk`](Self::alloc_chunk) and retry.
    pub fn alloc_entity(&mut self) -> Option<u32> {
        if self.capacity == 0 {
            return None;
        }

        let alloc_id = self.num_entities() as u32;
        let chunk_idx = self.chunk_idx(alloc_id);
        let header = self.headers.get_mut(chunk_idx)?;
        debug_assert_eq!(header.base_offset + header.num_entities, alloc_id);
        header.num_entities += 1;
        Some(alloc_id)
    }

    /// Releases slot `alloc_id`, moving the last entity into it.
    ///
    /// Returns the alloc id that was moved, or `None` if `alloc_id` was the
    /// last one. The vacated slot is zeroed.
    ///
    /// # Panics
    ///
    /// Panics if `alloc_id` is not an allocated slot.
    pub fn free_entity(&mut self, alloc_id: u32, chunks: &mut ChunkManager) -> Option<u32> {
        let num_entities = self.num_entities() as u32;
        assert!(
            alloc_id < num_entities,
            "alloc id {alloc_id} out of range (num_entities = {num_entities})"
        );

        let last = num_entities - 1;
        if alloc_id != last {
            self.copy_entity(last, alloc_id, chunks);
        }
        self.zero_entity(last, chunks);

        let last_chunk = self.chunk_idx(last);
        self.headers[last_chunk].num_entities -= 1;

        (alloc_id != last).then_some(last)
    }

    /// Frees trailing empty chunks, keeping the first one.
    ///
    /// Returns the number of chunks released.
    ///
    /// # Errors
    ///
    /// Returns [`PrototypeError::Chunk`] if `chunks` rejects a handle.
    pub fn purge_empty_chunks(&mut self, chunks: &mut ChunkManager) -> PrototypeResult<usize> {
        let mut purged = 0;
        while self.num_chunks() > 0 && self.chunk_by_index(self.num_chunks() - 1).purgeable() {
            if let Some(chunk) = self.chunks.pop() {
                self.headers.pop();
                chunks.free_chunk(chunk)?;
                purged += 1;
            }
        }
        Ok(purged)
    }

    /// Index of the chunk holding `alloc_id`.
    #[inline]
    fn chunk_idx(&self, alloc_id: u32) -> usize {
        (alloc_id / self.capacity) as usize
    }

    /// Returns the chunk holding `alloc_id`.
    ///
    /// # Panics
    ///
    /// Panics if `alloc_id` lies beyond the allocated chunks.
    #[must_use]
    pub fn chunk_for_entity_alloc_id(&self, alloc_id: u32) -> PrototypeChunkHandle {
        self.chunk_by_index(self.chunk_idx(alloc_id))
    }

    fn component_range<T: Component>(&self) -> PrototypeResult<(usize, usize)> {
        match self.proto.meta(T::PROTO_ID) {
            Some(meta) => Ok((
                self.proto.component_data_offset_in_soa_chunk(T::PROTO_ID),
                meta.data_size,
            )),
            None => Err(PrototypeError::ComponentNotIncluded { tag: T::TAG }),
        }
    }

    /// The live `T` array of chunk `chunk_idx`.
    ///
    /// # Errors
    ///
    /// Returns [`PrototypeError::ComponentNotIncluded`] if `T` is not part of
    /// the prototype.
    ///
    /// # Panics
    ///
    /// Panics if `chunk_idx >= num_chunks()`.
    pub fn component_slice<'a, T: Component + Pod>(
        &self,
        chunk_idx: usize,
        chunks: &'a ChunkManager,
    ) -> PrototypeResult<&'a [T]> {
        let (offset, size) = self.component_range::<T>()?;
        let handle = self.chunk_by_index(chunk_idx);
        if size == 0 {
            return Ok(&[]);
        }

        let len = handle.num_entities() * size;
        Ok(bytemuck::cast_slice(
            &chunks.chunk_bytes(handle.chunk())[offset..offset + len],
        ))
    }

    /// The live `T` array of chunk `chunk_idx`, mutably.
    ///
    /// # Errors
    ///
    /// See [`component_slice`](Self::component_slice).
    ///
    /// # Panics
    ///
    /// Panics if `chunk_idx >= num_chunks()`.
    pub fn component_slice_mut<'a, T: Component + Pod>(
        &self,
        chunk_idx: usize,
        chunks: &'a mut ChunkManager,
    ) -> PrototypeResult<&'a mut [T]> {
        let (offset, size) = self.component_range::<T>()?;
        let handle = self.chunk_by_index(chunk_idx);
        if size == 0 {
            return Ok(&mut []);
        }

        let len = handle.num_entities() * size;
        Ok(bytemuck::cast_slice_mut(
            &mut chunks.chunk_bytes_mut(handle.chunk())[offset..offset + len],
        ))
    }

    /// The `T` of the entity in slot `alloc_id`.
    ///
    /// # Errors
    ///
    /// See [`component_slice`](Self::component_slice).
    ///
    /// # Panics
    ///
    /// Panics if `alloc_id` is not an allocated slot.
    pub fn component_for_alloc_id<'a, T: Component + Pod>(
        &self,
        alloc_id: u32,
        chunks: &'a ChunkManager,
    ) -> PrototypeResult<&'a T> {
        let handle = self.chunk_for_entity_alloc_id(alloc_id);
        let slice = self.component_slice::<T>(self.chunk_idx(alloc_id), chunks)?;
        let idx = (alloc_id - handle.entity_base_index()) as usize;
        slice
            .get(idx)
            .ok_or(PrototypeError::ComponentNotIncluded { tag: T::TAG })
    }

    /// The `T` of the entity in slot `alloc_id`, mutably.
    ///
    /// # Errors
    ///
    /// See [`component_slice`](Self::component_slice).
    ///
    /// # Panics
    ///
    /// Panics if `alloc_id` is not an allocated slot.
    pub fn component_for_alloc_id_mut<'a, T: Component + Pod>(
        &self,
        alloc_id: u32,
        chunks: &'a mut ChunkManager,
    ) -> PrototypeResult<&'a mut T> {
        let handle = self.chunk_for_entity_alloc_id(alloc_id);
        let slice = self.component_slice_mut::<T>(self.chunk_idx(alloc_id), chunks)?;
        let idx = (alloc_id - handle.entity_base_index()) as usize;
        slice
            .get_mut(idx)
            .ok_or(PrototypeError::ComponentNotIncluded { tag: T::TAG })
    }

    /// Byte ranges `(chunk, start, len)` of every component of slot `alloc_id`.
    fn entity_fields(&self, alloc_id: u32) -> impl Iterator<Item = (ChunkHandle, usize, usize)> + '_ {
        let handle = self.chunk_for_entity_alloc_id(alloc_id);
        let in_chunk = (alloc_id - handle.entity_base_index()) as usize;
        self.proto.metas().iter().filter(|m| m.data_size > 0).map(move |m| {
            let offset = self.proto.component_data_offset_in_soa_chunk(m.proto_id);
            (handle.chunk(), offset + in_chunk * m.data_size, m.data_size)
        })
    }

    fn copy_entity(&self, from: u32, to: u32, chunks: &mut ChunkManager) {
        for ((src, src_start, size), (dst, dst_start, _)) in
            self.entity_fields(from).zip(self.entity_fields(to))
        {
            if src == dst {
                chunks
                    .chunk_bytes_mut(dst)
                    .copy_within(src_start..src_start + size, dst_start);
            } else {
                let bytes = chunks.chunk_bytes(src)[src_start..src_start + size].to_vec();
                chunks.chunk_bytes_mut(dst)[dst_start..dst_start + size].copy_from_slice(&bytes);
            }
        }
    }

    fn zero_entity(&self, alloc_id: u32, chunks: &mut ChunkManager) {
        for (chunk, start, size) in self.entity_fields(alloc_id) {
            chunks.chunk_bytes_mut(chunk)[start..start + size].fill(0);
        }
    }
}
