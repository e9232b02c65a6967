//! # Chunk Allocator
//!
//! Slab allocator handing out fixed-size 16KiB chunks carved from 4MiB pages.
//!
//! ```text
//! slab: [ Page 0 | Page 1 | (released) | Page 3 ]
//!          │
//!          └─ 256 chunks x 16KiB, bump-allocated in address order
//! ```
//!
//! Allocation order:
//! 1. Pop the free list (chunks returned by `free_chunk`)
//! 2. Bump-allocate in the current page
//! 3. Acquire a fresh page
//!
//! Freed chunks never return their page to the heap on their own. A page is
//! only released by [`ChunkManager::release_empty_pages`] once every chunk
//! carved from it is free again.

use tracing::{debug, warn};

use crate::error::ChunkError;

/// Size of a single prototype chunk in bytes.
pub const PROTOTYPE_CHUNK_SIZE: usize = 16 * 1024;

/// Size of one allocator page in bytes.
pub const CHUNK_ALLOCATOR_PAGE_SIZE: usize = 4 * 1024 * 1024;

/// Number of chunks carved from one page.
pub const CHUNKS_PER_PAGE: usize = CHUNK_ALLOCATOR_PAGE_SIZE / PROTOTYPE_CHUNK_SIZE;

/// Chunk size in 8-byte words (chunks are backed by `u64` for alignment).
const CHUNK_WORDS: usize = PROTOTYPE_CHUNK_SIZE / std::mem::size_of::<u64>();

/// Words in one bitset covering a page's chunks.
const IN_USE_WORDS: usize = CHUNKS_PER_PAGE / 64;

/// Handle to a chunk owned by a [`ChunkManager`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChunkHandle {
    page: u32,
    slot: u32,
}

impl ChunkHandle {
    /// Index of the page in the slab.
    #[inline]
    #[must_use]
    pub const fn page(self) -> u32 {
        self.page
    }

    /// Index of the chunk inside its page.
    #[inline]
    #[must_use]
    pub const fn slot(self) -> u32 {
        self.slot
    }
}

/// One 4MiB page of chunk memory.
struct ChunkPage {
    /// Backing memory, 8-byte aligned.
    words: Box<[u64]>,
    /// Chunks handed out by bump allocation so far.
    bump: usize,
    /// Bit set per chunk currently allocated.
    in_use: [u64; IN_USE_WORDS],
    /// Number of chunks currently allocated.
    live: usize,
}

impl ChunkPage {
    fn new() -> Self {
        Self {
            words: vec![0u64; CHUNKS_PER_PAGE * CHUNK_WORDS].into_boxed_slice(),
            bump: 0,
            in_use: [0; IN_USE_WORDS],
            live: 0,
        }
    }

    #[inline]
    fn is_in_use(&self, slot: usize) -> bool {
        (self.in_use[slot / 64] >> (slot % 64)) & 1 == 1
    }

    #[inline]
    fn set_in_use(&mut self, slot: usize, in_use: bool) {
        let mask = 1u64 << (slot % 64);
        if in_use {
            self.in_use[slot / 64] |= mask;
            self.live += 1;
        } else {
            self.in_use[slot / 64] &= !mask;
            self.live -= 1;
        }
    }

    #[inline]
    fn words(&self, slot: usize) -> &[u64] {
        &self.words[slot * CHUNK_WORDS..(slot + 1) * CHUNK_WORDS]
    }

    #[inline]
    fn words_mut(&mut self, slot: usize) -> &mut [u64] {
        &mut self.words[slot * CHUNK_WORDS..(slot + 1) * CHUNK_WORDS]
    }
}

/// Page-based slab allocator for prototype chunks.
///
/// # Thread Safety
///
/// Not thread-safe. Owned by the entity manager and driven from the
/// simulation thread.
#[derive(Default)]
pub struct ChunkManager {
    /// Pages, `None` where a page was released.
    slab: Vec<Option<ChunkPage>>,
    /// Released slab slots available for the next page.
    vacant_pages: Vec<u32>,
    /// Chunks returned via `free_chunk`, reused LIFO.
    free_list: Vec<ChunkHandle>,
    /// Page currently used for bump allocation.
    current: Option<u32>,
}

impl ChunkManager {
    /// Creates an empty chunk manager. No page is allocated until the
    /// first [`alloc_chunk`](Self::alloc_chunk).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a zeroed chunk.
    ///
    /// Reuses a freed chunk when one is available, otherwise carves the next
    /// chunk from the current page, acquiring a new page when it is full.
    /// Allocation failure aborts the process.
    pub fn alloc_chunk(&mut self) -> ChunkHandle {
        if let Some(handle) = self.free_list.pop() {
            let page = self.page_mut(handle);
            page.set_in_use(handle.slot as usize, true);
            page.words_mut(handle.slot as usize).fill(0);
            return handle;
        }

        let page_idx = match self.current {
            Some(idx) if self.page_has_room(idx) => idx,
            _ => self.acquire_new_page(),
        };

        let Some(page) = self.slab[page_idx as usize].as_mut() else {
            unreachable!("current chunk page was released");
        };
        let slot = page.bump;
        page.bump += 1;
        page.set_in_use(slot, true);

        ChunkHandle {
            page: page_idx,
            slot: slot as u32,
        }
    }

    /// Returns `chunk` to the free list for reuse by a later
    /// [`alloc_chunk`](Self::alloc_chunk). The backing page stays resident.
    ///
    /// # Errors
    ///
    /// Returns [`ChunkError::ForeignChunk`] when the handle was not issued by
    /// this manager and [`ChunkError::DoubleFree`] when it is already free.
    pub fn free_chunk(&mut self, chunk: ChunkHandle) -> Result<(), ChunkError> {
        let ChunkHandle { page, slot } = chunk;
        let Some(p) = self
            .slab
            .get_mut(page as usize)
            .and_then(Option::as_mut)
            .filter(|p| (slot as usize) < p.bump)
        else {
            warn!(page, slot, "rejected free of foreign chunk");
            return Err(ChunkError::ForeignChunk { page, slot });
        };

        if !p.is_in_use(slot as usize) {
            warn!(page, slot, "rejected double free of chunk");
            return Err(ChunkError::DoubleFree { page, slot });
        }

        p.set_in_use(slot as usize, false);
        self.free_list.push(chunk);
        Ok(())
    }

    /// Returns to the heap every page whose chunks are all free.
    ///
    /// Returns the number of pages released.
    pub fn release_empty_pages(&mut self) -> usize {
        let mut released = Vec::new();
        for (idx, slot) in self.slab.iter_mut().enumerate() {
            if slot.as_ref().is_some_and(|p| p.live == 0) {
                *slot = None;
                released.push(idx as u32);
            }
        }

        if released.is_empty() {
            return 0;
        }

        self.free_list.retain(|h| !released.contains(&h.page));
        if self.current.is_some_and(|c| released.contains(&c)) {
            self.current = None;
        }
        debug!(count = released.len(), "released empty chunk pages");

        let count = released.len();
        self.vacant_pages.extend(released);
        count
    }

    /// Returns the chunk's memory as bytes.
    ///
    /// # Panics
    ///
    /// Panics if `chunk` does not refer to a page of this manager.
    #[must_use]
    pub fn chunk_bytes(&self, chunk: ChunkHandle) -> &[u8] {
        bytemuck::cast_slice(self.page(chunk).words(chunk.slot as usize))
    }

    /// Returns the chunk's memory as mutable bytes.
    ///
    /// # Panics
    ///
    /// Panics if `chunk` does not refer to a page of this manager.
    #[must_use]
    pub fn chunk_bytes_mut(&mut self, chunk: ChunkHandle) -> &mut [u8] {
        bytemuck::cast_slice_mut(self.page_mut(chunk).words_mut(chunk.slot as usize))
    }

    /// Checks whether `chunk` is currently allocated.
    #[must_use]
    pub fn is_allocated(&self, chunk: ChunkHandle) -> bool {
        self.slab
            .get(chunk.page as usize)
            .and_then(Option::as_ref)
            .is_some_and(|p| (chunk.slot as usize) < p.bump && p.is_in_use(chunk.slot as usize))
    }

    /// Number of resident pages.
    #[must_use]
    pub fn num_pages(&self) -> usize {
        self.slab.iter().filter(|p| p.is_some()).count()
    }

    /// Number of chunks currently handed out.
    #[must_use]
    pub fn num_allocated_chunks(&self) -> usize {
        self.slab.iter().flatten().map(|p| p.live).sum()
    }

    /// Number of chunks waiting on the free list.
    #[must_use]
    pub fn num_free_chunks(&self) -> usize {
        self.free_list.len()
    }

    fn page_has_room(&self, idx: u32) -> bool {
        self.slab[idx as usize]
            .as_ref()
            .is_some_and(|p| p.bump < CHUNKS_PER_PAGE)
    }

    /// Allocates a page, stores it in the slab and makes it current.
    fn acquire_new_page(&mut self) -> u32 {
        let idx = if let Some(idx) = self.vacant_pages.pop() {
            self.slab[idx as usize] = Some(ChunkPage::new());
            idx
        } else {
            self.slab.push(Some(ChunkPage::new()));
            (self.slab.len() - 1) as u32
        };

        debug!(page = idx, bytes = CHUNK_ALLOCATOR_PAGE_SIZE, "acquired chunk page");
        self.current = Some(idx);
        idx
    }

    fn page(&self, chunk: ChunkHandle) -> &ChunkPage {
        match self.slab.get(chunk.page as usize) {
            Some(Some(page)) => page,
            _ => panic!("chunk page {} is not resident", chunk.page),
        }
    }

    fn page_mut(&mut self, chunk: ChunkHandle) -> &mut ChunkPage {
        match self.slab.get_mut(chunk.page as usize) {
            Some(Some(page)) => page,
            _ => panic!("chunk page {} is not resident", chunk.page),
        }
    }
}
