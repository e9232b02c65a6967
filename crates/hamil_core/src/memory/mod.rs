//! # Memory Management
//!
//! Chunk memory backing prototype (archetype) storage.
//!
//! ## Design Philosophy
//!
//! Memory is requested from the heap in large pages and carved into
//! fixed-size chunks:
//! - Chunks from the same page sit at sequential addresses
//! - Freed chunks are recycled before a new page is touched
//! - Pages go back to the heap only when explicitly released

mod chunk;

pub use chunk::{
    ChunkHandle, ChunkManager, CHUNKS_PER_PAGE, CHUNK_ALLOCATOR_PAGE_SIZE, PROTOTYPE_CHUNK_SIZE,
};
