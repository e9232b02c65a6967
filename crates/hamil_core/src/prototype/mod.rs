//! # Prototype Storage
//!
//! Chunked struct-of-arrays storage for entities that share a component
//! set:
//! - [`EntityPrototype`]: the component set and its chunk layout
//! - [`PrototypeCache`]: interns prototypes under dense cache ids
//! - [`CachedPrototype`]: the chunks of one prototype and its entity slots
//!
//! Chunk memory comes from a [`ChunkManager`](crate::memory::ChunkManager).

mod cache;
mod cached;
mod chunk_handle;
mod entity_prototype;

pub use cache::{PrototypeCache, CACHE_ENTRIES_PER_PAGE};
pub use cached::CachedPrototype;
pub use chunk_handle::{PrototypeChunkHandle, PrototypeChunkHeader};
pub use entity_prototype::{EntityPrototype, PrototypeHash, MAX_CHUNK_ALIGN};
