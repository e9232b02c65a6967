//! # Hamil Core
//!
//! Entity-component storage for the Hamil engine:
//! - Sparse entity ids mapped onto dense component columns by a custom
//!   open hash index
//! - Entity identity issued by a maximal-length LFSR, with liveness
//!   tracking and cascading destruction
//! - 16KiB chunks carved from 4MiB pages, grouping entities that share a
//!   prototype
//!
//! ## Architecture Rules
//!
//! 1. **Single writer** - the storage core takes no locks; share a world
//!    through [`SharedWorld`]
//! 2. **Misses are sentinels** - lookups return `None` or
//!    [`HashIndex::INVALID`], never errors
//! 3. **No global state** - every operation goes through an explicit
//!    [`World`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use hamil_core::{StorageConfig, Transform, World};
//!
//! let mut world = World::new(StorageConfig::default());
//! let mut e = world.spawn();
//! e.add_component(Transform::default())?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod ecs;
pub mod error;
pub mod memory;
pub mod prototype;
pub mod util;

pub use config::StorageConfig;
pub use ecs::{
    Component, ComponentManager, ComponentProtoId, ComponentRef, DestroyQueue, Entity, EntityId,
    EntityManager, EntityMut, GameObject, Light, SharedWorld, Transform, World,
};
pub use error::{
    ChunkError, ComponentError, ComponentResult, ConfigError, PrototypeError, PrototypeResult,
    WorldError, WorldResult,
};
pub use memory::{ChunkHandle, ChunkManager};
pub use prototype::{CachedPrototype, EntityPrototype, PrototypeCache};
pub use util::HashIndex;
