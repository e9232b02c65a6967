//! # Storage Error Types
//!
//! Recoverable failures of the storage core.
//!
//! Lookup misses are not errors: they surface as `None` or as the
//! [`HashIndex::INVALID`](crate::util::HashIndex::INVALID) sentinel.
//! Allocation failure is fatal and aborts through the global allocator.

use thiserror::Error;

use crate::ecs::Entity;

/// Errors raised by component creation and lookup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ComponentError {
    /// Attempted to attach a component to [`Entity::INVALID`].
    #[error("cannot attach a component to the invalid entity")]
    InvalidEntity,

    /// The entity is not alive in the owning entity manager.
    #[error("entity {0} is not alive")]
    NotAlive(Entity),

    /// The entity already owns a component of this type.
    #[error("entity {entity} already has a {tag} component")]
    AlreadyAttached {
        /// Debug tag of the component type.
        tag: &'static str,
        /// The owning entity.
        entity: Entity,
    },

    /// The component type's proto id is outside the registrable range.
    #[error("component {tag} has proto id {proto_id}, which exceeds the component table")]
    NotRegistered {
        /// Debug tag of the component type.
        tag: &'static str,
        /// The offending proto id.
        proto_id: u8,
    },

    /// Tried to create a game object under a parent with no `GameObject`.
    #[error("parent entity {0} has no GameObject component")]
    ParentNotGameObject(Entity),
}

/// Errors raised when returning chunks to the [`ChunkManager`](crate::memory::ChunkManager).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkError {
    /// The handle does not point into any page of this manager.
    #[error("chunk (page {page}, slot {slot}) does not belong to this chunk manager")]
    ForeignChunk {
        /// Page index of the handle.
        page: u32,
        /// Slot index of the handle.
        slot: u32,
    },

    /// The chunk is already on the free list.
    #[error("chunk (page {page}, slot {slot}) freed twice")]
    DoubleFree {
        /// Page index of the handle.
        page: u32,
        /// Slot index of the handle.
        slot: u32,
    },
}

/// Errors raised by prototype-backed entity allocation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PrototypeError {
    /// No [`ChunkManager`](crate::memory::ChunkManager) was injected.
    #[error("no chunk manager injected into the entity manager")]
    NoChunkManager,

    /// The cache id does not name a cached prototype.
    #[error("unknown prototype cache id {0}")]
    UnknownPrototype(u32),

    /// One entity's component data is larger than a chunk.
    #[error("prototype {0} does not fit a single entity in a chunk")]
    ChunkOverflow(u32),

    /// The requested component is not part of the prototype.
    #[error("component {tag} is not included in the prototype")]
    ComponentNotIncluded {
        /// Debug tag of the component type.
        tag: &'static str,
    },

    /// Freeing a chunk back to the manager failed.
    #[error(transparent)]
    Chunk(#[from] ChunkError),
}

/// Errors raised by the two-phase [`World`](crate::ecs::World) lifecycle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorldError {
    /// The world was allocated but `create_empty()` has not run.
    #[error("world accessed before create_empty()")]
    NotCreated,

    /// `create_empty()` was called twice.
    #[error("world has been created already")]
    AlreadyCreated,

    /// The storage config failed validation.
    #[error("world created with an invalid config: {0}")]
    InvalidConfig(String),
}

impl From<ConfigError> for WorldError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Invalid(reason) => Self::InvalidConfig(reason),
            other => Self::InvalidConfig(other.to_string()),
        }
    }
}

/// Errors raised while loading a [`StorageConfig`](crate::config::StorageConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The TOML text could not be parsed.
    #[error("failed to parse storage config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("invalid storage config: {0}")]
    Invalid(String),
}

/// Result type for component operations.
pub type ComponentResult<T> = Result<T, ComponentError>;

/// Result type for prototype operations.
pub type PrototypeResult<T> = Result<T, PrototypeError>;

/// Result type for world lifecycle operations.
pub type WorldResult<T> = Result<T, WorldError>;

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;
