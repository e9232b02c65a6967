//! # World
//!
//! Explicit context owning the entity manager, its components and chunk
//! memory. There is no global world: callers pass a `World` (or a
//! [`SharedWorld`]) to whatever needs entity storage.
//!
//! Construction is two-phase:
//!
//! ```rust,ignore
//! let mut world = World::alloc();
//! world.create_empty(StorageConfig::default())?;
//! let e = world.entities_mut().create_entity();
//! ```

use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

use super::component::Component;
use super::entity::Entity;
use super::entity_manager::EntityManager;
use super::manager::{ComponentManager, ComponentRef};
use crate::config::StorageConfig;
use crate::error::{ComponentResult, WorldError, WorldResult};
use crate::memory::ChunkManager;

/// Top-level storage context.
#[derive(Default)]
pub struct World {
    entities: Option<EntityManager>,
}

impl World {
    /// Allocates an unconstructed world. Call
    /// [`create_empty`](Self::create_empty) before use.
    #[must_use]
    pub const fn alloc() -> Self {
        Self { entities: None }
    }

    /// Validates `config`, builds the managers and injects a fresh chunk
    /// manager.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::AlreadyCreated`] on a second call and
    /// [`WorldError::InvalidConfig`] if `config` fails validation.
    pub fn create_empty(&mut self, config: StorageConfig) -> WorldResult<&mut Self> {
        if self.entities.is_some() {
            return Err(WorldError::AlreadyCreated);
        }
        config.validate()?;

        debug!(?config, "creating empty world");
        let mut entities = EntityManager::new(ComponentManager::new(config));
        entities.inject_chunk_manager(ChunkManager::new());
        self.entities = Some(entities);
        Ok(self)
    }

    /// Allocates and constructs a world in one step.
    ///
    /// # Panics
    ///
    /// Panics if `config` fails validation. Use
    /// [`create_empty`](Self::create_empty) to handle that as an error.
    #[must_use]
    pub fn new(config: StorageConfig) -> Self {
        let mut world = Self::alloc();
        if let Err(err) = world.create_empty(config) {
            panic!("World::new(): {err}");
        }
        world
    }

    /// Checks if [`create_empty`](Self::create_empty) has run.
    #[inline]
    #[must_use]
    pub const fn is_created(&self) -> bool {
        self.entities.is_some()
    }

    /// The entity manager.
    ///
    /// # Panics
    ///
    /// Panics if the world has not been created.
    #[must_use]
    pub fn entities(&self) -> &EntityManager {
        match self.entities.as_ref() {
            Some(entities) => entities,
            None => panic!("World::entities() called before create_empty()"),
        }
    }

    /// The entity manager, mutably.
    ///
    /// # Panics
    ///
    /// Panics if the world has not been created.
    pub fn entities_mut(&mut self) -> &mut EntityManager {
        match self.entities.as_mut() {
            Some(entities) => entities,
            None => panic!("World::entities_mut() called before create_empty()"),
        }
    }

    /// The entity manager, if the world has been created.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::NotCreated`] before
    /// [`create_empty`](Self::create_empty).
    pub fn try_entities(&self) -> WorldResult<&EntityManager> {
        self.entities.as_ref().ok_or(WorldError::NotCreated)
    }

    /// The entity manager mutably, if the world has been created.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::NotCreated`] before
    /// [`create_empty`](Self::create_empty).
    pub fn try_entities_mut(&mut self) -> WorldResult<&mut EntityManager> {
        self.entities.as_mut().ok_or(WorldError::NotCreated)
    }

    /// The component manager.
    ///
    /// # Panics
    ///
    /// Panics if the world has not been created.
    #[must_use]
    pub fn components(&self) -> &ComponentManager {
        self.entities().components()
    }

    /// Creates an entity and returns a handle for attaching components.
    ///
    /// # Panics
    ///
    /// Panics if the world has not been created.
    pub fn spawn(&mut self) -> EntityMut<'_> {
        let entity = self.entities_mut().create_entity();
        self.entity_mut(entity)
    }

    /// Returns a mutable view of `entity`.
    ///
    /// # Panics
    ///
    /// Panics if the world has not been created.
    pub fn entity_mut(&mut self, entity: Entity) -> EntityMut<'_> {
        EntityMut {
            entity,
            entities: self.entities_mut(),
        }
    }
}

/// Mutable view of one entity.
pub struct EntityMut<'w> {
    entity: Entity,
    entities: &'w mut EntityManager,
}

impl EntityMut<'_> {
    /// The entity.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> Entity {
        self.entity
    }

    /// Checks if the entity is alive.
    #[must_use]
    pub fn alive(&self) -> bool {
        self.entities.alive(self.entity)
    }

    /// Attaches `value`.
    ///
    /// # Errors
    ///
    /// See [`EntityManager::add_component`].
    pub fn add_component<T: Component>(&mut self, value: T) -> ComponentResult<ComponentRef<T>> {
        self.entities.add_component(self.entity, value)
    }

    /// Returns the entity's `T`.
    #[must_use]
    pub fn component<T: Component>(&self) -> Option<&T> {
        self.entities.components().get_component(self.entity)
    }

    /// Returns the entity's `T` mutably.
    pub fn component_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.entities.components_mut().get_component_mut(self.entity)
    }

    /// Checks if the entity owns a `T`.
    #[must_use]
    pub fn has_component<T: Component>(&self) -> bool {
        self.entities.components().has_component::<T>(self.entity)
    }

    /// Removes the entity's `T`.
    pub fn remove_component<T: Component>(&mut self) -> bool {
        self.entities.remove_component::<T>(self.entity)
    }

    /// Destroys the entity.
    pub fn destroy(self) -> bool {
        self.entities.destroy_entity(self.entity)
    }
}

/// A [`World`] shared between threads.
///
/// Writers are serialized by the lock; workers take snapshots instead of
/// holding a read guard across a job.
#[derive(Clone)]
pub struct SharedWorld {
    inner: Arc<RwLock<World>>,
}

impl SharedWorld {
    /// Wraps a constructed world.
    #[must_use]
    pub fn new(world: World) -> Self {
        Self {
            inner: Arc::new(RwLock::new(world)),
        }
    }

    /// Locks the world for reading.
    pub fn read(&self) -> RwLockReadGuard<'_, World> {
        self.inner.read()
    }

    /// Locks the world for writing.
    pub fn write(&self) -> RwLockWriteGuard<'_, World> {
        self.inner.write()
    }

    /// Copies every live `T` out of the world.
    ///
    /// Returns an empty list if the world has not been created.
    #[must_use]
    pub fn snapshot<T: Component + Clone>(&self) -> Vec<(Entity, T)> {
        let world = self.inner.read();
        world.try_entities().map_or_else(
            |_| Vec::new(),
            |entities| {
                entities
                    .components()
                    .iter::<T>()
                    .map(|(entity, value)| (entity, value.clone()))
                    .collect()
            },
        )
    }
}
