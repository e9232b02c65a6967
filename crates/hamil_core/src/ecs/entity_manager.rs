//! # Entity Manager
//!
//! Issues entity ids, tracks which are alive and tears down everything an
//! entity owns when it is destroyed.
//!
//! Each id moves through `Unallocated -> Alive -> Dead`:
//! - ids come from a maximal-length LFSR, so they never repeat within a
//!   period; the period count becomes the entity's generation
//! - live entities sit in a dense list indexed by a [`HashIndex`]
//! - destruction reaps every component and then destroys whatever the
//!   components' `destroyed()` hooks scheduled, iteratively
//!
//! Entities may also take a slot in a prototype's chunks. Those slots are
//! kept packed: freeing one moves the prototype's last entity into it.

use bytemuck::Pod;
use tracing::trace;

use super::component::{Component, DestroyQueue};
use super::components::GameObject;
use super::entity::Entity;
use super::manager::{ComponentManager, ComponentRef};
use crate::config::StorageConfig;
use crate::error::{ComponentError, ComponentResult, PrototypeError, PrototypeResult};
use crate::memory::ChunkManager;
use crate::prototype::{CachedPrototype, EntityPrototype, PrototypeCache};
use crate::util::hash_index::{HashIndex, Index};
use crate::util::Lfsr32;

/// Location of a prototype-backed entity: `(cache id, alloc id)`.
pub type PrototypeSlot = (u32, u32);

#[derive(Clone, Copy, Debug)]
struct EntityRecord {
    entity: Entity,
    slot: Option<PrototypeSlot>,
}

/// Dense list of live entities plus its id index.
///
/// Split from [`EntityManager`] so liveness can be queried while the
/// component manager is borrowed mutably.
struct LiveSet {
    hash: HashIndex,
    records: Vec<EntityRecord>,
}

impl LiveSet {
    fn new(config: &StorageConfig) -> Self {
        Self {
            hash: HashIndex::new(config.initial_entities, config.initial_entities)
                .with_granularity(config.hash_granularity),
            records: Vec::with_capacity(config.initial_entities),
        }
    }

    fn find(&self, entity: Entity) -> Index {
        if !entity.is_valid() {
            return HashIndex::INVALID;
        }
        self.hash.find(entity.id(), |_, idx| {
            self.records[idx as usize].entity == entity
        })
    }

    fn contains(&self, entity: Entity) -> bool {
        self.find(entity) != HashIndex::INVALID
    }

    fn push(&mut self, record: EntityRecord) {
        let idx = self.records.len() as Index;
        self.records.push(record);
        self.hash.add(record.entity.id(), idx);
    }

    /// Swap-removes the record at `idx` and re-indexes the moved one.
    fn swap_remove(&mut self, idx: Index) -> EntityRecord {
        let last = (self.records.len() - 1) as Index;
        let removed = self.records.swap_remove(idx as usize);
        self.hash.remove(removed.entity.id(), idx);

        if idx != last {
            let moved = self.records[idx as usize].entity;
            self.hash.remove(moved.id(), last);
            self.hash.add(moved.id(), idx);
        }
        removed
    }
}

/// Owner of entity identity, components and prototype slots.
pub struct EntityManager {
    next_id: Lfsr32,
    live: LiveSet,
    components: ComponentManager,
    prototypes: PrototypeCache,
    /// Owners of every prototype slot, indexed by cache id then alloc id.
    slot_owners: Vec<Vec<Entity>>,
    chunks: Option<ChunkManager>,
    compaction_threshold: f32,
}

impl EntityManager {
    /// Creates an entity manager owning `components`.
    #[must_use]
    pub fn new(components: ComponentManager) -> Self {
        let config = components.store().config().clone();
        Self {
            next_id: Lfsr32::default(),
            live: LiveSet::new(&config),
            components,
            prototypes: PrototypeCache::new(),
            slot_owners: Vec::new(),
            chunks: None,
            compaction_threshold: config.compaction_threshold,
        }
    }

    /// Issues a new entity.
    pub fn create_entity(&mut self) -> Entity {
        let id = self.next_id.next_value();
        let entity = Entity::new(id, self.next_id.period());
        self.live.push(EntityRecord { entity, slot: None });

        trace!(%entity, "created entity");
        entity
    }

    /// Checks if `entity` is alive.
    #[inline]
    #[must_use]
    pub fn alive(&self, entity: Entity) -> bool {
        self.live.contains(entity)
    }

    /// Number of live entities.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.live.records.len()
    }

    /// Checks if no entity is alive.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live.records.is_empty()
    }

    /// Iterates over live entities in creation order, modulo swap-removal.
    pub fn iter(&self) -> impl Iterator<Item = Entity> + '_ {
        self.live.records.iter().map(|record| record.entity)
    }

    /// Destroys `entity`, every component it owns and everything those
    /// components cascade to.
    ///
    /// Returns `false` if `entity` was not alive.
    pub fn destroy_entity(&mut self, entity: Entity) -> bool {
        let mut cascade = DestroyQueue::new();
        let destroyed = self.destroy_one(entity, &mut cascade);
        self.drain(&mut cascade);
        destroyed
    }

    fn drain(&mut self, cascade: &mut DestroyQueue) {
        while let Some(next) = cascade.pop() {
            self.destroy_one(next, cascade);
        }
    }

    fn destroy_one(&mut self, entity: Entity, cascade: &mut DestroyQueue) -> bool {
        let idx = self.live.find(entity);
        if idx == HashIndex::INVALID {
            return false;
        }

        let record = self.live.swap_remove(idx);
        let reaped = self.components.reap_entity(entity, cascade);
        if let Some(slot) = record.slot {
            self.free_prototype_slot(slot);
        }

        trace!(%entity, components = reaped, "destroyed entity");
        true
    }

    /// Attaches `value` to the live entity `entity`.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::NotAlive`] for an entity that is not alive,
    /// and [`ComponentError::AlreadyAttached`] if it already owns a `T`.
    pub fn add_component<T: Component>(
        &mut self,
        entity: Entity,
        value: T,
    ) -> ComponentResult<ComponentRef<T>> {
        if !entity.is_valid() {
            return Err(ComponentError::InvalidEntity);
        }
        if !self.alive(entity) {
            return Err(ComponentError::NotAlive(entity));
        }
        self.components.create_component(entity, value)
    }

    /// Removes `entity`'s `T`, destroying whatever its `destroyed()` hook
    /// schedules.
    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> bool {
        let mut cascade = DestroyQueue::new();
        let removed = self.components.remove_component::<T>(entity, &mut cascade);
        self.drain(&mut cascade);
        removed
    }

    /// The component manager.
    #[inline]
    #[must_use]
    pub const fn components(&self) -> &ComponentManager {
        &self.components
    }

    /// The component manager, mutably.
    #[inline]
    pub fn components_mut(&mut self) -> &mut ComponentManager {
        &mut self.components
    }

    /// Returns the last live game object named `name`.
    #[must_use]
    pub fn find_entity(&self, name: &str) -> Option<Entity> {
        self.components
            .iter::<GameObject>()
            .filter(|(_, game_object)| game_object.name() == name)
            .map(|(entity, _)| entity)
            .last()
    }

    /// Creates an entity with a [`GameObject`] under `parent`.
    ///
    /// Pass [`Entity::INVALID`] to create a root.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::ParentNotGameObject`] if `parent` is valid
    /// but has no `GameObject`.
    pub fn create_game_object(
        &mut self,
        name: impl Into<String>,
        parent: Entity,
    ) -> ComponentResult<Entity> {
        if parent.is_valid() && !self.components.has_component::<GameObject>(parent) {
            return Err(ComponentError::ParentNotGameObject(parent));
        }

        let entity = self.create_entity();
        self.components
            .create_component(entity, GameObject::new(name, parent))?;
        if let Some(parent) = self.components.get_component_mut::<GameObject>(parent) {
            parent.add_child(entity);
        }
        Ok(entity)
    }

    /// Calls `f` on every live child of `parent`'s game object.
    ///
    /// Dead children are reaped along the way.
    pub fn foreach_child<F: FnMut(Entity)>(&mut self, parent: Entity, f: F) {
        let live = &self.live;
        if let Some(game_object) = self.components.get_component_mut::<GameObject>(parent) {
            game_object.foreach_child(self.compaction_threshold, |e| live.contains(e), f);
        }
    }

    /// Returns the parent of `entity`'s game object.
    #[must_use]
    pub fn parent_of(&self, entity: Entity) -> Option<Entity> {
        self.components
            .get_component::<GameObject>(entity)
            .map(GameObject::parent)
            .filter(|parent| parent.is_valid())
    }

    /// Gives the manager chunk memory for prototype-backed entities.
    ///
    /// Replaces any previously injected manager.
    pub fn inject_chunk_manager(&mut self, chunks: ChunkManager) {
        self.chunks = Some(chunks);
    }

    /// The injected chunk manager.
    #[inline]
    #[must_use]
    pub const fn chunks(&self) -> Option<&ChunkManager> {
        self.chunks.as_ref()
    }

    /// The injected chunk manager, mutably.
    #[inline]
    pub fn chunks_mut(&mut self) -> Option<&mut ChunkManager> {
        self.chunks.as_mut()
    }

    /// The prototype cache.
    #[inline]
    #[must_use]
    pub const fn prototypes(&self) -> &PrototypeCache {
        &self.prototypes
    }

    /// Returns the cache id of `proto`, caching it on first use.
    pub fn prototype(&mut self, proto: &EntityPrototype) -> u32 {
        let cache_id = self.prototypes.probe_or_fill(proto);
        if self.slot_owners.len() <= cache_id as usize {
            self.slot_owners.resize_with(cache_id as usize + 1, Vec::new);
        }
        cache_id
    }

    /// Returns cached prototype `cache_id`.
    #[must_use]
    pub fn cached_prototype(&self, cache_id: u32) -> Option<&CachedPrototype> {
        self.prototypes.get(cache_id)
    }

    /// Creates an entity in a slot of prototype `cache_id`'s chunks.
    ///
    /// # Errors
    ///
    /// Returns [`PrototypeError::NoChunkManager`] if no chunk manager was
    /// injected, [`PrototypeError::UnknownPrototype`] for an unknown cache id
    /// and [`PrototypeError::ChunkOverflow`] if one entity outgrows a chunk.
    pub fn create_entity_with_prototype(&mut self, cache_id: u32) -> PrototypeResult<Entity> {
        let chunks = self.chunks.as_mut().ok_or(PrototypeError::NoChunkManager)?;
        let cached = self
            .prototypes
            .get_mut(cache_id)
            .ok_or(PrototypeError::UnknownPrototype(cache_id))?;

        if cached.prototype().chunk_capacity() == 0 {
            return Err(PrototypeError::ChunkOverflow(cache_id));
        }

        let alloc_id = match cached.alloc_entity() {
            Some(alloc_id) => alloc_id,
            None => {
                cached.alloc_chunk(chunks);
                cached
                    .alloc_entity()
                    .ok_or(PrototypeError::ChunkOverflow(cache_id))?
            }
        };

        let id = self.next_id.next_value();
        let entity = Entity::new(id, self.next_id.period());
        self.live.push(EntityRecord {
            entity,
            slot: Some((cache_id, alloc_id)),
        });

        let owners = &mut self.slot_owners[cache_id as usize];
        debug_assert_eq!(owners.len(), alloc_id as usize);
        owners.push(entity);

        trace!(%entity, cache_id, alloc_id, "created prototype entity");
        Ok(entity)
    }

    /// Returns `(cache id, alloc id)` of a prototype-backed entity.
    #[must_use]
    pub fn prototype_slot(&self, entity: Entity) -> Option<PrototypeSlot> {
        let idx = self.live.find(entity);
        if idx == HashIndex::INVALID {
            return None;
        }
        self.live.records[idx as usize].slot
    }

    /// Returns the `T` stored in `entity`'s prototype slot.
    ///
    /// Returns `Ok(None)` if `entity` is not alive or not prototype-backed.
    ///
    /// # Errors
    ///
    /// Returns [`PrototypeError::ComponentNotIncluded`] if the prototype
    /// lacks `T`.
    pub fn prototype_component<T: Component + Pod>(
        &self,
        entity: Entity,
    ) -> PrototypeResult<Option<&T>> {
        let Some((cache_id, alloc_id)) = self.prototype_slot(entity) else {
            return Ok(None);
        };
        let chunks = self.chunks.as_ref().ok_or(PrototypeError::NoChunkManager)?;
        let cached = self
            .prototypes
            .get(cache_id)
            .ok_or(PrototypeError::UnknownPrototype(cache_id))?;
        cached.component_for_alloc_id(alloc_id, chunks).map(Some)
    }

    /// Returns the `T` stored in `entity`'s prototype slot, mutably.
    ///
    /// # Errors
    ///
    /// See [`prototype_component`](Self::prototype_component).
    pub fn prototype_component_mut<T: Component + Pod>(
        &mut self,
        entity: Entity,
    ) -> PrototypeResult<Option<&mut T>> {
        let Some((cache_id, alloc_id)) = self.prototype_slot(entity) else {
            return Ok(None);
        };
        let chunks = self.chunks.as_mut().ok_or(PrototypeError::NoChunkManager)?;
        let cached = self
            .prototypes
            .get(cache_id)
            .ok_or(PrototypeError::UnknownPrototype(cache_id))?;
        cached.component_for_alloc_id_mut(alloc_id, chunks).map(Some)
    }

    /// Returns empty trailing chunks of every prototype to the chunk
    /// manager.
    ///
    /// # Errors
    ///
    /// Returns [`PrototypeError::Chunk`] if the chunk manager rejects a
    /// chunk.
    pub fn purge_prototype_chunks(&mut self) -> PrototypeResult<usize> {
        let Some(chunks) = self.chunks.as_mut() else {
            return Ok(0);
        };

        let mut purged = Ok(0);
        self.prototypes.foreach_cached_proto_mut(|cached| {
            if let Ok(total) = purged {
                purged = cached
                    .purge_empty_chunks(chunks)
                    .map(|count| total + count);
            }
        });
        purged
    }

    fn free_prototype_slot(&mut self, (cache_id, alloc_id): PrototypeSlot) {
        let (Some(chunks), Some(cached)) =
            (self.chunks.as_mut(), self.prototypes.get_mut(cache_id))
        else {
            return;
        };

        let owners = &mut self.slot_owners[cache_id as usize];
        let moved = cached.free_entity(alloc_id, chunks);
        owners.swap_remove(alloc_id as usize);

        if moved.is_some() {
            let moved_entity = owners[alloc_id as usize];
            let idx = self.live.find(moved_entity);
            if idx != HashIndex::INVALID {
                self.live.records[idx as usize].slot = Some((cache_id, alloc_id));
            }
        }
    }
}

impl Default for EntityManager {
    fn default() -> Self {
        Self::new(ComponentManager::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::components::{Light, Transform};
    use hamil_shared::Vec3;

    #[test]
    fn test_create_destroy_alive() {
        let mut entities = EntityManager::default();
        let a = entities.create_entity();
        let b = entities.create_entity();
        assert_ne!(a, b);
        assert!(a.is_valid());
        assert!(entities.alive(a) && entities.alive(b));
        assert_eq!(entities.len(), 2);

        assert!(entities.destroy_entity(a));
        assert!(!entities.alive(a));
        assert!(entities.alive(b));
        assert!(!entities.destroy_entity(a));
        assert!(!entities.destroy_entity(Entity::INVALID));
        assert_eq!(entities.len(), 1);
    }

    #[test]
    fn test_swap_remove_keeps_index_consistent() {
        let mut entities = EntityManager::default();
        let all: Vec<Entity> = (0..100).map(|_| entities.create_entity()).collect();
        for e in all.iter().step_by(3) {
            entities.destroy_entity(*e);
        }
        for (i, e) in all.iter().enumerate() {
            assert_eq!(entities.alive(*e), i % 3 != 0);
        }
        assert_eq!(entities.iter().count(), entities.len());
    }

    #[test]
    fn test_destroy_reaps_components() {
        let mut entities = EntityManager::default();
        let e = entities.create_entity();
        entities
            .add_component(e, Transform::from_origin(Vec3::ONE))
            .unwrap();
        entities.destroy_entity(e);

        assert!(!entities.components().has_component::<Transform>(e));
        assert_eq!(
            entities.add_component(e, Transform::default()).unwrap_err(),
            ComponentError::NotAlive(e)
        );
    }

    #[test]
    fn test_game_object_hierarchy() {
        let mut entities = EntityManager::default();
        let root = entities.create_game_object("root", Entity::INVALID).unwrap();
        let a = entities.create_game_object("a", root).unwrap();
        let b = entities.create_game_object("b", root).unwrap();
        let leaf = entities.create_game_object("leaf", a).unwrap();

        assert_eq!(entities.parent_of(a), Some(root));
        assert_eq!(entities.parent_of(root), None);
        assert_eq!(entities.find_entity("leaf"), Some(leaf));
        assert_eq!(entities.find_entity("missing"), None);

        entities.destroy_entity(b);
        let mut children = Vec::new();
        entities.foreach_child(root, |child| children.push(child));
        assert_eq!(children, vec![a]);

        // Destroying the root takes the whole tree with it.
        entities.destroy_entity(root);
        assert!(!entities.alive(a));
        assert!(!entities.alive(leaf));
        assert!(entities.is_empty());
    }

    #[test]
    fn test_game_object_parent_must_be_game_object() {
        let mut entities = EntityManager::default();
        let plain = entities.create_entity();
        assert_eq!(
            entities.create_game_object("child", plain),
            Err(ComponentError::ParentNotGameObject(plain))
        );
        assert_eq!(entities.len(), 1);
    }

    #[test]
    fn test_find_entity_last_match_wins() {
        let mut entities = EntityManager::default();
        entities.create_game_object("twin", Entity::INVALID).unwrap();
        let second = entities.create_game_object("twin", Entity::INVALID).unwrap();
        assert_eq!(entities.find_entity("twin"), Some(second));
    }

    #[test]
    fn test_remove_game_object_cascades() {
        let mut entities = EntityManager::default();
        let root = entities.create_game_object("root", Entity::INVALID).unwrap();
        let child = entities.create_game_object("child", root).unwrap();

        assert!(entities.remove_component::<GameObject>(root));
        assert!(entities.alive(root));
        assert!(!entities.alive(child));
    }

    #[test]
    fn test_prototype_entities_need_chunks() {
        let mut entities = EntityManager::default();
        let proto = EntityPrototype::new().with::<Transform>().with::<Light>();
        let cache_id = entities.prototype(&proto);
        assert_eq!(
            entities.create_entity_with_prototype(cache_id),
            Err(PrototypeError::NoChunkManager)
        );

        entities.inject_chunk_manager(ChunkManager::new());
        assert_eq!(
            entities.create_entity_with_prototype(cache_id + 1),
            Err(PrototypeError::UnknownPrototype(cache_id + 1))
        );
        let e = entities.create_entity_with_prototype(cache_id).unwrap();
        assert_eq!(entities.prototype_slot(e), Some((cache_id, 0)));
        assert_eq!(entities.prototype(&proto), cache_id);
    }

    #[test]
    fn test_destroy_prototype_entity_moves_last() {
        let mut entities = EntityManager::default();
        entities.inject_chunk_manager(ChunkManager::new());
        let cache_id = entities.prototype(&EntityPrototype::new().with::<Light>());

        let spawned: Vec<Entity> = (0..3)
            .map(|i| {
                let e = entities.create_entity_with_prototype(cache_id).unwrap();
                entities
                    .prototype_component_mut::<Light>(e)
                    .unwrap()
                    .unwrap()
                    .radius = i as f32;
                e
            })
            .collect();

        entities.destroy_entity(spawned[0]);
        assert_eq!(entities.prototype_slot(spawned[2]), Some((cache_id, 0)));
        assert_eq!(
            entities
                .prototype_component::<Light>(spawned[2])
                .unwrap()
                .map(|light| light.radius),
            Some(2.0)
        );
        assert_eq!(entities.prototype_slot(spawned[1]), Some((cache_id, 1)));
        assert_eq!(
            entities.cached_prototype(cache_id).unwrap().num_entities(),
            2
        );
        assert_eq!(entities.prototype_component::<Light>(spawned[0]), Ok(None));
    }

    #[test]
    fn test_spawn_after_destroy_keeps_slots_packed() {
        let mut entities = EntityManager::default();
        entities.inject_chunk_manager(ChunkManager::new());
        let cache_id = entities.prototype(&EntityPrototype::new().with::<Light>());
        let capacity = entities
            .cached_prototype(cache_id)
            .unwrap()
            .prototype()
            .chunk_capacity();

        let spawned: Vec<Entity> = (0..=capacity)
            .map(|i| {
                let e = entities.create_entity_with_prototype(cache_id).unwrap();
                entities
                    .prototype_component_mut::<Light>(e)
                    .unwrap()
                    .unwrap()
                    .radius = i as f32;
                e
            })
            .collect();

        entities.destroy_entity(spawned[0]);
        entities.destroy_entity(spawned[1]);
        let fresh = entities.create_entity_with_prototype(cache_id).unwrap();
        assert_eq!(
            entities.prototype_slot(fresh),
            Some((cache_id, capacity as u32 - 1))
        );

        let cached = entities.cached_prototype(cache_id).unwrap();
        let summed: usize = (0..cached.num_chunks())
            .map(|i| cached.chunk_by_index(i).num_entities())
            .sum();
        assert_eq!(cached.num_entities(), summed);
        assert_eq!(cached.num_entities(), entities.len());

        assert!(entities.destroy_entity(fresh));
        let survivors = &spawned[2..];
        for e in survivors {
            let (_, alloc_id) = entities.prototype_slot(*e).unwrap();
            assert!((alloc_id as usize) < entities.len());
        }
        let radii: Vec<f32> = survivors
            .iter()
            .map(|e| entities.prototype_component::<Light>(*e).unwrap().unwrap().radius)
            .collect();
        let expected: Vec<f32> = (2..=capacity).map(|i| i as f32).collect();
        assert_eq!(radii, expected);
    }

    #[test]
    fn test_purge_prototype_chunks() {
        let mut entities = EntityManager::default();
        entities.inject_chunk_manager(ChunkManager::new());
        let cache_id = entities.prototype(&EntityPrototype::new().with::<Transform>());
        let capacity = entities
            .cached_prototype(cache_id)
            .unwrap()
            .prototype()
            .chunk_capacity();

        let spawned: Vec<Entity> = (0..=capacity)
            .map(|_| entities.create_entity_with_prototype(cache_id).unwrap())
            .collect();
        assert_eq!(entities.cached_prototype(cache_id).unwrap().num_chunks(), 2);

        entities.destroy_entity(spawned[0]);
        assert_eq!(entities.purge_prototype_chunks(), Ok(1));
        assert_eq!(entities.chunks().unwrap().num_allocated_chunks(), 1);
    }
}
