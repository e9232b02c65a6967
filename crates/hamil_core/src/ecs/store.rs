//! # Component Storage
//!
//! Dense, hash-indexed component columns with lazy reclamation.
//!
//! Each component type lives in its own [`ComponentColumn`]:
//! - Rows are `(owner, value)` pairs appended in creation order
//! - A [`HashIndex`] keyed by entity id maps owners to row indices
//! - Removal reaps the row in place; compaction runs once the dead
//!   fraction passes the configured threshold
//!
//! Columns are held type-erased in a table indexed by `PROTO_ID`, and
//! recovered by `TypeId` downcasting.

use std::any::Any;

use tracing::{debug, warn};

use super::component::{Component, DestroyQueue, MAX_COMPONENT_TYPES};
use super::entity::Entity;
use crate::config::StorageConfig;
use crate::error::{ComponentError, ComponentResult};
use crate::util::hash_index::{HashIndex, Index};

/// A stored component together with its owning entity.
#[derive(Debug)]
struct Row<T> {
    owner: Entity,
    value: T,
}

/// Checks that a row still belongs to `entity`.
#[inline]
fn compare_component<T>(entity: Entity, row: &Row<T>) -> bool {
    row.owner == entity
}

/// Dense storage for a single component type.
///
/// Raw row indices are stable until the next compaction.
pub struct ComponentColumn<T: Component> {
    hash: HashIndex,
    rows: Vec<Row<T>>,
    dead: usize,
    compaction_threshold: f32,
}

impl<T: Component> ComponentColumn<T> {
    /// Creates an empty column sized from `config`.
    #[must_use]
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            hash: HashIndex::new(config.initial_hash_size, config.initial_components)
                .with_granularity(config.hash_granularity),
            rows: Vec::with_capacity(config.initial_components),
            dead: 0,
            compaction_threshold: config.compaction_threshold,
        }
    }

    /// Returns the row index owned by `entity`, or [`HashIndex::INVALID`].
    #[must_use]
    pub fn find(&self, entity: Entity) -> Index {
        if !entity.is_valid() {
            return HashIndex::INVALID;
        }
        self.hash.find(entity.id(), |_, idx| {
            compare_component(entity, &self.rows[idx as usize])
        })
    }

    /// Resolves `hint` if it still points at `entity`'s row, otherwise
    /// falls back to the hash index.
    #[must_use]
    pub fn resolve(&self, entity: Entity, hint: Index) -> Index {
        match self.rows.get(hint as usize) {
            Some(row) if entity.is_valid() && compare_component(entity, row) => hint,
            _ => self.find(entity),
        }
    }

    /// Appends a component for `entity`.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::InvalidEntity`] for [`Entity::INVALID`] and
    /// [`ComponentError::AlreadyAttached`] when `entity` already owns a `T`.
    pub fn create(&mut self, entity: Entity, value: T) -> ComponentResult<Index> {
        if !entity.is_valid() {
            return Err(ComponentError::InvalidEntity);
        }
        if self.find(entity) != HashIndex::INVALID {
            warn!(tag = T::TAG, %entity, "duplicate component rejected");
            return Err(ComponentError::AlreadyAttached {
                tag: T::TAG,
                entity,
            });
        }

        let idx = self.rows.len() as Index;
        self.rows.push(Row {
            owner: entity,
            value,
        });
        self.hash.add(entity.id(), idx);
        Ok(idx)
    }

    /// Returns the component at row `idx` if it is live.
    #[inline]
    #[must_use]
    pub fn get_at(&self, idx: Index) -> Option<&T> {
        self.rows
            .get(idx as usize)
            .filter(|row| row.owner.is_valid())
            .map(|row| &row.value)
    }

    /// Returns the component at row `idx` mutably if it is live.
    #[inline]
    pub fn get_at_mut(&mut self, idx: Index) -> Option<&mut T> {
        self.rows
            .get_mut(idx as usize)
            .filter(|row| row.owner.is_valid())
            .map(|row| &mut row.value)
    }

    /// Returns `entity`'s component.
    #[must_use]
    pub fn get(&self, entity: Entity) -> Option<&T> {
        self.get_at(self.find(entity))
    }

    /// Returns `entity`'s component mutably.
    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut T> {
        let idx = self.find(entity);
        self.get_at_mut(idx)
    }

    /// Reaps `entity`'s component after running its `destroyed()` hook.
    ///
    /// Returns `false` if `entity` owns no `T`.
    pub fn remove(&mut self, entity: Entity, cascade: &mut DestroyQueue) -> bool {
        let idx = self.find(entity);
        if idx == HashIndex::INVALID {
            return false;
        }

        let row = &mut self.rows[idx as usize];
        row.value.destroyed(cascade);
        row.owner = Entity::INVALID;
        self.hash.remove(entity.id(), idx);
        self.dead += 1;

        if self.dead as f32 / self.rows.len() as f32 > self.compaction_threshold {
            self.compact();
        }
        true
    }

    /// Drops reaped rows, keeping survivors in order, and rebuilds the index.
    ///
    /// Invalidates every raw row index.
    pub fn compact(&mut self) {
        if self.dead == 0 {
            return;
        }

        let before = self.rows.len();
        self.rows.retain(|row| row.owner.is_valid());
        self.hash.clear();
        for (idx, row) in self.rows.iter().enumerate() {
            self.hash.add(row.owner.id(), idx as Index);
        }
        self.dead = 0;

        debug!(
            tag = T::TAG,
            before,
            after = self.rows.len(),
            "compacted component column"
        );
    }

    /// Iterates over live `(owner, component)` pairs in dense order.
    pub fn iter(&self) -> impl Iterator<Item = (Entity, &T)> {
        self.rows
            .iter()
            .filter(|row| row.owner.is_valid())
            .map(|row| (row.owner, &row.value))
    }

    /// Iterates mutably over live `(owner, component)` pairs in dense order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Entity, &mut T)> {
        self.rows
            .iter_mut()
            .filter(|row| row.owner.is_valid())
            .map(|row| (row.owner, &mut row.value))
    }

    /// Number of live components.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len() - self.dead
    }

    /// Checks if the column has no live components.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of reaped rows awaiting compaction.
    #[inline]
    #[must_use]
    pub const fn dead_count(&self) -> usize {
        self.dead
    }

    /// Read access to the column's hash index.
    #[inline]
    #[must_use]
    pub const fn hash_index(&self) -> &HashIndex {
        &self.hash
    }
}

/// Object-safe view of a [`ComponentColumn`] of any type.
trait ErasedColumn: Send + Sync {
    fn tag(&self) -> &'static str;
    fn reap_entity(&mut self, entity: Entity, cascade: &mut DestroyQueue) -> bool;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component> ErasedColumn for ComponentColumn<T> {
    fn tag(&self) -> &'static str {
        T::TAG
    }

    fn reap_entity(&mut self, entity: Entity, cascade: &mut DestroyQueue) -> bool {
        self.remove(entity, cascade)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Component columns for every registered type.
pub struct ComponentStore {
    columns: Vec<Option<Box<dyn ErasedColumn>>>,
    config: StorageConfig,
}

impl ComponentStore {
    /// Creates an empty store. Columns are created on first use.
    #[must_use]
    pub fn new(config: StorageConfig) -> Self {
        let mut columns = Vec::with_capacity(MAX_COMPONENT_TYPES);
        columns.resize_with(MAX_COMPONENT_TYPES, || None);
        Self { columns, config }
    }

    /// Returns the configuration columns are created with.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Creates the column for `T` if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::NotRegistered`] if `T::PROTO_ID` is outside
    /// the component table.
    ///
    /// # Panics
    ///
    /// Panics if another component type already claimed `T::PROTO_ID`.
    pub fn register<T: Component>(&mut self) -> ComponentResult<&mut ComponentColumn<T>> {
        let slot = usize::from(T::PROTO_ID);
        if slot >= MAX_COMPONENT_TYPES {
            return Err(ComponentError::NotRegistered {
                tag: T::TAG,
                proto_id: T::PROTO_ID,
            });
        }

        let config = &self.config;
        let column = self.columns[slot].get_or_insert_with(|| {
            Box::new(ComponentColumn::<T>::new(config)) as Box<dyn ErasedColumn>
        });
        let tag = column.tag();
        match column.as_any_mut().downcast_mut::<ComponentColumn<T>>() {
            Some(column) => Ok(column),
            None => panic!(
                "component {} shares proto id {} with {}",
                T::TAG,
                T::PROTO_ID,
                tag
            ),
        }
    }

    /// Returns the column for `T`, if one was created.
    #[must_use]
    pub fn column<T: Component>(&self) -> Option<&ComponentColumn<T>> {
        self.columns
            .get(usize::from(T::PROTO_ID))?
            .as_ref()?
            .as_any()
            .downcast_ref()
    }

    /// Returns the column for `T` mutably, if one was created.
    pub fn column_mut<T: Component>(&mut self) -> Option<&mut ComponentColumn<T>> {
        self.columns
            .get_mut(usize::from(T::PROTO_ID))?
            .as_mut()?
            .as_any_mut()
            .downcast_mut()
    }

    /// Appends a `T` for `entity` and returns its row index.
    ///
    /// # Errors
    ///
    /// See [`ComponentColumn::create`] and [`ComponentStore::register`].
    pub fn create_component<T: Component>(
        &mut self,
        entity: Entity,
        value: T,
    ) -> ComponentResult<Index> {
        self.register::<T>()?.create(entity, value)
    }

    /// Returns `entity`'s `T`.
    #[must_use]
    pub fn get_component<T: Component>(&self, entity: Entity) -> Option<&T> {
        self.column::<T>()?.get(entity)
    }

    /// Returns `entity`'s `T` mutably.
    pub fn get_component_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        self.column_mut::<T>()?.get_mut(entity)
    }

    /// Checks if `entity` owns a `T`.
    #[must_use]
    pub fn has_component<T: Component>(&self, entity: Entity) -> bool {
        self.column::<T>()
            .is_some_and(|column| column.find(entity) != HashIndex::INVALID)
    }

    /// Reaps `entity`'s `T`. Entities its hook schedules land in `cascade`.
    pub fn remove_component<T: Component>(
        &mut self,
        entity: Entity,
        cascade: &mut DestroyQueue,
    ) -> bool {
        self.column_mut::<T>()
            .is_some_and(|column| column.remove(entity, cascade))
    }

    /// Reaps every component `entity` owns, across all columns.
    ///
    /// Returns the number of components reaped.
    pub fn reap_entity(&mut self, entity: Entity, cascade: &mut DestroyQueue) -> usize {
        self.columns
            .iter_mut()
            .flatten()
            .map(|column| column.reap_entity(entity, cascade))
            .filter(|reaped| *reaped)
            .count()
    }
}

impl Default for ComponentStore {
    fn default() -> Self {
        Self::new(StorageConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Health(u32);

    impl Component for Health {
        const TAG: &'static str = "Health";
        const PROTO_ID: u8 = 40;
    }

    struct Armor;

    impl Component for Armor {
        const TAG: &'static str = "Armor";
        const PROTO_ID: u8 = 41;
    }

    struct Spoof;

    impl Component for Spoof {
        const TAG: &'static str = "Spoof";
        const PROTO_ID: u8 = 40;
    }

    fn entity(id: u32) -> Entity {
        Entity::new(id, 0)
    }

    #[test]
    fn test_column_create_get_remove() {
        let mut column = ComponentColumn::<Health>::new(&StorageConfig::default());
        let mut cascade = DestroyQueue::new();

        for id in 1..=10 {
            column.create(entity(id), Health(id * 10)).unwrap();
        }
        assert_eq!(column.len(), 10);
        assert_eq!(column.get(entity(4)), Some(&Health(40)));

        assert!(column.remove(entity(4), &mut cascade));
        assert!(!column.remove(entity(4), &mut cascade));
        assert!(column.get(entity(4)).is_none());
        assert_eq!(column.len(), 9);
        assert_eq!(column.dead_count(), 1);
    }

    #[test]
    fn test_generation_mismatch_misses() {
        let mut column = ComponentColumn::<Health>::new(&StorageConfig::default());
        column.create(Entity::new(5, 0), Health(1)).unwrap();
        assert!(column.get(Entity::new(5, 1)).is_none());
        column.create(Entity::new(5, 1), Health(2)).unwrap();
        assert_eq!(column.get(Entity::new(5, 1)), Some(&Health(2)));
        assert_eq!(column.get(Entity::new(5, 0)), Some(&Health(1)));
    }

    #[test]
    fn test_compaction_preserves_order() {
        let mut column = ComponentColumn::<Health>::new(&StorageConfig::default());
        let mut cascade = DestroyQueue::new();
        for id in 1..=10 {
            column.create(entity(id), Health(id)).unwrap();
        }

        // 3/10 is not above the threshold; the fourth removal is.
        for id in [2, 4, 6] {
            column.remove(entity(id), &mut cascade);
        }
        assert_eq!(column.dead_count(), 3);
        column.remove(entity(8), &mut cascade);
        assert_eq!(column.dead_count(), 0);

        let owners: Vec<u32> = column.iter().map(|(e, _)| e.id()).collect();
        assert_eq!(owners, vec![1, 3, 5, 7, 9, 10]);
        for id in owners {
            assert_eq!(column.get(entity(id)), Some(&Health(id)));
        }
    }

    #[test]
    fn test_resolve_falls_back_after_compaction() {
        let mut column = ComponentColumn::<Health>::new(&StorageConfig::default());
        let mut cascade = DestroyQueue::new();
        column.create(entity(1), Health(1)).unwrap();
        let hint = column.create(entity(2), Health(2)).unwrap();
        column.remove(entity(1), &mut cascade);
        column.compact();

        let idx = column.resolve(entity(2), hint);
        assert_ne!(idx, hint);
        assert_eq!(column.get_at(idx), Some(&Health(2)));
    }

    #[test]
    fn test_store_rejects_duplicates_and_invalid() {
        let mut store = ComponentStore::default();
        store.create_component(entity(1), Health(1)).unwrap();

        let err = store.create_component(entity(1), Health(2)).unwrap_err();
        assert_eq!(
            err,
            ComponentError::AlreadyAttached {
                tag: "Health",
                entity: entity(1)
            }
        );
        assert_eq!(
            store.create_component(Entity::INVALID, Health(3)),
            Err(ComponentError::InvalidEntity)
        );
        assert_eq!(store.get_component::<Health>(entity(1)), Some(&Health(1)));
    }

    #[test]
    fn test_store_reap_entity_across_columns() {
        let mut store = ComponentStore::default();
        let mut cascade = DestroyQueue::new();
        store.create_component(entity(1), Health(1)).unwrap();
        store.create_component(entity(1), Armor).unwrap();
        store.create_component(entity(2), Armor).unwrap();

        assert_eq!(store.reap_entity(entity(1), &mut cascade), 2);
        assert!(!store.has_component::<Health>(entity(1)));
        assert!(!store.has_component::<Armor>(entity(1)));
        assert!(store.has_component::<Armor>(entity(2)));
        assert_eq!(store.reap_entity(entity(1), &mut cascade), 0);
    }

    #[test]
    fn test_unregistered_type_misses() {
        let store = ComponentStore::default();
        assert!(store.get_component::<Health>(entity(1)).is_none());
        assert!(!store.has_component::<Armor>(entity(1)));
    }

    #[test]
    #[should_panic(expected = "shares proto id")]
    fn test_proto_id_collision_panics() {
        let mut store = ComponentStore::default();
        store.create_component(entity(1), Health(1)).unwrap();
        let _ = store.create_component(entity(1), Spoof);
    }
}
