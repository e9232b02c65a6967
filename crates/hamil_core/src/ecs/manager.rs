//! # Component Manager
//!
//! Typed facade over the [`ComponentStore`], plus [`ComponentRef`], the
//! handle callers keep instead of raw row pointers.

use std::fmt;
use std::marker::PhantomData;

use super::component::{Component, DestroyQueue};
use super::entity::Entity;
use super::store::{ComponentColumn, ComponentStore};
use crate::config::StorageConfig;
use crate::error::ComponentResult;
use crate::util::hash_index::{HashIndex, Index};

/// Typed reference to an entity's component.
///
/// Holds the owner and the row index seen at creation. The index is only a
/// hint: every access re-validates it and falls back to the hash index, so a
/// reference stays usable across compactions.
pub struct ComponentRef<T> {
    entity: Entity,
    index_hint: Index,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for ComponentRef<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ComponentRef<T> {}

impl<T> PartialEq for ComponentRef<T> {
    fn eq(&self, other: &Self) -> bool {
        self.entity == other.entity
    }
}

impl<T> Eq for ComponentRef<T> {}

impl<T: Component> fmt::Debug for ComponentRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRef")
            .field("tag", &T::TAG)
            .field("entity", &self.entity)
            .field("index_hint", &self.index_hint)
            .finish()
    }
}

impl<T> Default for ComponentRef<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T> ComponentRef<T> {
    /// The empty reference.
    #[inline]
    #[must_use]
    pub const fn null() -> Self {
        Self {
            entity: Entity::INVALID,
            index_hint: HashIndex::INVALID,
            _marker: PhantomData,
        }
    }

    /// Checks if this is the empty reference.
    #[inline]
    #[must_use]
    pub const fn is_null(&self) -> bool {
        !self.entity.is_valid()
    }

    /// The owning entity.
    #[inline]
    #[must_use]
    pub const fn entity(&self) -> Entity {
        self.entity
    }

    /// The row index at the time the reference was made.
    #[inline]
    #[must_use]
    pub const fn index_hint(&self) -> Index {
        self.index_hint
    }
}

impl<T: Component> ComponentRef<T> {
    /// Resolves the reference.
    #[must_use]
    pub fn get<'a>(&self, components: &'a ComponentManager) -> Option<&'a T> {
        let column = components.store.column::<T>()?;
        column.get_at(column.resolve(self.entity, self.index_hint))
    }

    /// Resolves the reference mutably.
    pub fn get_mut<'a>(&self, components: &'a mut ComponentManager) -> Option<&'a mut T> {
        let column = components.store.column_mut::<T>()?;
        let idx = column.resolve(self.entity, self.index_hint);
        column.get_at_mut(idx)
    }

    /// Checks if the component still exists.
    #[must_use]
    pub fn is_valid(&self, components: &ComponentManager) -> bool {
        self.get(components).is_some()
    }
}

/// Owner of every component column.
///
/// # Example
///
/// ```rust,ignore
/// let mut components = ComponentManager::default();
/// let health = components.create_component(entity, Health(100))?;
/// health.get_mut(&mut components).unwrap().0 -= 10;
/// ```
#[derive(Default)]
pub struct ComponentManager {
    store: ComponentStore,
}

impl ComponentManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new(config: StorageConfig) -> Self {
        Self {
            store: ComponentStore::new(config),
        }
    }

    /// Direct access to the underlying store.
    #[inline]
    #[must_use]
    pub const fn store(&self) -> &ComponentStore {
        &self.store
    }

    /// Creates the column for `T` ahead of first use.
    ///
    /// # Errors
    ///
    /// See [`ComponentStore::register`].
    pub fn register<T: Component>(&mut self) -> ComponentResult<()> {
        self.store.register::<T>().map(|_| ())
    }

    /// Attaches `value` to `entity`.
    ///
    /// # Errors
    ///
    /// Returns an error for the invalid entity, an entity that already owns
    /// a `T`, or a `T` whose proto id is out of range.
    pub fn create_component<T: Component>(
        &mut self,
        entity: Entity,
        value: T,
    ) -> ComponentResult<ComponentRef<T>> {
        let index_hint = self.store.create_component(entity, value)?;
        Ok(ComponentRef {
            entity,
            index_hint,
            _marker: PhantomData,
        })
    }

    /// Returns a reference to `entity`'s `T`, or [`ComponentRef::null`].
    #[must_use]
    pub fn component_ref<T: Component>(&self, entity: Entity) -> ComponentRef<T> {
        let index_hint = self
            .store
            .column::<T>()
            .map_or(HashIndex::INVALID, |column| column.find(entity));
        if index_hint == HashIndex::INVALID {
            return ComponentRef::null();
        }
        ComponentRef {
            entity,
            index_hint,
            _marker: PhantomData,
        }
    }

    /// Returns `entity`'s `T`.
    #[inline]
    #[must_use]
    pub fn get_component<T: Component>(&self, entity: Entity) -> Option<&T> {
        self.store.get_component(entity)
    }

    /// Returns `entity`'s `T` mutably.
    #[inline]
    pub fn get_component_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        self.store.get_component_mut(entity)
    }

    /// Checks if `entity` owns a `T`.
    #[inline]
    #[must_use]
    pub fn has_component<T: Component>(&self, entity: Entity) -> bool {
        self.store.has_component::<T>(entity)
    }

    /// Reaps `entity`'s `T`, running its `destroyed()` hook.
    pub fn remove_component<T: Component>(
        &mut self,
        entity: Entity,
        cascade: &mut DestroyQueue,
    ) -> bool {
        self.store.remove_component::<T>(entity, cascade)
    }

    /// Reaps all of `entity`'s components.
    pub fn reap_entity(&mut self, entity: Entity, cascade: &mut DestroyQueue) -> usize {
        self.store.reap_entity(entity, cascade)
    }

    /// Calls `f` on every live `T` in dense order.
    pub fn foreach<T: Component, F>(&mut self, mut f: F)
    where
        F: FnMut(Entity, &mut T),
    {
        if let Some(column) = self.store.column_mut::<T>() {
            for (entity, value) in column.iter_mut() {
                f(entity, value);
            }
        }
    }

    /// Iterates over every live `T` in dense order.
    pub fn iter<T: Component>(&self) -> impl Iterator<Item = (Entity, &T)> {
        self.store
            .column::<T>()
            .into_iter()
            .flat_map(ComponentColumn::iter)
    }

    /// Compacts the `T` column regardless of its dead fraction.
    pub fn compact<T: Component>(&mut self) {
        if let Some(column) = self.store.column_mut::<T>() {
            column.compact();
        }
    }

    /// Number of live `T` components.
    #[must_use]
    pub fn len<T: Component>(&self) -> usize {
        self.store.column::<T>().map_or(0, ComponentColumn::len)
    }

    /// Number of reaped `T` rows awaiting compaction.
    #[must_use]
    pub fn dead_count<T: Component>(&self) -> usize {
        self.store
            .column::<T>()
            .map_or(0, ComponentColumn::dead_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Score(i32);

    impl Component for Score {
        const TAG: &'static str = "Score";
        const PROTO_ID: u8 = 50;
    }

    #[test]
    fn test_ref_survives_compaction() {
        let mut components = ComponentManager::default();
        let mut cascade = DestroyQueue::new();

        let refs: Vec<ComponentRef<Score>> = (1..=10)
            .map(|id| {
                components
                    .create_component(Entity::new(id, 0), Score(id as i32))
                    .unwrap()
            })
            .collect();

        for id in 1..=4 {
            components.remove_component::<Score>(Entity::new(id, 0), &mut cascade);
        }
        assert_eq!(components.dead_count::<Score>(), 0);
        assert_eq!(components.len::<Score>(), 6);

        assert!(!refs[0].is_valid(&components));
        assert_eq!(refs[9].get(&components), Some(&Score(10)));

        refs[5].get_mut(&mut components).unwrap().0 = 60;
        assert_eq!(
            components.get_component::<Score>(Entity::new(6, 0)),
            Some(&Score(60))
        );
    }

    #[test]
    fn test_component_ref_lookup() {
        let mut components = ComponentManager::default();
        let e = Entity::new(9, 0);
        assert!(components.component_ref::<Score>(e).is_null());

        components.create_component(e, Score(1)).unwrap();
        let found = components.component_ref::<Score>(e);
        assert_eq!(found.entity(), e);
        assert_eq!(found.get(&components), Some(&Score(1)));
        assert!(ComponentRef::<Score>::null().get(&components).is_none());
    }

    #[test]
    fn test_foreach_and_iter_skip_dead() {
        let mut components = ComponentManager::default();
        let mut cascade = DestroyQueue::new();
        for id in 1..=5 {
            components
                .create_component(Entity::new(id, 0), Score(0))
                .unwrap();
        }
        components.remove_component::<Score>(Entity::new(3, 0), &mut cascade);

        components.foreach::<Score, _>(|entity, score| score.0 = entity.id() as i32);
        let seen: Vec<(u32, i32)> = components
            .iter::<Score>()
            .map(|(entity, score)| (entity.id(), score.0))
            .collect();
        assert_eq!(seen, vec![(1, 1), (2, 2), (4, 4), (5, 5)]);

        components.compact::<Score>();
        assert_eq!(components.dead_count::<Score>(), 0);
        assert_eq!(components.iter::<Score>().count(), 4);
    }
}
