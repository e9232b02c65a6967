//! # Component System
//!
//! Components are plain value types stored by value in dense per-type
//! columns. Each type declares:
//! - `TAG`: a short human-readable name used in diagnostics
//! - `PROTO_ID`: a compile-time-unique slot in the component table, also the
//!   bit index in prototype signatures
//!
//! Type dispatch compares `TypeId`s, never tags.

use std::mem;

use super::entity::Entity;

/// Index of a component type in the component table (0-127).
pub type ComponentProtoId = u8;

/// Number of distinct component types a store can hold.
pub const MAX_COMPONENT_TYPES: usize = 128;

/// Marker trait for storable components.
///
/// # Example
///
/// ```rust,ignore
/// struct Health(f32);
///
/// impl Component for Health {
///     const TAG: &'static str = "Health";
///     const PROTO_ID: ComponentProtoId = 10;
/// }
/// ```
pub trait Component: Send + Sync + 'static {
    /// Debug name for this component type.
    const TAG: &'static str;

    /// Unique slot for this component type (below [`MAX_COMPONENT_TYPES`]).
    const PROTO_ID: ComponentProtoId;

    /// Called right before the component is reaped, either by an explicit
    /// removal or because its entity is being destroyed.
    ///
    /// Entities pushed onto `cascade` are destroyed afterwards by the
    /// entity manager.
    fn destroyed(&mut self, cascade: &mut DestroyQueue) {
        let _ = cascade;
    }
}

/// Entities scheduled for destruction by component `destroyed()` hooks.
///
/// The entity manager drains the queue iteratively, so deep hierarchies do
/// not recurse.
#[derive(Debug, Default)]
pub struct DestroyQueue {
    pending: Vec<Entity>,
}

impl DestroyQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `entity` for destruction. Invalid entities are ignored.
    #[inline]
    pub fn push(&mut self, entity: Entity) {
        if entity.is_valid() {
            self.pending.push(entity);
        }
    }

    /// Takes the next scheduled entity.
    #[inline]
    pub fn pop(&mut self) -> Option<Entity> {
        self.pending.pop()
    }

    /// Number of scheduled entities.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Checks if nothing is scheduled.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Flag set on components that carry no data and only group entities.
pub const IS_TAG_COMPONENT: u32 = 1 << 0;

/// Static layout description of a component type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ComponentMeta {
    /// Slot in the component table.
    pub proto_id: ComponentProtoId,
    /// Debug name.
    pub tag: &'static str,
    /// `size_of::<T>()`.
    pub data_size: usize,
    /// `align_of::<T>()`.
    pub align: usize,
    /// Bitwise OR of flag constants such as [`IS_TAG_COMPONENT`].
    pub flags: u32,
}

impl ComponentMeta {
    /// Describes component type `T`.
    #[must_use]
    pub const fn of<T: Component>() -> Self {
        let data_size = mem::size_of::<T>();
        Self {
            proto_id: T::PROTO_ID,
            tag: T::TAG,
            data_size,
            align: mem::align_of::<T>(),
            flags: if data_size == 0 { IS_TAG_COMPONENT } else { 0 },
        }
    }

    /// Checks if the component carries no data.
    #[inline]
    #[must_use]
    pub const fn is_tag(&self) -> bool {
        self.flags & IS_TAG_COMPONENT != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    struct Marker;

    impl Component for Marker {
        const TAG: &'static str = "Marker";
        const PROTO_ID: ComponentProtoId = 100;
    }

    #[test]
    fn test_meta_of_tag_component() {
        let meta = ComponentMeta::of::<Marker>();
        assert_eq!(meta.proto_id, 100);
        assert_eq!(meta.tag, "Marker");
        assert_eq!(meta.data_size, 0);
        assert!(meta.is_tag());
    }

    #[test]
    fn test_destroy_queue_skips_invalid() {
        let mut queue = DestroyQueue::new();
        queue.push(Entity::INVALID);
        queue.push(Entity::new(3, 0));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop(), Some(Entity::new(3, 0)));
        assert!(queue.is_empty());
    }
}
