//! # Game Objects
//!
//! Named entities arranged in a parent/child hierarchy.
//!
//! Children are stored by handle. A child that dies is not unlinked right
//! away: the next [`GameObject::foreach_child`] pass reaps it, and the list
//! is compacted once enough of it is dead. Destroying a game object
//! destroys its children.

use tracing::debug;

use crate::ecs::component::{Component, ComponentProtoId, DestroyQueue};
use crate::ecs::entity::Entity;

/// Name and hierarchy links of an entity.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GameObject {
    name: String,
    parent: Entity,
    children: Vec<Entity>,
}

impl Component for GameObject {
    const TAG: &'static str = "GameObject";
    const PROTO_ID: ComponentProtoId = 1;

    fn destroyed(&mut self, cascade: &mut DestroyQueue) {
        for child in self.children.drain(..) {
            cascade.push(child);
        }
    }
}

impl GameObject {
    /// Creates a game object. Pass [`Entity::INVALID`] for a root.
    #[must_use]
    pub fn new(name: impl Into<String>, parent: Entity) -> Self {
        Self {
            name: name.into(),
            parent,
            children: Vec::new(),
        }
    }

    /// The object's name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The parent entity, or [`Entity::INVALID`] for a root.
    #[inline]
    #[must_use]
    pub const fn parent(&self) -> Entity {
        self.parent
    }

    /// Raw child list, including reaped (invalid) and dead entries.
    #[inline]
    #[must_use]
    pub fn children(&self) -> &[Entity] {
        &self.children
    }

    pub(crate) fn add_child(&mut self, child: Entity) {
        self.children.push(child);
    }

    /// Calls `f` on every child for which `alive` holds.
    ///
    /// Children found dead are reaped in place. When the dead fraction of the
    /// list exceeds `compaction_threshold` afterwards, reaped entries are
    /// dropped, keeping the order of the rest.
    pub fn foreach_child<A, F>(&mut self, compaction_threshold: f32, alive: A, mut f: F)
    where
        A: Fn(Entity) -> bool,
        F: FnMut(Entity),
    {
        if self.children.is_empty() {
            return;
        }

        let mut dead_children = 0usize;
        for child in &mut self.children {
            if !child.is_valid() {
                dead_children += 1;
            } else if !alive(*child) {
                *child = Entity::INVALID;
                dead_children += 1;
            } else {
                f(*child);
            }
        }

        let dead_fraction = dead_children as f32 / self.children.len() as f32;
        if dead_fraction > compaction_threshold {
            self.children.retain(|child| child.is_valid());
            debug!(
                name = %self.name,
                reaped = dead_children,
                "compacted game object children"
            );
        }
    }
}
