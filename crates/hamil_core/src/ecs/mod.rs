//! # Entity Component Storage
//!
//! Entities are bare ids; all state lives in per-type component columns.
//!
//! ## Design
//!
//! - Entity ids come from an LFSR and carry the period they were issued in
//! - Each component type owns a dense column indexed by a `HashIndex`
//! - Removal reaps rows in place; columns compact lazily
//! - Destruction cascades through component `destroyed()` hooks

mod component;
pub mod components;
mod entity;
mod entity_manager;
mod manager;
mod store;
mod world;

pub use component::{
    Component, ComponentMeta, ComponentProtoId, DestroyQueue, IS_TAG_COMPONENT,
    MAX_COMPONENT_TYPES,
};
pub use components::{GameObject, Light, LightKind, Transform};
pub use entity::{Entity, EntityId};
pub use entity_manager::{EntityManager, PrototypeSlot};
pub use manager::{ComponentManager, ComponentRef};
pub use store::{ComponentColumn, ComponentStore};
pub use world::{EntityMut, SharedWorld, World};
