//! # Entity Identity
//!
//! An entity carries no storage of its own. It is a 32-bit id drawn from the
//! entity manager's LFSR, paired with the generation (LFSR period) in which
//! the id was issued:
//! - The id is the key into every component column's hash index
//! - The generation tells a reissued id apart from its previous lifetime

use std::fmt;

/// Raw 32-bit entity identifier. Zero is reserved as invalid.
pub type EntityId = u32;

/// Versioned entity handle.
///
/// Equality compares both the id and the generation. Liveness is not stored
/// here; ask the [`EntityManager`](super::EntityManager).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Entity {
    id: EntityId,
    generation: u32,
}

impl Entity {
    /// The invalid entity (id 0).
    pub const INVALID: Self = Self::new(0, 0);

    /// Creates an entity handle from an id and generation.
    #[inline]
    #[must_use]
    pub const fn new(id: EntityId, generation: u32) -> Self {
        Self { id, generation }
    }

    /// Returns the raw id (the hash key).
    #[inline]
    #[must_use]
    pub const fn id(self) -> EntityId {
        self.id
    }

    /// Returns the generation the id was issued in.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }

    /// Returns `true` unless this is [`Entity::INVALID`].
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.id != Self::INVALID.id
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}v{}", self.id, self.generation)
    }
}
