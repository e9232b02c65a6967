//! # Utilities
//!
//! Index structures shared by every storage layer.

pub mod hash_index;
mod lfsr;

pub use hash_index::HashIndex;
pub use lfsr::Lfsr32;
