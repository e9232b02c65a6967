//! # Built-in Components
//!
//! | Component      | PROTO_ID | Plain data |
//! |----------------|----------|------------|
//! | [`Transform`]  | 0        | yes        |
//! | [`GameObject`] | 1        | no         |
//! | [`Light`]      | 2        | yes        |
//!
//! Plain-data components can also live in prototype chunks.

mod game_object;
mod light;
mod transform;

pub use game_object::GameObject;
pub use light::{Light, LightKind};
pub use transform::Transform;
