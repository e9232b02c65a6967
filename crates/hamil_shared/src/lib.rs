//! # Hamil Shared
//!
//! Plain math value types used by components in the storage core and by
//! the collaborators that read component snapshots (renderer, physics).
//!
//! Everything here is `Pod` so it can be packed into prototype chunks.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod math;

pub use math::{Aabb, Quaternion, Vec3, Xform};
