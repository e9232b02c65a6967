//! Spatial placement of an entity.

use bytemuck::{Pod, Zeroable};
use hamil_shared::{Aabb, Quaternion, Vec3, Xform};

use crate::ecs::component::{Component, ComponentProtoId};

/// World-space transform and local bounds.
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Transform {
    /// Position, orientation and scale.
    pub xform: Xform,
    /// Local-space bounding box.
    pub aabb: Aabb,
}

impl Component for Transform {
    const TAG: &'static str = "Transform";
    const PROTO_ID: ComponentProtoId = 0;
}

impl Default for Transform {
    fn default() -> Self {
        Self::new(Xform::IDENTITY, Aabb::default())
    }
}

impl Transform {
    /// Creates a transform with explicit bounds.
    #[inline]
    #[must_use]
    pub const fn new(xform: Xform, aabb: Aabb) -> Self {
        Self { xform, aabb }
    }

    /// Creates an unrotated, unscaled transform at `origin` with empty bounds.
    #[inline]
    #[must_use]
    pub fn from_origin(origin: Vec3) -> Self {
        Self::new(Xform::from_translation(origin), Aabb::default())
    }

    /// Creates a transform from its parts.
    #[inline]
    #[must_use]
    pub const fn from_parts(position: Vec3, orientation: Quaternion, scale: Vec3) -> Self {
        Self {
            xform: Xform::new(position, orientation, scale),
            aabb: Aabb {
                min: Vec3::ZERO,
                max: Vec3::ZERO,
            },
        }
    }

    /// Returns the position.
    #[inline]
    #[must_use]
    pub const fn origin(&self) -> Vec3 {
        self.xform.position
    }

    /// Moves the transform to `origin`.
    #[inline]
    pub fn set_origin(&mut self, origin: Vec3) {
        self.xform.position = origin;
    }

    /// Returns the bounds in world space (axis-aligned envelope).
    #[must_use]
    pub fn world_aabb(&self) -> Aabb {
        let corners = [
            Vec3::new(self.aabb.min.x, self.aabb.min.y, self.aabb.min.z),
            Vec3::new(self.aabb.max.x, self.aabb.min.y, self.aabb.min.z),
            Vec3::new(self.aabb.min.x, self.aabb.max.y, self.aabb.min.z),
            Vec3::new(self.aabb.min.x, self.aabb.min.y, self.aabb.max.z),
            Vec3::new(self.aabb.max.x, self.aabb.max.y, self.aabb.min.z),
            Vec3::new(self.aabb.max.x, self.aabb.min.y, self.aabb.max.z),
            Vec3::new(self.aabb.min.x, self.aabb.max.y, self.aabb.max.z),
            Vec3::new(self.aabb.max.x, self.aabb.max.y, self.aabb.max.z),
        ];

        let first = self.xform.apply(corners[0]);
        corners[1..].iter().fold(Aabb::new(first, first), |acc, &corner| {
            let p = self.xform.apply(corner);
            acc.union(&Aabb::new(p, p))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_origin() {
        let t = Transform::from_origin(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(t.origin(), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(t.xform.scale, Vec3::ONE);
    }

    #[test]
    fn test_world_aabb_translates() {
        let mut t = Transform::new(
            Xform::from_translation(Vec3::new(10.0, 0.0, 0.0)),
            Aabb::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::ONE),
        );
        let aabb = t.world_aabb();
        assert_eq!(aabb.min, Vec3::new(9.0, -1.0, -1.0));
        assert_eq!(aabb.max, Vec3::new(11.0, 1.0, 1.0));

        t.set_origin(Vec3::ZERO);
        assert_eq!(t.world_aabb().center(), Vec3::ZERO);
    }
}
