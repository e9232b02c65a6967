//! Light sources.

use bytemuck::{Pod, Zeroable};
use hamil_shared::Vec3;

use crate::ecs::component::{Component, ComponentProtoId};

/// Shape of a light source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum LightKind {
    /// Parallel rays; the entity's position is the direction.
    Directional = 1,
    /// Cone.
    Spot = 2,
    /// Segment.
    Line = 3,
    /// Rectangle.
    Rectangle = 4,
    /// Quad.
    Quad = 5,
    /// Sphere.
    Sphere = 6,
    /// Disk.
    Disk = 7,
    /// Image-based lighting probe.
    ImageBased = 8,
}

impl TryFrom<u16> for LightKind {
    type Error = u16;

    fn try_from(raw: u16) -> Result<Self, u16> {
        Ok(match raw {
            1 => Self::Directional,
            2 => Self::Spot,
            3 => Self::Line,
            4 => Self::Rectangle,
            5 => Self::Quad,
            6 => Self::Sphere,
            7 => Self::Disk,
            8 => Self::ImageBased,
            other => return Err(other),
        })
    }
}

/// Light source parameters.
///
/// Plain data, so it can be stored in prototype chunks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Light {
    /// Raw [`LightKind`]; zero means unset.
    pub kind: u16,
    /// Bitwise OR of `Light::SHADOW_CASTING` etc.
    pub flags: u16,
    /// Falloff radius.
    pub radius: f32,
    /// Linear color; channels may exceed 1.0.
    pub color: Vec3,
    /// Shape parameters: spot direction and angle, line tangent and length,
    /// or sphere radius in `params[0]`.
    pub params: [f32; 4],
}

impl Component for Light {
    const TAG: &'static str = "Light";
    const PROTO_ID: ComponentProtoId = 2;
}

impl Light {
    /// The light casts shadows.
    pub const SHADOW_CASTING: u16 = 1 << 0;

    /// Creates a light with no shape parameters.
    #[must_use]
    pub const fn new(kind: LightKind, radius: f32, color: Vec3) -> Self {
        Self {
            kind: kind as u16,
            flags: 0,
            radius,
            color,
            params: [0.0; 4],
        }
    }

    /// Creates a spot light.
    #[must_use]
    pub const fn spot(radius: f32, color: Vec3, direction: Vec3, angle: f32) -> Self {
        let mut light = Self::new(LightKind::Spot, radius, color);
        light.params = [direction.x, direction.y, direction.z, angle];
        light
    }

    /// Creates a spherical area light.
    #[must_use]
    pub const fn sphere(radius: f32, color: Vec3, sphere_radius: f32) -> Self {
        let mut light = Self::new(LightKind::Sphere, radius, color);
        light.params[0] = sphere_radius;
        light
    }

    /// Decodes the light kind, if set.
    #[must_use]
    pub fn light_kind(&self) -> Option<LightKind> {
        LightKind::try_from(self.kind).ok()
    }

    /// Checks if the light casts shadows.
    #[inline]
    #[must_use]
    pub const fn casts_shadows(&self) -> bool {
        self.flags & Self::SHADOW_CASTING != 0
    }

    /// Returns a copy with shadow casting enabled.
    #[must_use]
    pub const fn with_shadows(mut self) -> Self {
        self.flags |= Self::SHADOW_CASTING;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_light_kind_roundtrip() {
        let light = Light::spot(5.0, Vec3::ONE, Vec3::Z, 0.5).with_shadows();
        assert_eq!(light.light_kind(), Some(LightKind::Spot));
        assert!(light.casts_shadows());
        assert_eq!(light.params[3], 0.5);
        assert_eq!(Light::default().light_kind(), None);
    }

    #[test]
    fn test_light_is_plain_data() {
        assert_eq!(std::mem::size_of::<Light>(), 36);
        let light = Light::sphere(2.0, Vec3::ONE, 0.25);
        let bytes = bytemuck::bytes_of(&light);
        let back: Light = bytemuck::pod_read_unaligned(bytes);
        assert_eq!(back, light);
    }
}
