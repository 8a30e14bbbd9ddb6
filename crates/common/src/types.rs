use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Width and height of a presentation surface in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Extent2D {
    pub width: u32,
    pub height: u32,
}

impl Extent2D {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// The same extent with each axis raised to at least 1, so buffers are never degenerate.
    pub fn at_least_one(self) -> Self {
        Self {
            width: self.width.max(1),
            height: self.height.max(1),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Width over height, with a zero height treated as 1.
    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}

/// Spatial transform: position, rotation, scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    pub fn matrix(&self) -> glam::Mat4 {
        glam::Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extent_clamps_to_one() {
        let e = Extent2D::new(0, 0).at_least_one();
        assert_eq!(e, Extent2D::new(1, 1));
        assert!(Extent2D::new(0, 10).is_empty());
    }

    #[test]
    fn aspect_ratio_tolerates_zero_height() {
        assert_eq!(Extent2D::new(800, 0).aspect_ratio(), 800.0);
        assert!((Extent2D::new(1600, 900).aspect_ratio() - 16.0 / 9.0).abs() < 1e-6);
    }

    #[test]
    fn transform_default_is_identity() {
        let t = Transform::default();
        assert_eq!(t.position, Vec3::ZERO);
        assert_eq!(t.rotation, Quat::IDENTITY);
        assert_eq!(t.scale, Vec3::ONE);
        assert_eq!(t.matrix(), glam::Mat4::IDENTITY);
    }
}
