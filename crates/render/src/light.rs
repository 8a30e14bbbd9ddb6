use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use serde::Serialize;

/// Lights bound per frame.
pub const MAX_LIGHTS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u32)]
pub enum LightKind {
    Directional = 1,
    Point = 2,
    Spot = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Light {
    pub kind: LightKind,
    pub position: Vec3,
    pub direction: Vec3,
    pub color: Vec3,
    pub intensity: f32,
    pub linear_attenuation: f32,
    pub quadratic_attenuation: f32,
    pub enabled: bool,
}

impl Light {
    pub fn directional(direction: Vec3, color: Vec3, intensity: f32) -> Self {
        Self {
            kind: LightKind::Directional,
            position: Vec3::ZERO,
            direction: direction.normalize_or_zero(),
            color,
            intensity,
            linear_attenuation: 0.0,
            quadratic_attenuation: 0.0,
            enabled: true,
        }
    }

    pub fn point(position: Vec3, color: Vec3, intensity: f32) -> Self {
        Self {
            kind: LightKind::Point,
            position,
            direction: Vec3::ZERO,
            color,
            intensity,
            linear_attenuation: 0.09,
            quadratic_attenuation: 0.032,
            enabled: true,
        }
    }

    pub fn spot(position: Vec3, direction: Vec3, color: Vec3, intensity: f32) -> Self {
        Self {
            kind: LightKind::Spot,
            direction: direction.normalize_or_zero(),
            ..Self::point(position, color, intensity)
        }
    }
}

/// GPU layout of one light, 16-byte aligned rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct LightUniform {
    pub position: [f32; 3],
    pub intensity: f32,
    pub direction: [f32; 3],
    pub linear_attenuation: f32,
    pub color: [f32; 3],
    pub quadratic_attenuation: f32,
    pub kind: u32,
    pub enabled: u32,
    pub _pad: [u32; 2],
}

/// GPU layout of the per-frame lighting block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct LightingUniform {
    pub eye_position: [f32; 3],
    pub light_count: u32,
    pub lights: [LightUniform; MAX_LIGHTS],
}

/// Fixed-capacity light list plus the eye position used for specular terms.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LightSet {
    lights: Vec<Light>,
    pub eye_position: Vec3,
}

impl LightSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the slot, or `None` when all [`MAX_LIGHTS`] slots are taken.
    pub fn add(&mut self, light: Light) -> Option<usize> {
        if self.lights.len() >= MAX_LIGHTS {
            tracing::warn!(max = MAX_LIGHTS, "light set full, light ignored");
            return None;
        }
        self.lights.push(light);
        Some(self.lights.len() - 1)
    }

    pub fn get_mut(&mut self, slot: usize) -> Option<&mut Light> {
        self.lights.get_mut(slot)
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    pub fn enabled(&self) -> impl Iterator<Item = &Light> {
        self.lights.iter().filter(|l| l.enabled)
    }

    pub fn to_uniform(&self) -> LightingUniform {
        let mut uniform = LightingUniform {
            eye_position: self.eye_position.to_array(),
            light_count: self.lights.len() as u32,
            ..Default::default()
        };
        for (slot, light) in uniform.lights.iter_mut().zip(&self.lights) {
            *slot = LightUniform {
                position: light.position.to_array(),
                intensity: light.intensity,
                direction: light.direction.to_array(),
                linear_attenuation: light.linear_attenuation,
                color: light.color.to_array(),
                quadratic_attenuation: light.quadratic_attenuation,
                kind: light.kind as u32,
                enabled: u32::from(light.enabled),
                _pad: [0; 2],
            };
        }
        uniform
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_is_bounded() {
        let mut set = LightSet::new();
        assert_eq!(set.add(Light::directional(Vec3::NEG_Y, Vec3::ONE, 1.0)), Some(0));
        assert_eq!(set.add(Light::point(Vec3::Y, Vec3::ONE, 1.0)), Some(1));
        assert_eq!(set.add(Light::point(Vec3::X, Vec3::ONE, 1.0)), None);
        assert_eq!(set.lights().len(), MAX_LIGHTS);
    }

    #[test]
    fn uniform_layout() {
        assert_eq!(std::mem::size_of::<LightUniform>() % 16, 0);
        assert_eq!(std::mem::size_of::<LightingUniform>() % 16, 0);

        let mut set = LightSet::new();
        set.eye_position = Vec3::new(1.0, 2.0, 3.0);
        set.add(Light::spot(Vec3::ZERO, Vec3::new(0.0, -2.0, 0.0), Vec3::ONE, 0.5));
        let u = set.to_uniform();
        assert_eq!(u.light_count, 1);
        assert_eq!(u.eye_position, [1.0, 2.0, 3.0]);
        assert_eq!(u.lights[0].kind, 3);
        assert_eq!(u.lights[0].direction, [0.0, -1.0, 0.0]);
        assert_eq!(u.lights[1].enabled, 0);
    }

    #[test]
    fn disabled_lights_are_skipped() {
        let mut set = LightSet::new();
        set.add(Light::directional(Vec3::NEG_Y, Vec3::ONE, 1.0));
        if let Some(light) = set.get_mut(0) {
            light.enabled = false;
        }
        assert_eq!(set.enabled().count(), 0);
    }
}
