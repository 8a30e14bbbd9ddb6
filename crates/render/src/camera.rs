use glam::{Mat4, Vec3};
use serde::Serialize;

/// Movement speed tier selected by modifier keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum MoveSpeed {
    Slow,
    #[default]
    Normal,
    Fast,
}

/// Per-frame input for the free-flight camera. Axes are in `[-1, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CameraInput {
    pub forward: f32,
    pub right: f32,
    pub up: f32,
    /// Positive turns right.
    pub yaw: f32,
    /// Positive looks up.
    pub pitch: f32,
    pub speed: MoveSpeed,
}

/// Critically damped spring towards `target` (Game Programming Gems 4, 1.10).
///
/// Updates `velocity` in place and returns the new value.
pub fn smooth_damp(current: f32, target: f32, velocity: &mut f32, smooth_time: f32, dt: f32) -> f32 {
    let smooth_time = smooth_time.max(1e-4);
    let omega = 2.0 / smooth_time;
    let x = omega * dt;
    let exp = 1.0 / (1.0 + x + 0.48 * x * x + 0.235 * x * x * x);
    let change = current - target;
    let temp = (*velocity + omega * change) * dt;
    *velocity = (*velocity - omega * temp) * exp;
    target + (change + temp) * exp
}

fn smooth_damp_vec3(current: Vec3, target: Vec3, velocity: &mut Vec3, smooth_time: f32, dt: f32) -> Vec3 {
    Vec3::new(
        smooth_damp(current.x, target.x, &mut velocity.x, smooth_time, dt),
        smooth_damp(current.y, target.y, &mut velocity.y, smooth_time, dt),
        smooth_damp(current.z, target.z, &mut velocity.z, smooth_time, dt),
    )
}

/// Fly camera with smoothed translation and yaw/pitch look.
///
/// Camera motion follows real elapsed time, so it is advanced from the
/// variable-rate update rather than the fixed tick.
#[derive(Debug, Clone, PartialEq)]
pub struct FreeFlightCamera {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub move_speed: f32,
    pub slow_speed: f32,
    pub fast_speed: f32,
    /// Radians per second at full deflection.
    pub rotation_speed: f32,
    pub smooth_time: f32,
    velocity: Vec3,
    damp_velocity: Vec3,
}

impl Default for FreeFlightCamera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 3.0, -10.0),
            yaw: 0.0,
            pitch: -10.0_f32.to_radians(),
            fov_y: 45.0_f32.to_radians(),
            aspect: 16.0 / 9.0,
            near: 1.0,
            far: 100.0,
            move_speed: 8.0,
            slow_speed: 2.0,
            fast_speed: 20.0,
            rotation_speed: 25.0_f32.to_radians(),
            smooth_time: 0.1,
            velocity: Vec3::ZERO,
            damp_velocity: Vec3::ZERO,
        }
    }
}

impl FreeFlightCamera {
    /// Default placement and speeds with the given projection. `fov_y` is in radians.
    pub fn new(fov_y: f32, near: f32, far: f32) -> Self {
        Self {
            fov_y,
            near,
            far,
            ..Self::default()
        }
    }

    /// Unit view direction. Yaw 0 looks down +Z.
    pub fn forward(&self) -> Vec3 {
        Vec3::new(
            self.yaw.sin() * self.pitch.cos(),
            self.pitch.sin(),
            self.yaw.cos() * self.pitch.cos(),
        )
        .normalize()
    }

    pub fn right(&self) -> Vec3 {
        self.forward().cross(Vec3::Y).normalize()
    }

    /// Current smoothed velocity in world units per second.
    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    pub fn update(&mut self, input: &CameraInput, dt: f32) {
        if dt <= 0.0 {
            return;
        }
        self.yaw += input.yaw.clamp(-1.0, 1.0) * self.rotation_speed * dt;
        self.pitch = (self.pitch + input.pitch.clamp(-1.0, 1.0) * self.rotation_speed * dt)
            .clamp(-89.0_f32.to_radians(), 89.0_f32.to_radians());

        let speed = match input.speed {
            MoveSpeed::Slow => self.slow_speed,
            MoveSpeed::Normal => self.move_speed,
            MoveSpeed::Fast => self.fast_speed,
        };
        let wish = self.forward() * input.forward + self.right() * input.right + Vec3::Y * input.up;
        let target = wish.clamp_length_max(1.0) * speed;
        self.velocity = smooth_damp_vec3(
            self.velocity,
            target,
            &mut self.damp_velocity,
            self.smooth_time,
            dt,
        );
        self.position += self.velocity * dt;
    }

    /// Only the aspect ratio depends on the surface; no other state changes.
    pub fn on_screen_size_change(&mut self, width: u32, height: u32) {
        self.aspect = width as f32 / height.max(1) as f32;
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.forward(), Vec3::Y)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Inverse view: camera-to-world.
    pub fn world_matrix(&self) -> Mat4 {
        self.view_matrix().inverse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_camera() {
        let cam = FreeFlightCamera::default();
        assert!(cam.position.y > 0.0);
        assert!(cam.forward().z > 0.9);
        assert!(cam.forward().y < 0.0);
        assert!(!cam.view_projection().col(0).x.is_nan());
    }

    #[test]
    fn new_sets_projection_and_starts_at_rest() {
        let cam = FreeFlightCamera::new(60.0_f32.to_radians(), 0.5, 250.0);
        assert_eq!(cam.fov_y, 60.0_f32.to_radians());
        assert_eq!(cam.near, 0.5);
        assert_eq!(cam.far, 250.0);
        assert_eq!(cam.velocity(), Vec3::ZERO);
        assert_eq!(cam.position, FreeFlightCamera::default().position);
    }

    #[test]
    fn smooth_damp_converges_without_overshoot() {
        let mut v = 0.0;
        let mut x = 0.0;
        for _ in 0..200 {
            x = smooth_damp(x, 10.0, &mut v, 0.1, 1.0 / 60.0);
            assert!(x <= 10.0 + 1e-4);
        }
        assert!((x - 10.0).abs() < 1e-3);
    }

    #[test]
    fn forward_input_accelerates_forward() {
        let mut cam = FreeFlightCamera::default();
        let start = cam.position;
        let input = CameraInput {
            forward: 1.0,
            ..Default::default()
        };
        for _ in 0..120 {
            cam.update(&input, 1.0 / 60.0);
        }
        let moved = cam.position - start;
        assert!(moved.dot(cam.forward()) > 0.0);
        assert!((cam.velocity().length() - cam.move_speed).abs() < 0.1);
    }

    #[test]
    fn fast_modifier_raises_top_speed() {
        let mut cam = FreeFlightCamera::default();
        let input = CameraInput {
            forward: 1.0,
            speed: MoveSpeed::Fast,
            ..Default::default()
        };
        for _ in 0..240 {
            cam.update(&input, 1.0 / 60.0);
        }
        assert!((cam.velocity().length() - cam.fast_speed).abs() < 0.2);
    }

    #[test]
    fn pitch_is_clamped() {
        let mut cam = FreeFlightCamera::default();
        let input = CameraInput {
            pitch: 1.0,
            ..Default::default()
        };
        for _ in 0..1000 {
            cam.update(&input, 0.1);
        }
        assert!(cam.pitch <= 89.0_f32.to_radians() + 1e-6);
    }

    #[test]
    fn resize_changes_only_aspect() {
        let mut cam = FreeFlightCamera::default();
        let before = cam.clone();
        cam.on_screen_size_change(1000, 500);
        assert_eq!(cam.aspect, 2.0);
        assert_eq!(cam.position, before.position);
        assert_eq!(cam.fov_y, before.fov_y);
        cam.on_screen_size_change(100, 0);
        assert!(cam.aspect.is_finite());
    }
}
