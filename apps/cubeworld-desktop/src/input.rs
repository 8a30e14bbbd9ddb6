use cubeworld_render::{CameraInput, MoveSpeed};
use std::collections::HashSet;
use winit::keyboard::KeyCode;

fn axis(keys: &HashSet<KeyCode>, negative: &[KeyCode], positive: &[KeyCode]) -> f32 {
    let held = |set: &[KeyCode]| set.iter().any(|k| keys.contains(k));
    match (held(negative), held(positive)) {
        (false, true) => 1.0,
        (true, false) => -1.0,
        _ => 0.0,
    }
}

/// WASD moves, Space/C rise and sink, arrows look. Shift is fast, Ctrl slow.
pub fn camera_input(keys: &HashSet<KeyCode>) -> CameraInput {
    let speed = if keys.contains(&KeyCode::ShiftLeft) || keys.contains(&KeyCode::ShiftRight) {
        MoveSpeed::Fast
    } else if keys.contains(&KeyCode::ControlLeft) || keys.contains(&KeyCode::ControlRight) {
        MoveSpeed::Slow
    } else {
        MoveSpeed::Normal
    };
    CameraInput {
        forward: axis(keys, &[KeyCode::KeyS], &[KeyCode::KeyW]),
        right: axis(keys, &[KeyCode::KeyA], &[KeyCode::KeyD]),
        up: axis(keys, &[KeyCode::KeyC], &[KeyCode::Space]),
        yaw: axis(keys, &[KeyCode::ArrowLeft], &[KeyCode::ArrowRight]),
        pitch: axis(keys, &[KeyCode::ArrowDown], &[KeyCode::ArrowUp]),
        speed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn held(keys: &[KeyCode]) -> HashSet<KeyCode> {
        keys.iter().copied().collect()
    }

    #[test]
    fn no_keys_means_no_motion() {
        assert_eq!(camera_input(&HashSet::new()), CameraInput::default());
    }

    #[test]
    fn opposite_keys_cancel() {
        let input = camera_input(&held(&[KeyCode::KeyW, KeyCode::KeyS, KeyCode::KeyD]));
        assert_eq!(input.forward, 0.0);
        assert_eq!(input.right, 1.0);
    }

    #[test]
    fn modifiers_pick_speed() {
        let input = camera_input(&held(&[KeyCode::ShiftLeft, KeyCode::ControlLeft]));
        assert_eq!(input.speed, MoveSpeed::Fast);
        let input = camera_input(&held(&[KeyCode::ControlRight, KeyCode::ArrowUp]));
        assert_eq!(input.speed, MoveSpeed::Slow);
        assert_eq!(input.pitch, 1.0);
    }
}
