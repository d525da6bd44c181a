//! Per-tick input snapshot consumed by camera controllers

use bitflags::bitflags;

bitflags! {
    /// Camera actions currently held down
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CameraKeys: u32 {
        /// Move along the view direction
        const MOVE_FORWARD = 1 << 0;
        /// Move against the view direction
        const MOVE_BACKWARD = 1 << 1;
        /// Strafe left
        const MOVE_LEFT = 1 << 2;
        /// Strafe right
        const MOVE_RIGHT = 1 << 3;
        /// Move up
        const MOVE_UP = 1 << 4;
        /// Move down
        const MOVE_DOWN = 1 << 5;
        /// Yaw left
        const LOOK_LEFT = 1 << 6;
        /// Yaw right
        const LOOK_RIGHT = 1 << 7;
        /// Pitch up
        const LOOK_UP = 1 << 8;
        /// Pitch down
        const LOOK_DOWN = 1 << 9;
    }
}

/// Input accumulated between two controller updates
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputState {
    /// Held camera actions
    pub keys: CameraKeys,
    /// Cursor movement in pixels since the last update
    pub mouse_delta: [f32; 2],
    /// Scroll movement since the last update
    pub scroll_delta: f32,
    /// Left mouse button held
    pub left_button: bool,
    /// Viewport size in pixels
    pub viewport: [f32; 2],
    last_cursor: Option<[f32; 2]>,
}

impl InputState {
    /// Create an empty snapshot for a viewport
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            viewport: [width, height],
            ..Self::default()
        }
    }

    /// Record an absolute cursor position; the first sample only seeds the delta
    pub fn cursor_moved(&mut self, x: f32, y: f32) {
        if let Some([last_x, last_y]) = self.last_cursor {
            self.mouse_delta[0] += x - last_x;
            self.mouse_delta[1] += y - last_y;
        }
        self.last_cursor = Some([x, y]);
    }

    /// Press or release a camera action
    pub fn set_key(&mut self, key: CameraKeys, pressed: bool) {
        self.keys.set(key, pressed);
    }

    /// Clear per-update deltas while keeping held state
    pub fn end_frame(&mut self) {
        self.mouse_delta = [0.0, 0.0];
        self.scroll_delta = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_cursor_sample_has_no_delta() {
        let mut input = InputState::new(800.0, 600.0);
        input.cursor_moved(100.0, 100.0);
        assert_eq!(input.mouse_delta, [0.0, 0.0]);
        input.cursor_moved(110.0, 95.0);
        assert_eq!(input.mouse_delta, [10.0, -5.0]);
    }

    #[test]
    fn test_end_frame_keeps_held_keys() {
        let mut input = InputState::new(800.0, 600.0);
        input.set_key(CameraKeys::MOVE_FORWARD | CameraKeys::LOOK_LEFT, true);
        input.scroll_delta = 2.0;
        input.end_frame();
        assert!(input.keys.contains(CameraKeys::MOVE_FORWARD));
        assert_eq!(input.scroll_delta, 0.0);

        input.set_key(CameraKeys::LOOK_LEFT, false);
        assert_eq!(input.keys, CameraKeys::MOVE_FORWARD);
    }
}
