//! Camera controllers
//!
//! Each controller turns one tick of [`InputState`] into a new camera view.
//! [`CameraController`] dispatches to the active one.

use std::f32::consts::{PI, TAU};

use super::camera::{Camera, DEFAULT_UP};
use crate::foundation::math::{Rotation3, Unit, Vec3, DEGENERATE_EPSILON};
use crate::platform::{CameraKeys, InputState};

/// Pitch limit, about 85 degrees
pub const PITCH_LIMIT: f32 = 1.5;

/// Orbits a fixed target; drag to rotate, forward/backward keys to zoom
#[derive(Debug, Clone, PartialEq)]
pub struct ArcballController {
    /// Pivot point
    pub target: Vec3,
    /// Zoom speed in units per second
    pub zoom_speed: f32,
}

impl ArcballController {
    /// Orbit `target`
    pub fn new(target: Vec3) -> Self {
        Self {
            target,
            zoom_speed: 2.0,
        }
    }

    /// Apply one tick of input
    pub fn update(&self, camera: &mut Camera, input: &InputState, dt: f32) {
        let [width, height] = input.viewport;
        // Full width drag is one turn, full height drag half a turn
        let angle_scale_x = if width > 0.0 { TAU / width } else { 0.0 };
        let angle_scale_y = if height > 0.0 { PI / height } else { 0.0 };

        let position = camera.position();
        let to_target = self.target - position;
        let forward = if to_target.norm_squared() > DEGENERATE_EPSILON {
            to_target.normalize()
        } else {
            camera.view_dir()
        };

        let mut new_position = position;
        if input.keys.contains(CameraKeys::MOVE_FORWARD) {
            new_position += self.zoom_speed * dt * forward;
            let remaining = self.target - new_position;
            // Never reach or pass the pivot
            if remaining.norm_squared() < DEGENERATE_EPSILON || remaining.dot(&forward) <= 0.0 {
                new_position = position;
            }
        }
        if input.keys.contains(CameraKeys::MOVE_BACKWARD) {
            new_position -= self.zoom_speed * dt * forward;
        }

        if input.left_button {
            let delta_x = -input.mouse_delta[0] * angle_scale_x;
            let delta_y = -input.mouse_delta[1] * angle_scale_y;

            let yaw = Rotation3::from_axis_angle(&Unit::new_normalize(DEFAULT_UP), delta_x);
            new_position = yaw * (new_position - self.target) + self.target;

            let right = camera.right_dir();
            if right.norm_squared() > DEGENERATE_EPSILON {
                let pitch = Rotation3::from_axis_angle(&Unit::new_normalize(right), delta_y);
                new_position = pitch * (new_position - self.target) + self.target;
            }
        }

        camera.set_view_target(new_position, self.target, DEFAULT_UP);
    }
}

/// Free-look controller driven by cursor movement
#[derive(Debug, Clone, PartialEq)]
pub struct MouseController {
    /// Movement speed in units per second
    pub move_speed: f32,
    /// Look speed in radians per pixel-second
    pub look_speed: f32,
    yaw: f32,
    pitch: f32,
}

impl MouseController {
    /// Create with the given speeds, facing `+X`
    pub fn new(move_speed: f32, look_speed: f32) -> Self {
        Self {
            move_speed,
            look_speed,
            yaw: 0.0,
            pitch: 0.0,
        }
    }

    /// Current yaw and pitch in radians
    pub fn angles(&self) -> (f32, f32) {
        (self.yaw, self.pitch)
    }

    /// Apply one tick of input
    pub fn update(&mut self, camera: &mut Camera, input: &InputState, dt: f32) {
        self.yaw -= input.mouse_delta[0] * dt * self.look_speed;
        self.pitch += input.mouse_delta[1] * dt * self.look_speed;
        self.pitch = self.pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT);

        let direction = Vec3::new(
            self.yaw.cos() * self.pitch.cos(),
            self.pitch.sin(),
            self.yaw.sin() * self.pitch.cos(),
        );
        camera.set_view_direction(camera.position(), direction, DEFAULT_UP);

        let step = self.move_speed * dt;
        let mut position = camera.position();
        if input.keys.contains(CameraKeys::MOVE_FORWARD) {
            position += camera.view_dir() * step;
        }
        if input.keys.contains(CameraKeys::MOVE_BACKWARD) {
            position -= camera.view_dir() * step;
        }
        if input.keys.contains(CameraKeys::MOVE_LEFT) {
            position -= camera.right_dir() * step;
        }
        if input.keys.contains(CameraKeys::MOVE_RIGHT) {
            position += camera.right_dir() * step;
        }
        if input.keys.contains(CameraKeys::MOVE_UP) {
            position += camera.up_dir() * step;
        }
        if input.keys.contains(CameraKeys::MOVE_DOWN) {
            position -= camera.up_dir() * step;
        }

        camera.set_view_direction(position, direction, DEFAULT_UP);
    }
}

impl Default for MouseController {
    fn default() -> Self {
        Self::new(25.0, 1.0)
    }
}

/// Keyboard-only fly controller with YXZ Euler orientation
#[derive(Debug, Clone, PartialEq)]
pub struct KeyboardController {
    /// Movement speed in units per second
    pub move_speed: f32,
    /// Turn speed in radians per second
    pub look_speed: f32,
    /// Camera position
    pub translation: Vec3,
    /// Pitch, yaw and roll in radians
    pub rotation: Vec3,
}

impl KeyboardController {
    /// Create at `translation` looking along `+Z`
    pub fn new(translation: Vec3, move_speed: f32, look_speed: f32) -> Self {
        Self {
            move_speed,
            look_speed,
            translation,
            rotation: Vec3::zeros(),
        }
    }

    /// Apply one tick of input
    pub fn update(&mut self, camera: &mut Camera, input: &InputState, dt: f32) {
        let keys = input.keys;

        let mut rotate = Vec3::zeros();
        if keys.contains(CameraKeys::LOOK_RIGHT) {
            rotate.y += 1.0;
        }
        if keys.contains(CameraKeys::LOOK_LEFT) {
            rotate.y -= 1.0;
        }
        if keys.contains(CameraKeys::LOOK_UP) {
            rotate.x += 1.0;
        }
        if keys.contains(CameraKeys::LOOK_DOWN) {
            rotate.x -= 1.0;
        }
        if rotate.norm_squared() > DEGENERATE_EPSILON {
            self.rotation += self.look_speed * dt * rotate.normalize();
        }
        self.rotation.x = self.rotation.x.clamp(-PITCH_LIMIT, PITCH_LIMIT);
        self.rotation.y = self.rotation.y.rem_euclid(TAU);

        let yaw = self.rotation.y;
        let forward = Vec3::new(yaw.sin(), 0.0, yaw.cos());
        let right = Vec3::new(forward.z, 0.0, -forward.x);

        let mut move_dir = Vec3::zeros();
        if keys.contains(CameraKeys::MOVE_FORWARD) {
            move_dir += forward;
        }
        if keys.contains(CameraKeys::MOVE_BACKWARD) {
            move_dir -= forward;
        }
        if keys.contains(CameraKeys::MOVE_RIGHT) {
            move_dir += right;
        }
        if keys.contains(CameraKeys::MOVE_LEFT) {
            move_dir -= right;
        }
        if keys.contains(CameraKeys::MOVE_UP) {
            move_dir += DEFAULT_UP;
        }
        if keys.contains(CameraKeys::MOVE_DOWN) {
            move_dir -= DEFAULT_UP;
        }
        if move_dir.norm_squared() > DEGENERATE_EPSILON {
            self.translation += self.move_speed * dt * move_dir.normalize();
        }

        camera.set_view_yxz(self.translation, self.rotation);
    }
}

impl Default for KeyboardController {
    fn default() -> Self {
        Self::new(Vec3::zeros(), 3.5, 1.5)
    }
}

/// The active camera controller
#[derive(Debug, Clone, PartialEq)]
pub enum CameraController {
    /// Orbit a pivot
    Arcball(ArcballController),
    /// Keyboard fly camera
    Keyboard(KeyboardController),
    /// Mouse free-look
    Mouse(MouseController),
}

impl CameraController {
    /// Apply one tick of input to `camera`
    ///
    /// Non-finite or negative `dt` is ignored.
    pub fn update(&mut self, camera: &mut Camera, input: &InputState, dt: f32) {
        if !dt.is_finite() || dt < 0.0 {
            return;
        }
        match self {
            Self::Arcball(controller) => controller.update(camera, input, dt),
            Self::Keyboard(controller) => controller.update(camera, input, dt),
            Self::Mouse(controller) => controller.update(camera, input, dt),
        }
    }
}
