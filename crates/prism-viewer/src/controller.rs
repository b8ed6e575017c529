//! Mouse-look and fly navigation.
//!
//! Dragging with the left button turns the camera: horizontal motion changes yaw,
//! vertical motion changes pitch. Angular speed is proportional to the field of view,
//! so the scene slides under the cursor at about the same rate at any zoom level.
//!
//! W/A/S/D move along the camera's view axes, PageUp/PageDown along its up axis.

use glam::{EulerRot, Quat, Vec3};

use prism_engine::camera::{Camera, Projection};
use prism_engine::input::{InputFrame, InputState, Key, MouseButton};

pub const PITCH_LIMIT_DEGREES: f32 = 89.9;

/// What the window should do after an update.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct ControllerUpdate {
    /// New cursor visibility, when it changes.
    pub cursor_visible: Option<bool>,

    /// Navigation keys are held; keep drawing frames.
    pub moving: bool,
}

#[derive(Debug, Clone)]
pub struct CameraController {
    look_speed: f32,
    linear_speed: f32,

    // Degrees.
    yaw: f32,
    pitch: f32,
    roll: f32,

    dragging: bool,
}

impl CameraController {
    pub fn new(look_speed: f32, linear_speed: f32) -> Self {
        Self {
            look_speed,
            linear_speed,
            yaw: 0.0,
            pitch: 0.0,
            roll: 0.0,
            dragging: false,
        }
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    /// Applies one frame of input to `camera`.
    pub fn update(
        &mut self,
        camera: &mut Camera,
        input: &InputState,
        frame: &InputFrame,
        dt: f32,
    ) -> ControllerUpdate {
        let mut update = ControllerUpdate::default();

        if frame.focus_changed && self.dragging {
            self.dragging = false;
            update.cursor_visible = Some(true);
        }

        if frame.buttons_pressed.contains(&MouseButton::Left) && !self.dragging {
            self.dragging = true;
            update.cursor_visible = Some(false);
        }
        if frame.buttons_released.contains(&MouseButton::Left) && self.dragging {
            self.dragging = false;
            update.cursor_visible = Some(true);
        }

        let (dx, dy) = frame.pointer_delta;
        if input.button_down(MouseButton::Left) && (dx != 0.0 || dy != 0.0) {
            self.look(camera, dx, dy);
        }

        let direction = fly_direction(input);
        if direction != Vec3::ZERO {
            update.moving = true;
            self.fly(camera, direction, dt);
        }

        update
    }

    /// Turns by a pointer motion of `(dx, dy)` pixels.
    ///
    /// Returns `false` if the resulting rotation is not a number; the camera keeps its
    /// previous rotation in that case.
    pub fn look(&mut self, camera: &mut Camera, dx: f32, dy: f32) -> bool {
        let lens = camera.lens();
        let fov = lens
            .fov_y_degrees()
            .unwrap_or(Projection::DEFAULT_FOV_Y_DEGREES);
        let aspect = match lens.projection {
            Projection::Perspective { aspect, .. } => aspect,
            _ => Projection::DEFAULT_ASPECT,
        };
        let angular_speed = fov * self.look_speed;

        let yaw = wrap_degrees(self.yaw + dx * angular_speed * aspect);
        let pitch = (self.pitch - dy * angular_speed).clamp(-PITCH_LIMIT_DEGREES, PITCH_LIMIT_DEGREES);

        let rotation = Quat::from_euler(
            EulerRot::YXZ,
            yaw.to_radians(),
            pitch.to_radians(),
            self.roll.to_radians(),
        );
        if rotation.length_squared().is_nan() {
            log::warn!("rotation versor contains NaN; keeping previous rotation");
            return false;
        }
        self.yaw = yaw;
        self.pitch = pitch;
        camera.set_rotation(rotation)
    }

    /// Moves the eye along `direction` (camera-local axes) for `dt` seconds.
    fn fly(&self, camera: &mut Camera, direction: Vec3, dt: f32) {
        // The camera rotation maps world to view; its inverse maps view axes to world.
        let world = camera.rotation().inverse() * direction.normalize();
        let step = world * self.linear_speed * dt;
        // `position` is the translation applied to the world, i.e. the negated eye.
        camera.set_position(camera.position() - step);
    }
}

fn fly_direction(input: &InputState) -> Vec3 {
    let axis = |plus: Key, minus: Key| {
        f32::from(u8::from(input.key_down(plus))) - f32::from(u8::from(input.key_down(minus)))
    };
    Vec3::new(
        axis(Key::D, Key::A),
        axis(Key::PageUp, Key::PageDown),
        axis(Key::S, Key::W),
    )
}

/// Wraps an angle into [-180, 180] degrees.
fn wrap_degrees(angle: f32) -> f32 {
    (angle + 180.0).rem_euclid(360.0) - 180.0
}
