use glam::{Mat4, Vec2, Vec3};

pub const DEFAULT_YAW: f32 = -90.0;
pub const DEFAULT_PITCH: f32 = 0.0;
pub const DEFAULT_SPEED: f32 = 2.5;
pub const DEFAULT_SENSITIVITY: f32 = 0.1;
pub const DEFAULT_ZOOM: f32 = 45.0;

const MAX_PITCH: f32 = 89.0;
const MIN_ZOOM: f32 = 1.0;
const MAX_ZOOM: f32 = 45.0;

/// What the player did since the last frame. Built by the frame driver out of
/// window events and the keyboard state.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InputState {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
    /// Relative mouse motion in pixels, y grows downwards.
    pub mouse_delta: Vec2,
    /// Wheel steps, positive away from the user.
    pub scroll: f32,
}

/// A free-flying camera, angles in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub front: Vec3,
    pub up: Vec3,
    pub right: Vec3,
    pub world_up: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub movement_speed: f32,
    pub mouse_sensitivity: f32,
    pub zoom: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Camera::new(Vec3::new(0.0, 0.0, 3.0), Vec3::Y, DEFAULT_YAW, DEFAULT_PITCH)
    }
}

impl Camera {
    pub fn new(position: Vec3, world_up: Vec3, yaw: f32, pitch: f32) -> Camera {
        Camera {
            position,
            front: Vec3::NEG_Z,
            up: world_up,
            right: Vec3::X,
            world_up,
            yaw,
            pitch,
            movement_speed: DEFAULT_SPEED,
            mouse_sensitivity: DEFAULT_SENSITIVITY,
            zoom: DEFAULT_ZOOM,
        }
        .with_updated_vectors()
    }

    /// Moves and turns the camera according to `input`, `dt` being the frame
    /// time in seconds.
    pub fn update(self, input: &InputState, dt: f32) -> Camera {
        let mut camera = self;

        let velocity = camera.movement_speed * dt;
        if input.forward {
            camera.position += camera.front * velocity;
        }
        if input.backward {
            camera.position -= camera.front * velocity;
        }
        if input.left {
            camera.position -= camera.right * velocity;
        }
        if input.right {
            camera.position += camera.right * velocity;
        }

        // Window y points down, pitch points up.
        let offset = input.mouse_delta * Vec2::new(1.0, -1.0) * camera.mouse_sensitivity;
        camera.yaw += offset.x;
        camera.pitch = (camera.pitch + offset.y).clamp(-MAX_PITCH, MAX_PITCH);

        camera.zoom = (camera.zoom - input.scroll).clamp(MIN_ZOOM, MAX_ZOOM);

        camera.with_updated_vectors()
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.front, self.up)
    }

    /// Perspective projection with the camera's zoom as the vertical field
    /// of view.
    pub fn projection_matrix(&self, aspect_ratio: f32, near: f32, far: f32) -> Mat4 {
        Mat4::perspective_rh_gl(self.zoom.to_radians(), aspect_ratio, near, far)
    }

    fn with_updated_vectors(mut self) -> Camera {
        let (yaw, pitch) = (self.yaw.to_radians(), self.pitch.to_radians());
        self.front = Vec3::new(yaw.cos() * pitch.cos(), pitch.sin(), yaw.sin() * pitch.cos()).normalize();
        self.right = self.front.cross(self.world_up).normalize();
        self.up = self.right.cross(self.front).normalize();
        self
    }
}
