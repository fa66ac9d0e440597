//! # Camera and Frame Context
//!
//! The camera, the input snapshot, and the clock are bundled into a
//! [`FrameContext`] that is passed by reference to every uniform producer.
//! Nothing here is global: the frame loop owns the context and rebuilds or
//! mutates it between frames.

use crate::foundation::math::{Mat4, Mat4Ext, Vec2, Vec3};

/// 3D perspective camera
///
/// Uses a right-handed Y-up view space. The conversion into Vulkan's Y-down
/// clip space is applied in [`Camera::view_projection_matrix`].
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    /// Camera position in world space
    pub position: Vec3,
    /// Point the camera is looking at in world space
    pub target: Vec3,
    /// Up vector for camera orientation
    pub up: Vec3,
    /// Vertical field of view in radians
    pub fov: f32,
    /// Aspect ratio (width / height)
    pub aspect: f32,
    /// Distance to near clipping plane
    pub near: f32,
    /// Distance to far clipping plane
    pub far: f32,
}

impl Camera {
    /// Create a perspective camera looking at the origin
    ///
    /// # Arguments
    /// * `position` - Camera position in world space
    /// * `fov_degrees` - Vertical field of view in degrees
    /// * `aspect` - Viewport width / height
    /// * `near` - Near plane distance (must be > 0)
    /// * `far` - Far plane distance (must be > near)
    pub fn perspective(position: Vec3, fov_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            position,
            target: Vec3::zeros(),
            up: Vec3::new(0.0, 1.0, 0.0),
            fov: fov_degrees.to_radians(),
            aspect,
            near,
            far,
        }
    }

    /// Point the camera at `target`
    pub fn look_at(&mut self, target: Vec3, up: Vec3) {
        self.target = target;
        self.up = up;
        log::trace!("Camera look_at updated - target: {:?}, up: {:?}", target, up);
    }

    /// Update the aspect ratio after a viewport change
    pub fn set_aspect_ratio(&mut self, aspect: f32) {
        if (self.aspect - aspect).abs() > 0.01 {
            log::debug!("Camera aspect ratio changed: {:.3} -> {:.3}", self.aspect, aspect);
        }
        self.aspect = aspect;
    }

    /// World-to-view matrix
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at(self.position, self.target, self.up)
    }

    /// Perspective projection matrix (view space to clip space)
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective(self.fov, self.aspect, self.near, self.far)
    }

    /// Projection matrix with the Vulkan axis flip folded in
    ///
    /// Pair with [`Camera::view_matrix`] when a shader wants view and
    /// projection as separate uniforms.
    pub fn vulkan_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * Mat4::vulkan_coordinate_transform()
    }

    /// Combined `P × X × V` matrix
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.vulkan_projection_matrix() * self.view_matrix()
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::perspective(Vec3::new(0.0, 0.0, 5.0), 60.0, 16.0 / 9.0, 0.1, 100.0)
    }
}

/// Snapshot of pointer and key state for one frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputState {
    /// Cursor position in window pixels
    pub cursor_position: Vec2,
    /// Bitmask of pressed mouse buttons (bit N = button N)
    pub mouse_buttons: u32,
    /// Names of keys currently held
    pub keys_down: Vec<String>,
}

impl InputState {
    /// Whether mouse button `button` is held
    pub fn is_button_down(&self, button: u32) -> bool {
        button < 32 && self.mouse_buttons & (1 << button) != 0
    }

    /// Whether the named key is held
    pub fn is_key_down(&self, key: &str) -> bool {
        self.keys_down.iter().any(|k| k == key)
    }
}

/// Per-frame state handed to uniform producers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameContext {
    /// Active camera
    pub camera: Camera,
    /// Input snapshot
    pub input: InputState,
    /// Seconds since the application started
    pub time: f32,
    /// Seconds since the previous frame
    pub delta_time: f32,
}

impl FrameContext {
    /// Create a context for the given camera at time zero
    pub fn new(camera: Camera) -> Self {
        Self {
            camera,
            ..Default::default()
        }
    }

    /// Advance the clock by `delta_time` seconds
    pub fn advance(&mut self, delta_time: f32) {
        self.delta_time = delta_time;
        self.time += delta_time;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec4;
    use approx::assert_relative_eq;

    #[test]
    fn test_view_matrix_moves_camera_to_origin() {
        let camera = Camera::perspective(Vec3::new(0.0, 0.0, 5.0), 60.0, 1.0, 0.1, 100.0);
        let eye = camera.view_matrix() * Vec4::new(0.0, 0.0, 5.0, 1.0);
        assert_relative_eq!(eye, Vec4::new(0.0, 0.0, 0.0, 1.0), epsilon = 1e-5);
    }

    #[test]
    fn test_target_projects_to_screen_center() {
        let camera = Camera::perspective(Vec3::new(3.0, 2.0, 5.0), 75.0, 16.0 / 9.0, 0.1, 100.0);
        let clip = camera.view_projection_matrix() * Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert!(clip.w > 0.0);
        assert_relative_eq!(clip.x / clip.w, 0.0, epsilon = 1e-5);
        assert_relative_eq!(clip.y / clip.w, 0.0, epsilon = 1e-5);
        let depth = clip.z / clip.w;
        assert!((0.0..=1.0).contains(&depth));
    }

    #[test]
    fn test_world_up_is_negative_y_in_clip_space() {
        let camera = Camera::perspective(Vec3::new(0.0, 0.0, 5.0), 60.0, 1.0, 0.1, 100.0);
        let clip = camera.view_projection_matrix() * Vec4::new(0.0, 1.0, 0.0, 1.0);
        assert!(clip.y / clip.w < 0.0);
    }

    #[test]
    fn test_frame_context_advance() {
        let mut frame = FrameContext::default();
        frame.advance(0.5);
        frame.advance(0.25);
        assert_relative_eq!(frame.time, 0.75);
        assert_relative_eq!(frame.delta_time, 0.25);
    }

    #[test]
    fn test_input_state_queries() {
        let input = InputState {
            mouse_buttons: 0b101,
            keys_down: vec!["Space".to_string()],
            ..Default::default()
        };
        assert!(input.is_button_down(0));
        assert!(!input.is_button_down(1));
        assert!(input.is_button_down(2));
        assert!(!input.is_button_down(40));
        assert!(input.is_key_down("Space"));
        assert!(!input.is_key_down("Escape"));
    }
}
