use glam::{Mat4, Quat, Vec2, Vec3};

/// Orthographic 2D camera looking down the z axis.
///
/// `window_size` is the extent of world space visible on screen. Changing
/// the aspect ratio keeps the height and stretches the width.
#[derive(Debug, Clone)]
pub struct OrthoCamera {
    pub position: Vec3,
    pub rotation: f32,
    pub window_size: Vec2,
    pub aspect: f32,
    view_proj: Mat4,
    view_proj_inverse: Mat4,
}

impl Default for OrthoCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl OrthoCamera {
    pub fn new() -> Self {
        let mut camera = Self {
            position: Vec3::ZERO,
            rotation: 0.0,
            window_size: Vec2::new(20.0, 20.0),
            aspect: 1.0,
            view_proj: Mat4::IDENTITY,
            view_proj_inverse: Mat4::IDENTITY,
        };
        camera.update();
        camera
    }

    pub fn set_aspect_ratio(&mut self, aspect: f32) {
        self.aspect = aspect;
        self.window_size.x = self.window_size.y * aspect;
        self.update();
    }

    /// Recompute the matrices from position, rotation and window size.
    pub fn update(&mut self) {
        let camera_to_world = Mat4::from_scale_rotation_translation(
            (self.window_size * 0.5).extend(1.0),
            Quat::from_rotation_z(self.rotation),
            Vec3::new(self.position.x, self.position.y, 0.0),
        );
        self.view_proj_inverse = camera_to_world;
        self.view_proj = camera_to_world.inverse();
    }

    pub fn view_proj(&self) -> Mat4 {
        self.view_proj
    }

    /// Maps clip space back to world space; the background shader uses it
    /// to scroll its texture with the camera.
    pub fn view_proj_inverse(&self) -> Mat4 {
        self.view_proj_inverse
    }
}
