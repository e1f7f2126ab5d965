// Fixed perspective camera for the hero scene
//
// Camera model:
//   - Eye on the +Z axis looking at the origin, Y up
//   - The scene itself rotates (group rotation), the camera never moves
//   - Only the aspect ratio changes, on window resize

use glam::{Mat4, Vec3};

pub struct SceneCamera {
    pub eye: Vec3,
    pub target: Vec3,

    /// Vertical field of view in radians
    pub fov: f32,
    pub near: f32,
    pub far: f32,
}

impl SceneCamera {
    pub fn new() -> Self {
        Self {
            eye: Vec3::new(0.0, 0.0, 6.0),
            target: Vec3::ZERO,
            fov: 50.0_f32.to_radians(),
            near: 0.1,
            far: 1000.0,
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, Vec3::Y)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov, aspect, self.near, self.far)
    }

    /// Combined view-projection matrix ready to upload to the GPU.
    pub fn view_projection(&self, aspect: f32) -> Mat4 {
        self.projection_matrix(aspect) * self.view_matrix()
    }
}
