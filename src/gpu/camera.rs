//! Fixed perspective camera looking down -Z at the particle plane.

use glam::{Mat4, Vec3};

/// Static camera. The particle plane sits at `z = 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    /// Vertical field of view in degrees.
    pub fov_y: f32,
    /// Eye position.
    pub eye: Vec3,
    /// Point the camera looks at.
    pub target: Vec3,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    pub fn new() -> Self {
        Self {
            fov_y: 30.0,
            eye: Vec3::new(0.0, 0.0, 4.0),
            target: Vec3::ZERO,
            near: 0.01,
            far: 10.0,
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, Vec3::Y)
    }

    pub fn projection(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov_y.to_radians(), aspect.max(1e-3), self.near, self.far)
    }

    pub fn view_proj(&self, aspect: f32) -> Mat4 {
        self.projection(aspect) * self.view_matrix()
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    #[test]
    fn test_origin_projects_to_center() {
        let clip = Camera::new().view_proj(1.0) * Vec4::new(0.0, 0.0, 0.0, 1.0);
        let ndc = clip / clip.w;
        assert!(ndc.x.abs() < 1e-6 && ndc.y.abs() < 1e-6);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }

    #[test]
    fn test_unit_plane_is_visible() {
        // fov 30° at distance 4 shows roughly ±1.07 vertically
        let camera = Camera::new();
        for corner in [Vec4::new(1.0, 1.0, 0.0, 1.0), Vec4::new(-1.0, -1.0, 0.0, 1.0)] {
            let clip = camera.view_proj(1.0) * corner;
            let ndc = clip / clip.w;
            assert!(ndc.x.abs() < 1.0 && ndc.y.abs() < 1.0);
        }
    }
}
