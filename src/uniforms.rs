//! Uniform blocks shared between Rust and WGSL.
//!
//! Layouts must match the structs declared in `src/shaders/*.wgsl` byte for
//! byte; every block is padded to a multiple of 16 bytes.

use bytemuck::{Pod, Zeroable};
use glam::Mat4;

use crate::kernels::ForceParams;

/// Uniforms for the velocity stage.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct VelocityUniforms {
    pub time: f32,
    pub resolution: f32,
    pub stiffness: f32,
    pub damping: f32,
    pub max_speed: f32,
    pub jitter: f32,
    pub _padding: [f32; 2],
}

impl VelocityUniforms {
    pub fn new(time: f32, resolution: u32, params: &ForceParams) -> Self {
        Self {
            time,
            resolution: resolution as f32,
            stiffness: params.stiffness,
            damping: params.damping,
            max_speed: params.max_speed,
            jitter: params.jitter,
            _padding: [0.0; 2],
        }
    }
}

/// Uniforms for the position stage.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct PositionUniforms {
    pub time: f32,
    pub resolution: f32,
    pub _padding: [f32; 2],
}

impl PositionUniforms {
    pub fn new(time: f32, resolution: u32) -> Self {
        Self {
            time,
            resolution: resolution as f32,
            _padding: [0.0; 2],
        }
    }
}

/// Uniforms for the point-sprite render pass.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct RenderUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub time: f32,
    pub point_size: f32,
    pub resolution: f32,
    pub _padding: f32,
}

impl RenderUniforms {
    pub fn new(view_proj: Mat4, time: f32, point_size: f32, resolution: u32) -> Self {
        Self {
            view_proj: view_proj.to_cols_array_2d(),
            time,
            point_size,
            resolution: resolution as f32,
            _padding: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizes_are_16_byte_multiples() {
        assert_eq!(std::mem::size_of::<VelocityUniforms>(), 32);
        assert_eq!(std::mem::size_of::<PositionUniforms>(), 16);
        assert_eq!(std::mem::size_of::<RenderUniforms>(), 80);
    }

    #[test]
    fn test_velocity_uniforms_carry_force_params() {
        let params = ForceParams::default().with_damping(0.5);
        let u = VelocityUniforms::new(1.0, 64, &params);
        assert_eq!(u.resolution, 64.0);
        assert_eq!(u.damping, 0.5);
        assert_eq!(u.stiffness, params.stiffness);
    }
}
