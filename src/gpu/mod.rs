//! wgpu executor and renderer.
//!
//! [`GpuContext`] owns the device and queue. [`ComputeGraph`] runs the two
//! simulation stages as compute passes over `Rgba32Float` storage textures,
//! and [`RenderState`] draws one point sprite per texel, looking positions up
//! from whatever texture the compute graph marks current.

mod camera;
mod compute;
mod render;

use std::sync::Arc;

use winit::window::Window;

pub use camera::Camera;
pub use compute::ComputeGraph;
pub use render::RenderState;

use crate::error::GpuError;

/// Texel format of every state texture.
pub const STATE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;

/// Compute workgroup edge; must match `@workgroup_size` in the stage shaders.
pub const WORKGROUP_SIZE: u32 = 8;

/// Device, queue and (when windowed) the presentation surface.
pub struct GpuContext {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    pub adapter: wgpu::Adapter,
    pub surface: Option<wgpu::Surface<'static>>,
}

impl GpuContext {
    /// Context bound to a window surface.
    pub async fn with_window(window: Arc<Window>) -> Result<Self, GpuError> {
        let instance = instance();
        let surface = instance.create_surface(window)?;
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;
        let (device, queue) = request_device(&adapter).await?;
        Ok(Self {
            device,
            queue,
            adapter,
            surface: Some(surface),
        })
    }

    /// Context without a surface, for compute-only use.
    pub async fn headless() -> Result<Self, GpuError> {
        let adapter = instance()
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;
        let (device, queue) = request_device(&adapter).await?;
        Ok(Self {
            device,
            queue,
            adapter,
            surface: None,
        })
    }
}

fn instance() -> wgpu::Instance {
    wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::PRIMARY,
        ..Default::default()
    })
}

async fn request_device(
    adapter: &wgpu::Adapter,
) -> Result<(Arc<wgpu::Device>, Arc<wgpu::Queue>), GpuError> {
    let info = adapter.get_info();
    tracing::info!(adapter = %info.name, backend = ?info.backend, "using adapter");
    let (device, queue) = adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: Some("Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        )
        .await?;
    Ok((Arc::new(device), Arc::new(queue)))
}
