//! Point-sprite renderer.
//!
//! The instance buffer is written once and never changes: each instance
//! carries its texel lookup coordinate and some scatter metadata. The vertex
//! shader fetches the real position from the compute graph's current
//! position texture, so nothing is ever read back to the host.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use rand::Rng;
use wgpu::util::DeviceExt;

use super::{Camera, ComputeGraph, GpuContext};
use crate::error::GpuError;
use crate::shader::{self, PARTICLES_WGSL};
use crate::uniforms::RenderUniforms;

/// Background colour, `#EEEEEE`.
pub const CLEAR_SRGB: f32 = 0xEE as f32 / 255.0;

/// Half extent of the scatter metadata.
const SCATTER_EXTENT: f32 = 2.5;

/// Static per-instance vertex data.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ParticleInstance {
    /// Texel lookup coordinate in `[0, 1)²`.
    pub reference: [f32; 2],
    /// Random metadata in `±2.5`, `z = 0`.
    pub scatter: [f32; 3],
}

/// One instance per texel of a `size × size` state texture.
pub fn particle_instances<R: Rng>(size: u32, rng: &mut R) -> Vec<ParticleInstance> {
    (0..size * size)
        .map(|i| ParticleInstance {
            reference: [(i % size) as f32 / size as f32, (i / size) as f32 / size as f32],
            scatter: [
                rng.gen_range(-SCATTER_EXTENT..SCATTER_EXTENT),
                rng.gen_range(-SCATTER_EXTENT..SCATTER_EXTENT),
                0.0,
            ],
        })
        .collect()
}

fn srgb_to_linear(c: f32) -> f64 {
    let c = c as f64;
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

pub struct RenderState {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    surface: wgpu::Surface<'static>,
    pub config: wgpu::SurfaceConfiguration,
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    instance_buffer: wgpu::Buffer,
    uniform_buffer: wgpu::Buffer,
    instance_count: u32,
    resolution: u32,
    point_size: f32,
    clear: wgpu::Color,
    pub camera: Camera,
}

impl RenderState {
    /// Takes the surface out of `ctx` and builds the render pipeline.
    pub fn new<R: Rng>(
        ctx: &mut GpuContext,
        width: u32,
        height: u32,
        resolution: u32,
        point_size: f32,
        rng: &mut R,
    ) -> Result<Self, GpuError> {
        shader::validate(PARTICLES_WGSL, "render")?;
        let surface = ctx.surface.take().ok_or(GpuError::NoSurface)?;
        let device = Arc::clone(&ctx.device);
        let queue = Arc::clone(&ctx.queue);

        let surface_caps = surface.get_capabilities(&ctx.adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or(GpuError::NoSurface)?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let instances = particle_instances(resolution, rng);
        let instance_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Particle Instance Buffer"),
            contents: bytemuck::cast_slice(&instances),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let camera = Camera::new();
        let uniforms = RenderUniforms::new(
            camera.view_proj(width as f32 / height.max(1) as f32),
            0.0,
            point_size,
            resolution,
        );
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Render Uniform Buffer"),
            contents: bytemuck::bytes_of(&uniforms),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Render Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
            ],
        });

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Render Shader"),
            source: wgpu::ShaderSource::Wgsl(PARTICLES_WGSL.into()),
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Render Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Render Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &module,
                entry_point: Some("vs_main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<ParticleInstance>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Instance,
                    attributes: &wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x3],
                }],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &module,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let grey = if surface_format.is_srgb() {
            srgb_to_linear(CLEAR_SRGB)
        } else {
            CLEAR_SRGB as f64
        };

        Ok(Self {
            device,
            queue,
            surface,
            config,
            pipeline,
            bind_group_layout,
            instance_buffer,
            uniform_buffer,
            instance_count: resolution * resolution,
            resolution,
            point_size,
            clear: wgpu::Color {
                r: grey,
                g: grey,
                b: grey,
                a: 1.0,
            },
            camera,
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.config.width = width;
            self.config.height = height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    /// Reconfigure with the current size, after the surface was lost.
    pub fn reconfigure(&mut self) {
        self.surface.configure(&self.device, &self.config);
    }

    fn aspect(&self) -> f32 {
        self.config.width as f32 / self.config.height.max(1) as f32
    }

    /// Draw the particles at the compute graph's current positions.
    ///
    /// The position view is fetched fresh on every call; submit the frame's
    /// compute step first so the draw reads its output.
    pub fn draw(&mut self, compute: &ComputeGraph, time: f32) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        let uniforms = RenderUniforms::new(
            self.camera.view_proj(self.aspect()),
            time,
            self.point_size,
            self.resolution,
        );
        self.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Render Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(compute.current_position_view()),
                },
            ],
        });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            render_pass.set_pipeline(&self.pipeline);
            render_pass.set_bind_group(0, &bind_group, &[]);
            render_pass.set_vertex_buffer(0, self.instance_buffer.slice(..));
            render_pass.draw(0..6, 0..self.instance_count);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn test_instance_layout() {
        assert_eq!(std::mem::size_of::<ParticleInstance>(), 20);
    }

    #[test]
    fn test_instances_match_texel_order() {
        let mut rng = SmallRng::seed_from_u64(9);
        let instances = particle_instances(4, &mut rng);
        assert_eq!(instances.len(), 16);
        assert_eq!(instances[0].reference, [0.0, 0.0]);
        assert_eq!(instances[6].reference, [0.5, 0.25]);
        for inst in &instances {
            assert!(inst.scatter[0].abs() <= SCATTER_EXTENT);
            assert!(inst.scatter[1].abs() <= SCATTER_EXTENT);
            assert_eq!(inst.scatter[2], 0.0);
        }
    }

    #[test]
    fn test_clear_colour_is_light_grey() {
        let linear = srgb_to_linear(CLEAR_SRGB);
        assert!(linear > 0.8 && linear < 0.9);
    }
}
