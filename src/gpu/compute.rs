//! GPU executor for the feedback graph.
//!
//! Mirrors [`FeedbackGraph`](crate::graph::FeedbackGraph): the same
//! [`SimulationVariable`] bookkeeping picks read and write textures, but the
//! stages run as compute passes. Bind groups are built once for every
//! (parity, target) combination so a step or a target switch never allocates.

use std::sync::{mpsc, Arc};

use wgpu::util::DeviceExt;

use super::{GpuContext, STATE_FORMAT, WORKGROUP_SIZE};
use crate::encoding::{StateTexture, TextureKind};
use crate::error::GpuError;
use crate::graph::{GraphSeed, SimulationVariable, TextureId, VariableKind};
use crate::kernels::ForceParams;
use crate::scheduler::Stepper;
use crate::shader;
use crate::target::{Target, TargetSelector};
use crate::uniforms::{PositionUniforms, VelocityUniforms};

const TEXEL_BYTES: u32 = 16;

/// wgpu-backed two-stage simulation.
pub struct ComputeGraph {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    size: u32,
    textures: Vec<wgpu::Texture>,
    views: Vec<wgpu::TextureView>,
    targets: [TextureId; 2],
    velocity: SimulationVariable,
    position: SimulationVariable,
    selector: TargetSelector,
    params: ForceParams,
    velocity_pipeline: wgpu::ComputePipeline,
    position_pipeline: wgpu::ComputePipeline,
    velocity_uniforms: wgpu::Buffer,
    position_uniforms: wgpu::Buffer,
    /// Indexed by `[parity][target]`.
    velocity_bind_groups: [[wgpu::BindGroup; 2]; 2],
    /// Indexed by position parity.
    position_bind_groups: [wgpu::BindGroup; 2],
    frame: u64,
}

impl ComputeGraph {
    /// Upload the seed textures and build both stage pipelines.
    ///
    /// Shader sources are validated with naga first; a failure is returned
    /// as [`GpuError::Shader`].
    pub fn new(ctx: &GpuContext, seed: &GraphSeed, params: ForceParams) -> Result<Self, GpuError> {
        let device = Arc::clone(&ctx.device);
        let queue = Arc::clone(&ctx.queue);
        seed.check()?;
        let size = seed.size();

        let velocity_src = shader::stage_source(VariableKind::Velocity);
        let position_src = shader::stage_source(VariableKind::Position);
        shader::validate(&velocity_src, VariableKind::Velocity.name())?;
        shader::validate(&position_src, VariableKind::Position.name())?;

        // Same arena layout as the CPU executor
        let initial = [
            &seed.targets[0],
            &seed.targets[1],
            &seed.position,
            &seed.position,
            &seed.velocity,
            &seed.velocity,
        ];
        let labels = [
            "Target A",
            "Target B",
            "Position 0",
            "Position 1",
            "Velocity 0",
            "Velocity 1",
        ];
        let textures: Vec<wgpu::Texture> = initial
            .iter()
            .zip(labels)
            .map(|(state, label)| create_state_texture(&device, &queue, state, label))
            .collect();
        let views: Vec<wgpu::TextureView> = textures
            .iter()
            .map(|t| t.create_view(&wgpu::TextureViewDescriptor::default()))
            .collect();

        let targets = [TextureId(0), TextureId(1)];
        let position = SimulationVariable::new(VariableKind::Position, [TextureId(2), TextureId(3)]);
        let velocity = SimulationVariable::new(VariableKind::Velocity, [TextureId(4), TextureId(5)]);

        let velocity_uniforms = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Velocity Uniform Buffer"),
            contents: bytemuck::bytes_of(&VelocityUniforms::new(
                velocity.clock().time(),
                size,
                &params,
            )),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let position_uniforms = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Position Uniform Buffer"),
            contents: bytemuck::bytes_of(&PositionUniforms::new(position.clock().time(), size)),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        // velocity: uniforms, position, velocity, target, out
        let velocity_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Velocity Bind Group Layout"),
            entries: &[
                uniform_entry(0),
                texture_entry(1),
                texture_entry(2),
                texture_entry(3),
                storage_entry(4),
            ],
        });
        // position: uniforms, position, velocity, out
        let position_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Position Bind Group Layout"),
            entries: &[
                uniform_entry(0),
                texture_entry(1),
                texture_entry(2),
                storage_entry(3),
            ],
        });

        let velocity_pipeline =
            create_stage_pipeline(&device, &velocity_layout, &velocity_src, "Velocity");
        let position_pipeline =
            create_stage_pipeline(&device, &position_layout, &position_src, "Position");

        let velocity_bind_group = |parity: usize, target: TextureId| {
            let pos = position.buffer(parity);
            let vel = velocity.buffer(parity);
            let out = velocity.buffer(1 - parity);
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Velocity Bind Group"),
                layout: &velocity_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: velocity_uniforms.as_entire_binding(),
                    },
                    view_entry(1, &views[pos.0]),
                    view_entry(2, &views[vel.0]),
                    view_entry(3, &views[target.0]),
                    view_entry(4, &views[out.0]),
                ],
            })
        };
        let velocity_bind_groups = [0, 1].map(|parity| targets.map(|t| velocity_bind_group(parity, t)));

        // Position at parity p reads the velocity written in the same step, which sits at 1 - p
        let position_bind_groups = [0, 1].map(|parity| {
            let pos = position.buffer(parity);
            let vel = velocity.buffer(1 - parity);
            let out = position.buffer(1 - parity);
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Position Bind Group"),
                layout: &position_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: position_uniforms.as_entire_binding(),
                    },
                    view_entry(1, &views[pos.0]),
                    view_entry(2, &views[vel.0]),
                    view_entry(3, &views[out.0]),
                ],
            })
        });

        tracing::info!(size, particles = size * size, "compute graph ready");

        Ok(Self {
            device,
            queue,
            size,
            textures,
            views,
            targets,
            velocity,
            position,
            selector: TargetSelector::new(),
            params,
            velocity_pipeline,
            position_pipeline,
            velocity_uniforms,
            position_uniforms,
            velocity_bind_groups,
            position_bind_groups,
            frame: 0,
        })
    }

    /// Record one frame's stages into `encoder`.
    ///
    /// Uniforms are written to the queue immediately, so submit the encoder
    /// before encoding another frame.
    pub fn encode(&mut self, encoder: &mut wgpu::CommandEncoder) {
        let workgroups = self.size.div_ceil(WORKGROUP_SIZE);
        let parity = self.position.parity();
        debug_assert_eq!(parity, self.velocity.parity());

        let time = self.velocity.tick();
        let uniforms = VelocityUniforms::new(time, self.size, &self.params);
        self.queue
            .write_buffer(&self.velocity_uniforms, 0, bytemuck::bytes_of(&uniforms));
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Velocity Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.velocity_pipeline);
            pass.set_bind_group(0, &self.velocity_bind_groups[parity][self.selected().index()], &[]);
            pass.dispatch_workgroups(workgroups, workgroups, 1);
        }
        self.velocity.flip();

        let time = self.position.tick();
        let uniforms = PositionUniforms::new(time, self.size);
        self.queue
            .write_buffer(&self.position_uniforms, 0, bytemuck::bytes_of(&uniforms));
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Position Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.position_pipeline);
            pass.set_bind_group(0, &self.position_bind_groups[parity], &[]);
            pass.dispatch_workgroups(workgroups, workgroups, 1);
        }
        self.position.flip();

        self.frame += 1;
    }

    /// Flip the selected target. Takes effect on the next encoded frame.
    pub fn trigger(&mut self) -> Target {
        self.selector.trigger()
    }

    #[inline]
    pub fn selected(&self) -> Target {
        self.selector.current()
    }

    /// Texture the velocity stage will read as its target.
    #[inline]
    pub fn bound_target(&self) -> TextureId {
        self.targets[self.selected().index()]
    }

    #[inline]
    pub fn target_texture(&self, target: Target) -> TextureId {
        self.targets[target.index()]
    }

    #[inline]
    pub fn size(&self) -> u32 {
        self.size
    }

    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Handle of the latest position texture. Changes every step.
    #[inline]
    pub fn current_position_id(&self) -> TextureId {
        self.position.current()
    }

    #[inline]
    pub fn current_velocity_id(&self) -> TextureId {
        self.velocity.current()
    }

    /// View of the latest position texture, for this frame only.
    #[inline]
    pub fn current_position_view(&self) -> &wgpu::TextureView {
        &self.views[self.position.current().0]
    }

    #[inline]
    pub fn view(&self, id: TextureId) -> &wgpu::TextureView {
        &self.views[id.0]
    }

    /// Copy a texture back to the host. Blocks until the GPU is idle.
    pub fn read_texture(&self, id: TextureId, kind: TextureKind) -> Result<StateTexture, GpuError> {
        let unpadded = self.size * TEXEL_BYTES;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded = unpadded.div_ceil(align) * align;

        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("State Readback Buffer"),
            size: (padded * self.size) as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback Encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.textures[id.0],
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(self.size),
                },
            },
            extent(self.size),
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|e| GpuError::BufferMapping(e.to_string()))?
            .map_err(|e| GpuError::BufferMapping(e.to_string()))?;

        let bytes = {
            let data = slice.get_mapped_range();
            let mut bytes = Vec::with_capacity((unpadded * self.size) as usize);
            for row in data.chunks(padded as usize) {
                bytes.extend_from_slice(&row[..unpadded as usize]);
            }
            bytes
        };
        staging.unmap();

        StateTexture::from_bytes(kind, self.size, &bytes)
            .ok_or_else(|| GpuError::BufferMapping("readback size mismatch".into()))
    }

    /// Read the latest particle positions.
    pub fn read_positions(&self) -> Result<StateTexture, GpuError> {
        self.read_texture(self.position.current(), TextureKind::Position)
    }
}

impl Stepper for ComputeGraph {
    fn step(&mut self) {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Compute Encoder"),
            });
        self.encode(&mut encoder);
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    fn trigger(&mut self) -> Target {
        ComputeGraph::trigger(self)
    }

    fn frame(&self) -> u64 {
        self.frame
    }
}

fn extent(size: u32) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: size,
        height: size,
        depth_or_array_layers: 1,
    }
}

fn create_state_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    state: &StateTexture,
    label: &str,
) -> wgpu::Texture {
    let size = state.size();
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: extent(size),
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: STATE_FORMAT,
        usage: wgpu::TextureUsages::STORAGE_BINDING
            | wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_DST
            | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        state.as_bytes(),
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(size * TEXEL_BYTES),
            rows_per_image: Some(size),
        },
        extent(size),
    );
    texture
}

fn create_stage_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    source: &str,
    name: &str,
) -> wgpu::ComputePipeline {
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(&format!("{name} Shader")),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(&format!("{name} Pipeline Layout")),
        bind_group_layouts: &[layout],
        push_constant_ranges: &[],
    });
    device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(&format!("{name} Pipeline")),
        layout: Some(&pipeline_layout),
        module: &module,
        entry_point: Some("main"),
        compilation_options: Default::default(),
        cache: None,
    })
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: false },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn storage_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::StorageTexture {
            access: wgpu::StorageTextureAccess::WriteOnly,
            format: STATE_FORMAT,
            view_dimension: wgpu::TextureViewDimension::D2,
        },
        count: None,
    }
}

fn view_entry(binding: u32, view: &wgpu::TextureView) -> wgpu::BindGroupEntry<'_> {
    wgpu::BindGroupEntry {
        binding,
        resource: wgpu::BindingResource::TextureView(view),
    }
}
