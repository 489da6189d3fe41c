//! GPU executor for frame plans plus the visible point cloud.
//!
//! `SimulationScheduler` owns the texture arena (two position targets and the
//! direction target) and replays a `FramePlan` as a sequence of off-screen
//! render passes. Each pass rasterizes one point per slot in its range, so the
//! draw range alone decides which texels are overwritten; everything else is
//! preserved by loading the attachment.

use crate::sim_params::SimParams;
use crate::simulation::{Attachment, FramePlan};
use crate::state_texture::StateTexture;
use cgmath::{Deg, Matrix4, Point3, Vector3};
use log::{debug, error};
use std::borrow::Cow;
use wgpu::util::DeviceExt;

pub const STATE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;

// One set of pass uniforms per 256-byte slot in a single buffer, addressed
// with dynamic offsets.
const UNIFORM_STRIDE: wgpu::BufferAddress = 256;
const MAX_PASSES_PER_FRAME: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("adapter cannot use {0:?} as a render attachment")]
    UnsupportedStateFormat(wgpu::TextureFormat),
    #[error("seed texture is {seed}x{seed} but the configuration wants {configured}x{configured}")]
    SeedSizeMismatch { seed: u32, configured: u32 },
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct SimUniforms {
    source: [f32; 3],
    time: f32,
    render_mode: u32,
    read_state: u32,
    grid_size: u32,
    progress: f32,
}

struct StateTarget {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

fn make_state_target(device: &wgpu::Device, size: u32, label: &str) -> StateTarget {
    // wgpu zero-initializes texture memory, so untouched slots read as the
    // origin until a full-range pass writes them.
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: size,
            height: size,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: STATE_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    StateTarget {
        _texture: texture,
        view,
    }
}

fn state_texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    // Rgba32Float is not filterable without an optional feature; all reads go
    // through textureLoad, no samplers involved.
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: false },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

pub struct SimulationScheduler {
    grid_size: u32,
    targets: [StateTarget; 2],
    directions: StateTarget,
    active: usize,
    uniform_buffer: wgpu::Buffer,
    direction_pipeline: wgpu::RenderPipeline,
    position_pipeline: wgpu::RenderPipeline,
    // Indexed by the active position target the pass reads from.
    integrate_bind_groups: [wgpu::BindGroup; 2],
    // Init-only: reads the uploaded shape seed instead of a position target,
    // which keeps the attachment out of its own bind group.
    seed_bind_group: wgpu::BindGroup,
    direction_bind_group: wgpu::BindGroup,
}

impl SimulationScheduler {
    pub fn new(
        adapter: &wgpu::Adapter,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        seed: &StateTexture,
        params: &SimParams,
    ) -> Result<Self, SimulationError> {
        let format_features = adapter.get_texture_format_features(STATE_FORMAT);
        if !format_features
            .allowed_usages
            .contains(wgpu::TextureUsages::RENDER_ATTACHMENT)
        {
            return Err(SimulationError::UnsupportedStateFormat(STATE_FORMAT));
        }
        if seed.size() != params.particle_grid_size {
            return Err(SimulationError::SeedSizeMismatch {
                seed: seed.size(),
                configured: params.particle_grid_size,
            });
        }
        let grid_size = seed.size();
        debug!(
            "Simulation arena: {0}x{0} ({1} slots)",
            grid_size,
            grid_size * grid_size
        );

        let targets = [
            make_state_target(device, grid_size, "Position target 0"),
            make_state_target(device, grid_size, "Position target 1"),
        ];
        let directions = make_state_target(device, grid_size, "Direction target");
        let seed_texture = seed.create_device_texture(device, queue, "Shape seed");
        let seed_view = seed_texture.create_view(&wgpu::TextureViewDescriptor::default());

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Simulation pass uniforms"),
            size: UNIFORM_STRIDE * MAX_PASSES_PER_FRAME as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Simulation bind group layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: true,
                        min_binding_size: wgpu::BufferSize::new(
                            std::mem::size_of::<SimUniforms>() as u64
                        ),
                    },
                    count: None,
                },
                state_texture_entry(1),
                state_texture_entry(2),
            ],
        });

        let uniform_binding = wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer: &uniform_buffer,
                offset: 0,
                size: wgpu::BufferSize::new(std::mem::size_of::<SimUniforms>() as u64),
            }),
        };
        let make_bind_group = |prev: &wgpu::TextureView, dirs: &wgpu::TextureView, label| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: &bind_group_layout,
                entries: &[
                    uniform_binding.clone(),
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(prev),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::TextureView(dirs),
                    },
                ],
            })
        };
        let integrate_bind_groups = [
            make_bind_group(&targets[0].view, &directions.view, "Integrate from 0"),
            make_bind_group(&targets[1].view, &directions.view, "Integrate from 1"),
        ];
        let seed_bind_group = make_bind_group(&seed_view, &directions.view, "Position seeding");
        // Direction passes never read positions and must not bind their own
        // attachment, so both inputs point at the seed upload.
        let direction_bind_group = make_bind_group(&seed_view, &seed_view, "Direction seeding");

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Simulation kernels"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(crate::include_shader!(
                "simulate.wgsl"
            ))),
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Simulation pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });
        let make_pipeline = |entry_point: &str, label: &str| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: "vs_main",
                    compilation_options: Default::default(),
                    buffers: &[],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point,
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: STATE_FORMAT,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::PointList,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
            })
        };
        let direction_pipeline = make_pipeline("fs_direction", "Direction pipeline");
        let position_pipeline = make_pipeline("fs_position", "Position pipeline");

        Ok(SimulationScheduler {
            grid_size,
            targets,
            directions,
            active: 0,
            uniform_buffer,
            direction_pipeline,
            position_pipeline,
            integrate_bind_groups,
            seed_bind_group,
            direction_bind_group,
        })
    }

    pub fn grid_size(&self) -> u32 {
        self.grid_size
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    /// View of the committed position buffer, the one the point cloud reads.
    pub fn current_position_view(&self) -> &wgpu::TextureView {
        &self.targets[self.active].view
    }

    pub fn position_view(&self, index: usize) -> &wgpu::TextureView {
        &self.targets[index].view
    }

    /// Encodes the frame's passes and applies the ping-pong swap. The uniform
    /// writes land on the queue before the encoder is submitted.
    pub fn execute(
        &mut self,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        plan: &FramePlan,
        progress: f32,
    ) {
        if plan.passes.len() > MAX_PASSES_PER_FRAME {
            error!(
                "Frame plan has {} passes, uniform arena holds {}; dropping the rest",
                plan.passes.len(),
                MAX_PASSES_PER_FRAME
            );
        }
        let passes = &plan.passes[..plan.passes.len().min(MAX_PASSES_PER_FRAME)];
        for (i, pass) in passes.iter().enumerate() {
            let uniforms = SimUniforms {
                source: pass.source.into(),
                time: pass.time,
                render_mode: pass.mode.as_u32(),
                read_state: pass.read_state as u32,
                grid_size: self.grid_size,
                progress,
            };
            queue.write_buffer(
                &self.uniform_buffer,
                i as wgpu::BufferAddress * UNIFORM_STRIDE,
                bytemuck::bytes_of(&uniforms),
            );
        }
        for (i, pass) in passes.iter().enumerate() {
            let (attachment, pipeline, bind_group) = match pass.attachment {
                Attachment::Directions => (
                    &self.directions.view,
                    &self.direction_pipeline,
                    &self.direction_bind_group,
                ),
                Attachment::CurrentPosition => (
                    &self.targets[self.active].view,
                    &self.position_pipeline,
                    &self.seed_bind_group,
                ),
                Attachment::NextPosition => (
                    &self.targets[self.active ^ 1].view,
                    &self.position_pipeline,
                    &self.integrate_bind_groups[self.active],
                ),
            };
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Simulation pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: attachment,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        // Slots outside the draw range keep their texels.
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            rpass.set_pipeline(pipeline);
            rpass.set_bind_group(0, bind_group, &[(i as u64 * UNIFORM_STRIDE) as u32]);
            rpass.draw(pass.range.clone(), 0..1);
        }
        if plan.swap {
            self.active ^= 1;
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct DisplayUniforms {
    view_proj: [[f32; 4]; 4],
    grid_size: f32,
    point_alpha: f32,
    time: f32,
    pad: f32,
}

// cgmath clips z to [-1, 1]; wgpu expects [0, 1].
#[rustfmt::skip]
fn opengl_to_wgpu_matrix() -> Matrix4<f32> {
    Matrix4::new(
        1.0, 0.0, 0.0, 0.0,
        0.0, 1.0, 0.0, 0.0,
        0.0, 0.0, 0.5, 0.0,
        0.0, 0.0, 0.5, 1.0,
    )
}

fn view_projection(aspect: f32) -> Matrix4<f32> {
    let projection = cgmath::perspective(Deg(50.0), aspect, 0.01, 100.0);
    let view = Matrix4::look_at_rh(
        Point3::new(0.0, 0.4, 3.2),
        Point3::new(0.0, 0.0, 0.0),
        Vector3::unit_y(),
    );
    opengl_to_wgpu_matrix() * projection * view
}

/// Draws every particle slot as one additive point, fetching positions
/// straight from the committed state texture.
pub struct PointCloudRenderer {
    slot_count: u32,
    grid_size: u32,
    point_alpha: f32,
    background: wgpu::Color,
    uniform_buffer: wgpu::Buffer,
    vertex_buffer: wgpu::Buffer,
    bind_groups: [wgpu::BindGroup; 2],
    pipeline: wgpu::RenderPipeline,
}

impl PointCloudRenderer {
    pub fn new(
        device: &wgpu::Device,
        scheduler: &SimulationScheduler,
        surface_format: wgpu::TextureFormat,
        params: &SimParams,
    ) -> Self {
        let grid_size = scheduler.grid_size();
        let slot_count = grid_size * grid_size;

        // Texel-center UVs so the shader's truncation recovers the slot
        // exactly.
        let mut uvs: Vec<[f32; 2]> = Vec::with_capacity(slot_count as usize);
        for row in 0..grid_size {
            for col in 0..grid_size {
                uvs.push([
                    (col as f32 + 0.5) / grid_size as f32,
                    (row as f32 + 0.5) / grid_size as f32,
                ]);
            }
        }
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Point cloud UVs"),
            contents: bytemuck::cast_slice(&uvs),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Display uniforms"),
            size: std::mem::size_of::<DisplayUniforms>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Display bind group layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(
                            std::mem::size_of::<DisplayUniforms>() as u64,
                        ),
                    },
                    count: None,
                },
                state_texture_entry(1),
            ],
        });
        let make_bind_group = |index: usize| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Display bind group"),
                layout: &bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: uniform_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(
                            scheduler.position_view(index),
                        ),
                    },
                ],
            })
        };
        let bind_groups = [make_bind_group(0), make_bind_group(1)];

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Point cloud shader"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(crate::include_shader!("points.wgsl"))),
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Point cloud pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Point cloud pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                compilation_options: Default::default(),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<[f32; 2]>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &wgpu::vertex_attr_array![0 => Float32x2],
                }],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState {
                        color: wgpu::BlendComponent {
                            src_factor: wgpu::BlendFactor::One,
                            dst_factor: wgpu::BlendFactor::One,
                            operation: wgpu::BlendOperation::Add,
                        },
                        alpha: wgpu::BlendComponent::OVER,
                    }),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::PointList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        let background = wgpu::Color {
            r: params.display.background[0] as f64,
            g: params.display.background[1] as f64,
            b: params.display.background[2] as f64,
            a: 1.0,
        };
        PointCloudRenderer {
            slot_count,
            grid_size,
            point_alpha: params.display.point_alpha,
            background,
            uniform_buffer,
            vertex_buffer,
            bind_groups,
            pipeline,
        }
    }

    pub fn update_view(&self, queue: &wgpu::Queue, aspect: f32, time: f32) {
        let uniforms = DisplayUniforms {
            view_proj: view_projection(aspect).into(),
            grid_size: self.grid_size as f32,
            point_alpha: self.point_alpha,
            time,
            pad: 0.0,
        };
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));
    }

    pub fn render(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        output: &wgpu::TextureView,
        active: usize,
    ) {
        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Point cloud pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: output,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(self.background),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        rpass.set_pipeline(&self.pipeline);
        rpass.set_bind_group(0, &self.bind_groups[active], &[]);
        rpass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        rpass.draw(0..self.slot_count, 0..1);
    }
}
