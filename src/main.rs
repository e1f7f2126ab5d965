// Synaptic web: a drifting particle network with proximity connections
// Particles live in an ECS world; drawn as instanced spheres + one line list per frame

mod config;
mod engine;
mod error;

use std::path::PathBuf;
use std::sync::Arc;

use winit::{
    event::{Event as WinitEvent, WindowEvent, ElementState, KeyEvent},
    event_loop::EventLoop,
    keyboard::{KeyCode, PhysicalKey},
    window::Window,
};
use rand::{SeedableRng, rngs::StdRng};
use tracing::{debug, error, info, warn};
use wgpu::util::DeviceExt;

use config::{CONFIG_ENV, SceneConfig};
use engine::camera::SceneCamera;
use engine::clock::{FpsSample, FrameClock};
use engine::connections::max_connections;
use engine::diagrams::DiagramBoard;
use engine::mesh::{GpuVertex, uv_sphere};
use engine::overlay::{FrameStats, Overlay};
use engine::stars::{STAR_LIGHTNESS, Star, StarParams, generate_stars};
use engine::{Color, ParticleField};
use error::{Result, SceneError};

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Frames slower than this are logged; motion is per frame, so they show as a stall.
const LONG_FRAME_SECS: f32 = 0.25;

/// Sphere tessellation (segments around, segments pole to pole).
const SPHERE_SEGMENTS: (u32, u32) = (32, 32);

// ============================================================================
// INSTANCE DATA (per-particle)
// ============================================================================

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct InstanceData {
    position: [f32; 3],
    scale: f32,  // radius × pulse
    color: [f32; 4],
}

impl InstanceData {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<InstanceData>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &[
                // Center (location 2)
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x3,
                },
                // Scale (location 3)
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 3,
                    format: wgpu::VertexFormat::Float32,
                },
                // Color (location 4)
                wgpu::VertexAttribute {
                    offset: (std::mem::size_of::<[f32; 3]>() + std::mem::size_of::<f32>()) as wgpu::BufferAddress,
                    shader_location: 4,
                    format: wgpu::VertexFormat::Float32x4,
                },
            ],
        }
    }
}

// ============================================================================
// UNIFORM DATA (camera, group rotation, line color)
// ============================================================================

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct Uniforms {
    view_proj: [[f32; 4]; 4],
    model: [[f32; 4]; 4],
    line_color: [f32; 4],
}

// ============================================================================
// LINE GEOMETRY
// ============================================================================

/// GPU vertex buffer for connection segments, sized once for the worst case
/// (every pair connected) and overwritten every frame.
struct LineGeometry {
    buffer: wgpu::Buffer,
    capacity: usize,  // vertices
    vertex_count: u32,
}

impl LineGeometry {
    const STRIDE: usize = std::mem::size_of::<[f32; 3]>();

    fn new(device: &wgpu::Device, particle_count: usize) -> Self {
        let capacity = max_connections(particle_count).max(1) * 2;
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Connection Line Buffer"),
            size: (capacity * Self::STRIDE) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Self { buffer, capacity, vertex_count: 0 }
    }

    fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: Self::STRIDE as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x3,
            }],
        }
    }

    /// Replace the whole line list with this frame's endpoints (xyz per vertex).
    fn upload(&mut self, queue: &wgpu::Queue, vertices: &[f32]) {
        let count = (vertices.len() / 3).min(self.capacity);
        if count > 0 {
            queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&vertices[..count * 3]));
        }
        self.vertex_count = count as u32;
    }
}

impl Drop for LineGeometry {
    fn drop(&mut self) {
        self.buffer.destroy();
        debug!("released connection line buffer");
    }
}

// ============================================================================
// STAR SHELL
// ============================================================================

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct StarUniforms {
    view_proj: [[f32; 4]; 4],
    viewport: [f32; 2],
    twinkle: f32,
    lightness: f32,
}

/// Static background stars: uploaded once, drawn first as instanced quads.
struct StarLayer {
    params: StarParams,
    pipeline: wgpu::RenderPipeline,
    instances: wgpu::Buffer,
    count: u32,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl StarLayer {
    fn new(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        params: StarParams,
        rng: &mut StdRng,
    ) -> Option<Self> {
        let stars: Vec<Star> = generate_stars(&params, rng);
        if stars.is_empty() {
            return None;
        }

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Star Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shader_stars.wgsl").into()),
        });

        let instances = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Star Instance Buffer"),
            contents: bytemuck::cast_slice(&stars),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Star Uniform Buffer"),
            size: std::mem::size_of::<StarUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
            label: Some("star_bind_group_layout"),
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
            label: Some("star_bind_group"),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Star Pipeline Layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let additive = wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::One,
            operation: wgpu::BlendOperation::Add,
        };
        let pipeline = create_scene_pipeline(
            device,
            &pipeline_layout,
            &shader,
            &[Star::desc()],
            format,
            PassStyle {
                label: "Star Pipeline",
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                blend: wgpu::BlendState { color: additive, alpha: additive },
                depth_write: false,
            },
        );

        info!(stars = stars.len(), "star shell ready");

        Some(Self {
            params,
            pipeline,
            instances,
            count: stars.len() as u32,
            uniform_buffer,
            bind_group,
        })
    }

    /// Write this frame's camera, viewport and twinkle. Stars ignore the group rotation.
    fn prepare(&self, queue: &wgpu::Queue, view_proj: glam::Mat4, viewport: (u32, u32), elapsed: f32) {
        let uniforms = StarUniforms {
            view_proj: view_proj.to_cols_array_2d(),
            viewport: [viewport.0.max(1) as f32, viewport.1.max(1) as f32],
            twinkle: self.params.twinkle(elapsed),
            lightness: STAR_LIGHTNESS,
        };
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[uniforms]));
    }

    fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.set_vertex_buffer(0, self.instances.slice(..));
        pass.draw(0..6, 0..self.count);
    }
}

impl Drop for StarLayer {
    fn drop(&mut self) {
        self.instances.destroy();
        debug!("released star buffer");
    }
}

// ============================================================================
// APPLICATION STATE
// ============================================================================

struct State {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    size: winit::dpi::PhysicalSize<u32>,
    sphere_pipeline: wgpu::RenderPipeline,
    line_pipeline: wgpu::RenderPipeline,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    instance_buffer: wgpu::Buffer,
    num_indices: u32,
    max_instances: usize,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    depth_view: wgpu::TextureView,
    lines: LineGeometry,
    stars: Option<StarLayer>,
    instance_data: Vec<InstanceData>,

    // Scene
    field: ParticleField,
    diagrams: DiagramBoard,
    camera: SceneCamera,
    clock: FrameClock,
    overlay: Overlay,
    last_sample: FpsSample,
    background: wgpu::Color,
    line_color: [f32; 4],
}

impl State {
    async fn new(window: Arc<Window>, scene: &SceneConfig) -> Result<Self> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(SceneError::NoAdapter)?;

        let info = adapter.get_info();
        info!(adapter = %info.name, backend = ?info.backend, "selected GPU adapter");

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: None,
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| SceneError::UnsupportedSurface(info.name.clone()))?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: surface_caps.present_modes.first().copied().unwrap_or(wgpu::PresentMode::Fifo),
            alpha_mode: surface_caps.alpha_modes.first().copied().unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        surface.configure(&device, &config);
        let depth_view = create_depth_view(&device, &config);

        let particle_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Particle Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shader_particles.wgsl").into()),
        });
        let line_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Line Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shader_lines.wgsl").into()),
        });

        let line_color = scene.line_color()?;
        let uniforms = Uniforms {
            view_proj: glam::Mat4::IDENTITY.to_cols_array_2d(),
            model: glam::Mat4::IDENTITY.to_cols_array_2d(),
            line_color: [line_color.r, line_color.g, line_color.b, scene.field.line_opacity],
        };

        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Uniform Buffer"),
            contents: bytemuck::cast_slice(&[uniforms]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let uniform_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
                label: Some("uniform_bind_group_layout"),
            });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &uniform_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
            label: Some("uniform_bind_group"),
        });

        let pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Render Pipeline Layout"),
                bind_group_layouts: &[&uniform_bind_group_layout],
                push_constant_ranges: &[],
            });

        let sphere_pipeline = create_scene_pipeline(
            &device,
            &pipeline_layout,
            &particle_shader,
            &[GpuVertex::desc(), InstanceData::desc()],
            config.format,
            PassStyle {
                label: "Sphere Pipeline",
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: Some(wgpu::Face::Back),
                blend: wgpu::BlendState::REPLACE,
                depth_write: true,
            },
        );

        // Lines: translucent, depth-tested against spheres but never written
        let line_pipeline = create_scene_pipeline(
            &device,
            &pipeline_layout,
            &line_shader,
            &[LineGeometry::desc()],
            config.format,
            PassStyle {
                label: "Line Pipeline",
                topology: wgpu::PrimitiveTopology::LineList,
                cull_mode: None,
                blend: wgpu::BlendState::ALPHA_BLENDING,
                depth_write: false,
            },
        );

        let sphere = uv_sphere(SPHERE_SEGMENTS.0, SPHERE_SEGMENTS.1);

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Sphere Vertex Buffer"),
            contents: sphere.vertex_bytes(),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Sphere Index Buffer"),
            contents: sphere.index_bytes(),
            usage: wgpu::BufferUsages::INDEX,
        });

        let num_indices = sphere.index_count() as u32;

        // Particle field: spawned once, never grows, so buffers are sized exactly
        let params = scene.field_params()?;
        let mut rng = match scene.field.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let field = ParticleField::new(params, &mut rng);
        let max_instances = field.particle_count().max(1);
        info!(
            particles = field.particle_count(),
            threshold = field.params().connection_distance,
            seed = ?scene.field.seed,
            "particle field ready"
        );

        let instance_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Instance Buffer"),
            size: (max_instances * std::mem::size_of::<InstanceData>()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let lines = LineGeometry::new(&device, field.particle_count());

        let stars = scene
            .star_params()
            .and_then(|params| StarLayer::new(&device, config.format, params, &mut rng));

        let diagrams = DiagramBoard::new(
            scene.diagrams.stage_period()?,
            scene.diagrams.legacy_latency_ms,
            scene.diagrams.optimized_latency_ms,
            0.0,
        );

        let mut overlay = Overlay::new(&window, &device, config.format);
        overlay.stats_visible = scene.window.show_stats;
        overlay.diagrams_visible = scene.window.show_diagrams;

        let background = to_clear_color(scene.background()?);

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            size,
            sphere_pipeline,
            line_pipeline,
            vertex_buffer,
            index_buffer,
            instance_buffer,
            num_indices,
            max_instances,
            uniform_buffer,
            uniform_bind_group,
            depth_view,
            lines,
            stars,
            instance_data: Vec::with_capacity(max_instances),
            field,
            diagrams,
            camera: SceneCamera::new(),
            clock: FrameClock::new(),
            overlay,
            last_sample: FpsSample {
                fps: 0,
                frame_time_avg_ms: 0.0,
                frame_time_min_ms: 0.0,
                frame_time_max_ms: 0.0,
            },
            background,
            line_color: uniforms.line_color,
        })
    }

    fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.size = new_size;
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
            self.depth_view = create_depth_view(&self.device, &self.config);
        }
    }

    fn update(&mut self) {
        if let Some(sample) = self.clock.tick() {
            self.last_sample = sample;
            debug!(
                fps = sample.fps,
                particles = self.field.particle_count(),
                connections = self.field.connections().len(),
                "frame stats"
            );
        }

        if self.clock.delta() > LONG_FRAME_SECS {
            debug!(frame_ms = self.clock.delta() * 1000.0, "long frame");
        }

        let t = self.clock.elapsed();
        self.field.step(t);
        self.diagrams.update(t);
    }

    fn render(&mut self) -> std::result::Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let t = self.clock.elapsed();
        let params = self.field.params();

        // Collect instance data BEFORE creating the render pass
        self.instance_data.clear();
        self.instance_data.extend(self.field.particles().iter().map(|p| InstanceData {
            position: p.position.to_array(),
            scale: p.radius * params.pulse_scale(t, p.phase_offset),
            color: {
                let [r, g, b] = p.color.to_array();
                [r, g, b, 1.0]
            },
        }));
        let instance_count = self.instance_data.len().min(self.max_instances);
        if instance_count > 0 {
            self.queue.write_buffer(
                &self.instance_buffer,
                0,
                bytemuck::cast_slice(&self.instance_data[..instance_count]),
            );
        }

        self.lines.upload(&self.queue, self.field.line_vertices());

        let aspect = self.size.width as f32 / self.size.height.max(1) as f32;
        let view_proj = self.camera.view_projection(aspect);
        if let Some(stars) = &self.stars {
            stars.prepare(&self.queue, view_proj, (self.size.width, self.size.height), t);
        }
        let uniforms = Uniforms {
            view_proj: view_proj.to_cols_array_2d(),
            model: params.group_rotation(t).to_cols_array_2d(),
            line_color: self.line_color,
        };
        self.queue.write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[uniforms]));

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.background),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            // Stars first; they never write depth, so everything else draws over them
            if let Some(stars) = &self.stars {
                stars.draw(&mut render_pass);
            }

            render_pass.set_bind_group(0, &self.uniform_bind_group, &[]);

            // Spheres: one instanced draw for all particles
            render_pass.set_pipeline(&self.sphere_pipeline);
            render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
            render_pass.set_vertex_buffer(1, self.instance_buffer.slice(..));
            render_pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            render_pass.draw_indexed(0..self.num_indices, 0, 0..instance_count as u32);

            // Connections: drawn after spheres so blending sees them
            if self.lines.vertex_count > 0 {
                render_pass.set_pipeline(&self.line_pipeline);
                render_pass.set_vertex_buffer(0, self.lines.buffer.slice(..));
                render_pass.draw(0..self.lines.vertex_count, 0..1);
            }
        }

        let stats = FrameStats {
            fps: self.last_sample.fps,
            frame_time_avg_ms: self.last_sample.frame_time_avg_ms,
            frame_time_min_ms: self.last_sample.frame_time_min_ms,
            frame_time_max_ms: self.last_sample.frame_time_max_ms,
            particle_count: self.field.particle_count(),
            connection_count: self.field.connections().len(),
            draw_calls: 1 + u32::from(self.lines.vertex_count > 0) + u32::from(self.stars.is_some()),
            resolution: (self.size.width, self.size.height),
            elapsed: t,
        };
        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.config.width, self.config.height],
            pixels_per_point: self.window.scale_factor() as f32,
        };
        self.overlay.render(
            &self.device,
            &self.queue,
            &mut encoder,
            &self.window,
            &view,
            &screen_descriptor,
            &stats,
            &mut self.diagrams,
        );

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}

/// The knobs that differ between the sphere and line pipelines.
struct PassStyle {
    label: &'static str,
    topology: wgpu::PrimitiveTopology,
    cull_mode: Option<wgpu::Face>,
    blend: wgpu::BlendState,
    depth_write: bool,
}

fn create_scene_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    buffers: &[wgpu::VertexBufferLayout<'_>],
    format: wgpu::TextureFormat,
    style: PassStyle,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(style.label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            buffers,
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(style.blend),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: style.topology,
            cull_mode: style.cull_mode,
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: style.depth_write,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

fn create_depth_view(device: &wgpu::Device, config: &wgpu::SurfaceConfiguration) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Depth Texture"),
        size: wgpu::Extent3d {
            width: config.width.max(1),
            height: config.height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

/// Clear colors are linear on an sRGB surface; config colors are sRGB.
fn to_clear_color(color: Color) -> wgpu::Color {
    let linear = |c: f32| (c as f64).powf(2.2);
    wgpu::Color {
        r: linear(color.r),
        g: linear(color.g),
        b: linear(color.b),
        a: 1.0,
    }
}

// ============================================================================
// MAIN
// ============================================================================

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        error!("{e}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    // First CLI argument wins over the environment variable
    let config_path = std::env::args_os()
        .nth(1)
        .or_else(|| std::env::var_os(CONFIG_ENV))
        .map(PathBuf::from);
    let scene = SceneConfig::load(config_path.as_deref())?;

    let event_loop = EventLoop::new()?;

    let window_attributes = Window::default_attributes()
        .with_title(scene.window.title.clone())
        .with_inner_size(winit::dpi::LogicalSize::new(scene.window.width, scene.window.height));

    let window = Arc::new(event_loop.create_window(window_attributes)?);

    let mut state = pollster::block_on(State::new(window.clone(), &scene))?;

    event_loop.run(move |event, control_flow| {
        match event {
            WinitEvent::WindowEvent {
                ref event,
                window_id,
            } if window_id == window.id() => {
                let consumed = state.overlay.handle_window_event(&window, event).consumed;

                match event {
                    WindowEvent::CloseRequested
                    | WindowEvent::KeyboardInput {
                        event:
                            KeyEvent {
                                state: ElementState::Pressed,
                                physical_key: PhysicalKey::Code(KeyCode::Escape),
                                ..
                            },
                        ..
                    } => {
                        state.diagrams.teardown();
                        info!(
                            frames = state.field.frames(),
                            pipeline_running = state.diagrams.pipeline.is_running(),
                            "shutting down"
                        );
                        control_flow.exit();
                    }
                    WindowEvent::KeyboardInput {
                        event:
                            KeyEvent {
                                state: ElementState::Pressed,
                                physical_key: PhysicalKey::Code(key),
                                repeat: false,
                                ..
                            },
                        ..
                    } if !consumed => match key {
                        KeyCode::F1 => state.overlay.toggle_diagrams(),
                        KeyCode::F3 => state.overlay.toggle_stats(),
                        KeyCode::KeyU => state.diagrams.unification.toggle(),
                        _ => {}
                    },
                    WindowEvent::Resized(physical_size) => {
                        state.resize(*physical_size);
                    }
                    WindowEvent::RedrawRequested => {
                        state.update();
                        match state.render() {
                            Ok(_) => {}
                            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                                state.resize(state.size)
                            }
                            Err(wgpu::SurfaceError::OutOfMemory) => {
                                error!("GPU out of memory");
                                control_flow.exit();
                            }
                            Err(e) => warn!("{:?}", e),
                        }
                    }
                    _ => {}
                }
            }
            WinitEvent::AboutToWait => {
                window.request_redraw();
            }
            _ => {}
        }
    })?;

    Ok(())
}
