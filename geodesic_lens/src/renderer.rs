//! wgpu renderers for the side view and the lensing view

use common::{create_rgba_texture, create_storage_buffer, create_uniform_buffer, Camera2D, GraphicsContext};
use bytemuck::Zeroable;
use wgpu::util::DeviceExt;

use crate::background::Background;
use crate::lensing::DeflectionTable;
use crate::metric::MetricVariant;
use crate::rays::CameraState;
use crate::side_view::{Overlay, Panel, SideViewScene};

/// Vertex budget shared by all paths of both panels
pub const MAX_VERTICES: usize = 400_000;

/// Segments per overlay circle
const CIRCLE_SEGMENTS: u32 = 64;

/// Circle instance the shader draws as the spin arc
const SPIN_ARC_INSTANCE: u32 = 3;

/// Smallest drawn segment, in pixels
const MIN_SEGMENT_PIXELS: f32 = 1.5;

const SCHWARZSCHILD_COLOR: [f32; 3] = [0.0, 1.0, 0.67];
const KERR_COLOR: [f32; 3] = [0.0, 1.0, 1.0];

fn panel_color(variant: MetricVariant) -> [f32; 3] {
    match variant {
        MetricVariant::Schwarzschild => SCHWARZSCHILD_COLOR,
        MetricVariant::Kerr => KERR_COLOR,
    }
}

/// Per-panel uniform: camera plus overlay circles
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PanelUniform {
    pub view_proj: [[f32; 4]; 4],
    /// Horizon radius, first and second photon orbit, number of photon orbits
    pub radii: [f32; 4],
    /// Horizon outline color
    pub color: [f32; 4],
    /// Spin arc radius and signed sweep; zero sweep hides it
    pub spin_arc: [f32; 4],
}

impl PanelUniform {
    pub fn new(camera: &Camera2D, overlay: &Overlay, variant: MetricVariant) -> Self {
        let orbit = |i: usize| overlay.photon_orbits.get(i).copied().unwrap_or(0.0) as f32;
        let [r, g, b] = panel_color(variant);
        Self {
            view_proj: camera.view_projection().to_cols_array_2d(),
            radii: [
                overlay.horizon_radius as f32,
                orbit(0),
                orbit(1),
                overlay.photon_orbits.len().min(2) as f32,
            ],
            color: [r, g, b, 1.0],
            spin_arc: match overlay.spin_arc {
                Some((radius, sweep)) => [radius as f32, sweep as f32, 0.0, 0.0],
                None => [0.0; 4],
            },
        }
    }
}

/// Line vertex for photon paths
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LineVertex {
    pub position: [f32; 2],
    pub color: [f32; 4],
}

impl LineVertex {
    const ATTRIBS: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![
        0 => Float32x2,
        1 => Float32x4,
    ];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<LineVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

/// Convert a panel's photon paths to line-strip vertices, fading from tail to head.
/// Returns (first vertex, count) per path. Stops adding paths once `budget` is reached.
pub fn panel_vertices(
    panel: &Panel,
    min_spacing: f64,
    budget: usize,
    vertices: &mut Vec<LineVertex>,
) -> Vec<(u32, u32)> {
    let [r, g, b] = panel_color(panel.variant());
    let mut ranges = Vec::new();

    for photon in panel.photons() {
        let points: Vec<_> = photon.trajectory().decimated(min_spacing).collect();
        if points.len() < 2 {
            continue;
        }
        if vertices.len() + points.len() > budget {
            break;
        }

        let start = vertices.len() as u32;
        let last = (points.len() - 1) as f32;
        for (i, p) in points.iter().enumerate() {
            let t = i as f32 / last;
            vertices.push(LineVertex {
                position: [p.x as f32, p.y as f32],
                color: [r, g, b, 0.15 + 0.85 * t],
            });
        }
        ranges.push((start, points.len() as u32));
    }

    ranges
}

fn line_strip_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
    label: &str,
    vertex_entry: &str,
    buffers: &[wgpu::VertexBufferLayout],
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: vertex_entry,
            buffers,
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: "fs_line",
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::LineStrip,
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
    })
}

/// Split-screen renderer: Schwarzschild panel on top, Kerr below
pub struct SideViewRenderer {
    line_pipeline: wgpu::RenderPipeline,
    circle_pipeline: wgpu::RenderPipeline,
    line_buffer: wgpu::Buffer,
    panel_buffers: [wgpu::Buffer; 2],
    panel_bind_groups: [wgpu::BindGroup; 2],
    ranges: [Vec<(u32, u32)>; 2],
    orbit_counts: [u32; 2],
    spin_arcs: [bool; 2],
}

impl SideViewRenderer {
    pub fn new(ctx: &GraphicsContext) -> Self {
        let device = &ctx.device;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Side View Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/side_view.wgsl").into()),
        });

        let panel_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Panel Bind Group Layout"),
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
            });

        let panel_buffers = ["Schwarzschild Panel Buffer", "Kerr Panel Buffer"]
            .map(|label| create_uniform_buffer(device, label, &PanelUniform::zeroed()));
        let panel_bind_groups = [0, 1].map(|i| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Panel Bind Group"),
                layout: &panel_bind_group_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: panel_buffers[i].as_entire_binding(),
                }],
            })
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Side View Pipeline Layout"),
            bind_group_layouts: &[&panel_bind_group_layout],
            push_constant_ranges: &[],
        });

        let format = ctx.config.format;
        let line_pipeline = line_strip_pipeline(
            device,
            &pipeline_layout,
            &shader,
            format,
            "Path Pipeline",
            "vs_line",
            &[LineVertex::layout()],
        );
        // Horizon and photon orbits
        let circle_pipeline =
            line_strip_pipeline(device, &pipeline_layout, &shader, format, "Circle Pipeline", "vs_circle", &[]);

        let line_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Path Buffer"),
            size: (std::mem::size_of::<LineVertex>() * MAX_VERTICES) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            line_pipeline,
            circle_pipeline,
            line_buffer,
            panel_buffers,
            panel_bind_groups,
            ranges: [Vec::new(), Vec::new()],
            orbit_counts: [0, 0],
            spin_arcs: [false, false],
        }
    }

    /// Upload paths and overlay for the current frame
    pub fn update(&mut self, queue: &wgpu::Queue, scene: &SideViewScene, camera: &Camera2D, panel_height_px: u32) {
        let min_spacing = (MIN_SEGMENT_PIXELS * camera.world_per_pixel(panel_height_px)) as f64;
        let mut vertices = Vec::new();

        for (i, panel) in scene.panels().iter().enumerate() {
            let overlay = panel.overlay(scene.params());
            let uniform = PanelUniform::new(camera, &overlay, panel.variant());
            queue.write_buffer(&self.panel_buffers[i], 0, bytemuck::cast_slice(&[uniform]));

            self.orbit_counts[i] = if scene.show_photon_sphere() {
                overlay.photon_orbits.len().min(2) as u32
            } else {
                0
            };
            self.spin_arcs[i] = overlay.spin_arc.is_some();
            self.ranges[i] = panel_vertices(panel, min_spacing, MAX_VERTICES, &mut vertices);
        }

        if !vertices.is_empty() {
            queue.write_buffer(&self.line_buffer, 0, bytemuck::cast_slice(&vertices));
        }
    }

    pub fn render(&self, encoder: &mut wgpu::CommandEncoder, view: &wgpu::TextureView, width: u32, height: u32) {
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Side View Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: 0.02,
                        g: 0.02,
                        b: 0.02,
                        a: 1.0,
                    }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        let panel_height = (height / 2).max(1);
        for i in 0..2 {
            let y = i as u32 * panel_height;
            render_pass.set_viewport(0.0, y as f32, width as f32, panel_height as f32, 0.0, 1.0);
            render_pass.set_scissor_rect(0, y, width, panel_height.min(height - y));
            render_pass.set_bind_group(0, &self.panel_bind_groups[i], &[]);

            render_pass.set_pipeline(&self.circle_pipeline);
            render_pass.draw(0..CIRCLE_SEGMENTS + 1, 0..1 + self.orbit_counts[i]);
            if self.spin_arcs[i] {
                render_pass.draw(0..CIRCLE_SEGMENTS + 1, SPIN_ARC_INSTANCE..SPIN_ARC_INSTANCE + 1);
            }

            render_pass.set_pipeline(&self.line_pipeline);
            render_pass.set_vertex_buffer(0, self.line_buffer.slice(..));
            for (start, count) in &self.ranges[i] {
                render_pass.draw(*start..(*start + *count), 0..1);
            }
        }
    }
}

/// Uniform for the lensing fragment shader
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LensingUniform {
    pub eye: [f32; 4],
    /// Forward axis; w holds the focal length
    pub forward: [f32; 4],
    pub right: [f32; 4],
    pub up: [f32; 4],
    pub resolution: [f32; 2],
    /// Entries per sense
    pub table_len: u32,
    /// 1 blends the two senses by spin alignment
    pub kerr: u32,
    pub absorbed: [f32; 4],
}

impl LensingUniform {
    pub fn new(
        camera: &CameraState,
        table: &DeflectionTable,
        width: u32,
        height: u32,
        absorbed: [f32; 3],
    ) -> Self {
        let v4 = |v: glam::DVec3, w: f32| [v.x as f32, v.y as f32, v.z as f32, w];
        Self {
            eye: v4(camera.eye, 1.0),
            forward: v4(camera.forward, camera.focal_length as f32),
            right: v4(camera.right, 0.0),
            up: v4(camera.up, 0.0),
            resolution: [width as f32, height as f32],
            table_len: table.len() as u32,
            kerr: u32::from(table.variant() == MetricVariant::Kerr),
            absorbed: [absorbed[0], absorbed[1], absorbed[2], 1.0],
        }
    }
}

/// Full-screen lensing renderer: one table lookup per fragment
pub struct LensingRenderer {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    bind_group: wgpu::BindGroup,
    uniform_buffer: wgpu::Buffer,
    table_buffer: wgpu::Buffer,
    background_view: wgpu::TextureView,
    sampler: wgpu::Sampler,
}

impl LensingRenderer {
    pub fn new(ctx: &GraphicsContext, background: &Background, table: &DeflectionTable) -> Self {
        let device = &ctx.device;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Lensing Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/lensing.wgsl").into()),
        });

        let max_dimension = device.limits().max_texture_dimension_2d;
        let background = background.fitted(max_dimension);
        let (_texture, background_view) = create_rgba_texture(
            device,
            &ctx.queue,
            "Background Texture",
            background.width(),
            background.height(),
            background.rgba8(),
        );

        // Wrap around in longitude, clamp at the poles
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Background Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let uniform_buffer = create_uniform_buffer(device, "Lensing Uniform Buffer", &LensingUniform::zeroed());
        let table_buffer = create_storage_buffer(device, "Deflection Table Buffer", &table.gpu_data());

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Lensing Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let bind_group = Self::create_bind_group(
            device,
            &bind_group_layout,
            &uniform_buffer,
            &table_buffer,
            &background_view,
            &sampler,
        );

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Lensing Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Lensing Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_fullscreen",
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: ctx.config.format,
                    blend: None,
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
        });

        Self {
            pipeline,
            bind_group_layout,
            bind_group,
            uniform_buffer,
            table_buffer,
            background_view,
            sampler,
        }
    }

    fn create_bind_group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        uniform_buffer: &wgpu::Buffer,
        table_buffer: &wgpu::Buffer,
        background_view: &wgpu::TextureView,
        sampler: &wgpu::Sampler,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Lensing Bind Group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: table_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(background_view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        })
    }

    /// Upload a rebuilt deflection table
    pub fn set_table(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, table: &DeflectionTable) {
        let data = table.gpu_data();
        let bytes = (data.len() * std::mem::size_of::<[f32; 2]>()) as u64;
        if bytes == self.table_buffer.size() {
            queue.write_buffer(&self.table_buffer, 0, bytemuck::cast_slice(&data));
            return;
        }

        self.table_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Deflection Table Buffer"),
            contents: bytemuck::cast_slice(&data),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        });
        self.bind_group = Self::create_bind_group(
            device,
            &self.bind_group_layout,
            &self.uniform_buffer,
            &self.table_buffer,
            &self.background_view,
            &self.sampler,
        );
    }

    pub fn update(&self, queue: &wgpu::Queue, uniform: &LensingUniform) {
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[*uniform]));
    }

    pub fn render(&self, encoder: &mut wgpu::CommandEncoder, view: &wgpu::TextureView) {
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Lensing Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, &self.bind_group, &[]);
        render_pass.draw(0..3, 0..1); // Full-screen triangle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::BlackHoleParams;
    use crate::rays::tests::orbit_camera;
    use crate::side_view::SideViewConfig;

    #[test]
    fn test_uniform_sizes_match_shaders() {
        assert_eq!(std::mem::size_of::<PanelUniform>(), 112);
        assert_eq!(std::mem::size_of::<LensingUniform>(), 96);
        assert_eq!(std::mem::size_of::<LineVertex>(), 24);
    }

    #[test]
    fn test_panel_vertices_fade_and_budget() {
        let mut scene = SideViewScene::new(SideViewConfig::default(), BlackHoleParams::default());
        for _ in 0..20 {
            scene.update();
        }
        let panel = &scene.panels()[0];

        let mut vertices = Vec::new();
        let ranges = panel_vertices(panel, 0.05, MAX_VERTICES, &mut vertices);
        assert_eq!(ranges.len(), panel.photons().len());
        let (start, count) = ranges[0];
        let head = vertices[(start + count - 1) as usize];
        let tail = vertices[start as usize];
        assert!(head.color[3] > tail.color[3]);
        assert!((head.color[3] - 1.0).abs() < 1e-6);

        let mut limited = Vec::new();
        let few = panel_vertices(panel, 0.05, count as usize, &mut limited);
        assert_eq!(few.len(), 1);
        assert!(limited.len() <= count as usize);
    }

    #[test]
    fn test_panel_uniform_spin_arc() {
        let camera = Camera2D::new(10.0, 2.0);
        let scene = SideViewScene::new(SideViewConfig::default(), BlackHoleParams::new(1.0, -0.5));
        let kerr = &scene.panels()[1];
        let uniform = PanelUniform::new(&camera, &kerr.overlay(scene.params()), kerr.variant());
        assert!(uniform.spin_arc[0] > uniform.radii[0]);
        assert!(uniform.spin_arc[1] < 0.0);

        let top = &scene.panels()[0];
        let uniform = PanelUniform::new(&camera, &top.overlay(scene.params()), top.variant());
        assert_eq!(uniform.spin_arc, [0.0; 4]);
    }

    #[test]
    fn test_lensing_uniform_packs_camera() {
        let params = BlackHoleParams::new(1.0, 0.5);
        let table = DeflectionTable::build(
            &params,
            MetricVariant::Kerr,
            20.0,
            &crate::lensing::LensingConfig {
                table_size: 16,
                ..Default::default()
            },
        );
        let camera = orbit_camera(0.0, 0.0, 20.0);
        let uniform = LensingUniform::new(&camera, &table, 800, 600, [0.0, 0.0, 0.0]);
        assert_eq!(uniform.table_len, 16);
        assert_eq!(uniform.kerr, 1);
        assert!((uniform.forward[3] - 1.2).abs() < 1e-6);
        assert!((uniform.eye[2] - 20.0).abs() < 1e-5);
    }
}
