use std::collections::HashMap;
use std::num::NonZeroU64;
use std::sync::Arc;

use bytemuck::NoUninit;
use tracing::{debug, info, warn};
use wgpu::*;

use crate::error::{Result, SceneError};
use crate::model::render_target::{
    BlendFactor, BlendFunc, ClearFlags, DrawCall, RenderTarget, Viewport,
};
use crate::model::resources::ResourceRegistry;
use crate::utils::{Mesh, MeshBuffer, Vertex};
use crate::view::gpu_init::GpuContext;
use crate::view::texture::{self, GpuTexture, ImageData};
use crate::view::ui::HudFrame;

const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;

/// WGSL source for a registered shader file.
pub fn shader_source(file: &str) -> Result<&'static str> {
    match file {
        "textured_vs.wgsl" => Ok(include_str!("shaders/textured_vs.wgsl")),
        "background_vs.wgsl" => Ok(include_str!("shaders/background_vs.wgsl")),
        "textured_fs.wgsl" => Ok(include_str!("shaders/textured_fs.wgsl")),
        other => Err(SceneError::resource(other, "no such shader")),
    }
}

fn blend_factor(factor: BlendFactor) -> wgpu::BlendFactor {
    match factor {
        BlendFactor::Zero => wgpu::BlendFactor::Zero,
        BlendFactor::One => wgpu::BlendFactor::One,
        BlendFactor::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
        BlendFactor::OneMinusSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
    }
}

/// Same factors for color and alpha, like `glBlendFunc`.
pub fn blend_state(func: BlendFunc) -> BlendState {
    let component = BlendComponent {
        src_factor: blend_factor(func.src),
        dst_factor: blend_factor(func.dst),
        operation: BlendOperation::Add,
    };
    BlendState {
        color: component,
        alpha: component,
    }
}

/// GL writes clear colors to the framebuffer as-is; an sRGB surface needs
/// them linearized to show the same shade.
pub fn clear_color(color: [f32; 4], srgb_surface: bool) -> Color {
    let channel = |c: f32| -> f64 {
        let c = c as f64;
        if !srgb_surface {
            c
        } else if c <= 0.04045 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    };
    Color {
        r: channel(color[0]),
        g: channel(color[1]),
        b: channel(color[2]),
        a: color[3] as f64,
    }
}

/// Clamp a viewport to the render target, `None` if nothing is left.
pub fn clamp_viewport(viewport: Viewport, width: u32, height: u32) -> Option<Viewport> {
    let x = viewport.x.min(width);
    let y = viewport.y.min(height);
    let w = viewport.width.min(width - x);
    let h = viewport.height.min(height - y);
    (w > 0 && h > 0).then(|| Viewport::new(x, y, w, h))
}

/// Per-draw matrices, bound with a dynamic offset.
#[repr(C)]
#[derive(Debug, Clone, Copy, NoUninit)]
pub struct SpriteUniform {
    pub model: [[f32; 4]; 4],
    pub view_proj: [[f32; 4]; 4],
    pub view_proj_inverse: [[f32; 4]; 4],
}

impl From<&DrawCall> for SpriteUniform {
    fn from(call: &DrawCall) -> Self {
        Self {
            model: call.model.to_cols_array_2d(),
            view_proj: call.view_proj.to_cols_array_2d(),
            view_proj_inverse: call.view_proj_inverse.to_cols_array_2d(),
        }
    }
}

const UNIFORM_SIZE: u64 = std::mem::size_of::<SpriteUniform>() as u64;

struct QueuedDraw {
    program: usize,
    material: usize,
    mesh: usize,
    uniform: SpriteUniform,
}

#[derive(Default)]
struct PendingFrame {
    clear: Option<(ClearFlags, [f32; 4], f32)>,
    draws: Vec<QueuedDraw>,
}

struct ProgramSlot {
    label: String,
    vertex: usize,
    fragment: usize,
    blend: BlendFunc,
}

struct UniformRing {
    buffer: Buffer,
    bind_group: BindGroup,
    stride: u64,
    capacity: usize,
}

/// Load every texture the registry references.
pub async fn load_textures(registry: &ResourceRegistry) -> Result<HashMap<String, ImageData>> {
    let mut images = HashMap::new();
    for path in registry.texture_paths() {
        images.insert(path.to_string(), texture::load_image(path).await?);
    }
    Ok(images)
}

pub fn create_depth_texture(device: &wgpu::Device, width: u32, height: u32) -> (wgpu::Texture, wgpu::TextureView) {
    let depth_texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("depth_texture"),
        size: wgpu::Extent3d { width: width.max(1), height: height.max(1), depth_or_array_layers: 1 },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let depth_view = depth_texture.create_view(&wgpu::TextureViewDescriptor::default());
    (depth_texture, depth_view)
}

/// `RenderTarget` backed by wgpu. Draws are queued during the frame and
/// submitted in order by [`SpriteRenderer::present`].
pub struct SpriteRenderer {
    device: Arc<Device>,
    queue: Arc<Queue>,
    format: TextureFormat,
    surface_size: (u32, u32),

    sprite_layout: BindGroupLayout,
    pipeline_layout: PipelineLayout,
    shaders: Vec<ShaderModule>,
    programs: Vec<ProgramSlot>,
    pipelines: Vec<RenderPipeline>,
    materials: Vec<BindGroup>,
    meshes: Vec<MeshBuffer>,
    _textures: Vec<GpuTexture>,
    uniforms: UniformRing,
    depth: (Texture, TextureView),

    viewport: Option<Viewport>,
    frame: PendingFrame,

    egui_renderer: egui_wgpu::Renderer,
}

impl SpriteRenderer {
    pub fn new(
        gpu: &GpuContext,
        registry: &ResourceRegistry,
        images: &HashMap<String, ImageData>,
    ) -> Result<Self> {
        let device = gpu.device.clone();
        let queue = gpu.queue.clone();

        let sprite_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("sprite_bind_group_layout"),
            entries: &[BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStages::VERTEX,
                ty: BindingType::Buffer {
                    ty: BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: NonZeroU64::new(UNIFORM_SIZE),
                },
                count: None,
            }],
        });
        let material_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("material_bind_group_layout"),
            entries: &[
                BindGroupLayoutEntry {
                    binding: 0,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Texture {
                        sample_type: TextureSampleType::Float { filterable: true },
                        view_dimension: TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 1,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Sampler(SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("sprite_pipeline_layout"),
            bind_group_layouts: &[&sprite_layout, &material_layout],
            push_constant_ranges: &[],
        });

        let shaders = registry
            .shaders()
            .map(|(_, desc)| {
                Ok(device.create_shader_module(ShaderModuleDescriptor {
                    label: Some(&desc.file),
                    source: ShaderSource::Wgsl(shader_source(&desc.file)?.into()),
                }))
            })
            .collect::<Result<Vec<_>>>()?;
        let programs = registry
            .programs()
            .map(|(_, program)| ProgramSlot {
                label: program.label.clone(),
                vertex: program.vertex.index(),
                fragment: program.fragment.index(),
                blend: program.blend,
            })
            .collect();

        let mut textures = Vec::new();
        let mut texture_index = HashMap::new();
        for path in registry.texture_paths() {
            let image = images
                .get(path)
                .ok_or_else(|| SceneError::resource(path, "texture was not loaded"))?;
            texture_index.insert(path, textures.len());
            textures.push(GpuTexture::upload(&device, &queue, path, image));
        }

        let materials = registry
            .materials()
            .map(|(_, material)| {
                let texture = texture_index
                    .get(material.color_texture.as_str())
                    .map(|&i| &textures[i])
                    .ok_or_else(|| SceneError::resource(&material.color_texture, "texture was not loaded"))?;
                Ok(device.create_bind_group(&BindGroupDescriptor {
                    label: Some(&material.label),
                    layout: &material_layout,
                    entries: &[
                        BindGroupEntry {
                            binding: 0,
                            resource: BindingResource::TextureView(&texture.view),
                        },
                        BindGroupEntry {
                            binding: 1,
                            resource: BindingResource::Sampler(&texture.sampler),
                        },
                    ],
                }))
            })
            .collect::<Result<Vec<_>>>()?;

        let meshes = registry
            .meshes()
            .map(|(_, mesh)| Mesh::from_geometry(mesh.geometry).upload(&device))
            .collect();

        let uniforms = Self::create_uniform_ring(&device, &sprite_layout, 16);
        let depth = create_depth_texture(&device, gpu.config.width, gpu.config.height);
        let egui_renderer = egui_wgpu::Renderer::new(&device, gpu.format, egui_wgpu::RendererOptions::default());

        let mut renderer = Self {
            device,
            queue,
            format: gpu.format,
            surface_size: (gpu.config.width, gpu.config.height),
            sprite_layout,
            pipeline_layout,
            shaders,
            programs,
            pipelines: Vec::new(),
            materials,
            meshes,
            _textures: textures,
            uniforms,
            depth,
            viewport: None,
            frame: PendingFrame::default(),
            egui_renderer,
        };
        renderer.pipelines = renderer.build_pipelines()?;

        info!(
            "sprite renderer ready: {} pipelines, {} materials",
            renderer.pipelines.len(),
            renderer.materials.len()
        );
        Ok(renderer)
    }

    fn create_uniform_ring(device: &Device, layout: &BindGroupLayout, capacity: usize) -> UniformRing {
        let alignment = device.limits().min_uniform_buffer_offset_alignment as u64;
        let stride = UNIFORM_SIZE.div_ceil(alignment) * alignment;
        let buffer = device.create_buffer(&BufferDescriptor {
            label: Some("sprite_uniforms"),
            size: stride * capacity as u64,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&BindGroupDescriptor {
            label: Some("sprite_bind_group"),
            layout,
            entries: &[BindGroupEntry {
                binding: 0,
                resource: BindingResource::Buffer(BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: NonZeroU64::new(UNIFORM_SIZE),
                }),
            }],
        });
        UniformRing {
            buffer,
            bind_group,
            stride,
            capacity,
        }
    }

    fn build_pipelines(&self) -> Result<Vec<RenderPipeline>> {
        self.programs
            .iter()
            .map(|program| {
                let vertex = self.shaders.get(program.vertex).ok_or_else(|| {
                    SceneError::Render(format!("program `{}` has no vertex shader", program.label))
                })?;
                let fragment = self.shaders.get(program.fragment).ok_or_else(|| {
                    SceneError::Render(format!("program `{}` has no fragment shader", program.label))
                })?;
                Ok(self.create_pipeline(&program.label, vertex, fragment, program.blend))
            })
            .collect()
    }

    fn create_pipeline(
        &self,
        label: &str,
        vertex: &ShaderModule,
        fragment: &ShaderModule,
        blend: BlendFunc,
    ) -> RenderPipeline {
        self.device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(&self.pipeline_layout),
            vertex: VertexState {
                module: vertex,
                entry_point: Some("vs_main"),
                buffers: &[Vertex::layout()],
                compilation_options: Default::default(),
            },
            fragment: Some(FragmentState {
                module: fragment,
                entry_point: Some("fs_main"),
                targets: &[Some(ColorTargetState {
                    format: self.format,
                    blend: Some(blend_state(blend)),
                    write_mask: ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: PrimitiveState {
                topology: PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            // Painter's order: depth is cleared but never tested or written.
            depth_stencil: Some(DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: false,
                depth_compare: CompareFunction::Always,
                stencil: StencilState::default(),
                bias: DepthBiasState::default(),
            }),
            multisample: MultisampleState { count: 1, mask: !0, alpha_to_coverage_enabled: false },
            multiview: None,
            cache: None,
        })
    }

    /// Drop everything queued since the last present.
    pub fn discard_frame(&mut self) {
        self.frame = PendingFrame::default();
    }

    /// Match the depth buffer to a reconfigured surface.
    pub fn resize_surface(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 || self.surface_size == (width, height) {
            return;
        }
        self.surface_size = (width, height);
        self.depth = create_depth_texture(&self.device, width, height);
        debug!("depth buffer now {width}x{height}");
    }

    fn upload_uniforms(&mut self) {
        let count = self.frame.draws.len();
        if count == 0 {
            return;
        }
        if count > self.uniforms.capacity {
            let capacity = count.next_power_of_two();
            debug!("growing sprite uniform buffer to {capacity} draws");
            self.uniforms = Self::create_uniform_ring(&self.device, &self.sprite_layout, capacity);
        }

        let stride = self.uniforms.stride as usize;
        let mut bytes = vec![0u8; stride * count];
        for (i, draw) in self.frame.draws.iter().enumerate() {
            let offset = i * stride;
            bytes[offset..offset + UNIFORM_SIZE as usize]
                .copy_from_slice(bytemuck::bytes_of(&draw.uniform));
        }
        self.queue.write_buffer(&self.uniforms.buffer, 0, &bytes);
    }

    /// Submit the queued frame, with the overlay on top, and present it.
    pub fn present(&mut self, gpu: &GpuContext, hud: Option<HudFrame>) -> Result<()> {
        let output = match gpu.surface.get_current_texture() {
            Ok(output) => output,
            Err(SurfaceError::Lost | SurfaceError::Outdated) => {
                warn!("surface lost, reconfiguring");
                gpu.surface.configure(&gpu.device, &gpu.config);
                self.frame = PendingFrame::default();
                return Ok(());
            }
            Err(SurfaceError::Timeout) => {
                warn!("surface timed out, skipping frame");
                self.frame = PendingFrame::default();
                return Ok(());
            }
            Err(e) => return Err(SceneError::Render(format!("surface error: {e}"))),
        };
        let view = output.texture.create_view(&TextureViewDescriptor::default());

        self.upload_uniforms();
        let frame = std::mem::take(&mut self.frame);

        let mut encoder = self.device.create_command_encoder(&CommandEncoderDescriptor {
            label: Some("sprite_encoder"),
        });

        let (color_load, depth_load) = match frame.clear {
            Some((flags, color, depth)) => (
                if flags.contains(ClearFlags::COLOR_BUFFER) {
                    LoadOp::Clear(clear_color(color, self.format.is_srgb()))
                } else {
                    LoadOp::Load
                },
                if flags.contains(ClearFlags::DEPTH_BUFFER) {
                    LoadOp::Clear(depth)
                } else {
                    LoadOp::Load
                },
            ),
            None => (LoadOp::Load, LoadOp::Load),
        };

        {
            let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("sprite_pass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: Operations {
                        load: color_load,
                        store: StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                    view: &self.depth.1,
                    depth_ops: Some(Operations {
                        load: depth_load,
                        store: StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            let (width, height) = self.surface_size;
            let viewport = self
                .viewport
                .map_or(Some(Viewport::new(0, 0, width, height)), |v| clamp_viewport(v, width, height));

            if let Some(vp) = viewport {
                pass.set_viewport(vp.x as f32, vp.y as f32, vp.width as f32, vp.height as f32, 0.0, 1.0);

                for (i, draw) in frame.draws.iter().enumerate() {
                    let mesh = &self.meshes[draw.mesh];
                    let offset = (i as u64 * self.uniforms.stride) as u32;
                    pass.set_pipeline(&self.pipelines[draw.program]);
                    pass.set_bind_group(0, &self.uniforms.bind_group, &[offset]);
                    pass.set_bind_group(1, &self.materials[draw.material], &[]);
                    pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                    pass.set_index_buffer(mesh.index_buffer.slice(..), IndexFormat::Uint32);
                    pass.draw_indexed(0..mesh.index_count, 0, 0..1);
                }
            }
        }

        if let Some(hud) = &hud {
            self.render_hud(&mut encoder, &view, hud);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        if let Some(hud) = hud {
            for id in &hud.textures_delta.free {
                self.egui_renderer.free_texture(id);
            }
        }
        Ok(())
    }

    fn render_hud(&mut self, encoder: &mut CommandEncoder, view: &TextureView, hud: &HudFrame) {
        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.surface_size.0, self.surface_size.1],
            pixels_per_point: hud.pixels_per_point,
        };

        for (id, image_delta) in &hud.textures_delta.set {
            self.egui_renderer.update_texture(&self.device, &self.queue, *id, image_delta);
        }
        self.egui_renderer.update_buffers(&self.device, &self.queue, encoder, &hud.primitives, &screen_descriptor);

        let mut egui_pass = encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("egui_render_pass"),
            color_attachments: &[Some(RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: Operations {
                    load: LoadOp::Load,
                    store: StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        self.egui_renderer.render(&mut egui_pass.forget_lifetime(), &hud.primitives, &screen_descriptor);
    }
}

impl RenderTarget for SpriteRenderer {
    fn enable_blending(&mut self, func: BlendFunc) {
        if self.programs.iter().all(|p| p.blend == func) {
            return;
        }
        for program in &mut self.programs {
            program.blend = func;
        }
        match self.build_pipelines() {
            Ok(pipelines) => self.pipelines = pipelines,
            Err(e) => warn!("keeping previous blend state: {e}"),
        }
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = Some(viewport);
    }

    fn clear(&mut self, flags: ClearFlags, color: [f32; 4], depth: f32) {
        self.frame.clear = Some((flags, color, depth));
    }

    fn draw(&mut self, call: &DrawCall) -> Result<()> {
        let (program, material, mesh) = (call.program.index(), call.material.index(), call.mesh.index());
        if program >= self.pipelines.len() || material >= self.materials.len() || mesh >= self.meshes.len() {
            return Err(SceneError::Render(format!(
                "draw references unknown resources (program {program}, material {material}, mesh {mesh})"
            )));
        }
        self.frame.draws.push(QueuedDraw {
            program,
            material,
            mesh,
            uniform: SpriteUniform::from(call),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::resources::{Geometry, ShaderStage};
    use glam::{Mat4, Vec3};

    #[test]
    fn every_registered_shader_has_source() {
        for file in ["textured_vs.wgsl", "background_vs.wgsl", "textured_fs.wgsl"] {
            let source = shader_source(file).unwrap();
            assert!(source.contains("fn vs_main") || source.contains("fn fs_main"));
        }
        assert!(matches!(
            shader_source("missing.wgsl"),
            Err(SceneError::ResourceLoad { .. })
        ));
    }

    #[test]
    fn alpha_blend_maps_to_wgpu_factors() {
        let state = blend_state(BlendFunc::ALPHA);
        assert_eq!(state.color.src_factor, wgpu::BlendFactor::SrcAlpha);
        assert_eq!(state.color.dst_factor, wgpu::BlendFactor::OneMinusSrcAlpha);
        assert_eq!(state.alpha, state.color);
    }

    #[test]
    fn clear_color_is_linearized_for_srgb_surfaces() {
        let raw = clear_color([0.3, 0.0, 0.3, 1.0], false);
        assert_eq!((raw.r, raw.g, raw.a), (0.3f32 as f64, 0.0, 1.0));

        let linear = clear_color([0.3, 0.0, 0.3, 1.0], true);
        assert!((linear.r - 0.0732).abs() < 1e-3);
        assert_eq!(linear.g, 0.0);
        assert_eq!(linear.a, 1.0);
    }

    #[test]
    fn viewport_is_clamped_to_surface() {
        assert_eq!(
            clamp_viewport(Viewport::new(0, 0, 1024, 768), 800, 600),
            Some(Viewport::new(0, 0, 800, 600))
        );
        assert_eq!(clamp_viewport(Viewport::new(900, 0, 10, 10), 800, 600), None);
    }

    #[test]
    fn uniform_matches_shader_layout() {
        assert_eq!(UNIFORM_SIZE, 3 * 64);

        let mut registry = ResourceRegistry::new();
        let vs = registry.add_shader(ShaderStage::Vertex, "textured_vs.wgsl");
        let fs = registry.add_shader(ShaderStage::Fragment, "textured_fs.wgsl");
        let program = registry.add_program("textured", vs, fs, BlendFunc::ALPHA).unwrap();
        let material = registry.add_material("raider", program, "media/raider.png");
        let mesh = registry.add_mesh("raider", material, Geometry::TexturedQuad);

        let call = DrawCall {
            mesh,
            material,
            program,
            model: Mat4::from_translation(Vec3::new(1.0, 2.0, 0.0)),
            view_proj: Mat4::IDENTITY,
            view_proj_inverse: Mat4::IDENTITY,
        };
        let uniform = SpriteUniform::from(&call);
        assert_eq!(uniform.model[3], [1.0, 2.0, 0.0, 1.0]);
        assert_eq!(uniform.view_proj, Mat4::IDENTITY.to_cols_array_2d());
    }
}
