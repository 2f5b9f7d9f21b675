//! Headless GPU backend.
//!
//! Every program is a full-screen-triangle render pipeline built from
//! `shaders/common.wgsl` plus the program's own fragment stage. Textures map
//! to real GPU textures:
//!
//! | Element | Format |
//! |---|---|
//! | `Float` | `Rgba16Float` |
//! | `Byte` | `Rgba8Unorm` |
//! | depth store | `Depth32Float` |
//!
//! Draws are submitted one encoder at a time, so each draw observes the
//! writes of the previous one.

pub mod uniforms;

use std::borrow::Cow;
use std::rc::Weak;

use glam::Vec4;
use rustc_hash::FxHashMap;
use wgpu::util::DeviceExt;

use crate::errors::{PbrError, Result};
use crate::renderer::quad::check_inputs;
use crate::renderer::{Attachment, Backend, DrawCall};
use crate::resources::image::ImageData;
use crate::resources::program::ProgramKind;
use crate::resources::texture::{
    PixelElementSize, Texture, TextureDesc, TextureId, TextureInner, TextureKind,
};

const COMMON_WGSL: &str = include_str!("shaders/common.wgsl");

fn program_source(kind: ProgramKind) -> &'static str {
    match kind {
        ProgramKind::PhysicallyBasedRendering => include_str!("shaders/physically_based.wgsl"),
        ProgramKind::CubeMapHighDynamicRange => include_str!("shaders/skybox.wgsl"),
        ProgramKind::MonteCarloPrefilter => include_str!("shaders/prefilter.wgsl"),
        ProgramKind::IrradianceCubeMap => include_str!("shaders/irradiance.wgsl"),
        ProgramKind::IntegrateBRDF => include_str!("shaders/integrate_brdf.wgsl"),
        ProgramKind::Brightness => include_str!("shaders/brightness.wgsl"),
        ProgramKind::GaussianBlur => include_str!("shaders/gaussian_blur.wgsl"),
        ProgramKind::Merge => include_str!("shaders/merge.wgsl"),
    }
}

fn texture_format(desc: &TextureDesc) -> wgpu::TextureFormat {
    if desc.is_depth() {
        return wgpu::TextureFormat::Depth32Float;
    }
    match desc.element {
        PixelElementSize::Float => wgpu::TextureFormat::Rgba16Float,
        PixelElementSize::Byte => wgpu::TextureFormat::Rgba8Unorm,
    }
}

fn bytes_per_pixel(format: wgpu::TextureFormat) -> u32 {
    match format {
        wgpu::TextureFormat::Rgba16Float => 8,
        _ => 4,
    }
}

/// Align number to WebGPU's copy row alignment (256 bytes).
fn align_bytes_per_row(value: u32) -> u32 {
    value.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT) * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT
}

fn encode_pixels(format: wgpu::TextureFormat, desc: &TextureDesc, data: &ImageData) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(data.pixels.len() * bytes_per_pixel(format) as usize);
    for pixel in &data.pixels {
        let pixel = desc.quantize(*pixel);
        match format {
            wgpu::TextureFormat::Rgba16Float => {
                for c in pixel.to_array() {
                    bytes.extend_from_slice(&half::f16::from_f32(c).to_le_bytes());
                }
            }
            _ => {
                for c in pixel.to_array() {
                    bytes.push((c.clamp(0.0, 1.0) * 255.0).round() as u8);
                }
            }
        }
    }
    bytes
}

fn decode_pixel(format: wgpu::TextureFormat, bytes: &[u8]) -> Vec4 {
    match format {
        wgpu::TextureFormat::Rgba16Float => {
            let channel = |i: usize| {
                half::f16::from_le_bytes([bytes[i * 2], bytes[i * 2 + 1]]).to_f32()
            };
            Vec4::new(channel(0), channel(1), channel(2), channel(3))
        }
        wgpu::TextureFormat::Depth32Float => {
            let depth = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            Vec4::new(depth, 0.0, 0.0, 1.0)
        }
        _ => Vec4::new(
            f32::from(bytes[0]),
            f32::from(bytes[1]),
            f32::from(bytes[2]),
            f32::from(bytes[3]),
        ) / 255.0,
    }
}

struct GpuTexture {
    handle: Weak<TextureInner>,
    texture: wgpu::Texture,
    /// Full view used for sampling (`Cube` for cube maps). `None` for depth.
    sample_view: Option<wgpu::TextureView>,
    format: wgpu::TextureFormat,
}

impl GpuTexture {
    /// Single level/layer view for use as an attachment.
    fn attachment_view(&self, level: u32, layer: u32) -> wgpu::TextureView {
        self.texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("Attachment View"),
            format: None,
            dimension: Some(wgpu::TextureViewDimension::D2),
            aspect: wgpu::TextureAspect::All,
            base_mip_level: level,
            mip_level_count: Some(1),
            base_array_layer: layer,
            array_layer_count: Some(1),
            usage: Some(wgpu::TextureUsages::RENDER_ATTACHMENT),
        })
    }
}

struct CompiledProgram {
    module: wgpu::ShaderModule,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PipelineKey {
    kind: ProgramKind,
    format: wgpu::TextureFormat,
    depth: bool,
}

/// Backend running the programs on a headless wgpu device.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter_name: String,
    sampler: wgpu::Sampler,
    textures: FxHashMap<TextureId, GpuTexture>,
    programs: FxHashMap<ProgramKind, CompiledProgram>,
    pipelines: FxHashMap<PipelineKey, wgpu::RenderPipeline>,
}

impl WgpuBackend {
    /// Opens the default adapter without a surface.
    pub fn new() -> Result<Self> {
        pollster::block_on(Self::new_async())
    }

    pub async fn new_async() -> Result<Self> {
        let instance = wgpu::Instance::default();
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| PbrError::AdapterRequestFailed(e.to_string()))?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("PBR Bloom Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::Performance,
                ..Default::default()
            })
            .await?;

        let adapter_name = adapter.get_info().name;
        log::info!("wgpu: using adapter {adapter_name}");

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Linear Clamp Sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Linear,
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            ..Default::default()
        });

        Ok(Self {
            device,
            queue,
            adapter_name,
            sampler,
            textures: FxHashMap::default(),
            programs: FxHashMap::default(),
            pipelines: FxHashMap::default(),
        })
    }

    #[must_use]
    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    fn gpu(&self, texture: &Texture) -> Result<&GpuTexture> {
        self.textures
            .get(&texture.id())
            .ok_or(PbrError::UnknownTexture(texture.id()))
    }

    fn pipeline(&mut self, key: PipelineKey) -> Result<wgpu::RenderPipeline> {
        if let Some(pipeline) = self.pipelines.get(&key) {
            return Ok(pipeline.clone());
        }
        let program = self
            .programs
            .get(&key.kind)
            .ok_or_else(|| PbrError::UnknownProgram(key.kind.name().to_string()))?;

        let depth_stencil = key.depth.then(|| wgpu::DepthStencilState {
            format: wgpu::TextureFormat::Depth32Float,
            depth_write_enabled: Some(true),
            depth_compare: Some(wgpu::CompareFunction::Less),
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        });

        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(&format!("{} Pipeline {:?}", key.kind.name(), key.format)),
                layout: Some(&program.pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &program.module,
                    entry_point: Some("vs_main"),
                    buffers: &[],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &program.module,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: key.format,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    ..Default::default()
                },
                depth_stencil,
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            });
        self.pipelines.insert(key, pipeline.clone());
        Ok(pipeline)
    }

    fn submit_pass(
        &self,
        label: &str,
        color: Option<(&wgpu::TextureView, wgpu::LoadOp<wgpu::Color>)>,
        depth: Option<(&wgpu::TextureView, wgpu::LoadOp<f32>)>,
        record: impl FnOnce(&mut wgpu::RenderPass<'_>),
    ) {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) });
        {
            let color_attachment = color.map(|(view, load)| wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            });
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(label),
                color_attachments: &[color_attachment],
                depth_stencil_attachment: depth.map(|(view, load)| {
                    wgpu::RenderPassDepthStencilAttachment {
                        view,
                        depth_ops: Some(wgpu::Operations {
                            load,
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: None,
                    }
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                ..Default::default()
            });
            record(&mut pass);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
    }
}

impl Backend for WgpuBackend {
    fn name(&self) -> &'static str {
        "wgpu"
    }

    fn create_texture(&mut self, desc: TextureDesc) -> Result<Texture> {
        desc.validate()?;
        let format = texture_format(&desc);
        let usage = if desc.is_depth() {
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC
        } else {
            wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST
        };
        let gpu_texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&desc.label),
            size: wgpu::Extent3d {
                width: desc.size.0,
                height: desc.size.1,
                depth_or_array_layers: desc.layer_count(),
            },
            mip_level_count: desc.mip_levels,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });

        let sample_view = (!desc.is_depth()).then(|| {
            gpu_texture.create_view(&wgpu::TextureViewDescriptor {
                label: Some(&desc.label),
                dimension: Some(match desc.kind {
                    TextureKind::D2 => wgpu::TextureViewDimension::D2,
                    TextureKind::Cube => wgpu::TextureViewDimension::Cube,
                }),
                usage: Some(wgpu::TextureUsages::TEXTURE_BINDING),
                ..Default::default()
            })
        });

        let texture = Texture::new(desc);
        log::trace!("wgpu: create texture {} ({format:?})", texture.label());
        self.textures.insert(
            texture.id(),
            GpuTexture {
                handle: texture.downgrade(),
                texture: gpu_texture,
                sample_view,
                format,
            },
        );
        Ok(texture)
    }

    fn write_texture(
        &mut self,
        texture: &Texture,
        level: u32,
        layer: u32,
        data: &ImageData,
    ) -> Result<()> {
        let desc = texture.desc();
        if desc.is_depth() {
            return Err(PbrError::InvalidTexture(format!(
                "{}: depth stores cannot be uploaded",
                desc.label
            )));
        }
        if level >= desc.mip_levels || layer >= desc.layer_count() {
            return Err(PbrError::InvalidMipLevel {
                level,
                levels: desc.mip_levels,
            });
        }
        let (width, height) = desc.level_size(level);
        if (data.width, data.height) != (width, height) {
            return Err(PbrError::InvalidTexture(format!(
                "{}: level {level} is {width}x{height}, got {}x{}",
                desc.label, data.width, data.height
            )));
        }

        let gpu = self.gpu(texture)?;
        let bytes = encode_pixels(gpu.format, desc, data);
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &gpu.texture,
                mip_level: level,
                origin: wgpu::Origin3d { x: 0, y: 0, z: layer },
                aspect: wgpu::TextureAspect::All,
            },
            &bytes,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * bytes_per_pixel(gpu.format)),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    fn read_texture(&mut self, texture: &Texture, level: u32, layer: u32) -> Result<ImageData> {
        let desc = texture.desc();
        if level >= desc.mip_levels || layer >= desc.layer_count() {
            return Err(PbrError::InvalidMipLevel {
                level,
                levels: desc.mip_levels,
            });
        }
        let gpu = self.gpu(texture)?;
        let (width, height) = desc.level_size(level);
        let bpp = bytes_per_pixel(gpu.format);
        let tight_bpr = width * bpp;
        let padded_bpr = align_bytes_per_row(tight_bpr);

        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Staging"),
            size: u64::from(padded_bpr) * u64::from(height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback Encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &gpu.texture,
                mip_level: level,
                origin: wgpu::Origin3d { x: 0, y: 0, z: layer },
                aspect: if desc.is_depth() {
                    wgpu::TextureAspect::DepthOnly
                } else {
                    wgpu::TextureAspect::All
                },
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bpr),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| PbrError::ReadbackFailed(e.to_string()))?;
        receiver
            .recv()
            .map_err(|_| PbrError::ReadbackFailed("map_async callback dropped".to_string()))?
            .map_err(|e| PbrError::ReadbackFailed(e.to_string()))?;

        let format = gpu.format;
        let data = slice.get_mapped_range();
        let image = ImageData::from_fn(width, height, |x, y| {
            let offset = (y * padded_bpr + x * bpp) as usize;
            decode_pixel(format, &data[offset..offset + bpp as usize])
        });
        drop(data);
        staging.unmap();
        Ok(image)
    }

    fn compile_program(&mut self, kind: ProgramKind) -> Result<()> {
        if self.programs.contains_key(&kind) {
            return Ok(());
        }
        let source = format!("{COMMON_WGSL}\n{}", program_source(kind));
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(kind.name()),
                source: wgpu::ShaderSource::Wgsl(Cow::Owned(source)),
            });

        let info = pollster::block_on(module.get_compilation_info());
        if let Some(error) = info
            .messages
            .iter()
            .find(|m| matches!(m.message_type, wgpu::CompilationMessageType::Error))
        {
            return Err(PbrError::UnknownProgram(format!(
                "{} failed to compile: {}",
                kind.name(),
                error.message
            )));
        }

        let mut entries = vec![
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
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
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ];
        for (i, slot) in kind.textures().iter().enumerate() {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: 2 + i as u32,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: match slot.kind {
                        TextureKind::D2 => wgpu::TextureViewDimension::D2,
                        TextureKind::Cube => wgpu::TextureViewDimension::Cube,
                    },
                    multisampled: false,
                },
                count: None,
            });
        }

        let bind_group_layout = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(kind.name()),
                entries: &entries,
            });
        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(kind.name()),
                bind_group_layouts: &[Some(&bind_group_layout)],
                immediate_size: 0,
            });

        log::debug!("wgpu: program {} compiled", kind.name());
        self.programs.insert(
            kind,
            CompiledProgram {
                module,
                bind_group_layout,
                pipeline_layout,
            },
        );
        Ok(())
    }

    fn clear(&mut self, target: &Attachment, depth: Option<&Texture>, color: Vec4) -> Result<()> {
        let gpu = self.gpu(&target.texture)?;
        let clear = wgpu::Color {
            r: f64::from(color.x),
            g: f64::from(color.y),
            b: f64::from(color.z),
            a: f64::from(color.w),
        };
        for layer in 0..target.texture.desc().layer_count() {
            let view = gpu.attachment_view(target.level, layer);
            self.submit_pass("Clear Pass", Some((&view, wgpu::LoadOp::Clear(clear))), None, |_| {});
        }
        if let Some(depth) = depth {
            self.clear_depth(depth)?;
        }
        Ok(())
    }

    fn clear_depth(&mut self, depth: &Texture) -> Result<()> {
        let view = self.gpu(depth)?.attachment_view(0, 0);
        self.submit_pass("Depth Clear Pass", None, Some((&view, wgpu::LoadOp::Clear(1.0))), |_| {});
        Ok(())
    }

    fn draw(&mut self, call: &DrawCall<'_>) -> Result<()> {
        let kind = call.program.kind();
        check_inputs(kind, call.inputs)?;
        let target_id = call.target.texture.id();
        if call.inputs.iter().any(|input| input.id() == target_id) {
            return Err(PbrError::FeedbackLoop(call.target.texture.label().to_string()));
        }
        let desc = call.target.texture.desc();
        if call.target.level >= desc.mip_levels || call.layer >= desc.layer_count() {
            return Err(PbrError::InvalidMipLevel {
                level: call.target.level,
                levels: desc.mip_levels,
            });
        }

        let depth = call.depth.filter(|_| kind.writes_depth());
        let format = self.gpu(&call.target.texture)?.format;
        let pipeline = self.pipeline(PipelineKey {
            kind,
            format,
            depth: depth.is_some(),
        })?;

        let uniform_bytes = uniforms::pack(call.program, call.layer, call.target.level);
        let uniform_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Program Uniforms"),
                contents: &uniform_bytes,
                usage: wgpu::BufferUsages::UNIFORM,
            });

        let mut views = Vec::with_capacity(call.inputs.len());
        for input in call.inputs {
            let view = self.gpu(input)?.sample_view.as_ref().ok_or_else(|| {
                PbrError::InvalidTexture(format!("{} cannot be sampled", input.label()))
            })?;
            views.push(view);
        }

        let program = self
            .programs
            .get(&kind)
            .ok_or_else(|| PbrError::UnknownProgram(kind.name().to_string()))?;
        let mut entries = vec![
            wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(&self.sampler),
            },
        ];
        for (i, view) in views.iter().enumerate() {
            entries.push(wgpu::BindGroupEntry {
                binding: 2 + i as u32,
                resource: wgpu::BindingResource::TextureView(view),
            });
        }
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(kind.name()),
            layout: &program.bind_group_layout,
            entries: &entries,
        });

        let color_view = self
            .gpu(&call.target.texture)?
            .attachment_view(call.target.level, call.layer);
        let depth_view = match depth {
            Some(depth) => Some(self.gpu(depth)?.attachment_view(0, 0)),
            None => None,
        };

        self.submit_pass(
            kind.name(),
            Some((&color_view, wgpu::LoadOp::Load)),
            depth_view.as_ref().map(|view| (view, wgpu::LoadOp::Load)),
            |pass| {
                pass.set_pipeline(&pipeline);
                pass.set_bind_group(0, &bind_group, &[]);
                pass.draw(0..3, 0..1);
            },
        );
        log::trace!(
            "wgpu: {} -> {} (level {}, layer {})",
            kind.name(),
            call.target.texture.label(),
            call.target.level,
            call.layer
        );
        Ok(())
    }

    fn prune(&mut self) -> usize {
        let before = self.textures.len();
        self.textures
            .retain(|_, gpu| gpu.handle.strong_count() > 0);
        before - self.textures.len()
    }
}
