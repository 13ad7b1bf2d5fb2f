//! Native wgpu objects behind device handles.
//!
//! Shader bind group convention (WGSL side):
//! - `@group(0)`: vertex stage uniform blocks, `@binding(ub_index)`
//! - `@group(1)`: fragment stage uniform blocks, `@binding(ub_index)`
//! - `@group(2)`: vertex stage images, texture at `@binding(2 * slot)`,
//!   sampler at `@binding(2 * slot + 1)`
//! - `@group(3)`: fragment stage images, same layout
//!
//! Vertex attribute `n` of a pipeline layout is `@location(n)`.

use std::collections::HashMap;
use std::num::NonZeroU64;

use wgpu::util::DeviceExt;

use crate::gfx::config::{MAX_SHADERSTAGE_BUFFERS, NUM_SHADER_STAGES};
use crate::gfx::desc::{BufferDesc, ImageData, ImageDesc, PassDesc, PipelineDesc, ShaderDesc};
use crate::gfx::error::BackendError;
use crate::gfx::id::{Image, ResourceKind};
use crate::gfx::types::{BufferType, Filter, ImageType, PixelFormat, ShaderStage, Wrap};

use super::convert;

fn native(err: impl std::fmt::Display) -> BackendError {
    BackendError::Native(err.to_string())
}

// ── buffers ───────────────────────────────────────────────────────────────

pub(crate) struct GpuBuffer {
    pub buffer: wgpu::Buffer,
}

pub(crate) fn create_buffer(device: &wgpu::Device, desc: &BufferDesc<'_>) -> GpuBuffer {
    let usage = match desc.buffer_type {
        BufferType::Vertex => wgpu::BufferUsages::VERTEX,
        BufferType::Index => wgpu::BufferUsages::INDEX,
    } | wgpu::BufferUsages::COPY_DST;

    let buffer = match desc.data {
        Some(contents) => device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: desc.label,
            contents,
            usage,
        }),
        None => device.create_buffer(&wgpu::BufferDescriptor {
            label: desc.label,
            size: desc.size.next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT as usize) as u64,
            usage,
            mapped_at_creation: false,
        }),
    };
    GpuBuffer { buffer }
}

/// Writes `data` at `offset`, padding the tail to the copy alignment.
pub(crate) fn write_buffer(queue: &wgpu::Queue, buffer: &wgpu::Buffer, offset: usize, data: &[u8]) {
    if data.is_empty() {
        return;
    }
    let align = wgpu::COPY_BUFFER_ALIGNMENT as usize;
    if data.len() % align == 0 {
        queue.write_buffer(buffer, offset as u64, data);
    } else {
        let mut padded = data.to_vec();
        padded.resize(data.len().next_multiple_of(align), 0);
        queue.write_buffer(buffer, offset as u64, &padded);
    }
}

// ── images ────────────────────────────────────────────────────────────────

pub(crate) struct GpuImage {
    pub texture: wgpu::Texture,
    /// Sampling view; `None` for depth render targets.
    pub view: Option<wgpu::TextureView>,
    pub sampler: Option<wgpu::Sampler>,
    pub image_type: ImageType,
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub num_slices: u32,
    pub num_mipmaps: u32,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
struct SamplerKey {
    min_filter: Filter,
    mag_filter: Filter,
    wrap: [Wrap; 3],
    border: crate::gfx::types::BorderColor,
    anisotropy: u16,
    lod: [u32; 2],
}

/// Shares identical samplers between images, up to a fixed number.
pub(crate) struct SamplerCache {
    samplers: HashMap<SamplerKey, wgpu::Sampler>,
    capacity: usize,
    clamp_to_border: bool,
}

impl SamplerCache {
    pub fn new(capacity: usize, clamp_to_border: bool) -> Self {
        Self {
            samplers: HashMap::new(),
            capacity,
            clamp_to_border,
        }
    }

    pub fn get(&mut self, device: &wgpu::Device, desc: &ImageDesc<'_>) -> wgpu::Sampler {
        let filterable = desc.pixel_format.info().filter;
        let (min_filter, mag_filter) = if filterable {
            (desc.min_filter, desc.mag_filter)
        } else {
            (Filter::Nearest, Filter::Nearest)
        };
        let all_linear = min_filter == Filter::LinearMipmapLinear && mag_filter == Filter::Linear;
        let key = SamplerKey {
            min_filter,
            mag_filter,
            wrap: [desc.wrap_u, desc.wrap_v, desc.wrap_w],
            border: desc.border_color,
            anisotropy: if all_linear {
                desc.max_anisotropy.clamp(1, 16) as u16
            } else {
                1
            },
            lod: [desc.min_lod.to_bits(), desc.max_lod.min(32.0).to_bits()],
        };
        if let Some(sampler) = self.samplers.get(&key) {
            return sampler.clone();
        }

        let (min, mipmap) = convert::min_filter(key.min_filter);
        let border = key.wrap.contains(&Wrap::ClampToBorder) && self.clamp_to_border;
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("tessera sampler"),
            address_mode_u: convert::address_mode(key.wrap[0], self.clamp_to_border),
            address_mode_v: convert::address_mode(key.wrap[1], self.clamp_to_border),
            address_mode_w: convert::address_mode(key.wrap[2], self.clamp_to_border),
            mag_filter: convert::mag_filter(key.mag_filter),
            min_filter: min,
            mipmap_filter: mipmap,
            lod_min_clamp: desc.min_lod,
            lod_max_clamp: desc.max_lod.min(32.0),
            compare: None,
            anisotropy_clamp: key.anisotropy,
            border_color: border.then(|| convert::border_color(key.border)),
        });

        if self.samplers.len() < self.capacity {
            self.samplers.insert(key, sampler.clone());
        } else {
            log::debug!("sampler cache full ({}), sampler not shared", self.capacity);
        }
        sampler
    }
}

fn texture_layers(desc: &ImageDesc<'_>) -> (wgpu::TextureDimension, u32) {
    match desc.image_type {
        ImageType::D2 => (wgpu::TextureDimension::D2, 1),
        ImageType::Cube | ImageType::Array => (wgpu::TextureDimension::D2, desc.num_slices),
        ImageType::D3 => (wgpu::TextureDimension::D3, desc.num_slices),
    }
}

pub(crate) fn create_image(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    samplers: &mut SamplerCache,
    desc: &ImageDesc<'_>,
) -> Result<GpuImage, BackendError> {
    if desc.sample_count > 1 {
        return Err(BackendError::Unsupported(
            "multisampled images are not supported by the wgpu backend".into(),
        ));
    }
    let format = convert::texture_format(desc.pixel_format)
        .ok_or_else(|| BackendError::Unsupported(format!("{:?}", desc.pixel_format)))?;
    let depth = desc.pixel_format.is_depth();

    // Depth formats are attachment-only; depth24plus cannot be copied into.
    let mut usage = if depth {
        wgpu::TextureUsages::empty()
    } else {
        wgpu::TextureUsages::COPY_DST | wgpu::TextureUsages::TEXTURE_BINDING
    };
    if desc.render_target {
        usage |= wgpu::TextureUsages::RENDER_ATTACHMENT;
    }

    let (dimension, layers) = texture_layers(desc);
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: desc.label,
        size: wgpu::Extent3d {
            width: desc.width,
            height: desc.height,
            depth_or_array_layers: layers,
        },
        mip_level_count: desc.num_mipmaps,
        sample_count: 1,
        dimension,
        format,
        usage,
        view_formats: &[],
    });

    let (view, sampler) = if depth {
        (None, None)
    } else {
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: desc.label,
            dimension: Some(convert::view_dimension(desc.image_type)),
            ..Default::default()
        });
        (Some(view), Some(samplers.get(device, desc)))
    };

    let image = GpuImage {
        texture,
        view,
        sampler,
        image_type: desc.image_type,
        format: desc.pixel_format,
        width: desc.width,
        height: desc.height,
        num_slices: desc.num_slices,
        num_mipmaps: desc.num_mipmaps,
    };
    if !desc.data.is_empty() {
        write_image(queue, &image, &desc.data);
    }
    Ok(image)
}

/// Uploads every non-empty subimage of `data`.
pub(crate) fn write_image(queue: &wgpu::Queue, image: &GpuImage, data: &ImageData<'_>) {
    let faces = if image.image_type == ImageType::Cube { 6 } else { 1 };
    let bpp = image.format.bytes_per_pixel() as u32;
    for face in 0..faces {
        for mip in 0..image.num_mipmaps {
            let bytes = data.subimages[face][mip as usize];
            if bytes.is_empty() {
                continue;
            }
            let width = (image.width >> mip).max(1);
            let height = (image.height >> mip).max(1);
            let depth = match image.image_type {
                ImageType::D2 | ImageType::Cube => 1,
                ImageType::Array => image.num_slices,
                ImageType::D3 => (image.num_slices >> mip).max(1),
            };
            queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &image.texture,
                    mip_level: mip,
                    origin: wgpu::Origin3d {
                        x: 0,
                        y: 0,
                        z: face as u32,
                    },
                    aspect: wgpu::TextureAspect::All,
                },
                bytes,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(width * bpp),
                    rows_per_image: Some(height),
                },
                wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: depth,
                },
            );
        }
    }
}

// ── shaders ───────────────────────────────────────────────────────────────

pub(crate) struct GpuStage {
    pub module: wgpu::ShaderModule,
    pub entry: String,
    /// Declared uniform block sizes, rounded to 16 bytes.
    pub ub_sizes: Vec<u64>,
    pub image_layout: wgpu::BindGroupLayout,
    pub image_types: Vec<crate::gfx::types::SamplerType>,
}

pub(crate) struct GpuShader {
    pub stages: [GpuStage; NUM_SHADER_STAGES],
    pub ub_layouts: [wgpu::BindGroupLayout; NUM_SHADER_STAGES],
    /// Uniform bind groups over the shared uniform buffer.
    pub ub_groups: [wgpu::BindGroup; NUM_SHADER_STAGES],
    /// Bound for stages that declare no images.
    pub empty_images: [wgpu::BindGroup; NUM_SHADER_STAGES],
}

fn create_stage(
    device: &wgpu::Device,
    desc: &ShaderDesc<'_>,
    stage: ShaderStage,
) -> Result<GpuStage, BackendError> {
    let s = desc.stage(stage);
    // wgpu reports WGSL errors through the uncaptured error handler, so
    // check for the entry point up front.
    if !s.source.contains(&format!("fn {}", s.entry)) {
        return Err(native(format!(
            "{stage} shader has no entry point `{}`",
            s.entry
        )));
    }
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: desc.label,
        source: wgpu::ShaderSource::Wgsl(s.source.into()),
    });

    let ub_sizes: Vec<u64> = s
        .uniform_blocks
        .iter()
        .take_while(|ub| ub.size > 0)
        .map(|ub| ub.size.next_multiple_of(16) as u64)
        .collect();

    let declared: Vec<_> = s
        .images
        .iter()
        .map_while(|img| img.image_type.map(|t| (t, img.sampler_type)))
        .collect();
    let visibility = convert::shader_stage(stage);
    let entries: Vec<wgpu::BindGroupLayoutEntry> = declared
        .iter()
        .enumerate()
        .flat_map(|(slot, &(image_type, sampler_type))| {
            [
                wgpu::BindGroupLayoutEntry {
                    binding: 2 * slot as u32,
                    visibility,
                    ty: wgpu::BindingType::Texture {
                        sample_type: convert::sample_type(sampler_type),
                        view_dimension: convert::view_dimension(image_type),
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2 * slot as u32 + 1,
                    visibility,
                    ty: wgpu::BindingType::Sampler(convert::sampler_binding(sampler_type)),
                    count: None,
                },
            ]
        })
        .collect();
    let image_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("tessera image bgl"),
        entries: &entries,
    });

    Ok(GpuStage {
        module,
        entry: s.entry.to_owned(),
        ub_sizes,
        image_layout,
        image_types: declared.iter().map(|&(_, st)| st).collect(),
    })
}

pub(crate) fn create_shader(
    device: &wgpu::Device,
    uniform_buffer: &wgpu::Buffer,
    desc: &ShaderDesc<'_>,
) -> Result<GpuShader, BackendError> {
    let stages = [
        create_stage(device, desc, ShaderStage::Vertex)?,
        create_stage(device, desc, ShaderStage::Fragment)?,
    ];

    let ub_layout = |stage: ShaderStage| {
        let entries: Vec<_> = stages[stage.index()]
            .ub_sizes
            .iter()
            .enumerate()
            .map(|(i, &size)| wgpu::BindGroupLayoutEntry {
                binding: i as u32,
                visibility: convert::shader_stage(stage),
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: NonZeroU64::new(size),
                },
                count: None,
            })
            .collect();
        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("tessera uniform bgl"),
            entries: &entries,
        })
    };
    let ub_layouts = [ub_layout(ShaderStage::Vertex), ub_layout(ShaderStage::Fragment)];

    let ub_group = |stage: ShaderStage| {
        let entries: Vec<_> = stages[stage.index()]
            .ub_sizes
            .iter()
            .enumerate()
            .map(|(i, &size)| wgpu::BindGroupEntry {
                binding: i as u32,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: uniform_buffer,
                    offset: 0,
                    size: NonZeroU64::new(size),
                }),
            })
            .collect();
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("tessera uniform bind group"),
            layout: &ub_layouts[stage.index()],
            entries: &entries,
        })
    };
    let ub_groups = [ub_group(ShaderStage::Vertex), ub_group(ShaderStage::Fragment)];

    let empty = |stage: ShaderStage| {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("tessera empty image bind group"),
            layout: &stages[stage.index()].image_layout,
            entries: &[],
        })
    };
    let empty_images = [empty(ShaderStage::Vertex), empty(ShaderStage::Fragment)];

    Ok(GpuShader {
        stages,
        ub_layouts,
        ub_groups,
        empty_images,
    })
}

/// Bind group for the images a stage declares.
pub(crate) fn image_bind_group(
    device: &wgpu::Device,
    stage: &GpuStage,
    images: &[Option<&GpuImage>],
) -> Result<wgpu::BindGroup, BackendError> {
    let mut entries = Vec::with_capacity(2 * stage.image_types.len());
    for slot in 0..stage.image_types.len() {
        let image = images
            .get(slot)
            .copied()
            .flatten()
            .ok_or(BackendError::Missing(ResourceKind::Image))?;
        let (Some(view), Some(sampler)) = (&image.view, &image.sampler) else {
            return Err(BackendError::Missing(ResourceKind::Image));
        };
        entries.push(wgpu::BindGroupEntry {
            binding: 2 * slot as u32,
            resource: wgpu::BindingResource::TextureView(view),
        });
        entries.push(wgpu::BindGroupEntry {
            binding: 2 * slot as u32 + 1,
            resource: wgpu::BindingResource::Sampler(sampler),
        });
    }
    Ok(device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("tessera image bind group"),
        layout: &stage.image_layout,
        entries: &entries,
    }))
}

// ── pipelines ─────────────────────────────────────────────────────────────

pub(crate) struct GpuPipeline {
    pub pipeline: wgpu::RenderPipeline,
    pub shader: crate::gfx::id::Shader,
    pub index_format: Option<wgpu::IndexFormat>,
    pub stencil_ref: u32,
    pub blend_color: wgpu::Color,
}

pub(crate) fn create_pipeline(
    device: &wgpu::Device,
    shader: &GpuShader,
    desc: &PipelineDesc<'_>,
) -> Result<GpuPipeline, BackendError> {
    if desc.rasterizer.sample_count > 1 {
        return Err(BackendError::Unsupported(
            "multisampled pipelines are not supported by the wgpu backend".into(),
        ));
    }

    let mut attributes: [Vec<wgpu::VertexAttribute>; MAX_SHADERSTAGE_BUFFERS] = Default::default();
    for (location, attr) in desc.layout.active_attrs() {
        let format = convert::vertex_format(attr.format)
            .ok_or_else(|| native(format!("vertex attribute {location} has no format")))?;
        attributes[attr.buffer_index].push(wgpu::VertexAttribute {
            format,
            offset: attr.offset as u64,
            shader_location: location as u32,
        });
    }
    let used = desc.layout.used_buffers();
    let buffer_count = used.iter().rposition(|&u| u).map_or(0, |i| i + 1);
    let buffers: Vec<wgpu::VertexBufferLayout<'_>> = (0..buffer_count)
        .map(|i| {
            let layout = &desc.layout.buffers[i];
            wgpu::VertexBufferLayout {
                array_stride: if used[i] { layout.stride as u64 } else { 0 },
                step_mode: convert::step_mode(layout.step_func),
                attributes: &attributes[i],
            }
        })
        .collect();

    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: desc.label,
        bind_group_layouts: &[
            &shader.ub_layouts[0],
            &shader.ub_layouts[1],
            &shader.stages[0].image_layout,
            &shader.stages[1].image_layout,
        ],
        immediate_size: 0,
    });

    let blend = &desc.blend;
    let color_format = convert::texture_format(blend.color_format)
        .ok_or_else(|| native(format!("{:?} is not a color format", blend.color_format)))?;
    let target = wgpu::ColorTargetState {
        format: color_format,
        blend: blend.enabled.then(|| wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: convert::blend_factor(blend.src_factor_rgb),
                dst_factor: convert::blend_factor(blend.dst_factor_rgb),
                operation: convert::blend_op(blend.op_rgb),
            },
            alpha: wgpu::BlendComponent {
                src_factor: convert::blend_factor(blend.src_factor_alpha),
                dst_factor: convert::blend_factor(blend.dst_factor_alpha),
                operation: convert::blend_op(blend.op_alpha),
            },
        }),
        write_mask: wgpu::ColorWrites::from_bits_truncate(blend.color_write_mask.bits() as u32),
    };
    let targets = vec![Some(target); blend.color_count];

    let ds = &desc.depth_stencil;
    let stencil_face = |s: &crate::gfx::desc::StencilState| wgpu::StencilFaceState {
        compare: convert::compare(s.compare),
        fail_op: convert::stencil_op(s.fail_op),
        depth_fail_op: convert::stencil_op(s.depth_fail_op),
        pass_op: convert::stencil_op(s.pass_op),
    };
    let depth_stencil = convert::texture_format(blend.depth_format).map(|format| {
        let (front, back, read_mask, write_mask) = if ds.stencil_enabled {
            (
                stencil_face(&ds.stencil_front),
                stencil_face(&ds.stencil_back),
                ds.stencil_read_mask as u32,
                ds.stencil_write_mask as u32,
            )
        } else {
            (
                wgpu::StencilFaceState::IGNORE,
                wgpu::StencilFaceState::IGNORE,
                0,
                0,
            )
        };
        wgpu::DepthStencilState {
            format,
            depth_write_enabled: ds.depth_write_enabled,
            depth_compare: convert::compare(ds.depth_compare),
            stencil: wgpu::StencilState {
                front,
                back,
                read_mask,
                write_mask,
            },
            bias: wgpu::DepthBiasState {
                constant: desc.rasterizer.depth_bias as i32,
                slope_scale: desc.rasterizer.depth_bias_slope_scale,
                clamp: desc.rasterizer.depth_bias_clamp,
            },
        }
    });

    let index_format = convert::index_format(desc.index_type);
    let topology = convert::topology(desc.primitive_type);
    let vs = &shader.stages[0];
    let fs = &shader.stages[1];
    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: desc.label,
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: &vs.module,
            entry_point: Some(vs.entry.as_str()),
            compilation_options: Default::default(),
            buffers: &buffers,
        },
        fragment: Some(wgpu::FragmentState {
            module: &fs.module,
            entry_point: Some(fs.entry.as_str()),
            compilation_options: Default::default(),
            targets: &targets,
        }),
        primitive: wgpu::PrimitiveState {
            topology,
            strip_index_format: if topology.is_strip() { index_format } else { None },
            front_face: convert::front_face(desc.rasterizer.face_winding),
            cull_mode: convert::cull_mode(desc.rasterizer.cull_mode),
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil,
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: desc.rasterizer.alpha_to_coverage_enabled,
        },
        multiview_mask: None,
        cache: None,
    });

    Ok(GpuPipeline {
        pipeline,
        shader: desc.shader,
        index_format,
        stencil_ref: ds.stencil_ref as u32,
        blend_color: convert::color(blend.blend_color),
    })
}

// ── passes ────────────────────────────────────────────────────────────────

pub(crate) struct GpuAttachment {
    pub view: wgpu::TextureView,
    /// Depth slice for 3D color attachments.
    pub depth_slice: Option<u32>,
}

pub(crate) struct GpuPass {
    pub colors: Vec<GpuAttachment>,
    pub depth: Option<GpuAttachment>,
    pub depth_has_stencil: bool,
}

pub(crate) fn create_pass(
    images: &HashMap<Image, GpuImage>,
    desc: &PassDesc<'_>,
) -> Result<GpuPass, BackendError> {
    let attachment = |att: &crate::gfx::desc::AttachmentDesc| {
        let image = images
            .get(&att.image)
            .ok_or(BackendError::Missing(ResourceKind::Image))?;
        let is_3d = image.image_type == ImageType::D3;
        let view = image.texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("tessera pass attachment"),
            dimension: Some(if is_3d {
                wgpu::TextureViewDimension::D3
            } else {
                wgpu::TextureViewDimension::D2
            }),
            base_mip_level: att.mip_level,
            mip_level_count: Some(1),
            base_array_layer: if is_3d { 0 } else { att.slice },
            array_layer_count: Some(1),
            ..Default::default()
        });
        Ok::<_, BackendError>(GpuAttachment {
            view,
            depth_slice: is_3d.then_some(att.slice),
        })
    };

    let colors = desc.color_attachments[..desc.color_count()]
        .iter()
        .map(attachment)
        .collect::<Result<Vec<_>, _>>()?;

    let ds = &desc.depth_stencil_attachment;
    let (depth, depth_has_stencil) = match images.get(&ds.image) {
        Some(image) => (Some(attachment(ds)?), image.format.has_stencil()),
        None => (None, false),
    };

    Ok(GpuPass {
        colors,
        depth,
        depth_has_stencil,
    })
}
