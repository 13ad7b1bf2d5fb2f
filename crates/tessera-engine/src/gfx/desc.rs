//! Resource descriptors.
//!
//! Descriptors are flat, `Default`-able records. Callers override the fields
//! they care about with struct-update syntax and leave the rest at their
//! zero value, which `resolved` turns into the documented default:
//!
//! ```
//! use tessera_engine::gfx::{BufferDesc, BufferType, Usage};
//!
//! let indices: [u16; 3] = [0, 1, 2];
//! let desc = BufferDesc {
//!     buffer_type: BufferType::Index,
//!     data: Some(bytemuck::cast_slice(&indices)),
//!     ..Default::default()
//! };
//! let resolved = desc.resolved();
//! assert_eq!(resolved.size, 6);
//! assert_eq!(resolved.usage, Usage::Immutable);
//! ```

use super::backend::DefaultFormats;
use super::config::{
    MAX_COLOR_ATTACHMENTS, MAX_MIPMAPS, MAX_SHADERSTAGE_BUFFERS, MAX_SHADERSTAGE_IMAGES,
    MAX_SHADERSTAGE_UBS, MAX_UB_MEMBERS, MAX_VERTEX_ATTRIBUTES, NUM_CUBE_FACES,
};
use super::id::{Image, ResourceId, Shader};
use super::types::{
    BlendFactor, BlendOp, BorderColor, BufferType, Color, ColorMask, CompareFunc, CullMode,
    FaceWinding, Filter, ImageType, IndexType, PixelFormat, PrimitiveType, SamplerType,
    ShaderStage, StencilOp, UniformType, Usage, VertexFormat, VertexStep, Wrap,
};

// ── buffers ───────────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, Default)]
pub struct BufferDesc<'a> {
    /// Size in bytes. 0 takes the length of `data`.
    pub size: usize,
    pub buffer_type: BufferType,
    pub usage: Usage,
    /// Required for immutable buffers, forbidden otherwise.
    pub data: Option<&'a [u8]>,
    pub label: Option<&'a str>,
}

impl<'a> BufferDesc<'a> {
    pub fn resolved(&self) -> Self {
        let mut desc = *self;
        if desc.size == 0 {
            desc.size = desc.data.map_or(0, <[u8]>::len);
        }
        desc
    }
}

// ── images ────────────────────────────────────────────────────────────────

/// Initial or streamed image content, indexed by `[face][mip]`.
///
/// 2D, 3D and array images use face 0; for 3D and array images one subimage
/// holds every slice of that mip level.
#[derive(Debug, Copy, Clone, Default)]
pub struct ImageData<'a> {
    pub subimages: [[&'a [u8]; MAX_MIPMAPS]; NUM_CUBE_FACES],
}

impl<'a> ImageData<'a> {
    /// Content for a single-face, single-mip image.
    pub fn new(data: &'a [u8]) -> Self {
        let mut content = Self::default();
        content.subimages[0][0] = data;
        content
    }

    pub fn is_empty(&self) -> bool {
        self.subimages.iter().flatten().all(|s| s.is_empty())
    }
}

#[derive(Debug, Copy, Clone)]
pub struct ImageDesc<'a> {
    pub image_type: ImageType,
    pub render_target: bool,
    pub width: u32,
    pub height: u32,
    /// Depth for 3D images, layer count for arrays. 0 means 1.
    pub num_slices: u32,
    /// 0 means 1.
    pub num_mipmaps: u32,
    pub usage: Usage,
    /// `Default` means `Rgba8`.
    pub pixel_format: PixelFormat,
    /// 0 means 1.
    pub sample_count: u32,
    pub min_filter: Filter,
    pub mag_filter: Filter,
    pub wrap_u: Wrap,
    pub wrap_v: Wrap,
    pub wrap_w: Wrap,
    pub border_color: BorderColor,
    /// 0 means 1.
    pub max_anisotropy: u32,
    pub min_lod: f32,
    /// 0.0 means unlimited.
    pub max_lod: f32,
    pub data: ImageData<'a>,
    pub label: Option<&'a str>,
}

impl Default for ImageDesc<'_> {
    fn default() -> Self {
        Self {
            image_type: ImageType::D2,
            render_target: false,
            width: 0,
            height: 0,
            num_slices: 0,
            num_mipmaps: 0,
            usage: Usage::Immutable,
            pixel_format: PixelFormat::Default,
            sample_count: 0,
            min_filter: Filter::Nearest,
            mag_filter: Filter::Nearest,
            wrap_u: Wrap::Repeat,
            wrap_v: Wrap::Repeat,
            wrap_w: Wrap::Repeat,
            border_color: BorderColor::TransparentBlack,
            max_anisotropy: 0,
            min_lod: 0.0,
            max_lod: 0.0,
            data: ImageData::default(),
            label: None,
        }
    }
}

impl<'a> ImageDesc<'a> {
    pub fn resolved(&self) -> Self {
        fn or(v: u32, d: u32) -> u32 {
            if v == 0 { d } else { v }
        }

        let mut desc = *self;
        desc.num_slices = match desc.image_type {
            ImageType::Cube => NUM_CUBE_FACES as u32,
            _ => or(desc.num_slices, 1),
        };
        desc.num_mipmaps = or(desc.num_mipmaps, 1);
        desc.sample_count = or(desc.sample_count, 1);
        desc.max_anisotropy = or(desc.max_anisotropy, 1);
        if desc.max_lod == 0.0 {
            desc.max_lod = f32::MAX;
        }
        if desc.pixel_format == PixelFormat::Default {
            desc.pixel_format = PixelFormat::Rgba8;
        }
        desc
    }

    pub fn num_faces(&self) -> usize {
        if self.image_type == ImageType::Cube { NUM_CUBE_FACES } else { 1 }
    }

    /// Byte size of one subimage (`[face][mip]` entry) of a resolved descriptor.
    pub fn subimage_size(&self, mip: u32) -> usize {
        let w = (self.width >> mip).max(1) as usize;
        let h = (self.height >> mip).max(1) as usize;
        let slices = match self.image_type {
            ImageType::D3 => (self.num_slices >> mip).max(1) as usize,
            ImageType::Array => self.num_slices as usize,
            ImageType::D2 | ImageType::Cube => 1,
        };
        w * h * slices * self.pixel_format.bytes_per_pixel()
    }
}

// ── shaders ───────────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, Default)]
pub struct UniformDesc<'a> {
    pub name: &'a str,
    pub uniform_type: UniformType,
    /// 0 means 1.
    pub array_count: usize,
}

/// A uniform block. Unused slots have `size == 0`.
#[derive(Debug, Copy, Clone, Default)]
pub struct UniformBlockDesc<'a> {
    pub size: usize,
    /// Optional member layout; when present the members must fit into `size`.
    pub uniforms: [UniformDesc<'a>; MAX_UB_MEMBERS],
}

impl UniformBlockDesc<'_> {
    pub fn sized(size: usize) -> Self {
        Self {
            size,
            ..Default::default()
        }
    }
}

/// A sampled image slot. Unused slots have `image_type == None`.
#[derive(Debug, Copy, Clone, Default)]
pub struct ShaderImageDesc<'a> {
    pub name: &'a str,
    pub image_type: Option<ImageType>,
    pub sampler_type: SamplerType,
}

impl ShaderImageDesc<'_> {
    pub fn of(image_type: ImageType) -> Self {
        Self {
            image_type: Some(image_type),
            ..Default::default()
        }
    }
}

#[derive(Debug, Copy, Clone, Default)]
pub struct ShaderStageDesc<'a> {
    /// Backend source text, passed through unparsed.
    pub source: &'a str,
    /// Entry point, empty means `"main"`.
    pub entry: &'a str,
    pub uniform_blocks: [UniformBlockDesc<'a>; MAX_SHADERSTAGE_UBS],
    pub images: [ShaderImageDesc<'a>; MAX_SHADERSTAGE_IMAGES],
}

#[derive(Debug, Copy, Clone, Default)]
pub struct ShaderDesc<'a> {
    pub vs: ShaderStageDesc<'a>,
    pub fs: ShaderStageDesc<'a>,
    pub label: Option<&'a str>,
}

impl<'a> ShaderDesc<'a> {
    pub fn stage(&self, stage: ShaderStage) -> &ShaderStageDesc<'a> {
        match stage {
            ShaderStage::Vertex => &self.vs,
            ShaderStage::Fragment => &self.fs,
        }
    }

    pub fn resolved(&self) -> Self {
        let mut desc = *self;
        for stage in [&mut desc.vs, &mut desc.fs] {
            if stage.entry.is_empty() {
                stage.entry = "main";
            }
        }
        desc
    }
}

// ── pipelines ─────────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct BufferLayoutDesc {
    /// 0 computes the stride from the attributes using this buffer.
    pub stride: usize,
    pub step_func: VertexStep,
    /// 0 means 1.
    pub step_rate: u32,
}

#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct VertexAttrDesc {
    pub buffer_index: usize,
    pub offset: usize,
    /// `Invalid` terminates the attribute list.
    pub format: VertexFormat,
}

#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct LayoutDesc {
    pub buffers: [BufferLayoutDesc; MAX_SHADERSTAGE_BUFFERS],
    pub attrs: [VertexAttrDesc; MAX_VERTEX_ATTRIBUTES],
}

impl LayoutDesc {
    /// Attributes up to the first `Invalid` format.
    pub fn active_attrs(&self) -> impl Iterator<Item = (usize, &VertexAttrDesc)> {
        self.attrs
            .iter()
            .enumerate()
            .take_while(|(_, a)| a.format != VertexFormat::Invalid)
    }

    /// Which vertex buffer slots are referenced by at least one attribute.
    pub fn used_buffers(&self) -> [bool; MAX_SHADERSTAGE_BUFFERS] {
        let mut used = [false; MAX_SHADERSTAGE_BUFFERS];
        for (_, attr) in self.active_attrs() {
            if let Some(u) = used.get_mut(attr.buffer_index) {
                *u = true;
            }
        }
        used
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct StencilState {
    pub fail_op: StencilOp,
    pub depth_fail_op: StencilOp,
    pub pass_op: StencilOp,
    pub compare: CompareFunc,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DepthStencilState {
    pub stencil_front: StencilState,
    pub stencil_back: StencilState,
    pub depth_compare: CompareFunc,
    pub depth_write_enabled: bool,
    pub stencil_enabled: bool,
    pub stencil_read_mask: u8,
    pub stencil_write_mask: u8,
    pub stencil_ref: u8,
}

impl Default for DepthStencilState {
    fn default() -> Self {
        Self {
            stencil_front: StencilState::default(),
            stencil_back: StencilState::default(),
            depth_compare: CompareFunc::Always,
            depth_write_enabled: false,
            stencil_enabled: false,
            stencil_read_mask: 0xFF,
            stencil_write_mask: 0xFF,
            stencil_ref: 0,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct BlendState {
    pub enabled: bool,
    pub src_factor_rgb: BlendFactor,
    pub dst_factor_rgb: BlendFactor,
    pub op_rgb: BlendOp,
    pub src_factor_alpha: BlendFactor,
    pub dst_factor_alpha: BlendFactor,
    pub op_alpha: BlendOp,
    pub color_write_mask: ColorMask,
    /// 0 means 1.
    pub color_count: usize,
    /// `Default` takes the default framebuffer's color format.
    pub color_format: PixelFormat,
    /// `Default` takes the default framebuffer's depth format; `None` disables depth.
    pub depth_format: PixelFormat,
    pub blend_color: Color,
}

impl Default for BlendState {
    fn default() -> Self {
        Self {
            enabled: false,
            src_factor_rgb: BlendFactor::One,
            dst_factor_rgb: BlendFactor::Zero,
            op_rgb: BlendOp::Add,
            src_factor_alpha: BlendFactor::One,
            dst_factor_alpha: BlendFactor::Zero,
            op_alpha: BlendOp::Add,
            color_write_mask: ColorMask::RGBA,
            color_count: 0,
            color_format: PixelFormat::Default,
            depth_format: PixelFormat::Default,
            blend_color: Color::TRANSPARENT,
        }
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct RasterizerState {
    pub alpha_to_coverage_enabled: bool,
    pub cull_mode: CullMode,
    pub face_winding: FaceWinding,
    /// 0 takes the default framebuffer's sample count.
    pub sample_count: u32,
    pub depth_bias: f32,
    pub depth_bias_slope_scale: f32,
    pub depth_bias_clamp: f32,
}

#[derive(Debug, Copy, Clone, Default)]
pub struct PipelineDesc<'a> {
    pub layout: LayoutDesc,
    pub shader: Shader,
    pub primitive_type: PrimitiveType,
    pub index_type: IndexType,
    pub depth_stencil: DepthStencilState,
    pub blend: BlendState,
    pub rasterizer: RasterizerState,
    pub label: Option<&'a str>,
}

impl<'a> PipelineDesc<'a> {
    /// Fills in computed strides and offsets and default formats.
    pub fn resolved(&self, defaults: DefaultFormats) -> Self {
        let mut desc = *self;

        let auto_offset = desc.layout.active_attrs().all(|(_, a)| a.offset == 0);
        let mut next_offset = [0usize; MAX_SHADERSTAGE_BUFFERS];
        for attr in desc
            .layout
            .attrs
            .iter_mut()
            .take_while(|a| a.format != VertexFormat::Invalid)
        {
            let Some(end) = next_offset.get_mut(attr.buffer_index) else {
                continue;
            };
            if auto_offset {
                attr.offset = *end;
            }
            *end = (*end).max(attr.offset + attr.format.byte_size());
        }
        for (buf, end) in desc.layout.buffers.iter_mut().zip(next_offset) {
            if buf.stride == 0 {
                buf.stride = end;
            }
            if buf.step_rate == 0 {
                buf.step_rate = 1;
            }
        }

        if desc.blend.color_count == 0 {
            desc.blend.color_count = 1;
        }
        if desc.blend.color_format == PixelFormat::Default {
            desc.blend.color_format = defaults.color;
        }
        if desc.blend.depth_format == PixelFormat::Default {
            desc.blend.depth_format = defaults.depth;
        }
        if desc.rasterizer.sample_count == 0 {
            desc.rasterizer.sample_count = defaults.sample_count;
        }
        desc
    }
}

// ── passes ────────────────────────────────────────────────────────────────

/// One pass attachment. `image == Image::INVALID` marks an unused slot.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct AttachmentDesc {
    pub image: Image,
    pub mip_level: u32,
    /// Cube face, array layer or 3D depth slice.
    pub slice: u32,
}

#[derive(Debug, Copy, Clone, Default)]
pub struct PassDesc<'a> {
    pub color_attachments: [AttachmentDesc; MAX_COLOR_ATTACHMENTS],
    pub depth_stencil_attachment: AttachmentDesc,
    pub label: Option<&'a str>,
}

impl PassDesc<'_> {
    pub fn color_count(&self) -> usize {
        self.color_attachments
            .iter()
            .take_while(|a| !a.image.is_invalid())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formats() -> DefaultFormats {
        DefaultFormats {
            color: PixelFormat::Bgra8,
            depth: PixelFormat::DepthStencil,
            sample_count: 1,
        }
    }

    // ── buffers ───────────────────────────────────────────────────────────

    #[test]
    fn buffer_size_defaults_to_data_len() {
        let data = [0u8; 12];
        let desc = BufferDesc {
            data: Some(&data),
            ..Default::default()
        }
        .resolved();
        assert_eq!(desc.size, 12);
        assert_eq!(desc.buffer_type, BufferType::Vertex);
        assert_eq!(desc.usage, Usage::Immutable);
    }

    // ── images ────────────────────────────────────────────────────────────

    #[test]
    fn image_defaults() {
        let desc = ImageDesc {
            width: 4,
            height: 4,
            ..Default::default()
        }
        .resolved();
        assert_eq!(desc.pixel_format, PixelFormat::Rgba8);
        assert_eq!(desc.num_mipmaps, 1);
        assert_eq!(desc.sample_count, 1);
        assert_eq!(desc.max_lod, f32::MAX);
    }

    #[test]
    fn cube_images_have_six_slices() {
        let desc = ImageDesc {
            image_type: ImageType::Cube,
            width: 8,
            height: 8,
            ..Default::default()
        }
        .resolved();
        assert_eq!(desc.num_slices, 6);
        assert_eq!(desc.num_faces(), 6);
    }

    #[test]
    fn subimage_size_shrinks_per_mip() {
        let desc = ImageDesc {
            width: 8,
            height: 4,
            ..Default::default()
        }
        .resolved();
        assert_eq!(desc.subimage_size(0), 8 * 4 * 4);
        assert_eq!(desc.subimage_size(1), 4 * 2 * 4);
        assert_eq!(desc.subimage_size(3), 1 * 1 * 4);
    }

    #[test]
    fn array_subimage_covers_all_layers() {
        let desc = ImageDesc {
            image_type: ImageType::Array,
            width: 2,
            height: 2,
            num_slices: 3,
            pixel_format: PixelFormat::R8,
            ..Default::default()
        }
        .resolved();
        assert_eq!(desc.subimage_size(0), 2 * 2 * 3);
    }

    // ── pipelines ─────────────────────────────────────────────────────────

    #[test]
    fn pipeline_auto_offsets_and_strides() {
        let mut desc = PipelineDesc::default();
        desc.layout.attrs[0].format = VertexFormat::Float3;
        desc.layout.attrs[1].format = VertexFormat::Float4;
        desc.layout.attrs[2] = VertexAttrDesc {
            buffer_index: 1,
            format: VertexFormat::Float2,
            ..Default::default()
        };
        let desc = desc.resolved(formats());

        assert_eq!(desc.layout.attrs[0].offset, 0);
        assert_eq!(desc.layout.attrs[1].offset, 12);
        assert_eq!(desc.layout.attrs[2].offset, 0);
        assert_eq!(desc.layout.buffers[0].stride, 28);
        assert_eq!(desc.layout.buffers[1].stride, 8);
        assert_eq!(desc.layout.buffers[0].step_rate, 1);
    }

    #[test]
    fn pipeline_explicit_offsets_are_kept() {
        let mut desc = PipelineDesc::default();
        desc.layout.buffers[0].stride = 32;
        desc.layout.attrs[0] = VertexAttrDesc {
            offset: 16,
            format: VertexFormat::Float4,
            ..Default::default()
        };
        desc.layout.attrs[1] = VertexAttrDesc {
            offset: 0,
            format: VertexFormat::Float4,
            ..Default::default()
        };
        let desc = desc.resolved(formats());
        assert_eq!(desc.layout.attrs[0].offset, 16);
        assert_eq!(desc.layout.attrs[1].offset, 0);
        assert_eq!(desc.layout.buffers[0].stride, 32);
    }

    #[test]
    fn pipeline_formats_come_from_default_framebuffer() {
        let desc = PipelineDesc::default().resolved(formats());
        assert_eq!(desc.blend.color_count, 1);
        assert_eq!(desc.blend.color_format, PixelFormat::Bgra8);
        assert_eq!(desc.blend.depth_format, PixelFormat::DepthStencil);
        assert_eq!(desc.rasterizer.sample_count, 1);
        assert_eq!(desc.primitive_type, PrimitiveType::Triangles);
        assert_eq!(desc.depth_stencil.depth_compare, CompareFunc::Always);
    }

    #[test]
    fn used_buffers_follow_attributes() {
        let mut layout = LayoutDesc::default();
        layout.attrs[0].format = VertexFormat::Float2;
        layout.attrs[1] = VertexAttrDesc {
            buffer_index: 2,
            format: VertexFormat::Float,
            ..Default::default()
        };
        let used = layout.used_buffers();
        assert!(used[0] && !used[1] && used[2]);
    }

    // ── passes ────────────────────────────────────────────────────────────

    #[test]
    fn pass_color_count_stops_at_first_gap() {
        let mut desc = PassDesc::default();
        desc.color_attachments[0].image = Image::from_raw(crate::gfx::id::pack(1, 1));
        desc.color_attachments[2].image = Image::from_raw(crate::gfx::id::pack(1, 2));
        assert_eq!(desc.color_count(), 1);
    }
}
