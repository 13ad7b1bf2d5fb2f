//! Descriptor checks run before a backend sees a descriptor.
//!
//! Everything here is pure. Checks that need other resources (pipeline
//! shader, pass attachments) take the already looked-up facts as arguments.

use super::config::{MAX_COLOR_ATTACHMENTS, MAX_MIPMAPS, MAX_SHADERSTAGE_BUFFERS};
use super::desc::{BufferDesc, ImageDesc, PassDesc, PipelineDesc, ShaderDesc, ShaderStageDesc};
use super::error::DescError;
use super::id::{ResourceId, ResourceKind};
use super::types::{ImageType, ShaderStage, Usage, VertexFormat};

pub(crate) fn buffer(desc: &BufferDesc<'_>) -> Result<(), DescError> {
    if desc.size == 0 {
        return Err(DescError::BufferSize);
    }
    match (desc.usage, desc.data) {
        (Usage::Immutable, None) => Err(DescError::MissingData(ResourceKind::Buffer)),
        (Usage::Immutable, Some(data)) if data.len() != desc.size => Err(DescError::DataSize {
            len: data.len(),
            expected: desc.size,
        }),
        (Usage::Dynamic | Usage::Stream, Some(_)) => {
            Err(DescError::UnexpectedData(ResourceKind::Buffer))
        }
        _ => Ok(()),
    }
}

/// Checks subimage sizes of `data` against a resolved descriptor.
///
/// Empty subimages are skipped; every provided one must match exactly.
pub(crate) fn image_content(
    desc: &ImageDesc<'_>,
    data: &super::desc::ImageData<'_>,
) -> Result<(), (usize, usize, usize, usize)> {
    for face in 0..desc.num_faces() {
        for mip in 0..desc.num_mipmaps as usize {
            let len = data.subimages[face][mip].len();
            let expected = desc.subimage_size(mip as u32);
            if len != 0 && len != expected {
                return Err((face, mip, len, expected));
            }
        }
    }
    Ok(())
}

pub(crate) fn image(desc: &ImageDesc<'_>) -> Result<(), DescError> {
    if desc.width == 0 || desc.height == 0 {
        return Err(DescError::ImageSize);
    }
    if desc.image_type == ImageType::Cube && desc.width != desc.height {
        return Err(DescError::CubeShape);
    }
    if desc.num_mipmaps as usize > MAX_MIPMAPS {
        return Err(DescError::MipmapCount(desc.num_mipmaps as usize));
    }
    if !matches!(desc.sample_count, 1 | 2 | 4 | 8) {
        return Err(DescError::SampleCount(desc.sample_count));
    }

    let info = desc.pixel_format.info();
    if desc.render_target {
        if desc.usage != Usage::Immutable || !desc.data.is_empty() {
            return Err(DescError::RenderTargetUsage);
        }
        if !info.render {
            return Err(DescError::NotRenderable(desc.pixel_format));
        }
        return Ok(());
    }

    if desc.sample_count > 1 {
        return Err(DescError::SampleCount(desc.sample_count));
    }
    if !info.sample {
        return Err(DescError::NotSampleable(desc.pixel_format));
    }
    if desc.pixel_format.is_depth() {
        return Err(DescError::NotSampleable(desc.pixel_format));
    }

    match desc.usage {
        Usage::Immutable => {
            let complete = (0..desc.num_faces()).all(|face| {
                (0..desc.num_mipmaps as usize).all(|mip| !desc.data.subimages[face][mip].is_empty())
            });
            if !complete {
                return Err(DescError::MissingData(ResourceKind::Image));
            }
            image_content(desc, &desc.data).map_err(|(_, _, len, expected)| {
                DescError::DataSize { len, expected }
            })
        }
        Usage::Dynamic | Usage::Stream => {
            if desc.data.is_empty() {
                Ok(())
            } else {
                Err(DescError::UnexpectedData(ResourceKind::Image))
            }
        }
    }
}

fn shader_stage(stage: ShaderStage, desc: &ShaderStageDesc<'_>) -> Result<(), DescError> {
    if desc.source.trim().is_empty() {
        return Err(DescError::ShaderSource { stage });
    }

    let mut seen_gap = false;
    for (slot, ub) in desc.uniform_blocks.iter().enumerate() {
        if ub.size == 0 {
            seen_gap = true;
            if ub.uniforms.iter().any(|u| u.uniform_type.byte_size() > 0) {
                return Err(DescError::UniformBlock { stage, slot });
            }
            continue;
        }
        if seen_gap {
            return Err(DescError::UniformBlock { stage, slot });
        }
        let needed: usize = ub
            .uniforms
            .iter()
            .map(|u| u.uniform_type.byte_size() * u.array_count.max(1))
            .sum();
        if needed > ub.size {
            return Err(DescError::UniformMembers {
                stage,
                slot,
                needed,
                size: ub.size,
            });
        }
    }

    let mut seen_gap = false;
    for (slot, img) in desc.images.iter().enumerate() {
        match img.image_type {
            None => seen_gap = true,
            Some(_) if seen_gap => return Err(DescError::ShaderImage { stage, slot }),
            Some(_) => {}
        }
    }
    Ok(())
}

pub(crate) fn shader(desc: &ShaderDesc<'_>) -> Result<(), DescError> {
    for stage in ShaderStage::ALL {
        shader_stage(stage, desc.stage(stage))?;
    }
    Ok(())
}

/// `shader_valid` is the state of `desc.shader` looked up by the caller.
pub(crate) fn pipeline(desc: &PipelineDesc<'_>, shader_valid: bool) -> Result<(), DescError> {
    if !shader_valid {
        return Err(DescError::PipelineShader);
    }

    let attrs = &desc.layout.attrs;
    if attrs[0].format == VertexFormat::Invalid {
        return Err(DescError::NoVertexAttributes);
    }
    let active = desc.layout.active_attrs().count();
    for (attr, a) in attrs.iter().enumerate() {
        if attr >= active && a.format != VertexFormat::Invalid {
            return Err(DescError::VertexAttribute { attr });
        }
        if attr < active && a.buffer_index >= MAX_SHADERSTAGE_BUFFERS {
            return Err(DescError::VertexBufferSlot {
                attr,
                slot: a.buffer_index,
            });
        }
    }

    if desc.blend.color_count == 0 || desc.blend.color_count > MAX_COLOR_ATTACHMENTS {
        return Err(DescError::ColorCount(desc.blend.color_count));
    }
    if !matches!(desc.rasterizer.sample_count, 1 | 2 | 4 | 8) {
        return Err(DescError::SampleCount(desc.rasterizer.sample_count));
    }
    Ok(())
}

/// Facts about one attachment image, looked up by the caller.
#[derive(Debug, Copy, Clone)]
pub(crate) struct AttachmentInfo {
    pub valid_render_target: bool,
    pub width: u32,
    pub height: u32,
    pub sample_count: u32,
    pub depth: bool,
    pub num_mipmaps: u32,
    pub num_slices: u32,
}

pub(crate) fn pass(
    desc: &PassDesc<'_>,
    lookup: impl Fn(super::id::Image) -> Option<AttachmentInfo>,
) -> Result<(), DescError> {
    let count = desc.color_count();
    if count == 0 {
        return Err(DescError::NoColorAttachment);
    }
    if let Some(i) = desc.color_attachments[count..]
        .iter()
        .position(|a| !a.image.is_invalid())
    {
        return Err(DescError::ColorAttachmentGap(count + i));
    }

    let check = |att: &super::desc::AttachmentDesc| -> Result<AttachmentInfo, DescError> {
        let info = lookup(att.image)
            .filter(|i| i.valid_render_target)
            .ok_or(DescError::AttachmentImage)?;
        if att.mip_level >= info.num_mipmaps || att.slice >= info.num_slices {
            return Err(DescError::AttachmentSubresource);
        }
        Ok(info)
    };

    let first = check(&desc.color_attachments[0])?;
    for att in &desc.color_attachments[..count] {
        let info = check(att)?;
        if info.depth {
            return Err(DescError::AttachmentImage);
        }
        if (info.width, info.height, info.sample_count)
            != (first.width, first.height, first.sample_count)
        {
            return Err(DescError::AttachmentMismatch);
        }
    }

    let ds = &desc.depth_stencil_attachment;
    if !ds.image.is_invalid() {
        let info = check(ds)?;
        if !info.depth {
            return Err(DescError::DepthFormat);
        }
        if (info.width, info.height, info.sample_count)
            != (first.width, first.height, first.sample_count)
        {
            return Err(DescError::AttachmentMismatch);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::desc::{ImageData, UniformBlockDesc};
    use crate::gfx::id::{pack, Image, Shader};
    use crate::gfx::types::{BufferType, PixelFormat, UniformType};

    // ── buffers ───────────────────────────────────────────────────────────

    #[test]
    fn immutable_buffer_needs_data() {
        let desc = BufferDesc {
            size: 16,
            ..Default::default()
        };
        assert_eq!(buffer(&desc), Err(DescError::MissingData(ResourceKind::Buffer)));
    }

    #[test]
    fn immutable_buffer_data_must_match_size() {
        let data = [0u8; 8];
        let desc = BufferDesc {
            size: 16,
            data: Some(&data),
            ..Default::default()
        };
        assert_eq!(buffer(&desc), Err(DescError::DataSize { len: 8, expected: 16 }));
    }

    #[test]
    fn stream_buffer_without_data_is_valid() {
        let desc = BufferDesc {
            size: 16,
            usage: Usage::Stream,
            buffer_type: BufferType::Index,
            ..Default::default()
        };
        assert_eq!(buffer(&desc), Ok(()));
    }

    #[test]
    fn zero_size_buffer_is_rejected() {
        assert_eq!(buffer(&BufferDesc::default()), Err(DescError::BufferSize));
    }

    // ── images ────────────────────────────────────────────────────────────

    #[test]
    fn immutable_image_with_matching_data() {
        let pixels = [0u8; 2 * 2 * 4];
        let desc = ImageDesc {
            width: 2,
            height: 2,
            data: ImageData::new(&pixels),
            ..Default::default()
        }
        .resolved();
        assert_eq!(image(&desc), Ok(()));
    }

    #[test]
    fn immutable_image_wrong_data_size() {
        let pixels = [0u8; 3];
        let desc = ImageDesc {
            width: 2,
            height: 2,
            data: ImageData::new(&pixels),
            ..Default::default()
        }
        .resolved();
        assert_eq!(image(&desc), Err(DescError::DataSize { len: 3, expected: 16 }));
    }

    #[test]
    fn render_target_rejects_data_and_depth_sampling() {
        let pixels = [0u8; 16];
        let with_data = ImageDesc {
            render_target: true,
            width: 2,
            height: 2,
            data: ImageData::new(&pixels),
            ..Default::default()
        }
        .resolved();
        assert_eq!(image(&with_data), Err(DescError::RenderTargetUsage));

        let depth_texture = ImageDesc {
            width: 2,
            height: 2,
            usage: Usage::Dynamic,
            pixel_format: PixelFormat::Depth,
            ..Default::default()
        }
        .resolved();
        assert_eq!(image(&depth_texture), Err(DescError::NotSampleable(PixelFormat::Depth)));
    }

    #[test]
    fn depth_render_target_is_valid() {
        let desc = ImageDesc {
            render_target: true,
            width: 64,
            height: 64,
            pixel_format: PixelFormat::DepthStencil,
            ..Default::default()
        }
        .resolved();
        assert_eq!(image(&desc), Ok(()));
    }

    // ── shaders ───────────────────────────────────────────────────────────

    fn shader_desc() -> ShaderDesc<'static> {
        let mut desc = ShaderDesc::default();
        desc.vs.source = "vs";
        desc.fs.source = "fs";
        desc
    }

    #[test]
    fn shader_needs_source() {
        let mut desc = shader_desc();
        desc.fs.source = "  ";
        assert_eq!(
            shader(&desc),
            Err(DescError::ShaderSource { stage: ShaderStage::Fragment })
        );
    }

    #[test]
    fn uniform_blocks_must_be_contiguous() {
        let mut desc = shader_desc();
        desc.vs.uniform_blocks[1] = UniformBlockDesc::sized(16);
        assert_eq!(
            shader(&desc),
            Err(DescError::UniformBlock { stage: ShaderStage::Vertex, slot: 1 })
        );
    }

    #[test]
    fn uniform_members_must_fit() {
        let mut desc = shader_desc();
        desc.vs.uniform_blocks[0] = UniformBlockDesc::sized(32);
        desc.vs.uniform_blocks[0].uniforms[0].uniform_type = UniformType::Mat4;
        assert!(matches!(shader(&desc), Err(DescError::UniformMembers { needed: 64, .. })));
    }

    // ── pipelines ─────────────────────────────────────────────────────────

    #[test]
    fn pipeline_needs_valid_shader_and_attributes() {
        let mut desc = PipelineDesc {
            shader: Shader::from_raw(pack(1, 1)),
            ..Default::default()
        };
        desc.blend.color_count = 1;
        desc.rasterizer.sample_count = 1;
        assert_eq!(pipeline(&desc, false), Err(DescError::PipelineShader));
        assert_eq!(pipeline(&desc, true), Err(DescError::NoVertexAttributes));

        desc.layout.attrs[0].format = VertexFormat::Float3;
        assert_eq!(pipeline(&desc, true), Ok(()));

        desc.layout.attrs[2].format = VertexFormat::Float3;
        assert_eq!(pipeline(&desc, true), Err(DescError::VertexAttribute { attr: 2 }));
    }

    // ── passes ────────────────────────────────────────────────────────────

    fn target(depth: bool, width: u32) -> AttachmentInfo {
        AttachmentInfo {
            valid_render_target: true,
            width,
            height: 64,
            sample_count: 1,
            depth,
            num_mipmaps: 1,
            num_slices: 1,
        }
    }

    #[test]
    fn pass_with_color_and_depth() {
        let color = Image::from_raw(pack(1, 1));
        let depth = Image::from_raw(pack(1, 2));
        let mut desc = PassDesc::default();
        desc.color_attachments[0].image = color;
        desc.depth_stencil_attachment.image = depth;
        let lookup = |img: Image| Some(target(img == depth, 64));
        assert_eq!(pass(&desc, lookup), Ok(()));
    }

    #[test]
    fn pass_attachment_size_mismatch() {
        let a = Image::from_raw(pack(1, 1));
        let b = Image::from_raw(pack(1, 2));
        let mut desc = PassDesc::default();
        desc.color_attachments[0].image = a;
        desc.color_attachments[1].image = b;
        let lookup = |img: Image| Some(target(false, if img == a { 64 } else { 32 }));
        assert_eq!(pass(&desc, lookup), Err(DescError::AttachmentMismatch));
    }

    #[test]
    fn pass_requires_color_attachment() {
        assert_eq!(pass(&PassDesc::default(), |_| None), Err(DescError::NoColorAttachment));
    }

    #[test]
    fn pass_rejects_gap_and_missing_image() {
        let a = Image::from_raw(pack(1, 1));
        let mut desc = PassDesc::default();
        desc.color_attachments[0].image = a;
        desc.color_attachments[2].image = a;
        assert_eq!(pass(&desc, |_| Some(target(false, 64))), Err(DescError::ColorAttachmentGap(2)));

        desc.color_attachments[2].image = Image::INVALID;
        assert_eq!(pass(&desc, |_| None), Err(DescError::AttachmentImage));
    }
}
