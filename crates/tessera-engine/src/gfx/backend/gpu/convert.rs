//! Device enums to wgpu enums.

use crate::gfx::action::LoadAction;
use crate::gfx::types::{
    BlendFactor, BlendOp, BorderColor, Color, CompareFunc, CullMode, FaceWinding, Filter,
    ImageType, IndexType, PixelFormat, PrimitiveType, SamplerType, ShaderStage, StencilOp,
    VertexFormat, VertexStep, Wrap,
};

pub(crate) fn texture_format(format: PixelFormat) -> Option<wgpu::TextureFormat> {
    use wgpu::TextureFormat as T;
    Some(match format {
        PixelFormat::Default | PixelFormat::None => return None,
        PixelFormat::R8 => T::R8Unorm,
        PixelFormat::R8SN => T::R8Snorm,
        PixelFormat::R8UI => T::R8Uint,
        PixelFormat::R8SI => T::R8Sint,
        PixelFormat::R16F => T::R16Float,
        PixelFormat::Rg8 => T::Rg8Unorm,
        PixelFormat::Rg8SN => T::Rg8Snorm,
        PixelFormat::R32UI => T::R32Uint,
        PixelFormat::R32SI => T::R32Sint,
        PixelFormat::R32F => T::R32Float,
        PixelFormat::Rg16F => T::Rg16Float,
        PixelFormat::Rgba8 => T::Rgba8Unorm,
        PixelFormat::Rgba8Srgb => T::Rgba8UnormSrgb,
        PixelFormat::Rgba8SN => T::Rgba8Snorm,
        PixelFormat::Rgba8UI => T::Rgba8Uint,
        PixelFormat::Rgba8SI => T::Rgba8Sint,
        PixelFormat::Bgra8 => T::Bgra8Unorm,
        PixelFormat::Bgra8Srgb => T::Bgra8UnormSrgb,
        PixelFormat::Rgb10A2 => T::Rgb10a2Unorm,
        PixelFormat::Rg11B10F => T::Rg11b10Ufloat,
        PixelFormat::Rg32F => T::Rg32Float,
        PixelFormat::Rgba16F => T::Rgba16Float,
        PixelFormat::Rgba32F => T::Rgba32Float,
        PixelFormat::Depth => T::Depth32Float,
        PixelFormat::DepthStencil => T::Depth24PlusStencil8,
    })
}

/// Swapchain formats the default pass can report.
pub(crate) fn surface_pixel_format(format: wgpu::TextureFormat) -> Option<PixelFormat> {
    use wgpu::TextureFormat as T;
    Some(match format {
        T::Bgra8Unorm => PixelFormat::Bgra8,
        T::Bgra8UnormSrgb => PixelFormat::Bgra8Srgb,
        T::Rgba8Unorm => PixelFormat::Rgba8,
        T::Rgba8UnormSrgb => PixelFormat::Rgba8Srgb,
        T::Rgba16Float => PixelFormat::Rgba16F,
        T::Rgb10a2Unorm => PixelFormat::Rgb10A2,
        _ => return None,
    })
}

pub(crate) fn shader_stage(stage: ShaderStage) -> wgpu::ShaderStages {
    match stage {
        ShaderStage::Vertex => wgpu::ShaderStages::VERTEX,
        ShaderStage::Fragment => wgpu::ShaderStages::FRAGMENT,
    }
}

pub(crate) fn view_dimension(image_type: ImageType) -> wgpu::TextureViewDimension {
    match image_type {
        ImageType::D2 => wgpu::TextureViewDimension::D2,
        ImageType::Cube => wgpu::TextureViewDimension::Cube,
        ImageType::D3 => wgpu::TextureViewDimension::D3,
        ImageType::Array => wgpu::TextureViewDimension::D2Array,
    }
}

pub(crate) fn sample_type(sampler_type: SamplerType) -> wgpu::TextureSampleType {
    match sampler_type {
        SamplerType::Float => wgpu::TextureSampleType::Float { filterable: true },
        SamplerType::SInt => wgpu::TextureSampleType::Sint,
        SamplerType::UInt => wgpu::TextureSampleType::Uint,
    }
}

pub(crate) fn sampler_binding(sampler_type: SamplerType) -> wgpu::SamplerBindingType {
    match sampler_type {
        SamplerType::Float => wgpu::SamplerBindingType::Filtering,
        SamplerType::SInt | SamplerType::UInt => wgpu::SamplerBindingType::NonFiltering,
    }
}

// ── samplers ──────────────────────────────────────────────────────────────

/// Minification filter split into texel and mip filters.
pub(crate) fn min_filter(filter: Filter) -> (wgpu::FilterMode, wgpu::MipmapFilterMode) {
    use wgpu::FilterMode as F;
    use wgpu::MipmapFilterMode as M;
    match filter {
        Filter::Nearest | Filter::NearestMipmapNearest => (F::Nearest, M::Nearest),
        Filter::NearestMipmapLinear => (F::Nearest, M::Linear),
        Filter::Linear | Filter::LinearMipmapNearest => (F::Linear, M::Nearest),
        Filter::LinearMipmapLinear => (F::Linear, M::Linear),
    }
}

pub(crate) fn mag_filter(filter: Filter) -> wgpu::FilterMode {
    match filter {
        Filter::Nearest | Filter::NearestMipmapNearest | Filter::NearestMipmapLinear => {
            wgpu::FilterMode::Nearest
        }
        _ => wgpu::FilterMode::Linear,
    }
}

pub(crate) fn address_mode(wrap: Wrap, clamp_to_border: bool) -> wgpu::AddressMode {
    match wrap {
        Wrap::Repeat => wgpu::AddressMode::Repeat,
        Wrap::ClampToEdge => wgpu::AddressMode::ClampToEdge,
        Wrap::ClampToBorder if clamp_to_border => wgpu::AddressMode::ClampToBorder,
        Wrap::ClampToBorder => wgpu::AddressMode::ClampToEdge,
        Wrap::MirroredRepeat => wgpu::AddressMode::MirrorRepeat,
    }
}

pub(crate) fn border_color(color: BorderColor) -> wgpu::SamplerBorderColor {
    match color {
        BorderColor::TransparentBlack => wgpu::SamplerBorderColor::TransparentBlack,
        BorderColor::OpaqueBlack => wgpu::SamplerBorderColor::OpaqueBlack,
        BorderColor::OpaqueWhite => wgpu::SamplerBorderColor::OpaqueWhite,
    }
}

// ── pipelines ─────────────────────────────────────────────────────────────

pub(crate) fn vertex_format(format: VertexFormat) -> Option<wgpu::VertexFormat> {
    use wgpu::VertexFormat as V;
    Some(match format {
        VertexFormat::Invalid => return None,
        VertexFormat::Float => V::Float32,
        VertexFormat::Float2 => V::Float32x2,
        VertexFormat::Float3 => V::Float32x3,
        VertexFormat::Float4 => V::Float32x4,
        VertexFormat::Byte4 => V::Sint8x4,
        VertexFormat::Byte4N => V::Snorm8x4,
        VertexFormat::UByte4 => V::Uint8x4,
        VertexFormat::UByte4N => V::Unorm8x4,
        VertexFormat::Short2 => V::Sint16x2,
        VertexFormat::Short2N => V::Snorm16x2,
        VertexFormat::Short4 => V::Sint16x4,
        VertexFormat::Short4N => V::Snorm16x4,
    })
}

pub(crate) fn step_mode(step: VertexStep) -> wgpu::VertexStepMode {
    match step {
        VertexStep::PerVertex => wgpu::VertexStepMode::Vertex,
        VertexStep::PerInstance => wgpu::VertexStepMode::Instance,
    }
}

pub(crate) fn topology(primitive: PrimitiveType) -> wgpu::PrimitiveTopology {
    match primitive {
        PrimitiveType::Points => wgpu::PrimitiveTopology::PointList,
        PrimitiveType::Lines => wgpu::PrimitiveTopology::LineList,
        PrimitiveType::LineStrip => wgpu::PrimitiveTopology::LineStrip,
        PrimitiveType::Triangles => wgpu::PrimitiveTopology::TriangleList,
        PrimitiveType::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
    }
}

pub(crate) fn index_format(index_type: IndexType) -> Option<wgpu::IndexFormat> {
    match index_type {
        IndexType::None => None,
        IndexType::UInt16 => Some(wgpu::IndexFormat::Uint16),
        IndexType::UInt32 => Some(wgpu::IndexFormat::Uint32),
    }
}

pub(crate) fn cull_mode(mode: CullMode) -> Option<wgpu::Face> {
    match mode {
        CullMode::None => None,
        CullMode::Front => Some(wgpu::Face::Front),
        CullMode::Back => Some(wgpu::Face::Back),
    }
}

pub(crate) fn front_face(winding: FaceWinding) -> wgpu::FrontFace {
    match winding {
        FaceWinding::Ccw => wgpu::FrontFace::Ccw,
        FaceWinding::Cw => wgpu::FrontFace::Cw,
    }
}

pub(crate) fn compare(func: CompareFunc) -> wgpu::CompareFunction {
    match func {
        CompareFunc::Never => wgpu::CompareFunction::Never,
        CompareFunc::Less => wgpu::CompareFunction::Less,
        CompareFunc::Equal => wgpu::CompareFunction::Equal,
        CompareFunc::LessEqual => wgpu::CompareFunction::LessEqual,
        CompareFunc::Greater => wgpu::CompareFunction::Greater,
        CompareFunc::NotEqual => wgpu::CompareFunction::NotEqual,
        CompareFunc::GreaterEqual => wgpu::CompareFunction::GreaterEqual,
        CompareFunc::Always => wgpu::CompareFunction::Always,
    }
}

pub(crate) fn stencil_op(op: StencilOp) -> wgpu::StencilOperation {
    match op {
        StencilOp::Keep => wgpu::StencilOperation::Keep,
        StencilOp::Zero => wgpu::StencilOperation::Zero,
        StencilOp::Replace => wgpu::StencilOperation::Replace,
        StencilOp::IncrClamp => wgpu::StencilOperation::IncrementClamp,
        StencilOp::DecrClamp => wgpu::StencilOperation::DecrementClamp,
        StencilOp::Invert => wgpu::StencilOperation::Invert,
        StencilOp::IncrWrap => wgpu::StencilOperation::IncrementWrap,
        StencilOp::DecrWrap => wgpu::StencilOperation::DecrementWrap,
    }
}

pub(crate) fn blend_factor(factor: BlendFactor) -> wgpu::BlendFactor {
    use wgpu::BlendFactor as B;
    match factor {
        BlendFactor::Zero => B::Zero,
        BlendFactor::One => B::One,
        BlendFactor::SrcColor => B::Src,
        BlendFactor::OneMinusSrcColor => B::OneMinusSrc,
        BlendFactor::SrcAlpha => B::SrcAlpha,
        BlendFactor::OneMinusSrcAlpha => B::OneMinusSrcAlpha,
        BlendFactor::DstColor => B::Dst,
        BlendFactor::OneMinusDstColor => B::OneMinusDst,
        BlendFactor::DstAlpha => B::DstAlpha,
        BlendFactor::OneMinusDstAlpha => B::OneMinusDstAlpha,
        BlendFactor::SrcAlphaSaturated => B::SrcAlphaSaturated,
        BlendFactor::BlendColor => B::Constant,
        BlendFactor::OneMinusBlendColor => B::OneMinusConstant,
    }
}

pub(crate) fn blend_op(op: BlendOp) -> wgpu::BlendOperation {
    match op {
        BlendOp::Add => wgpu::BlendOperation::Add,
        BlendOp::Subtract => wgpu::BlendOperation::Subtract,
        BlendOp::ReverseSubtract => wgpu::BlendOperation::ReverseSubtract,
    }
}

// ── passes ────────────────────────────────────────────────────────────────

pub(crate) fn color(c: Color) -> wgpu::Color {
    wgpu::Color {
        r: c.r as f64,
        g: c.g as f64,
        b: c.b as f64,
        a: c.a as f64,
    }
}

/// Don't-care loads clear, since wgpu has no undefined load.
pub(crate) fn color_load(action: LoadAction<Color>) -> wgpu::LoadOp<wgpu::Color> {
    match action {
        LoadAction::Clear(c) => wgpu::LoadOp::Clear(color(c)),
        LoadAction::Load => wgpu::LoadOp::Load,
        LoadAction::DontCare => wgpu::LoadOp::Clear(wgpu::Color::BLACK),
    }
}

pub(crate) fn depth_load(action: LoadAction<f32>) -> wgpu::LoadOp<f32> {
    match action {
        LoadAction::Clear(d) => wgpu::LoadOp::Clear(d),
        LoadAction::Load => wgpu::LoadOp::Load,
        LoadAction::DontCare => wgpu::LoadOp::Clear(1.0),
    }
}

pub(crate) fn stencil_load(action: LoadAction<u8>) -> wgpu::LoadOp<u32> {
    match action {
        LoadAction::Clear(s) => wgpu::LoadOp::Clear(s as u32),
        LoadAction::Load => wgpu::LoadOp::Load,
        LoadAction::DontCare => wgpu::LoadOp::Clear(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_color_format_maps_to_a_texture_format() {
        for format in [
            PixelFormat::R8,
            PixelFormat::Rgba8,
            PixelFormat::Bgra8Srgb,
            PixelFormat::Rgba32F,
            PixelFormat::DepthStencil,
        ] {
            assert!(texture_format(format).is_some(), "{format:?}");
        }
        assert_eq!(texture_format(PixelFormat::None), None);
    }

    #[test]
    fn surface_formats_round_trip() {
        for format in [PixelFormat::Bgra8, PixelFormat::Bgra8Srgb, PixelFormat::Rgba8Srgb] {
            let native = texture_format(format).unwrap();
            assert_eq!(surface_pixel_format(native), Some(format));
        }
    }

    #[test]
    fn mipmap_filters_split() {
        assert_eq!(
            min_filter(Filter::LinearMipmapNearest),
            (wgpu::FilterMode::Linear, wgpu::MipmapFilterMode::Nearest)
        );
        assert_eq!(mag_filter(Filter::NearestMipmapLinear), wgpu::FilterMode::Nearest);
    }

    #[test]
    fn clamp_to_border_falls_back_without_feature() {
        assert_eq!(
            address_mode(Wrap::ClampToBorder, false),
            wgpu::AddressMode::ClampToEdge
        );
        assert_eq!(
            address_mode(Wrap::ClampToBorder, true),
            wgpu::AddressMode::ClampToBorder
        );
    }

    #[test]
    fn dont_care_becomes_clear() {
        assert!(matches!(
            color_load(LoadAction::DontCare),
            wgpu::LoadOp::Clear(_)
        ));
        assert!(matches!(depth_load(LoadAction::Load), wgpu::LoadOp::Load));
    }
}
