//! Enumerations and small value types shared by descriptors, the device and
//! the backends.

use std::fmt;

use bitflags::bitflags;

#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Color = Color::rgba(0.0, 0.0, 0.0, 1.0);
    pub const WHITE: Color = Color::rgba(1.0, 1.0, 1.0, 1.0);
    pub const TRANSPARENT: Color = Color::rgba(0.0, 0.0, 0.0, 0.0);

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }
}

/// Integer rectangle in framebuffer pixels.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// Converts a bottom-left-origin rect into a top-left-origin one.
    pub fn flipped(self, framebuffer_height: i32) -> Self {
        Self {
            y: framebuffer_height - (self.y + self.height),
            ..self
        }
    }

    /// Intersects with `(0, 0, width, height)`; empty results have zero size.
    pub fn clamped(self, width: i32, height: i32) -> Self {
        let x0 = self.x.clamp(0, width);
        let y0 = self.y.clamp(0, height);
        let x1 = (self.x + self.width).clamp(x0, width);
        let y1 = (self.y + self.height).clamp(y0, height);
        Self::new(x0, y0, x1 - x0, y1 - y0)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub const ALL: [ShaderStage; 2] = [ShaderStage::Vertex, ShaderStage::Fragment];

    pub fn index(self) -> usize {
        match self {
            ShaderStage::Vertex => 0,
            ShaderStage::Fragment => 1,
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        })
    }
}

// ── resources ─────────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum Usage {
    /// Written once at construction.
    #[default]
    Immutable,
    /// Updated occasionally, at most once per frame.
    Dynamic,
    /// Rewritten every frame.
    Stream,
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum BufferType {
    #[default]
    Vertex,
    Index,
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum ImageType {
    #[default]
    D2,
    Cube,
    D3,
    Array,
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum SamplerType {
    #[default]
    Float,
    SInt,
    UInt,
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum Filter {
    #[default]
    Nearest,
    Linear,
    NearestMipmapNearest,
    NearestMipmapLinear,
    LinearMipmapNearest,
    LinearMipmapLinear,
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum Wrap {
    #[default]
    Repeat,
    ClampToEdge,
    ClampToBorder,
    MirroredRepeat,
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum BorderColor {
    #[default]
    TransparentBlack,
    OpaqueBlack,
    OpaqueWhite,
}

/// Pixel formats understood by the device.
///
/// `Default` resolves to the default framebuffer's format in pipeline
/// descriptors and to `Rgba8` in image descriptors. `None` means "no
/// attachment".
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum PixelFormat {
    #[default]
    Default,
    None,
    R8,
    R8SN,
    R8UI,
    R8SI,
    R16F,
    Rg8,
    Rg8SN,
    R32UI,
    R32SI,
    R32F,
    Rg16F,
    Rgba8,
    Rgba8Srgb,
    Rgba8SN,
    Rgba8UI,
    Rgba8SI,
    Bgra8,
    Bgra8Srgb,
    Rgb10A2,
    Rg11B10F,
    Rg32F,
    Rgba16F,
    Rgba32F,
    Depth,
    DepthStencil,
}

impl PixelFormat {
    /// Bytes per pixel for uncompressed color and depth formats.
    pub fn bytes_per_pixel(self) -> usize {
        use PixelFormat::*;
        match self {
            Default | None => 0,
            R8 | R8SN | R8UI | R8SI => 1,
            R16F | Rg8 | Rg8SN => 2,
            R32UI | R32SI | R32F | Rg16F | Rgba8 | Rgba8Srgb | Rgba8SN | Rgba8UI | Rgba8SI
            | Bgra8 | Bgra8Srgb | Rgb10A2 | Rg11B10F | Depth | DepthStencil => 4,
            Rg32F | Rgba16F => 8,
            Rgba32F => 16,
        }
    }

    pub fn is_depth(self) -> bool {
        matches!(self, PixelFormat::Depth | PixelFormat::DepthStencil)
    }

    pub fn has_stencil(self) -> bool {
        self == PixelFormat::DepthStencil
    }

    fn is_integer(self) -> bool {
        use PixelFormat::*;
        matches!(self, R8UI | R8SI | R32UI | R32SI | Rgba8UI | Rgba8SI)
    }

    /// Static capability table, independent of the backend.
    pub fn info(self) -> PixelFormatInfo {
        use PixelFormat::*;
        match self {
            Default | None => PixelFormatInfo::default(),
            Depth | DepthStencil => PixelFormatInfo {
                sample: true,
                filter: false,
                render: true,
                blend: false,
                msaa: true,
                depth: true,
            },
            R32F | Rg32F | Rgba32F => PixelFormatInfo {
                sample: true,
                filter: false,
                render: true,
                blend: false,
                msaa: false,
                depth: false,
            },
            R8SN | Rg8SN | Rgba8SN => PixelFormatInfo {
                sample: true,
                filter: true,
                render: false,
                blend: false,
                msaa: false,
                depth: false,
            },
            f if f.is_integer() => PixelFormatInfo {
                sample: true,
                filter: false,
                render: true,
                blend: false,
                msaa: true,
                depth: false,
            },
            _ => PixelFormatInfo {
                sample: true,
                filter: true,
                render: true,
                blend: true,
                msaa: true,
                depth: false,
            },
        }
    }
}

/// What a pixel format can be used for.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct PixelFormatInfo {
    pub sample: bool,
    pub filter: bool,
    pub render: bool,
    pub blend: bool,
    pub msaa: bool,
    pub depth: bool,
}

// ── shaders ───────────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum UniformType {
    #[default]
    Invalid,
    Float,
    Float2,
    Float3,
    Float4,
    Mat4,
}

impl UniformType {
    pub fn byte_size(self) -> usize {
        match self {
            UniformType::Invalid => 0,
            UniformType::Float => 4,
            UniformType::Float2 => 8,
            UniformType::Float3 => 12,
            UniformType::Float4 => 16,
            UniformType::Mat4 => 64,
        }
    }
}

// ── pipelines ─────────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum VertexFormat {
    #[default]
    Invalid,
    Float,
    Float2,
    Float3,
    Float4,
    Byte4,
    Byte4N,
    UByte4,
    UByte4N,
    Short2,
    Short2N,
    Short4,
    Short4N,
}

impl VertexFormat {
    pub fn byte_size(self) -> usize {
        use VertexFormat::*;
        match self {
            Invalid => 0,
            Float => 4,
            Float2 => 8,
            Float3 => 12,
            Float4 => 16,
            Byte4 | Byte4N | UByte4 | UByte4N | Short2 | Short2N => 4,
            Short4 | Short4N => 8,
        }
    }
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum VertexStep {
    #[default]
    PerVertex,
    PerInstance,
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum PrimitiveType {
    Points,
    Lines,
    LineStrip,
    #[default]
    Triangles,
    TriangleStrip,
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum IndexType {
    #[default]
    None,
    UInt16,
    UInt32,
}

impl IndexType {
    pub fn byte_size(self) -> usize {
        match self {
            IndexType::None => 0,
            IndexType::UInt16 => 2,
            IndexType::UInt32 => 4,
        }
    }
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum CullMode {
    #[default]
    None,
    Front,
    Back,
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum FaceWinding {
    Ccw,
    #[default]
    Cw,
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum CompareFunc {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    #[default]
    Always,
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum StencilOp {
    #[default]
    Keep,
    Zero,
    Replace,
    IncrClamp,
    DecrClamp,
    Invert,
    IncrWrap,
    DecrWrap,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstColor,
    OneMinusDstColor,
    DstAlpha,
    OneMinusDstAlpha,
    SrcAlphaSaturated,
    BlendColor,
    OneMinusBlendColor,
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum BlendOp {
    #[default]
    Add,
    Subtract,
    ReverseSubtract,
}

bitflags! {
    /// Color channels written by a pipeline.
    #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
    pub struct ColorMask: u8 {
        const R = 1 << 0;
        const G = 1 << 1;
        const B = 1 << 2;
        const A = 1 << 3;
        const RGB = Self::R.bits() | Self::G.bits() | Self::B.bits();
        const RGBA = Self::RGB.bits() | Self::A.bits();
    }
}

impl Default for ColorMask {
    fn default() -> Self {
        ColorMask::RGBA
    }
}

// ── capabilities ──────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BackendKind {
    Headless,
    Wgpu,
}

/// Optional features reported by the backend.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct Features {
    pub instancing: bool,
    pub origin_top_left: bool,
    pub multiple_render_targets: bool,
    pub msaa_render_targets: bool,
    pub image_type_3d: bool,
    pub image_type_array: bool,
    pub image_clamp_to_border: bool,
}

/// Size limits reported by the backend.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct Limits {
    pub max_image_size_2d: u32,
    pub max_image_size_cube: u32,
    pub max_image_size_3d: u32,
    pub max_image_size_array: u32,
    pub max_image_array_layers: u32,
    pub max_vertex_attrs: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_formats_are_blendable() {
        let info = PixelFormat::Rgba8.info();
        assert!(info.render && info.blend && info.filter);
        assert!(!info.depth);
    }

    #[test]
    fn depth_formats_report_depth() {
        assert!(PixelFormat::DepthStencil.info().depth);
        assert!(PixelFormat::DepthStencil.has_stencil());
        assert!(!PixelFormat::Depth.has_stencil());
    }

    #[test]
    fn integer_formats_are_not_filterable() {
        let info = PixelFormat::R32UI.info();
        assert!(info.sample);
        assert!(!info.filter);
    }

    #[test]
    fn default_color_mask_writes_all_channels() {
        assert_eq!(ColorMask::default(), ColorMask::RGBA);
        assert!(ColorMask::RGBA.contains(ColorMask::A));
    }

    #[test]
    fn rect_flip_and_clamp() {
        let r = Rect::new(10, 0, 20, 30);
        assert_eq!(r.flipped(100), Rect::new(10, 70, 20, 30));
        assert_eq!(Rect::new(-5, 90, 20, 20).clamped(100, 100), Rect::new(0, 90, 15, 10));
        assert_eq!(Rect::new(200, 0, 5, 5).clamped(100, 100).width, 0);
    }

    #[test]
    fn vertex_format_sizes() {
        assert_eq!(VertexFormat::Float3.byte_size(), 12);
        assert_eq!(VertexFormat::UByte4N.byte_size(), 4);
        assert_eq!(VertexFormat::Short4N.byte_size(), 8);
    }
}
