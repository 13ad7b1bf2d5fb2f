//! Error types for the graphics device.
//!
//! Three families share [`GfxError`]:
//! - fatal preconditions (`AlreadySetup`, `PoolSize`) returned from setup
//! - usage errors returned from resource, streaming and pass operations
//! - construction failures ([`DescError`], [`BackendError`]) which move the
//!   resource to `Failed` instead of being returned from `make_*`
//!
//! Buffer append overflow is not an error; see [`crate::gfx::Device::is_buffer_overflown`].

use thiserror::Error;

use super::id::{ResourceKind, ResourceState};
use super::types::{ImageType, PixelFormat, ShaderStage};

pub type Result<T> = std::result::Result<T, GfxError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GfxError {
    // ── fatal preconditions ─────────────────────────────────────────────

    #[error("graphics device already set up on this thread")]
    AlreadySetup,

    #[error("{kind} pool size {size} out of range (1..={max})")]
    PoolSize {
        kind: ResourceKind,
        size: usize,
        max: usize,
    },

    // ── handle / lifecycle ──────────────────────────────────────────────

    #[error("invalid {kind} handle")]
    InvalidHandle { kind: ResourceKind },

    #[error("{kind} is {actual:?}, expected {expected:?}")]
    WrongState {
        kind: ResourceKind,
        expected: ResourceState,
        actual: ResourceState,
    },

    #[error("{kind} belongs to a different context than the active one")]
    ContextMismatch { kind: ResourceKind },

    // ── streaming ───────────────────────────────────────────────────────

    #[error("{kind} has immutable usage and cannot be written")]
    Immutable { kind: ResourceKind },

    #[error("{kind} was already updated this frame")]
    AlreadyUpdated { kind: ResourceKind },

    #[error("buffer cannot be updated and appended in the same frame")]
    UpdateAndAppend,

    #[error("{len} bytes do not fit into a buffer of {size} bytes")]
    DataTooLarge { len: usize, size: usize },

    #[error("image data for face {face} mip {mip} is {len} bytes, expected {expected}")]
    ImageDataSize {
        face: usize,
        mip: usize,
        len: usize,
        expected: usize,
    },

    // ── pass state machine ──────────────────────────────────────────────

    #[error("a pass is already open")]
    PassAlreadyOpen,

    #[error("cannot commit while a pass is open")]
    CommitInsidePass,

    #[error("no pipeline applied in the current pass")]
    NoPipeline,

    #[error("no bindings applied since the last pipeline")]
    NoBindings,

    #[error("pipeline does not match the pass attachments: {0}")]
    PipelinePassMismatch(&'static str),

    #[error("vertex buffer slot {slot} is required by the pipeline layout")]
    MissingVertexBuffer { slot: usize },

    #[error("pipeline uses an index buffer but none is bound")]
    MissingIndexBuffer,

    #[error("an index buffer is bound but the pipeline has no index type")]
    UnexpectedIndexBuffer,

    #[error("buffer bound to {slot} has the wrong buffer type")]
    BufferType { slot: &'static str },

    #[error("binding offset {offset} is outside a buffer of {size} bytes")]
    OffsetOutOfRange { offset: usize, size: usize },

    #[error("{stage} image slot {slot}: expected {expected:?}, got {actual:?}")]
    ImageTypeMismatch {
        stage: ShaderStage,
        slot: usize,
        expected: Option<ImageType>,
        actual: Option<ImageType>,
    },

    #[error("image bound as a texture is also an attachment of the current pass")]
    ImageIsAttachment,

    #[error("{stage} uniform block {slot} is not declared by the shader")]
    UniformBlockMissing { stage: ShaderStage, slot: usize },

    #[error("uniform data is {actual} bytes, block declares {expected}")]
    UniformSize { expected: usize, actual: usize },

    // ── construction failures ───────────────────────────────────────────

    #[error("invalid descriptor: {0}")]
    Desc(#[from] DescError),

    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
}

/// Reasons a descriptor is rejected before the backend sees it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DescError {
    #[error("buffer size must be greater than zero")]
    BufferSize,

    #[error("immutable {0} requires initial data")]
    MissingData(ResourceKind),

    #[error("dynamic or stream {0} cannot take initial data")]
    UnexpectedData(ResourceKind),

    #[error("initial data is {len} bytes, resource expects {expected}")]
    DataSize { len: usize, expected: usize },

    #[error("image dimensions must be greater than zero")]
    ImageSize,

    #[error("cube images must be square with 6 slices")]
    CubeShape,

    #[error("image has {0} mipmaps, maximum is {max}", max = crate::gfx::MAX_MIPMAPS)]
    MipmapCount(usize),

    #[error("render target images must be immutable and carry no data")]
    RenderTargetUsage,

    #[error("pixel format {0:?} cannot be used as a render target")]
    NotRenderable(PixelFormat),

    #[error("pixel format {0:?} cannot be sampled")]
    NotSampleable(PixelFormat),

    #[error("sample count {0} is not supported")]
    SampleCount(u32),

    #[error("{stage} shader source is empty")]
    ShaderSource { stage: ShaderStage },

    #[error("{stage} uniform block {slot} has zero size or follows an empty slot")]
    UniformBlock { stage: ShaderStage, slot: usize },

    #[error("{stage} uniform block {slot} members need {needed} bytes, block has {size}")]
    UniformMembers {
        stage: ShaderStage,
        slot: usize,
        needed: usize,
        size: usize,
    },

    #[error("{stage} image slot {slot} follows an empty slot")]
    ShaderImage { stage: ShaderStage, slot: usize },

    #[error("pipeline shader is not valid")]
    PipelineShader,

    #[error("pipeline declares no vertex attributes")]
    NoVertexAttributes,

    #[error("vertex attribute {attr} is not contiguous with the previous one")]
    VertexAttribute { attr: usize },

    #[error("vertex attribute {attr} references buffer slot {slot}")]
    VertexBufferSlot { attr: usize, slot: usize },

    #[error("color attachment count {0} out of range")]
    ColorCount(usize),

    #[error("pass needs at least one color attachment")]
    NoColorAttachment,

    #[error("color attachment {0} is not contiguous")]
    ColorAttachmentGap(usize),

    #[error("attachment image is not a valid render target")]
    AttachmentImage,

    #[error("pass attachments differ in size or sample count")]
    AttachmentMismatch,

    #[error("depth attachment must use a depth pixel format")]
    DepthFormat,

    #[error("attachment mip level or slice out of range")]
    AttachmentSubresource,
}

/// Failures raised by a [`crate::gfx::Backend`] while realizing a resource.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("missing native {0}")]
    Missing(ResourceKind),

    #[error("{0}")]
    Native(String),
}
