//! Handle-based graphics device.
//!
//! Resources (buffers, images, shaders, pipelines, passes) live in fixed-size
//! pools owned by the [`Device`] and are referred to by small `Copy` handles.
//! A handle carries a generation, so a handle to a destroyed resource stays
//! detectably stale even after its slot is reused.
//!
//! Rendering happens inside a [`PassEncoder`] obtained from
//! [`Device::begin_default_pass`] or [`Device::begin_pass`]; the frame is
//! submitted with [`Device::commit`].

mod action;
mod backend;
mod bindings;
mod config;
mod desc;
mod device;
mod error;
mod id;
mod info;
mod pass;
mod pool;
mod streaming;
mod types;
mod validate;

pub use action::{
    Action, LoadAction, PassAction, ResolvedPassAction, DEFAULT_CLEAR_COLOR, DEFAULT_CLEAR_DEPTH,
    DEFAULT_CLEAR_STENCIL,
};
pub use backend::{
    Backend, Command, DefaultFormats, GpuInit, HeadlessBackend, PassTarget, Recorder,
    SurfaceErrorAction, WgpuBackend,
};
pub use bindings::Bindings;
pub use config::*;
pub use desc::{
    AttachmentDesc, BlendState, BufferDesc, BufferLayoutDesc, DepthStencilState, ImageData,
    ImageDesc, LayoutDesc, PassDesc, PipelineDesc, RasterizerState, ShaderDesc, ShaderImageDesc,
    ShaderStageDesc, StencilState, UniformBlockDesc, UniformDesc, VertexAttrDesc,
};
pub use device::Device;
pub use error::{BackendError, DescError, GfxError, Result};
pub use id::{
    Buffer, Context, Image, Pass, Pipeline, ResourceId, ResourceKind, ResourceState, Shader,
    SlotInfo,
};
pub use info::{BufferInfo, ImageInfo, PassInfo, PipelineInfo, ShaderInfo};
pub use pass::PassEncoder;
pub use pool::MAX_POOL_SIZE;
pub use types::*;
