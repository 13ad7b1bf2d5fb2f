//! Native graphics backends.
//!
//! [`Backend`] is the function table the [`Device`](super::Device) drives.
//! The device has already validated every call: handles passed in are live
//! and `Valid`, descriptors are resolved, and pass calls arrive in
//! begin/apply/draw/end order. A backend only turns them into native work.

mod headless;
mod gpu;

pub use headless::{Command, HeadlessBackend, Recorder};
pub use gpu::{GpuInit, SurfaceErrorAction, WgpuBackend};

use super::action::ResolvedPassAction;
use super::bindings::Bindings;
use super::config::GfxConfig;
use super::desc::{BufferDesc, ImageData, ImageDesc, PassDesc, PipelineDesc, ShaderDesc};
use super::error::BackendError;
use super::id::{Buffer, Context, Image, Pass, Pipeline, Shader};
use super::types::{BackendKind, Features, Limits, PixelFormat, Rect, ShaderStage};

/// Formats and sample count of the default framebuffer.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct DefaultFormats {
    pub color: PixelFormat,
    /// `PixelFormat::None` when the default framebuffer has no depth buffer.
    pub depth: PixelFormat,
    pub sample_count: u32,
}

/// Render target of a pass.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PassTarget {
    /// The window framebuffer.
    Default,
    Offscreen(Pass),
}

pub trait Backend {
    /// Called once by [`Device::setup`](super::Device::setup) with the
    /// resolved configuration.
    fn setup(&mut self, config: &GfxConfig) -> Result<(), BackendError> {
        let _ = config;
        Ok(())
    }

    /// False once the backend lost its native device or surface for good.
    fn is_healthy(&self) -> bool {
        true
    }

    fn kind(&self) -> BackendKind;
    fn features(&self) -> Features;
    fn limits(&self) -> Limits;
    fn default_formats(&self) -> DefaultFormats;

    /// Size of the default framebuffer in pixels.
    fn framebuffer_size(&self) -> (u32, u32);

    /// The default framebuffer changed size.
    fn resize(&mut self, width: u32, height: u32);

    /// Resources of a newly activated context will follow.
    fn activate_context(&mut self, ctx: Context) {
        let _ = ctx;
    }

    // ── resources ──────────────────────────────────────────────────────

    fn create_buffer(&mut self, id: Buffer, desc: &BufferDesc<'_>) -> Result<(), BackendError>;
    fn destroy_buffer(&mut self, id: Buffer);
    /// Replaces the content starting at offset 0.
    fn update_buffer(&mut self, id: Buffer, data: &[u8]);
    /// Writes `data` at `offset`, which the device reserved with an append.
    fn append_buffer(&mut self, id: Buffer, offset: usize, data: &[u8]);

    fn create_image(&mut self, id: Image, desc: &ImageDesc<'_>) -> Result<(), BackendError>;
    fn destroy_image(&mut self, id: Image);
    fn update_image(&mut self, id: Image, data: &ImageData<'_>);

    fn create_shader(&mut self, id: Shader, desc: &ShaderDesc<'_>) -> Result<(), BackendError>;
    fn destroy_shader(&mut self, id: Shader);

    fn create_pipeline(&mut self, id: Pipeline, desc: &PipelineDesc<'_>)
        -> Result<(), BackendError>;
    fn destroy_pipeline(&mut self, id: Pipeline);

    fn create_pass(&mut self, id: Pass, desc: &PassDesc<'_>) -> Result<(), BackendError>;
    fn destroy_pass(&mut self, id: Pass);

    // ── passes ─────────────────────────────────────────────────────────

    fn begin_pass(
        &mut self,
        target: PassTarget,
        action: &ResolvedPassAction,
        width: u32,
        height: u32,
    );
    fn apply_viewport(&mut self, rect: Rect, origin_top_left: bool);
    fn apply_scissor_rect(&mut self, rect: Rect, origin_top_left: bool);
    fn apply_pipeline(&mut self, id: Pipeline);
    fn apply_bindings(&mut self, bindings: &Bindings);
    fn apply_uniforms(&mut self, stage: ShaderStage, ub_index: usize, data: &[u8]);
    fn draw(&mut self, base_element: u32, num_elements: u32, num_instances: u32);
    fn end_pass(&mut self);

    /// Submits the frame's work and presents the default framebuffer.
    fn commit(&mut self);
}
