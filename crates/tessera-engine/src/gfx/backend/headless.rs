use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::gfx::action::ResolvedPassAction;
use crate::gfx::bindings::Bindings;
use crate::gfx::desc::{BufferDesc, ImageData, ImageDesc, PassDesc, PipelineDesc, ShaderDesc};
use crate::gfx::error::BackendError;
use crate::gfx::id::{Buffer, Context, Image, Pass, Pipeline, Shader};
use crate::gfx::types::{BackendKind, Features, Limits, PixelFormat, Rect, ShaderStage};

use super::{Backend, DefaultFormats, PassTarget};

/// One native call as seen by the headless backend.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    ActivateContext(Context),
    CreateBuffer(Buffer),
    DestroyBuffer(Buffer),
    UpdateBuffer { buffer: Buffer, len: usize },
    AppendBuffer { buffer: Buffer, offset: usize, len: usize },
    CreateImage(Image),
    DestroyImage(Image),
    UpdateImage(Image),
    CreateShader(Shader),
    DestroyShader(Shader),
    CreatePipeline(Pipeline),
    DestroyPipeline(Pipeline),
    CreatePass(Pass),
    DestroyPass(Pass),
    BeginPass { target: PassTarget, action: ResolvedPassAction, width: u32, height: u32 },
    Viewport(Rect),
    Scissor(Rect),
    ApplyPipeline(Pipeline),
    ApplyBindings(Bindings),
    ApplyUniforms { stage: ShaderStage, ub_index: usize, data: Vec<u8> },
    Draw { base_element: u32, num_elements: u32, num_instances: u32 },
    EndPass,
    Commit,
    Resize { width: u32, height: u32 },
}

#[derive(Debug, Default)]
struct Log {
    commands: Vec<Command>,
    buffers: HashMap<Buffer, Vec<u8>>,
}

/// Shared view into a [`HeadlessBackend`]'s call log.
///
/// Obtain it before handing the backend to the device.
#[derive(Debug, Clone, Default)]
pub struct Recorder(Rc<RefCell<Log>>);

impl Recorder {
    pub fn commands(&self) -> Vec<Command> {
        self.0.borrow().commands.clone()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().commands.clear();
    }

    /// Current content of a buffer as written through create/update/append.
    pub fn buffer_contents(&self, buffer: Buffer) -> Option<Vec<u8>> {
        self.0.borrow().buffers.get(&buffer).cloned()
    }

    pub fn draw_count(&self) -> usize {
        self.0
            .borrow()
            .commands
            .iter()
            .filter(|c| matches!(c, Command::Draw { .. }))
            .count()
    }

    fn push(&self, cmd: Command) {
        log::trace!("headless: {cmd:?}");
        self.0.borrow_mut().commands.push(cmd);
    }
}

/// Backend without a GPU.
///
/// Resources exist as bookkeeping only; every call is appended to a log that
/// a [`Recorder`] can inspect. Useful for tests and for running the loop
/// without a window.
#[derive(Debug)]
pub struct HeadlessBackend {
    recorder: Recorder,
    width: u32,
    height: u32,
    reject_shader_source: Option<String>,
}

impl HeadlessBackend {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            recorder: Recorder::default(),
            width,
            height,
            reject_shader_source: None,
        }
    }

    pub fn recorder(&self) -> Recorder {
        self.recorder.clone()
    }

    /// Makes shader creation fail for sources containing `marker`, standing
    /// in for a native compile error.
    pub fn rejecting_shader_source(mut self, marker: impl Into<String>) -> Self {
        self.reject_shader_source = Some(marker.into());
        self
    }
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new(640, 480)
    }
}

impl Backend for HeadlessBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Headless
    }

    fn features(&self) -> Features {
        Features {
            instancing: true,
            origin_top_left: true,
            multiple_render_targets: true,
            msaa_render_targets: true,
            image_type_3d: true,
            image_type_array: true,
            image_clamp_to_border: true,
        }
    }

    fn limits(&self) -> Limits {
        Limits {
            max_image_size_2d: 16384,
            max_image_size_cube: 16384,
            max_image_size_3d: 2048,
            max_image_size_array: 16384,
            max_image_array_layers: 2048,
            max_vertex_attrs: crate::gfx::MAX_VERTEX_ATTRIBUTES as u32,
        }
    }

    fn default_formats(&self) -> DefaultFormats {
        DefaultFormats {
            color: PixelFormat::Rgba8,
            depth: PixelFormat::DepthStencil,
            sample_count: 1,
        }
    }

    fn framebuffer_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.recorder.push(Command::Resize { width, height });
    }

    fn activate_context(&mut self, ctx: Context) {
        self.recorder.push(Command::ActivateContext(ctx));
    }

    fn create_buffer(&mut self, id: Buffer, desc: &BufferDesc<'_>) -> Result<(), BackendError> {
        let mut content = vec![0u8; desc.size];
        if let Some(data) = desc.data {
            content[..data.len()].copy_from_slice(data);
        }
        self.recorder.0.borrow_mut().buffers.insert(id, content);
        self.recorder.push(Command::CreateBuffer(id));
        Ok(())
    }

    fn destroy_buffer(&mut self, id: Buffer) {
        self.recorder.0.borrow_mut().buffers.remove(&id);
        self.recorder.push(Command::DestroyBuffer(id));
    }

    fn update_buffer(&mut self, id: Buffer, data: &[u8]) {
        if let Some(content) = self.recorder.0.borrow_mut().buffers.get_mut(&id) {
            content[..data.len()].copy_from_slice(data);
        }
        self.recorder.push(Command::UpdateBuffer {
            buffer: id,
            len: data.len(),
        });
    }

    fn append_buffer(&mut self, id: Buffer, offset: usize, data: &[u8]) {
        if let Some(content) = self.recorder.0.borrow_mut().buffers.get_mut(&id) {
            content[offset..offset + data.len()].copy_from_slice(data);
        }
        self.recorder.push(Command::AppendBuffer {
            buffer: id,
            offset,
            len: data.len(),
        });
    }

    fn create_image(&mut self, id: Image, _desc: &ImageDesc<'_>) -> Result<(), BackendError> {
        self.recorder.push(Command::CreateImage(id));
        Ok(())
    }

    fn destroy_image(&mut self, id: Image) {
        self.recorder.push(Command::DestroyImage(id));
    }

    fn update_image(&mut self, id: Image, _data: &ImageData<'_>) {
        self.recorder.push(Command::UpdateImage(id));
    }

    fn create_shader(&mut self, id: Shader, desc: &ShaderDesc<'_>) -> Result<(), BackendError> {
        if let Some(marker) = &self.reject_shader_source {
            let marker = marker.as_str();
            if desc.vs.source.contains(marker) || desc.fs.source.contains(marker) {
                return Err(BackendError::Native(format!("shader source contains {marker:?}")));
            }
        }
        self.recorder.push(Command::CreateShader(id));
        Ok(())
    }

    fn destroy_shader(&mut self, id: Shader) {
        self.recorder.push(Command::DestroyShader(id));
    }

    fn create_pipeline(
        &mut self,
        id: Pipeline,
        _desc: &PipelineDesc<'_>,
    ) -> Result<(), BackendError> {
        self.recorder.push(Command::CreatePipeline(id));
        Ok(())
    }

    fn destroy_pipeline(&mut self, id: Pipeline) {
        self.recorder.push(Command::DestroyPipeline(id));
    }

    fn create_pass(&mut self, id: Pass, _desc: &PassDesc<'_>) -> Result<(), BackendError> {
        self.recorder.push(Command::CreatePass(id));
        Ok(())
    }

    fn destroy_pass(&mut self, id: Pass) {
        self.recorder.push(Command::DestroyPass(id));
    }

    fn begin_pass(
        &mut self,
        target: PassTarget,
        action: &ResolvedPassAction,
        width: u32,
        height: u32,
    ) {
        self.recorder.push(Command::BeginPass {
            target,
            action: *action,
            width,
            height,
        });
    }

    fn apply_viewport(&mut self, rect: Rect, _origin_top_left: bool) {
        self.recorder.push(Command::Viewport(rect));
    }

    fn apply_scissor_rect(&mut self, rect: Rect, _origin_top_left: bool) {
        self.recorder.push(Command::Scissor(rect));
    }

    fn apply_pipeline(&mut self, id: Pipeline) {
        self.recorder.push(Command::ApplyPipeline(id));
    }

    fn apply_bindings(&mut self, bindings: &Bindings) {
        self.recorder.push(Command::ApplyBindings(*bindings));
    }

    fn apply_uniforms(&mut self, stage: ShaderStage, ub_index: usize, data: &[u8]) {
        self.recorder.push(Command::ApplyUniforms {
            stage,
            ub_index,
            data: data.to_vec(),
        });
    }

    fn draw(&mut self, base_element: u32, num_elements: u32, num_instances: u32) {
        self.recorder.push(Command::Draw {
            base_element,
            num_elements,
            num_instances,
        });
    }

    fn end_pass(&mut self) {
        self.recorder.push(Command::EndPass);
    }

    fn commit(&mut self) {
        self.recorder.push(Command::Commit);
    }
}
