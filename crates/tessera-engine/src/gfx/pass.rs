//! Render pass encoding.
//!
//! A [`PassEncoder`] mutably borrows the [`Device`] for the whole pass, so
//! resource creation, `commit` and a second `begin` are rejected at compile
//! time while it is alive:
//!
//! ```compile_fail
//! use tessera_engine::gfx::{Device, GfxConfig, HeadlessBackend, PassAction};
//!
//! let mut dev = Device::setup(GfxConfig::default(), HeadlessBackend::default()).unwrap();
//! let first = dev.begin_default_pass(&PassAction::default()).unwrap();
//! let second = dev.begin_default_pass(&PassAction::default()).unwrap();
//! first.end();
//! second.end();
//! ```

use bytemuck::Pod;

use super::bindings::Bindings;
use super::config::{MAX_COLOR_ATTACHMENTS, MAX_SHADERSTAGE_BUFFERS};
use super::desc::ImageData;
use super::device::{reject, valid, Device};
use super::error::{GfxError, Result};
use super::id::{Buffer, Image, Pipeline, ResourceId};
use super::types::{BufferType, IndexType, PixelFormat, Rect, ShaderStage};

/// Facts about the open pass the encoder validates against.
#[derive(Debug)]
pub(crate) struct PassState {
    pub colors: [Image; MAX_COLOR_ATTACHMENTS],
    pub depth: Image,
    pub color_count: usize,
    pub color_formats: [PixelFormat; MAX_COLOR_ATTACHMENTS],
    pub depth_format: PixelFormat,
    pub sample_count: u32,
    pub width: u32,
    pub height: u32,
    pub pipeline: Option<Pipeline>,
    pub bindings: Option<Bindings>,
}

impl PassState {
    fn is_attachment(&self, img: Image) -> bool {
        !img.is_invalid() && (self.colors.contains(&img) || self.depth == img)
    }
}

/// An open render pass. Finish it with [`end`](Self::end).
pub struct PassEncoder<'d> {
    device: &'d mut Device,
    ended: bool,
}

impl<'d> PassEncoder<'d> {
    pub(crate) fn new(device: &'d mut Device) -> Self {
        Self {
            device,
            ended: false,
        }
    }

    fn state(&self) -> Result<&PassState> {
        self.device.pass.as_ref().ok_or(GfxError::NoPipeline)
    }

    fn state_mut(&mut self) -> Result<&mut PassState> {
        self.device.pass.as_mut().ok_or(GfxError::NoPipeline)
    }

    /// Size of the pass's render target.
    pub fn size(&self) -> (u32, u32) {
        self.device
            .pass
            .as_ref()
            .map_or((0, 0), |p| (p.width, p.height))
    }

    pub fn apply_viewport(
        &mut self,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        origin_top_left: bool,
    ) {
        self.device
            .backend
            .apply_viewport(Rect::new(x, y, width, height), origin_top_left);
    }

    pub fn apply_scissor_rect(
        &mut self,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        origin_top_left: bool,
    ) {
        self.device
            .backend
            .apply_scissor_rect(Rect::new(x, y, width, height), origin_top_left);
    }

    /// Selects the pipeline for following draws and clears the bindings.
    pub fn apply_pipeline(&mut self, pip: Pipeline) -> Result<()> {
        let checked = self.check_pipeline(pip);
        let state = self.state_mut()?;
        state.bindings = None;
        match checked {
            Ok(()) => {
                state.pipeline = Some(pip);
                self.device.backend.apply_pipeline(pip);
                Ok(())
            }
            Err(e) => {
                state.pipeline = None;
                reject("apply_pipeline", e)
            }
        }
    }

    fn check_pipeline(&self, pip: Pipeline) -> Result<()> {
        let dev = &*self.device;
        let ctx = dev.active_ctx;
        let entry = valid(&dev.pipelines, pip, ctx)?;
        valid(&dev.shaders, entry.shader, ctx)?;
        let pass = self.state()?;

        if entry.color_count != pass.color_count {
            return Err(GfxError::PipelinePassMismatch("color attachment count"));
        }
        if pass.color_formats[..pass.color_count]
            .iter()
            .any(|&f| f != entry.color_format)
        {
            return Err(GfxError::PipelinePassMismatch("color format"));
        }
        if entry.depth_format != pass.depth_format {
            return Err(GfxError::PipelinePassMismatch("depth format"));
        }
        if entry.sample_count != pass.sample_count {
            return Err(GfxError::PipelinePassMismatch("sample count"));
        }
        Ok(())
    }

    /// Binds buffers and images for following draws.
    pub fn apply_bindings(&mut self, bindings: &Bindings) -> Result<()> {
        let checked = self.check_bindings(bindings);
        let state = self.state_mut()?;
        match checked {
            Ok(()) => {
                state.bindings = Some(*bindings);
                self.device.backend.apply_bindings(bindings);
                Ok(())
            }
            Err(e) => {
                state.bindings = None;
                reject("apply_bindings", e)
            }
        }
    }

    fn check_bindings(&self, bindings: &Bindings) -> Result<()> {
        let dev = &*self.device;
        let ctx = dev.active_ctx;
        let pass = self.state()?;
        let pip = pass.pipeline.ok_or(GfxError::NoPipeline)?;
        let pipeline = valid(&dev.pipelines, pip, ctx)?;
        let shader = valid(&dev.shaders, pipeline.shader, ctx)?;

        for slot in 0..MAX_SHADERSTAGE_BUFFERS {
            let buf = bindings.vertex_buffers[slot];
            if buf.is_invalid() {
                if pipeline.used_buffers[slot] {
                    return Err(GfxError::MissingVertexBuffer { slot });
                }
                continue;
            }
            let entry = valid(&dev.buffers, buf, ctx)?;
            if entry.buffer_type != BufferType::Vertex {
                return Err(GfxError::BufferType { slot: "vertex" });
            }
            // An overflowed append hands back the end of the buffer; the
            // draw is dropped later instead.
            let offset = bindings.vertex_buffer_offsets[slot];
            if offset >= entry.stream.size && !entry.stream.is_overflown(dev.frame_index) {
                return Err(GfxError::OffsetOutOfRange {
                    offset,
                    size: entry.stream.size,
                });
            }
        }

        match (pipeline.index_type, bindings.index_buffer.is_invalid()) {
            (IndexType::None, false) => return Err(GfxError::UnexpectedIndexBuffer),
            (IndexType::None, true) => {}
            (_, true) => return Err(GfxError::MissingIndexBuffer),
            (_, false) => {
                let entry = valid(&dev.buffers, bindings.index_buffer, ctx)?;
                if entry.buffer_type != BufferType::Index {
                    return Err(GfxError::BufferType { slot: "index" });
                }
                if bindings.index_buffer_offset >= entry.stream.size
                    && !entry.stream.is_overflown(dev.frame_index)
                {
                    return Err(GfxError::OffsetOutOfRange {
                        offset: bindings.index_buffer_offset,
                        size: entry.stream.size,
                    });
                }
            }
        }

        for stage in ShaderStage::ALL {
            let declared = &shader.images[stage.index()];
            let images = bindings.images(stage).iter().zip(declared);
            for (slot, (&img, &expected)) in images.enumerate() {
                let actual = if img.is_invalid() {
                    None
                } else {
                    if pass.is_attachment(img) {
                        return Err(GfxError::ImageIsAttachment);
                    }
                    Some(valid(&dev.images, img, ctx)?.image_type)
                };
                if actual != expected {
                    return Err(GfxError::ImageTypeMismatch {
                        stage,
                        slot,
                        expected,
                        actual,
                    });
                }
            }
        }
        Ok(())
    }

    /// Uploads one uniform block for following draws. `data` must be exactly
    /// the size the shader declared for the block.
    pub fn apply_uniforms(
        &mut self,
        stage: ShaderStage,
        ub_index: usize,
        data: &[u8],
    ) -> Result<()> {
        if let Err(e) = self.check_uniforms(stage, ub_index, data.len()) {
            return reject("apply_uniforms", e);
        }
        self.device.backend.apply_uniforms(stage, ub_index, data);
        Ok(())
    }

    pub fn apply_uniforms_typed<T: Pod>(
        &mut self,
        stage: ShaderStage,
        ub_index: usize,
        value: &T,
    ) -> Result<()> {
        self.apply_uniforms(stage, ub_index, bytemuck::bytes_of(value))
    }

    fn check_uniforms(&self, stage: ShaderStage, ub_index: usize, len: usize) -> Result<()> {
        let dev = &*self.device;
        let pip = self.state()?.pipeline.ok_or(GfxError::NoPipeline)?;
        let pipeline = valid(&dev.pipelines, pip, dev.active_ctx)?;
        let shader = valid(&dev.shaders, pipeline.shader, dev.active_ctx)?;
        let expected = match shader.ub_sizes[stage.index()].get(ub_index) {
            Some(&size) if size > 0 => size,
            _ => {
                return Err(GfxError::UniformBlockMissing {
                    stage,
                    slot: ub_index,
                });
            }
        };
        if len != expected {
            return Err(GfxError::UniformSize {
                expected,
                actual: len,
            });
        }
        Ok(())
    }

    /// Draws `num_elements` vertices or indices starting at `base_element`.
    ///
    /// Zero elements or instances draw nothing. A draw whose bound buffers
    /// overflowed this frame is skipped.
    pub fn draw(&mut self, base_element: u32, num_elements: u32, num_instances: u32) -> Result<()> {
        let state = self.state()?;
        if state.pipeline.is_none() {
            return reject("draw", GfxError::NoPipeline);
        }
        let Some(bindings) = state.bindings else {
            return reject("draw", GfxError::NoBindings);
        };
        if num_elements == 0 || num_instances == 0 {
            return Ok(());
        }
        let overflown = bindings
            .vertex_buffers
            .iter()
            .chain(std::iter::once(&bindings.index_buffer))
            .any(|&buf| self.device.is_buffer_overflown(buf));
        if overflown {
            log::debug!("draw skipped: a bound buffer overflowed this frame");
            return Ok(());
        }
        self.device
            .backend
            .draw(base_element, num_elements, num_instances);
        Ok(())
    }

    // ── streaming inside a pass ────────────────────────────────────────

    pub fn append_buffer(&mut self, buf: Buffer, data: &[u8]) -> Result<usize> {
        self.device.append_buffer(buf, data)
    }

    pub fn update_buffer(&mut self, buf: Buffer, data: &[u8]) -> Result<()> {
        self.device.update_buffer(buf, data)
    }

    pub fn update_image(&mut self, img: Image, data: &ImageData<'_>) -> Result<()> {
        self.device.update_image(img, data)
    }

    pub fn is_buffer_overflown(&self, buf: Buffer) -> bool {
        self.device.is_buffer_overflown(buf)
    }

    /// Finishes the pass.
    pub fn end(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        if self.ended {
            return;
        }
        self.ended = true;
        self.device.backend.end_pass();
        self.device.pass = None;
    }
}

impl Drop for PassEncoder<'_> {
    fn drop(&mut self) {
        if !self.ended {
            log::warn!("pass encoder dropped without end(), ending the pass");
            self.finish();
        }
    }
}
