//! The graphics device: resource pools, lifecycle, streaming and frame commit.
//!
//! Every resource goes through `alloc -> init | fail -> destroy`. `make_*`
//! is the one-shot form: it always returns a handle, and construction
//! failures surface as the `Failed` state rather than as an error.
//!
//! Usage errors (wrong state, wrong context, streaming contract) are both
//! returned and logged, so a caller that discards them still sees them.

use std::cell::Cell;
use std::marker::PhantomData;

use super::action::PassAction;
use super::backend::{Backend, DefaultFormats, PassTarget};
use super::config::{
    GfxConfig, MAX_COLOR_ATTACHMENTS, MAX_SHADERSTAGE_BUFFERS, MAX_SHADERSTAGE_IMAGES,
    MAX_SHADERSTAGE_UBS, NUM_SHADER_STAGES,
};
use super::desc::{BufferDesc, ImageData, ImageDesc, PassDesc, PipelineDesc, ShaderDesc};
use super::error::{GfxError, Result};
use super::id::{Buffer, Context, Image, Pass, Pipeline, ResourceId, ResourceState, Shader};
use super::info::{BufferInfo, ImageInfo, PassInfo, PipelineInfo, ShaderInfo};
use super::pass::{PassEncoder, PassState};
use super::pool::Pool;
use super::streaming::{BufferStream, ImageStream};
use super::types::{
    BackendKind, BufferType, Features, ImageType, IndexType, Limits, PixelFormat,
    PixelFormatInfo, ShaderStage, Usage,
};
use super::validate::{self, AttachmentInfo};

thread_local! {
    static DEVICE_ACTIVE: Cell<bool> = const { Cell::new(false) };
}

// ── per-kind records ──────────────────────────────────────────────────────

pub(crate) struct BufferEntry {
    pub buffer_type: BufferType,
    pub stream: BufferStream,
}

pub(crate) struct ImageEntry {
    pub image_type: ImageType,
    pub render_target: bool,
    pub width: u32,
    pub height: u32,
    pub num_slices: u32,
    pub num_mipmaps: u32,
    pub pixel_format: PixelFormat,
    pub sample_count: u32,
    pub stream: ImageStream,
}

impl ImageEntry {
    fn new(desc: &ImageDesc<'_>) -> Self {
        Self {
            image_type: desc.image_type,
            render_target: desc.render_target,
            width: desc.width,
            height: desc.height,
            num_slices: desc.num_slices,
            num_mipmaps: desc.num_mipmaps,
            pixel_format: desc.pixel_format,
            sample_count: desc.sample_count,
            stream: ImageStream::new(desc.usage),
        }
    }

    /// Shape of the image as a data-less descriptor, for content checks.
    fn shape(&self) -> ImageDesc<'static> {
        ImageDesc {
            image_type: self.image_type,
            width: self.width,
            height: self.height,
            num_slices: self.num_slices,
            num_mipmaps: self.num_mipmaps,
            pixel_format: self.pixel_format,
            ..Default::default()
        }
    }
}

pub(crate) struct ShaderEntry {
    pub ub_sizes: [[usize; MAX_SHADERSTAGE_UBS]; NUM_SHADER_STAGES],
    pub images: [[Option<ImageType>; MAX_SHADERSTAGE_IMAGES]; NUM_SHADER_STAGES],
}

impl ShaderEntry {
    fn new(desc: &ShaderDesc<'_>) -> Self {
        let mut entry = Self {
            ub_sizes: [[0; MAX_SHADERSTAGE_UBS]; NUM_SHADER_STAGES],
            images: [[None; MAX_SHADERSTAGE_IMAGES]; NUM_SHADER_STAGES],
        };
        for stage in ShaderStage::ALL {
            let s = desc.stage(stage);
            for (dst, ub) in entry.ub_sizes[stage.index()].iter_mut().zip(&s.uniform_blocks) {
                *dst = ub.size;
            }
            for (dst, img) in entry.images[stage.index()].iter_mut().zip(&s.images) {
                *dst = img.image_type;
            }
        }
        entry
    }
}

pub(crate) struct PipelineEntry {
    pub shader: Shader,
    pub index_type: IndexType,
    pub used_buffers: [bool; MAX_SHADERSTAGE_BUFFERS],
    pub color_count: usize,
    pub color_format: PixelFormat,
    pub depth_format: PixelFormat,
    pub sample_count: u32,
}

pub(crate) struct PassEntry {
    pub colors: [Image; MAX_COLOR_ATTACHMENTS],
    pub color_formats: [PixelFormat; MAX_COLOR_ATTACHMENTS],
    pub color_count: usize,
    pub depth: Image,
    pub depth_format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub sample_count: u32,
}

// ── pool helpers ──────────────────────────────────────────────────────────

/// Logs a usage error and returns it.
pub(crate) fn reject<T>(op: &str, err: GfxError) -> Result<T> {
    log::error!("{op}: {err}");
    Err(err)
}

fn alloc_in<H: ResourceId, T>(pool: &mut Pool<H, T>, ctx: Context) -> H {
    match pool.alloc(ctx.id()) {
        Some(h) => h,
        None => {
            log::error!("{} pool exhausted ({} slots)", H::KIND, pool.capacity());
            H::from_raw(0)
        }
    }
}

/// Checks that `h` is live in `expected` state and owned by `ctx`.
fn check_state<H: ResourceId, T>(
    pool: &Pool<H, T>,
    h: H,
    ctx: Context,
    expected: ResourceState,
) -> Result<()> {
    if h.is_invalid() {
        return Err(GfxError::InvalidHandle { kind: H::KIND });
    }
    let Some(slot) = pool.get(h) else {
        return Err(GfxError::WrongState {
            kind: H::KIND,
            expected,
            actual: pool.state(h),
        });
    };
    if slot.state != expected {
        return Err(GfxError::WrongState {
            kind: H::KIND,
            expected,
            actual: slot.state,
        });
    }
    if slot.ctx != ctx.id() {
        return Err(GfxError::ContextMismatch { kind: H::KIND });
    }
    Ok(())
}

/// Item of a `Valid` resource owned by `ctx`.
pub(crate) fn valid<H: ResourceId, T>(pool: &Pool<H, T>, h: H, ctx: Context) -> Result<&T> {
    check_state(pool, h, ctx, ResourceState::Valid)?;
    pool.item(h).ok_or(GfxError::InvalidHandle { kind: H::KIND })
}

pub(crate) fn valid_mut<H: ResourceId, T>(
    pool: &mut Pool<H, T>,
    h: H,
    ctx: Context,
) -> Result<&mut T> {
    check_state(pool, h, ctx, ResourceState::Valid)?;
    pool.item_mut(h).ok_or(GfxError::InvalidHandle { kind: H::KIND })
}

/// Stores the outcome of an init and returns the resulting state.
fn finish_init<H: ResourceId, T>(
    pool: &mut Pool<H, T>,
    h: H,
    label: Option<&str>,
    result: Result<T>,
) -> ResourceState {
    let Some(slot) = pool.get_mut(h) else {
        return ResourceState::Invalid;
    };
    match result {
        Ok(item) => {
            slot.item = Some(item);
            slot.state = ResourceState::Valid;
            log::debug!("created {} {h:?} {}", H::KIND, label.unwrap_or(""));
        }
        Err(e) => {
            slot.state = ResourceState::Failed;
            log::error!(
                "failed to create {} {h:?} {}: {e}",
                H::KIND,
                label.unwrap_or("")
            );
        }
    }
    slot.state
}

/// Frees `h` if it belongs to `ctx`. Returns whether the backend holds
/// native storage for it.
fn release<H: ResourceId, T>(pool: &mut Pool<H, T>, h: H, ctx: Option<Context>) -> bool {
    let Some(slot) = pool.get(h) else {
        return false;
    };
    if let Some(ctx) = ctx {
        if slot.ctx != ctx.id() {
            log::warn!("destroy {h:?}: created in another context, ignored");
            return false;
        }
    }
    let had_storage = slot.state == ResourceState::Valid;
    pool.free(h);
    had_storage
}

// ── device ────────────────────────────────────────────────────────────────

/// Owner of every graphics resource on this thread.
pub struct Device {
    pub(crate) config: GfxConfig,
    pub(crate) backend: Box<dyn Backend>,
    pub(crate) contexts: Pool<Context, ()>,
    pub(crate) active_ctx: Context,
    pub(crate) buffers: Pool<Buffer, BufferEntry>,
    pub(crate) images: Pool<Image, ImageEntry>,
    pub(crate) shaders: Pool<Shader, ShaderEntry>,
    pub(crate) pipelines: Pool<Pipeline, PipelineEntry>,
    pub(crate) passes: Pool<Pass, PassEntry>,
    pub(crate) frame_index: u32,
    pub(crate) pass: Option<PassState>,
    _not_send: PhantomData<*const ()>,
}

impl Device {
    /// Sets up the device for this thread.
    ///
    /// Fails with [`GfxError::AlreadySetup`] while another device is alive on
    /// the same thread.
    pub fn setup(config: GfxConfig, backend: impl Backend + 'static) -> Result<Self> {
        if DEVICE_ACTIVE.get() {
            return Err(GfxError::AlreadySetup);
        }
        let config = config.resolved()?;
        let mut backend = backend;
        backend.setup(&config)?;
        DEVICE_ACTIVE.set(true);

        let mut device = Self {
            config,
            backend: Box::new(backend),
            contexts: Pool::new(config.context_pool_size),
            active_ctx: Context::INVALID,
            buffers: Pool::new(config.buffer_pool_size),
            images: Pool::new(config.image_pool_size),
            shaders: Pool::new(config.shader_pool_size),
            pipelines: Pool::new(config.pipeline_pool_size),
            passes: Pool::new(config.pass_pool_size),
            frame_index: 1,
            pass: None,
            _not_send: PhantomData,
        };
        device.setup_context();
        log::info!(
            "graphics device ready ({:?}, {}x{})",
            device.backend.kind(),
            device.framebuffer_size().0,
            device.framebuffer_size().1
        );
        Ok(device)
    }

    /// Destroys every live resource and releases the per-thread guard.
    pub fn shutdown(self) {
        drop(self);
    }

    pub fn config(&self) -> &GfxConfig {
        &self.config
    }

    // ── contexts ───────────────────────────────────────────────────────

    /// Creates a context and makes it active.
    pub fn setup_context(&mut self) -> Context {
        let Some(ctx) = self.contexts.alloc(0) else {
            log::error!("context pool exhausted");
            return Context::INVALID;
        };
        if let Some(slot) = self.contexts.get_mut(ctx) {
            slot.item = Some(());
            slot.state = ResourceState::Valid;
        }
        self.activate_context(ctx);
        ctx
    }

    pub fn activate_context(&mut self, ctx: Context) {
        if self.contexts.state(ctx) != ResourceState::Valid {
            log::error!("activate_context: {ctx:?} is not a live context");
            return;
        }
        self.active_ctx = ctx;
        self.backend.activate_context(ctx);
    }

    pub fn active_context(&self) -> Context {
        self.active_ctx
    }

    /// Destroys every resource created in `ctx`, then the context itself.
    pub fn discard_context(&mut self, ctx: Context) {
        if self.contexts.state(ctx) != ResourceState::Valid {
            return;
        }
        self.destroy_owned(Some(ctx));
        self.contexts.free(ctx);
        if self.active_ctx == ctx {
            self.active_ctx = Context::INVALID;
        }
        log::debug!("discarded {ctx:?}");
    }

    /// Destroys resources in dependency order, all of them when `ctx` is None.
    fn destroy_owned(&mut self, ctx: Option<Context>) {
        let raw = ctx.map(Context::id);
        for h in self.passes.live_handles(raw) {
            if release(&mut self.passes, h, ctx) {
                self.backend.destroy_pass(h);
            }
        }
        for h in self.pipelines.live_handles(raw) {
            if release(&mut self.pipelines, h, ctx) {
                self.backend.destroy_pipeline(h);
            }
        }
        for h in self.shaders.live_handles(raw) {
            if release(&mut self.shaders, h, ctx) {
                self.backend.destroy_shader(h);
            }
        }
        for h in self.images.live_handles(raw) {
            if release(&mut self.images, h, ctx) {
                self.backend.destroy_image(h);
            }
        }
        for h in self.buffers.live_handles(raw) {
            if release(&mut self.buffers, h, ctx) {
                self.backend.destroy_buffer(h);
            }
        }
    }

    // ── introspection ──────────────────────────────────────────────────

    /// False once the backend lost its native device or surface.
    pub fn is_valid(&self) -> bool {
        DEVICE_ACTIVE.get() && self.backend.is_healthy()
    }

    pub fn backend(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn features(&self) -> Features {
        self.backend.features()
    }

    pub fn limits(&self) -> Limits {
        self.backend.limits()
    }

    pub fn query_pixel_format(&self, format: PixelFormat) -> PixelFormatInfo {
        format.info()
    }

    pub fn default_formats(&self) -> DefaultFormats {
        self.backend.default_formats()
    }

    /// Frame counter, starting at 1 and advanced by [`Device::commit`].
    pub fn frame_index(&self) -> u32 {
        self.frame_index
    }

    pub fn framebuffer_size(&self) -> (u32, u32) {
        self.backend.framebuffer_size()
    }

    /// Reconfigures the default framebuffer.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.backend.resize(width, height);
    }

    // ── buffers ────────────────────────────────────────────────────────

    pub fn alloc_buffer(&mut self) -> Buffer {
        alloc_in(&mut self.buffers, self.active_ctx)
    }

    pub fn init_buffer(&mut self, buf: Buffer, desc: &BufferDesc<'_>) -> Result<ResourceState> {
        if let Err(e) = check_state(&self.buffers, buf, self.active_ctx, ResourceState::Alloc) {
            return reject("init_buffer", e);
        }
        let desc = desc.resolved();
        let result = validate::buffer(&desc)
            .map_err(GfxError::from)
            .and_then(|()| Ok(self.backend.create_buffer(buf, &desc)?))
            .map(|()| BufferEntry {
                buffer_type: desc.buffer_type,
                stream: BufferStream::new(desc.size, desc.usage),
            });
        Ok(finish_init(&mut self.buffers, buf, desc.label, result))
    }

    pub fn make_buffer(&mut self, desc: &BufferDesc<'_>) -> Buffer {
        let buf = self.alloc_buffer();
        if !buf.is_invalid() {
            let _ = self.init_buffer(buf, desc);
        }
        buf
    }

    pub fn fail_buffer(&mut self, buf: Buffer) -> Result<()> {
        fail_in(&mut self.buffers, buf, self.active_ctx)
    }

    pub fn destroy_buffer(&mut self, buf: Buffer) {
        if release(&mut self.buffers, buf, Some(self.active_ctx)) {
            self.backend.destroy_buffer(buf);
        }
    }

    pub fn query_buffer_state(&self, buf: Buffer) -> ResourceState {
        self.buffers.state(buf)
    }

    pub fn query_buffer_info(&self, buf: Buffer) -> BufferInfo {
        let slot = self.buffers.slot_info(buf);
        match self.buffers.item(buf) {
            Some(entry) => {
                let s = &entry.stream;
                BufferInfo {
                    slot,
                    update_frame_index: s.update_frame_index,
                    append_frame_index: s.append_frame_index,
                    append_pos: s.append_pos,
                    append_overflow: s.append_overflow,
                    num_slots: s.num_slots,
                    active_slot: s.active_slot,
                }
            }
            None => BufferInfo {
                slot,
                ..Default::default()
            },
        }
    }

    pub fn query_buffer_defaults<'a>(&self, desc: &BufferDesc<'a>) -> BufferDesc<'a> {
        desc.resolved()
    }

    // ── images ─────────────────────────────────────────────────────────

    pub fn alloc_image(&mut self) -> Image {
        alloc_in(&mut self.images, self.active_ctx)
    }

    pub fn init_image(&mut self, img: Image, desc: &ImageDesc<'_>) -> Result<ResourceState> {
        if let Err(e) = check_state(&self.images, img, self.active_ctx, ResourceState::Alloc) {
            return reject("init_image", e);
        }
        let desc = desc.resolved();
        let result = validate::image(&desc)
            .map_err(GfxError::from)
            .and_then(|()| Ok(self.backend.create_image(img, &desc)?))
            .map(|()| ImageEntry::new(&desc));
        Ok(finish_init(&mut self.images, img, desc.label, result))
    }

    pub fn make_image(&mut self, desc: &ImageDesc<'_>) -> Image {
        let img = self.alloc_image();
        if !img.is_invalid() {
            let _ = self.init_image(img, desc);
        }
        img
    }

    pub fn fail_image(&mut self, img: Image) -> Result<()> {
        fail_in(&mut self.images, img, self.active_ctx)
    }

    pub fn destroy_image(&mut self, img: Image) {
        if release(&mut self.images, img, Some(self.active_ctx)) {
            self.backend.destroy_image(img);
        }
    }

    pub fn query_image_state(&self, img: Image) -> ResourceState {
        self.images.state(img)
    }

    pub fn query_image_info(&self, img: Image) -> ImageInfo {
        let slot = self.images.slot_info(img);
        match self.images.item(img) {
            Some(entry) => ImageInfo {
                slot,
                update_frame_index: entry.stream.update_frame_index,
                num_slots: entry.stream.num_slots,
                active_slot: entry.stream.active_slot,
                width: entry.width,
                height: entry.height,
            },
            None => ImageInfo {
                slot,
                ..Default::default()
            },
        }
    }

    pub fn query_image_defaults<'a>(&self, desc: &ImageDesc<'a>) -> ImageDesc<'a> {
        desc.resolved()
    }

    // ── shaders ────────────────────────────────────────────────────────

    pub fn alloc_shader(&mut self) -> Shader {
        alloc_in(&mut self.shaders, self.active_ctx)
    }

    pub fn init_shader(&mut self, shd: Shader, desc: &ShaderDesc<'_>) -> Result<ResourceState> {
        if let Err(e) = check_state(&self.shaders, shd, self.active_ctx, ResourceState::Alloc) {
            return reject("init_shader", e);
        }
        let desc = desc.resolved();
        let result = validate::shader(&desc)
            .map_err(GfxError::from)
            .and_then(|()| Ok(self.backend.create_shader(shd, &desc)?))
            .map(|()| ShaderEntry::new(&desc));
        Ok(finish_init(&mut self.shaders, shd, desc.label, result))
    }

    pub fn make_shader(&mut self, desc: &ShaderDesc<'_>) -> Shader {
        let shd = self.alloc_shader();
        if !shd.is_invalid() {
            let _ = self.init_shader(shd, desc);
        }
        shd
    }

    pub fn fail_shader(&mut self, shd: Shader) -> Result<()> {
        fail_in(&mut self.shaders, shd, self.active_ctx)
    }

    pub fn destroy_shader(&mut self, shd: Shader) {
        if release(&mut self.shaders, shd, Some(self.active_ctx)) {
            self.backend.destroy_shader(shd);
        }
    }

    pub fn query_shader_state(&self, shd: Shader) -> ResourceState {
        self.shaders.state(shd)
    }

    pub fn query_shader_info(&self, shd: Shader) -> ShaderInfo {
        ShaderInfo {
            slot: self.shaders.slot_info(shd),
        }
    }

    pub fn query_shader_defaults<'a>(&self, desc: &ShaderDesc<'a>) -> ShaderDesc<'a> {
        desc.resolved()
    }

    // ── pipelines ──────────────────────────────────────────────────────

    pub fn alloc_pipeline(&mut self) -> Pipeline {
        alloc_in(&mut self.pipelines, self.active_ctx)
    }

    pub fn init_pipeline(
        &mut self,
        pip: Pipeline,
        desc: &PipelineDesc<'_>,
    ) -> Result<ResourceState> {
        if let Err(e) = check_state(&self.pipelines, pip, self.active_ctx, ResourceState::Alloc) {
            return reject("init_pipeline", e);
        }
        let desc = desc.resolved(self.backend.default_formats());
        let shader_valid = valid(&self.shaders, desc.shader, self.active_ctx).is_ok();
        let result = validate::pipeline(&desc, shader_valid)
            .map_err(GfxError::from)
            .and_then(|()| Ok(self.backend.create_pipeline(pip, &desc)?))
            .map(|()| PipelineEntry {
                shader: desc.shader,
                index_type: desc.index_type,
                used_buffers: desc.layout.used_buffers(),
                color_count: desc.blend.color_count,
                color_format: desc.blend.color_format,
                depth_format: desc.blend.depth_format,
                sample_count: desc.rasterizer.sample_count,
            });
        Ok(finish_init(&mut self.pipelines, pip, desc.label, result))
    }

    pub fn make_pipeline(&mut self, desc: &PipelineDesc<'_>) -> Pipeline {
        let pip = self.alloc_pipeline();
        if !pip.is_invalid() {
            let _ = self.init_pipeline(pip, desc);
        }
        pip
    }

    pub fn fail_pipeline(&mut self, pip: Pipeline) -> Result<()> {
        fail_in(&mut self.pipelines, pip, self.active_ctx)
    }

    pub fn destroy_pipeline(&mut self, pip: Pipeline) {
        if release(&mut self.pipelines, pip, Some(self.active_ctx)) {
            self.backend.destroy_pipeline(pip);
        }
    }

    pub fn query_pipeline_state(&self, pip: Pipeline) -> ResourceState {
        self.pipelines.state(pip)
    }

    pub fn query_pipeline_info(&self, pip: Pipeline) -> PipelineInfo {
        PipelineInfo {
            slot: self.pipelines.slot_info(pip),
        }
    }

    pub fn query_pipeline_defaults<'a>(&self, desc: &PipelineDesc<'a>) -> PipelineDesc<'a> {
        desc.resolved(self.backend.default_formats())
    }

    // ── passes ─────────────────────────────────────────────────────────

    pub fn alloc_pass(&mut self) -> Pass {
        alloc_in(&mut self.passes, self.active_ctx)
    }

    pub fn init_pass(&mut self, pass: Pass, desc: &PassDesc<'_>) -> Result<ResourceState> {
        if let Err(e) = check_state(&self.passes, pass, self.active_ctx, ResourceState::Alloc) {
            return reject("init_pass", e);
        }
        let images = &self.images;
        let ctx = self.active_ctx;
        let lookup = |img: Image| {
            valid(images, img, ctx).ok().map(|e| AttachmentInfo {
                valid_render_target: e.render_target,
                width: e.width,
                height: e.height,
                sample_count: e.sample_count,
                depth: e.pixel_format.is_depth(),
                num_mipmaps: e.num_mipmaps,
                num_slices: e.num_slices,
            })
        };
        let result = validate::pass(desc, lookup)
            .map_err(GfxError::from)
            .and_then(|()| Ok(self.backend.create_pass(pass, desc)?))
            .map(|()| self.pass_entry(desc));
        Ok(finish_init(&mut self.passes, pass, desc.label, result))
    }

    /// Attachment facts of a validated pass descriptor.
    fn pass_entry(&self, desc: &PassDesc<'_>) -> PassEntry {
        let mut entry = PassEntry {
            colors: [Image::INVALID; MAX_COLOR_ATTACHMENTS],
            color_formats: [PixelFormat::None; MAX_COLOR_ATTACHMENTS],
            color_count: desc.color_count(),
            depth: desc.depth_stencil_attachment.image,
            depth_format: PixelFormat::None,
            width: 0,
            height: 0,
            sample_count: 1,
        };
        for (i, att) in desc.color_attachments[..entry.color_count].iter().enumerate() {
            entry.colors[i] = att.image;
            if let Some(img) = self.images.item(att.image) {
                entry.color_formats[i] = img.pixel_format;
                entry.width = img.width;
                entry.height = img.height;
                entry.sample_count = img.sample_count;
            }
        }
        if let Some(img) = self.images.item(entry.depth) {
            entry.depth_format = img.pixel_format;
        }
        entry
    }

    pub fn make_pass(&mut self, desc: &PassDesc<'_>) -> Pass {
        let pass = self.alloc_pass();
        if !pass.is_invalid() {
            let _ = self.init_pass(pass, desc);
        }
        pass
    }

    pub fn fail_pass(&mut self, pass: Pass) -> Result<()> {
        fail_in(&mut self.passes, pass, self.active_ctx)
    }

    pub fn destroy_pass(&mut self, pass: Pass) {
        if release(&mut self.passes, pass, Some(self.active_ctx)) {
            self.backend.destroy_pass(pass);
        }
    }

    pub fn query_pass_state(&self, pass: Pass) -> ResourceState {
        self.passes.state(pass)
    }

    pub fn query_pass_info(&self, pass: Pass) -> PassInfo {
        PassInfo {
            slot: self.passes.slot_info(pass),
        }
    }

    pub fn query_pass_defaults<'a>(&self, desc: &PassDesc<'a>) -> PassDesc<'a> {
        *desc
    }

    // ── streaming ──────────────────────────────────────────────────────

    /// Replaces the buffer content. Allowed once per frame.
    pub fn update_buffer(&mut self, buf: Buffer, data: &[u8]) -> Result<()> {
        let frame = self.frame_index;
        let updated = valid_mut(&mut self.buffers, buf, self.active_ctx)
            .and_then(|entry| entry.stream.begin_update(frame, data.len()));
        if let Err(e) = updated {
            return reject("update_buffer", e);
        }
        self.backend.update_buffer(buf, data);
        Ok(())
    }

    /// Appends `data` and returns the offset it starts at.
    ///
    /// On overflow nothing is written, the buffer reports
    /// [`is_buffer_overflown`](Self::is_buffer_overflown) for the rest of the
    /// frame, and the current append position is returned.
    pub fn append_buffer(&mut self, buf: Buffer, data: &[u8]) -> Result<usize> {
        let frame = self.frame_index;
        let entry = match valid_mut(&mut self.buffers, buf, self.active_ctx) {
            Ok(entry) => entry,
            Err(e) => return reject("append_buffer", e),
        };
        let was_overflown = entry.stream.is_overflown(frame);
        let slot = match entry.stream.begin_append(frame, data.len()) {
            Ok(slot) => slot,
            Err(e) => return reject("append_buffer", e),
        };
        if !was_overflown && entry.stream.is_overflown(frame) {
            log::warn!(
                "{buf:?} overflowed at {} of {} bytes in frame {frame}",
                slot.offset,
                entry.stream.size
            );
        }
        if slot.write {
            self.backend.append_buffer(buf, slot.offset, data);
        }
        Ok(slot.offset)
    }

    pub fn is_buffer_overflown(&self, buf: Buffer) -> bool {
        self.buffers
            .item(buf)
            .is_some_and(|e| e.stream.is_overflown(self.frame_index))
    }

    /// Replaces the image content. Allowed once per frame; each provided
    /// subimage must match its mip size and mip 0 of every face is required.
    pub fn update_image(&mut self, img: Image, data: &ImageData<'_>) -> Result<()> {
        let frame = self.frame_index;
        let entry = match valid_mut(&mut self.images, img, self.active_ctx) {
            Ok(entry) => entry,
            Err(e) => return reject("update_image", e),
        };
        let shape = entry.shape();
        let content = validate::image_content(&shape, data).and_then(|()| {
            match (0..shape.num_faces()).find(|&f| data.subimages[f][0].is_empty()) {
                Some(face) => Err((face, 0, 0, shape.subimage_size(0))),
                None => Ok(()),
            }
        });
        if let Err((face, mip, len, expected)) = content {
            let err = GfxError::ImageDataSize {
                face,
                mip,
                len,
                expected,
            };
            return reject("update_image", err);
        }
        if let Err(e) = entry.stream.begin_update(frame) {
            return reject("update_image", e);
        }
        self.backend.update_image(img, data);
        Ok(())
    }

    // ── frame ──────────────────────────────────────────────────────────

    /// Opens a pass on the window framebuffer.
    pub fn begin_default_pass(&mut self, action: &PassAction) -> Result<PassEncoder<'_>> {
        if self.pass.is_some() {
            return reject("begin_default_pass", GfxError::PassAlreadyOpen);
        }
        let (width, height) = self.backend.framebuffer_size();
        let formats = self.backend.default_formats();
        let mut color_formats = [PixelFormat::None; MAX_COLOR_ATTACHMENTS];
        color_formats[0] = formats.color;
        let state = PassState {
            colors: [Image::INVALID; MAX_COLOR_ATTACHMENTS],
            depth: Image::INVALID,
            color_count: 1,
            color_formats,
            depth_format: formats.depth,
            sample_count: formats.sample_count,
            width,
            height,
            pipeline: None,
            bindings: None,
        };
        Ok(self.open_pass(PassTarget::Default, state, action))
    }

    /// Opens a pass rendering into the attachments of `pass`.
    pub fn begin_pass(&mut self, pass: Pass, action: &PassAction) -> Result<PassEncoder<'_>> {
        if self.pass.is_some() {
            return reject("begin_pass", GfxError::PassAlreadyOpen);
        }
        let entry = match valid(&self.passes, pass, self.active_ctx) {
            Ok(entry) => entry,
            Err(e) => return reject("begin_pass", e),
        };
        let state = PassState {
            colors: entry.colors,
            depth: entry.depth,
            color_count: entry.color_count,
            color_formats: entry.color_formats,
            depth_format: entry.depth_format,
            sample_count: entry.sample_count,
            width: entry.width,
            height: entry.height,
            pipeline: None,
            bindings: None,
        };
        Ok(self.open_pass(PassTarget::Offscreen(pass), state, action))
    }

    fn open_pass(
        &mut self,
        target: PassTarget,
        state: PassState,
        action: &PassAction,
    ) -> PassEncoder<'_> {
        self.backend
            .begin_pass(target, &action.resolved(), state.width, state.height);
        self.pass = Some(state);
        PassEncoder::new(self)
    }

    /// Submits the frame and advances the frame index.
    pub fn commit(&mut self) -> Result<()> {
        if self.pass.is_some() {
            return reject("commit", GfxError::CommitInsidePass);
        }
        self.backend.commit();
        self.frame_index = self.frame_index.checked_add(1).unwrap_or(1);
        Ok(())
    }
}

fn fail_in<H: ResourceId, T>(pool: &mut Pool<H, T>, h: H, ctx: Context) -> Result<()> {
    if let Err(e) = check_state(pool, h, ctx, ResourceState::Alloc) {
        return reject("fail", e);
    }
    if let Some(slot) = pool.get_mut(h) {
        slot.state = ResourceState::Failed;
    }
    Ok(())
}

impl Drop for Device {
    fn drop(&mut self) {
        if self.pass.take().is_some() {
            self.backend.end_pass();
        }
        self.destroy_owned(None);
        DEVICE_ACTIVE.set(false);
        log::info!("graphics device shut down");
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("backend", &self.backend.kind())
            .field("frame_index", &self.frame_index)
            .field("active_ctx", &self.active_ctx)
            .field("buffers", &self.buffers.live_count())
            .field("images", &self.images.live_count())
            .field("shaders", &self.shaders.live_count())
            .field("pipelines", &self.pipelines.live_count())
            .field("passes", &self.passes.live_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::backend::{Command, HeadlessBackend, Recorder};
    use crate::gfx::desc::ShaderStageDesc;
    use crate::gfx::id::ResourceKind;

    fn device() -> (Device, Recorder) {
        let backend = HeadlessBackend::new(320, 240);
        let rec = backend.recorder();
        (Device::setup(GfxConfig::default(), backend).unwrap(), rec)
    }

    fn small_device(buffers: usize) -> Device {
        let config = GfxConfig {
            buffer_pool_size: buffers,
            ..Default::default()
        };
        Device::setup(config, HeadlessBackend::default()).unwrap()
    }

    fn stream_buffer(dev: &mut Device, size: usize, usage: Usage) -> Buffer {
        dev.make_buffer(&BufferDesc {
            size,
            usage,
            ..Default::default()
        })
    }

    fn shader_desc() -> ShaderDesc<'static> {
        let stage = |source| ShaderStageDesc {
            source,
            ..Default::default()
        };
        ShaderDesc {
            vs: stage("fn main() {}"),
            fs: stage("fn main() {}"),
            label: Some("test"),
        }
    }

    // ── setup ─────────────────────────────────────────────────────────────

    #[test]
    fn second_setup_on_same_thread_fails() {
        let (dev, _) = device();
        let second = Device::setup(GfxConfig::default(), HeadlessBackend::default());
        assert_eq!(second.unwrap_err(), GfxError::AlreadySetup);
        dev.shutdown();
        let third = Device::setup(GfxConfig::default(), HeadlessBackend::default());
        assert!(third.is_ok());
    }

    #[test]
    fn frame_index_starts_at_one() {
        let (mut dev, _) = device();
        assert_eq!(dev.frame_index(), 1);
        dev.commit().unwrap();
        assert_eq!(dev.frame_index(), 2);
    }

    // ── lifecycle ─────────────────────────────────────────────────────────

    #[test]
    fn alloc_init_destroy() {
        let (mut dev, rec) = device();
        let buf = dev.alloc_buffer();
        assert_eq!(dev.query_buffer_state(buf), ResourceState::Alloc);

        let data = [1u8; 16];
        let desc = BufferDesc {
            data: Some(&data),
            ..Default::default()
        };
        assert_eq!(dev.init_buffer(buf, &desc).unwrap(), ResourceState::Valid);
        assert_eq!(rec.buffer_contents(buf).unwrap(), data.to_vec());

        dev.destroy_buffer(buf);
        assert_eq!(dev.query_buffer_state(buf), ResourceState::Initial);
        assert!(rec.commands().contains(&Command::DestroyBuffer(buf)));
    }

    #[test]
    fn init_requires_alloc_state() {
        let (mut dev, _) = device();
        let buf = stream_buffer(&mut dev, 64, Usage::Stream);
        let err = dev.init_buffer(buf, &BufferDesc::default()).unwrap_err();
        assert!(matches!(err, GfxError::WrongState { .. }));
        assert_eq!(dev.query_buffer_state(buf), ResourceState::Valid);
    }

    #[test]
    fn invalid_descriptor_yields_failed_handle() {
        let (mut dev, rec) = device();
        let buf = dev.make_buffer(&BufferDesc::default());
        assert!(!buf.is_invalid());
        assert_eq!(dev.query_buffer_state(buf), ResourceState::Failed);
        assert!(!rec.commands().contains(&Command::CreateBuffer(buf)));

        // failed resources can still be destroyed, without backend work
        dev.destroy_buffer(buf);
        assert_eq!(dev.query_buffer_state(buf), ResourceState::Initial);
        assert!(!rec.commands().contains(&Command::DestroyBuffer(buf)));
    }

    #[test]
    fn backend_rejection_yields_failed_handle() {
        let backend = HeadlessBackend::default().rejecting_shader_source("broken");
        let mut dev = Device::setup(GfxConfig::default(), backend).unwrap();
        let mut desc = shader_desc();
        desc.fs.source = "broken";
        let shd = dev.make_shader(&desc);
        assert_eq!(dev.query_shader_state(shd), ResourceState::Failed);
        let ok = dev.make_shader(&shader_desc());
        assert_eq!(dev.query_shader_state(ok), ResourceState::Valid);
    }

    #[test]
    fn fail_moves_alloc_to_failed() {
        let (mut dev, _) = device();
        let img = dev.alloc_image();
        dev.fail_image(img).unwrap();
        assert_eq!(dev.query_image_state(img), ResourceState::Failed);
        assert!(dev.fail_image(img).is_err());
    }

    #[test]
    fn every_kind_can_fail_and_be_destroyed() {
        let (mut dev, _) = device();
        let buf = dev.alloc_buffer();
        let shd = dev.alloc_shader();
        let pip = dev.alloc_pipeline();
        let pass = dev.alloc_pass();
        dev.fail_buffer(buf).unwrap();
        dev.fail_shader(shd).unwrap();
        dev.fail_pipeline(pip).unwrap();
        dev.fail_pass(pass).unwrap();
        assert_eq!(dev.query_buffer_state(buf), ResourceState::Failed);
        assert_eq!(dev.query_shader_state(shd), ResourceState::Failed);
        assert_eq!(dev.query_pipeline_state(pip), ResourceState::Failed);
        assert_eq!(dev.query_pass_state(pass), ResourceState::Failed);

        dev.destroy_buffer(buf);
        dev.destroy_pass(pass);
        assert_eq!(dev.query_buffer_state(buf), ResourceState::Initial);
        assert_eq!(dev.query_pass_state(pass), ResourceState::Initial);
        assert!(dev.fail_buffer(Buffer::INVALID).is_err());
    }

    #[test]
    fn double_destroy_is_noop() {
        let (mut dev, rec) = device();
        let buf = stream_buffer(&mut dev, 64, Usage::Stream);
        dev.destroy_buffer(buf);
        dev.destroy_buffer(buf);
        dev.destroy_buffer(Buffer::INVALID);
        let destroys = rec
            .commands()
            .iter()
            .filter(|c| matches!(c, Command::DestroyBuffer(_)))
            .count();
        assert_eq!(destroys, 1);
    }

    #[test]
    fn stale_handle_after_slot_reuse() {
        let mut dev = small_device(1);
        let a = stream_buffer(&mut dev, 16, Usage::Stream);
        dev.destroy_buffer(a);
        let b = stream_buffer(&mut dev, 16, Usage::Stream);
        assert_ne!(a, b);
        assert_eq!(dev.query_buffer_state(a), ResourceState::Initial);
        assert_eq!(dev.query_buffer_state(b), ResourceState::Valid);
        assert!(dev.update_buffer(a, &[0; 4]).is_err());
    }

    #[test]
    fn pool_exhaustion_returns_invalid_handle() {
        let mut dev = small_device(2);
        let a = dev.alloc_buffer();
        let b = dev.alloc_buffer();
        let c = dev.alloc_buffer();
        assert!(!a.is_invalid() && !b.is_invalid());
        assert!(c.is_invalid());
        assert_eq!(dev.query_buffer_state(c), ResourceState::Invalid);
        dev.destroy_buffer(a);
        assert!(!dev.alloc_buffer().is_invalid());
    }

    #[test]
    fn info_reports_slot_and_stream_state() {
        let (mut dev, _) = device();
        let buf = stream_buffer(&mut dev, 64, Usage::Stream);
        dev.append_buffer(buf, &[0; 6]).unwrap();
        let info = dev.query_buffer_info(buf);
        assert_eq!(info.slot.state, ResourceState::Valid);
        assert_eq!(info.slot.res_id, buf.id());
        assert_eq!(info.slot.ctx_id, dev.active_context().id());
        assert_eq!(info.append_pos, 8);
        assert_eq!(info.append_frame_index, 1);
        assert_eq!(info.num_slots, 2);
    }

    #[test]
    fn defaults_fill_unset_fields() {
        let (dev, _) = device();
        let desc = dev.query_image_defaults(&ImageDesc {
            width: 4,
            height: 4,
            ..Default::default()
        });
        assert_eq!(desc.pixel_format, PixelFormat::Rgba8);
        assert_eq!(desc.num_mipmaps, 1);
        assert_eq!(desc.sample_count, 1);
    }

    // ── contexts ──────────────────────────────────────────────────────────

    #[test]
    fn discard_context_destroys_its_resources() {
        let (mut dev, _) = device();
        let main_ctx = dev.active_context();
        let kept = stream_buffer(&mut dev, 16, Usage::Stream);

        let ctx = dev.setup_context();
        let owned = stream_buffer(&mut dev, 16, Usage::Stream);
        assert_eq!(dev.query_buffer_info(owned).slot.ctx_id, ctx.id());

        dev.discard_context(ctx);
        assert_eq!(dev.query_buffer_state(owned), ResourceState::Initial);
        assert_eq!(dev.query_buffer_state(kept), ResourceState::Valid);

        dev.activate_context(main_ctx);
        assert_eq!(dev.active_context(), main_ctx);
    }

    #[test]
    fn cross_context_use_is_detected() {
        let (mut dev, _) = device();
        let main_ctx = dev.active_context();
        let buf = stream_buffer(&mut dev, 16, Usage::Stream);

        dev.setup_context();
        let err = dev.update_buffer(buf, &[0; 4]).unwrap_err();
        assert_eq!(
            err,
            GfxError::ContextMismatch {
                kind: ResourceKind::Buffer
            }
        );
        // destroy from the wrong context is ignored
        dev.destroy_buffer(buf);
        assert_eq!(dev.query_buffer_state(buf), ResourceState::Valid);

        dev.activate_context(main_ctx);
        dev.update_buffer(buf, &[0; 4]).unwrap();
    }

    // ── streaming ─────────────────────────────────────────────────────────

    #[test]
    fn update_once_per_frame() {
        let (mut dev, rec) = device();
        let buf = stream_buffer(&mut dev, 16, Usage::Dynamic);
        dev.update_buffer(buf, &[1; 8]).unwrap();
        let err = dev.update_buffer(buf, &[2; 8]).unwrap_err();
        assert_eq!(
            err,
            GfxError::AlreadyUpdated {
                kind: ResourceKind::Buffer
            }
        );
        assert_eq!(&rec.buffer_contents(buf).unwrap()[..8], &[1; 8]);

        dev.commit().unwrap();
        dev.update_buffer(buf, &[3; 8]).unwrap();
        assert_eq!(&rec.buffer_contents(buf).unwrap()[..8], &[3; 8]);
    }

    #[test]
    fn update_rejects_immutable_and_oversized() {
        let (mut dev, _) = device();
        let data = [0u8; 8];
        let imm = dev.make_buffer(&BufferDesc {
            data: Some(&data),
            ..Default::default()
        });
        assert!(matches!(
            dev.update_buffer(imm, &data),
            Err(GfxError::Immutable { .. })
        ));
        let buf = stream_buffer(&mut dev, 4, Usage::Stream);
        assert!(matches!(
            dev.update_buffer(buf, &data),
            Err(GfxError::DataTooLarge { len: 8, size: 4 })
        ));
    }

    #[test]
    fn append_overflow_sets_flag_until_next_frame() {
        let (mut dev, rec) = device();
        let buf = stream_buffer(&mut dev, 16, Usage::Stream);
        assert_eq!(dev.append_buffer(buf, &[1; 10]).unwrap(), 0);
        assert_eq!(dev.append_buffer(buf, &[2; 8]).unwrap(), 12);
        assert!(dev.is_buffer_overflown(buf));
        let appends = rec
            .commands()
            .iter()
            .filter(|c| matches!(c, Command::AppendBuffer { .. }))
            .count();
        assert_eq!(appends, 1);

        dev.commit().unwrap();
        assert!(!dev.is_buffer_overflown(buf));
        assert_eq!(dev.append_buffer(buf, &[3; 4]).unwrap(), 0);
    }

    #[test]
    fn update_image_checks_content_size() {
        let (mut dev, _) = device();
        let img = dev.make_image(&ImageDesc {
            width: 2,
            height: 2,
            usage: Usage::Dynamic,
            ..Default::default()
        });
        assert_eq!(dev.query_image_state(img), ResourceState::Valid);

        let short = [0u8; 8];
        assert!(matches!(
            dev.update_image(img, &ImageData::new(&short)),
            Err(GfxError::ImageDataSize { expected: 16, .. })
        ));
        let pixels = [0u8; 16];
        dev.update_image(img, &ImageData::new(&pixels)).unwrap();
        assert!(matches!(
            dev.update_image(img, &ImageData::new(&pixels)),
            Err(GfxError::AlreadyUpdated { .. })
        ));
        assert_eq!(dev.query_image_info(img).update_frame_index, 1);
    }

    // ── frame ─────────────────────────────────────────────────────────────

    #[test]
    fn commit_inside_leaked_pass_is_rejected() {
        let (mut dev, _) = device();
        let enc = dev.begin_default_pass(&PassAction::default()).unwrap();
        std::mem::forget(enc);
        assert_eq!(dev.commit().unwrap_err(), GfxError::CommitInsidePass);
        assert!(matches!(
            dev.begin_default_pass(&PassAction::default()),
            Err(GfxError::PassAlreadyOpen)
        ));
    }

    #[test]
    fn drop_destroys_live_resources() {
        let (mut dev, rec) = device();
        let buf = stream_buffer(&mut dev, 16, Usage::Stream);
        let shd = dev.make_shader(&shader_desc());
        drop(dev);
        let cmds = rec.commands();
        assert!(cmds.contains(&Command::DestroyBuffer(buf)));
        assert!(cmds.contains(&Command::DestroyShader(shd)));
    }
}
