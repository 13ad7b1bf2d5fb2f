//! wgpu backend.
//!
//! Buffers and images are single native objects: wgpu orders queue writes
//! against in-flight frames itself, so the device's per-frame slot rotation
//! is bookkeeping only. Uniforms are staged into one per-frame buffer and
//! bound with dynamic offsets.

mod context;
mod convert;
mod encode;
mod init;
mod resources;
mod surface;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use winit::dpi::PhysicalSize;
use winit::window::Window;

pub use init::GpuInit;
pub use surface::SurfaceErrorAction;

use self::context::{Gpu, SurfaceFrame};
use self::encode::{Recorded, Targets};
use self::resources::{GpuBuffer, GpuImage, GpuPass, GpuPipeline, GpuShader, SamplerCache};
use super::{Backend, DefaultFormats, PassTarget};
use crate::gfx::action::ResolvedPassAction;
use crate::gfx::bindings::Bindings;
use crate::gfx::config::{
    DEFAULT_SAMPLER_CACHE_SIZE, GfxConfig, MAX_SHADERSTAGE_UBS, NUM_SHADER_STAGES,
};
use crate::gfx::desc::{BufferDesc, ImageData, ImageDesc, PassDesc, PipelineDesc, ShaderDesc};
use crate::gfx::error::BackendError;
use crate::gfx::id::{Buffer, Image, Pass, Pipeline, ResourceId, ResourceKind, Shader};
use crate::gfx::types::{BackendKind, Features, Limits, PixelFormat, Rect, ShaderStage};

/// A pass being recorded.
struct OpenPass {
    target: PassTarget,
    action: ResolvedPassAction,
    width: u32,
    height: u32,
    commands: Vec<Recorded>,
    pipeline: Option<Pipeline>,
    /// Dynamic offsets of each stage's uniform blocks.
    ub_offsets: [[u32; MAX_SHADERSTAGE_UBS]; NUM_SHADER_STAGES],
}

pub struct WgpuBackend {
    gpu: Gpu,
    color_format: PixelFormat,
    buffers: HashMap<Buffer, GpuBuffer>,
    images: HashMap<Image, GpuImage>,
    shaders: HashMap<Shader, GpuShader>,
    pipelines: HashMap<Pipeline, GpuPipeline>,
    passes: HashMap<Pass, GpuPass>,
    samplers: SamplerCache,
    uniform_buffer: Option<wgpu::Buffer>,
    uniform_data: Vec<u8>,
    uniform_overflow_warned: bool,
    encoder: Option<wgpu::CommandEncoder>,
    surface_frame: Option<SurfaceFrame>,
    surface_acquired: bool,
    open: Option<OpenPass>,
}

impl WgpuBackend {
    /// Creates the device and the window surface.
    pub fn new(window: Arc<Window>, init: &GpuInit) -> Result<Self> {
        let gpu = pollster::block_on(Gpu::new(window, init))?;
        let surface_format = gpu.surface_format();
        let color_format = convert::surface_pixel_format(surface_format)
            .ok_or_else(|| anyhow::anyhow!("unsupported surface format {surface_format:?}"))?;
        let clamp_to_border = gpu
            .device
            .features()
            .contains(wgpu::Features::ADDRESS_MODE_CLAMP_TO_BORDER);

        Ok(Self {
            gpu,
            color_format,
            buffers: HashMap::new(),
            images: HashMap::new(),
            shaders: HashMap::new(),
            pipelines: HashMap::new(),
            passes: HashMap::new(),
            samplers: SamplerCache::new(DEFAULT_SAMPLER_CACHE_SIZE, clamp_to_border),
            uniform_buffer: None,
            uniform_data: Vec::new(),
            uniform_overflow_warned: false,
            encoder: None,
            surface_frame: None,
            surface_acquired: false,
            open: None,
        })
    }

    fn uniform_alignment(&self) -> usize {
        self.gpu.device.limits().min_uniform_buffer_offset_alignment as usize
    }

    fn encoder(&mut self) -> &mut wgpu::CommandEncoder {
        let device = &self.gpu.device;
        self.encoder.get_or_insert_with(|| {
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("tessera frame encoder"),
            })
        })
    }

    fn record(&mut self, cmd: Recorded) {
        if let Some(open) = self.open.as_mut() {
            open.commands.push(cmd);
        }
    }

    /// Re-binds a stage's uniform group with the current offsets.
    fn record_uniform_group(&mut self, stage: ShaderStage) {
        let Some(open) = self.open.as_ref() else { return };
        let Some(shader) = open
            .pipeline
            .and_then(|p| self.pipelines.get(&p))
            .and_then(|p| self.shaders.get(&p.shader))
        else {
            return;
        };
        let i = stage.index();
        let count = shader.stages[i].ub_sizes.len();
        let cmd = Recorded::BindGroup {
            index: i as u32,
            group: shader.ub_groups[i].clone(),
            offsets: open.ub_offsets[i][..count].to_vec(),
        };
        self.record(cmd);
    }

    fn pass_targets(&self, target: PassTarget) -> Option<Targets> {
        match target {
            PassTarget::Default => {
                let frame = self.surface_frame.as_ref()?;
                Some(Targets {
                    colors: vec![(frame.view.clone(), None)],
                    depth: self.gpu.depth_view().cloned(),
                    stencil: true,
                })
            }
            PassTarget::Offscreen(pass) => {
                let pass = self.passes.get(&pass)?;
                Some(Targets {
                    colors: pass
                        .colors
                        .iter()
                        .map(|a| (a.view.clone(), a.depth_slice))
                        .collect(),
                    depth: pass.depth.as_ref().map(|a| a.view.clone()),
                    stencil: pass.depth_has_stencil,
                })
            }
        }
    }
}

impl Backend for WgpuBackend {
    fn setup(&mut self, config: &GfxConfig) -> Result<(), BackendError> {
        self.samplers = SamplerCache::new(
            config.sampler_cache_size,
            self.gpu
                .device
                .features()
                .contains(wgpu::Features::ADDRESS_MODE_CLAMP_TO_BORDER),
        );
        let max = self.gpu.device.limits().max_buffer_size as usize;
        let size = config.uniform_buffer_size.min(max) as u64;
        self.uniform_buffer = Some(self.gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("tessera uniforms"),
            size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        }));
        self.uniform_data.reserve(size as usize);
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        !self.gpu.is_lost()
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Wgpu
    }

    fn features(&self) -> Features {
        Features {
            instancing: true,
            origin_top_left: true,
            multiple_render_targets: true,
            msaa_render_targets: false,
            image_type_3d: true,
            image_type_array: true,
            image_clamp_to_border: self
                .gpu
                .device
                .features()
                .contains(wgpu::Features::ADDRESS_MODE_CLAMP_TO_BORDER),
        }
    }

    fn limits(&self) -> Limits {
        let l = self.gpu.device.limits();
        Limits {
            max_image_size_2d: l.max_texture_dimension_2d,
            max_image_size_cube: l.max_texture_dimension_2d,
            max_image_size_3d: l.max_texture_dimension_3d,
            max_image_size_array: l.max_texture_dimension_2d,
            max_image_array_layers: l.max_texture_array_layers,
            max_vertex_attrs: l.max_vertex_attributes,
        }
    }

    fn default_formats(&self) -> DefaultFormats {
        DefaultFormats {
            color: self.color_format,
            depth: if self.gpu.depth_format().is_some() {
                PixelFormat::DepthStencil
            } else {
                PixelFormat::None
            },
            sample_count: 1,
        }
    }

    fn framebuffer_size(&self) -> (u32, u32) {
        let size = self.gpu.size();
        (size.width, size.height)
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.gpu.resize(PhysicalSize::new(width, height));
    }

    // ── resources ──────────────────────────────────────────────────────

    fn create_buffer(&mut self, id: Buffer, desc: &BufferDesc<'_>) -> Result<(), BackendError> {
        let buffer = resources::create_buffer(&self.gpu.device, desc);
        self.buffers.insert(id, buffer);
        Ok(())
    }

    fn destroy_buffer(&mut self, id: Buffer) {
        if let Some(b) = self.buffers.remove(&id) {
            b.buffer.destroy();
        }
    }

    fn update_buffer(&mut self, id: Buffer, data: &[u8]) {
        if let Some(b) = self.buffers.get(&id) {
            resources::write_buffer(&self.gpu.queue, &b.buffer, 0, data);
        }
    }

    fn append_buffer(&mut self, id: Buffer, offset: usize, data: &[u8]) {
        if let Some(b) = self.buffers.get(&id) {
            resources::write_buffer(&self.gpu.queue, &b.buffer, offset, data);
        }
    }

    fn create_image(&mut self, id: Image, desc: &ImageDesc<'_>) -> Result<(), BackendError> {
        let image =
            resources::create_image(&self.gpu.device, &self.gpu.queue, &mut self.samplers, desc)?;
        self.images.insert(id, image);
        Ok(())
    }

    fn destroy_image(&mut self, id: Image) {
        if let Some(img) = self.images.remove(&id) {
            img.texture.destroy();
        }
    }

    fn update_image(&mut self, id: Image, data: &ImageData<'_>) {
        if let Some(img) = self.images.get(&id) {
            resources::write_image(&self.gpu.queue, img, data);
        }
    }

    fn create_shader(&mut self, id: Shader, desc: &ShaderDesc<'_>) -> Result<(), BackendError> {
        let uniforms = self
            .uniform_buffer
            .as_ref()
            .ok_or_else(|| BackendError::Native("backend used before setup".into()))?;
        let shader = resources::create_shader(&self.gpu.device, uniforms, desc)?;
        self.shaders.insert(id, shader);
        Ok(())
    }

    fn destroy_shader(&mut self, id: Shader) {
        self.shaders.remove(&id);
    }

    fn create_pipeline(
        &mut self,
        id: Pipeline,
        desc: &PipelineDesc<'_>,
    ) -> Result<(), BackendError> {
        let shader = self
            .shaders
            .get(&desc.shader)
            .ok_or(BackendError::Missing(ResourceKind::Shader))?;
        let pipeline = resources::create_pipeline(&self.gpu.device, shader, desc)?;
        self.pipelines.insert(id, pipeline);
        Ok(())
    }

    fn destroy_pipeline(&mut self, id: Pipeline) {
        self.pipelines.remove(&id);
    }

    fn create_pass(&mut self, id: Pass, desc: &PassDesc<'_>) -> Result<(), BackendError> {
        let pass = resources::create_pass(&self.images, desc)?;
        self.passes.insert(id, pass);
        Ok(())
    }

    fn destroy_pass(&mut self, id: Pass) {
        self.passes.remove(&id);
    }

    // ── passes ─────────────────────────────────────────────────────────

    fn begin_pass(
        &mut self,
        target: PassTarget,
        action: &ResolvedPassAction,
        width: u32,
        height: u32,
    ) {
        if target == PassTarget::Default && !self.surface_acquired {
            self.surface_acquired = true;
            self.surface_frame = self.gpu.acquire();
        }
        self.open = Some(OpenPass {
            target,
            action: *action,
            width,
            height,
            commands: Vec::new(),
            pipeline: None,
            ub_offsets: [[0; MAX_SHADERSTAGE_UBS]; NUM_SHADER_STAGES],
        });
    }

    fn apply_viewport(&mut self, rect: Rect, origin_top_left: bool) {
        let Some(open) = self.open.as_ref() else { return };
        let (w, h) = (open.width as i32, open.height as i32);
        let rect = if origin_top_left { rect } else { rect.flipped(h) }.clamped(w, h);
        if rect.width == 0 || rect.height == 0 {
            return;
        }
        self.record(Recorded::Viewport {
            x: rect.x as f32,
            y: rect.y as f32,
            w: rect.width as f32,
            h: rect.height as f32,
        });
    }

    fn apply_scissor_rect(&mut self, rect: Rect, origin_top_left: bool) {
        let Some(open) = self.open.as_ref() else { return };
        let (w, h) = (open.width as i32, open.height as i32);
        let rect = if origin_top_left { rect } else { rect.flipped(h) }.clamped(w, h);
        self.record(Recorded::Scissor {
            x: rect.x as u32,
            y: rect.y as u32,
            w: rect.width as u32,
            h: rect.height as u32,
        });
    }

    fn apply_pipeline(&mut self, id: Pipeline) {
        let Some(pip) = self.pipelines.get(&id) else { return };
        let Some(shader) = self.shaders.get(&pip.shader) else { return };
        let mut cmds = vec![Recorded::Pipeline {
            pipeline: pip.pipeline.clone(),
            stencil_ref: pip.stencil_ref,
            blend_color: pip.blend_color,
        }];
        for stage in ShaderStage::ALL {
            let i = stage.index();
            cmds.push(Recorded::BindGroup {
                index: i as u32,
                group: shader.ub_groups[i].clone(),
                offsets: vec![0; shader.stages[i].ub_sizes.len()],
            });
            if shader.stages[i].image_types.is_empty() {
                cmds.push(Recorded::BindGroup {
                    index: 2 + i as u32,
                    group: shader.empty_images[i].clone(),
                    offsets: Vec::new(),
                });
            }
        }
        if let Some(open) = self.open.as_mut() {
            open.pipeline = Some(id);
            open.ub_offsets = [[0; MAX_SHADERSTAGE_UBS]; NUM_SHADER_STAGES];
            open.commands.extend(cmds);
        }
    }

    fn apply_bindings(&mut self, bindings: &Bindings) {
        let Some(pip) = self
            .open
            .as_ref()
            .and_then(|o| o.pipeline)
            .and_then(|p| self.pipelines.get(&p))
        else {
            return;
        };
        let mut cmds = Vec::new();

        for (slot, (&buf, &offset)) in bindings
            .vertex_buffers
            .iter()
            .zip(&bindings.vertex_buffer_offsets)
            .enumerate()
        {
            if buf.is_invalid() {
                continue;
            }
            if let Some(b) = self.buffers.get(&buf) {
                cmds.push(Recorded::VertexBuffer {
                    slot: slot as u32,
                    buffer: b.buffer.clone(),
                    offset: offset as u64,
                });
            }
        }
        let index_buffer = self.buffers.get(&bindings.index_buffer);
        if let (Some(format), Some(b)) = (pip.index_format, index_buffer) {
            cmds.push(Recorded::IndexBuffer {
                buffer: b.buffer.clone(),
                format,
                offset: bindings.index_buffer_offset as u64,
            });
        }

        if let Some(shader) = self.shaders.get(&pip.shader) {
            for stage in ShaderStage::ALL {
                let gpu_stage = &shader.stages[stage.index()];
                if gpu_stage.image_types.is_empty() {
                    continue;
                }
                let images: Vec<Option<&GpuImage>> = bindings
                    .images(stage)
                    .iter()
                    .map(|img| self.images.get(img))
                    .collect();
                match resources::image_bind_group(&self.gpu.device, gpu_stage, &images) {
                    Ok(group) => cmds.push(Recorded::BindGroup {
                        index: 2 + stage.index() as u32,
                        group,
                        offsets: Vec::new(),
                    }),
                    Err(e) => log::error!("apply_bindings: {stage} images: {e}"),
                }
            }
        }

        if let Some(open) = self.open.as_mut() {
            open.commands.extend(cmds);
        }
    }

    fn apply_uniforms(&mut self, stage: ShaderStage, ub_index: usize, data: &[u8]) {
        let align = self.uniform_alignment();
        let offset = self.uniform_data.len().next_multiple_of(align);
        let capacity = self.uniform_buffer.as_ref().map_or(0, |b| b.size() as usize);
        // Reserve the full bound size so the dynamic binding stays in range.
        let bound = data.len().next_multiple_of(16);
        if offset + bound > capacity {
            if !self.uniform_overflow_warned {
                log::warn!("uniform buffer full ({capacity} bytes); uniforms dropped this frame");
                self.uniform_overflow_warned = true;
            }
            return;
        }
        self.uniform_data.resize(offset, 0);
        self.uniform_data.extend_from_slice(data);
        self.uniform_data.resize(offset + bound, 0);

        if let Some(open) = self.open.as_mut() {
            open.ub_offsets[stage.index()][ub_index] = offset as u32;
        }
        self.record_uniform_group(stage);
    }

    fn draw(&mut self, base_element: u32, num_elements: u32, num_instances: u32) {
        let indexed = self
            .open
            .as_ref()
            .and_then(|o| o.pipeline)
            .and_then(|p| self.pipelines.get(&p))
            .is_some_and(|p| p.index_format.is_some());
        self.record(Recorded::Draw {
            indexed,
            base: base_element,
            count: num_elements,
            instances: num_instances,
        });
    }

    fn end_pass(&mut self) {
        let Some(open) = self.open.take() else { return };
        let Some(targets) = self.pass_targets(open.target) else {
            log::debug!("pass skipped: render target unavailable");
            return;
        };
        encode::replay(self.encoder(), &targets, &open.action, &open.commands);
    }

    fn commit(&mut self) {
        if let Some(uniforms) = self.uniform_buffer.as_ref() {
            if !self.uniform_data.is_empty() {
                resources::write_buffer(&self.gpu.queue, uniforms, 0, &self.uniform_data);
            }
        }
        if let Some(encoder) = self.encoder.take() {
            self.gpu.queue.submit(std::iter::once(encoder.finish()));
        }
        if let Some(frame) = self.surface_frame.take() {
            self.gpu.present(frame);
        }
        self.uniform_data.clear();
        self.uniform_overflow_warned = false;
        self.surface_acquired = false;
    }
}
