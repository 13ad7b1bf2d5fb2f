//! Render-to-texture with a dynamic source texture.
//!
//! Every frame a small texture is regenerated on the CPU and uploaded with
//! `update_image`. An offscreen pass draws it into a render target, and the
//! default pass then shows that render target on a spinning quad.

use anyhow::{Result, ensure};
use bytemuck::{Pod, Zeroable};
use tessera_engine::core::{App, AppControl, FrameCtx};
use tessera_engine::gfx::{
    AttachmentDesc, Bindings, Buffer, BufferDesc, BufferType, Color, Device, Filter, Image,
    ImageData, ImageDesc, ImageType, IndexType, Pass, PassAction, PassDesc, Pipeline,
    PipelineDesc, PixelFormat, ResourceState, Shader, ShaderDesc, ShaderImageDesc, ShaderStage,
    ShaderStageDesc, UniformBlockDesc, Usage, VertexFormat,
};
use tessera_engine::time::LoopTime;
use tessera_engine::window::{Runtime, RuntimeConfig};

const SHADER: &str = r#"
struct Params {
    // cos, sin, scale x, scale y
    xform: vec4<f32>,
};
@group(0) @binding(0) var<uniform> params: Params;
@group(3) @binding(0) var tex: texture_2d<f32>;
@group(3) @binding(1) var smp: sampler;

struct VsOut {
    @builtin(position) pos: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@location(0) pos: vec2<f32>, @location(1) uv: vec2<f32>) -> VsOut {
    let c = params.xform.x;
    let s = params.xform.y;
    let p = vec2<f32>(pos.x * c - pos.y * s, pos.x * s + pos.y * c) * params.xform.zw;
    var out: VsOut;
    out.pos = vec4<f32>(p, 0.0, 1.0);
    out.uv = uv;
    return out;
}

@fragment
fn fs_main(in: VsOut) -> @location(0) vec4<f32> {
    return textureSample(tex, smp, in.uv);
}
"#;

const PATTERN_SIZE: u32 = 32;
const TARGET_SIZE: u32 = 256;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct Vertex {
    pos: [f32; 2],
    uv: [f32; 2],
}

#[rustfmt::skip]
const QUAD: [Vertex; 4] = [
    Vertex { pos: [-1.0, -1.0], uv: [0.0, 1.0] },
    Vertex { pos: [1.0, -1.0], uv: [1.0, 1.0] },
    Vertex { pos: [1.0, 1.0], uv: [1.0, 0.0] },
    Vertex { pos: [-1.0, 1.0], uv: [0.0, 0.0] },
];
const QUAD_INDICES: [u16; 6] = [0, 1, 2, 0, 2, 3];

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct Params {
    xform: [f32; 4],
}

impl Params {
    fn rotated(angle: f32, scale: [f32; 2]) -> Self {
        let (s, c) = angle.sin_cos();
        Self {
            xform: [c, s, scale[0], scale[1]],
        }
    }
}

#[derive(Default)]
struct Offscreen {
    vbuf: Buffer,
    ibuf: Buffer,
    pattern: Image,
    target: Image,
    pass: Pass,
    offscreen_pip: Pipeline,
    display_pip: Pipeline,
    pixels: Vec<u8>,
    angle: f32,
    prev_angle: f32,
}

impl Offscreen {
    fn shader(gfx: &mut Device) -> Shader {
        let mut vs = ShaderStageDesc {
            source: SHADER,
            entry: "vs_main",
            ..Default::default()
        };
        vs.uniform_blocks[0] = UniformBlockDesc::sized(size_of::<Params>());
        let mut fs = ShaderStageDesc {
            source: SHADER,
            entry: "fs_main",
            ..Default::default()
        };
        fs.images[0] = ShaderImageDesc::of(ImageType::D2);
        gfx.make_shader(&ShaderDesc {
            vs,
            fs,
            label: Some("textured quad"),
        })
    }

    fn pipeline(
        gfx: &mut Device,
        shader: Shader,
        color: PixelFormat,
        depth: PixelFormat,
    ) -> Pipeline {
        let mut desc = PipelineDesc {
            shader,
            index_type: IndexType::UInt16,
            label: Some("textured quad"),
            ..Default::default()
        };
        desc.layout.attrs[0].format = VertexFormat::Float2;
        desc.layout.attrs[1].format = VertexFormat::Float2;
        desc.blend.color_format = color;
        desc.blend.depth_format = depth;
        gfx.make_pipeline(&desc)
    }

    /// Scrolling interference pattern, regenerated every frame.
    fn fill_pattern(&mut self, t: f32) {
        self.pixels.clear();
        for y in 0..PATTERN_SIZE {
            for x in 0..PATTERN_SIZE {
                let (fx, fy) = (x as f32 * 0.4, y as f32 * 0.4);
                let v = ((fx + t * 3.0).sin() + (fy - t * 2.0).cos()) * 0.25 + 0.5;
                let b = (v * 255.0) as u8;
                self.pixels.extend_from_slice(&[b, 255 - b, 128, 255]);
            }
        }
    }

    fn bindings(&self, image: Image) -> Bindings {
        let mut b = Bindings::default();
        b.vertex_buffers[0] = self.vbuf;
        b.index_buffer = self.ibuf;
        b.fs_images[0] = image;
        b
    }
}

impl App for Offscreen {
    fn init(&mut self, gfx: &mut Device) -> Result<()> {
        self.vbuf = gfx.make_buffer(&BufferDesc {
            data: Some(bytemuck::cast_slice(&QUAD)),
            label: Some("quad vertices"),
            ..Default::default()
        });
        self.ibuf = gfx.make_buffer(&BufferDesc {
            buffer_type: BufferType::Index,
            data: Some(bytemuck::cast_slice(&QUAD_INDICES)),
            label: Some("quad indices"),
            ..Default::default()
        });

        self.pattern = gfx.make_image(&ImageDesc {
            width: PATTERN_SIZE,
            height: PATTERN_SIZE,
            usage: Usage::Dynamic,
            label: Some("pattern"),
            ..Default::default()
        });
        self.target = gfx.make_image(&ImageDesc {
            render_target: true,
            width: TARGET_SIZE,
            height: TARGET_SIZE,
            pixel_format: PixelFormat::Rgba8,
            min_filter: Filter::Linear,
            mag_filter: Filter::Linear,
            label: Some("offscreen color"),
            ..Default::default()
        });
        let mut pass = PassDesc {
            label: Some("offscreen"),
            ..Default::default()
        };
        pass.color_attachments[0] = AttachmentDesc {
            image: self.target,
            ..Default::default()
        };
        self.pass = gfx.make_pass(&pass);

        let shader = Self::shader(gfx);
        self.offscreen_pip = Self::pipeline(gfx, shader, PixelFormat::Rgba8, PixelFormat::None);
        self.display_pip = Self::pipeline(gfx, shader, PixelFormat::Default, PixelFormat::Default);

        ensure!(
            gfx.query_pass_state(self.pass) == ResourceState::Valid
                && gfx.query_pipeline_state(self.offscreen_pip) == ResourceState::Valid
                && gfx.query_pipeline_state(self.display_pip) == ResourceState::Valid,
            "offscreen resources could not be created"
        );
        Ok(())
    }

    fn update(&mut self, time: &LoopTime) -> AppControl {
        self.prev_angle = self.angle;
        self.angle += 0.8 * time.elapsed_secs();
        AppControl::Continue
    }

    fn draw(&mut self, ctx: &mut FrameCtx<'_>) -> Result<AppControl> {
        self.fill_pattern(ctx.time.total_secs());
        ctx.gfx.update_image(self.pattern, &ImageData::new(&self.pixels))?;

        let action = PassAction::clear(Color::rgba(0.0, 0.0, 0.0, 1.0));
        let mut pass = ctx.gfx.begin_pass(self.pass, &action)?;
        pass.apply_pipeline(self.offscreen_pip)?;
        pass.apply_bindings(&self.bindings(self.pattern))?;
        pass.apply_uniforms_typed(ShaderStage::Vertex, 0, &Params::rotated(0.0, [1.0, 1.0]))?;
        pass.draw(0, QUAD_INDICES.len() as u32, 1)?;
        pass.end();

        let angle = self.prev_angle + (self.angle - self.prev_angle) * ctx.time.alpha;
        let scale = [0.6 / ctx.aspect(), 0.6];
        let action = PassAction::clear(Color::rgba(0.15, 0.15, 0.2, 1.0));
        let mut pass = ctx.begin_default_pass(&action)?;
        pass.apply_pipeline(self.display_pip)?;
        pass.apply_bindings(&self.bindings(self.target))?;
        pass.apply_uniforms_typed(ShaderStage::Vertex, 0, &Params::rotated(angle, scale))?;
        pass.draw(0, QUAD_INDICES.len() as u32, 1)?;
        pass.end();
        Ok(AppControl::Continue)
    }
}

fn main() {
    tessera_samples::init();
    let config = RuntimeConfig {
        title: "tessera: offscreen".into(),
        ..Default::default()
    };
    if let Err(e) = Runtime::run(config, Offscreen::default()) {
        log::error!("offscreen sample failed: {e:#}");
        std::process::exit(1);
    }
}
