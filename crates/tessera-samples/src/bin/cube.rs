//! Spinning cube with a depth buffer, rendered at whatever rate the display
//! allows while the rotation advances in fixed steps.

use anyhow::{Result, ensure};
use bytemuck::{Pod, Zeroable};
use tessera_engine::core::{App, AppControl, FrameCtx};
use tessera_engine::gfx::{
    Bindings, Buffer, BufferDesc, BufferType, Color, CompareFunc, CullMode, Device, FaceWinding,
    IndexType, PassAction, Pipeline, PipelineDesc, ResourceState, ShaderDesc, ShaderStage,
    ShaderStageDesc, UniformBlockDesc, VertexFormat,
};
use tessera_engine::time::LoopTime;
use tessera_engine::window::{Runtime, RuntimeConfig};
use tessera_samples::math::Mat4;

const SHADER: &str = r#"
struct Params {
    mvp: mat4x4<f32>,
};
@group(0) @binding(0) var<uniform> params: Params;

struct VsOut {
    @builtin(position) pos: vec4<f32>,
    @location(0) color: vec4<f32>,
};

@vertex
fn vs_main(@location(0) pos: vec3<f32>, @location(1) color: vec4<f32>) -> VsOut {
    var out: VsOut;
    out.pos = params.mvp * vec4<f32>(pos, 1.0);
    out.color = color;
    return out;
}

@fragment
fn fs_main(in: VsOut) -> @location(0) vec4<f32> {
    return in.color;
}
"#;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct Vertex {
    pos: [f32; 3],
    color: [f32; 4],
}

const fn v(x: f32, y: f32, z: f32, color: [f32; 4]) -> Vertex {
    Vertex { pos: [x, y, z], color }
}

const RED: [f32; 4] = [1.0, 0.3, 0.3, 1.0];
const GREEN: [f32; 4] = [0.3, 1.0, 0.3, 1.0];
const BLUE: [f32; 4] = [0.3, 0.3, 1.0, 1.0];
const YELLOW: [f32; 4] = [1.0, 1.0, 0.3, 1.0];
const CYAN: [f32; 4] = [0.3, 1.0, 1.0, 1.0];
const MAGENTA: [f32; 4] = [1.0, 0.3, 1.0, 1.0];

#[rustfmt::skip]
const VERTICES: [Vertex; 24] = [
    v(-1.0, -1.0, -1.0, RED), v(1.0, -1.0, -1.0, RED), v(1.0, 1.0, -1.0, RED), v(-1.0, 1.0, -1.0, RED),
    v(-1.0, -1.0, 1.0, GREEN), v(1.0, -1.0, 1.0, GREEN), v(1.0, 1.0, 1.0, GREEN), v(-1.0, 1.0, 1.0, GREEN),
    v(-1.0, -1.0, -1.0, BLUE), v(-1.0, 1.0, -1.0, BLUE), v(-1.0, 1.0, 1.0, BLUE), v(-1.0, -1.0, 1.0, BLUE),
    v(1.0, -1.0, -1.0, YELLOW), v(1.0, 1.0, -1.0, YELLOW), v(1.0, 1.0, 1.0, YELLOW), v(1.0, -1.0, 1.0, YELLOW),
    v(-1.0, -1.0, -1.0, CYAN), v(-1.0, -1.0, 1.0, CYAN), v(1.0, -1.0, 1.0, CYAN), v(1.0, -1.0, -1.0, CYAN),
    v(-1.0, 1.0, -1.0, MAGENTA), v(-1.0, 1.0, 1.0, MAGENTA), v(1.0, 1.0, 1.0, MAGENTA), v(1.0, 1.0, -1.0, MAGENTA),
];

#[rustfmt::skip]
const INDICES: [u16; 36] = [
    0, 2, 1, 0, 3, 2,
    4, 5, 6, 4, 6, 7,
    8, 10, 9, 8, 11, 10,
    12, 13, 14, 12, 14, 15,
    16, 18, 17, 16, 19, 18,
    20, 21, 22, 20, 22, 23,
];

#[derive(Default)]
struct Cube {
    pipeline: Pipeline,
    vbuf: Buffer,
    ibuf: Buffer,
    rx: f32,
    ry: f32,
    prev: (f32, f32),
}

impl App for Cube {
    fn init(&mut self, gfx: &mut Device) -> Result<()> {
        self.vbuf = gfx.make_buffer(&BufferDesc {
            data: Some(bytemuck::cast_slice(&VERTICES)),
            label: Some("cube vertices"),
            ..Default::default()
        });
        self.ibuf = gfx.make_buffer(&BufferDesc {
            buffer_type: BufferType::Index,
            data: Some(bytemuck::cast_slice(&INDICES)),
            label: Some("cube indices"),
            ..Default::default()
        });

        let mut vs = ShaderStageDesc {
            source: SHADER,
            entry: "vs_main",
            ..Default::default()
        };
        vs.uniform_blocks[0] = UniformBlockDesc::sized(size_of::<Mat4>());
        let shader = gfx.make_shader(&ShaderDesc {
            vs,
            fs: ShaderStageDesc {
                source: SHADER,
                entry: "fs_main",
                ..Default::default()
            },
            label: Some("cube shader"),
        });

        let mut desc = PipelineDesc {
            shader,
            index_type: IndexType::UInt16,
            label: Some("cube pipeline"),
            ..Default::default()
        };
        desc.layout.attrs[0].format = VertexFormat::Float3;
        desc.layout.attrs[1].format = VertexFormat::Float4;
        desc.depth_stencil.depth_compare = CompareFunc::LessEqual;
        desc.depth_stencil.depth_write_enabled = true;
        desc.rasterizer.cull_mode = CullMode::Back;
        desc.rasterizer.face_winding = FaceWinding::Ccw;
        self.pipeline = gfx.make_pipeline(&desc);

        ensure!(
            gfx.query_pipeline_state(self.pipeline) == ResourceState::Valid,
            "cube pipeline could not be created"
        );
        Ok(())
    }

    fn update(&mut self, time: &LoopTime) -> AppControl {
        self.prev = (self.rx, self.ry);
        let dt = time.elapsed_secs();
        self.rx += 0.6 * dt;
        self.ry += 1.2 * dt;
        AppControl::Continue
    }

    fn draw(&mut self, ctx: &mut FrameCtx<'_>) -> Result<AppControl> {
        let a = ctx.time.alpha;
        let rx = self.prev.0 + (self.rx - self.prev.0) * a;
        let ry = self.prev.1 + (self.ry - self.prev.1) * a;
        let mvp = Mat4::perspective(60f32.to_radians(), ctx.aspect(), 0.1, 50.0)
            * Mat4::translation(0.0, 0.0, -6.0)
            * Mat4::rotation_x(rx)
            * Mat4::rotation_y(ry);

        let mut bindings = Bindings::default();
        bindings.vertex_buffers[0] = self.vbuf;
        bindings.index_buffer = self.ibuf;

        let action = PassAction::clear(Color::rgba(0.1, 0.1, 0.12, 1.0));
        let mut pass = ctx.begin_default_pass(&action)?;
        pass.apply_pipeline(self.pipeline)?;
        pass.apply_bindings(&bindings)?;
        pass.apply_uniforms_typed(ShaderStage::Vertex, 0, &mvp)?;
        pass.draw(0, INDICES.len() as u32, 1)?;
        pass.end();
        Ok(AppControl::Continue)
    }
}

fn main() {
    tessera_samples::init();
    let config = RuntimeConfig {
        title: "tessera: cube".into(),
        ..Default::default()
    };
    if let Err(e) = Runtime::run(config, Cube::default()) {
        log::error!("cube sample failed: {e:#}");
        std::process::exit(1);
    }
}
