use std::time::Duration;

use anyhow::Result;
use tessera_engine::core::{App, AppControl, FixedStepLoop, FrameCtx, LoopExit, ScriptedPlatform};
use tessera_engine::gfx::{
    AttachmentDesc, Bindings, Buffer, BufferDesc, BufferType, Color, Command, CompareFunc, Device,
    GfxConfig, HeadlessBackend, Image, ImageData, ImageDesc, ImageType, IndexType, Pass,
    PassAction, PassDesc, PassTarget, Pipeline, PipelineDesc, PixelFormat, Recorder,
    ResourceState, Shader, ShaderDesc, ShaderImageDesc, ShaderStage, ShaderStageDesc,
    UniformBlockDesc, Usage, VertexFormat,
};
use tessera_engine::time::{LoopConfig, LoopTime, ManualClock};

const STEP: Duration = Duration::from_millis(10);

fn loop_config() -> LoopConfig {
    LoopConfig {
        fixed_step: STEP,
        max_elapsed: Duration::from_millis(100),
        max_accumulated: Duration::from_millis(500),
        poll_input_every_iteration: false,
    }
}

fn device() -> (Device, Recorder) {
    let backend = HeadlessBackend::new(640, 480);
    let rec = backend.recorder();
    (Device::setup(GfxConfig::default(), backend).unwrap(), rec)
}

/// 24 vertices (four per face, so faces can carry their own colour) of
/// position and RGBA.
fn cube_vertices() -> Vec<f32> {
    let mut v = Vec::new();
    for axis in 0..3 {
        for sign in [-1.0f32, 1.0] {
            let mut color = [0.25f32; 3];
            color[axis] = 1.0;
            for (a, b) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
                let mut p = [0.0f32; 3];
                p[axis] = sign;
                p[(axis + 1) % 3] = a;
                p[(axis + 2) % 3] = b;
                v.extend_from_slice(&p);
                v.extend_from_slice(&color);
                v.push(1.0);
            }
        }
    }
    v
}

fn cube_indices() -> Vec<u16> {
    (0..6u16)
        .flat_map(|face| {
            let b = face * 4;
            [b, b + 1, b + 2, b, b + 2, b + 3]
        })
        .collect()
}

/// Rotating cube: immutable geometry, a per-draw uniform block and
/// interpolation between the last two simulation states.
#[derive(Default)]
struct Cube {
    vbuf: Buffer,
    ibuf: Buffer,
    shader: Shader,
    pipeline: Pipeline,
    angle: f32,
    prev_angle: f32,
    drawn_angles: Vec<f32>,
}

impl App for Cube {
    fn init(&mut self, gfx: &mut Device) -> Result<()> {
        let vertices = cube_vertices();
        assert_eq!(vertices.len(), 24 * 7);
        self.vbuf = gfx.make_buffer(&BufferDesc {
            data: Some(bytemuck::cast_slice(&vertices)),
            ..Default::default()
        });
        self.ibuf = gfx.make_buffer(&BufferDesc {
            buffer_type: BufferType::Index,
            data: Some(bytemuck::cast_slice(&cube_indices())),
            ..Default::default()
        });

        let mut vs = ShaderStageDesc {
            source: "fn main() {}",
            ..Default::default()
        };
        vs.uniform_blocks[0] = UniformBlockDesc::sized(64);
        self.shader = gfx.make_shader(&ShaderDesc {
            vs,
            fs: ShaderStageDesc {
                source: "fn main() {}",
                ..Default::default()
            },
            label: Some("cube"),
        });

        let mut desc = PipelineDesc {
            shader: self.shader,
            index_type: IndexType::UInt16,
            ..Default::default()
        };
        desc.layout.attrs[0].format = VertexFormat::Float3;
        desc.layout.attrs[1].format = VertexFormat::Float4;
        desc.depth_stencil.depth_compare = CompareFunc::LessEqual;
        desc.depth_stencil.depth_write_enabled = true;
        self.pipeline = gfx.make_pipeline(&desc);

        anyhow::ensure!(
            gfx.query_pipeline_state(self.pipeline) == ResourceState::Valid,
            "cube pipeline failed"
        );
        Ok(())
    }

    fn update(&mut self, time: &LoopTime) -> AppControl {
        self.prev_angle = self.angle;
        self.angle += time.elapsed_secs();
        AppControl::Continue
    }

    fn draw(&mut self, ctx: &mut FrameCtx<'_>) -> Result<AppControl> {
        let a = self.prev_angle + (self.angle - self.prev_angle) * ctx.time.alpha;
        self.drawn_angles.push(a);
        let (s, c) = a.sin_cos();
        #[rustfmt::skip]
        let mvp: [f32; 16] = [
            c, 0.0, -s, 0.0,
            0.0, 1.0, 0.0, 0.0,
            s, 0.0, c, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ];

        let mut bindings = Bindings::default();
        bindings.vertex_buffers[0] = self.vbuf;
        bindings.index_buffer = self.ibuf;

        let mut pass = ctx.begin_default_pass(&PassAction::clear(Color::rgba(0.1, 0.1, 0.1, 1.0)))?;
        pass.apply_pipeline(self.pipeline)?;
        pass.apply_bindings(&bindings)?;
        pass.apply_uniforms_typed(ShaderStage::Vertex, 0, &mvp)?;
        pass.draw(0, 36, 1)?;
        pass.end();
        Ok(AppControl::Continue)
    }
}

#[test]
fn cube_renders_through_the_loop() {
    let (mut gfx, rec) = device();
    let mut app = Cube::default();
    // 25ms, 25ms, 10ms: 2, 3 and 1 updates; alpha 0.5, 0, 0.
    let mut clock = ManualClock::new([STEP * 5 / 2, STEP * 5 / 2, STEP]);
    let mut lp = FixedStepLoop::new(loop_config());

    let exit = lp
        .run(&mut ScriptedPlatform::idle(3), &mut clock, &mut gfx, &mut app)
        .unwrap();

    assert_eq!(exit, LoopExit::Quit);
    assert_eq!(lp.stats().updates, 6);
    assert_eq!(lp.stats().draws, 3);
    assert_eq!(lp.total(), STEP * 6);
    assert_eq!(rec.draw_count(), 3);

    // Interpolated angle lags the simulation by half a step in frame one.
    assert!((app.drawn_angles[0] - 0.015).abs() < 1e-4);
    assert!((app.drawn_angles[2] - 0.05).abs() < 1e-4);

    let cmds = rec.commands();
    let commits = cmds.iter().filter(|c| matches!(c, Command::Commit)).count();
    assert_eq!(commits, 3);
    let uniforms: Vec<_> = cmds
        .iter()
        .filter_map(|c| match c {
            Command::ApplyUniforms { stage, data, .. } => Some((*stage, data.len())),
            _ => None,
        })
        .collect();
    assert_eq!(uniforms, vec![(ShaderStage::Vertex, 64); 3]);
    assert!(cmds.contains(&Command::Draw {
        base_element: 0,
        num_elements: 36,
        num_instances: 1
    }));
    assert_eq!(gfx.frame_index(), 4);

    // Everything the app built is still usable after the cycle.
    assert_eq!(gfx.query_buffer_state(app.vbuf), ResourceState::Valid);
    assert_eq!(gfx.query_buffer_state(app.ibuf), ResourceState::Valid);
    assert_eq!(gfx.query_shader_state(app.shader), ResourceState::Valid);
    assert_eq!(gfx.query_pipeline_state(app.pipeline), ResourceState::Valid);
    assert!(!gfx.is_buffer_overflown(app.vbuf));
    assert!(!gfx.is_buffer_overflown(app.ibuf));
}

/// Streams a growing particle batch every frame into a small buffer.
struct Particles {
    buf: Buffer,
    pipeline: Pipeline,
    batches: usize,
    accepted: Vec<usize>,
}

impl App for Particles {
    fn init(&mut self, gfx: &mut Device) -> Result<()> {
        self.buf = gfx.make_buffer(&BufferDesc {
            size: 12 * 3 * 4,
            usage: Usage::Stream,
            ..Default::default()
        });
        let shader = gfx.make_shader(&ShaderDesc {
            vs: ShaderStageDesc {
                source: "fn main() {}",
                ..Default::default()
            },
            fs: ShaderStageDesc {
                source: "fn main() {}",
                ..Default::default()
            },
            label: None,
        });
        let mut desc = PipelineDesc {
            shader,
            ..Default::default()
        };
        desc.layout.attrs[0].format = VertexFormat::Float3;
        self.pipeline = gfx.make_pipeline(&desc);
        Ok(())
    }

    fn update(&mut self, _time: &LoopTime) -> AppControl {
        self.batches += 1;
        AppControl::Continue
    }

    fn draw(&mut self, ctx: &mut FrameCtx<'_>) -> Result<AppControl> {
        let triangle = [0.0f32; 9];
        let mut pass = ctx.begin_default_pass(&PassAction::default())?;
        pass.apply_pipeline(self.pipeline)?;
        let mut accepted = 0;
        for _ in 0..self.batches {
            let offset = pass.append_buffer(self.buf, bytemuck::cast_slice(&triangle))?;
            let mut bindings = Bindings::default();
            bindings.vertex_buffers[0] = self.buf;
            bindings.vertex_buffer_offsets[0] = offset;
            pass.apply_bindings(&bindings)?;
            if !pass.is_buffer_overflown(self.buf) {
                accepted += 1;
            }
            pass.draw(0, 3, 1)?;
        }
        pass.end();
        self.accepted.push(accepted);
        Ok(AppControl::Continue)
    }
}

#[test]
fn overflowing_stream_drops_draws_and_recovers_next_frame() {
    let (mut gfx, rec) = device();
    let mut app = Particles {
        buf: Buffer::INVALID,
        pipeline: Pipeline::INVALID,
        batches: 0,
        accepted: Vec::new(),
    };
    // The buffer holds four triangles: two frames with 2 and 5 batches.
    let mut clock = ManualClock::new([STEP * 2, STEP * 3]);
    let mut lp = FixedStepLoop::new(loop_config());
    lp.run(&mut ScriptedPlatform::idle(2), &mut clock, &mut gfx, &mut app)
        .unwrap();

    assert_eq!(app.accepted, vec![2, 4]);
    assert_eq!(rec.draw_count(), 6);
    let appends = rec
        .commands()
        .iter()
        .filter(|c| matches!(c, Command::AppendBuffer { .. }))
        .count();
    assert_eq!(appends, 6);
}

#[test]
fn shutdown_releases_everything_and_stales_handles() {
    let (mut gfx, rec) = device();
    let mut app = Cube::default();
    FixedStepLoop::new(loop_config())
        .run(
            &mut ScriptedPlatform::idle(0),
            &mut ManualClock::default(),
            &mut gfx,
            &mut app,
        )
        .unwrap();

    gfx.destroy_buffer(app.vbuf);
    assert_eq!(gfx.query_buffer_state(app.vbuf), ResourceState::Initial);
    let reused = gfx.make_buffer(&BufferDesc {
        size: 16,
        usage: Usage::Dynamic,
        ..Default::default()
    });
    assert_ne!(reused, app.vbuf);
    assert_eq!(gfx.query_buffer_state(app.vbuf), ResourceState::Initial);

    drop(gfx);
    let cmds = rec.commands();
    assert!(cmds.contains(&Command::DestroyPipeline(app.pipeline)));
    assert!(cmds.contains(&Command::DestroyBuffer(app.ibuf)));
}

/// Uploads a dynamic texture every frame, draws it into an offscreen target
/// and samples that target in the default pass.
#[derive(Default)]
struct RenderToTexture {
    vbuf: Buffer,
    pattern: Image,
    target: Image,
    pass: Pass,
    offscreen_pip: Pipeline,
    display_pip: Pipeline,
    frames: u8,
}

impl RenderToTexture {
    fn pipeline(
        gfx: &mut Device,
        shader: Shader,
        color: PixelFormat,
        depth: PixelFormat,
    ) -> Pipeline {
        let mut desc = PipelineDesc {
            shader,
            ..Default::default()
        };
        desc.layout.attrs[0].format = VertexFormat::Float2;
        desc.blend.color_format = color;
        desc.blend.depth_format = depth;
        gfx.make_pipeline(&desc)
    }

    fn bindings(&self, image: Image) -> Bindings {
        let mut b = Bindings::default();
        b.vertex_buffers[0] = self.vbuf;
        b.fs_images[0] = image;
        b
    }
}

impl App for RenderToTexture {
    fn init(&mut self, gfx: &mut Device) -> Result<()> {
        let quad = [0.0f32; 12];
        self.vbuf = gfx.make_buffer(&BufferDesc {
            data: Some(bytemuck::cast_slice(&quad)),
            ..Default::default()
        });
        self.pattern = gfx.make_image(&ImageDesc {
            width: 4,
            height: 4,
            usage: Usage::Dynamic,
            ..Default::default()
        });
        self.target = gfx.make_image(&ImageDesc {
            render_target: true,
            width: 64,
            height: 64,
            pixel_format: PixelFormat::Rgba8,
            ..Default::default()
        });
        let mut pass = PassDesc::default();
        pass.color_attachments[0] = AttachmentDesc {
            image: self.target,
            ..Default::default()
        };
        self.pass = gfx.make_pass(&pass);

        let mut fs = ShaderStageDesc {
            source: "fn main() {}",
            ..Default::default()
        };
        fs.images[0] = ShaderImageDesc::of(ImageType::D2);
        let shader = gfx.make_shader(&ShaderDesc {
            vs: ShaderStageDesc {
                source: "fn main() {}",
                ..Default::default()
            },
            fs,
            label: Some("textured"),
        });
        self.offscreen_pip = Self::pipeline(gfx, shader, PixelFormat::Rgba8, PixelFormat::None);
        self.display_pip = Self::pipeline(gfx, shader, PixelFormat::Default, PixelFormat::Default);
        Ok(())
    }

    fn update(&mut self, _time: &LoopTime) -> AppControl {
        AppControl::Continue
    }

    fn draw(&mut self, ctx: &mut FrameCtx<'_>) -> Result<AppControl> {
        self.frames += 1;
        let pixels = [self.frames; 4 * 4 * 4];
        ctx.gfx.update_image(self.pattern, &ImageData::new(&pixels))?;

        let mut pass = ctx.gfx.begin_pass(self.pass, &PassAction::default())?;
        assert_eq!(pass.size(), (64, 64));
        pass.apply_pipeline(self.offscreen_pip)?;
        pass.apply_bindings(&self.bindings(self.pattern))?;
        pass.draw(0, 6, 1)?;
        pass.end();

        let mut pass = ctx.begin_default_pass(&PassAction::default())?;
        pass.apply_pipeline(self.display_pip)?;
        pass.apply_bindings(&self.bindings(self.target))?;
        pass.draw(0, 6, 1)?;
        pass.end();
        Ok(AppControl::Continue)
    }
}

#[test]
fn dynamic_texture_renders_through_an_offscreen_pass() {
    let (mut gfx, rec) = device();
    let mut app = RenderToTexture::default();
    let mut lp = FixedStepLoop::new(loop_config());
    lp.run(
        &mut ScriptedPlatform::idle(2),
        &mut ManualClock::new([STEP, STEP]),
        &mut gfx,
        &mut app,
    )
    .unwrap();

    assert_eq!(gfx.query_pass_state(app.pass), ResourceState::Valid);
    assert_eq!(lp.stats().draws, 2);
    assert_eq!(rec.draw_count(), 4);

    let cmds = rec.commands();
    let uploads = cmds
        .iter()
        .filter(|c| **c == Command::UpdateImage(app.pattern))
        .count();
    assert_eq!(uploads, 2);
    let targets: Vec<_> = cmds
        .iter()
        .filter_map(|c| match c {
            Command::BeginPass { target, width, height, .. } => Some((*target, *width, *height)),
            _ => None,
        })
        .collect();
    assert_eq!(
        targets,
        vec![
            (PassTarget::Offscreen(app.pass), 64, 64),
            (PassTarget::Default, 640, 480),
            (PassTarget::Offscreen(app.pass), 64, 64),
            (PassTarget::Default, 640, 480),
        ]
    );
    assert_eq!(gfx.query_image_info(app.pattern).update_frame_index, 2);
}
