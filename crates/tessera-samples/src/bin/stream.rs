//! Particle fountain streamed into a fixed-size vertex buffer.
//!
//! Particles are appended in batches, each drawn from the offset the append
//! returned. Once the buffer is full for the frame the remaining batches are
//! skipped; the next frame starts over from offset zero.

use std::time::Duration;

use anyhow::Result;
use bytemuck::{Pod, Zeroable};
use tessera_engine::core::{App, AppControl, FrameCtx};
use tessera_engine::gfx::{
    Bindings, Buffer, BufferDesc, Color, Device, PassAction, Pipeline, PipelineDesc, ShaderDesc,
    ShaderStageDesc, Usage, VertexFormat,
};
use tessera_engine::input::{InputFrame, InputState, Key};
use tessera_engine::time::LoopTime;
use tessera_engine::window::{Runtime, RuntimeConfig};

const SHADER: &str = r#"
struct VsOut {
    @builtin(position) pos: vec4<f32>,
    @location(0) color: vec4<f32>,
};

@vertex
fn vs_main(@location(0) pos: vec2<f32>, @location(1) color: vec4<f32>) -> VsOut {
    var out: VsOut;
    out.pos = vec4<f32>(pos, 0.0, 1.0);
    out.color = color;
    return out;
}

@fragment
fn fs_main(in: VsOut) -> @location(0) vec4<f32> {
    return in.color;
}
"#;

const MAX_PARTICLES: usize = 4096;
const BATCH: usize = 512;
const SPAWN_PER_STEP: usize = 24;
const GRAVITY: f32 = -1.8;
const SIZE: f32 = 0.01;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct Vertex {
    pos: [f32; 2],
    color: [f32; 4],
}

struct Particle {
    pos: [f32; 2],
    vel: [f32; 2],
    age: f32,
}

struct Fountain {
    buf: Buffer,
    pipeline: Pipeline,
    particles: Vec<Particle>,
    seed: u32,
    burst: bool,
    vertices: Vec<Vertex>,
}

impl Fountain {
    fn new() -> Self {
        Self {
            buf: Buffer::INVALID,
            pipeline: Pipeline::INVALID,
            particles: Vec::new(),
            seed: 0x1234_5678,
            burst: false,
            vertices: Vec::new(),
        }
    }

    /// xorshift32, mapped to `[-1, 1)`.
    fn rand(&mut self) -> f32 {
        let mut x = self.seed;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.seed = x;
        (x as f32 / u32::MAX as f32) * 2.0 - 1.0
    }

    fn spawn(&mut self, n: usize) {
        for _ in 0..n {
            let vel = [self.rand() * 0.4, 1.6 + self.rand() * 0.3];
            self.particles.push(Particle {
                pos: [0.0, -0.9],
                vel,
                age: 0.0,
            });
        }
    }
}

impl App for Fountain {
    fn init(&mut self, gfx: &mut Device) -> Result<()> {
        // Room for a quarter of the particles; bursts overflow on purpose.
        self.buf = gfx.make_buffer(&BufferDesc {
            size: MAX_PARTICLES / 4 * 3 * size_of::<Vertex>(),
            usage: Usage::Stream,
            label: Some("particles"),
            ..Default::default()
        });
        let shader = gfx.make_shader(&ShaderDesc {
            vs: ShaderStageDesc {
                source: SHADER,
                entry: "vs_main",
                ..Default::default()
            },
            fs: ShaderStageDesc {
                source: SHADER,
                entry: "fs_main",
                ..Default::default()
            },
            label: Some("particles"),
        });
        let mut desc = PipelineDesc {
            shader,
            label: Some("particles"),
            ..Default::default()
        };
        desc.layout.attrs[0].format = VertexFormat::Float2;
        desc.layout.attrs[1].format = VertexFormat::Float4;
        self.pipeline = gfx.make_pipeline(&desc);
        Ok(())
    }

    fn handle_input(
        &mut self,
        _input: &InputState,
        frame: &InputFrame,
        _elapsed: Duration,
    ) -> AppControl {
        if frame.key_pressed(Key::Escape) {
            return AppControl::Exit;
        }
        if frame.key_pressed(Key::Space) {
            self.burst = true;
        }
        AppControl::Continue
    }

    fn update(&mut self, time: &LoopTime) -> AppControl {
        let dt = time.elapsed_secs();
        let spawn = if std::mem::take(&mut self.burst) {
            MAX_PARTICLES
        } else {
            SPAWN_PER_STEP
        };
        let room = MAX_PARTICLES.saturating_sub(self.particles.len());
        self.spawn(spawn.min(room));

        for p in &mut self.particles {
            p.vel[1] += GRAVITY * dt;
            p.pos[0] += p.vel[0] * dt;
            p.pos[1] += p.vel[1] * dt;
            p.age += dt;
        }
        self.particles.retain(|p| p.pos[1] > -1.0 && p.age < 3.0);
        AppControl::Continue
    }

    fn draw(&mut self, ctx: &mut FrameCtx<'_>) -> Result<AppControl> {
        self.vertices.clear();
        for p in &self.particles {
            let fade = 1.0 - p.age / 3.0;
            let color = [1.0, 0.6 * fade, 0.2, fade];
            let [x, y] = p.pos;
            self.vertices.extend_from_slice(&[
                Vertex { pos: [x - SIZE, y - SIZE], color },
                Vertex { pos: [x + SIZE, y - SIZE], color },
                Vertex { pos: [x, y + SIZE], color },
            ]);
        }

        let action = PassAction::clear(Color::rgba(0.05, 0.05, 0.08, 1.0));
        let mut pass = ctx.begin_default_pass(&action)?;
        pass.apply_pipeline(self.pipeline)?;
        let mut dropped = 0;
        for batch in self.vertices.chunks(BATCH * 3) {
            let offset = pass.append_buffer(self.buf, bytemuck::cast_slice(batch))?;
            if pass.is_buffer_overflown(self.buf) {
                dropped += batch.len() / 3;
                continue;
            }
            let mut bindings = Bindings::default();
            bindings.vertex_buffers[0] = self.buf;
            bindings.vertex_buffer_offsets[0] = offset;
            pass.apply_bindings(&bindings)?;
            pass.draw(0, batch.len() as u32, 1)?;
        }
        pass.end();

        if dropped > 0 {
            log::debug!("particle buffer full, {dropped} particles not drawn this frame");
        }
        Ok(AppControl::Continue)
    }
}

fn main() {
    tessera_samples::init();
    let config = RuntimeConfig {
        title: "tessera: stream (space for a burst)".into(),
        ..Default::default()
    };
    if let Err(e) = Runtime::run(config, Fountain::new()) {
        log::error!("stream sample failed: {e:#}");
        std::process::exit(1);
    }
}
