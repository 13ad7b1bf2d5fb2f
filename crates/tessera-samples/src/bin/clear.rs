//! Clears the window to a slowly cycling color. Escape quits.

use std::time::Duration;

use anyhow::Result;
use tessera_engine::core::{App, AppControl, FrameCtx};
use tessera_engine::gfx::{Color, PassAction};
use tessera_engine::input::{InputFrame, InputState, Key};
use tessera_engine::time::LoopTime;
use tessera_engine::window::{Runtime, RuntimeConfig};

#[derive(Default)]
struct Clear {
    green: f32,
}

impl App for Clear {
    fn handle_input(
        &mut self,
        _input: &InputState,
        frame: &InputFrame,
        _elapsed: Duration,
    ) -> AppControl {
        if frame.key_pressed(Key::Escape) {
            AppControl::Exit
        } else {
            AppControl::Continue
        }
    }

    fn update(&mut self, time: &LoopTime) -> AppControl {
        self.green = (self.green + 0.5 * time.elapsed_secs()).fract();
        AppControl::Continue
    }

    fn draw(&mut self, ctx: &mut FrameCtx<'_>) -> Result<AppControl> {
        let action = PassAction::clear(Color::rgba(1.0, self.green, 0.0, 1.0));
        ctx.begin_default_pass(&action)?.end();
        Ok(AppControl::Continue)
    }
}

fn main() {
    tessera_samples::init();
    let config = RuntimeConfig {
        title: "tessera: clear".into(),
        ..Default::default()
    };
    if let Err(e) = Runtime::run(config, Clear::default()) {
        log::error!("clear sample failed: {e:#}");
        std::process::exit(1);
    }
}
