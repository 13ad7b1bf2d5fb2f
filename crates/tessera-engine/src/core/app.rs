use std::time::Duration;

use anyhow::Result;

use super::ctx::FrameCtx;
use crate::gfx::Device;
use crate::input::{InputFrame, InputState};
use crate::time::LoopTime;

/// Control directive returned by app callbacks.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AppControl {
    Continue,
    Exit,
}

/// Application driven by the fixed-timestep loop.
pub trait App {
    /// Creates GPU resources. Called once before the first iteration.
    fn init(&mut self, gfx: &mut Device) -> Result<()> {
        let _ = gfx;
        Ok(())
    }

    /// Called once per iteration that runs updates, before them.
    ///
    /// `frame` holds everything that arrived since the previous call.
    fn handle_input(
        &mut self,
        input: &InputState,
        frame: &InputFrame,
        elapsed: Duration,
    ) -> AppControl {
        let _ = (input, frame, elapsed);
        AppControl::Continue
    }

    /// Advances the simulation by `time.elapsed`, always the fixed step.
    fn update(&mut self, time: &LoopTime) -> AppControl;

    /// Renders once per iteration after the catch-up updates.
    fn draw(&mut self, ctx: &mut FrameCtx<'_>) -> Result<AppControl>;

    /// The default framebuffer changed size.
    fn resized(&mut self, width: u32, height: u32) {
        let _ = (width, height);
    }

    /// Called once after the loop stopped, with the device still alive.
    fn shutdown(&mut self, gfx: &mut Device) {
        let _ = gfx;
    }
}
