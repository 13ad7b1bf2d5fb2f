use crate::gfx::{Device, PassAction, PassEncoder, Result};
use crate::input::InputState;
use crate::time::LoopTime;

/// Per-frame context passed to [`App::draw`](super::App::draw).
pub struct FrameCtx<'a> {
    pub gfx: &'a mut Device,
    pub input: &'a InputState,
    /// `elapsed` is the wall-clock time since the previous draw; `alpha`
    /// blends the last two simulation states.
    pub time: LoopTime,
}

impl FrameCtx<'_> {
    /// Default framebuffer size in pixels.
    pub fn framebuffer_size(&self) -> (u32, u32) {
        self.gfx.framebuffer_size()
    }

    /// Width over height of the default framebuffer; 1 while minimized.
    pub fn aspect(&self) -> f32 {
        match self.framebuffer_size() {
            (w, h) if w > 0 && h > 0 => w as f32 / h as f32,
            _ => 1.0,
        }
    }

    pub fn begin_default_pass(&mut self, action: &PassAction) -> Result<PassEncoder<'_>> {
        self.gfx.begin_default_pass(action)
    }
}
