//! Application contract and the fixed-timestep loop driving it.
//!
//! [`FixedStepLoop`] only talks to the outside through [`Platform`] and
//! [`Clock`](crate::time::Clock), so the whole loop runs under tests with a
//! scripted platform, a manual clock and the headless backend.

mod app;
mod ctx;
mod run_loop;

pub use app::{App, AppControl};
pub use ctx::FrameCtx;
pub use run_loop::{FixedStepLoop, LoopExit, LoopStats, Platform, PlatformEvent, ScriptedPlatform};
