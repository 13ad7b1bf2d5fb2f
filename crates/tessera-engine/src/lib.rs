//! tessera engine crate.
//!
//! A validated, handle-based graphics device over pluggable backends
//! ([`gfx`]), a fixed-timestep application loop ([`core`], [`time`]) and the
//! winit/wgpu runtime that hosts it ([`window`]).

pub mod core;
pub mod gfx;
pub mod input;
pub mod logging;
pub mod time;
pub mod window;
