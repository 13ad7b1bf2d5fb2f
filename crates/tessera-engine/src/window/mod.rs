//! Window runtime.
//!
//! Owns the winit event loop and window and pumps them once per iteration of
//! the fixed-timestep loop.

mod runtime;

pub use runtime::{Runtime, RuntimeConfig};
