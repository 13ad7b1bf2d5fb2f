//! Input subsystem.
//!
//! The public types do not expose winit; `translate` maps window events for
//! the runtime.

mod frame;
mod state;
mod types;
pub(crate) mod translate;

pub use frame::InputFrame;
pub use state::InputState;
pub use types::{ButtonState, InputEvent, Key, Modifiers, MouseButton};
