use std::collections::HashSet;

use super::types::{InputEvent, Key, MouseButton};

/// Input gathered since the last time the loop dispatched input.
///
/// The loop clears it after `App::handle_input`; iterations that dispatch
/// nothing leave it queued.
#[derive(Debug, Default)]
pub struct InputFrame {
    /// Events in arrival order.
    pub events: Vec<InputEvent>,
    pub keys_pressed: HashSet<Key>,
    pub keys_released: HashSet<Key>,
    pub buttons_pressed: HashSet<MouseButton>,
    pub buttons_released: HashSet<MouseButton>,
    /// Concatenated committed text.
    pub text: String,
    /// Summed wheel movement as `(dx, dy)`.
    pub wheel: (f32, f32),
}

impl InputFrame {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn key_pressed(&self, key: Key) -> bool {
        self.keys_pressed.contains(&key)
    }

    pub fn key_released(&self, key: Key) -> bool {
        self.keys_released.contains(&key)
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.keys_pressed.clear();
        self.keys_released.clear();
        self.buttons_pressed.clear();
        self.buttons_released.clear();
        self.text.clear();
        self.wheel = (0.0, 0.0);
    }
}
