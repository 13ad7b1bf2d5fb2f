use std::collections::HashMap;
use std::time::Duration;

use super::frame::InputFrame;
use super::types::{ButtonState, InputEvent, Key, Modifiers, MouseButton};

/// Held keys and buttons, pointer position and focus of the window.
#[derive(Debug, Default)]
pub struct InputState {
    pub modifiers: Modifiers,
    pub focused: bool,
    /// Pointer position in logical pixels; `None` outside the window.
    pub pointer: Option<(f32, f32)>,
    keys: HashMap<Key, ButtonState>,
    buttons: HashMap<MouseButton, ButtonState>,
}

impl InputState {
    /// Folds `ev` into the state and records it in `frame`.
    pub fn apply(&mut self, frame: &mut InputFrame, ev: InputEvent) {
        match &ev {
            InputEvent::Key { key, pressed, .. } => {
                let state = self.keys.entry(*key).or_default();
                if state.is_down != *pressed {
                    state.is_down = *pressed;
                    if *pressed {
                        frame.keys_pressed.insert(*key);
                    } else {
                        frame.keys_released.insert(*key);
                    }
                }
            }
            InputEvent::MouseButton { button, pressed } => {
                let state = self.buttons.entry(*button).or_default();
                if state.is_down != *pressed {
                    state.is_down = *pressed;
                    if *pressed {
                        frame.buttons_pressed.insert(*button);
                    } else {
                        frame.buttons_released.insert(*button);
                    }
                }
            }
            InputEvent::MouseMoved { x, y } => self.pointer = Some((*x, *y)),
            InputEvent::MouseLeft => self.pointer = None,
            InputEvent::MouseWheel { dx, dy, .. } => {
                frame.wheel.0 += dx;
                frame.wheel.1 += dy;
            }
            InputEvent::Text(text) => frame.text.push_str(text),
            InputEvent::ModifiersChanged(m) => self.modifiers = *m,
            InputEvent::Focused(focused) => {
                self.focused = *focused;
                if !focused {
                    // Releases are not delivered to an unfocused window.
                    self.keys.values_mut().for_each(|s| s.is_down = false);
                    self.buttons.values_mut().for_each(|s| s.is_down = false);
                }
            }
        }
        frame.events.push(ev);
    }

    /// Closes an input step: shifts down/up history and adds `elapsed` to
    /// the hold time of every held key and button.
    pub fn advance(&mut self, elapsed: Duration) {
        self.keys.values_mut().for_each(|s| s.advance(elapsed));
        self.buttons.values_mut().for_each(|s| s.advance(elapsed));
        self.keys.retain(|_, s| s.is_down || s.was_down);
        self.buttons.retain(|_, s| s.is_down || s.was_down);
    }

    pub fn key(&self, key: Key) -> ButtonState {
        self.keys.get(&key).copied().unwrap_or_default()
    }

    pub fn button(&self, button: MouseButton) -> ButtonState {
        self.buttons.get(&button).copied().unwrap_or_default()
    }

    pub fn key_down(&self, key: Key) -> bool {
        self.key(key).is_down
    }

    pub fn button_down(&self, button: MouseButton) -> bool {
        self.button(button).is_down
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(key: Key, pressed: bool) -> InputEvent {
        InputEvent::Key {
            key,
            pressed,
            repeat: false,
        }
    }

    #[test]
    fn press_and_release_are_recorded_once() {
        let mut state = InputState::default();
        let mut frame = InputFrame::default();

        state.apply(&mut frame, key(Key::W, true));
        state.apply(&mut frame, key(Key::W, true));
        assert!(state.key_down(Key::W));
        assert!(frame.key_pressed(Key::W));
        assert_eq!(frame.events.len(), 2);

        state.apply(&mut frame, key(Key::W, false));
        assert!(!state.key_down(Key::W));
        assert!(frame.key_released(Key::W));
    }

    #[test]
    fn held_duration_accumulates_until_release() {
        let mut state = InputState::default();
        let mut frame = InputFrame::default();
        let step = Duration::from_millis(16);

        state.apply(&mut frame, key(Key::Space, true));
        assert!(state.key(Key::Space).entered_pressed());
        state.advance(step);
        state.advance(step);
        let held = state.key(Key::Space);
        assert!(held.is_down && held.was_down);
        assert_eq!(held.held, step * 2);

        state.apply(&mut frame, key(Key::Space, false));
        assert!(state.key(Key::Space).entered_released());
        state.advance(step);
        assert_eq!(state.key(Key::Space), ButtonState::default());
    }

    #[test]
    fn focus_loss_releases_everything() {
        let mut state = InputState::default();
        let mut frame = InputFrame::default();
        state.apply(&mut frame, key(Key::A, true));
        state.apply(
            &mut frame,
            InputEvent::MouseButton {
                button: MouseButton::Left,
                pressed: true,
            },
        );
        state.apply(&mut frame, InputEvent::Focused(false));
        assert!(!state.key_down(Key::A));
        assert!(!state.button_down(MouseButton::Left));
    }

    #[test]
    fn frame_collects_text_and_wheel() {
        let mut state = InputState::default();
        let mut frame = InputFrame::default();
        state.apply(&mut frame, InputEvent::Text("ab".into()));
        state.apply(&mut frame, InputEvent::Text("c".into()));
        for _ in 0..2 {
            state.apply(
                &mut frame,
                InputEvent::MouseWheel {
                    dx: 0.0,
                    dy: 1.5,
                    pixels: false,
                },
            );
        }
        assert_eq!(frame.text, "abc");
        assert_eq!(frame.wheel, (0.0, 3.0));
        frame.clear();
        assert!(frame.is_empty());
        assert!(frame.text.is_empty());
    }
}
