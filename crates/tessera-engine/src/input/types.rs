use std::fmt;
use std::time::Duration;

use bitflags::bitflags;

/// Keyboard key, identified by physical position.
///
/// Keys without a variant arrive as `Unknown` with the platform's code.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Key {
    Escape,
    Enter,
    Tab,
    Backspace,
    Space,
    Insert,
    Delete,
    Home,
    End,
    PageUp,
    PageDown,
    Up,
    Down,
    Left,
    Right,
    Minus,
    Equal,
    Comma,
    Period,
    Slash,
    Semicolon,
    Quote,
    BracketLeft,
    BracketRight,
    Backquote,
    Backslash,
    LeftShift,
    RightShift,
    LeftControl,
    RightControl,
    LeftAlt,
    RightAlt,
    LeftSuper,
    RightSuper,
    A, B, C, D, E, F, G, H, I, J, K, L, M, N, O, P, Q, R, S, T, U, V, W, X, Y, Z,
    Num0, Num1, Num2, Num3, Num4, Num5, Num6, Num7, Num8, Num9,
    F1, F2, F3, F4, F5, F6, F7, F8, F9, F10, F11, F12,
    Unknown(u32),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Back,
    Forward,
    Other(u16),
}

bitflags! {
    /// Held modifier keys.
    #[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
    pub struct Modifiers: u8 {
        const SHIFT = 1 << 0;
        const CTRL = 1 << 1;
        const ALT = 1 << 2;
        const SUPER = 1 << 3;
    }
}

/// Input translated from the windowing system.
///
/// Positions and wheel pixel deltas are in logical pixels.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    Key {
        key: Key,
        pressed: bool,
        repeat: bool,
    },
    MouseMoved {
        x: f32,
        y: f32,
    },
    MouseButton {
        button: MouseButton,
        pressed: bool,
    },
    /// Scroll in lines (`pixels == false`) or logical pixels.
    MouseWheel {
        dx: f32,
        dy: f32,
        pixels: bool,
    },
    /// Committed text, one event per commit.
    Text(String),
    ModifiersChanged(Modifiers),
    Focused(bool),
    MouseLeft,
}

/// Down/up history of one key or button.
///
/// `is_down` and `was_down` compare the latest state with the one before the
/// previous [`InputState::advance`](super::InputState::advance).
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct ButtonState {
    pub is_down: bool,
    pub was_down: bool,
    /// How long the button has been held, counted by `advance`.
    pub held: Duration,
}

impl ButtonState {
    /// Down now, up before.
    pub fn entered_pressed(&self) -> bool {
        self.is_down && !self.was_down
    }

    /// Up now, down before.
    pub fn entered_released(&self) -> bool {
        !self.is_down && self.was_down
    }

    pub(crate) fn advance(&mut self, elapsed: Duration) {
        self.was_down = self.is_down;
        if self.is_down {
            self.held += elapsed;
        } else {
            self.held = Duration::ZERO;
        }
    }
}
