use winit::dpi::PhysicalPosition;
use winit::event::{ElementState, Ime, MouseButton as WinitButton, MouseScrollDelta, WindowEvent};
use winit::keyboard::{KeyCode, ModifiersState, PhysicalKey};

use super::types::{InputEvent, Key, Modifiers, MouseButton};

/// Translates a winit window event; `None` for events input does not track.
pub(crate) fn translate(scale_factor: f64, event: &WindowEvent) -> Option<InputEvent> {
    let logical = |p: PhysicalPosition<f64>| {
        let l = p.to_logical::<f64>(scale_factor);
        (l.x as f32, l.y as f32)
    };

    Some(match event {
        WindowEvent::KeyboardInput { event, .. } => InputEvent::Key {
            key: map_key(event.physical_key),
            pressed: event.state == ElementState::Pressed,
            repeat: event.repeat,
        },
        WindowEvent::CursorMoved { position, .. } => {
            let (x, y) = logical(*position);
            InputEvent::MouseMoved { x, y }
        }
        WindowEvent::CursorLeft { .. } => InputEvent::MouseLeft,
        WindowEvent::MouseInput { state, button, .. } => InputEvent::MouseButton {
            button: map_button(*button),
            pressed: *state == ElementState::Pressed,
        },
        WindowEvent::MouseWheel { delta, .. } => match delta {
            MouseScrollDelta::LineDelta(dx, dy) => InputEvent::MouseWheel {
                dx: *dx,
                dy: *dy,
                pixels: false,
            },
            MouseScrollDelta::PixelDelta(p) => {
                let (dx, dy) = logical(*p);
                InputEvent::MouseWheel {
                    dx,
                    dy,
                    pixels: true,
                }
            }
        },
        WindowEvent::Ime(Ime::Commit(text)) if !text.is_empty() => InputEvent::Text(text.clone()),
        WindowEvent::ModifiersChanged(m) => InputEvent::ModifiersChanged(map_modifiers(m.state())),
        WindowEvent::Focused(focused) => InputEvent::Focused(*focused),
        _ => return None,
    })
}

fn map_modifiers(m: ModifiersState) -> Modifiers {
    let mut out = Modifiers::empty();
    out.set(Modifiers::SHIFT, m.shift_key());
    out.set(Modifiers::CTRL, m.control_key());
    out.set(Modifiers::ALT, m.alt_key());
    out.set(Modifiers::SUPER, m.super_key());
    out
}

fn map_button(b: WinitButton) -> MouseButton {
    match b {
        WinitButton::Left => MouseButton::Left,
        WinitButton::Right => MouseButton::Right,
        WinitButton::Middle => MouseButton::Middle,
        WinitButton::Back => MouseButton::Back,
        WinitButton::Forward => MouseButton::Forward,
        WinitButton::Other(v) => MouseButton::Other(v),
    }
}

macro_rules! key_table {
    ($code:expr; $($winit:ident => $key:ident),* $(,)?) => {
        match $code {
            $(KeyCode::$winit => Key::$key,)*
            other => Key::Unknown(other as u32),
        }
    };
}

fn map_key(pk: PhysicalKey) -> Key {
    let PhysicalKey::Code(code) = pk else {
        return Key::Unknown(0);
    };
    key_table!(code;
        Escape => Escape, Enter => Enter, Tab => Tab, Backspace => Backspace, Space => Space,
        Insert => Insert, Delete => Delete, Home => Home, End => End,
        PageUp => PageUp, PageDown => PageDown,
        ArrowUp => Up, ArrowDown => Down, ArrowLeft => Left, ArrowRight => Right,
        Minus => Minus, Equal => Equal, Comma => Comma, Period => Period, Slash => Slash,
        Semicolon => Semicolon, Quote => Quote, BracketLeft => BracketLeft,
        BracketRight => BracketRight, Backquote => Backquote, Backslash => Backslash,
        ShiftLeft => LeftShift, ShiftRight => RightShift,
        ControlLeft => LeftControl, ControlRight => RightControl,
        AltLeft => LeftAlt, AltRight => RightAlt,
        SuperLeft => LeftSuper, SuperRight => RightSuper,
        KeyA => A, KeyB => B, KeyC => C, KeyD => D, KeyE => E, KeyF => F, KeyG => G,
        KeyH => H, KeyI => I, KeyJ => J, KeyK => K, KeyL => L, KeyM => M, KeyN => N,
        KeyO => O, KeyP => P, KeyQ => Q, KeyR => R, KeyS => S, KeyT => T, KeyU => U,
        KeyV => V, KeyW => W, KeyX => X, KeyY => Y, KeyZ => Z,
        Digit0 => Num0, Digit1 => Num1, Digit2 => Num2, Digit3 => Num3, Digit4 => Num4,
        Digit5 => Num5, Digit6 => Num6, Digit7 => Num7, Digit8 => Num8, Digit9 => Num9,
        F1 => F1, F2 => F2, F3 => F3, F4 => F4, F5 => F5, F6 => F6,
        F7 => F7, F8 => F8, F9 => F9, F10 => F10, F11 => F11, F12 => F12,
    )
}
