use super::config::MAX_COLOR_ATTACHMENTS;
use super::types::Color;

pub const DEFAULT_CLEAR_COLOR: Color = Color::rgba(0.5, 0.5, 0.5, 1.0);
pub const DEFAULT_CLEAR_DEPTH: f32 = 1.0;
pub const DEFAULT_CLEAR_STENCIL: u8 = 0;

/// What happens to an attachment when a pass begins.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub enum Action<T> {
    /// Clear with the default value for the attachment kind.
    #[default]
    Default,
    Clear(T),
    /// Keep the previous content.
    Load,
    /// Content is undefined; only valid when every pixel gets drawn.
    DontCare,
}

/// An [`Action`] with `Default` replaced by an explicit clear.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum LoadAction<T> {
    Clear(T),
    Load,
    DontCare,
}

impl<T: Copy> Action<T> {
    fn resolve(self, default: T) -> LoadAction<T> {
        match self {
            Action::Default => LoadAction::Clear(default),
            Action::Clear(v) => LoadAction::Clear(v),
            Action::Load => LoadAction::Load,
            Action::DontCare => LoadAction::DontCare,
        }
    }
}

/// Attachment actions for one `begin_*_pass` call.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct PassAction {
    pub colors: [Action<Color>; MAX_COLOR_ATTACHMENTS],
    pub depth: Action<f32>,
    pub stencil: Action<u8>,
}

impl PassAction {
    /// Clears every color attachment to `color`, depth to 1 and stencil to 0.
    pub fn clear(color: Color) -> Self {
        Self {
            colors: [Action::Clear(color); MAX_COLOR_ATTACHMENTS],
            depth: Action::Clear(DEFAULT_CLEAR_DEPTH),
            stencil: Action::Clear(DEFAULT_CLEAR_STENCIL),
        }
    }

    pub fn load() -> Self {
        Self {
            colors: [Action::Load; MAX_COLOR_ATTACHMENTS],
            depth: Action::Load,
            stencil: Action::Load,
        }
    }

    pub fn dont_care() -> Self {
        Self {
            colors: [Action::DontCare; MAX_COLOR_ATTACHMENTS],
            depth: Action::DontCare,
            stencil: Action::DontCare,
        }
    }

    pub fn resolved(&self) -> ResolvedPassAction {
        ResolvedPassAction {
            colors: self.colors.map(|a| a.resolve(DEFAULT_CLEAR_COLOR)),
            depth: self.depth.resolve(DEFAULT_CLEAR_DEPTH),
            stencil: self.stencil.resolve(DEFAULT_CLEAR_STENCIL),
        }
    }
}

/// Pass action as handed to the backend.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ResolvedPassAction {
    pub colors: [LoadAction<Color>; MAX_COLOR_ATTACHMENTS],
    pub depth: LoadAction<f32>,
    pub stencil: LoadAction<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_resolves_to_documented_clear_values() {
        let r = PassAction::default().resolved();
        assert!(r.colors.iter().all(|c| *c == LoadAction::Clear(DEFAULT_CLEAR_COLOR)));
        assert_eq!(r.depth, LoadAction::Clear(1.0));
        assert_eq!(r.stencil, LoadAction::Clear(0));
    }

    #[test]
    fn explicit_actions_pass_through() {
        let mut action = PassAction::clear(Color::BLACK);
        action.colors[1] = Action::Load;
        action.stencil = Action::DontCare;
        let r = action.resolved();
        assert_eq!(r.colors[0], LoadAction::Clear(Color::BLACK));
        assert_eq!(r.colors[1], LoadAction::Load);
        assert_eq!(r.stencil, LoadAction::DontCare);
    }

    #[test]
    fn load_and_dont_care_cover_all_attachments() {
        assert!(PassAction::load().resolved().colors.iter().all(|c| *c == LoadAction::Load));
        assert_eq!(PassAction::dont_care().resolved().depth, LoadAction::DontCare);
    }
}
