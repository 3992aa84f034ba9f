//! Synthetic key chords and cancel-key handling.

use smol_str::SmolStr;

/// Primary shortcut modifier of the platform the host runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimaryModifier {
    /// Cmd, on macOS and iOS.
    Meta,
    /// Ctrl everywhere else.
    Control,
}

impl PrimaryModifier {
    pub fn for_platform(apple: bool) -> Self {
        if apple {
            PrimaryModifier::Meta
        } else {
            PrimaryModifier::Control
        }
    }
}

/// A keydown/keyup pair to dispatch at the focused element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyChord {
    /// `KeyboardEvent.key`
    pub key: SmolStr,
    /// `KeyboardEvent.code`
    pub code: SmolStr,
    /// Legacy `keyCode`/`which`, still read by some editors.
    pub key_code: u32,
    pub shift: bool,
    pub ctrl: bool,
    pub meta: bool,
    pub alt: bool,
}

impl KeyChord {
    /// The host's "turn selection into inline equation" shortcut
    /// (Ctrl/Cmd+Shift+E).
    pub fn inline_equation(modifier: PrimaryModifier) -> Self {
        Self {
            key: SmolStr::new_static("E"),
            code: SmolStr::new_static("KeyE"),
            key_code: 69,
            shift: true,
            ctrl: modifier == PrimaryModifier::Control,
            meta: modifier == PrimaryModifier::Meta,
            alt: false,
        }
    }

    /// A bare Enter press.
    pub fn enter() -> Self {
        Self {
            key: SmolStr::new_static("Enter"),
            code: SmolStr::new_static("Enter"),
            key_code: 13,
            shift: false,
            ctrl: false,
            meta: false,
            alt: false,
        }
    }

    /// Whether a key event with these properties is this chord.
    pub fn matches(&self, key: &str, shift: bool, ctrl: bool, meta: bool, alt: bool) -> bool {
        self.key == key
            && self.shift == shift
            && self.ctrl == ctrl
            && self.meta == meta
            && self.alt == alt
    }
}

/// Element tags that take plain text entry; the cancel key is left alone there.
const TEXT_ENTRY_TAGS: &[&str] = &["INPUT", "TEXTAREA"];

/// Whether a keydown should cancel the running session.
///
/// `target_tag` is the event target's tag name, if it is an element.
pub fn is_cancel_key(cancel_key: &str, key: &str, target_tag: Option<&str>) -> bool {
    if key != cancel_key {
        return false;
    }
    match target_tag {
        Some(tag) => !TEXT_ENTRY_TAGS
            .iter()
            .any(|t| t.eq_ignore_ascii_case(tag)),
        None => true,
    }
}
