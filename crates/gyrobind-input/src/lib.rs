//! Typed actions fired by motion triggers, and the sinks that execute them.

pub mod queue;
pub mod sink;
#[cfg(all(target_os = "linux", feature = "uinput"))]
pub mod uinput_sink;

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    #[error("unknown action type '{0}'")]
    UnknownKind(String),
    #[error("action has no key or button")]
    EmptyDetail,
    #[error("unknown mouse button '{0}'")]
    UnknownButton(String),
    #[error("unknown key '{0}'")]
    UnknownKey(String),
    #[error("failed to dispatch action: {0}")]
    Dispatch(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl MouseButton {
    pub fn name(self) -> &'static str {
        match self {
            MouseButton::Left => "left",
            MouseButton::Right => "right",
            MouseButton::Middle => "middle",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, ActionError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(MouseButton::Left),
            "right" => Ok(MouseButton::Right),
            "middle" => Ok(MouseButton::Middle),
            other => Err(ActionError::UnknownButton(other.to_string())),
        }
    }
}

/// Keys addressed by name rather than by the character they type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedKey {
    Alt,
    AltL,
    AltR,
    Backspace,
    CapsLock,
    Cmd,
    CmdL,
    CmdR,
    Ctrl,
    CtrlL,
    CtrlR,
    Delete,
    Down,
    End,
    Enter,
    Esc,
    F1,
    F2,
    F3,
    F4,
    F5,
    F6,
    F7,
    F8,
    F9,
    F10,
    F11,
    F12,
    Home,
    Insert,
    Left,
    MediaNext,
    MediaPlayPause,
    MediaPrevious,
    MediaVolumeDown,
    MediaVolumeMute,
    MediaVolumeUp,
    Menu,
    NumLock,
    PageDown,
    PageUp,
    Pause,
    PrintScreen,
    Right,
    ScrollLock,
    Shift,
    ShiftL,
    ShiftR,
    Space,
    Tab,
    Up,
}

const NAMED_KEYS: &[(&str, NamedKey)] = &[
    ("alt", NamedKey::Alt),
    ("alt_l", NamedKey::AltL),
    ("alt_r", NamedKey::AltR),
    ("backspace", NamedKey::Backspace),
    ("caps_lock", NamedKey::CapsLock),
    ("cmd", NamedKey::Cmd),
    ("cmd_l", NamedKey::CmdL),
    ("cmd_r", NamedKey::CmdR),
    ("ctrl", NamedKey::Ctrl),
    ("ctrl_l", NamedKey::CtrlL),
    ("ctrl_r", NamedKey::CtrlR),
    ("delete", NamedKey::Delete),
    ("down", NamedKey::Down),
    ("end", NamedKey::End),
    ("enter", NamedKey::Enter),
    ("esc", NamedKey::Esc),
    ("f1", NamedKey::F1),
    ("f2", NamedKey::F2),
    ("f3", NamedKey::F3),
    ("f4", NamedKey::F4),
    ("f5", NamedKey::F5),
    ("f6", NamedKey::F6),
    ("f7", NamedKey::F7),
    ("f8", NamedKey::F8),
    ("f9", NamedKey::F9),
    ("f10", NamedKey::F10),
    ("f11", NamedKey::F11),
    ("f12", NamedKey::F12),
    ("home", NamedKey::Home),
    ("insert", NamedKey::Insert),
    ("left", NamedKey::Left),
    ("media_next", NamedKey::MediaNext),
    ("media_play_pause", NamedKey::MediaPlayPause),
    ("media_previous", NamedKey::MediaPrevious),
    ("media_volume_down", NamedKey::MediaVolumeDown),
    ("media_volume_mute", NamedKey::MediaVolumeMute),
    ("media_volume_up", NamedKey::MediaVolumeUp),
    ("menu", NamedKey::Menu),
    ("num_lock", NamedKey::NumLock),
    ("page_down", NamedKey::PageDown),
    ("page_up", NamedKey::PageUp),
    ("pause", NamedKey::Pause),
    ("print_screen", NamedKey::PrintScreen),
    ("right", NamedKey::Right),
    ("scroll_lock", NamedKey::ScrollLock),
    ("shift", NamedKey::Shift),
    ("shift_l", NamedKey::ShiftL),
    ("shift_r", NamedKey::ShiftR),
    ("space", NamedKey::Space),
    ("tab", NamedKey::Tab),
    ("up", NamedKey::Up),
];

impl NamedKey {
    pub fn name(self) -> &'static str {
        NAMED_KEYS
            .iter()
            .find(|(_, key)| *key == self)
            .map_or("unknown", |(name, _)| name)
    }

    /// Case-insensitive lookup.
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        NAMED_KEYS
            .iter()
            .find(|(n, _)| *n == lower)
            .map(|(_, key)| *key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Named(NamedKey),
    /// A key that types this character.
    Char(char),
}

impl Key {
    /// A special key name (`space`, `f5`) or a single character.
    pub fn parse(text: &str) -> Result<Self, ActionError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ActionError::EmptyDetail);
        }
        if let Some(named) = NamedKey::from_name(text) {
            return Ok(Key::Named(named));
        }
        let mut chars = text.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(Key::Char(c)),
            _ => Err(ActionError::UnknownKey(text.to_string())),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Named(named) => f.write_str(named.name()),
            Key::Char(c) => write!(f, "{c}"),
        }
    }
}

const KEY_PRESS: &str = "Key Press";
const MOUSE_CLICK: &str = "Mouse Click";

/// Something a completed trigger does.
///
/// Stored in profiles as `{ type = "Key Press" | "Mouse Click", detail = "..." }`
/// and validated once on load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "ActionDescriptor", into = "ActionDescriptor")]
pub enum Action {
    KeyPress(Key),
    MouseClick(MouseButton),
}

/// Persisted form of an [`Action`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    #[serde(rename = "type")]
    pub kind: String,
    pub detail: String,
}

impl TryFrom<ActionDescriptor> for Action {
    type Error = ActionError;

    fn try_from(descriptor: ActionDescriptor) -> Result<Self, Self::Error> {
        Action::from_descriptor(&descriptor.kind, &descriptor.detail)
    }
}

impl From<Action> for ActionDescriptor {
    fn from(action: Action) -> Self {
        match action {
            Action::KeyPress(key) => ActionDescriptor {
                kind: KEY_PRESS.into(),
                detail: key.to_string(),
            },
            Action::MouseClick(button) => ActionDescriptor {
                kind: MOUSE_CLICK.into(),
                detail: button.name().into(),
            },
        }
    }
}

impl Action {
    /// Build from a type label (`Key Press`, `Mouse Click`) and its detail.
    pub fn from_descriptor(kind: &str, detail: &str) -> Result<Self, ActionError> {
        if detail.trim().is_empty() {
            return Err(ActionError::EmptyDetail);
        }
        match kind.trim() {
            KEY_PRESS => Key::parse(detail).map(Action::KeyPress),
            MOUSE_CLICK => MouseButton::from_name(detail).map(Action::MouseClick),
            other => Err(ActionError::UnknownKind(other.to_string())),
        }
    }

    /// Parse a motion binding: `left_click`, `right_click`, `middle_click`,
    /// or a key name / character.
    pub fn parse_binding(binding: &str) -> Result<Self, ActionError> {
        let binding = binding.trim().to_lowercase();
        match binding.as_str() {
            "" => Err(ActionError::EmptyDetail),
            "left_click" => Ok(Action::MouseClick(MouseButton::Left)),
            "right_click" => Ok(Action::MouseClick(MouseButton::Right)),
            "middle_click" => Ok(Action::MouseClick(MouseButton::Middle)),
            key => Key::parse(key).map(Action::KeyPress),
        }
    }

    /// Inverse of [`Action::parse_binding`].
    pub fn to_binding(&self) -> String {
        match self {
            Action::KeyPress(key) => key.to_string(),
            Action::MouseClick(button) => format!("{}_click", button.name()),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::KeyPress(key) => write!(f, "{KEY_PRESS}: {key}"),
            Action::MouseClick(button) => write!(f, "{MOUSE_CLICK}: {}", button.name()),
        }
    }
}

/// Serde helper for optional bindings stored as a plain string
/// (`left_click`, `space`). Empty strings read as `None`.
pub mod binding_serde {
    use super::Action;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(action: &Option<Action>, s: S) -> Result<S::Ok, S::Error> {
        match action {
            Some(action) => s.serialize_str(&action.to_binding()),
            None => s.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Action>, D::Error> {
        let text = Option::<String>::deserialize(d)?.unwrap_or_default();
        if text.trim().is_empty() {
            return Ok(None);
        }
        Action::parse_binding(&text)
            .map(Some)
            .map_err(serde::de::Error::custom)
    }
}

/// Serde helper for an optional `{ type, detail }` table. A missing table or
/// a blank detail reads as `None`; `None` should be skipped when writing.
pub mod descriptor_serde {
    use super::{Action, ActionDescriptor};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(action: &Option<Action>, s: S) -> Result<S::Ok, S::Error> {
        action.map(ActionDescriptor::from).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Action>, D::Error> {
        match Option::<ActionDescriptor>::deserialize(d)? {
            Some(descriptor) if !descriptor.detail.trim().is_empty() => Action::try_from(descriptor)
                .map(Some)
                .map_err(serde::de::Error::custom),
            _ => Ok(None),
        }
    }
}
