use crate::sink::ActionSink;
use crate::{Action, ActionError, Key, MouseButton, NamedKey};
use std::time::Duration;
use uinput::device::Device;
use uinput::event::controller;
use uinput::event::keyboard;
use uinput::event::relative;

/// How long a synthesized key or button stays down.
const HOLD: Duration = Duration::from_millis(50);

/// Injects actions through a virtual `/dev/uinput` device.
pub struct UinputSink {
    dev: Device,
}

impl UinputSink {
    pub fn new() -> Result<Self, ActionError> {
        let dispatch = |e: uinput::Error| ActionError::Dispatch(e.to_string());
        let dev = uinput::default()
            .map_err(dispatch)?
            .name("gyrobind")
            .map_err(dispatch)?
            .event(uinput::event::Keyboard::All)
            .map_err(dispatch)?
            .event(uinput::event::Controller::Mouse(controller::Mouse::Left))
            .map_err(dispatch)?
            .event(uinput::event::Controller::Mouse(controller::Mouse::Right))
            .map_err(dispatch)?
            .event(uinput::event::Controller::Mouse(controller::Mouse::Middle))
            .map_err(dispatch)?
            .event(uinput::event::Relative::Position(relative::Position::X))
            .map_err(dispatch)?
            .event(uinput::event::Relative::Position(relative::Position::Y))
            .map_err(dispatch)?
            .create()
            .map_err(dispatch)?;
        tracing::info!("Virtual input device created");
        Ok(Self { dev })
    }

    fn tap_key(&mut self, key: keyboard::Key) -> Result<(), uinput::Error> {
        self.dev.press(&keyboard::Keyboard::Key(key))?;
        self.dev.synchronize()?;
        std::thread::sleep(HOLD);
        self.dev.release(&keyboard::Keyboard::Key(key))?;
        self.dev.synchronize()
    }

    fn click(&mut self, button: controller::Mouse) -> Result<(), uinput::Error> {
        self.dev.press(&controller::Controller::Mouse(button))?;
        self.dev.synchronize()?;
        std::thread::sleep(HOLD);
        self.dev.release(&controller::Controller::Mouse(button))?;
        self.dev.synchronize()
    }
}

impl ActionSink for UinputSink {
    fn execute(&mut self, action: &Action) -> Result<(), ActionError> {
        let result = match action {
            Action::KeyPress(key) => {
                let code = key_code(*key)
                    .ok_or_else(|| ActionError::Dispatch(format!("no uinput key for '{key}'")))?;
                self.tap_key(code)
            }
            Action::MouseClick(button) => self.click(match button {
                MouseButton::Left => controller::Mouse::Left,
                MouseButton::Right => controller::Mouse::Right,
                MouseButton::Middle => controller::Mouse::Middle,
            }),
        };
        result.map_err(|e| ActionError::Dispatch(e.to_string()))?;
        tracing::info!(%action, "Action executed");
        Ok(())
    }
}

fn key_code(key: Key) -> Option<keyboard::Key> {
    use keyboard::Key as K;
    let code = match key {
        Key::Named(named) => match named {
            NamedKey::Alt | NamedKey::AltL => K::LeftAlt,
            NamedKey::AltR => K::RightAlt,
            NamedKey::Backspace => K::BackSpace,
            NamedKey::CapsLock => K::CapsLock,
            NamedKey::Cmd | NamedKey::CmdL => K::LeftMeta,
            NamedKey::CmdR => K::RightMeta,
            NamedKey::Ctrl | NamedKey::CtrlL => K::LeftControl,
            NamedKey::CtrlR => K::RightControl,
            NamedKey::Delete => K::Delete,
            NamedKey::Down => K::Down,
            NamedKey::End => K::End,
            NamedKey::Enter => K::Enter,
            NamedKey::Esc => K::Esc,
            NamedKey::F1 => K::F1,
            NamedKey::F2 => K::F2,
            NamedKey::F3 => K::F3,
            NamedKey::F4 => K::F4,
            NamedKey::F5 => K::F5,
            NamedKey::F6 => K::F6,
            NamedKey::F7 => K::F7,
            NamedKey::F8 => K::F8,
            NamedKey::F9 => K::F9,
            NamedKey::F10 => K::F10,
            NamedKey::F11 => K::F11,
            NamedKey::F12 => K::F12,
            NamedKey::Home => K::Home,
            NamedKey::Insert => K::Insert,
            NamedKey::Left => K::Left,
            NamedKey::NumLock => K::NumLock,
            NamedKey::PageDown => K::PageDown,
            NamedKey::PageUp => K::PageUp,
            NamedKey::PrintScreen => K::SysRq,
            NamedKey::Right => K::Right,
            NamedKey::ScrollLock => K::ScrollLock,
            NamedKey::Shift | NamedKey::ShiftL => K::LeftShift,
            NamedKey::ShiftR => K::RightShift,
            NamedKey::Space => K::Space,
            NamedKey::Tab => K::Tab,
            NamedKey::Up => K::Up,
            // Media keys live outside the keyboard block of the device.
            NamedKey::MediaNext
            | NamedKey::MediaPlayPause
            | NamedKey::MediaPrevious
            | NamedKey::MediaVolumeDown
            | NamedKey::MediaVolumeMute
            | NamedKey::MediaVolumeUp
            | NamedKey::Menu
            | NamedKey::Pause => return None,
        },
        Key::Char(c) => match c.to_ascii_lowercase() {
            'a' => K::A,
            'b' => K::B,
            'c' => K::C,
            'd' => K::D,
            'e' => K::E,
            'f' => K::F,
            'g' => K::G,
            'h' => K::H,
            'i' => K::I,
            'j' => K::J,
            'k' => K::K,
            'l' => K::L,
            'm' => K::M,
            'n' => K::N,
            'o' => K::O,
            'p' => K::P,
            'q' => K::Q,
            'r' => K::R,
            's' => K::S,
            't' => K::T,
            'u' => K::U,
            'v' => K::V,
            'w' => K::W,
            'x' => K::X,
            'y' => K::Y,
            'z' => K::Z,
            '0' => K::_0,
            '1' => K::_1,
            '2' => K::_2,
            '3' => K::_3,
            '4' => K::_4,
            '5' => K::_5,
            '6' => K::_6,
            '7' => K::_7,
            '8' => K::_8,
            '9' => K::_9,
            '-' => K::Minus,
            '=' => K::Equal,
            ',' => K::Comma,
            '.' => K::Dot,
            '/' => K::Slash,
            ';' => K::SemiColon,
            '\'' => K::Apostrophe,
            '`' => K::Grave,
            '\\' => K::BackSlash,
            '[' => K::LeftBrace,
            ']' => K::RightBrace,
            ' ' => K::Space,
            _ => return None,
        },
    };
    Some(code)
}
