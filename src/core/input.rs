use glam::Vec2;
use winit::keyboard::KeyCode;

/// Mouse button reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MouseButton {
    Left,
    Center,
    Right,
    #[default]
    None,
}

/// Modifier keys held while an input event was generated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Modifiers {
    pub control: bool,
    pub alt: bool,
    pub meta: bool,
    pub shift: bool,
    pub alt_gr: bool,
}

/// Key data carried by keyboard events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyInfo {
    /// Layout-independent key, when the platform can name it
    pub code: Option<KeyCode>,
    /// Character produced by the key, if any
    pub ch: Option<char>,
    /// Platform scancode
    pub raw: Option<u32>,
    pub modifiers: Modifiers,
}

impl KeyInfo {
    pub fn from_char(ch: char) -> Self {
        Self {
            code: None,
            ch: Some(ch),
            raw: None,
            modifiers: Modifiers::default(),
        }
    }
}

/// Position and button data carried by mouse events
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MouseInfo {
    pub button: MouseButton,
    pub position: Vec2,
    pub modifiers: Modifiers,
}

impl MouseInfo {
    pub fn at(button: MouseButton, x: f32, y: f32) -> Self {
        Self {
            button,
            position: Vec2::new(x, y),
            modifiers: Modifiers::default(),
        }
    }
}

/// Platform-neutral input event delivered to a window
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    KeyPressed(KeyInfo),
    KeyReleased(KeyInfo),
    KeyTyped(KeyInfo),
    MousePressed(MouseInfo),
    MouseReleased(MouseInfo),
    MouseClicked(MouseInfo),
    MouseDragged(MouseInfo),
    MouseMoved(MouseInfo),
}

/// Discriminant of an [`InputEvent`], used as a dispatch key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    KeyPressed,
    KeyReleased,
    KeyTyped,
    MousePressed,
    MouseReleased,
    MouseClicked,
    MouseDragged,
    MouseMoved,
}

impl InputEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            InputEvent::KeyPressed(_) => EventKind::KeyPressed,
            InputEvent::KeyReleased(_) => EventKind::KeyReleased,
            InputEvent::KeyTyped(_) => EventKind::KeyTyped,
            InputEvent::MousePressed(_) => EventKind::MousePressed,
            InputEvent::MouseReleased(_) => EventKind::MouseReleased,
            InputEvent::MouseClicked(_) => EventKind::MouseClicked,
            InputEvent::MouseDragged(_) => EventKind::MouseDragged,
            InputEvent::MouseMoved(_) => EventKind::MouseMoved,
        }
    }

    pub fn key(&self) -> Option<&KeyInfo> {
        match self {
            InputEvent::KeyPressed(k) | InputEvent::KeyReleased(k) | InputEvent::KeyTyped(k) => {
                Some(k)
            }
            _ => None,
        }
    }

    pub fn mouse(&self) -> Option<&MouseInfo> {
        match self {
            InputEvent::MousePressed(m)
            | InputEvent::MouseReleased(m)
            | InputEvent::MouseClicked(m)
            | InputEvent::MouseDragged(m)
            | InputEvent::MouseMoved(m) => Some(m),
            _ => None,
        }
    }
}

/// Latest keyboard and mouse state of one window
///
/// Every field is overwritten by the matching event; nothing is queued, so
/// two presses inside one frame leave only the second visible.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct InputState {
    pub key_pressed: bool,
    pub mouse_pressed: bool,
    pub mouse_button: MouseButton,
    pub key_code: Option<KeyCode>,
    pub key_char: Option<char>,
    pub key_raw: Option<u32>,
    pub modifiers: Modifiers,
    pub mouse_pos: Option<Vec2>,
}

impl InputState {
    /// Fold one event into the snapshot
    pub fn apply(&mut self, event: &InputEvent) {
        match event {
            InputEvent::KeyPressed(key) => {
                self.key_pressed = true;
                self.set_key(key);
            }
            InputEvent::KeyReleased(key) => {
                self.key_pressed = false;
                self.set_key(key);
            }
            InputEvent::KeyTyped(key) => {
                if key.ch.is_some() {
                    self.key_char = key.ch;
                }
                self.modifiers = key.modifiers;
            }
            InputEvent::MousePressed(mouse) => {
                self.mouse_pressed = true;
                self.set_mouse(mouse);
            }
            InputEvent::MouseReleased(mouse) => {
                self.mouse_pressed = false;
                self.set_mouse(mouse);
            }
            InputEvent::MouseClicked(mouse) => self.set_mouse(mouse),
            InputEvent::MouseDragged(mouse) | InputEvent::MouseMoved(mouse) => {
                self.mouse_pos = Some(mouse.position);
                self.modifiers = mouse.modifiers;
            }
        }
    }

    fn set_key(&mut self, key: &KeyInfo) {
        self.key_code = key.code;
        self.key_char = key.ch;
        self.key_raw = key.raw;
        self.modifiers = key.modifiers;
    }

    fn set_mouse(&mut self, mouse: &MouseInfo) {
        self.mouse_button = mouse.button;
        self.mouse_pos = Some(mouse.position);
        self.modifiers = mouse.modifiers;
    }

    pub fn mouse_x(&self) -> Option<f32> {
        self.mouse_pos.map(|p| p.x)
    }

    pub fn mouse_y(&self) -> Option<f32> {
        self.mouse_pos.map(|p| p.y)
    }
}
