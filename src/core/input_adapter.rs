use glam::Vec2;
use winit::event::{ElementState, KeyEvent, MouseButton as WinitMouseButton, WindowEvent};
use winit::keyboard::{Key, NamedKey, PhysicalKey};

use super::input::{InputEvent, KeyInfo, Modifiers, MouseButton, MouseInfo};

/// Adapter that turns winit window events into [`InputEvent`]s
///
/// winit reports raw presses only, so typed, clicked and dragged events are
/// synthesised here: a key press carrying text also yields `KeyTyped`, a
/// release at the press position yields `MouseClicked`, and cursor motion with
/// a button held yields `MouseDragged`.
#[derive(Debug, Clone, Default)]
pub struct WinitInputAdapter {
    modifiers: Modifiers,
    cursor: Option<Vec2>,
    held: Option<MouseButton>,
    press_origin: Option<Vec2>,
}

impl WinitInputAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Translate one window event. Events that carry no input yield nothing.
    pub fn translate(&mut self, event: &WindowEvent) -> Vec<InputEvent> {
        match event {
            WindowEvent::ModifiersChanged(mods) => {
                let state = mods.state();
                self.modifiers = Modifiers {
                    control: state.control_key(),
                    alt: state.alt_key(),
                    meta: state.super_key(),
                    shift: state.shift_key(),
                    alt_gr: self.modifiers.alt_gr,
                };
                Vec::new()
            }
            WindowEvent::KeyboardInput { event, .. } => self.on_key(event),
            WindowEvent::MouseInput { state, button, .. } => self.on_mouse_button(*state, *button),
            WindowEvent::CursorMoved { position, .. } => {
                self.on_cursor(position.x as f32, position.y as f32)
            }
            WindowEvent::CursorLeft { .. } => {
                self.cursor = None;
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    fn on_key(&mut self, event: &KeyEvent) -> Vec<InputEvent> {
        let pressed = event.state == ElementState::Pressed;
        if let Key::Named(NamedKey::AltGraph) = event.logical_key {
            self.modifiers.alt_gr = pressed;
        }

        let info = KeyInfo {
            code: match event.physical_key {
                PhysicalKey::Code(code) => Some(code),
                PhysicalKey::Unidentified(_) => None,
            },
            ch: event.text.as_ref().and_then(|text| text.chars().next()),
            raw: scancode(&event.physical_key),
            modifiers: self.modifiers,
        };

        if pressed {
            let mut events = vec![InputEvent::KeyPressed(info)];
            if info.ch.is_some() {
                events.push(InputEvent::KeyTyped(info));
            }
            events
        } else {
            vec![InputEvent::KeyReleased(info)]
        }
    }

    fn on_mouse_button(&mut self, state: ElementState, button: WinitMouseButton) -> Vec<InputEvent> {
        let button = Self::map_button(button);
        let position = self.cursor.unwrap_or(Vec2::ZERO);
        let info = MouseInfo {
            button,
            position,
            modifiers: self.modifiers,
        };

        match state {
            ElementState::Pressed => {
                self.held = Some(button);
                self.press_origin = Some(position);
                vec![InputEvent::MousePressed(info)]
            }
            ElementState::Released => {
                self.held = None;
                let clicked = self.press_origin.take() == Some(position);
                let mut events = vec![InputEvent::MouseReleased(info)];
                if clicked {
                    events.push(InputEvent::MouseClicked(info));
                }
                events
            }
        }
    }

    fn on_cursor(&mut self, x: f32, y: f32) -> Vec<InputEvent> {
        let position = Vec2::new(x, y);
        self.cursor = Some(position);
        match self.held {
            Some(button) => vec![InputEvent::MouseDragged(MouseInfo {
                button,
                position,
                modifiers: self.modifiers,
            })],
            None => vec![InputEvent::MouseMoved(MouseInfo {
                button: MouseButton::None,
                position,
                modifiers: self.modifiers,
            })],
        }
    }

    /// Map winit's button to ours; extra buttons report `None`
    fn map_button(button: WinitMouseButton) -> MouseButton {
        match button {
            WinitMouseButton::Left => MouseButton::Left,
            WinitMouseButton::Middle => MouseButton::Center,
            WinitMouseButton::Right => MouseButton::Right,
            _ => MouseButton::None,
        }
    }
}

#[cfg(any(target_os = "windows", target_os = "macos", target_os = "linux"))]
fn scancode(key: &PhysicalKey) -> Option<u32> {
    use winit::platform::scancode::PhysicalKeyExtScancode;
    key.to_scancode()
}

#[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
fn scancode(_key: &PhysicalKey) -> Option<u32> {
    None
}
