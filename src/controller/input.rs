/// Platform-agnostic input handling system
use std::collections::HashSet;

use crate::error::{Result, SceneError};

/// Platform-independent input events
#[derive(Debug, Clone)]
pub enum InputEvent {
    KeyDown(String),
    KeyUp(String),

    // Window events
    FocusLost,
    VisibilityChanged { visible: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    /// `UP`, `DOWN`, `LEFT`, `RIGHT`, any case.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|d| d.name().eq_ignore_ascii_case(name))
    }

    pub fn name(self) -> &'static str {
        match self {
            Direction::Up => "UP",
            Direction::Down => "DOWN",
            Direction::Left => "LEFT",
            Direction::Right => "RIGHT",
        }
    }
}

/// Snapshot of the four steering directions for one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeysPressed {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

impl KeysPressed {
    pub fn is_pressed(&self, direction: Direction) -> bool {
        match direction {
            Direction::Up => self.up,
            Direction::Down => self.down,
            Direction::Left => self.left,
            Direction::Right => self.right,
        }
    }

    pub fn set(&mut self, direction: Direction, pressed: bool) {
        match direction {
            Direction::Up => self.up = pressed,
            Direction::Down => self.down = pressed,
            Direction::Left => self.left = pressed,
            Direction::Right => self.right = pressed,
        }
    }

    /// Build from `(name, pressed)` pairs. Missing directions count as
    /// released; unknown names are an error.
    pub fn from_named<'a, I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, bool)>,
    {
        let mut keys = Self::default();
        for (name, pressed) in entries {
            let direction = Direction::from_name(name)
                .ok_or_else(|| SceneError::MalformedKeyState(name.to_string()))?;
            keys.set(direction, pressed);
        }
        Ok(keys)
    }
}

/// Raw key state collected from keyboard events
pub struct InputState {
    pub pressed_keys: HashSet<String>,
}

impl Default for InputState {
    fn default() -> Self {
        Self::new()
    }
}

impl InputState {
    pub fn new() -> Self {
        Self {
            pressed_keys: HashSet::new(),
        }
    }

    /// Process an input event and update state
    pub fn process_event(&mut self, event: &InputEvent) {
        match event {
            InputEvent::KeyDown(key) => {
                self.pressed_keys.insert(key.clone());
            }
            InputEvent::KeyUp(key) => {
                self.pressed_keys.remove(key.as_str());
            }
            // Key-up events are lost while the page is hidden or unfocused
            InputEvent::FocusLost | InputEvent::VisibilityChanged { .. } => {
                self.clear_keys();
            }
        }
    }

    pub fn is_key_pressed(&self, key: &str) -> bool {
        self.pressed_keys.contains(key)
    }

    pub fn clear_keys(&mut self) {
        self.pressed_keys.clear();
    }
}

/// Key mapping configuration
#[derive(Clone)]
pub struct KeyBindings {
    pub up: Vec<String>,
    pub down: Vec<String>,
    pub left: Vec<String>,
    pub right: Vec<String>,
}

impl Default for KeyBindings {
    fn default() -> Self {
        let keys = |names: &[&str]| names.iter().map(|s| s.to_string()).collect();
        Self {
            up: keys(&["ArrowUp", "w", "W"]),
            down: keys(&["ArrowDown", "s", "S"]),
            left: keys(&["ArrowLeft", "a", "A"]),
            right: keys(&["ArrowRight", "d", "D"]),
        }
    }
}

impl KeyBindings {
    fn keys_for(&self, direction: Direction) -> &[String] {
        match direction {
            Direction::Up => &self.up,
            Direction::Down => &self.down,
            Direction::Left => &self.left,
            Direction::Right => &self.right,
        }
    }
}

/// High-level input processor
#[derive(Clone, Default)]
pub struct InputProcessor {
    bindings: KeyBindings,
}

impl InputProcessor {
    pub fn new(bindings: KeyBindings) -> Self {
        Self { bindings }
    }

    pub fn keys_pressed(&self, input: &InputState) -> KeysPressed {
        let mut keys = KeysPressed::default();
        for direction in Direction::ALL {
            let pressed = self
                .bindings
                .keys_for(direction)
                .iter()
                .any(|k| input.is_key_pressed(k));
            keys.set(direction, pressed);
        }
        keys
    }

    /// Keys whose browser default (scrolling) must be suppressed.
    pub fn is_steering_key(&self, key: &str) -> bool {
        Direction::ALL
            .into_iter()
            .any(|d| self.bindings.keys_for(d).iter().any(|k| k == key))
    }
}

#[cfg(target_arch = "wasm32")]
pub mod wasm {
    use super::*;
    use web_sys::KeyboardEvent;

    pub fn keyboard_event_to_input(e: &KeyboardEvent, is_down: bool) -> InputEvent {
        let key = e.key();
        if is_down {
            InputEvent::KeyDown(key)
        } else {
            InputEvent::KeyUp(key)
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub mod native {
    use super::*;
    use winit::event::{ElementState, KeyEvent};
    use winit::keyboard::{Key, NamedKey};

    /// Key names match the browser's `KeyboardEvent.key` so the same
    /// bindings work on both platforms.
    pub fn key_name(key: &Key) -> Option<String> {
        match key {
            Key::Named(NamedKey::ArrowUp) => Some("ArrowUp".to_string()),
            Key::Named(NamedKey::ArrowDown) => Some("ArrowDown".to_string()),
            Key::Named(NamedKey::ArrowLeft) => Some("ArrowLeft".to_string()),
            Key::Named(NamedKey::ArrowRight) => Some("ArrowRight".to_string()),
            Key::Named(NamedKey::Escape) => Some("Escape".to_string()),
            Key::Character(s) => Some(s.to_string()),
            _ => None,
        }
    }

    pub fn key_event_to_input(event: &KeyEvent) -> Option<InputEvent> {
        let name = key_name(&event.logical_key)?;
        Some(match event.state {
            ElementState::Pressed => InputEvent::KeyDown(name),
            ElementState::Released => InputEvent::KeyUp(name),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with(keys: &[&str]) -> InputState {
        let mut state = InputState::new();
        for k in keys {
            state.process_event(&InputEvent::KeyDown(k.to_string()));
        }
        state
    }

    #[test]
    fn arrows_and_wasd_map_to_directions() {
        let processor = InputProcessor::default();
        let keys = processor.keys_pressed(&state_with(&["ArrowUp", "d"]));
        assert_eq!(
            keys,
            KeysPressed {
                up: true,
                down: false,
                left: false,
                right: true
            }
        );
    }

    #[test]
    fn key_up_releases_direction() {
        let processor = InputProcessor::default();
        let mut state = state_with(&["ArrowLeft"]);
        state.process_event(&InputEvent::KeyUp("ArrowLeft".to_string()));
        assert_eq!(processor.keys_pressed(&state), KeysPressed::default());
    }

    #[test]
    fn focus_loss_clears_everything() {
        let mut state = state_with(&["ArrowUp", "ArrowLeft"]);
        state.process_event(&InputEvent::FocusLost);
        assert!(state.pressed_keys.is_empty());
    }

    #[test]
    fn named_key_state_accepts_known_names_in_any_case() {
        let keys = KeysPressed::from_named([("UP", true), ("left", true), ("Down", false)]).unwrap();
        assert!(keys.up && keys.left);
        assert!(!keys.down && !keys.right);
    }

    #[test]
    fn named_key_state_rejects_unknown_names() {
        let err = KeysPressed::from_named([("UP", true), ("JUMP", true)]).unwrap_err();
        assert_eq!(err, SceneError::MalformedKeyState("JUMP".to_string()));
    }

    #[test]
    fn steering_keys_are_recognized() {
        let processor = InputProcessor::default();
        assert!(processor.is_steering_key("ArrowDown"));
        assert!(processor.is_steering_key("w"));
        assert!(!processor.is_steering_key("Escape"));
    }
}
