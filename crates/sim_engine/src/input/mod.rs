//! Input capability and keybind map
//!
//! The platform layer feeds raw key transitions into a [`KeybindMap`] with
//! [`KeybindMap::handle_key_input`]; the frame loop then calls `update`,
//! which derives pressed/held/released edges and fires the bound callbacks.

use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::engine::{EngineComponent, EngineError};

/// Input errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    /// No callback is bound to the action
    #[error("no keybind registered for {0}")]
    UnboundAction(KeyAction),
}

/// Key codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum KeyCode {
    A, B, C, D, E, F, G, H, I, J, K, L, M,
    N, O, P, Q, R, S, T, U, V, W, X, Y, Z,
    Space,
    Enter,
    Escape,
    Up,
    Down,
    Left,
    Right,
}

/// Edge of a key's state a binding reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyTrigger {
    /// First update the key is down
    Pressed,
    /// Every update the key stays down after being pressed
    Held,
    /// First update the key is up again
    Released,
}

/// Key plus trigger edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyAction {
    /// Key being watched
    pub key: KeyCode,
    /// Key state that fires the callback
    pub trigger: KeyTrigger,
}

impl KeyAction {
    /// Action for `key` in state `trigger`
    pub const fn new(key: KeyCode, trigger: KeyTrigger) -> Self {
        Self { key, trigger }
    }

    /// Fires on the frame `key` goes down
    pub const fn pressed(key: KeyCode) -> Self {
        Self::new(key, KeyTrigger::Pressed)
    }

    /// Fires every frame `key` stays down
    pub const fn held(key: KeyCode) -> Self {
        Self::new(key, KeyTrigger::Held)
    }

    /// Fires on the frame `key` comes up
    pub const fn released(key: KeyCode) -> Self {
        Self::new(key, KeyTrigger::Released)
    }
}

impl fmt::Display for KeyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {:?}", self.key, self.trigger)
    }
}

/// Callback fired for a bound action
pub type KeyCallback = Arc<dyn Fn() + Send + Sync>;

/// Input capability
pub trait InputBackend: EngineComponent {
    /// Poll input and fire the bindings whose action occurred
    fn update(&self);

    /// Bind a callback to an action; several callbacks may share one action
    fn register_keybind(&self, action: KeyAction, callback: KeyCallback);

    /// Move every callback bound to `old` onto `new`
    fn replace_keybind(&self, old: KeyAction, new: KeyAction) -> Result<(), InputError>;
}

#[derive(Debug, Default)]
struct KeyState {
    down: HashSet<KeyCode>,
    previous: HashSet<KeyCode>,
}

/// Keyboard state tracker with action bindings
#[derive(Default)]
pub struct KeybindMap {
    bindings: RwLock<HashMap<KeyAction, Vec<KeyCallback>>>,
    state: Mutex<KeyState>,
}

impl KeybindMap {
    /// Map with no bindings
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a raw key transition from the platform layer
    pub fn handle_key_input(&self, key: KeyCode, pressed: bool) {
        let mut state = self.state.lock();
        if pressed {
            state.down.insert(key);
        } else {
            state.down.remove(&key);
        }
    }

    /// Whether the key is currently down
    pub fn is_down(&self, key: KeyCode) -> bool {
        self.state.lock().down.contains(&key)
    }

    /// Whether any callback is bound to `action`
    pub fn is_bound(&self, action: KeyAction) -> bool {
        self.bindings
            .read()
            .get(&action)
            .is_some_and(|callbacks| !callbacks.is_empty())
    }

    /// Actions that occurred since the previous update
    fn collect_actions(&self) -> Vec<KeyAction> {
        let mut state = self.state.lock();
        let mut actions = Vec::new();
        for key in &state.down {
            if state.previous.contains(key) {
                actions.push(KeyAction::held(*key));
            } else {
                actions.push(KeyAction::pressed(*key));
            }
        }
        for key in state.previous.difference(&state.down) {
            actions.push(KeyAction::released(*key));
        }
        state.previous = state.down.clone();
        actions
    }
}

impl InputBackend for KeybindMap {
    fn update(&self) {
        let actions = self.collect_actions();
        if actions.is_empty() {
            return;
        }
        let callbacks: Vec<KeyCallback> = {
            let bindings = self.bindings.read();
            actions
                .iter()
                .filter_map(|action| bindings.get(action))
                .flatten()
                .cloned()
                .collect()
        };
        for callback in callbacks {
            callback();
        }
    }

    fn register_keybind(&self, action: KeyAction, callback: KeyCallback) {
        self.bindings.write().entry(action).or_default().push(callback);
    }

    fn replace_keybind(&self, old: KeyAction, new: KeyAction) -> Result<(), InputError> {
        let mut bindings = self.bindings.write();
        let callbacks = bindings
            .remove(&old)
            .filter(|callbacks| !callbacks.is_empty())
            .ok_or(InputError::UnboundAction(old))?;
        bindings.entry(new).or_default().extend(callbacks);
        log::debug!("Rebound {old} to {new}");
        Ok(())
    }
}

impl EngineComponent for KeybindMap {
    fn name(&self) -> &str {
        "keybind_map"
    }

    fn initialize(&self) -> Result<(), EngineError> {
        log::debug!("Keybind map ready with {} bound actions", self.bindings.read().len());
        Ok(())
    }

    fn shutdown(&self) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        state.down.clear();
        state.previous.clear();
        Ok(())
    }
}
