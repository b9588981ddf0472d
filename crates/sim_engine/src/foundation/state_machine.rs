//! Owner-scoped state machine
//!
//! Holds at most one instance per concrete state type and exactly one active
//! state at a time. Typical use is a component switching between behaviour
//! modes (camera orbit/follow, AI idle/chase).

use std::any::{type_name, TypeId};
use std::collections::HashMap;
use thiserror::Error;

/// A single state driven by a [`StateMachine`]
pub trait State<O>: Send {
    /// Called when the state becomes current
    fn enter(&mut self, _owner: &O) {}

    /// Called once per update while the state is current
    fn update(&mut self, _owner: &O, _delta_time: f32) {}

    /// Called when another state replaces this one
    fn exit(&mut self, _owner: &O) {}
}

/// State machine errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum StateError {
    /// The requested state type was never added
    #[error("State {0} has not been added to the state machine")]
    UnknownState(&'static str),
}

/// Single-active-state container keyed by state type
pub struct StateMachine<O> {
    states: HashMap<TypeId, Box<dyn State<O>>>,
    current: Option<TypeId>,
}

impl<O> StateMachine<O> {
    /// Create an empty state machine
    pub fn new() -> Self {
        Self {
            states: HashMap::new(),
            current: None,
        }
    }

    /// Add a state; a second state of the same type is ignored
    ///
    /// Returns `true` if the state was inserted.
    pub fn add_state<S: State<O> + 'static>(&mut self, state: S) -> bool {
        let key = TypeId::of::<S>();
        if self.states.contains_key(&key) {
            log::debug!("State {} already registered, keeping the first instance", type_name::<S>());
            return false;
        }
        self.states.insert(key, Box::new(state));
        true
    }

    /// Exit the current state and enter `S`
    pub fn change_state<S: State<O> + 'static>(&mut self, owner: &O) -> Result<(), StateError> {
        let next = TypeId::of::<S>();
        if !self.states.contains_key(&next) {
            return Err(StateError::UnknownState(type_name::<S>()));
        }

        if let Some(previous) = self.current.take() {
            if let Some(state) = self.states.get_mut(&previous) {
                state.exit(owner);
            }
        }

        self.current = Some(next);
        if let Some(state) = self.states.get_mut(&next) {
            state.enter(owner);
        }
        Ok(())
    }

    /// Update the current state, if any
    pub fn update(&mut self, owner: &O, delta_time: f32) {
        if let Some(current) = self.current {
            if let Some(state) = self.states.get_mut(&current) {
                state.update(owner, delta_time);
            }
        }
    }

    /// Whether `S` is the current state
    pub fn is_current<S: State<O> + 'static>(&self) -> bool {
        self.current == Some(TypeId::of::<S>())
    }

    /// Whether a state of type `S` has been added
    pub fn contains<S: State<O> + 'static>(&self) -> bool {
        self.states.contains_key(&TypeId::of::<S>())
    }

    /// Number of registered states
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Whether no states are registered
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

impl<O> Default for StateMachine<O> {
    fn default() -> Self {
        Self::new()
    }
}
