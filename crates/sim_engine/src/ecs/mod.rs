//! Entity/component model
//!
//! Entities own components and child entities; components receive lifecycle
//! hooks from the event bus once their entity is registered with an engine.

pub mod component;
pub mod components;
pub mod entity;
pub mod registry;
pub mod serialization;

#[cfg(test)]
mod tests;

pub use component::{downcast_component, Component, ComponentBase, ComponentCast, FieldMap};
pub use entity::{Entity, EntityError};
pub use registry::EntityRegistry;
pub use serialization::{
    ComponentDocument, ComponentFactory, ComponentRegistry, EntityDocument, SerializationError,
};
