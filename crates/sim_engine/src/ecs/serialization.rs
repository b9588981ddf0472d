//! Entity document serialization
//!
//! An entity serializes to a JSON tree:
//!
//! ```json
//! { "Id": "...", "Components": [{ "Type": "Transform", "Data": { ... } }], "Children": [ ... ] }
//! ```
//!
//! Component types are resolved through a closed [`ComponentRegistry`]. Loading
//! degrades gracefully: a missing id gets a fresh one, unknown or missing
//! component types are skipped, and only fields present in both the document
//! and the target are copied.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::ecs::component::{Component, FieldMap};
use crate::ecs::components::{BoxCollider, DistanceJoint, Rigidbody, SphereCollider, Transform};
use crate::ecs::Entity;

/// Key carrying the component enabled flag inside `Data`
pub const ENABLED_FIELD: &str = "Enabled";

/// Serialization errors; partial documents degrade instead of failing
#[derive(Error, Debug)]
pub enum SerializationError {
    /// Document is not valid JSON or does not have the document shape
    #[error("malformed entity document: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// One serialized entity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityDocument {
    /// Entity id; regenerated when absent
    #[serde(rename = "Id", default)]
    pub id: Option<String>,

    /// Serialized components
    #[serde(rename = "Components", default)]
    pub components: Vec<ComponentDocument>,

    /// Nested child documents
    #[serde(rename = "Children", default)]
    pub children: Vec<EntityDocument>,
}

/// One serialized component
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentDocument {
    /// Component type tag
    #[serde(rename = "Type", default)]
    pub type_tag: Option<String>,

    /// Flat field dump
    #[serde(rename = "Data", default)]
    pub data: FieldMap,
}

/// Constructs a component for an owner
pub type ComponentFactory = fn(&Arc<Entity>) -> Arc<dyn Component>;

/// Closed mapping from type tag to component factory
#[derive(Clone)]
pub struct ComponentRegistry {
    factories: HashMap<String, ComponentFactory>,
}

impl ComponentRegistry {
    /// Registry with no component types
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry preloaded with the built-in components
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register(Transform::TYPE_TAG, |owner| shared(Transform::new(owner)));
        registry.register(Rigidbody::TYPE_TAG, |owner| shared(Rigidbody::new(owner)));
        registry.register(BoxCollider::TYPE_TAG, |owner| shared(BoxCollider::new(owner)));
        registry.register(SphereCollider::TYPE_TAG, |owner| shared(SphereCollider::new(owner)));
        registry.register(DistanceJoint::TYPE_TAG, |owner| shared(DistanceJoint::new(owner)));
        registry
    }

    /// Register a factory; returns true if it replaced an existing one
    pub fn register(&mut self, tag: impl Into<String>, factory: ComponentFactory) -> bool {
        self.factories.insert(tag.into(), factory).is_some()
    }

    /// Construct the component registered under `tag`
    pub fn create(&self, tag: &str, owner: &Arc<Entity>) -> Option<Arc<dyn Component>> {
        self.factories.get(tag).map(|factory| factory(owner))
    }

    /// Whether a constructor is registered for `tag`
    pub fn contains(&self, tag: &str) -> bool {
        self.factories.contains_key(tag)
    }
}

/// Box a component for a registry factory
pub fn shared<T: Component>(component: T) -> Arc<dyn Component> {
    Arc::new(component)
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Dump a state struct into a flat field map
pub fn dump_fields<T: Serialize>(state: &T) -> FieldMap {
    match serde_json::to_value(state) {
        Ok(Value::Object(fields)) => fields,
        Ok(other) => {
            log::warn!("Component state serialized to non-object {other}");
            FieldMap::new()
        }
        Err(err) => {
            log::warn!("Failed to serialize component state: {err}");
            FieldMap::new()
        }
    }
}

/// Copy fields present in both `data` and `target`.
///
/// Unknown keys are ignored; a field whose value does not fit the target's
/// type is skipped with a warning and keeps its current value.
pub fn merge_fields<T: Serialize + DeserializeOwned>(target: &mut T, data: &FieldMap, type_tag: &str) {
    let mut merged = dump_fields(target);

    for (key, value) in data {
        let previous = match merged.get_mut(key) {
            Some(slot) => std::mem::replace(slot, value.clone()),
            None => continue,
        };
        if let Err(err) = serde_json::from_value::<T>(Value::Object(merged.clone())) {
            log::warn!("Ignoring field {type_tag}.{key}: {err}");
            if let Some(slot) = merged.get_mut(key) {
                *slot = previous;
            }
        }
    }

    match serde_json::from_value(Value::Object(merged)) {
        Ok(state) => *target = state,
        Err(err) => log::warn!("Failed to load {type_tag} fields: {err}"),
    }
}

impl Entity {
    /// Serialize this entity and its children
    pub fn to_document(&self) -> EntityDocument {
        let components = self
            .components()
            .iter()
            .map(|component| {
                let mut data = component.save_fields();
                data.insert(ENABLED_FIELD.to_string(), Value::Bool(component.base().is_enabled()));
                ComponentDocument {
                    type_tag: Some(component.type_tag().to_string()),
                    data,
                }
            })
            .collect();

        EntityDocument {
            id: Some(self.id().to_string()),
            components,
            children: self.children().iter().map(|child| child.to_document()).collect(),
        }
    }

    /// Serialize to a JSON string
    pub fn serialize_to_json(&self) -> Result<String, SerializationError> {
        Ok(serde_json::to_string_pretty(&self.to_document())?)
    }

    /// Build a standalone entity tree from a document.
    ///
    /// Entity-valued fields stay unresolved until
    /// [`Entity::resolve_references`] runs against the live entities.
    pub fn from_document(document: &EntityDocument, registry: &ComponentRegistry) -> Arc<Entity> {
        let entity = match document.id.as_deref().filter(|id| !id.is_empty()) {
            Some(id) => Entity::with_id(id),
            None => Entity::new(),
        };

        for component_document in &document.components {
            let Some(tag) = component_document.type_tag.as_deref() else {
                log::warn!("Skipping component without a type in entity '{}'", entity.id());
                continue;
            };
            let Some(component) = registry.create(tag, &entity) else {
                log::warn!("Skipping unknown component type '{tag}' in entity '{}'", entity.id());
                continue;
            };

            component.load_fields(&component_document.data);
            if let Some(Value::Bool(enabled)) = component_document.data.get(ENABLED_FIELD) {
                component.base().set_enabled(*enabled);
            }
            if let Err(err) = entity.add_component(component) {
                log::warn!("Skipping component '{tag}': {err}");
            }
        }

        for child_document in &document.children {
            let child = Self::from_document(child_document, registry);
            if let Err(err) = entity.add_child(&child) {
                log::warn!("Skipping child '{}': {err}", child.id());
            }
        }

        entity
    }

    /// Parse a JSON document into a standalone entity tree
    pub fn deserialize_from_json(
        json: &str,
        registry: &ComponentRegistry,
    ) -> Result<Arc<Entity>, SerializationError> {
        let document: EntityDocument = serde_json::from_str(json)?;
        Ok(Self::from_document(&document, registry))
    }

    /// Resolve entity-valued fields of this entity and its children
    pub fn resolve_references(&self, lookup: &dyn Fn(&str) -> Option<Arc<Entity>>) {
        for component in self.components() {
            component.resolve_references(lookup);
        }
        for child in self.children() {
            child.resolve_references(lookup);
        }
    }
}
