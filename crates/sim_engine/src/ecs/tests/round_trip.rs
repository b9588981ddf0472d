//! Serialize/deserialize round trips of whole entity trees

use approx::assert_relative_eq;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::core::EngineConfig;
use crate::ecs::components::{BoxCollider, DistanceJoint, Rigidbody, SphereCollider};
use crate::ecs::{ComponentRegistry, Entity};
use crate::engine::Engine;
use crate::events::EventBus;
use crate::foundation::math::{Quat, Vec3};

fn type_tags(entity: &Entity) -> BTreeSet<&'static str> {
    entity
        .components()
        .iter()
        .map(|component| component.type_tag())
        .collect()
}

fn build_rig() -> Arc<Entity> {
    let rig = Entity::new();
    rig.transform().set_position(Vec3::new(1.0, 2.0, 3.0));
    rig.transform()
        .set_rotation(Quat::from_euler_angles(0.3, -0.2, 1.1));
    let body = rig.attach_new(Rigidbody::new).unwrap();
    body.set_mass(3.5);
    body.set_drag(0.25);
    body.set_velocity(Vec3::new(0.5, 0.0, -1.0));
    rig.add(BoxCollider::new(&rig).with_size(Vec3::new(2.0, 1.0, 4.0)))
        .unwrap();

    let bob = Entity::new();
    rig.add_child(&bob).unwrap();
    bob.transform().set_position(Vec3::new(1.0, -1.0, 3.0));
    bob.attach_new(Rigidbody::new).unwrap();
    bob.add(SphereCollider::new(&bob).with_radius(0.75)).unwrap();

    let joint = rig
        .add(DistanceJoint::new(&rig).with_rest_length(3.0))
        .unwrap();
    joint.set_target(&bob);
    rig
}

#[test]
fn test_round_trip_preserves_components_and_fields() {
    let original = build_rig();
    let json = original.serialize_to_json().unwrap();

    let restored = Entity::deserialize_from_json(&json, &ComponentRegistry::default()).unwrap();

    assert_eq!(restored.id(), original.id());
    assert_eq!(type_tags(&restored), type_tags(&original));
    assert_relative_eq!(restored.transform().position(), original.transform().position());
    assert_relative_eq!(
        restored.transform().rotation(),
        original.transform().rotation(),
        epsilon = 1e-6
    );

    let body = restored.rigidbody().unwrap();
    assert_relative_eq!(body.mass(), 3.5);
    assert_relative_eq!(body.drag(), 0.25);
    assert_relative_eq!(body.velocity(), Vec3::new(0.5, 0.0, -1.0));
    assert_relative_eq!(
        restored.get_component::<BoxCollider>().unwrap().size(),
        Vec3::new(2.0, 1.0, 4.0)
    );

    let children = restored.children();
    assert_eq!(children.len(), 1);
    let bob = &children[0];
    assert_eq!(bob.id(), original.children()[0].id());
    assert_relative_eq!(bob.get_component::<SphereCollider>().unwrap().radius(), 0.75);
    assert!(Arc::ptr_eq(&bob.parent().unwrap(), &restored));
}

#[test]
fn test_entity_references_resolve_against_live_entities() {
    let engine = Engine::builder(EngineConfig::default())
        .register_event_bus(|_| Arc::new(EventBus::new()), false)
        .build();
    let json = build_rig().serialize_to_json().unwrap();

    let restored = Entity::deserialize_from_json(&json, &ComponentRegistry::default()).unwrap();
    let joint = restored.get_component::<DistanceJoint>().unwrap();
    assert!(joint.target().is_none());
    assert_relative_eq!(joint.rest_length(), 3.0);

    engine.add_entity(&restored);
    engine.resolve_references(&restored);

    let target = joint.target().unwrap();
    assert!(Arc::ptr_eq(&target, &restored.children()[0]));
}

#[test]
fn test_document_without_children_or_components() {
    let restored =
        Entity::deserialize_from_json(r#"{ "Id": "empty" }"#, &ComponentRegistry::default())
            .unwrap();

    assert_eq!(restored.id(), "empty");
    assert_eq!(type_tags(&restored), BTreeSet::from(["Transform"]));
    assert!(restored.children().is_empty());
}
