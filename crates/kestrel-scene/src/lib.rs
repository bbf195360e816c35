pub mod collision;
pub mod components;
pub mod entity;
pub mod manager;
pub mod node;
pub mod particles;
pub mod scene;
pub mod skeleton;
pub mod ui;

pub use {
    collision::{Aabb, ColliderAabb},
    components::{builtin_registry, SkeletonController, SkinnedMeshRenderer, StaticMeshRenderer},
    entity::{
        Component, ComponentCtx, ComponentRegistry, Entity, EntityStore, RenderCtx,
        SkeletonInstances,
    },
    manager::SceneManager,
    node::{Node, NodeInfo, NodeTree},
    particles::{EmitterConfig, ParticleEmitter, ParticleSystem},
    scene::Scene,
    skeleton::{InstanceAnimation, SkeletonInstance},
    ui::{UiQuad, UiRoot, UiView},
};
