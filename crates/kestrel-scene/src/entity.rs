use {
    crate::{node::NodeTree, skeleton::SkeletonInstance, Node},
    anyhow::{anyhow, Result},
    kestrel_asset::AssetProviders,
    kestrel_core::{id::IdAllocator, Error, Id},
    kestrel_gfx::RenderList,
    std::{any::Any, collections::HashMap},
};

pub type SkeletonInstances = HashMap<Id<Entity>, SkeletonInstance>;

/// Context handed to component lifecycle hooks during setup/tick.
pub struct ComponentCtx<'a> {
    pub entity: Id<Entity>,
    pub node: Id<Node>,
    pub nodes: &'a mut NodeTree,
    pub providers: &'a mut AssetProviders,
    pub skeletons: &'a mut SkeletonInstances,
    /// Set by a component to destroy its entity at the end of the tick.
    pub destroyed: &'a mut bool,
    /// Scene camera orientation this frame (billboards face it).
    pub camera_orientation: glam::Quat,
    pub dt: f32,
}

/// Context handed to component render hooks.
pub struct RenderCtx<'a> {
    pub entity: Id<Entity>,
    pub node: Id<Node>,
    pub nodes: &'a NodeTree,
    pub providers: &'a mut AssetProviders,
    pub skeletons: &'a SkeletonInstances,
}

/// Entity behavior unit. At most one component of a given type name is
/// attached to an entity.
pub trait Component: Any {
    /// Stable name used by the serialization registry.
    fn type_name(&self) -> &'static str;

    fn setup(&mut self, _ctx: &mut ComponentCtx) {}

    fn tick(&mut self, _ctx: &mut ComponentCtx) {}

    fn render(&mut self, _ctx: &mut RenderCtx, _list: &mut RenderList) {}

    fn to_json(&self) -> serde_json::Value;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Composed game object: a node binding plus components.
pub struct Entity {
    pub(crate) id: Id<Entity>,
    pub(crate) node: Id<Node>,
    pub active: bool,
    pub destroyed: bool,
    pub(crate) components: Vec<Box<dyn Component>>,
}

impl Entity {
    pub fn id(&self) -> Id<Entity> { self.id }

    pub fn node(&self) -> Id<Node> { self.node }

    /// Replaces any existing component of the same type name.
    pub fn attach(&mut self, component: Box<dyn Component>) {
        self.components.retain(|existing| existing.type_name() != component.type_name());
        self.components.push(component);
    }

    pub fn component<T: Component>(&self) -> Option<&T> {
        self.components.iter().find_map(|component| component.as_any().downcast_ref())
    }

    pub fn component_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.components
            .iter_mut()
            .find_map(|component| component.as_any_mut().downcast_mut())
    }

    pub fn components(&self) -> &[Box<dyn Component>] { &self.components }
}

/// Entity storage keyed by id; ids strictly increase and are never reissued.
#[derive(Default)]
pub struct EntityStore {
    entities: HashMap<Id<Entity>, Entity>,
    allocator: IdAllocator<Entity>,
}

impl EntityStore {
    pub fn spawn(&mut self, node: Id<Node>) -> Id<Entity> {
        let id = self.allocator.next();
        self.insert_new(id, node);
        id
    }

    pub fn spawn_with_id(&mut self, id: Id<Entity>, node: Id<Node>) -> Option<Id<Entity>> {
        if self.entities.contains_key(&id) {
            return None;
        }
        self.allocator.reserve(id);
        self.insert_new(id, node);
        Some(id)
    }

    fn insert_new(&mut self, id: Id<Entity>, node: Id<Node>) {
        self.entities.insert(
            id,
            Entity {
                id,
                node,
                active: true,
                destroyed: false,
                components: Vec::new(),
            },
        );
    }

    pub fn get(&self, id: Id<Entity>) -> Option<&Entity> { self.entities.get(&id) }

    pub fn get_mut(&mut self, id: Id<Entity>) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    pub fn contains(&self, id: Id<Entity>) -> bool { self.entities.contains_key(&id) }

    pub fn len(&self) -> usize { self.entities.len() }

    pub fn is_empty(&self) -> bool { self.entities.is_empty() }

    pub(crate) fn take(&mut self, id: Id<Entity>) -> Option<Entity> { self.entities.remove(&id) }

    pub(crate) fn put_back(&mut self, entity: Entity) {
        self.entities.insert(entity.id, entity);
    }

    pub fn remove(&mut self, id: Id<Entity>) -> Option<Entity> { self.entities.remove(&id) }

    /// Active entities in stable id order.
    pub fn active_ids(&self) -> Vec<Id<Entity>> {
        let mut ids: Vec<Id<Entity>> = self
            .entities
            .values()
            .filter(|entity| entity.active && !entity.destroyed)
            .map(Entity::id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Entities flagged destroyed, in id order.
    pub fn destroyed_ids(&self) -> Vec<Id<Entity>> {
        let mut ids: Vec<Id<Entity>> = self
            .entities
            .values()
            .filter(|entity| entity.destroyed)
            .map(Entity::id)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> { self.entities.values() }
}

type ComponentCtor = fn(&serde_json::Value) -> Result<Box<dyn Component>>;

/// Deserialization dispatch: component constructors keyed on type name.
/// Scene JSON names a component's `type`; the registry builds it.
#[derive(Default)]
pub struct ComponentRegistry {
    constructors: HashMap<&'static str, ComponentCtor>,
}

impl ComponentRegistry {
    pub fn register(&mut self, type_name: &'static str, constructor: ComponentCtor) {
        self.constructors.insert(type_name, constructor);
    }

    pub fn create(&self, value: &serde_json::Value) -> Result<Box<dyn Component>> {
        let type_name = value
            .get("type")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| anyhow!(Error::CorruptAsset("component without a type".into())))?;
        let constructor = self
            .constructors
            .get(type_name)
            .ok_or_else(|| anyhow!(Error::NotFound(format!("component type {type_name:?}"))))?;
        constructor(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Tag(&'static str);

    impl Component for Tag {
        fn type_name(&self) -> &'static str { self.0 }
        fn to_json(&self) -> serde_json::Value { serde_json::json!({ "type": self.0 }) }
        fn as_any(&self) -> &dyn Any { self }
        fn as_any_mut(&mut self) -> &mut dyn Any { self }
    }

    #[test]
    fn attach_replaces_same_type() {
        let mut store = EntityStore::default();
        let node = Id::new(1).unwrap();
        let id = store.spawn(node);
        let entity = store.get_mut(id).unwrap();
        entity.attach(Box::new(Tag("a")));
        entity.attach(Box::new(Tag("b")));
        entity.attach(Box::new(Tag("a")));
        assert_eq!(entity.components().len(), 2);
    }

    #[test]
    fn active_ids_are_sorted_and_skip_inactive() {
        let mut store = EntityStore::default();
        let node = Id::new(1).unwrap();
        let a = store.spawn(node);
        let b = store.spawn(node);
        let c = store.spawn(node);
        store.get_mut(b).unwrap().active = false;
        store.get_mut(c).unwrap().destroyed = true;
        assert_eq!(store.active_ids(), vec![a]);
        assert_eq!(store.destroyed_ids(), vec![c]);
    }

    #[test]
    fn ids_never_reissue() {
        let mut store = EntityStore::default();
        let node = Id::new(1).unwrap();
        let a = store.spawn(node);
        store.remove(a);
        let b = store.spawn(node);
        assert!(b > a);
    }

    #[test]
    fn registry_dispatches_on_type_field() {
        let mut registry = ComponentRegistry::default();
        registry.register("tag", |_| Ok(Box::new(Tag("tag"))));
        let built = registry.create(&serde_json::json!({ "type": "tag" })).unwrap();
        assert_eq!(built.type_name(), "tag");
        assert!(registry.create(&serde_json::json!({ "type": "nope" })).is_err());
        assert!(registry.create(&serde_json::json!({})).is_err());
    }
}
