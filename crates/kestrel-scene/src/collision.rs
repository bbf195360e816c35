use {
    crate::entity::{Component, ComponentCtx, Entity, RenderCtx},
    glam::{Mat4, Vec3},
    kestrel_asset::{Geometry, GpuGeometry, Topology},
    kestrel_core::{Id, Uri},
    kestrel_gfx::{DrawItem, RenderList},
    std::{any::Any, sync::Arc},
};

pub const COLLIDER_AABB: &str = "collider_aabb";

/// Axis-aligned box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub center: Vec3,
    pub half_extent: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self {
            center: Vec3::ZERO,
            half_extent: Vec3::splat(0.5),
        }
    }
}

impl Aabb {
    pub fn new(center: Vec3, half_extent: Vec3) -> Self {
        Self {
            center,
            half_extent,
        }
    }

    pub fn min(&self) -> Vec3 { self.center - self.half_extent }

    pub fn max(&self) -> Vec3 { self.center + self.half_extent }

    pub fn intersects(&self, other: &Aabb) -> bool {
        let a_min = self.min();
        let a_max = self.max();
        let b_min = other.min();
        let b_max = other.max();
        a_min.x <= b_max.x
            && a_max.x >= b_min.x
            && a_min.y <= b_max.y
            && a_max.y >= b_min.y
            && a_min.z <= b_max.z
            && a_max.z >= b_min.z
    }

    /// Translated into world space by a node transform (rotation and scale
    /// are ignored; colliders stay axis aligned).
    pub fn at(&self, world: Mat4) -> Aabb {
        Aabb {
            center: self.center + world.w_axis.truncate(),
            half_extent: self.half_extent,
        }
    }
}

/// Collision hook: entities carrying one are tested pairwise each frame;
/// overlaps are recorded on both sides for game code to poll.
pub struct ColliderAabb {
    pub aabb: Aabb,
    /// Entities overlapping this collider as of the last collision pass.
    pub touching: Vec<Id<Entity>>,
    /// Draw the collider into the overlay bucket.
    pub debug_draw: bool,
    debug_geometry: Option<Arc<GpuGeometry>>,
}

impl ColliderAabb {
    pub fn new(aabb: Aabb) -> Self {
        Self {
            aabb,
            touching: Vec::new(),
            debug_draw: false,
            debug_geometry: None,
        }
    }

    pub fn is_touching(&self) -> bool { !self.touching.is_empty() }
}

impl Component for ColliderAabb {
    fn type_name(&self) -> &'static str { COLLIDER_AABB }

    fn setup(&mut self, ctx: &mut ComponentCtx) {
        if !self.debug_draw || self.debug_geometry.is_some() {
            return;
        }
        match GpuGeometry::upload(ctx.providers.gpu(), &Geometry::cube(), None, "collider_debug") {
            Ok(geometry) => self.debug_geometry = Some(Arc::new(geometry)),
            Err(e) => log::warn!("Collider debug geometry unavailable: {e}"),
        }
    }

    fn render(&mut self, ctx: &mut RenderCtx, list: &mut RenderList) {
        if !self.debug_draw {
            return;
        }
        let Some(world) = ctx.nodes.global_transform_of(ctx.node) else {
            return;
        };
        let Some(geometry) = &self.debug_geometry else {
            return;
        };
        let world_box = self.aabb.at(world);
        list.overlay.push(DrawItem {
            geometry: Arc::clone(geometry),
            topology: Topology::Triangles,
            material: Uri::from(WIREFRAME_MATERIAL),
            matrix: Mat4::from_translation(world_box.center)
                * Mat4::from_scale(world_box.half_extent * 2.0),
            instances: Vec::new(),
            joints: None,
        });
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "type": COLLIDER_AABB,
            "center": self.aabb.center.to_array(),
            "half_extent": self.aabb.half_extent.to_array(),
            "debug_draw": self.debug_draw,
        })
    }

    fn as_any(&self) -> &dyn Any { self }

    fn as_any_mut(&mut self) -> &mut dyn Any { self }
}

pub use kestrel_asset::providers::WIREFRAME_MATERIAL;

pub(crate) fn collider_from_json(value: &serde_json::Value) -> anyhow::Result<Box<dyn Component>> {
    let vec3 = |key: &str, fallback: Vec3| {
        value
            .get(key)
            .and_then(serde_json::Value::as_array)
            .and_then(|array| {
                let floats: Vec<f32> = array
                    .iter()
                    .filter_map(|value| value.as_f64().map(|value| value as f32))
                    .collect();
                (floats.len() == 3).then(|| Vec3::new(floats[0], floats[1], floats[2]))
            })
            .unwrap_or(fallback)
    };
    let mut collider = ColliderAabb::new(Aabb::new(
        vec3("center", Vec3::ZERO),
        vec3("half_extent", Vec3::splat(0.5)),
    ));
    collider.debug_draw = value
        .get("debug_draw")
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(false);
    Ok(Box::new(collider))
}

/// Pairwise AABB pass over active entities; run by [crate::Scene::tick]
/// after component ticks. O(n^2) over colliders, which is fine at the entity
/// counts this engine targets.
pub(crate) fn collision_pass(
    entities: &mut crate::entity::EntityStore,
    nodes: &crate::node::NodeTree,
) {
    let ids = entities.active_ids();
    let mut boxes: Vec<(Id<Entity>, Aabb)> = Vec::new();
    for id in &ids {
        let Some(entity) = entities.get(*id) else {
            continue;
        };
        let Some(collider) = entity.component::<ColliderAabb>() else {
            continue;
        };
        let Some(world) = nodes.global_transform_of(entity.node()) else {
            continue;
        };
        boxes.push((*id, collider.aabb.at(world)));
    }

    let mut touching: Vec<(Id<Entity>, Vec<Id<Entity>>)> =
        boxes.iter().map(|(id, _)| (*id, Vec::new())).collect();
    for a in 0..boxes.len() {
        for b in a + 1..boxes.len() {
            if boxes[a].1.intersects(&boxes[b].1) {
                touching[a].1.push(boxes[b].0);
                touching[b].1.push(boxes[a].0);
            }
        }
    }

    for (id, contacts) in touching {
        if let Some(collider) = entities
            .get_mut(id)
            .and_then(|entity| entity.component_mut::<ColliderAabb>())
        {
            collider.touching = contacts;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersection_is_symmetric_and_touch_inclusive() {
        let a = Aabb::new(Vec3::ZERO, Vec3::splat(1.0));
        let b = Aabb::new(Vec3::new(1.5, 0.0, 0.0), Vec3::splat(1.0));
        let c = Aabb::new(Vec3::new(4.0, 0.0, 0.0), Vec3::splat(1.0));
        assert!(a.intersects(&b));
        assert!(b.intersects(&a));
        assert!(!a.intersects(&c));
        // Exactly touching faces count as contact.
        let d = Aabb::new(Vec3::new(2.0, 0.0, 0.0), Vec3::splat(1.0));
        assert!(a.intersects(&d));
    }

    #[test]
    fn world_translation_moves_the_box() {
        let local = Aabb::new(Vec3::ZERO, Vec3::splat(0.5));
        let world = local.at(Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0)));
        assert_eq!(world.center, Vec3::new(10.0, 0.0, 0.0));
        assert_eq!(world.half_extent, Vec3::splat(0.5));
    }

    #[test]
    fn collision_pass_records_contacts_on_both_sides() {
        let mut scene = crate::Scene::default();
        let (_, a) = scene.spawn("a", None);
        let (node_b, b) = scene.spawn("b", None);
        let (_, far) = scene.spawn("far", None);

        scene.entities.get_mut(a).unwrap().attach(Box::new(ColliderAabb::new(Aabb::default())));
        scene.entities.get_mut(b).unwrap().attach(Box::new(ColliderAabb::new(Aabb::default())));
        scene.entities.get_mut(far).unwrap().attach(Box::new(ColliderAabb::new(Aabb::default())));
        scene
            .nodes
            .get_mut(node_b)
            .unwrap()
            .transform
            .set_position(Vec3::new(0.5, 0.0, 0.0));
        scene
            .nodes
            .get_mut(scene.entities.get(far).unwrap().node())
            .unwrap()
            .transform
            .set_position(Vec3::new(100.0, 0.0, 0.0));

        collision_pass(&mut scene.entities, &scene.nodes);

        let touching = |id| {
            scene
                .entities
                .get(id)
                .unwrap()
                .component::<ColliderAabb>()
                .unwrap()
                .touching
                .clone()
        };
        assert_eq!(touching(a), vec![b]);
        assert_eq!(touching(b), vec![a]);
        assert!(touching(far).is_empty());
    }
}
