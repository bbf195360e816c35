use {
    crate::{
        entity::{Component, ComponentCtx, ComponentRegistry, RenderCtx},
        skeleton,
    },
    anyhow::Result,
    glam::Mat4,
    kestrel_asset::{AlphaMode, AssetProviders, MeshPrimitive},
    kestrel_core::{Transform, Uri},
    kestrel_gfx::{DrawItem, RenderList},
    serde_json::json,
    std::{any::Any, sync::Arc},
};

pub const STATIC_MESH_RENDERER: &str = "static_mesh_renderer";
pub const SKINNED_MESH_RENDERER: &str = "skinned_mesh_renderer";
pub const SKELETON_CONTROLLER: &str = "skeleton_controller";

/// Registry with the built-in component set.
pub fn builtin_registry() -> ComponentRegistry {
    let mut registry = ComponentRegistry::default();
    registry.register(STATIC_MESH_RENDERER, |value| {
        Ok(Box::new(StaticMeshRenderer {
            mesh: mesh_uri(value)?,
            instances: Vec::new(),
        }))
    });
    registry.register(SKINNED_MESH_RENDERER, |value| {
        Ok(Box::new(SkinnedMeshRenderer {
            mesh: mesh_uri(value)?,
        }))
    });
    registry.register(crate::collision::COLLIDER_AABB, crate::collision::collider_from_json);
    registry.register(crate::particles::PARTICLE_SYSTEM, |value| {
        let seed = value.get("seed").and_then(serde_json::Value::as_u64).unwrap_or(0);
        Ok(Box::new(crate::particles::ParticleSystem::new(vec![
            crate::particles::ParticleEmitter::new(Default::default(), seed),
        ])))
    });
    registry.register(SKELETON_CONTROLLER, |value| {
        Ok(Box::new(SkeletonController {
            enabled: value
                .get("enabled")
                .and_then(serde_json::Value::as_u64)
                .map(|v| v as usize)
                .or(Some(0)),
            elapsed: 0.0,
            time_scale: value
                .get("time_scale")
                .and_then(serde_json::Value::as_f64)
                .map_or(1.0, |v| v as f32),
        }))
    });
    registry
}

fn mesh_uri(value: &serde_json::Value) -> Result<Uri> {
    Ok(value
        .get("mesh")
        .and_then(serde_json::Value::as_str)
        .map(Uri::from)
        .unwrap_or_default())
}

fn alpha_mode(providers: &mut AssetProviders, material: Option<&Uri>) -> AlphaMode {
    material
        .and_then(|uri| providers.materials.load(uri))
        .map(|material| material.alpha_mode())
        .unwrap_or_default()
}

fn primitive_draw(primitive: &MeshPrimitive, matrix: Mat4, instances: Vec<Mat4>) -> DrawItem {
    DrawItem {
        geometry: Arc::clone(&primitive.geometry),
        topology: primitive.topology,
        material: primitive.material.clone().unwrap_or_default(),
        matrix,
        instances,
        joints: None,
    }
}

/// Draws a static mesh, optionally instanced.
pub struct StaticMeshRenderer {
    pub mesh: Uri,
    /// Local offsets; empty renders a single instance at the node transform.
    pub instances: Vec<Transform>,
}

impl StaticMeshRenderer {
    pub fn new(mesh: Uri) -> Self {
        Self {
            mesh,
            instances: Vec::new(),
        }
    }
}

impl Component for StaticMeshRenderer {
    fn type_name(&self) -> &'static str { STATIC_MESH_RENDERER }

    fn render(&mut self, ctx: &mut RenderCtx, list: &mut RenderList) {
        let Some(world) = ctx.nodes.global_transform_of(ctx.node) else {
            return;
        };
        if ctx.providers.static_meshes.load(&self.mesh).is_none() {
            return;
        }
        let instance_matrices: Vec<Mat4> = self
            .instances
            .iter()
            .map(|offset| world * offset.matrix())
            .collect();

        let primitives: Vec<MeshPrimitive> = ctx
            .providers
            .static_meshes
            .find(&self.mesh)
            .map(|mesh| mesh.primitives.clone())
            .unwrap_or_default();
        for primitive in &primitives {
            let mode = alpha_mode(ctx.providers, primitive.material.as_ref());
            list.push(primitive_draw(primitive, world, instance_matrices.clone()), mode);
        }
    }

    fn to_json(&self) -> serde_json::Value {
        json!({ "type": STATIC_MESH_RENDERER, "mesh": self.mesh })
    }

    fn as_any(&self) -> &dyn Any { self }

    fn as_any_mut(&mut self) -> &mut dyn Any { self }
}

/// Draws a skinned mesh; instantiates its skeleton onto the node tree on
/// first tick and uploads joint matrices each frame. The skeleton instance
/// itself lives in the scene's instance map, where the controller finds it.
pub struct SkinnedMeshRenderer {
    pub mesh: Uri,
}

impl SkinnedMeshRenderer {
    pub fn new(mesh: Uri) -> Self { Self { mesh } }
}

impl Component for SkinnedMeshRenderer {
    fn type_name(&self) -> &'static str { SKINNED_MESH_RENDERER }

    fn tick(&mut self, ctx: &mut ComponentCtx) {
        if ctx.skeletons.contains_key(&ctx.entity) {
            return;
        }
        let Some(skeleton_uri) = ctx
            .providers
            .skinned_meshes
            .load(&self.mesh)
            .map(|mesh| mesh.skeleton.clone())
        else {
            return;
        };
        let Some(skeleton) = ctx.providers.skeletons.load(&skeleton_uri) else {
            return;
        };
        let instance =
            skeleton::instantiate(ctx.nodes, skeleton, skeleton_uri.clone(), ctx.node);
        log::debug!(
            "Instantiated skeleton {skeleton_uri} ({} joints) for entity {}",
            instance.joints.len(),
            ctx.entity,
        );
        ctx.skeletons.insert(ctx.entity, instance);
    }

    fn render(&mut self, ctx: &mut RenderCtx, list: &mut RenderList) {
        let Some(world) = ctx.nodes.global_transform_of(ctx.node) else {
            return;
        };
        if ctx.providers.skinned_meshes.load(&self.mesh).is_none() {
            return;
        }
        let Some(instance) = ctx.skeletons.get(&ctx.entity) else {
            return;
        };

        let Some((primitives, inverse_bind_matrices)) = ctx
            .providers
            .skinned_meshes
            .find(&self.mesh)
            .map(|mesh| (mesh.primitives.clone(), mesh.inverse_bind_matrices.clone()))
        else {
            return;
        };
        let joints: Arc<Vec<Mat4>> = Arc::new(
            instance
                .joints
                .iter()
                .enumerate()
                .map(|(index, node)| {
                    let world = ctx.nodes.global_transform_of(*node).unwrap_or(Mat4::IDENTITY);
                    let inverse_bind = inverse_bind_matrices
                        .get(index)
                        .copied()
                        .unwrap_or(Mat4::IDENTITY);
                    world * inverse_bind
                })
                .collect(),
        );

        for primitive in &primitives {
            let mode = alpha_mode(ctx.providers, primitive.material.as_ref());
            let mut item = primitive_draw(primitive, world, Vec::new());
            item.joints = Some(Arc::clone(&joints));
            list.push(item, mode);
        }
    }

    fn to_json(&self) -> serde_json::Value {
        json!({ "type": SKINNED_MESH_RENDERER, "mesh": self.mesh })
    }

    fn as_any(&self) -> &dyn Any { self }

    fn as_any_mut(&mut self) -> &mut dyn Any { self }
}

/// Plays one of the skeleton's animations, looping over its duration.
pub struct SkeletonController {
    /// Index into the skeleton instance's animation list; `None` pauses.
    pub enabled: Option<usize>,
    pub elapsed: f32,
    pub time_scale: f32,
}

impl Default for SkeletonController {
    fn default() -> Self {
        Self {
            enabled: Some(0),
            elapsed: 0.0,
            time_scale: 1.0,
        }
    }
}

impl Component for SkeletonController {
    fn type_name(&self) -> &'static str { SKELETON_CONTROLLER }

    fn tick(&mut self, ctx: &mut ComponentCtx) {
        let Some(enabled) = self.enabled else {
            return;
        };
        let Some(instance) = ctx.skeletons.get(&ctx.entity) else {
            return;
        };
        let Some(instance_animation) = instance.animations.get(enabled) else {
            return;
        };
        let Some(skeleton) = ctx.providers.skeletons.find(&instance.source) else {
            return;
        };
        let Some(animation) = skeleton.animations.get(instance_animation.source_index) else {
            return;
        };

        self.elapsed += ctx.dt * self.time_scale;
        let duration = animation.duration();
        if duration > 0.0 {
            self.elapsed %= duration;
        }

        for (sampler, node) in animation.samplers.iter().zip(&instance_animation.target_nodes) {
            let Some(node) = ctx.nodes.get_mut(*node) else {
                continue;
            };
            match sampler {
                kestrel_asset::AnimationSampler::Translate(interpolator) => {
                    node.transform.set_position(interpolator.sample(self.elapsed));
                }
                kestrel_asset::AnimationSampler::Rotate(interpolator) => {
                    node.transform.set_orientation(interpolator.sample(self.elapsed));
                }
                kestrel_asset::AnimationSampler::Scale(interpolator) => {
                    node.transform.set_scale(interpolator.sample(self.elapsed));
                }
            }
        }
    }

    fn to_json(&self) -> serde_json::Value {
        json!({
            "type": SKELETON_CONTROLLER,
            "enabled": self.enabled,
            "time_scale": self.time_scale,
        })
    }

    fn as_any(&self) -> &dyn Any { self }

    fn as_any_mut(&mut self) -> &mut dyn Any { self }
}
