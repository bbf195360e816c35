use {
    glam::{Mat4, Vec3},
    kestrel_asset::{AlphaMode, GpuGeometry, Topology},
    kestrel_core::{util, Uri},
    std::sync::Arc,
};

/// One renderable: a primitive, its material, world transform(s) and
/// optional skinning matrices, produced by scene components each frame.
#[derive(Clone)]
pub struct DrawItem {
    pub geometry: Arc<GpuGeometry>,
    pub topology: Topology,
    pub material: Uri,
    pub matrix: Mat4,
    /// Per-instance model matrices; empty means a single instance at
    /// `matrix`.
    pub instances: Vec<Mat4>,
    /// joint_world * inverse_bind_matrix per joint, for skinned draws.
    pub joints: Option<Arc<Vec<Mat4>>>,
}

impl DrawItem {
    pub fn origin(&self) -> Vec3 { self.matrix.w_axis.truncate() }

    pub fn instance_count(&self) -> u32 { self.instances.len().max(1) as u32 }
}

/// Groups opaque draws by material to minimize rebinds.
pub(crate) fn material_key(material: &Uri) -> u64 {
    util::hash_bytes(material.as_str().as_bytes())
}

pub(crate) fn camera_distance_squared(origin: Vec3, camera_position: Vec3) -> f32 {
    (origin - camera_position).length_squared()
}

/// Per-frame draw buckets consumed by the renderer.
#[derive(Clone, Default)]
pub struct RenderList {
    pub opaque: Vec<DrawItem>,
    pub transparent: Vec<DrawItem>,
    /// Rendered after everything else with depth testing off (debug shapes).
    pub overlay: Vec<DrawItem>,
    pub ui: Vec<DrawItem>,
}

impl RenderList {
    pub fn clear(&mut self) {
        self.opaque.clear();
        self.transparent.clear();
        self.overlay.clear();
        self.ui.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.opaque.is_empty()
            && self.transparent.is_empty()
            && self.overlay.is_empty()
            && self.ui.is_empty()
    }

    /// Routes a scene draw by its material's alpha mode.
    pub fn push(&mut self, item: DrawItem, alpha_mode: AlphaMode) {
        match alpha_mode {
            AlphaMode::Blend => self.transparent.push(item),
            AlphaMode::Opaque | AlphaMode::Mask => self.opaque.push(item),
        }
    }

    /// Establishes draw order: opaque draws grouped by material, transparent
    /// draws back to front from the camera.
    pub fn sort(&mut self, camera_position: Vec3) {
        self.opaque.sort_by_key(|item| material_key(&item.material));
        self.transparent.sort_by(|a, b| {
            camera_distance_squared(b.origin(), camera_position)
                .total_cmp(&camera_distance_squared(a.origin(), camera_position))
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transparent_order_is_back_to_front() {
        let camera = Vec3::new(0.0, 0.0, 5.0);
        let mut origins = vec![
            Vec3::new(0.0, 0.0, 4.0),  // distance 1
            Vec3::new(0.0, 0.0, -4.0), // distance 9
            Vec3::new(3.0, 0.0, 5.0),  // distance 3
        ];
        origins.sort_by(|a, b| {
            camera_distance_squared(*b, camera).total_cmp(&camera_distance_squared(*a, camera))
        });

        // Farther draws come first, and the property holds pairwise.
        for pair in origins.windows(2) {
            assert!(
                camera_distance_squared(pair[0], camera)
                    >= camera_distance_squared(pair[1], camera)
            );
        }
        assert_eq!(origins[0], Vec3::new(0.0, 0.0, -4.0));
        assert_eq!(origins[2], Vec3::new(0.0, 0.0, 4.0));
    }

    #[test]
    fn opaque_key_groups_equal_materials() {
        let a = Uri::from("materials/brick.json");
        let b = Uri::from("materials/brick.json");
        let c = Uri::from("materials/wood.json");
        assert_eq!(material_key(&a), material_key(&b));
        assert_ne!(material_key(&a), material_key(&c));
    }
}
