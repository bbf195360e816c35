use {
    anyhow::Result,
    glam::{Mat4, Vec2, Vec3},
    kestrel_asset::{AssetProviders, Geometry, GpuGeometry, Topology},
    kestrel_core::Uri,
    kestrel_gfx::{DrawItem, WindowInput},
    kestrel_vk::{vk, Gpu},
    std::sync::Arc,
};

/// One element of the UI tree: ticked with input, rendered into the UI draw
/// list (drawn in the swapchain pass with an orthographic camera).
pub trait UiView {
    fn tick(&mut self, _input: &WindowInput, _extent: vk::Extent2D) {}

    fn render(&mut self, _providers: &mut AssetProviders, _list: &mut Vec<DrawItem>) {}
}

/// Root of the UI tree, owned by the scene.
#[derive(Default)]
pub struct UiRoot {
    views: Vec<Box<dyn UiView>>,
}

impl UiRoot {
    pub fn push(&mut self, view: Box<dyn UiView>) { self.views.push(view); }

    pub fn clear(&mut self) { self.views.clear(); }

    pub fn tick(&mut self, input: &WindowInput, extent: vk::Extent2D) {
        for view in &mut self.views {
            view.tick(input, extent);
        }
    }

    pub fn render(&mut self, providers: &mut AssetProviders, list: &mut Vec<DrawItem>) {
        for view in &mut self.views {
            view.render(providers, list);
        }
    }
}

/// Textured quad in framebuffer pixels, centered on `position`.
pub struct UiQuad {
    geometry: Arc<GpuGeometry>,
    pub position: Vec2,
    pub size: Vec2,
    pub material: Uri,
}

impl UiQuad {
    pub fn new(gpu: &Gpu, material: Uri) -> Result<Self> {
        let geometry = GpuGeometry::upload(gpu, &Geometry::quad(), None, "ui_quad")?;
        Ok(Self {
            geometry: Arc::new(geometry),
            position: Vec2::ZERO,
            size: Vec2::splat(100.0),
            material,
        })
    }
}

impl UiView for UiQuad {
    fn render(&mut self, _providers: &mut AssetProviders, list: &mut Vec<DrawItem>) {
        let matrix = Mat4::from_translation(self.position.extend(0.0))
            * Mat4::from_scale(Vec3::new(self.size.x, self.size.y, 1.0));
        list.push(DrawItem {
            geometry: Arc::clone(&self.geometry),
            topology: Topology::Triangles,
            material: self.material.clone(),
            matrix,
            instances: Vec::new(),
            joints: None,
        });
    }
}
