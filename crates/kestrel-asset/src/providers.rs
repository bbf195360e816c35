use {
    crate::{
        material::{Material, MaterialLoader, MaterialProvider},
        mesh::{SkinnedMeshLoader, SkinnedMeshProvider, StaticMeshLoader, StaticMeshProvider},
        monitor::UriMonitor,
        provider::Provider,
        shader::{ShaderLoader, ShaderProvider},
        skeleton::{SkeletonLoader, SkeletonProvider},
        source::DataSource,
        texture::{TextureLoader, TextureProvider, FALLBACK_TEXTURE, WHITE_TEXTURE},
    },
    anyhow::Result,
    kestrel_core::Uri,
    kestrel_vk::Gpu,
    std::sync::Arc,
};

/// Uri of the material used when a draw's material cannot be loaded.
pub const DEFAULT_MATERIAL: &str = "materials/__default";

/// Built-in unlit material for UI surfaces.
pub const UI_MATERIAL: &str = "materials/__ui";

/// Built-in line-mode material for debug overlay shapes.
pub const WIREFRAME_MATERIAL: &str = "materials/__wireframe";

/// Every asset cache, bundled for context passing.
pub struct AssetProviders {
    gpu: Arc<Gpu>,
    pub shaders: ShaderProvider,
    pub textures: TextureProvider,
    pub materials: MaterialProvider,
    pub static_meshes: StaticMeshProvider,
    pub skinned_meshes: SkinnedMeshProvider,
    pub skeletons: SkeletonProvider,
}

impl AssetProviders {
    pub fn new(
        gpu: Arc<Gpu>,
        source: Arc<dyn DataSource>,
        monitor: Arc<UriMonitor>,
    ) -> Result<Self> {
        let mut textures = Provider::new(
            TextureLoader::new(Arc::clone(&gpu), Arc::clone(&source)),
            Arc::clone(&monitor),
        );
        textures.add(Uri::from(FALLBACK_TEXTURE), TextureLoader::magenta(&gpu)?);
        textures.add(Uri::from(WHITE_TEXTURE), TextureLoader::white(&gpu)?);

        let mut materials = Provider::new(
            MaterialLoader::new(Arc::clone(&source)),
            Arc::clone(&monitor),
        );
        materials.add(Uri::from(DEFAULT_MATERIAL), Material::default());
        materials.add(
            Uri::from(UI_MATERIAL),
            Material::unlit(Default::default(), None),
        );
        let mut wireframe = Material::unlit(Default::default(), None);
        wireframe.name = "wireframe".into();
        wireframe.render_mode = crate::material::RenderMode {
            polygon: crate::material::PolygonMode::Line,
            line_width: 1.0,
            depth_test: false,
        };
        materials.add(Uri::from(WIREFRAME_MATERIAL), wireframe);

        Ok(Self {
            shaders: Provider::new(ShaderLoader::new(Arc::clone(&source)), Arc::clone(&monitor)),
            textures,
            materials,
            static_meshes: Provider::new(
                StaticMeshLoader::new(Arc::clone(&gpu), Arc::clone(&source)),
                Arc::clone(&monitor),
            ),
            skinned_meshes: Provider::new(
                SkinnedMeshLoader::new(Arc::clone(&gpu), Arc::clone(&source)),
                Arc::clone(&monitor),
            ),
            skeletons: Provider::new(SkeletonLoader::new(source), monitor),
            gpu,
        })
    }

    pub fn gpu(&self) -> &Arc<Gpu> { &self.gpu }

    /// Reloads everything flagged by the uri monitor since the last frame.
    pub fn reload_out_of_date(&mut self) -> usize {
        self.shaders.reload_out_of_date()
            + self.textures.reload_out_of_date()
            + self.materials.reload_out_of_date()
            + self.static_meshes.reload_out_of_date()
            + self.skinned_meshes.reload_out_of_date()
            + self.skeletons.reload_out_of_date()
    }
}
