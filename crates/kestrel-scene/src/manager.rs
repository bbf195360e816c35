use {
    crate::{components::builtin_registry, entity::ComponentRegistry, scene::Scene},
    anyhow::{anyhow, Result},
    kestrel_asset::{json::SceneDoc, source::DataSource},
    kestrel_core::{Error, Uri},
    std::sync::Arc,
};

/// Owns the active scene and swaps in queued scene loads at frame
/// boundaries, so entities never observe a half-built world mid-frame.
pub struct SceneManager {
    source: Arc<dyn DataSource>,
    registry: ComponentRegistry,
    active: Scene,
    pending: Option<Uri>,
}

impl SceneManager {
    pub fn new(source: Arc<dyn DataSource>) -> Self {
        Self {
            source,
            registry: builtin_registry(),
            active: Scene::default(),
            pending: None,
        }
    }

    pub fn active(&self) -> &Scene { &self.active }

    pub fn active_mut(&mut self) -> &mut Scene { &mut self.active }

    pub fn set_active(&mut self, scene: Scene) { self.active = scene; }

    pub fn registry_mut(&mut self) -> &mut ComponentRegistry { &mut self.registry }

    /// Requests a scene switch; applied by the next [update].
    pub fn queue_load(&mut self, uri: Uri) { self.pending = Some(uri); }

    pub fn load(&self, uri: &Uri) -> Result<Scene> {
        let doc: SceneDoc = serde_json::from_slice(&self.source.read(uri)?)
            .map_err(|e| anyhow!(Error::CorruptAsset(format!("{uri}: {e}"))))?;
        let mut scene = Scene::from_doc(doc, &self.registry)?;
        if scene.name.is_empty() {
            scene.name = uri.file_stem().to_string();
        }
        Ok(scene)
    }

    /// Applies a queued scene switch. Call at the start of a frame, before
    /// ticking. Returns true when the active scene changed; a failed load
    /// keeps the current scene and logs.
    pub fn update(&mut self) -> bool {
        let Some(uri) = self.pending.take() else {
            return false;
        };
        match self.load(&uri) {
            Ok(scene) => {
                log::info!("Scene switched: {} ({uri})", scene.name);
                self.active = scene;
                true
            }
            Err(e) => {
                log::error!("Failed to load scene {uri}: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use {super::*, kestrel_asset::FsDataSource};

    #[test]
    fn queued_scene_applies_on_update() {
        let dir = tempfile::tempdir().unwrap();
        let mut scene = Scene::default();
        scene.name = "level-1".into();
        scene.spawn("root", None);
        std::fs::write(
            dir.path().join("level.json"),
            serde_json::to_vec(&scene.to_doc()).unwrap(),
        )
        .unwrap();

        let source: Arc<dyn DataSource> = Arc::new(FsDataSource::new(dir.path()));
        let mut manager = SceneManager::new(source);
        assert!(!manager.update(), "nothing queued");

        manager.queue_load(Uri::from("level.json"));
        assert!(manager.update());
        assert_eq!(manager.active().name, "level-1");
        assert_eq!(manager.active().nodes.len(), 1);
        assert!(!manager.update(), "queue drained");
    }

    #[test]
    fn failed_loads_keep_the_active_scene() {
        let dir = tempfile::tempdir().unwrap();
        let source: Arc<dyn DataSource> = Arc::new(FsDataSource::new(dir.path()));
        let mut manager = SceneManager::new(source);
        manager.active_mut().name = "current".into();
        manager.queue_load(Uri::from("missing.json"));
        assert!(!manager.update());
        assert_eq!(manager.active().name, "current");
    }
}
