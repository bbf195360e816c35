use {
    anyhow::Result,
    kestrel_asset::{AssetProviders, DataSource, UriMonitor},
    kestrel_core::Uri,
    kestrel_gfx::{FrameInput, GuiRenderer, Renderer, RendererConfig, RenderList, Window, WindowInput},
    kestrel_scene::SceneManager,
    kestrel_vk::{DeviceConfig, Gpu},
    std::{sync::Arc, time::Instant},
};

/// Explicit per-frame context handed to application layers in place of any
/// global service lookup.
pub struct EngineContext<'a> {
    pub providers: &'a mut AssetProviders,
    pub scenes: &'a mut SceneManager,
    pub monitor: &'a UriMonitor,
    pub window_input: &'a WindowInput,
    pub dt: f32,
}

/// Front-end owning the device, renderer, asset providers and scene
/// manager; the host drives it with one [frame] call per window frame.
pub struct Engine {
    gpu: Arc<Gpu>,
    renderer: Renderer,
    providers: AssetProviders,
    scenes: SceneManager,
    monitor: Arc<UriMonitor>,
    list: RenderList,
    last_frame: Instant,
    dt: f32,
}

impl Engine {
    pub fn new(
        window: &impl Window,
        source: Arc<dyn DataSource>,
        config: DeviceConfig,
    ) -> Result<Self> {
        let (gpu, surface) = Gpu::new(window, &config)?;
        let gpu = Arc::new(gpu);
        let renderer = Renderer::new(
            Arc::clone(&gpu),
            surface,
            config,
            window.framebuffer_extent(),
        )?;
        let monitor = Arc::new(UriMonitor::default());
        let providers =
            AssetProviders::new(Arc::clone(&gpu), Arc::clone(&source), Arc::clone(&monitor))?;
        let scenes = SceneManager::new(source);

        Ok(Self {
            gpu,
            renderer,
            providers,
            scenes,
            monitor,
            list: RenderList::default(),
            last_frame: Instant::now(),
            dt: 0.0,
        })
    }

    pub fn scenes(&self) -> &SceneManager { &self.scenes }

    pub fn scenes_mut(&mut self) -> &mut SceneManager { &mut self.scenes }

    pub fn providers_mut(&mut self) -> &mut AssetProviders { &mut self.providers }

    pub fn monitor(&self) -> &Arc<UriMonitor> { &self.monitor }

    pub fn renderer_config_mut(&mut self) -> &mut RendererConfig { &mut self.renderer.config }

    pub fn queue_scene(&mut self, uri: Uri) { self.scenes.queue_load(uri); }

    pub fn with_context(&mut self, input: &WindowInput, f: impl FnOnce(&mut EngineContext)) {
        let mut ctx = EngineContext {
            providers: &mut self.providers,
            scenes: &mut self.scenes,
            monitor: &self.monitor,
            window_input: input,
            dt: self.dt,
        };
        f(&mut ctx);
    }

    /// One frame: apply queued scene switches, reload out-of-date assets,
    /// tick the scene, collect draws, and render the three-pass graph.
    pub fn frame<'a>(
        &'a mut self,
        window: &impl Window,
        gui: Option<&'a mut dyn GuiRenderer>,
    ) -> Result<()> {
        let now = Instant::now();
        self.dt = now.duration_since(self.last_frame).as_secs_f32().min(0.1);
        self.last_frame = now;

        self.scenes.update();
        let reloaded = self.providers.reload_out_of_date();
        if reloaded > 0 {
            log::debug!("Reloaded {reloaded} out-of-date asset(s)");
        }

        let extent = window.framebuffer_extent();
        if extent.width == 0 || extent.height == 0 {
            return Ok(());
        }

        let scene = self.scenes.active_mut();
        scene.tick(&mut self.providers, window.input(), extent, self.dt);

        self.list.clear();
        scene.render(&mut self.providers, &mut self.list);

        self.renderer.render(
            &mut self.providers,
            FrameInput {
                list: &mut self.list,
                camera: &scene.camera,
                lights: &scene.lights,
                extent,
                gui,
            },
        )
    }

    /// Ordered teardown: renderer first (waits for idle), then the asset
    /// caches whose GPU objects drain through the deletion queue, then the
    /// device itself.
    pub fn shutdown(self) {
        let Engine {
            gpu,
            mut renderer,
            providers,
            scenes,
            list,
            ..
        } = self;
        drop(scenes);
        drop(list);
        renderer.destroy();
        drop(providers);
        drop(renderer);
        match Arc::try_unwrap(gpu) {
            Ok(mut gpu) => gpu.destroy(),
            Err(_) => log::error!("GPU still referenced at shutdown; leaking device objects"),
        }
    }
}
