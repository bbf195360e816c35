pub use {
    crate::engine::{Engine, EngineContext},
    kestrel_asset::{
        AssetProviders, DataSource, FsDataSource, Material, RenderMode, UriMonitor,
    },
    kestrel_core::{logging, Error, HdrRgba, Id, Result, Rgba, Task, Transform, Uri},
    kestrel_gfx::{
        Camera, DirLight, DrawItem, GuiRenderer, Lights, NoGui, Projection, RenderList,
        RendererConfig, ViewPlane, Window, WindowInput,
    },
    kestrel_scene::{
        Component, ComponentCtx, Entity, NodeInfo, NodeTree, Scene, SceneManager,
        SkeletonController, SkinnedMeshRenderer, StaticMeshRenderer,
    },
    kestrel_vk::{DeviceConfig, Gpu, Vsync},
};
