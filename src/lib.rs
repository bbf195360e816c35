pub mod engine;
pub mod prelude;

pub use {
    engine::{Engine, EngineContext},
    kestrel_asset as asset, kestrel_gfx as gfx, kestrel_scene as scene, kestrel_vk as vk,
};

pub use kestrel_core::{Error, Id, Result, Transform, Uri};
