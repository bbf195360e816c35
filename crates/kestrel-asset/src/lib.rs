pub mod animation;
pub mod codec;
pub mod geometry;
pub mod import;
pub mod json;
pub mod material;
pub mod mesh;
pub mod monitor;
pub mod provider;
pub mod providers;
pub mod shader;
pub mod skeleton;
pub mod source;
pub mod texture;

pub use {
    animation::{AnimationSampler, Interpolation, Interpolator, Keyframe, SkeletalAnimation},
    codec::{BinGeometry, BinSkeletalAnimation},
    geometry::{Geometry, MeshJoints},
    import::{GltfImporter, GltfList, ImportLogger},
    material::{AlphaMode, LitMaterial, Material, MaterialKind, MaterialProvider, PolygonMode, RenderMode},
    mesh::{
        GpuGeometry, MeshPrimitive, SkinnedMesh, SkinnedMeshProvider, StaticMesh,
        StaticMeshProvider, Topology,
    },
    monitor::{Signal, UriMonitor},
    provider::{AssetLoader, Payload, Provider},
    providers::AssetProviders,
    shader::{ShaderProvider, SpirvShader},
    skeleton::{Joint, Skeleton, SkeletonProvider},
    source::{DataSource, FsDataSource},
    texture::TextureProvider,
};
