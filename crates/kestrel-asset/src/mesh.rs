use {
    crate::{
        codec::BinGeometry,
        geometry::{Geometry, MeshJoints},
        json::{mat4_from_floats, MeshDoc},
        provider::{AssetLoader, Payload, Provider},
        source::DataSource,
    },
    anyhow::{anyhow, Result},
    glam::Mat4,
    kestrel_core::{Error, Uri},
    kestrel_vk::{vk, Buffer, CommandBuffer, Gpu, MemoryLocation},
    std::sync::Arc,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Topology {
    Points,
    Lines,
    LineStrip,
    #[default]
    Triangles,
    TriangleStrip,
    TriangleFan,
}

impl Topology {
    pub fn to_vk(self) -> vk::PrimitiveTopology {
        match self {
            Topology::Points => vk::PrimitiveTopology::POINT_LIST,
            Topology::Lines => vk::PrimitiveTopology::LINE_LIST,
            Topology::LineStrip => vk::PrimitiveTopology::LINE_STRIP,
            Topology::Triangles => vk::PrimitiveTopology::TRIANGLE_LIST,
            Topology::TriangleStrip => vk::PrimitiveTopology::TRIANGLE_STRIP,
            Topology::TriangleFan => vk::PrimitiveTopology::TRIANGLE_FAN,
        }
    }

    pub fn from_str(value: &str) -> Self {
        match value {
            "points" => Topology::Points,
            "lines" => Topology::Lines,
            "line_strip" => Topology::LineStrip,
            "triangle_strip" => Topology::TriangleStrip,
            "triangle_fan" => Topology::TriangleFan,
            _ => Topology::Triangles,
        }
    }
}

/// Vertex streams bound for skinning.
pub struct JointBuffers {
    pub buffer: Buffer,
    pub weights_offset: u64,
}

/// Geometry uploaded to GPU buffers: one vertex buffer holding the four
/// packed streams, an optional index buffer, and optional joint influences.
pub struct GpuGeometry {
    pub vertex_count: u32,
    pub index_count: u32,
    pub vertices: Buffer,
    pub stream_offsets: [u64; 4],
    pub indices: Option<Buffer>,
    pub joints: Option<JointBuffers>,
}

impl GpuGeometry {
    pub fn upload(
        gpu: &Gpu,
        geometry: &Geometry,
        joints: Option<&MeshJoints>,
        name: &str,
    ) -> Result<Self> {
        let count = geometry.vertex_count();
        if geometry.rgbs.len() != count
            || geometry.normals.len() != count
            || geometry.uvs.len() != count
        {
            return Err(anyhow!(Error::CorruptAsset(format!(
                "geometry {name:?} has mismatched vertex streams"
            ))));
        }

        let positions: &[u8] = bytemuck::cast_slice(&geometry.positions);
        let rgbs: &[u8] = bytemuck::cast_slice(&geometry.rgbs);
        let normals: &[u8] = bytemuck::cast_slice(&geometry.normals);
        let uvs: &[u8] = bytemuck::cast_slice(&geometry.uvs);
        let stream_offsets = [
            0,
            positions.len() as u64,
            (positions.len() + rgbs.len()) as u64,
            (positions.len() + rgbs.len() + normals.len()) as u64,
        ];
        let total = (positions.len() + rgbs.len() + normals.len() + uvs.len()) as u64;

        let vertices = Buffer::new(
            gpu.device(),
            gpu.allocator(),
            gpu.deletion(),
            total.max(16),
            vk::BufferUsageFlags::VERTEX_BUFFER,
            MemoryLocation::CpuToGpu,
            name,
        )?;
        vertices.write(stream_offsets[0], positions)?;
        vertices.write(stream_offsets[1], rgbs)?;
        vertices.write(stream_offsets[2], normals)?;
        vertices.write(stream_offsets[3], uvs)?;

        let indices = if geometry.indices.is_empty() {
            None
        } else {
            let buffer = Buffer::new(
                gpu.device(),
                gpu.allocator(),
                gpu.deletion(),
                (geometry.indices.len() * 4) as u64,
                vk::BufferUsageFlags::INDEX_BUFFER,
                MemoryLocation::CpuToGpu,
                name,
            )?;
            buffer.write_all(&geometry.indices)?;
            Some(buffer)
        };

        let joints = match joints {
            Some(mesh_joints) if !mesh_joints.is_empty() => {
                if mesh_joints.joints.len() != count || mesh_joints.weights.len() != count {
                    return Err(anyhow!(Error::CorruptAsset(format!(
                        "geometry {name:?} joint streams do not match vertex count"
                    ))));
                }
                let joint_bytes: &[u8] = bytemuck::cast_slice(&mesh_joints.joints);
                let weight_bytes: &[u8] = bytemuck::cast_slice(&mesh_joints.weights);
                let buffer = Buffer::new(
                    gpu.device(),
                    gpu.allocator(),
                    gpu.deletion(),
                    (joint_bytes.len() + weight_bytes.len()) as u64,
                    vk::BufferUsageFlags::VERTEX_BUFFER,
                    MemoryLocation::CpuToGpu,
                    name,
                )?;
                buffer.write(0, joint_bytes)?;
                buffer.write(joint_bytes.len() as u64, weight_bytes)?;
                Some(JointBuffers {
                    buffer,
                    weights_offset: joint_bytes.len() as u64,
                })
            }
            _ => None,
        };

        Ok(Self {
            vertex_count: count as u32,
            index_count: geometry.indices.len() as u32,
            vertices,
            stream_offsets,
            indices,
            joints,
        })
    }

    /// Binds the packed streams at bindings 0..=3 (and joints + weights at
    /// 4 and 5 when present).
    pub fn bind(&self, cmd: &CommandBuffer) {
        let handle = self.vertices.handle();
        cmd.bind_vertex_buffers(0, &[handle, handle, handle, handle], &self.stream_offsets);
        if let Some(joints) = &self.joints {
            cmd.bind_vertex_buffers(
                4,
                &[joints.buffer.handle(), joints.buffer.handle()],
                &[0, joints.weights_offset],
            );
        }
        if let Some(indices) = &self.indices {
            cmd.bind_index_buffer(indices, 0);
        }
    }

    /// Binds only the position stream (shadow pass).
    pub fn bind_positions(&self, cmd: &CommandBuffer) {
        cmd.bind_vertex_buffers(0, &[self.vertices.handle()], &[0]);
        if let Some(indices) = &self.indices {
            cmd.bind_index_buffer(indices, 0);
        }
    }

    pub fn is_skinned(&self) -> bool { self.joints.is_some() }
}

/// Smallest renderable unit: one geometry + one material + one topology.
#[derive(Clone)]
pub struct MeshPrimitive {
    pub geometry: Arc<GpuGeometry>,
    pub material: Option<Uri>,
    pub topology: Topology,
}

pub struct StaticMesh {
    pub name: String,
    pub primitives: Vec<MeshPrimitive>,
}

pub struct SkinnedMesh {
    pub name: String,
    pub primitives: Vec<MeshPrimitive>,
    pub skeleton: Uri,
    pub inverse_bind_matrices: Vec<Mat4>,
}

pub type StaticMeshProvider = Provider<StaticMeshLoader>;
pub type SkinnedMeshProvider = Provider<SkinnedMeshLoader>;

fn load_mesh_doc(source: &dyn DataSource, uri: &Uri, kind: &str) -> Option<MeshDoc> {
    let doc: MeshDoc = match source
        .read(uri)
        .and_then(|bytes| Ok(serde_json::from_slice(&bytes)?))
    {
        Ok(doc) => doc,
        Err(e) => {
            log::warn!("Failed to load mesh {uri}: {e}");
            return None;
        }
    };
    if doc.asset_type != "mesh" {
        log::warn!("{uri} is not a mesh manifest ({:?})", doc.asset_type);
        return None;
    }
    if doc.kind != kind {
        log::warn!("{uri} is a {:?} mesh, expected {kind:?}", doc.kind);
        return None;
    }
    Some(doc)
}

struct LoadedPrimitives {
    primitives: Vec<MeshPrimitive>,
    joints_present: bool,
    dependencies: Vec<Uri>,
}

fn load_primitives(
    gpu: &Gpu,
    source: &dyn DataSource,
    uri: &Uri,
    doc: &MeshDoc,
    with_joints: bool,
) -> Result<LoadedPrimitives> {
    let base = uri.parent();
    let mut primitives = Vec::with_capacity(doc.primitives.len());
    let mut dependencies = vec![uri.clone()];
    let mut joints_present = true;

    for primitive in &doc.primitives {
        let geometry_uri = base.join(primitive.geometry.as_str());
        let bin = BinGeometry::from_bytes(&source.read(&geometry_uri)?)?;
        let joints = with_joints.then_some(&bin.joints).filter(|joints| !joints.is_empty());
        joints_present &= joints.is_some();
        let geometry = GpuGeometry::upload(gpu, &bin.geometry, joints, geometry_uri.as_str())?;
        primitives.push(MeshPrimitive {
            geometry: Arc::new(geometry),
            material: primitive.material.as_ref().map(|uri| base.join(uri.as_str())),
            topology: primitive
                .topology
                .as_deref()
                .map(Topology::from_str)
                .unwrap_or_default(),
        });
        dependencies.push(geometry_uri);
    }
    Ok(LoadedPrimitives {
        primitives,
        joints_present,
        dependencies,
    })
}

pub struct StaticMeshLoader {
    gpu: Arc<Gpu>,
    source: Arc<dyn DataSource>,
}

impl StaticMeshLoader {
    pub fn new(gpu: Arc<Gpu>, source: Arc<dyn DataSource>) -> Self { Self { gpu, source } }
}

impl AssetLoader for StaticMeshLoader {
    type Asset = StaticMesh;

    fn load_payload(&mut self, uri: &Uri) -> Payload<StaticMesh> {
        let Some(doc) = load_mesh_doc(self.source.as_ref(), uri, "static") else {
            return Payload::missing(uri);
        };
        match load_primitives(&self.gpu, self.source.as_ref(), uri, &doc, false) {
            Ok(loaded) => {
                log::debug!("Loaded static mesh {uri}: {} primitive(s)", loaded.primitives.len());
                Payload {
                    asset: Some(StaticMesh {
                        name: doc.name,
                        primitives: loaded.primitives,
                    }),
                    dependencies: loaded.dependencies,
                }
            }
            Err(e) => {
                log::warn!("Failed to load static mesh {uri}: {e}");
                Payload::missing(uri)
            }
        }
    }
}

pub struct SkinnedMeshLoader {
    gpu: Arc<Gpu>,
    source: Arc<dyn DataSource>,
}

impl SkinnedMeshLoader {
    pub fn new(gpu: Arc<Gpu>, source: Arc<dyn DataSource>) -> Self { Self { gpu, source } }
}

impl AssetLoader for SkinnedMeshLoader {
    type Asset = SkinnedMesh;

    fn load_payload(&mut self, uri: &Uri) -> Payload<SkinnedMesh> {
        let Some(doc) = load_mesh_doc(self.source.as_ref(), uri, "skinned") else {
            return Payload::missing(uri);
        };
        let Some(skeleton) = doc.skeleton.clone() else {
            log::warn!("Skinned mesh {uri} has no skeleton");
            return Payload::missing(uri);
        };
        match load_primitives(&self.gpu, self.source.as_ref(), uri, &doc, true) {
            Ok(loaded) => {
                if !loaded.joints_present {
                    log::warn!("Skinned mesh {uri} has primitives without joint data");
                    return Payload::missing(uri);
                }
                log::debug!(
                    "Loaded skinned mesh {uri}: {} primitive(s), {} joint matrices",
                    loaded.primitives.len(),
                    doc.inverse_bind_matrices.len(),
                );
                Payload {
                    asset: Some(SkinnedMesh {
                        name: doc.name,
                        primitives: loaded.primitives,
                        skeleton: uri.parent().join(skeleton.as_str()),
                        inverse_bind_matrices: doc
                            .inverse_bind_matrices
                            .iter()
                            .map(mat4_from_floats)
                            .collect(),
                    }),
                    dependencies: loaded.dependencies,
                }
            }
            Err(e) => {
                log::warn!("Failed to load skinned mesh {uri}: {e}");
                Payload::missing(uri)
            }
        }
    }
}
