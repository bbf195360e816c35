use {
    crate::{
        animation::{AnimationSampler, Interpolation, Interpolator, Keyframe, SkeletalAnimation},
        codec::{BinGeometry, BinSkeletalAnimation},
        geometry::{Geometry, MeshJoints},
        json::{
            mat4_to_floats, CameraDoc, ColourSpace, EntityDoc, JointDoc, LightsDoc, MeshDoc,
            MeshPrimitiveDoc, NodeDoc, SceneDoc, SkeletonDoc, TextureDoc, ViewPlaneDoc,
        },
        material::{AlphaMode, LitMaterial, Material, MaterialKind, LIT_FRAG, LIT_VERT, SKINNED_VERT},
        skeleton::Joint,
    },
    anyhow::{anyhow, Result},
    glam::{Mat4, Quat, Vec2, Vec3, Vec4},
    gltf::{mesh::util::ReadIndices, Document},
    kestrel_core::{Error, HdrRgba, LogFilter, Rgba, Transform, Uri},
    std::{
        collections::HashMap,
        path::{Path, PathBuf},
        sync::Arc,
    },
};

/// Import logging with per-level silencing, so the CLI can keep stdout
/// machine readable while listing.
#[derive(Clone, Copy, Default)]
pub struct ImportLogger {
    pub filter: LogFilter,
}

impl ImportLogger {
    pub fn info(&self, message: impl AsRef<str>) {
        self.filter.log(log::Level::Info, "import", format_args!("{}", message.as_ref()));
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        self.filter.log(log::Level::Warn, "import", format_args!("{}", message.as_ref()));
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.filter.log(log::Level::Error, "import", format_args!("{}", message.as_ref()));
    }
}

#[derive(Clone, Debug)]
pub struct GltfMeshEntry {
    pub name: String,
    pub index: usize,
    pub skinned: bool,
}

#[derive(Clone, Debug)]
pub struct GltfSceneEntry {
    pub name: String,
    pub index: usize,
}

/// Importable contents of a glTF file, listed without reading its buffers.
#[derive(Clone, Debug, Default)]
pub struct GltfList {
    pub meshes: Vec<GltfMeshEntry>,
    pub scenes: Vec<GltfSceneEntry>,
}

impl GltfList {
    pub fn peek(path: &Path, logger: &ImportLogger) -> Result<Self> {
        if !path.is_file() {
            logger.error(format!("Invalid glTF file path: {}", path.display()));
            return Err(anyhow!(Error::NotFound(path.display().to_string())));
        }
        let gltf = gltf::Gltf::open(path)
            .map_err(|e| anyhow!(Error::CorruptAsset(format!("{}: {e}", path.display()))))?;
        let document = gltf.document;

        let meshes = document
            .meshes()
            .filter(|mesh| mesh.primitives().len() > 0)
            .map(|mesh| GltfMeshEntry {
                name: mesh.name().unwrap_or_default().to_string(),
                index: mesh.index(),
                skinned: mesh
                    .primitives()
                    .any(|primitive| primitive.get(&gltf::Semantic::Joints(0)).is_some()),
            })
            .collect();
        let scenes = document
            .scenes()
            .map(|scene| GltfSceneEntry {
                name: scene.name().unwrap_or_default().to_string(),
                index: scene.index(),
            })
            .collect();
        Ok(Self { meshes, scenes })
    }
}

fn asset_name(name: &str, kind: &str, index: usize) -> String {
    if name.is_empty() || name == "(Unnamed)" {
        format!("{kind}_{index}")
    } else {
        format!("{name}.{kind}_{index}")
    }
}

fn log_name(name: &str, index: usize) -> String {
    if name.is_empty() {
        format!("{index}")
    } else {
        format!("{index} - {name}")
    }
}

/// Parsed glTF plus its resolved buffers; shared immutably so importer
/// methods can mutate export state while holding document handles.
struct GltfData {
    document: Document,
    buffers: Vec<gltf::buffer::Data>,
}

impl GltfData {
    fn buffer(&self, buffer: gltf::Buffer) -> Option<&[u8]> {
        self.buffers.get(buffer.index()).map(|data| &data.0[..])
    }
}

#[derive(Default)]
struct Exported {
    images: HashMap<usize, Uri>,
    textures: HashMap<usize, Uri>,
    materials: HashMap<usize, Uri>,
    geometries: HashMap<(usize, usize), Uri>,
    meshes: HashMap<usize, Uri>,
    skeletons: HashMap<usize, Uri>,
}

/// Emits canonical asset files (JSON manifests + .bin payloads) from a glTF
/// document into a destination directory.
pub struct GltfImporter {
    data: Arc<GltfData>,
    src_dir: PathBuf,
    dest_dir: PathBuf,
    overwrite: bool,
    logger: ImportLogger,
    exported: Exported,
}

impl GltfImporter {
    pub fn new(
        gltf_path: &Path,
        dest_dir: impl Into<PathBuf>,
        overwrite: bool,
        logger: ImportLogger,
    ) -> Result<Self> {
        let (document, buffers, _images) = gltf::import(gltf_path)
            .map_err(|e| anyhow!(Error::CorruptAsset(format!("{}: {e}", gltf_path.display()))))?;
        let src_dir = gltf_path.parent().unwrap_or(Path::new(".")).to_path_buf();

        Ok(Self {
            data: Arc::new(GltfData { document, buffers }),
            src_dir,
            dest_dir: dest_dir.into(),
            overwrite,
            logger,
            exported: Exported::default(),
        })
    }

    /// Writes `bytes` under `uri`, honoring the overwrite flag. Returns
    /// false when an existing file was reused.
    fn write_file(&self, uri: &Uri, bytes: &[u8]) -> Result<bool> {
        let dst = self.dest_dir.join(uri.as_str());
        if dst.exists() && !self.overwrite {
            self.logger.info(format!("Import target exists, reusing: [{uri}]"));
            return Ok(false);
        }
        if let Some(parent) = dst.parent() {
            std::fs::create_dir_all(parent)?;
        }
        if dst.exists() {
            self.logger.warn(format!("Overwriting existing file: [{uri}]"));
        }
        std::fs::write(&dst, bytes)?;
        Ok(true)
    }

    fn write_json<T: serde::Serialize>(&self, uri: &Uri, value: &T) -> Result<bool> {
        self.write_file(uri, serde_json::to_string_pretty(value)?.as_bytes())
    }

    pub fn import_mesh(&mut self, index: usize) -> Result<Uri> {
        if self.data.document.meshes().nth(index).is_none() {
            return Err(anyhow!(Error::NotFound(format!("glTF mesh {index}"))));
        }
        self.export_mesh(index)
    }

    fn export_mesh(&mut self, index: usize) -> Result<Uri> {
        if let Some(uri) = self.exported.meshes.get(&index) {
            return Ok(uri.clone());
        }
        let data = Arc::clone(&self.data);
        let mesh = data
            .document
            .meshes()
            .nth(index)
            .ok_or_else(|| anyhow!(Error::NotFound(format!("glTF mesh {index}"))))?;
        let name = mesh.name().unwrap_or_default().to_string();
        let out_name = asset_name(&name, "mesh", index);
        let uri = Uri::from(format!("{out_name}.json"));

        let skinned = mesh
            .primitives()
            .any(|primitive| primitive.get(&gltf::Semantic::Joints(0)).is_some());
        let mut doc = MeshDoc {
            asset_type: "mesh".into(),
            kind: if skinned { "skinned" } else { "static" }.into(),
            name: out_name.clone(),
            primitives: Vec::new(),
            skeleton: None,
            inverse_bind_matrices: Vec::new(),
        };

        for primitive in mesh.primitives() {
            let geometry_uri = self.export_geometry(&data, index, primitive.index())?;
            let material = match primitive.material().index() {
                Some(material_index) => Some(self.export_material(material_index, skinned)?),
                None => None,
            };
            doc.primitives.push(MeshPrimitiveDoc {
                geometry: geometry_uri,
                material,
                topology: None,
            });
        }
        if doc.primitives.is_empty() {
            self.logger.warn(format!(
                "Mesh [{}] has no primitives, skipping",
                log_name(&name, index)
            ));
            return Err(anyhow!(Error::CorruptAsset(format!("glTF mesh {index} is empty"))));
        }

        if skinned {
            let skin_index = self.find_skin(&data, index).ok_or_else(|| {
                self.logger.error(format!(
                    "No skin found for skinned mesh [{}]",
                    log_name(&name, index)
                ));
                anyhow!(Error::CorruptAsset(format!("glTF mesh {index} has no skin")))
            })?;
            let skin = data
                .document
                .skins()
                .nth(skin_index)
                .ok_or_else(|| anyhow!(Error::CorruptAsset(format!("invalid skin {skin_index}"))))?;
            let joint_count = skin.joints().count();
            let reader = skin.reader(|buffer| data.buffer(buffer));
            doc.inverse_bind_matrices = match reader.read_inverse_bind_matrices() {
                Some(matrices) => matrices
                    .take(joint_count)
                    .map(|matrix| mat4_to_floats(Mat4::from_cols_array_2d(&matrix)))
                    .collect(),
                None => vec![mat4_to_floats(Mat4::IDENTITY); joint_count],
            };
            doc.skeleton = Some(self.export_skeleton(skin_index)?);
        }

        self.write_json(&uri, &doc)?;
        self.logger.info(format!("Mesh [{uri}] imported"));
        self.exported.meshes.insert(index, uri.clone());
        Ok(uri)
    }

    fn find_skin(&self, data: &GltfData, mesh_index: usize) -> Option<usize> {
        data.document
            .nodes()
            .find(|node| node.mesh().is_some_and(|mesh| mesh.index() == mesh_index))
            .and_then(|node| node.skin())
            .map(|skin| skin.index())
    }

    fn export_geometry(
        &mut self,
        data: &GltfData,
        mesh_index: usize,
        primitive_index: usize,
    ) -> Result<Uri> {
        let key = (mesh_index, primitive_index);
        if let Some(uri) = self.exported.geometries.get(&key) {
            return Ok(uri.clone());
        }
        let uri = Uri::from(format!("mesh_{mesh_index}.geometry_{primitive_index}.bin"));

        let mesh = data
            .document
            .meshes()
            .nth(mesh_index)
            .ok_or_else(|| anyhow!(Error::NotFound(format!("glTF mesh {mesh_index}"))))?;
        let primitive = mesh
            .primitives()
            .nth(primitive_index)
            .ok_or_else(|| anyhow!(Error::NotFound(format!("primitive {primitive_index}"))))?;

        let reader = primitive.reader(|buffer| data.buffer(buffer));
        let positions: Vec<Vec3> = reader
            .read_positions()
            .ok_or_else(|| anyhow!(Error::CorruptAsset("primitive has no positions".into())))?
            .map(Vec3::from_array)
            .collect();
        let geometry = Geometry {
            rgbs: reader
                .read_colors(0)
                .map(|colors| colors.into_rgb_f32().map(Vec3::from_array).collect())
                .unwrap_or_default(),
            normals: reader
                .read_normals()
                .map(|normals| normals.map(Vec3::from_array).collect())
                .unwrap_or_default(),
            uvs: reader
                .read_tex_coords(0)
                .map(|uvs| uvs.into_f32().map(Vec2::from_array).collect())
                .unwrap_or_default(),
            indices: match reader.read_indices() {
                Some(ReadIndices::U8(indices)) => indices.map(u32::from).collect(),
                Some(ReadIndices::U16(indices)) => indices.map(u32::from).collect(),
                Some(ReadIndices::U32(indices)) => indices.collect(),
                None => Vec::new(),
            },
            positions,
        }
        .normalized();

        let joints = MeshJoints {
            joints: reader
                .read_joints(0)
                .map(|joints| joints.into_u16().map(|joint| joint.map(u32::from)).collect())
                .unwrap_or_default(),
            weights: reader
                .read_weights(0)
                .map(|weights| weights.into_f32().map(Vec4::from_array).collect())
                .unwrap_or_default(),
        };

        let bin = BinGeometry { geometry, joints };
        self.write_file(&uri, &bin.to_bytes())?;
        self.logger.info(format!("Geometry [{uri}] imported"));
        self.exported.geometries.insert(key, uri.clone());
        Ok(uri)
    }

    fn export_material(&mut self, index: usize, skinned: bool) -> Result<Uri> {
        if let Some(uri) = self.exported.materials.get(&index) {
            return Ok(uri.clone());
        }
        let data = Arc::clone(&self.data);
        let material = data
            .document
            .materials()
            .nth(index)
            .ok_or_else(|| anyhow!(Error::CorruptAsset(format!("invalid material {index}"))))?;
        let name = material.name().unwrap_or_default().to_string();
        let uri = Uri::from(format!("{}.json", asset_name(&name, "material", index)));

        let pbr = material.pbr_metallic_roughness();
        let base = pbr.base_color_factor();
        let mut lit = LitMaterial {
            albedo: HdrRgba::new(
                Rgba::from_linear(Vec4::new(base[0], base[1], base[2], 1.0)),
                1.0,
            ),
            emissive_factor: Vec3::from_array(material.emissive_factor()),
            metallic: pbr.metallic_factor(),
            roughness: pbr.roughness_factor(),
            alpha_cutoff: material.alpha_cutoff().unwrap_or(0.5),
            alpha_mode: match material.alpha_mode() {
                gltf::material::AlphaMode::Blend => AlphaMode::Blend,
                gltf::material::AlphaMode::Mask => AlphaMode::Mask,
                gltf::material::AlphaMode::Opaque => AlphaMode::Opaque,
            },
            ..Default::default()
        };
        if let Some(info) = pbr.base_color_texture() {
            lit.base_colour =
                Some(self.export_texture(info.texture().index(), ColourSpace::Srgb)?);
        }
        if let Some(info) = pbr.metallic_roughness_texture() {
            lit.roughness_metallic =
                Some(self.export_texture(info.texture().index(), ColourSpace::Linear)?);
        }
        if let Some(info) = material.emissive_texture() {
            lit.emissive = Some(self.export_texture(info.texture().index(), ColourSpace::Srgb)?);
        }

        let out = Material {
            name,
            vertex_shader: Uri::from(if skinned { SKINNED_VERT } else { LIT_VERT }),
            fragment_shader: Uri::from(LIT_FRAG),
            render_mode: Default::default(),
            kind: if skinned {
                MaterialKind::Skinned(lit)
            } else {
                MaterialKind::Lit(lit)
            },
        };

        self.write_json(&uri, &out.to_doc())?;
        self.logger.info(format!("Material [{uri}] imported"));
        self.exported.materials.insert(index, uri.clone());
        Ok(uri)
    }

    fn export_texture(&mut self, index: usize, colour_space: ColourSpace) -> Result<Uri> {
        if let Some(uri) = self.exported.textures.get(&index) {
            return Ok(uri.clone());
        }
        let data = Arc::clone(&self.data);
        let texture = data
            .document
            .textures()
            .nth(index)
            .ok_or_else(|| anyhow!(Error::CorruptAsset(format!("invalid texture {index}"))))?;
        let image_uri = self.copy_image(&data, texture.source().index())?;
        let name = texture.name().unwrap_or_default().to_string();
        let uri = Uri::from(format!("{}.json", asset_name(&name, "texture", index)));
        self.write_json(
            &uri,
            &TextureDoc {
                image: image_uri,
                colour_space,
            },
        )?;
        self.logger.info(format!("Texture [{uri}] imported"));
        self.exported.textures.insert(index, uri.clone());
        Ok(uri)
    }

    /// Copies the backing image file into the destination, deduplicated by
    /// glTF image index. Embedded images are extracted to files.
    fn copy_image(&mut self, data: &GltfData, index: usize) -> Result<Uri> {
        if let Some(uri) = self.exported.images.get(&index) {
            return Ok(uri.clone());
        }
        let image = data
            .document
            .images()
            .nth(index)
            .ok_or_else(|| anyhow!(Error::CorruptAsset(format!("invalid image {index}"))))?;
        let uri = match image.source() {
            gltf::image::Source::Uri { uri, .. } => {
                let relative = Uri::from(uri);
                let bytes = std::fs::read(self.src_dir.join(uri))
                    .map_err(|_| anyhow!(Error::NotFound(format!("image file {uri}"))))?;
                self.write_file(&relative, &bytes)?;
                relative
            }
            gltf::image::Source::View { view, mime_type } => {
                let extension = match mime_type {
                    "image/png" => "png",
                    "image/jpeg" => "jpg",
                    other => {
                        return Err(anyhow!(Error::Unsupported(format!(
                            "embedded image type {other}"
                        ))))
                    }
                };
                let buffer = data
                    .buffer(view.buffer())
                    .ok_or_else(|| anyhow!(Error::CorruptAsset("missing image buffer".into())))?;
                let bytes = &buffer[view.offset()..view.offset() + view.length()];
                let relative = Uri::from(format!("image_{index}.{extension}"));
                self.write_file(&relative, bytes)?;
                relative
            }
        };
        self.logger.info(format!("Image [{uri}] copied"));
        self.exported.images.insert(index, uri.clone());
        Ok(uri)
    }

    fn export_skeleton(&mut self, index: usize) -> Result<Uri> {
        if let Some(uri) = self.exported.skeletons.get(&index) {
            return Ok(uri.clone());
        }
        let data = Arc::clone(&self.data);
        let skin = data
            .document
            .skins()
            .nth(index)
            .ok_or_else(|| anyhow!(Error::CorruptAsset(format!("invalid skin {index}"))))?;
        let name = skin.name().unwrap_or_default().to_string();
        let out_name = asset_name(&name, "skeleton", index);
        let uri = Uri::from(format!("{out_name}.json"));

        let (joints, node_to_joint) = map_skin_joints(&skin);

        let mut animation_uris = Vec::new();
        for animation in data.document.animations() {
            if let Some(bin) = self.build_animation(&data, &animation, &node_to_joint)? {
                let animation_name = animation.name().unwrap_or_default();
                let bin_uri = Uri::from(format!(
                    "{}.bin",
                    asset_name(animation_name, "animation", animation.index())
                ));
                self.write_file(&bin_uri, &bin.to_bytes())?;
                self.logger.info(format!("Skeletal animation [{bin_uri}] imported"));
                animation_uris.push(bin_uri);
            }
        }

        let doc = SkeletonDoc {
            asset_type: "skeleton".into(),
            name: out_name,
            joints: joints
                .iter()
                .map(|joint| JointDoc {
                    name: joint.name.clone(),
                    transform: mat4_to_floats(joint.transform.matrix()),
                    self_index: joint.self_index,
                    parent: joint.parent,
                    children: joint.children.clone(),
                })
                .collect(),
            animations: animation_uris,
        };
        self.write_json(&uri, &doc)?;
        self.logger.info(format!("Skeleton [{uri}] imported"));
        self.exported.skeletons.insert(index, uri.clone());
        Ok(uri)
    }

    fn build_animation(
        &self,
        data: &GltfData,
        animation: &gltf::Animation,
        node_to_joint: &HashMap<usize, usize>,
    ) -> Result<Option<BinSkeletalAnimation>> {
        let mut out = SkeletalAnimation {
            name: animation.name().unwrap_or_default().to_string(),
            ..Default::default()
        };
        for channel in animation.channels() {
            let Some(joint) = node_to_joint.get(&channel.target().node().index()) else {
                continue;
            };
            let interpolation = match channel.sampler().interpolation() {
                gltf::animation::Interpolation::Step => Interpolation::Step,
                gltf::animation::Interpolation::Linear => Interpolation::Linear,
                gltf::animation::Interpolation::CubicSpline => {
                    self.logger
                        .warn(format!("Cubic-spline channel in [{}] skipped", out.name));
                    continue;
                }
            };
            let reader = channel.reader(|buffer| data.buffer(buffer));
            let Some(inputs) = reader.read_inputs() else { continue };
            let timestamps: Vec<f32> = inputs.collect();
            let Some(outputs) = reader.read_outputs() else { continue };

            use gltf::animation::util::ReadOutputs;
            let sampler = match outputs {
                ReadOutputs::Translations(values) => AnimationSampler::Translate(
                    vec3_interpolator(&timestamps, values, interpolation),
                ),
                ReadOutputs::Scales(values) => {
                    AnimationSampler::Scale(vec3_interpolator(&timestamps, values, interpolation))
                }
                ReadOutputs::Rotations(values) => {
                    let keyframes = timestamps
                        .iter()
                        .zip(values.into_f32())
                        .map(|(timestamp, value)| Keyframe {
                            timestamp: *timestamp,
                            value: Quat::from_array(value),
                        })
                        .collect();
                    AnimationSampler::Rotate(Interpolator {
                        keyframes,
                        interpolation,
                    })
                }
                ReadOutputs::MorphTargetWeights(_) => continue,
            };
            out.samplers.push(sampler);
            out.target_joints.push(*joint);
        }

        if out.samplers.is_empty() {
            return Ok(None);
        }
        debug_assert_eq!(out.samplers.len(), out.target_joints.len());
        Ok(Some(BinSkeletalAnimation::new(out)))
    }

    pub fn import_scene(&mut self, index: usize) -> Result<Uri> {
        let data = Arc::clone(&self.data);
        let scene = data
            .document
            .scenes()
            .nth(index)
            .ok_or_else(|| anyhow!(Error::NotFound(format!("glTF scene {index}"))))?;
        let name = scene.name().unwrap_or_default().to_string();
        let out_name = asset_name(&name, "scene", index);
        let uri = Uri::from(format!("{out_name}.json"));

        let mut doc = SceneDoc {
            asset_type: "scene".into(),
            name: out_name,
            nodes: Vec::new(),
            roots: Vec::new(),
            entities: Vec::new(),
            camera: Some(CameraDoc {
                name: "camera".into(),
                transform: mat4_to_floats(Mat4::from_translation(Vec3::new(0.0, 1.0, 5.0))),
                exposure: 1.0,
                kind: "perspective".into(),
                field_of_view: Some(45f32.to_radians()),
                view_plane: ViewPlaneDoc {
                    near: 0.1,
                    far: 1000.0,
                },
            }),
            lights: LightsDoc::default(),
        };

        for node in scene.nodes() {
            let root_id = self.export_node(&node, 0, &mut doc)?;
            doc.roots.push(root_id);
        }

        self.write_json(&uri, &doc)?;
        self.logger.info(format!("Scene [{uri}] imported"));
        Ok(uri)
    }

    fn export_node(&mut self, node: &gltf::Node, parent: u64, doc: &mut SceneDoc) -> Result<u64> {
        let id = doc.nodes.len() as u64 + 1;
        let name = node
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("node_{}", node.index()));
        doc.nodes.push(NodeDoc {
            id,
            name,
            transform: mat4_to_floats(Mat4::from_cols_array_2d(&node.transform().matrix())),
            parent,
            children: Vec::new(),
            entity: 0,
        });

        if let Some(mesh) = node.mesh() {
            let skinned = node.skin().is_some();
            let mesh_uri = self.export_mesh(mesh.index())?;
            let entity_id = doc.entities.len() as u64 + 1;
            let renderer = if skinned {
                serde_json::json!({ "type": "skinned_mesh_renderer", "mesh": mesh_uri })
            } else {
                serde_json::json!({ "type": "static_mesh_renderer", "mesh": mesh_uri })
            };
            let mut components = Vec::new();
            if skinned {
                components.push(serde_json::json!({ "type": "skeleton_controller" }));
            }
            doc.entities.push(EntityDoc {
                id: entity_id,
                node: id,
                components,
                renderer: Some(renderer),
            });
            doc.nodes.last_mut().expect("just pushed").entity = entity_id;
        }

        for child in node.children() {
            let child_id = self.export_node(&child, id, doc)?;
            let parent_index = (id - 1) as usize;
            doc.nodes[parent_index].children.push(child_id);
        }
        Ok(id)
    }
}

fn vec3_interpolator(
    timestamps: &[f32],
    values: impl Iterator<Item = [f32; 3]>,
    interpolation: Interpolation,
) -> Interpolator<Vec3> {
    Interpolator {
        keyframes: timestamps
            .iter()
            .zip(values)
            .map(|(timestamp, value)| Keyframe {
                timestamp: *timestamp,
                value: Vec3::from_array(value),
            })
            .collect(),
        interpolation,
    }
}

/// Flattens the node subtree spanned by a skin's joints into densely indexed
/// joints, preserving the order dictated by `skin.joints`.
///
/// Walks each skin joint recording entries in discovery order, assigns final
/// indices in `skin.joints` order (extra descendants appended after), then
/// rewrites child and parent indices through the node-to-joint map.
fn map_skin_joints(skin: &gltf::Skin) -> (Vec<Joint>, HashMap<usize, usize>) {
    struct Entry {
        joint: Joint,
        children_nodes: Vec<usize>,
    }

    fn add_node_and_children(node: &gltf::Node, entries: &mut HashMap<usize, Entry>) {
        if entries.contains_key(&node.index()) {
            return;
        }
        let (translation, rotation, scale) = node.transform().decomposed();
        let mut transform = Transform::default();
        transform
            .set_position(Vec3::from_array(translation))
            .set_orientation(Quat::from_array(rotation))
            .set_scale(Vec3::from_array(scale));
        entries.insert(
            node.index(),
            Entry {
                joint: Joint {
                    name: node.name().unwrap_or_default().to_string(),
                    transform,
                    self_index: 0,
                    parent: None,
                    children: Vec::new(),
                },
                children_nodes: node.children().map(|child| child.index()).collect(),
            },
        );
        for child in node.children() {
            add_node_and_children(&child, entries);
        }
    }

    let mut entries = HashMap::new();
    for joint in skin.joints() {
        add_node_and_children(&joint, &mut entries);
    }

    let mut node_to_joint = HashMap::new();
    for joint in skin.joints() {
        let next = node_to_joint.len();
        node_to_joint.entry(joint.index()).or_insert(next);
    }
    let mut extra: Vec<usize> = entries
        .keys()
        .copied()
        .filter(|node| !node_to_joint.contains_key(node))
        .collect();
    extra.sort_unstable();
    for node in extra {
        let next = node_to_joint.len();
        node_to_joint.insert(node, next);
    }

    let mut joints = vec![Joint::default(); node_to_joint.len()];
    for (node_index, joint_index) in &node_to_joint {
        let entry = entries.remove(node_index).expect("discovered");
        let mut joint = entry.joint;
        joint.self_index = *joint_index;
        joint.children = entry
            .children_nodes
            .iter()
            .filter_map(|child| node_to_joint.get(child).copied())
            .collect();
        joint.children.sort_unstable();
        joints[*joint_index] = joint;
    }
    for index in 0..joints.len() {
        for child in joints[index].children.clone() {
            joints[child].parent = Some(index);
        }
    }

    (joints, node_to_joint)
}
