use {
    crate::skeleton::{Joint, Skeleton},
    anyhow::{anyhow, Result},
    glam::Mat4,
    kestrel_core::{Error, HdrRgba, Transform, Uri},
    serde::{Deserialize, Serialize},
};

/// Matrices persist as 16 floats, row major.
pub fn mat4_to_floats(matrix: Mat4) -> [f32; 16] { matrix.transpose().to_cols_array() }

pub fn mat4_from_floats(floats: &[f32; 16]) -> Mat4 { Mat4::from_cols_array(floats).transpose() }

fn is_zero(value: &u64) -> bool { *value == 0 }

/// `{ image, colour_space }` manifest the importer writes per texture.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TextureDoc {
    pub image: Uri,
    #[serde(default)]
    pub colour_space: ColourSpace,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColourSpace {
    #[default]
    Srgb,
    Linear,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RenderModeDoc {
    #[serde(default)]
    pub r#type: String,
    #[serde(default = "default_line_width")]
    pub line_width: f32,
    #[serde(default = "default_true")]
    pub depth_test: bool,
}

impl Default for RenderModeDoc {
    fn default() -> Self {
        Self {
            r#type: String::new(),
            line_width: 1.0,
            depth_test: true,
        }
    }
}

fn default_line_width() -> f32 { 1.0 }

fn default_true() -> bool { true }

/// Material manifest (`asset_type: "material"`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MaterialDoc {
    pub asset_type: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub albedo: HdrRgba,
    #[serde(default)]
    pub emissive_factor: [f32; 3],
    #[serde(default = "default_one")]
    pub metallic: f32,
    #[serde(default = "default_one")]
    pub roughness: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_colour: Option<Uri>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roughness_metallic: Option<Uri>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emissive: Option<Uri>,
    #[serde(default = "default_alpha_cutoff")]
    pub alpha_cutoff: f32,
    #[serde(default)]
    pub alpha_mode: String,
    #[serde(default)]
    pub render_mode: RenderModeDoc,
    pub vertex_shader: Uri,
    pub fragment_shader: Uri,
}

fn default_one() -> f32 { 1.0 }

fn default_alpha_cutoff() -> f32 { 0.5 }

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MeshPrimitiveDoc {
    pub geometry: Uri,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<Uri>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topology: Option<String>,
}

/// Mesh manifest (`asset_type: "mesh"`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MeshDoc {
    pub asset_type: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub name: String,
    pub primitives: Vec<MeshPrimitiveDoc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skeleton: Option<Uri>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inverse_bind_matrices: Vec<[f32; 16]>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JointDoc {
    pub name: String,
    pub transform: [f32; 16],
    #[serde(rename = "self")]
    pub self_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<usize>,
    #[serde(default)]
    pub children: Vec<usize>,
}

/// Skeleton manifest (`asset_type: "skeleton"`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SkeletonDoc {
    pub asset_type: String,
    #[serde(default)]
    pub name: String,
    pub joints: Vec<JointDoc>,
    #[serde(default)]
    pub animations: Vec<Uri>,
}

impl SkeletonDoc {
    pub fn into_skeleton(self) -> Result<Skeleton> {
        if self.asset_type != "skeleton" {
            return Err(anyhow!(Error::CorruptAsset(format!(
                "expected a skeleton manifest, found {:?}",
                self.asset_type
            ))));
        }
        let count = self.joints.len();
        let mut joints = Vec::with_capacity(count);
        for (index, doc) in self.joints.into_iter().enumerate() {
            if doc.self_index != index
                || doc.parent.is_some_and(|parent| parent >= count)
                || doc.children.iter().any(|child| *child >= count)
            {
                return Err(anyhow!(Error::CorruptAsset(format!(
                    "skeleton joint {index} has out-of-range indices"
                ))));
            }
            joints.push(Joint {
                name: doc.name,
                transform: Transform::from_matrix(mat4_from_floats(&doc.transform)),
                self_index: doc.self_index,
                parent: doc.parent,
                children: doc.children,
            });
        }
        for joint in &joints {
            if let Some(parent) = joint.parent {
                if !joints[parent].children.contains(&joint.self_index) {
                    return Err(anyhow!(Error::CorruptAsset(format!(
                        "skeleton joint {} missing from parent {parent}'s children",
                        joint.self_index
                    ))));
                }
            }
        }
        Ok(Skeleton {
            name: self.name,
            joints,
            animation_uris: self.animations,
            animations: Vec::new(),
        })
    }

    pub fn from_skeleton(skeleton: &Skeleton) -> Self {
        Self {
            asset_type: "skeleton".into(),
            name: skeleton.name.clone(),
            joints: skeleton
                .joints
                .iter()
                .map(|joint| JointDoc {
                    name: joint.name.clone(),
                    transform: mat4_to_floats(joint.transform.matrix()),
                    self_index: joint.self_index,
                    parent: joint.parent,
                    children: joint.children.clone(),
                })
                .collect(),
            animations: skeleton.animation_uris.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeDoc {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    pub transform: [f32; 16],
    #[serde(default, skip_serializing_if = "is_zero")]
    pub parent: u64,
    #[serde(default)]
    pub children: Vec<u64>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub entity: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EntityDoc {
    pub id: u64,
    pub node: u64,
    #[serde(default)]
    pub components: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renderer: Option<serde_json::Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ViewPlaneDoc {
    pub near: f32,
    pub far: f32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CameraDoc {
    #[serde(default)]
    pub name: String,
    pub transform: [f32; 16],
    #[serde(default = "default_one")]
    pub exposure: f32,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_of_view: Option<f32>,
    pub view_plane: ViewPlaneDoc,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DirLightDoc {
    pub direction: [f32; 4],
    pub rgb: HdrRgba,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LightsDoc {
    #[serde(default)]
    pub dir_lights: Vec<DirLightDoc>,
}

/// Scene manifest (`asset_type: "scene"`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SceneDoc {
    pub asset_type: String,
    #[serde(default)]
    pub name: String,
    pub nodes: Vec<NodeDoc>,
    pub roots: Vec<u64>,
    #[serde(default)]
    pub entities: Vec<EntityDoc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera: Option<CameraDoc>,
    #[serde(default)]
    pub lights: LightsDoc,
}

#[cfg(test)]
mod tests {
    use {super::*, glam::Vec3};

    #[test]
    fn matrix_floats_are_row_major() {
        let matrix = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let floats = mat4_to_floats(matrix);
        // Translation sits in the last column of each row.
        assert_eq!(floats[3], 1.0);
        assert_eq!(floats[7], 2.0);
        assert_eq!(floats[11], 3.0);
        assert_eq!(mat4_from_floats(&floats), matrix);
    }

    #[test]
    fn material_doc_round_trips() {
        let json = serde_json::json!({
            "asset_type": "material",
            "name": "crate",
            "albedo": { "hex": "#ff8000ff", "intensity": 2.0 },
            "emissive_factor": [0.0, 0.0, 0.0],
            "metallic": 0.1,
            "roughness": 0.8,
            "base_colour": "crate_diffuse.json",
            "alpha_cutoff": 0.5,
            "alpha_mode": "opaque",
            "render_mode": { "type": "fill", "line_width": 1.0, "depth_test": true },
            "vertex_shader": "shaders/lit.vert",
            "fragment_shader": "shaders/lit.frag",
        });
        let doc: MaterialDoc = serde_json::from_value(json).unwrap();
        assert_eq!(doc.albedo.intensity, 2.0);
        assert_eq!(doc.base_colour, Some(Uri::from("crate_diffuse.json")));
        assert_eq!(doc.roughness_metallic, None);

        let round_tripped: MaterialDoc =
            serde_json::from_str(&serde_json::to_string(&doc).unwrap()).unwrap();
        assert_eq!(round_tripped.name, "crate");
    }

    #[test]
    fn skeleton_doc_validates_indices() {
        let doc = SkeletonDoc {
            asset_type: "skeleton".into(),
            name: "rig".into(),
            joints: vec![JointDoc {
                name: "root".into(),
                transform: mat4_to_floats(Mat4::IDENTITY),
                self_index: 0,
                parent: Some(7),
                children: vec![],
            }],
            animations: vec![],
        };
        assert!(doc.into_skeleton().is_err());
    }

    #[test]
    fn skeleton_doc_round_trips() {
        let doc = SkeletonDoc {
            asset_type: "skeleton".into(),
            name: "rig".into(),
            joints: vec![
                JointDoc {
                    name: "root".into(),
                    transform: mat4_to_floats(Mat4::IDENTITY),
                    self_index: 0,
                    parent: None,
                    children: vec![1],
                },
                JointDoc {
                    name: "tip".into(),
                    transform: mat4_to_floats(Mat4::from_translation(Vec3::Y)),
                    self_index: 1,
                    parent: Some(0),
                    children: vec![],
                },
            ],
            animations: vec![Uri::from("walk.bin")],
        };
        let skeleton = doc.into_skeleton().unwrap();
        assert_eq!(skeleton.joints.len(), 2);
        assert_eq!(skeleton.joints[1].parent, Some(0));
        assert_eq!(skeleton.animation_uris, vec![Uri::from("walk.bin")]);

        let back = SkeletonDoc::from_skeleton(&skeleton);
        assert_eq!(back.joints.len(), 2);
        assert_eq!(back.joints[0].children, vec![1]);
    }
}
