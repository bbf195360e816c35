use {
    crate::{
        json::{MaterialDoc, RenderModeDoc},
        provider::{AssetLoader, Payload},
        source::DataSource,
    },
    glam::Vec3,
    kestrel_core::{HdrRgba, Uri},
    std::sync::Arc,
};

/// `Default` inherits the device-wide render mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PolygonMode {
    Fill,
    Line,
    Point,
    #[default]
    Default,
}

impl PolygonMode {
    pub fn from_str(value: &str) -> Self {
        match value {
            "fill" => PolygonMode::Fill,
            "line" => PolygonMode::Line,
            "point" => PolygonMode::Point,
            _ => PolygonMode::Default,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PolygonMode::Fill => "fill",
            PolygonMode::Line => "line",
            PolygonMode::Point => "point",
            PolygonMode::Default => "default",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderMode {
    pub polygon: PolygonMode,
    pub line_width: f32,
    pub depth_test: bool,
}

impl Default for RenderMode {
    fn default() -> Self {
        Self {
            polygon: PolygonMode::Default,
            line_width: 1.0,
            depth_test: true,
        }
    }
}

impl RenderMode {
    /// Resolves against the device default: the device wins unless this mode
    /// overrides the polygon type (which carries its line width along);
    /// depth_test is always taken from this mode.
    pub fn merged(self, device: RenderMode) -> RenderMode {
        let (polygon, line_width) = match self.polygon {
            PolygonMode::Default => (device.polygon, device.line_width),
            polygon => (polygon, self.line_width),
        };
        RenderMode {
            polygon,
            line_width,
            depth_test: self.depth_test,
        }
    }

    fn from_doc(doc: &RenderModeDoc) -> Self {
        Self {
            polygon: PolygonMode::from_str(&doc.r#type),
            line_width: doc.line_width,
            depth_test: doc.depth_test,
        }
    }

    fn to_doc(self) -> RenderModeDoc {
        RenderModeDoc {
            r#type: self.polygon.as_str().to_string(),
            line_width: self.line_width,
            depth_test: self.depth_test,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AlphaMode {
    #[default]
    Opaque,
    Blend,
    Mask,
}

impl AlphaMode {
    pub fn from_str(value: &str) -> Self {
        match value {
            "blend" => AlphaMode::Blend,
            "mask" => AlphaMode::Mask,
            _ => AlphaMode::Opaque,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AlphaMode::Opaque => "opaque",
            AlphaMode::Blend => "blend",
            AlphaMode::Mask => "mask",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct LitMaterial {
    pub albedo: HdrRgba,
    pub emissive_factor: Vec3,
    pub metallic: f32,
    pub roughness: f32,
    pub alpha_cutoff: f32,
    pub alpha_mode: AlphaMode,
    pub base_colour: Option<Uri>,
    pub roughness_metallic: Option<Uri>,
    pub emissive: Option<Uri>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct UnlitMaterial {
    pub tint: HdrRgba,
    pub texture: Option<Uri>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum MaterialKind {
    Unlit(UnlitMaterial),
    Lit(LitMaterial),
    Skinned(LitMaterial),
}

/// Runtime material. Texture fields are uris resolved against the texture
/// provider at draw time.
#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub name: String,
    pub vertex_shader: Uri,
    pub fragment_shader: Uri,
    pub render_mode: RenderMode,
    pub kind: MaterialKind,
}

pub const LIT_VERT: &str = "shaders/lit.vert";
pub const LIT_FRAG: &str = "shaders/lit.frag";
pub const SKINNED_VERT: &str = "shaders/skinned.vert";
pub const UNLIT_VERT: &str = "shaders/unlit.vert";
pub const UNLIT_FRAG: &str = "shaders/unlit.frag";

impl Default for Material {
    fn default() -> Self {
        Self {
            name: "default".into(),
            vertex_shader: Uri::from(LIT_VERT),
            fragment_shader: Uri::from(LIT_FRAG),
            render_mode: RenderMode::default(),
            kind: MaterialKind::Lit(LitMaterial {
                metallic: 0.0,
                roughness: 1.0,
                alpha_cutoff: 0.5,
                ..Default::default()
            }),
        }
    }
}

impl Material {
    pub fn unlit(tint: HdrRgba, texture: Option<Uri>) -> Self {
        Self {
            name: "unlit".into(),
            vertex_shader: Uri::from(UNLIT_VERT),
            fragment_shader: Uri::from(UNLIT_FRAG),
            render_mode: RenderMode::default(),
            kind: MaterialKind::Unlit(UnlitMaterial { tint, texture }),
        }
    }

    pub fn alpha_mode(&self) -> AlphaMode {
        match &self.kind {
            MaterialKind::Unlit(_) => AlphaMode::Opaque,
            MaterialKind::Lit(lit) | MaterialKind::Skinned(lit) => lit.alpha_mode,
        }
    }

    pub fn is_skinned(&self) -> bool { matches!(self.kind, MaterialKind::Skinned(_)) }

    pub fn lit(&self) -> Option<&LitMaterial> {
        match &self.kind {
            MaterialKind::Lit(lit) | MaterialKind::Skinned(lit) => Some(lit),
            MaterialKind::Unlit(_) => None,
        }
    }

    fn from_doc(doc: MaterialDoc, base: &Uri) -> Self {
        let resolve = |uri: Option<Uri>| uri.map(|uri| base.join(uri.as_str()));
        let lit = LitMaterial {
            albedo: doc.albedo,
            emissive_factor: Vec3::from_array(doc.emissive_factor),
            metallic: doc.metallic,
            roughness: doc.roughness,
            alpha_cutoff: doc.alpha_cutoff,
            alpha_mode: AlphaMode::from_str(&doc.alpha_mode),
            base_colour: resolve(doc.base_colour),
            roughness_metallic: resolve(doc.roughness_metallic),
            emissive: resolve(doc.emissive),
        };
        let kind = match doc.kind.as_deref() {
            Some("unlit") => MaterialKind::Unlit(UnlitMaterial {
                tint: doc.albedo,
                texture: lit.base_colour.clone(),
            }),
            Some("skinned") => MaterialKind::Skinned(lit),
            Some(_) => MaterialKind::Lit(lit),
            None if doc.vertex_shader.as_str().contains("skinned") => MaterialKind::Skinned(lit),
            None => MaterialKind::Lit(lit),
        };
        Self {
            name: doc.name,
            vertex_shader: doc.vertex_shader,
            fragment_shader: doc.fragment_shader,
            render_mode: RenderMode::from_doc(&doc.render_mode),
            kind,
        }
    }

    pub fn to_doc(&self) -> MaterialDoc {
        let empty = LitMaterial::default();
        let (kind, lit) = match &self.kind {
            MaterialKind::Unlit(_) => ("unlit", &empty),
            MaterialKind::Lit(lit) => ("lit", lit),
            MaterialKind::Skinned(lit) => ("skinned", lit),
        };
        MaterialDoc {
            asset_type: "material".into(),
            name: self.name.clone(),
            kind: Some(kind.into()),
            albedo: match &self.kind {
                MaterialKind::Unlit(unlit) => unlit.tint,
                _ => lit.albedo,
            },
            emissive_factor: lit.emissive_factor.to_array(),
            metallic: lit.metallic,
            roughness: lit.roughness,
            base_colour: lit.base_colour.clone(),
            roughness_metallic: lit.roughness_metallic.clone(),
            emissive: lit.emissive.clone(),
            alpha_cutoff: lit.alpha_cutoff,
            alpha_mode: lit.alpha_mode.as_str().into(),
            render_mode: self.render_mode.to_doc(),
            vertex_shader: self.vertex_shader.clone(),
            fragment_shader: self.fragment_shader.clone(),
        }
    }

    /// Texture dependencies of this material.
    pub fn texture_uris(&self) -> Vec<Uri> {
        match &self.kind {
            MaterialKind::Unlit(unlit) => unlit.texture.iter().cloned().collect(),
            MaterialKind::Lit(lit) | MaterialKind::Skinned(lit) => [
                lit.base_colour.as_ref(),
                lit.roughness_metallic.as_ref(),
                lit.emissive.as_ref(),
            ]
            .into_iter()
            .flatten()
            .cloned()
            .collect(),
        }
    }
}

pub type MaterialProvider = crate::provider::Provider<MaterialLoader>;

pub struct MaterialLoader {
    source: Arc<dyn DataSource>,
}

impl MaterialLoader {
    pub fn new(source: Arc<dyn DataSource>) -> Self { Self { source } }
}

impl AssetLoader for MaterialLoader {
    type Asset = Material;

    fn load_payload(&mut self, uri: &Uri) -> Payload<Material> {
        let doc: MaterialDoc = match self
            .source
            .read(uri)
            .and_then(|bytes| Ok(serde_json::from_slice(&bytes)?))
        {
            Ok(doc) => doc,
            Err(e) => {
                log::warn!("Failed to load material {uri}: {e}");
                return Payload::missing(uri);
            }
        };
        if doc.asset_type != "material" {
            log::warn!("{uri} is not a material manifest ({:?})", doc.asset_type);
            return Payload::missing(uri);
        }

        let material = Material::from_doc(doc, &uri.parent());
        let mut dependencies = vec![uri.clone()];
        dependencies.extend(material.texture_uris());
        log::debug!("Loaded material {uri} ({})", material.name);
        Payload {
            asset: Some(material),
            dependencies,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merged_inherits_device_polygon() {
        let device = RenderMode {
            polygon: PolygonMode::Fill,
            line_width: 2.0,
            depth_test: true,
        };
        let material = RenderMode {
            polygon: PolygonMode::Default,
            line_width: 1.0,
            depth_test: false,
        };
        let merged = material.merged(device);
        assert_eq!(merged.polygon, PolygonMode::Fill);
        assert_eq!(merged.line_width, 2.0);
        assert!(!merged.depth_test, "depth test always comes from the material");
    }

    #[test]
    fn merged_respects_material_override() {
        let device = RenderMode {
            polygon: PolygonMode::Fill,
            line_width: 2.0,
            depth_test: true,
        };
        let material = RenderMode {
            polygon: PolygonMode::Line,
            line_width: 3.0,
            depth_test: true,
        };
        let merged = material.merged(device);
        assert_eq!(merged.polygon, PolygonMode::Line);
        assert_eq!(merged.line_width, 3.0);
    }

    #[test]
    fn doc_round_trip_preserves_kind_and_textures() {
        let mut material = Material::default();
        material.name = "crate".into();
        if let MaterialKind::Lit(ref mut lit) = material.kind {
            lit.base_colour = Some(Uri::from("textures/crate.json"));
            lit.alpha_mode = AlphaMode::Mask;
        }
        let doc = material.to_doc();
        // Textures re-resolve relative to the manifest location on load.
        let back = Material::from_doc(doc, &Uri::default());
        assert_eq!(back.alpha_mode(), AlphaMode::Mask);
        assert_eq!(back.texture_uris(), vec![Uri::from("textures/crate.json")]);
        assert!(!back.is_skinned());
    }

    #[test]
    fn skinned_kind_inferred_from_vertex_shader() {
        let doc = MaterialDoc {
            asset_type: "material".into(),
            name: String::new(),
            kind: None,
            albedo: HdrRgba::default(),
            emissive_factor: [0.0; 3],
            metallic: 1.0,
            roughness: 1.0,
            base_colour: None,
            roughness_metallic: None,
            emissive: None,
            alpha_cutoff: 0.5,
            alpha_mode: "opaque".into(),
            render_mode: RenderModeDoc::default(),
            vertex_shader: Uri::from(SKINNED_VERT),
            fragment_shader: Uri::from(LIT_FRAG),
        };
        assert!(Material::from_doc(doc, &Uri::default()).is_skinned());
    }
}
