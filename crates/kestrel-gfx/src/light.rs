use {
    glam::{Quat, Vec3},
    kestrel_core::HdrRgba,
};

/// At most this many directional lights are consumed per frame; extras are
/// dropped with a warning.
pub const MAX_DIR_LIGHTS: usize = 4;

/// Directional light: an orientation applied to -Z, plus an HDR color.
#[derive(Clone, Copy, Debug)]
pub struct DirLight {
    pub direction: Quat,
    pub rgb: HdrRgba,
}

impl Default for DirLight {
    fn default() -> Self {
        Self {
            // Pointing down and slightly forward.
            direction: Quat::from_rotation_x(-std::f32::consts::FRAC_PI_4),
            rgb: HdrRgba::default(),
        }
    }
}

impl DirLight {
    pub fn direction_vector(&self) -> Vec3 { (self.direction * Vec3::NEG_Z).normalize() }
}

#[derive(Clone, Debug, Default)]
pub struct Lights {
    pub dir_lights: Vec<DirLight>,
}

impl Lights {
    /// The first light drives the shadow map.
    pub fn primary(&self) -> Option<&DirLight> { self.dir_lights.first() }

    /// The lights actually submitted this frame.
    pub fn clamped(&self) -> &[DirLight] {
        if self.dir_lights.len() > MAX_DIR_LIGHTS {
            log::warn!(
                "{} directional lights submitted, using the first {MAX_DIR_LIGHTS}",
                self.dir_lights.len(),
            );
        }
        &self.dir_lights[..self.dir_lights.len().min(MAX_DIR_LIGHTS)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_points_down_negative_z() {
        let light = DirLight {
            direction: Quat::IDENTITY,
            rgb: HdrRgba::default(),
        };
        assert!((light.direction_vector() - Vec3::NEG_Z).length() < 1e-6);
    }

    #[test]
    fn clamped_caps_light_count() {
        let lights = Lights {
            dir_lights: vec![DirLight::default(); 6],
        };
        assert_eq!(lights.clamped().len(), MAX_DIR_LIGHTS);
    }
}
