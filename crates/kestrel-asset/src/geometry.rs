use glam::{Vec2, Vec3, Vec4};

/// Packed vertex streams. All per-vertex arrays have the same length;
/// `indices` may be empty for non-indexed geometry.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Geometry {
    pub positions: Vec<Vec3>,
    pub rgbs: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub indices: Vec<u32>,
}

impl Geometry {
    pub fn vertex_count(&self) -> usize { self.positions.len() }

    /// Fills missing streams with their defaults so all arrays line up.
    pub fn normalized(mut self) -> Self {
        let count = self.positions.len();
        if self.rgbs.len() != count {
            self.rgbs = vec![Vec3::ONE; count];
        }
        if self.normals.len() != count {
            self.normals = vec![Vec3::Z; count];
        }
        if self.uvs.len() != count {
            self.uvs = vec![Vec2::ZERO; count];
        }
        self
    }

    /// Unit quad on the XY plane, used by UI surfaces.
    pub fn quad() -> Self {
        Self {
            positions: vec![
                Vec3::new(-0.5, -0.5, 0.0),
                Vec3::new(0.5, -0.5, 0.0),
                Vec3::new(0.5, 0.5, 0.0),
                Vec3::new(-0.5, 0.5, 0.0),
            ],
            rgbs: vec![Vec3::ONE; 4],
            normals: vec![Vec3::Z; 4],
            uvs: vec![
                Vec2::new(0.0, 1.0),
                Vec2::new(1.0, 1.0),
                Vec2::new(1.0, 0.0),
                Vec2::new(0.0, 0.0),
            ],
            indices: vec![0, 1, 2, 2, 3, 0],
        }
    }

    /// Unit cube centered at the origin.
    pub fn cube() -> Self {
        let mut ret = Geometry::default();
        let faces: [(Vec3, Vec3, Vec3); 6] = [
            (Vec3::Z, Vec3::X, Vec3::Y),
            (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
            (Vec3::X, Vec3::NEG_Z, Vec3::Y),
            (Vec3::NEG_X, Vec3::Z, Vec3::Y),
            (Vec3::Y, Vec3::X, Vec3::NEG_Z),
            (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        ];
        for (normal, right, up) in faces {
            let base = ret.positions.len() as u32;
            let origin = normal * 0.5;
            for (du, dv) in [(-0.5, -0.5), (0.5, -0.5), (0.5, 0.5), (-0.5, 0.5)] {
                ret.positions.push(origin + right * du + up * dv);
                ret.normals.push(normal);
                ret.rgbs.push(Vec3::ONE);
                ret.uvs.push(Vec2::new(du + 0.5, 0.5 - dv));
            }
            ret.indices
                .extend([base, base + 1, base + 2, base + 2, base + 3, base]);
        }
        ret
    }
}

/// Per-vertex joint influences for skinned geometry; both arrays match the
/// vertex count of the geometry they accompany.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshJoints {
    pub joints: Vec<[u32; 4]>,
    pub weights: Vec<Vec4>,
}

impl MeshJoints {
    pub fn is_empty(&self) -> bool { self.joints.is_empty() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_fills_missing_streams() {
        let geometry = Geometry {
            positions: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            ..Default::default()
        }
        .normalized();
        assert_eq!(geometry.rgbs, vec![Vec3::ONE; 3]);
        assert_eq!(geometry.normals, vec![Vec3::Z; 3]);
        assert_eq!(geometry.uvs, vec![Vec2::ZERO; 3]);
        assert!(geometry.indices.is_empty());
    }

    #[test]
    fn cube_has_six_quads() {
        let cube = Geometry::cube();
        assert_eq!(cube.vertex_count(), 24);
        assert_eq!(cube.indices.len(), 36);
    }
}
