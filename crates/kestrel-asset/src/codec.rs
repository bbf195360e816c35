use {
    crate::{
        animation::{AnimationSampler, Interpolation, Interpolator, Keyframe, SkeletalAnimation},
        geometry::{Geometry, MeshJoints},
    },
    anyhow::{anyhow, Result},
    glam::{Quat, Vec2, Vec3, Vec4},
    kestrel_core::{util, Error},
    std::path::Path,
};

// Little-endian writer/reader for the .bin asset formats.

#[derive(Default)]
struct Writer {
    bytes: Vec<u8>,
}

impl Writer {
    fn put_u64(&mut self, value: u64) { self.bytes.extend_from_slice(&value.to_le_bytes()); }

    fn put_u32(&mut self, value: u32) { self.bytes.extend_from_slice(&value.to_le_bytes()); }

    fn put_u8(&mut self, value: u8) { self.bytes.push(value); }

    fn put_f32(&mut self, value: f32) { self.bytes.extend_from_slice(&value.to_le_bytes()); }

    fn put_vec2(&mut self, value: Vec2) {
        self.put_f32(value.x);
        self.put_f32(value.y);
    }

    fn put_vec3(&mut self, value: Vec3) {
        self.put_f32(value.x);
        self.put_f32(value.y);
        self.put_f32(value.z);
    }

    fn put_vec4(&mut self, value: Vec4) {
        self.put_f32(value.x);
        self.put_f32(value.y);
        self.put_f32(value.z);
        self.put_f32(value.w);
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self { Self { bytes, offset: 0 } }

    fn take(&mut self, count: usize) -> Result<&'a [u8]> {
        let end = self.offset.checked_add(count).filter(|end| *end <= self.bytes.len());
        let end = end.ok_or_else(|| anyhow!(Error::CorruptAsset("truncated binary asset".into())))?;
        let slice = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().expect("8 bytes")))
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().expect("4 bytes")))
    }

    fn u8(&mut self) -> Result<u8> { Ok(self.take(1)?[0]) }

    fn f32(&mut self) -> Result<f32> {
        Ok(f32::from_le_bytes(self.take(4)?.try_into().expect("4 bytes")))
    }

    fn vec2(&mut self) -> Result<Vec2> { Ok(Vec2::new(self.f32()?, self.f32()?)) }

    fn vec3(&mut self) -> Result<Vec3> {
        Ok(Vec3::new(self.f32()?, self.f32()?, self.f32()?))
    }

    fn vec4(&mut self) -> Result<Vec4> {
        Ok(Vec4::new(self.f32()?, self.f32()?, self.f32()?, self.f32()?))
    }
}

/// Geometry + joint influences as stored in `.bin` files.
///
/// Layout (all little-endian):
/// header `{hash, positions, indices, joints, weights}` as u64, then the
/// positions / rgbs / normals / uvs streams, the index array when present,
/// and the joint + weight streams when present.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BinGeometry {
    pub geometry: Geometry,
    pub joints: MeshJoints,
}

impl BinGeometry {
    /// Hash over the position stream and every array length; validates reads.
    pub fn compute_hash(&self) -> u64 {
        let geometry = &self.geometry;
        let mut hash = 0u64;
        for position in &geometry.positions {
            hash = util::hash_combine(hash, &position.x.to_le_bytes());
            hash = util::hash_combine(hash, &position.y.to_le_bytes());
            hash = util::hash_combine(hash, &position.z.to_le_bytes());
        }
        hash = util::hash_combine_u64(hash, geometry.rgbs.len() as u64);
        hash = util::hash_combine_u64(hash, geometry.normals.len() as u64);
        hash = util::hash_combine_u64(hash, geometry.uvs.len() as u64);
        hash = util::hash_combine_u64(hash, geometry.indices.len() as u64);
        hash = util::hash_combine_u64(hash, self.joints.joints.len() as u64);
        hash
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let geometry = &self.geometry;
        let mut out = Writer::default();
        out.put_u64(self.compute_hash());
        out.put_u64(geometry.positions.len() as u64);
        out.put_u64(geometry.indices.len() as u64);
        out.put_u64(self.joints.joints.len() as u64);
        out.put_u64(self.joints.weights.len() as u64);

        for position in &geometry.positions {
            out.put_vec3(*position);
        }
        for rgb in &geometry.rgbs {
            out.put_vec3(*rgb);
        }
        for normal in &geometry.normals {
            out.put_vec3(*normal);
        }
        for uv in &geometry.uvs {
            out.put_vec2(*uv);
        }
        for index in &geometry.indices {
            out.put_u32(*index);
        }
        for joint in &self.joints.joints {
            for component in joint {
                out.put_u32(*component);
            }
        }
        for weight in &self.joints.weights {
            out.put_vec4(*weight);
        }
        out.bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        let hash = reader.u64()?;
        let positions = reader.u64()? as usize;
        let indices = reader.u64()? as usize;
        let joints = reader.u64()? as usize;
        let weights = reader.u64()? as usize;
        if weights != joints {
            return Err(anyhow!(Error::CorruptAsset(format!(
                "geometry weight count {weights} != joint count {joints}"
            ))));
        }

        let mut ret = BinGeometry::default();
        for _ in 0..positions {
            ret.geometry.positions.push(reader.vec3()?);
        }
        for _ in 0..positions {
            ret.geometry.rgbs.push(reader.vec3()?);
        }
        for _ in 0..positions {
            ret.geometry.normals.push(reader.vec3()?);
        }
        for _ in 0..positions {
            ret.geometry.uvs.push(reader.vec2()?);
        }
        for _ in 0..indices {
            ret.geometry.indices.push(reader.u32()?);
        }
        for _ in 0..joints {
            ret.joints.joints.push([reader.u32()?, reader.u32()?, reader.u32()?, reader.u32()?]);
        }
        for _ in 0..weights {
            ret.joints.weights.push(reader.vec4()?);
        }

        if ret.compute_hash() != hash {
            return Err(anyhow!(Error::CorruptAsset("geometry hash mismatch".into())));
        }
        Ok(ret)
    }

    pub fn write_file(&self, path: &Path) -> Result<()> {
        Ok(std::fs::write(path, self.to_bytes())?)
    }

    pub fn read_file(path: &Path) -> Result<Self> {
        Self::from_bytes(&std::fs::read(path).map_err(|_| {
            anyhow!(Error::NotFound(format!("geometry file {}", path.display())))
        })?)
    }
}

const SAMPLER_TRANSLATE: u8 = 0;
const SAMPLER_ROTATE: u8 = 1;
const SAMPLER_SCALE: u8 = 2;
const INTERPOLATION_LINEAR: u8 = 0;
const INTERPOLATION_STEP: u8 = 1;

/// Skeletal animation clip as stored in `.bin` files.
///
/// Layout: header `{hash, sampler_count, target_count, name_length}` as u64;
/// per sampler `{type: u8, interpolation: u8, keyframe_count: u64}` followed
/// by `(timestamp: f32, value)` pairs (vec3 for translate/scale, quat for
/// rotate); target joint indices as u64; the clip name bytes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BinSkeletalAnimation {
    pub animation: SkeletalAnimation,
}

fn interpolation_code(interpolation: Interpolation) -> u8 {
    match interpolation {
        Interpolation::Linear => INTERPOLATION_LINEAR,
        Interpolation::Step => INTERPOLATION_STEP,
    }
}

fn interpolation_from(code: u8) -> Result<Interpolation> {
    match code {
        INTERPOLATION_LINEAR => Ok(Interpolation::Linear),
        INTERPOLATION_STEP => Ok(Interpolation::Step),
        other => Err(anyhow!(Error::CorruptAsset(format!("unknown interpolation {other}")))),
    }
}

impl BinSkeletalAnimation {
    pub fn new(animation: SkeletalAnimation) -> Self { Self { animation } }

    pub fn into_animation(self) -> SkeletalAnimation { self.animation }

    pub fn compute_hash(&self) -> u64 {
        let mut hash = 0u64;
        let combine_keyframes = |hash: &mut u64, interpolation, timestamps: Vec<(f32, Vec4)>| {
            *hash = util::hash_combine(*hash, &[interpolation_code(interpolation)]);
            for (timestamp, value) in timestamps {
                *hash = util::hash_combine(*hash, &timestamp.to_le_bytes());
                *hash = util::hash_combine(*hash, &value.x.to_le_bytes());
                *hash = util::hash_combine(*hash, &value.y.to_le_bytes());
                *hash = util::hash_combine(*hash, &value.z.to_le_bytes());
                *hash = util::hash_combine(*hash, &value.w.to_le_bytes());
            }
        };
        for sampler in &self.animation.samplers {
            match sampler {
                AnimationSampler::Translate(interpolator) | AnimationSampler::Scale(interpolator) => {
                    combine_keyframes(
                        &mut hash,
                        interpolator.interpolation,
                        interpolator
                            .keyframes
                            .iter()
                            .map(|keyframe| (keyframe.timestamp, keyframe.value.extend(0.0)))
                            .collect(),
                    );
                }
                AnimationSampler::Rotate(interpolator) => {
                    combine_keyframes(
                        &mut hash,
                        interpolator.interpolation,
                        interpolator
                            .keyframes
                            .iter()
                            .map(|keyframe| {
                                (keyframe.timestamp, Vec4::from(keyframe.value.to_array()))
                            })
                            .collect(),
                    );
                }
            }
        }
        for joint in &self.animation.target_joints {
            hash = util::hash_combine_u64(hash, *joint as u64);
        }
        util::hash_combine(hash, self.animation.name.as_bytes())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let animation = &self.animation;
        let mut out = Writer::default();
        out.put_u64(self.compute_hash());
        out.put_u64(animation.samplers.len() as u64);
        out.put_u64(animation.target_joints.len() as u64);
        out.put_u64(animation.name.len() as u64);

        for sampler in &animation.samplers {
            match sampler {
                AnimationSampler::Translate(interpolator) => {
                    Self::put_vec3_sampler(&mut out, SAMPLER_TRANSLATE, interpolator)
                }
                AnimationSampler::Scale(interpolator) => {
                    Self::put_vec3_sampler(&mut out, SAMPLER_SCALE, interpolator)
                }
                AnimationSampler::Rotate(interpolator) => {
                    out.put_u8(SAMPLER_ROTATE);
                    out.put_u8(interpolation_code(interpolator.interpolation));
                    out.put_u64(interpolator.keyframes.len() as u64);
                    for keyframe in &interpolator.keyframes {
                        out.put_f32(keyframe.timestamp);
                        out.put_vec4(Vec4::from(keyframe.value.to_array()));
                    }
                }
            }
        }
        for joint in &animation.target_joints {
            out.put_u64(*joint as u64);
        }
        out.bytes.extend_from_slice(animation.name.as_bytes());
        out.bytes
    }

    fn put_vec3_sampler(out: &mut Writer, ty: u8, interpolator: &Interpolator<Vec3>) {
        out.put_u8(ty);
        out.put_u8(interpolation_code(interpolator.interpolation));
        out.put_u64(interpolator.keyframes.len() as u64);
        for keyframe in &interpolator.keyframes {
            out.put_f32(keyframe.timestamp);
            out.put_vec3(keyframe.value);
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        let hash = reader.u64()?;
        let sampler_count = reader.u64()? as usize;
        let target_count = reader.u64()? as usize;
        let name_length = reader.u64()? as usize;

        let mut animation = SkeletalAnimation::default();
        for _ in 0..sampler_count {
            let ty = reader.u8()?;
            let interpolation = interpolation_from(reader.u8()?)?;
            let keyframe_count = reader.u64()? as usize;
            let sampler = match ty {
                SAMPLER_TRANSLATE | SAMPLER_SCALE => {
                    let mut interpolator = Interpolator::<Vec3> {
                        interpolation,
                        ..Default::default()
                    };
                    for _ in 0..keyframe_count {
                        interpolator.keyframes.push(Keyframe {
                            timestamp: reader.f32()?,
                            value: reader.vec3()?,
                        });
                    }
                    if ty == SAMPLER_TRANSLATE {
                        AnimationSampler::Translate(interpolator)
                    } else {
                        AnimationSampler::Scale(interpolator)
                    }
                }
                SAMPLER_ROTATE => {
                    let mut interpolator = Interpolator::<Quat> {
                        interpolation,
                        ..Default::default()
                    };
                    for _ in 0..keyframe_count {
                        let timestamp = reader.f32()?;
                        let value = reader.vec4()?;
                        interpolator.keyframes.push(Keyframe {
                            timestamp,
                            value: Quat::from_xyzw(value.x, value.y, value.z, value.w),
                        });
                    }
                    AnimationSampler::Rotate(interpolator)
                }
                other => {
                    return Err(anyhow!(Error::CorruptAsset(format!(
                        "unknown animation sampler type {other}"
                    ))))
                }
            };
            animation.samplers.push(sampler);
        }
        for _ in 0..target_count {
            animation.target_joints.push(reader.u64()? as usize);
        }
        animation.name = String::from_utf8(reader.take(name_length)?.to_vec())
            .map_err(|_| anyhow!(Error::CorruptAsset("animation name is not UTF-8".into())))?;

        let ret = Self { animation };
        if ret.compute_hash() != hash {
            return Err(anyhow!(Error::CorruptAsset("animation hash mismatch".into())));
        }
        Ok(ret)
    }

    pub fn write_file(&self, path: &Path) -> Result<()> {
        Ok(std::fs::write(path, self.to_bytes())?)
    }

    pub fn read_file(path: &Path) -> Result<Self> {
        Self::from_bytes(&std::fs::read(path).map_err(|_| {
            anyhow!(Error::NotFound(format!("animation file {}", path.display())))
        })?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> BinGeometry {
        BinGeometry {
            geometry: Geometry {
                positions: vec![
                    Vec3::new(0.0, 0.0, 0.0),
                    Vec3::new(1.0, 0.0, 0.0),
                    Vec3::new(0.0, 1.0, 0.0),
                ],
                rgbs: vec![Vec3::ONE; 3],
                normals: vec![Vec3::Z; 3],
                uvs: vec![Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0)],
                indices: vec![0, 1, 2],
            },
            joints: MeshJoints::default(),
        }
    }

    #[test]
    fn triangle_round_trips_at_expected_size() {
        let bin = triangle();
        let bytes = bin.to_bytes();
        // header (40) + 3 * (12 + 12 + 12 + 8) + 3 * 4
        assert_eq!(bytes.len(), 184);
        let read = BinGeometry::from_bytes(&bytes).unwrap();
        assert_eq!(read, bin);
        assert_eq!(read.compute_hash(), bin.compute_hash());
    }

    #[test]
    fn skinned_geometry_round_trips() {
        let mut bin = triangle();
        bin.joints.joints = vec![[0, 1, 0, 0]; 3];
        bin.joints.weights = vec![Vec4::new(0.5, 0.5, 0.0, 0.0); 3];
        let read = BinGeometry::from_bytes(&bin.to_bytes()).unwrap();
        assert_eq!(read, bin);
    }

    #[test]
    fn corrupt_position_fails_hash_check() {
        let mut bytes = triangle().to_bytes();
        bytes[48] ^= 0xff; // inside the position stream
        let err = BinGeometry::from_bytes(&bytes).unwrap_err();
        let err = err.downcast::<Error>().unwrap();
        assert!(matches!(err, Error::CorruptAsset(_)), "got {err:?}");
    }

    #[test]
    fn corrupt_header_fails() {
        let mut bytes = triangle().to_bytes();
        bytes[0] ^= 0x01; // stored hash
        assert!(BinGeometry::from_bytes(&bytes).is_err());
        let mut truncated = triangle().to_bytes();
        truncated.truncate(100);
        assert!(BinGeometry::from_bytes(&truncated).is_err());
    }

    fn walk_clip() -> BinSkeletalAnimation {
        BinSkeletalAnimation::new(SkeletalAnimation {
            name: "walk".into(),
            samplers: vec![
                AnimationSampler::Translate(Interpolator {
                    keyframes: vec![
                        Keyframe {
                            timestamp: 0.0,
                            value: Vec3::ZERO,
                        },
                        Keyframe {
                            timestamp: 1.0,
                            value: Vec3::X,
                        },
                    ],
                    interpolation: Interpolation::Linear,
                }),
                AnimationSampler::Rotate(Interpolator {
                    keyframes: vec![Keyframe {
                        timestamp: 0.5,
                        value: Quat::from_rotation_y(1.0),
                    }],
                    interpolation: Interpolation::Step,
                }),
            ],
            target_joints: vec![2, 0],
        })
    }

    #[test]
    fn animation_round_trips() {
        let bin = walk_clip();
        let read = BinSkeletalAnimation::from_bytes(&bin.to_bytes()).unwrap();
        assert_eq!(read, bin);
        assert_eq!(read.animation.name, "walk");
        assert_eq!(read.animation.target_joints, vec![2, 0]);
    }

    #[test]
    fn corrupt_animation_fails() {
        let bin = walk_clip();
        let mut bytes = bin.to_bytes();
        let last = bytes.len() - 1;
        bytes[last] = b'X'; // clip name
        assert!(BinSkeletalAnimation::from_bytes(&bytes).is_err());
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tri.bin");
        let bin = triangle();
        bin.write_file(&path).unwrap();
        assert_eq!(BinGeometry::read_file(&path).unwrap(), bin);
    }
}
