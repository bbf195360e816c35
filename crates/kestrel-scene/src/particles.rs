use {
    crate::entity::{Component, ComponentCtx, RenderCtx},
    glam::{Quat, Vec2, Vec3},
    kestrel_asset::{providers::UI_MATERIAL, AlphaMode, Geometry, GpuGeometry},
    kestrel_core::{Rgba, Uri},
    kestrel_gfx::{DrawItem, RenderList},
    kestrel_vk::Gpu,
    rand::Rng,
    rand_pcg::Pcg32,
    std::{any::Any, sync::Arc},
};

pub const PARTICLE_SYSTEM: &str = "particle_system";

#[derive(Clone, Copy, Debug)]
pub struct Range<T> {
    pub lo: T,
    pub hi: T,
}

impl<T: Copy> Range<T> {
    pub fn new(lo: T, hi: T) -> Self { Self { lo, hi } }

    pub fn fixed(value: T) -> Self { Self { lo: value, hi: value } }
}

#[derive(Clone, Debug)]
pub struct EmitterConfig {
    pub count: usize,
    pub quad_size: Vec2,
    pub initial_position: Range<Vec3>,
    pub linear_velocity: Range<Vec3>,
    /// Radians per second around the view axis.
    pub angular_velocity: Range<f32>,
    /// Particle lifetime in seconds.
    pub ttl: Range<f32>,
    /// Scale over a particle's lifetime.
    pub lerp_scale: Range<f32>,
    /// Tint over a particle's lifetime (RGB; the fade rides the color).
    pub lerp_tint: Range<Rgba>,
    pub material: Uri,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            count: 64,
            quad_size: Vec2::splat(0.25),
            initial_position: Range::fixed(Vec3::ZERO),
            linear_velocity: Range::new(Vec3::new(-1.0, 0.5, -1.0), Vec3::new(1.0, 2.0, 1.0)),
            angular_velocity: Range::new(-1.0, 1.0),
            ttl: Range::new(1.0, 4.0),
            lerp_scale: Range::new(1.0, 0.0),
            lerp_tint: Range::new(Rgba::WHITE, Rgba::BLACK),
            material: Uri::from(UI_MATERIAL),
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct Particle {
    position: Vec3,
    rotation: f32,
    scale: f32,
    velocity: Vec3,
    angular: f32,
    ttl: f32,
    elapsed: f32,
}

impl Particle {
    fn life(&self) -> f32 {
        if self.ttl <= 0.0 {
            1.0
        } else {
            (self.elapsed / self.ttl).clamp(0.0, 1.0)
        }
    }
}

fn random_vec3(rng: &mut Pcg32, range: Range<Vec3>) -> Vec3 {
    let sample = |rng: &mut Pcg32, lo: f32, hi: f32| {
        if lo == hi {
            lo
        } else {
            rng.random_range(lo.min(hi)..=lo.max(hi))
        }
    };
    Vec3::new(
        sample(rng, range.lo.x, range.hi.x),
        sample(rng, range.lo.y, range.hi.y),
        sample(rng, range.lo.z, range.hi.z),
    )
}

fn random_f32(rng: &mut Pcg32, range: Range<f32>) -> f32 {
    if range.lo == range.hi {
        range.lo
    } else {
        rng.random_range(range.lo.min(range.hi)..=range.lo.max(range.hi))
    }
}

/// One particle pool billboarded toward the camera, drawn as a single
/// transparent primitive whose position/color streams are rewritten in
/// place each tick.
pub struct ParticleEmitter {
    pub config: EmitterConfig,
    particles: Vec<Particle>,
    geometry: Option<Arc<GpuGeometry>>,
    rng: Pcg32,
}

impl ParticleEmitter {
    pub fn new(config: EmitterConfig, seed: u64) -> Self {
        Self {
            config,
            particles: Vec::new(),
            geometry: None,
            rng: Pcg32::new(seed, 0xa02b_dbf7_bb3c_0a7),
        }
    }

    pub fn particle_count(&self) -> usize { self.particles.len() }

    fn spawn(&mut self) -> Particle {
        Particle {
            position: random_vec3(&mut self.rng, self.config.initial_position),
            rotation: 0.0,
            scale: self.config.lerp_scale.lo,
            velocity: random_vec3(&mut self.rng, self.config.linear_velocity),
            angular: random_f32(&mut self.rng, self.config.angular_velocity),
            ttl: random_f32(&mut self.rng, self.config.ttl),
            elapsed: 0.0,
        }
    }

    /// Pool upkeep + integration; pure CPU so it is testable headless.
    fn simulate(&mut self, dt: f32) {
        let count = self.config.count;
        if self.particles.len() > count {
            self.particles.truncate(count);
        }
        while self.particles.len() < count {
            let particle = self.spawn();
            self.particles.push(particle);
        }

        for index in 0..self.particles.len() {
            let mut particle = self.particles[index];
            particle.elapsed += dt;
            if particle.elapsed >= particle.ttl {
                particle = self.spawn();
            }
            let life = particle.life();
            particle.position += particle.velocity * dt;
            particle.rotation += particle.angular * dt;
            particle.scale =
                self.config.lerp_scale.lo + (self.config.lerp_scale.hi - self.config.lerp_scale.lo) * life;
            self.particles[index] = particle;
        }
    }

    /// Writes billboarded quads into the shared geometry's position and
    /// color streams.
    fn mirror(&mut self, gpu: &Gpu, view: Quat) {
        let count = self.config.count;
        let rebuild = self
            .geometry
            .as_ref()
            .map_or(true, |geometry| geometry.vertex_count as usize != count * 4);
        if rebuild {
            let mut base = Geometry::default();
            for _ in 0..count {
                let offset = base.positions.len() as u32;
                let quad = Geometry::quad();
                base.positions.extend_from_slice(&quad.positions);
                base.rgbs.extend_from_slice(&quad.rgbs);
                base.normals.extend_from_slice(&quad.normals);
                base.uvs.extend_from_slice(&quad.uvs);
                base.indices.extend(quad.indices.iter().map(|index| index + offset));
            }
            match GpuGeometry::upload(gpu, &base, None, "particles") {
                Ok(geometry) => self.geometry = Some(Arc::new(geometry)),
                Err(e) => {
                    log::warn!("Particle geometry unavailable: {e}");
                    return;
                }
            }
        }
        let Some(geometry) = &self.geometry else {
            return;
        };

        let mut positions = Vec::with_capacity(count * 4);
        let mut rgbs = Vec::with_capacity(count * 4);
        let half = 0.5 * self.config.quad_size;
        let corners = [
            Vec3::new(-half.x, half.y, 0.0),
            Vec3::new(half.x, half.y, 0.0),
            Vec3::new(half.x, -half.y, 0.0),
            Vec3::new(-half.x, -half.y, 0.0),
        ];
        for particle in &self.particles {
            let orientation = view * Quat::from_rotation_z(particle.rotation);
            let life = particle.life();
            let lo = self.config.lerp_tint.lo.to_linear().truncate();
            let hi = self.config.lerp_tint.hi.to_linear().truncate();
            let tint = lo.lerp(hi, life);
            for corner in corners {
                positions.push(orientation * (corner * particle.scale) + particle.position);
                rgbs.push(tint);
            }
        }

        let positions_bytes: &[u8] = bytemuck::cast_slice(&positions);
        let rgbs_bytes: &[u8] = bytemuck::cast_slice(&rgbs);
        if let Err(e) = geometry
            .vertices
            .write(geometry.stream_offsets[0], positions_bytes)
            .and_then(|_| geometry.vertices.write(geometry.stream_offsets[1], rgbs_bytes))
        {
            log::warn!("Particle stream update failed: {e}");
        }
    }
}

/// Component owning a set of emitters; billboards follow the scene camera.
pub struct ParticleSystem {
    pub emitters: Vec<ParticleEmitter>,
}

impl ParticleSystem {
    pub fn new(emitters: Vec<ParticleEmitter>) -> Self { Self { emitters } }
}

impl Component for ParticleSystem {
    fn type_name(&self) -> &'static str { PARTICLE_SYSTEM }

    fn tick(&mut self, ctx: &mut ComponentCtx) {
        let view = ctx.camera_orientation;
        for emitter in &mut self.emitters {
            emitter.simulate(ctx.dt);
            let gpu = Arc::clone(ctx.providers.gpu());
            emitter.mirror(&gpu, view);
        }
    }

    fn render(&mut self, ctx: &mut RenderCtx, list: &mut RenderList) {
        let Some(world) = ctx.nodes.global_transform_of(ctx.node) else {
            return;
        };
        for emitter in &self.emitters {
            let Some(geometry) = &emitter.geometry else {
                continue;
            };
            list.push(
                DrawItem {
                    geometry: Arc::clone(geometry),
                    topology: Default::default(),
                    material: emitter.config.material.clone(),
                    matrix: world,
                    instances: Vec::new(),
                    joints: None,
                },
                AlphaMode::Blend,
            );
        }
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "type": PARTICLE_SYSTEM,
            "emitters": self.emitters.len(),
        })
    }

    fn as_any(&self) -> &dyn Any { self }

    fn as_any_mut(&mut self) -> &mut dyn Any { self }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emitter(count: usize) -> ParticleEmitter {
        ParticleEmitter::new(
            EmitterConfig {
                count,
                ttl: Range::new(1.0, 2.0),
                ..Default::default()
            },
            7,
        )
    }

    #[test]
    fn pool_tracks_configured_count() {
        let mut emitter = emitter(8);
        emitter.simulate(0.016);
        assert_eq!(emitter.particle_count(), 8);

        emitter.config.count = 3;
        emitter.simulate(0.016);
        assert_eq!(emitter.particle_count(), 3);

        emitter.config.count = 16;
        emitter.simulate(0.016);
        assert_eq!(emitter.particle_count(), 16);
    }

    #[test]
    fn expired_particles_respawn() {
        let mut emitter = emitter(4);
        emitter.simulate(0.016);
        // Push everything past its ttl in one step.
        emitter.simulate(10.0);
        for particle in &emitter.particles {
            assert!(particle.elapsed < 1.0, "respawned particles restart their clocks");
            assert!(particle.ttl >= 1.0 && particle.ttl <= 2.0);
        }
    }

    #[test]
    fn integration_moves_particles() {
        let mut emitter = ParticleEmitter::new(
            EmitterConfig {
                count: 1,
                initial_position: Range::fixed(Vec3::ZERO),
                linear_velocity: Range::fixed(Vec3::X),
                angular_velocity: Range::fixed(0.0),
                ttl: Range::fixed(100.0),
                ..Default::default()
            },
            1,
        );
        emitter.simulate(1.0);
        emitter.simulate(1.0);
        let particle = emitter.particles[0];
        assert!((particle.position.x - 2.0).abs() < 1e-5);
    }

    #[test]
    fn seeded_emitters_are_deterministic() {
        let mut a = emitter(4);
        let mut b = emitter(4);
        a.simulate(0.5);
        b.simulate(0.5);
        for (pa, pb) in a.particles.iter().zip(&b.particles) {
            assert_eq!(pa.position, pb.position);
            assert_eq!(pa.ttl, pb.ttl);
        }
    }
}
