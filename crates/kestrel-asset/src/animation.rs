use glam::{Quat, Vec3};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Interpolation {
    Step,
    #[default]
    Linear,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Keyframe<T> {
    /// Seconds from the start of the clip.
    pub timestamp: f32,
    pub value: T,
}

/// Values that keyframed samplers can carry.
pub trait Animated: Copy + Default {
    fn lerp(a: Self, b: Self, t: f32) -> Self;
}

impl Animated for Vec3 {
    fn lerp(a: Self, b: Self, t: f32) -> Self { a.lerp(b, t) }
}

impl Animated for Quat {
    fn lerp(a: Self, b: Self, t: f32) -> Self { a.slerp(b, t) }
}

impl Animated for f32 {
    fn lerp(a: Self, b: Self, t: f32) -> Self { a + (b - a) * t }
}

/// Keyframed value sampled at arbitrary times.
///
/// Out-of-range times clamp to the first / last keyframe.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Interpolator<T> {
    pub keyframes: Vec<Keyframe<T>>,
    pub interpolation: Interpolation,
}

impl<T: Animated> Interpolator<T> {
    pub fn sample(&self, time: f32) -> T {
        let Some(first) = self.keyframes.first() else {
            return T::default();
        };
        if time <= first.timestamp {
            return first.value;
        }
        let last = self.keyframes.last().expect("non-empty");
        if time >= last.timestamp {
            return last.value;
        }

        let next_index = self
            .keyframes
            .iter()
            .position(|keyframe| keyframe.timestamp > time)
            .expect("time < last.timestamp");
        let previous = &self.keyframes[next_index - 1];
        let next = &self.keyframes[next_index];
        match self.interpolation {
            Interpolation::Step => previous.value,
            Interpolation::Linear => {
                let alpha =
                    (time - previous.timestamp) / (next.timestamp - previous.timestamp);
                T::lerp(previous.value, next.value, alpha)
            }
        }
    }

    pub fn duration(&self) -> f32 {
        self.keyframes.last().map_or(0.0, |keyframe| keyframe.timestamp)
    }
}

/// One animated transform channel.
#[derive(Clone, Debug, PartialEq)]
pub enum AnimationSampler {
    Translate(Interpolator<Vec3>),
    Rotate(Interpolator<Quat>),
    Scale(Interpolator<Vec3>),
}

impl AnimationSampler {
    pub fn duration(&self) -> f32 {
        match self {
            AnimationSampler::Translate(interpolator) => interpolator.duration(),
            AnimationSampler::Rotate(interpolator) => interpolator.duration(),
            AnimationSampler::Scale(interpolator) => interpolator.duration(),
        }
    }
}

/// Keyframed animation of a set of skeleton joints. `samplers` and
/// `target_joints` are parallel arrays.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SkeletalAnimation {
    pub name: String,
    pub samplers: Vec<AnimationSampler>,
    pub target_joints: Vec<usize>,
}

impl SkeletalAnimation {
    /// Max timestamp across all samplers.
    pub fn duration(&self) -> f32 {
        self.samplers
            .iter()
            .map(AnimationSampler::duration)
            .fold(0.0, f32::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear(keyframes: &[(f32, f32)]) -> Interpolator<f32> {
        Interpolator {
            keyframes: keyframes
                .iter()
                .map(|(timestamp, value)| Keyframe {
                    timestamp: *timestamp,
                    value: *value,
                })
                .collect(),
            interpolation: Interpolation::Linear,
        }
    }

    #[test]
    fn empty_returns_default() {
        let interpolator = Interpolator::<f32>::default();
        assert_eq!(interpolator.sample(1.0), 0.0);
    }

    #[test]
    fn clamps_and_lerps() {
        let interpolator = linear(&[(0.0, 0.0), (1.0, 10.0)]);
        assert_eq!(interpolator.sample(-1.0), 0.0);
        assert_eq!(interpolator.sample(0.5), 5.0);
        assert_eq!(interpolator.sample(2.0), 10.0);
    }

    #[test]
    fn step_holds_previous_keyframe() {
        let mut interpolator = linear(&[(0.0, 0.0), (1.0, 10.0)]);
        interpolator.interpolation = Interpolation::Step;
        assert_eq!(interpolator.sample(0.5), 0.0);
        assert_eq!(interpolator.sample(1.0), 10.0);
    }

    #[test]
    fn lerp_between_interior_keyframes() {
        let interpolator = linear(&[(0.0, 0.0), (1.0, 10.0), (3.0, 30.0)]);
        assert_eq!(interpolator.sample(2.0), 20.0);
    }

    #[test]
    fn quat_channel_slerps() {
        let start = Quat::IDENTITY;
        let end = Quat::from_rotation_y(std::f32::consts::FRAC_PI_2);
        let interpolator = Interpolator {
            keyframes: vec![
                Keyframe {
                    timestamp: 0.0,
                    value: start,
                },
                Keyframe {
                    timestamp: 1.0,
                    value: end,
                },
            ],
            interpolation: Interpolation::Linear,
        };
        let mid = interpolator.sample(0.5);
        let expected = Quat::from_rotation_y(std::f32::consts::FRAC_PI_4);
        assert!(mid.dot(expected).abs() > 1.0 - 1e-5);
    }

    #[test]
    fn animation_duration_is_max_across_samplers() {
        let animation = SkeletalAnimation {
            name: "walk".into(),
            samplers: vec![
                AnimationSampler::Translate(Interpolator {
                    keyframes: vec![Keyframe {
                        timestamp: 0.8,
                        value: Vec3::ZERO,
                    }],
                    interpolation: Interpolation::Linear,
                }),
                AnimationSampler::Scale(Interpolator {
                    keyframes: vec![Keyframe {
                        timestamp: 1.4,
                        value: Vec3::ONE,
                    }],
                    interpolation: Interpolation::Linear,
                }),
            ],
            target_joints: vec![0, 1],
        };
        assert_eq!(animation.duration(), 1.4);
    }
}
