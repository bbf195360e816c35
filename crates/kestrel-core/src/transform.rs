use {
    glam::{Mat4, Quat, Vec3},
    std::cell::Cell,
};

/// Affine transformation in 3D space.
///
/// Caches the combined 4x4 matrix; setters mark it dirty and `matrix()`
/// recomputes on demand.
#[derive(Debug)]
pub struct Transform {
    position: Vec3,
    orientation: Quat,
    scale: Vec3,
    matrix: Cell<Mat4>,
    dirty: Cell<bool>,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            orientation: Quat::IDENTITY,
            scale: Vec3::ONE,
            matrix: Cell::new(Mat4::IDENTITY),
            dirty: Cell::new(false),
        }
    }
}

impl Clone for Transform {
    fn clone(&self) -> Self {
        Self {
            position: self.position,
            orientation: self.orientation,
            scale: self.scale,
            matrix: Cell::new(self.matrix.get()),
            dirty: Cell::new(self.dirty.get()),
        }
    }
}

impl Transform {
    pub fn new(position: Vec3, orientation: Quat, scale: Vec3) -> Self {
        Self {
            position,
            orientation: orientation.normalize(),
            scale,
            matrix: Cell::new(Mat4::IDENTITY),
            dirty: Cell::new(true),
        }
    }

    pub fn position(&self) -> Vec3 { self.position }

    pub fn orientation(&self) -> Quat { self.orientation }

    pub fn scale(&self) -> Vec3 { self.scale }

    pub fn set_position(&mut self, position: Vec3) -> &mut Self {
        self.position = position;
        self.set_dirty()
    }

    pub fn set_orientation(&mut self, orientation: Quat) -> &mut Self {
        self.orientation = orientation.normalize();
        self.set_dirty()
    }

    pub fn set_scale(&mut self, scale: Vec3) -> &mut Self {
        self.scale = scale;
        self.set_dirty()
    }

    pub fn rotate(&mut self, radians: f32, axis: Vec3) -> &mut Self {
        self.orientation = (self.orientation * Quat::from_axis_angle(axis, radians)).normalize();
        self.set_dirty()
    }

    /// Combined scale-rotate-translate matrix, recomputed if stale.
    pub fn matrix(&self) -> Mat4 {
        if self.dirty.get() {
            self.matrix.set(Mat4::from_scale_rotation_translation(
                self.scale,
                self.orientation,
                self.position,
            ));
            self.dirty.set(false);
        }
        self.matrix.get()
    }

    pub fn is_dirty(&self) -> bool { self.dirty.get() }

    /// Reconstructs position, orientation and scale from a matrix. Only valid
    /// for matrices with positive scale and no shear.
    pub fn decompose(&mut self, matrix: Mat4) -> &mut Self {
        let (scale, orientation, position) = matrix.to_scale_rotation_translation();
        self.position = position;
        self.orientation = orientation.normalize();
        self.scale = scale;
        self.set_dirty()
    }

    pub fn from_matrix(matrix: Mat4) -> Self {
        let mut ret = Self::default();
        ret.decompose(matrix);
        ret
    }

    fn set_dirty(&mut self) -> &mut Self {
        self.dirty.set(true);
        self
    }
}

#[cfg(test)]
mod tests {
    use {super::*, std::f32::consts::FRAC_PI_2};

    fn approx(a: Vec3, b: Vec3, epsilon: f32) -> bool { (a - b).abs().max_element() < epsilon }

    #[test]
    fn matrix_recomputes_on_demand() {
        let mut transform = Transform::default();
        assert!(!transform.is_dirty());
        transform.set_position(Vec3::new(1.0, 2.0, 3.0));
        assert!(transform.is_dirty());
        let matrix = transform.matrix();
        assert!(!transform.is_dirty());
        assert_eq!(matrix.w_axis.truncate(), Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn decompose_round_trips() {
        let position = Vec3::new(2.0, 3.0, 4.0);
        let orientation = Quat::from_axis_angle(Vec3::Y, FRAC_PI_2);
        let mut transform = Transform::default();
        transform
            .set_position(position)
            .set_orientation(orientation)
            .set_scale(Vec3::ONE);

        let mut out = Transform::default();
        out.decompose(transform.matrix());

        assert!(approx(out.position(), position, 1e-6));
        assert!(approx(out.scale(), Vec3::ONE, 1e-6));
        let dot = out.orientation().dot(orientation).abs();
        assert!(dot > 1.0 - 1e-6, "orientation mismatch: dot = {dot}");
    }

    #[test]
    fn decompose_recovers_scale() {
        let mut transform = Transform::default();
        transform
            .set_position(Vec3::splat(-5.0))
            .set_scale(Vec3::new(2.0, 0.5, 3.0));
        let out = Transform::from_matrix(transform.matrix());
        assert!(approx(out.scale(), Vec3::new(2.0, 0.5, 3.0), 1e-5));
        assert!(approx(out.position(), Vec3::splat(-5.0), 1e-5));
    }
}
