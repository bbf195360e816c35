use {
    glam::{Mat4, Quat, Vec3},
    kestrel_core::Transform,
    kestrel_vk::vk,
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewPlane {
    pub near: f32,
    pub far: f32,
}

impl Default for ViewPlane {
    fn default() -> Self {
        Self {
            near: 0.1,
            far: 1000.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Projection {
    Perspective {
        field_of_view: f32,
        view_plane: ViewPlane,
    },
    Orthographic {
        view_plane: ViewPlane,
    },
}

impl Default for Projection {
    fn default() -> Self {
        Self::Perspective {
            field_of_view: 45f32.to_radians(),
            view_plane: ViewPlane::default(),
        }
    }
}

/// Which local axis the camera looks down.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Face {
    #[default]
    NegZ,
    PosZ,
}

#[derive(Clone, Debug, Default)]
pub struct Camera {
    pub name: String,
    pub transform: Transform,
    pub exposure: f32,
    pub projection: Projection,
    pub face: Face,
}

impl Camera {
    pub fn view(&self) -> Mat4 {
        let flip = match self.face {
            Face::NegZ => Mat4::IDENTITY,
            Face::PosZ => Mat4::from_quat(Quat::from_rotation_y(std::f32::consts::PI)),
        };
        (self.transform.matrix() * flip).inverse()
    }

    pub fn projection_matrix(&self, extent: vk::Extent2D) -> Mat4 {
        let width = extent.width.max(1) as f32;
        let height = extent.height.max(1) as f32;
        match self.projection {
            Projection::Perspective {
                field_of_view,
                view_plane,
            } => Mat4::perspective_rh(field_of_view, width / height, view_plane.near, view_plane.far),
            Projection::Orthographic { view_plane } => Mat4::orthographic_rh(
                -width * 0.5,
                width * 0.5,
                -height * 0.5,
                height * 0.5,
                view_plane.near,
                view_plane.far,
            ),
        }
    }

    pub fn view_projection(&self, extent: vk::Extent2D) -> Mat4 {
        self.projection_matrix(extent) * self.view()
    }

    pub fn position(&self) -> Vec3 { self.transform.position() }

    /// Orthographic camera for the UI pass; its projection matches whatever
    /// framebuffer extent it is evaluated against.
    pub fn ui() -> Self {
        Camera {
            name: "ui".into(),
            exposure: 1.0,
            projection: Projection::Orthographic {
                view_plane: ViewPlane {
                    near: -100.0,
                    far: 100.0,
                },
            },
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXTENT: vk::Extent2D = vk::Extent2D {
        width: 1280,
        height: 720,
    };

    #[test]
    fn view_is_inverse_of_transform() {
        let mut camera = Camera::default();
        camera.transform.set_position(Vec3::new(0.0, 2.0, 5.0));
        let eye = camera.view().transform_point3(Vec3::new(0.0, 2.0, 5.0));
        assert!(eye.length() < 1e-5, "camera origin should map to view origin");
    }

    #[test]
    fn perspective_depth_ordering() {
        let camera = Camera {
            exposure: 1.0,
            ..Default::default()
        };
        let view_proj = camera.view_projection(EXTENT);
        let near = view_proj.project_point3(Vec3::new(0.0, 0.0, -1.0));
        let far = view_proj.project_point3(Vec3::new(0.0, 0.0, -100.0));
        assert!(near.z < far.z, "closer points produce smaller depth");
    }

    #[test]
    fn pos_z_face_flips_forward() {
        let camera = Camera {
            face: Face::PosZ,
            ..Default::default()
        };
        // Looking down +Z, a point ahead of the camera lands in front.
        let ahead = camera.view().transform_point3(Vec3::new(0.0, 0.0, 10.0));
        assert!(ahead.z < 0.0);
    }
}
