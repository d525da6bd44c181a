//! Object transforms

use crate::foundation::math::{Mat3, Mat4, Vec3};

/// Translation, per-axis scale and YXZ Euler rotation of an object
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformComponent {
    /// World position
    pub translation: Vec3,
    /// Per-axis scale
    pub scale: Vec3,
    /// Rotation in radians: x is pitch, y is yaw, z is roll
    pub rotation: Vec3,
}

impl Default for TransformComponent {
    fn default() -> Self {
        Self {
            translation: Vec3::zeros(),
            scale: Vec3::new(1.0, 1.0, 1.0),
            rotation: Vec3::zeros(),
        }
    }
}

impl TransformComponent {
    /// Model matrix: `translate * Ry * Rx * Rz * scale`
    #[rustfmt::skip]
    pub fn mat4(&self) -> Mat4 {
        let (s1, c1) = self.rotation.y.sin_cos();
        let (s2, c2) = self.rotation.x.sin_cos();
        let (s3, c3) = self.rotation.z.sin_cos();
        let s = self.scale;
        let t = self.translation;

        Mat4::new(
            s.x * (c1 * c3 + s1 * s2 * s3), s.y * (c3 * s1 * s2 - c1 * s3), s.z * (c2 * s1), t.x,
            s.x * (c2 * s3),                s.y * (c2 * c3),                s.z * (-s2),     t.y,
            s.x * (c1 * s2 * s3 - c3 * s1), s.y * (c1 * c3 * s2 + s1 * s3), s.z * (c1 * c2), t.z,
            0.0,                            0.0,                            0.0,             1.0,
        )
    }

    /// Inverse transpose of the model matrix's upper 3x3
    ///
    /// A zero scale component yields non-finite entries on that axis.
    #[rustfmt::skip]
    pub fn normal_matrix(&self) -> Mat3 {
        let (s1, c1) = self.rotation.y.sin_cos();
        let (s2, c2) = self.rotation.x.sin_cos();
        let (s3, c3) = self.rotation.z.sin_cos();
        let inv = Vec3::new(1.0 / self.scale.x, 1.0 / self.scale.y, 1.0 / self.scale.z);

        Mat3::new(
            inv.x * (c1 * c3 + s1 * s2 * s3), inv.y * (c3 * s1 * s2 - c1 * s3), inv.z * (c2 * s1),
            inv.x * (c2 * s3),                inv.y * (c2 * c3),                inv.z * (-s2),
            inv.x * (c1 * s2 * s3 - c3 * s1), inv.y * (c1 * c3 * s2 + s1 * s3), inv.z * (c1 * c2),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_default_is_identity() {
        let transform = TransformComponent::default();
        assert_relative_eq!(transform.mat4(), Mat4::identity());
        assert_relative_eq!(transform.normal_matrix(), Mat3::identity());
    }

    #[test]
    fn test_yaw_quarter_turn() {
        let transform = TransformComponent {
            rotation: Vec3::new(0.0, FRAC_PI_2, 0.0),
            ..Default::default()
        };
        let x = transform.mat4() * crate::foundation::math::Vec4::new(1.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(x.xyz(), Vec3::new(0.0, 0.0, -1.0), epsilon = 1e-6);
    }

    #[test]
    fn test_translation_and_scale() {
        let transform = TransformComponent {
            translation: Vec3::new(1.0, 2.0, 3.0),
            scale: Vec3::new(2.0, 2.0, 2.0),
            rotation: Vec3::zeros(),
        };
        let p = transform.mat4().transform_point(&nalgebra::Point3::new(1.0, 1.0, 1.0));
        assert_relative_eq!(p.coords, Vec3::new(3.0, 4.0, 5.0));
    }

    #[test]
    fn test_normal_matrix_is_inverse_transpose() {
        let transform = TransformComponent {
            translation: Vec3::new(-4.0, 0.5, 9.0),
            scale: Vec3::new(0.5, 3.0, 1.5),
            rotation: Vec3::new(0.3, -1.2, 2.1),
        };
        let upper: Mat3 = transform.mat4().fixed_view::<3, 3>(0, 0).into_owned();
        let expected = upper.try_inverse().unwrap().transpose();
        assert_relative_eq!(transform.normal_matrix(), expected, epsilon = 1e-5);
    }
}
