//! # Camera
//!
//! Projection and view matrices for a Vulkan-style clip space: depth in
//! `0..1` and world up along `-Y`.
//!
//! The view matrix rows are the camera basis (right, up, forward), so the
//! basis vectors can be read straight back out of it.
//!
//! Degenerate inputs never produce NaN: a zero view direction keeps the
//! previous view, an up vector parallel to the view direction is swapped for
//! another axis, and an invalid projection keeps the previous projection.

use crate::foundation::math::{Mat4, Vec3, DEGENERATE_EPSILON};

/// World up used when none is given
pub const DEFAULT_UP: Vec3 = Vec3::new(0.0, -1.0, 0.0);

/// Camera holding its projection, view and position
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    projection: Mat4,
    view: Mat4,
    position: Vec3,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}

impl Camera {
    /// Camera at the origin with identity matrices
    pub fn new() -> Self {
        Self {
            projection: Mat4::identity(),
            view: Mat4::identity(),
            position: Vec3::zeros(),
        }
    }

    /// Camera at `position` looking at `target`
    pub fn looking_at(position: Vec3, target: Vec3) -> Self {
        let mut camera = Self::new();
        camera.set_view_target(position, target, DEFAULT_UP);
        camera
    }

    /// Orthographic projection of the given box
    pub fn set_orthographic_projection(
        &mut self,
        left: f32,
        right: f32,
        top: f32,
        bottom: f32,
        near: f32,
        far: f32,
    ) {
        let width = right - left;
        let height = bottom - top;
        let depth = far - near;
        if width.abs() <= DEGENERATE_EPSILON
            || height.abs() <= DEGENERATE_EPSILON
            || depth.abs() <= DEGENERATE_EPSILON
        {
            log::warn!("Ignoring degenerate orthographic projection");
            return;
        }

        let mut projection = Mat4::identity();
        projection[(0, 0)] = 2.0 / width;
        projection[(1, 1)] = 2.0 / height;
        projection[(2, 2)] = 1.0 / depth;
        projection[(0, 3)] = -(right + left) / width;
        projection[(1, 3)] = -(bottom + top) / height;
        projection[(2, 3)] = -near / depth;
        self.projection = projection;
    }

    /// Perspective projection with vertical field of view `fovy` in radians
    pub fn set_perspective_projection(&mut self, fovy: f32, aspect: f32, near: f32, far: f32) {
        let tan_half_fovy = (fovy / 2.0).tan();
        if !aspect.is_finite()
            || aspect.abs() <= DEGENERATE_EPSILON
            || !tan_half_fovy.is_finite()
            || tan_half_fovy.abs() <= DEGENERATE_EPSILON
            || (far - near).abs() <= DEGENERATE_EPSILON
        {
            log::warn!("Ignoring degenerate perspective projection (aspect {aspect}, fovy {fovy})");
            return;
        }

        let mut projection = Mat4::zeros();
        projection[(0, 0)] = 1.0 / (aspect * tan_half_fovy);
        projection[(1, 1)] = 1.0 / tan_half_fovy;
        projection[(2, 2)] = far / (far - near);
        projection[(3, 2)] = 1.0;
        projection[(2, 3)] = -(far * near) / (far - near);
        self.projection = projection;
    }

    /// Look from `position` along `direction`
    pub fn set_view_direction(&mut self, position: Vec3, direction: Vec3, up: Vec3) {
        if !position.iter().chain(direction.iter()).chain(up.iter()).all(|c| c.is_finite())
            || direction.norm_squared() <= DEGENERATE_EPSILON
        {
            log::debug!("Keeping previous view for degenerate direction {direction:?}");
            return;
        }

        let w = direction.normalize();
        let mut right = w.cross(&up);
        if right.norm_squared() <= DEGENERATE_EPSILON {
            right = w.cross(&fallback_up(&w));
        }
        let u = right.normalize();
        let v = w.cross(&u);

        self.position = position;
        self.view = basis_view(&u, &v, &w, &position);
    }

    /// Look from `position` at `target`
    pub fn set_view_target(&mut self, position: Vec3, target: Vec3, up: Vec3) {
        self.set_view_direction(position, target - position, up);
    }

    /// Orient with Tait-Bryan angles applied in Y, X, Z order
    pub fn set_view_yxz(&mut self, position: Vec3, rotation: Vec3) {
        if !position.iter().chain(rotation.iter()).all(|c| c.is_finite()) {
            log::debug!("Keeping previous view for non-finite orientation");
            return;
        }

        let (s3, c3) = rotation.z.sin_cos();
        let (s2, c2) = rotation.x.sin_cos();
        let (s1, c1) = rotation.y.sin_cos();
        let u = Vec3::new(c1 * c3 + s1 * s2 * s3, c2 * s3, c1 * s2 * s3 - c3 * s1);
        let v = Vec3::new(c3 * s1 * s2 - c1 * s3, c2 * c3, c1 * c3 * s2 + s1 * s3);
        let w = Vec3::new(c2 * s1, -s2, c1 * c2);

        self.position = position;
        self.view = basis_view(&u, &v, &w, &position);
    }

    /// Forward direction in world space
    pub fn view_dir(&self) -> Vec3 {
        self.view_row(2)
    }

    /// Right direction in world space
    pub fn right_dir(&self) -> Vec3 {
        self.view_row(0)
    }

    /// Up direction in world space
    pub fn up_dir(&self) -> Vec3 {
        self.view_row(1)
    }

    /// Position in world space
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Projection matrix
    pub fn projection(&self) -> &Mat4 {
        &self.projection
    }

    /// View matrix
    pub fn view(&self) -> &Mat4 {
        &self.view
    }

    fn view_row(&self, row: usize) -> Vec3 {
        Vec3::new(self.view[(row, 0)], self.view[(row, 1)], self.view[(row, 2)])
    }
}

fn fallback_up(forward: &Vec3) -> Vec3 {
    // Least aligned world axis
    let abs = forward.abs();
    if abs.x <= abs.y && abs.x <= abs.z {
        Vec3::x()
    } else if abs.z <= abs.y {
        Vec3::z()
    } else {
        DEFAULT_UP
    }
}

#[rustfmt::skip]
fn basis_view(u: &Vec3, v: &Vec3, w: &Vec3, position: &Vec3) -> Mat4 {
    Mat4::new(
        u.x, u.y, u.z, -u.dot(position),
        v.x, v.y, v.z, -v.dot(position),
        w.x, w.y, w.z, -w.dot(position),
        0.0, 0.0, 0.0, 1.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{is_finite_matrix, Vec4};
    use approx::assert_relative_eq;

    #[test]
    fn test_view_target_maps_target_onto_forward_axis() {
        let camera = Camera::looking_at(Vec3::new(0.0, 0.0, -5.0), Vec3::zeros());
        let target = camera.view() * Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(target.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(target.y, 0.0, epsilon = 1e-5);
        assert_relative_eq!(target.z, 5.0, epsilon = 1e-5);
        assert_relative_eq!(camera.view_dir(), Vec3::new(0.0, 0.0, 1.0), epsilon = 1e-6);
    }

    #[test]
    fn test_basis_is_orthonormal() {
        let camera = Camera::looking_at(Vec3::new(3.0, -2.0, 7.0), Vec3::new(-1.0, 0.5, 0.0));
        let (u, v, w) = (camera.right_dir(), camera.up_dir(), camera.view_dir());
        assert_relative_eq!(u.norm(), 1.0, epsilon = 1e-5);
        assert_relative_eq!(v.norm(), 1.0, epsilon = 1e-5);
        assert_relative_eq!(u.dot(&v), 0.0, epsilon = 1e-5);
        assert_relative_eq!(u.dot(&w), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_zero_direction_keeps_previous_view() {
        let mut camera = Camera::looking_at(Vec3::new(0.0, 0.0, -5.0), Vec3::zeros());
        let before = *camera.view();
        camera.set_view_direction(Vec3::new(1.0, 1.0, 1.0), Vec3::zeros(), DEFAULT_UP);
        assert_eq!(*camera.view(), before);
        assert_eq!(camera.position(), Vec3::new(0.0, 0.0, -5.0));
    }

    #[test]
    fn test_non_finite_up_keeps_previous_view() {
        let mut camera = Camera::looking_at(Vec3::new(0.0, 0.0, -5.0), Vec3::zeros());
        let before = *camera.view();
        camera.set_view_direction(
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(0.0, f32::NAN, 0.0),
        );
        assert_eq!(*camera.view(), before);
        assert!(is_finite_matrix(camera.view()));
        assert_eq!(camera.position(), Vec3::new(0.0, 0.0, -5.0));
    }

    #[test]
    fn test_up_parallel_to_direction_stays_finite() {
        let mut camera = Camera::new();
        camera.set_view_direction(Vec3::zeros(), Vec3::new(0.0, -3.0, 0.0), DEFAULT_UP);
        assert!(is_finite_matrix(camera.view()));
        assert_relative_eq!(camera.view_dir(), Vec3::new(0.0, -1.0, 0.0), epsilon = 1e-6);
    }

    #[test]
    fn test_perspective_depth_range() {
        let mut camera = Camera::new();
        camera.set_perspective_projection(50f32.to_radians(), 4.0 / 3.0, 0.1, 100.0);
        let near = camera.projection() * Vec4::new(0.0, 0.0, 0.1, 1.0);
        let far = camera.projection() * Vec4::new(0.0, 0.0, 100.0, 1.0);
        assert_relative_eq!(near.z / near.w, 0.0, epsilon = 1e-5);
        assert_relative_eq!(far.z / far.w, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_zero_aspect_keeps_projection() {
        let mut camera = Camera::new();
        camera.set_perspective_projection(1.0, 1.0, 0.1, 10.0);
        let before = *camera.projection();
        camera.set_perspective_projection(1.0, 0.0, 0.1, 10.0);
        assert_eq!(*camera.projection(), before);
    }

    #[test]
    fn test_orthographic_maps_box_to_clip_volume() {
        let mut camera = Camera::new();
        camera.set_orthographic_projection(-2.0, 2.0, -1.0, 1.0, 0.0, 10.0);
        let corner = camera.projection() * Vec4::new(2.0, 1.0, 10.0, 1.0);
        assert_relative_eq!(corner, Vec4::new(1.0, 1.0, 1.0, 1.0), epsilon = 1e-6);
    }

    #[test]
    fn test_yxz_identity_rotation() {
        let mut camera = Camera::new();
        camera.set_view_yxz(Vec3::new(1.0, 2.0, 3.0), Vec3::zeros());
        assert_relative_eq!(camera.right_dir(), Vec3::x(), epsilon = 1e-6);
        assert_relative_eq!(camera.up_dir(), Vec3::y(), epsilon = 1e-6);
        assert_relative_eq!(camera.view_dir(), Vec3::z(), epsilon = 1e-6);
        assert_relative_eq!(camera.view()[(0, 3)], -1.0, epsilon = 1e-6);
    }
}
