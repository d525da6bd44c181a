//! GPU-side uniform blocks
//!
//! Layouts follow std140: every vec3 occupies a full 16-byte slot.

use bytemuck::{Pod, Zeroable};

use crate::foundation::math::to_cols_array;
use crate::scene::Camera;

/// Per-frame data shared by every shader (set 0, binding 0)
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct GlobalUbo {
    /// Projection matrix, column-major
    pub projection: [[f32; 4]; 4],
    /// View matrix, column-major
    pub view: [[f32; 4]; 4],
    /// Point light position (xyz, w unused)
    pub light_position: [f32; 4],
    /// Point light color (rgb, w unused)
    pub light_color: [f32; 4],
    /// Camera position in world space (xyz, w unused)
    pub view_position: [f32; 4],
}

impl Default for GlobalUbo {
    fn default() -> Self {
        let identity = [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ];
        Self {
            projection: identity,
            view: identity,
            light_position: [0.0, -4.0, 0.0, 0.0],
            light_color: [150.0, 150.0, 150.0, 0.0],
            view_position: [0.0; 4],
        }
    }
}

impl GlobalUbo {
    /// Default lighting with the camera's matrices and position
    pub fn from_camera(camera: &Camera) -> Self {
        let position = camera.position();
        Self {
            projection: to_cols_array(camera.projection()),
            view: to_cols_array(camera.view()),
            view_position: [position.x, position.y, position.z, 0.0],
            ..Self::default()
        }
    }
}

/// Per-material block (set 1)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MaterialUbo {
    /// Base color
    pub albedo: [f32; 3],
    /// Metalness
    pub metallic: f32,
    /// Roughness
    pub roughness: f32,
    /// Ambient occlusion
    pub ao: f32,
    /// Pads the block to 16 bytes
    pub _padding: [f32; 2],
}

impl Default for MaterialUbo {
    fn default() -> Self {
        Self {
            albedo: [1.0; 3],
            metallic: 1.0,
            roughness: 1.0,
            ao: 1.0,
            _padding: [0.0; 2],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_sizes() {
        assert_eq!(std::mem::size_of::<GlobalUbo>(), 176);
        assert_eq!(std::mem::size_of::<MaterialUbo>(), 32);
        assert_eq!(std::mem::size_of::<GlobalUbo>() % 16, 0);
    }

    #[test]
    fn test_from_camera_copies_position() {
        let mut camera = Camera::new();
        camera.set_view_yxz(crate::foundation::math::Vec3::new(1.0, 2.0, 3.0), crate::foundation::math::Vec3::zeros());
        let ubo = GlobalUbo::from_camera(&camera);
        assert_eq!(ubo.view_position, [1.0, 2.0, 3.0, 0.0]);
        assert_eq!(ubo.light_position, [0.0, -4.0, 0.0, 0.0]);
    }
}
