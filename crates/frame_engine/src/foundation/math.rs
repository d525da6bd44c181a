//! Math utilities and types
//!
//! Thin aliases over `nalgebra` used by the camera and scene code.

pub use nalgebra::{Matrix3, Matrix4, Rotation3, Unit, Vector3, Vector4};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// Squared-length threshold below which a vector is treated as zero
pub const DEGENERATE_EPSILON: f32 = f32::EPSILON;

/// Returns true when every component of the matrix is finite
pub fn is_finite_matrix(matrix: &Mat4) -> bool {
    matrix.iter().all(|value| value.is_finite())
}

/// Convert a matrix into the column-major array layout expected by GLSL
pub fn to_cols_array(matrix: &Mat4) -> [[f32; 4]; 4] {
    let mut columns = [[0.0; 4]; 4];
    for (col, column) in columns.iter_mut().enumerate() {
        for (row, value) in column.iter_mut().enumerate() {
            *value = matrix[(row, col)];
        }
    }
    columns
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cols_array_is_column_major() {
        let mut matrix = Mat4::identity();
        matrix[(0, 3)] = 5.0; // translation x lives in column 3
        let columns = to_cols_array(&matrix);
        assert_eq!(columns[3][0], 5.0);
        assert_eq!(columns[0][3], 0.0);
    }

    #[test]
    fn test_finite_matrix_detection() {
        let mut matrix = Mat4::identity();
        assert!(is_finite_matrix(&matrix));
        matrix[(1, 2)] = f32::NAN;
        assert!(!is_finite_matrix(&matrix));
        matrix[(1, 2)] = f32::INFINITY;
        assert!(!is_finite_matrix(&matrix));
    }
}
