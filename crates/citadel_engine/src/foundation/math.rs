//! Math utilities and types
//!
//! Provides fundamental math types for 3D graphics plus the small set of
//! helpers the renderer needs (Vulkan-style projection, upload conversion).

pub use nalgebra::{Matrix3, Matrix4, Vector2, Vector3, Vector4};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// Common math constants
pub mod constants {
    /// Archimedes' constant
    pub const PI: f32 = std::f32::consts::PI;
}

/// Build a perspective projection matrix for Vulkan clip space.
///
/// Vulkan's clip space has Y pointing down and Z in [0, 1], so the standard
/// OpenGL-style projection is corrected here rather than in every shader.
pub fn perspective_vk(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
    let f = 1.0 / (0.5 * fov_y).tan();
    let mut m = Mat4::zeros();
    m[(0, 0)] = f / aspect;
    m[(1, 1)] = -f;
    m[(2, 2)] = far / (near - far);
    m[(2, 3)] = (near * far) / (near - far);
    m[(3, 2)] = -1.0;
    m
}

/// Convert a matrix to the row-major layout constant buffers expect.
///
/// Shaders multiply with row vectors (`v * M`), so every matrix is transposed
/// once on upload instead of per-vertex in the shader.
pub fn to_upload(m: &Mat4) -> [[f32; 4]; 4] {
    m.transpose().into()
}

/// Scale matrix from three factors.
pub fn scaling(x: f32, y: f32, z: f32) -> Mat4 {
    Mat4::new_nonuniform_scaling(&Vec3::new(x, y, z))
}

/// Translation matrix.
pub fn translation(x: f32, y: f32, z: f32) -> Mat4 {
    Mat4::new_translation(&Vec3::new(x, y, z))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_upload_is_transposed() {
        let m = translation(1.0, 2.0, 3.0);
        let rows = to_upload(&m);
        // Translation lives in the last column; after the transpose it is the
        // last row of the uploaded layout.
        assert_relative_eq!(rows[3][0], 1.0);
        assert_relative_eq!(rows[3][1], 2.0);
        assert_relative_eq!(rows[3][2], 3.0);
        assert_relative_eq!(rows[3][3], 1.0);
    }

    #[test]
    fn test_perspective_maps_near_to_zero_depth() {
        let near = 1.0;
        let far = 1000.0;
        let proj = perspective_vk(constants::PI / 4.0, 16.0 / 9.0, near, far);

        let p_near = proj * Vec4::new(0.0, 0.0, -near, 1.0);
        assert_relative_eq!(p_near.z / p_near.w, 0.0, epsilon = 1e-6);

        let p_far = proj * Vec4::new(0.0, 0.0, -far, 1.0);
        assert_relative_eq!(p_far.z / p_far.w, 1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_scaling_composes_with_translation() {
        let world = translation(0.0, 25.0, -90.0) * scaling(54.0, 30.0, 1.5);
        let p = world * Vec4::new(1.0, 1.0, 1.0, 1.0);
        assert_relative_eq!(p.x, 54.0);
        assert_relative_eq!(p.y, 55.0);
        assert_relative_eq!(p.z, -88.5);
    }
}
