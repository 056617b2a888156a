// Transform utilities for Mat4
//
// Extends glam::Mat4 with the helpers the scene translators need.
// Note: glam::Mat4 already provides transform_point3() and inverse()

use glam::{Mat3, Mat4, Vec3};

/// Extension trait for Mat4 to provide additional transform utilities
pub trait Mat4Ext {
    /// Uniform scale factor of the upper 3x3 part.
    ///
    /// Measured as the length of the transformed normalized `(1, 1, 1)`
    /// diagonal, so non-uniform scales give their "average" magnitude.
    fn uniform_scale(&self) -> f32;

    /// Whether every component is within `epsilon` of the identity matrix.
    fn is_identity_approx(&self, epsilon: f32) -> bool;
}

impl Mat4Ext for Mat4 {
    fn uniform_scale(&self) -> f32 {
        let unit = Vec3::splat(1.0 / 3.0f32.sqrt());
        Mat3::from_mat4(*self).mul_vec3(unit).length()
    }

    fn is_identity_approx(&self, epsilon: f32) -> bool {
        self.abs_diff_eq(Mat4::IDENTITY, epsilon)
    }
}
