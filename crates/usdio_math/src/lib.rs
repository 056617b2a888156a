// Re-export glam for convenience
pub use glam::*;

// usdio math types
mod axis;
mod transform;

pub use axis::{axis_conversion, z_up_conversion, Axis};
pub use transform::Mat4Ext;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec3_creation() {
        let v = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(v.x, 1.0);
        assert_eq!(v.y, 2.0);
        assert_eq!(v.z, 3.0);
    }

    #[test]
    fn test_dmat4_narrowing() {
        let m = DMat4::from_translation(DVec3::new(1.0, 2.0, 3.0));
        let narrowed = m.as_mat4();
        assert_eq!(narrowed.w_axis.truncate(), Vec3::new(1.0, 2.0, 3.0));
    }
}
