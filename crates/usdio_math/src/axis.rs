//! Axis selection and axis-conversion matrices.
//!
//! The host scene is Z-up with -Y as the "forward" view axis. USD stages may
//! declare Y-up; export can remap to any forward/up pair.

use glam::{Mat3, Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// A signed principal axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    #[serde(rename = "X")]
    X,
    #[serde(rename = "Y")]
    Y,
    #[serde(rename = "Z")]
    Z,
    #[serde(rename = "-X")]
    NegX,
    #[serde(rename = "-Y")]
    NegY,
    #[serde(rename = "-Z")]
    NegZ,
}

impl Axis {
    /// Unit vector along this axis.
    pub fn vector(self) -> Vec3 {
        match self {
            Axis::X => Vec3::X,
            Axis::Y => Vec3::Y,
            Axis::Z => Vec3::Z,
            Axis::NegX => Vec3::NEG_X,
            Axis::NegY => Vec3::NEG_Y,
            Axis::NegZ => Vec3::NEG_Z,
        }
    }

    /// The unsigned axis letter, as used by the `upAxis` stage metadata.
    pub fn letter(self) -> &'static str {
        match self {
            Axis::X | Axis::NegX => "X",
            Axis::Y | Axis::NegY => "Y",
            Axis::Z | Axis::NegZ => "Z",
        }
    }

    /// Parse an `upAxis` token ("X", "Y" or "Z").
    pub fn from_letter(token: &str) -> Option<Axis> {
        match token {
            "X" | "x" => Some(Axis::X),
            "Y" | "y" => Some(Axis::Y),
            "Z" | "z" => Some(Axis::Z),
            _ => None,
        }
    }

    fn is_parallel(self, other: Axis) -> bool {
        self.letter() == other.letter()
    }
}

/// Rotation taking the frame `(from_forward, from_up)` onto `(to_forward, to_up)`.
///
/// Returns `None` when either pair names the same axis twice.
pub fn axis_conversion(from_forward: Axis, from_up: Axis, to_forward: Axis, to_up: Axis) -> Option<Mat3> {
    if from_forward.is_parallel(from_up) || to_forward.is_parallel(to_up) {
        return None;
    }

    let frame = |forward: Axis, up: Axis| {
        let f = forward.vector();
        let u = up.vector();
        Mat3::from_cols(f, u, f.cross(u))
    };

    // Both frames are orthonormal, so the inverse is the transpose.
    Some(frame(to_forward, to_up) * frame(from_forward, from_up).transpose())
}

/// The rotation applied to root transforms of a Y-up stage to make it Z-up.
pub fn z_up_conversion() -> Mat4 {
    Mat4::from_rotation_x(std::f32::consts::FRAC_PI_2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_letters() {
        assert_eq!(Axis::NegZ.letter(), "Z");
        assert_eq!(Axis::from_letter("Y"), Some(Axis::Y));
        assert_eq!(Axis::from_letter("W"), None);
    }

    #[test]
    fn test_z_up_conversion_maps_y_to_z() {
        let p = z_up_conversion().transform_point3(Vec3::Y);
        assert!((p - Vec3::Z).length() < 1e-5);
    }

    #[test]
    fn test_axis_conversion_identity() {
        let m = axis_conversion(Axis::Y, Axis::Z, Axis::Y, Axis::Z).unwrap();
        assert!(m.abs_diff_eq(Mat3::IDENTITY, 1e-6));
    }

    #[test]
    fn test_axis_conversion_to_y_up() {
        // Z-up/Y-forward host frame into a Y-up/-Z-forward frame.
        let m = axis_conversion(Axis::Y, Axis::Z, Axis::NegZ, Axis::Y).unwrap();
        assert!((m * Vec3::Z - Vec3::Y).length() < 1e-5);
        assert!((m * Vec3::Y - Vec3::NEG_Z).length() < 1e-5);
        assert!((m.determinant() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_axis_conversion_inverse_of_z_up() {
        let export = Mat4::from_mat3(axis_conversion(Axis::Y, Axis::Z, Axis::NegZ, Axis::Y).unwrap());
        let round_trip = z_up_conversion() * export;
        assert!(round_trip.abs_diff_eq(Mat4::IDENTITY, 1e-5));
    }

    #[test]
    fn test_axis_conversion_rejects_parallel() {
        assert!(axis_conversion(Axis::Z, Axis::NegZ, Axis::Y, Axis::Z).is_none());
    }
}
