//! Transform operations (`xformOp:*`) and their evaluation.

use usdio_math::{DMat4, DQuat, DVec3, EulerRot};

use super::stage::Prim;
use super::value::{TimeCode, Value};

/// Name of the attribute listing the ordered transform operations.
pub const XFORM_OP_ORDER: &str = "xformOpOrder";

const XFORM_OP_PREFIX: &str = "xformOp:";
const INVERT_PREFIX: &str = "!invert!";
const RESET_XFORM_STACK: &str = "!resetXformStack!";

/// Kind of a transform operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum XformOpKind {
    Translate,
    Scale,
    RotateX,
    RotateY,
    RotateZ,
    RotateXYZ,
    RotateXZY,
    RotateYXZ,
    RotateYZX,
    RotateZXY,
    RotateZYX,
    Orient,
    Transform,
}

impl XformOpKind {
    fn from_token(token: &str) -> Option<XformOpKind> {
        Some(match token {
            "translate" => XformOpKind::Translate,
            "scale" => XformOpKind::Scale,
            "rotateX" => XformOpKind::RotateX,
            "rotateY" => XformOpKind::RotateY,
            "rotateZ" => XformOpKind::RotateZ,
            "rotateXYZ" => XformOpKind::RotateXYZ,
            "rotateXZY" => XformOpKind::RotateXZY,
            "rotateYXZ" => XformOpKind::RotateYXZ,
            "rotateYZX" => XformOpKind::RotateYZX,
            "rotateZXY" => XformOpKind::RotateZXY,
            "rotateZYX" => XformOpKind::RotateZYX,
            "orient" => XformOpKind::Orient,
            "transform" => XformOpKind::Transform,
            _ => return None,
        })
    }
}

/// One entry of an `xformOpOrder` list.
#[derive(Clone, Debug, PartialEq)]
pub struct XformOp {
    pub kind: XformOpKind,
    /// The attribute holding the op value, e.g. `xformOp:translate:pivot`.
    pub attr_name: String,
    /// `!invert!` ops apply the inverse of their value.
    pub inverse: bool,
}

impl XformOp {
    /// Parse an op token such as `xformOp:rotateXYZ` or
    /// `!invert!xformOp:translate:pivot`.
    pub fn parse(token: &str) -> Option<XformOp> {
        let (inverse, attr_name) = match token.strip_prefix(INVERT_PREFIX) {
            Some(rest) => (true, rest),
            None => (false, token),
        };
        let op = attr_name.strip_prefix(XFORM_OP_PREFIX)?;
        let kind_token = op.split(':').next()?;
        Some(XformOp {
            kind: XformOpKind::from_token(kind_token)?,
            attr_name: attr_name.to_string(),
            inverse,
        })
    }

    /// Matrix for an op value. Rotations are in degrees.
    pub fn matrix(&self, value: &Value) -> Option<DMat4> {
        let m = match self.kind {
            XformOpKind::Translate => DMat4::from_translation(dvec3(value)?),
            XformOpKind::Scale => match value.as_f64() {
                Some(s) => DMat4::from_scale(DVec3::splat(s)),
                None => DMat4::from_scale(dvec3(value)?),
            },
            XformOpKind::RotateX => DMat4::from_rotation_x(value.as_f64()?.to_radians()),
            XformOpKind::RotateY => DMat4::from_rotation_y(value.as_f64()?.to_radians()),
            XformOpKind::RotateZ => DMat4::from_rotation_z(value.as_f64()?.to_radians()),
            XformOpKind::RotateXYZ
            | XformOpKind::RotateXZY
            | XformOpKind::RotateYXZ
            | XformOpKind::RotateYZX
            | XformOpKind::RotateZXY
            | XformOpKind::RotateZYX => euler_matrix(self.kind, dvec3(value)?),
            XformOpKind::Orient => {
                let q = value.as_quat()?;
                DMat4::from_quat(DQuat::from_xyzw(q.x as f64, q.y as f64, q.z as f64, q.w as f64).normalize())
            }
            XformOpKind::Transform => value.as_dmat4()?,
        };
        Some(if self.inverse { m.inverse() } else { m })
    }
}

fn dvec3(value: &Value) -> Option<DVec3> {
    value.as_vec3().map(|v| v.as_dvec3())
}

/// Euler rotation in degrees. `rotateXYZ` rotates about X first, which in
/// column-vector form is `Rz * Ry * Rx`.
fn euler_matrix(kind: XformOpKind, degrees: DVec3) -> DMat4 {
    let r = DVec3::new(degrees.x.to_radians(), degrees.y.to_radians(), degrees.z.to_radians());
    // glam's EulerRot::ABC composes as Ra * Rb * Rc with the angles given in
    // that same order, so the last-applied axis comes first.
    let (order, a, b, c) = match kind {
        XformOpKind::RotateXYZ => (EulerRot::ZYX, r.z, r.y, r.x),
        XformOpKind::RotateXZY => (EulerRot::YZX, r.y, r.z, r.x),
        XformOpKind::RotateYXZ => (EulerRot::ZXY, r.z, r.x, r.y),
        XformOpKind::RotateYZX => (EulerRot::XZY, r.x, r.z, r.y),
        XformOpKind::RotateZXY => (EulerRot::YXZ, r.y, r.x, r.z),
        _ => (EulerRot::XYZ, r.x, r.y, r.z),
    };
    DMat4::from_euler(order, a, b, c)
}

/// The ordered transform ops of a prim and whether it resets the parent
/// transform stack.
///
/// Without an `xformOpOrder`, authored `xformOp:*` attributes are applied in
/// file order.
pub fn ordered_xform_ops(prim: &Prim) -> (Vec<XformOp>, bool) {
    let tokens: Vec<String> = match prim
        .attribute(XFORM_OP_ORDER)
        .and_then(|a| a.get(TimeCode::Default))
        .and_then(|v| v.as_str_array())
    {
        Some(order) => order,
        None => prim
            .attributes()
            .filter(|a| a.name.starts_with(XFORM_OP_PREFIX))
            .map(|a| a.name.clone())
            .collect(),
    };

    let mut ops = Vec::new();
    let mut resets = false;
    for token in &tokens {
        if token == RESET_XFORM_STACK {
            resets = true;
            ops.clear();
            continue;
        }
        match XformOp::parse(token) {
            Some(op) => ops.push(op),
            None => log::warn!("Unknown xformOp '{}' on {}", token, prim.path),
        }
    }
    (ops, resets)
}

/// Whether the prim authors any transform operation.
pub fn has_xform_ops(prim: &Prim) -> bool {
    !ordered_xform_ops(prim).0.is_empty()
}

/// Local transform at `time` as the ordered product of the prim's ops.
pub fn local_transform(prim: &Prim, time: TimeCode) -> DMat4 {
    let (ops, _) = ordered_xform_ops(prim);
    let mut result = DMat4::IDENTITY;
    for op in &ops {
        let Some(value) = prim.get(&op.attr_name, time) else {
            log::debug!("xformOp {} on {} has no value", op.attr_name, prim.path);
            continue;
        };
        match op.matrix(&value) {
            Some(m) => result *= m,
            None => log::warn!("Malformed value for {} on {}", op.attr_name, prim.path),
        }
    }
    result
}

/// True when any ordered op attribute carries more than one time sample.
pub fn transform_might_be_time_varying(prim: &Prim) -> bool {
    let (ops, _) = ordered_xform_ops(prim);
    ops.iter().any(|op| {
        prim.attribute(&op.attr_name)
            .map(|a| a.might_be_time_varying())
            .unwrap_or(false)
    })
}

/// Schema types that carry a transform.
pub fn is_xformable_type(type_name: &str) -> bool {
    matches!(
        type_name,
        "Xform"
            | "Mesh"
            | "Camera"
            | "PointInstancer"
            | "DiskLight"
            | "RectLight"
            | "SphereLight"
            | "DistantLight"
            | "DomeLight"
            | "CylinderLight"
            | "BasisCurves"
            | "NurbsCurves"
            | "Points"
            | "Volume"
            | "Cube"
            | "Sphere"
            | "Cylinder"
            | "Cone"
            | "Capsule"
    )
}

/// Schema types that carry visibility and purpose.
pub fn is_imageable_type(type_name: &str) -> bool {
    type_name == "Scope" || is_xformable_type(type_name)
}
