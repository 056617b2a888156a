//! Attribute and metadata values.

use usdio_math::{DMat4, Mat4, Quat, Vec2, Vec3};

use super::path::SdfPath;

/// A time at which an attribute is evaluated.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TimeCode {
    /// The un-timed default value.
    Default,
    /// A frame-based time code.
    Time(f64),
}

impl TimeCode {
    pub fn is_default(&self) -> bool {
        matches!(self, TimeCode::Default)
    }
}

impl From<f64> for TimeCode {
    fn from(t: f64) -> Self {
        TimeCode::Time(t)
    }
}

/// A dynamically typed USDA value.
///
/// Values are untyped in the text format; the owning attribute's type name
/// decides how a value is written back out.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    Number(f64),
    /// Quoted text. Both `string` and `token` attributes parse to this.
    String(String),
    /// A bare identifier such as `inf` or a metadata keyword.
    Token(String),
    /// `@asset/path@`
    Asset(String),
    /// `</prim/path>`
    Path(SdfPath),
    Tuple(Vec<Value>),
    Array(Vec<Value>),
    Dictionary(Vec<(String, Value)>),
    /// `None`, the value block.
    Blocked,
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => Some(*n != 0.0),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Token(t) => match t.as_str() {
                "inf" => Some(f64::INFINITY),
                "-inf" => Some(f64::NEG_INFINITY),
                "nan" => Some(f64::NAN),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        self.as_f64().map(|n| n as f32)
    }

    pub fn as_i32(&self) -> Option<i32> {
        self.as_f64().map(|n| n as i32)
    }

    /// Text of a string, token or asset value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Token(s) | Value::Asset(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_path(&self) -> Option<&SdfPath> {
        match self {
            Value::Path(p) => Some(p),
            _ => None,
        }
    }

    fn numbers(&self) -> Option<Vec<f64>> {
        match self {
            Value::Tuple(items) => items.iter().map(Value::as_f64).collect(),
            _ => None,
        }
    }

    pub fn as_vec2(&self) -> Option<Vec2> {
        match self.numbers()?.as_slice() {
            [x, y] => Some(Vec2::new(*x as f32, *y as f32)),
            _ => None,
        }
    }

    pub fn as_vec3(&self) -> Option<Vec3> {
        match self.numbers()?.as_slice() {
            [x, y, z] => Some(Vec3::new(*x as f32, *y as f32, *z as f32)),
            _ => None,
        }
    }

    /// Quaternion literal, real part first: `(w, x, y, z)`.
    pub fn as_quat(&self) -> Option<Quat> {
        match self.numbers()?.as_slice() {
            [w, x, y, z] => Some(Quat::from_xyzw(*x as f32, *y as f32, *z as f32, *w as f32)),
            _ => None,
        }
    }

    /// A `matrix4d` literal: four row tuples, translation in the last row.
    pub fn as_dmat4(&self) -> Option<DMat4> {
        let Value::Tuple(rows) = self else {
            return None;
        };
        if rows.len() != 4 {
            return None;
        }
        let mut cols = [[0.0f64; 4]; 4];
        for (r, row) in rows.iter().enumerate() {
            let nums = row.numbers()?;
            if nums.len() != 4 {
                return None;
            }
            cols[r].copy_from_slice(&nums);
        }
        // USD stores row vectors; each USD row is a glam column.
        Some(DMat4::from_cols_array_2d(&cols))
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_f32_array(&self) -> Option<Vec<f32>> {
        self.as_array()?.iter().map(Value::as_f32).collect()
    }

    pub fn as_i32_array(&self) -> Option<Vec<i32>> {
        self.as_array()?.iter().map(Value::as_i32).collect()
    }

    pub fn as_vec2_array(&self) -> Option<Vec<Vec2>> {
        self.as_array()?.iter().map(Value::as_vec2).collect()
    }

    pub fn as_vec3_array(&self) -> Option<Vec<Vec3>> {
        self.as_array()?.iter().map(Value::as_vec3).collect()
    }

    pub fn as_quat_array(&self) -> Option<Vec<Quat>> {
        self.as_array()?.iter().map(Value::as_quat).collect()
    }

    pub fn as_str_array(&self) -> Option<Vec<String>> {
        self.as_array()?
            .iter()
            .map(|v| v.as_str().map(str::to_string))
            .collect()
    }

    pub fn from_vec2(v: Vec2) -> Value {
        Value::Tuple(vec![Value::Number(v.x as f64), Value::Number(v.y as f64)])
    }

    pub fn from_vec3(v: Vec3) -> Value {
        Value::Tuple(vec![
            Value::Number(v.x as f64),
            Value::Number(v.y as f64),
            Value::Number(v.z as f64),
        ])
    }

    pub fn from_dmat4(m: DMat4) -> Value {
        Value::Tuple(
            m.to_cols_array_2d()
                .iter()
                .map(|row| Value::Tuple(row.iter().map(|n| Value::Number(*n)).collect()))
                .collect(),
        )
    }

    pub fn from_mat4(m: Mat4) -> Value {
        Value::from_dmat4(m.as_dmat4())
    }

    pub fn from_vec3_array(values: &[Vec3]) -> Value {
        Value::Array(values.iter().map(|v| Value::from_vec3(*v)).collect())
    }

    pub fn from_vec2_array(values: &[Vec2]) -> Value {
        Value::Array(values.iter().map(|v| Value::from_vec2(*v)).collect())
    }

    pub fn from_i32_array(values: &[i32]) -> Value {
        Value::Array(values.iter().map(|v| Value::Number(*v as f64)).collect())
    }

    pub fn from_str_array<S: AsRef<str>>(values: &[S]) -> Value {
        Value::Array(values.iter().map(|v| Value::String(v.as_ref().to_string())).collect())
    }

    /// Linear blend between two values of the same shape.
    ///
    /// Returns `None` for non-numeric values or mismatched shapes, in which
    /// case callers fall back to held interpolation.
    pub fn lerp(&self, other: &Value, t: f64) -> Option<Value> {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => Some(Value::Number(a + (b - a) * t)),
            (Value::Tuple(a), Value::Tuple(b)) if a.len() == b.len() => a
                .iter()
                .zip(b)
                .map(|(x, y)| x.lerp(y, t))
                .collect::<Option<Vec<_>>>()
                .map(Value::Tuple),
            (Value::Array(a), Value::Array(b)) if a.len() == b.len() => a
                .iter()
                .zip(b)
                .map(|(x, y)| x.lerp(y, t))
                .collect::<Option<Vec<_>>>()
                .map(Value::Array),
            _ => None,
        }
    }
}

impl From<f32> for Value {
    fn from(n: f32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec3> for Value {
    fn from(v: Vec3) -> Self {
        Value::from_vec3(v)
    }
}

impl From<SdfPath> for Value {
    fn from(p: SdfPath) -> Self {
        Value::Path(p)
    }
}
