//! Scene objects and the data they carry.

use serde::{Deserialize, Serialize};
use usdio_math::Mat4;

use super::{CacheFileId, Camera, CollectionId, Light};
use crate::Mesh;

/// Index of an object inside its scene.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub(crate) usize);

/// Data block attached to an object.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum ObjectData {
    #[default]
    Empty,
    Camera(Camera),
    Light(Light),
    Mesh(Mesh),
    PointInstances(PointInstances),
}

impl ObjectData {
    /// Short lower-case name of the data kind.
    pub fn kind_name(&self) -> &'static str {
        match self {
            ObjectData::Empty => "empty",
            ObjectData::Camera(_) => "camera",
            ObjectData::Light(_) => "light",
            ObjectData::Mesh(_) => "mesh",
            ObjectData::PointInstances(_) => "point_instances",
        }
    }
}

/// Points that each place one of several prototype collections.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct PointInstances {
    /// Stage paths of the prototypes, indexed by `proto_indices`.
    pub prototype_paths: Vec<String>,
    /// Resolved prototype collections, parallel to `prototype_paths`.
    pub prototypes: Vec<Option<CollectionId>>,
    pub proto_indices: Vec<i32>,
    pub transforms: Vec<Mat4>,
}

impl PointInstances {
    pub fn instance_count(&self) -> usize {
        self.proto_indices.len()
    }
}

/// Which mesh attributes a cache modifier re-reads every frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MeshReadFlags(pub u8);

impl MeshReadFlags {
    pub const VERTICES: Self = Self(1 << 0);
    pub const POLYGONS: Self = Self(1 << 1);
    pub const UV: Self = Self(1 << 2);
    pub const COLOR: Self = Self(1 << 3);
    pub const ALL: Self = Self(0b1111);
    pub const NONE: Self = Self(0);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl Default for MeshReadFlags {
    fn default() -> Self {
        Self::VERTICES
    }
}

/// Constraints attached to an object.
#[derive(Clone, Debug, PartialEq)]
pub enum Constraint {
    /// Drive the object transform from a prim in a cache file.
    TransformCache {
        cache_file: CacheFileId,
        object_path: String,
    },
}

/// Modifiers attached to an object.
#[derive(Clone, Debug, PartialEq)]
pub enum Modifier {
    /// Re-read mesh data from a prim in a cache file.
    MeshSequenceCache {
        cache_file: CacheFileId,
        object_path: String,
        read_flags: MeshReadFlags,
    },
    Subdivision {
        levels: u32,
    },
}

impl Modifier {
    fn same_kind(&self, other: &Modifier) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

/// Pending re-evaluation tags, mirrored from the dependency graph.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Recalc(u8);

impl Recalc {
    pub const TRANSFORM: Self = Self(1 << 0);
    pub const GEOMETRY: Self = Self(1 << 1);
    pub const ANIMATION: Self = Self(1 << 2);
    pub const ALL: Self = Self(0b111);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }
}

/// Blend two local matrices: linear translation and scale, slerped rotation.
fn blend_matrices(a: Mat4, b: Mat4, t: f32) -> Mat4 {
    let (scale_a, rot_a, pos_a) = a.to_scale_rotation_translation();
    let (scale_b, rot_b, pos_b) = b.to_scale_rotation_translation();
    Mat4::from_scale_rotation_translation(scale_a.lerp(scale_b, t), rot_a.slerp(rot_b, t), pos_a.lerp(pos_b, t))
}

/// A baked local matrix at one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Keyframe {
    pub frame: f64,
    pub matrix: Mat4,
}

/// An object in the scene.
#[derive(Clone, Debug, PartialEq)]
pub struct Object {
    pub name: String,
    pub data: ObjectData,
    pub parent: Option<ObjectId>,
    /// Local matrix, relative to `parent` when set.
    pub matrix: Mat4,
    pub constraints: Vec<Constraint>,
    pub modifiers: Vec<Modifier>,
    /// Collection drawn at this object's transform.
    pub instance_collection: Option<CollectionId>,
    pub visible: bool,
    pub selected: bool,
    pub empty_display_size: f32,
    /// Sorted by frame.
    pub keyframes: Vec<Keyframe>,
    pub recalc: Recalc,
}

impl Object {
    pub fn new(name: impl Into<String>, data: ObjectData) -> Self {
        Self {
            name: name.into(),
            data,
            parent: None,
            matrix: Mat4::IDENTITY,
            constraints: Vec::new(),
            modifiers: Vec::new(),
            instance_collection: None,
            visible: true,
            selected: false,
            empty_display_size: 1.0,
            keyframes: Vec::new(),
            recalc: Recalc::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.data, ObjectData::Empty)
    }

    pub fn mesh(&self) -> Option<&Mesh> {
        match &self.data {
            ObjectData::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    pub fn mesh_mut(&mut self) -> Option<&mut Mesh> {
        match &mut self.data {
            ObjectData::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    /// Add a constraint, replacing an existing one of the same kind.
    pub fn set_constraint(&mut self, constraint: Constraint) {
        self.constraints.clear();
        self.constraints.push(constraint);
    }

    /// Add a modifier, replacing an existing one of the same kind.
    pub fn set_modifier(&mut self, modifier: Modifier) {
        match self.modifiers.iter_mut().find(|m| m.same_kind(&modifier)) {
            Some(existing) => *existing = modifier,
            None => self.modifiers.push(modifier),
        }
    }

    /// Cache file and prim path driving this object's transform.
    pub fn transform_cache(&self) -> Option<(CacheFileId, &str)> {
        self.constraints.iter().find_map(|c| match c {
            Constraint::TransformCache {
                cache_file,
                object_path,
            } => Some((*cache_file, object_path.as_str())),
        })
    }

    /// Cache file, prim path and flags re-reading this object's mesh.
    pub fn mesh_cache(&self) -> Option<(CacheFileId, &str, MeshReadFlags)> {
        self.modifiers.iter().find_map(|m| match m {
            Modifier::MeshSequenceCache {
                cache_file,
                object_path,
                read_flags,
            } => Some((*cache_file, object_path.as_str(), *read_flags)),
            _ => None,
        })
    }

    /// Insert or replace the keyframe at `frame`.
    pub fn insert_keyframe(&mut self, frame: f64, matrix: Mat4) {
        match self
            .keyframes
            .binary_search_by(|k| k.frame.total_cmp(&frame))
        {
            Ok(i) => self.keyframes[i].matrix = matrix,
            Err(i) => self.keyframes.insert(i, Keyframe { frame, matrix }),
        }
        self.recalc.insert(Recalc::ANIMATION);
    }

    /// Keyframed local matrix at `frame`, or `None` without keyframes.
    ///
    /// Holds the first and last keys outside their range.
    pub fn evaluate_keyframes(&self, frame: f64) -> Option<Mat4> {
        let first = self.keyframes.first()?;
        let last = self.keyframes.last()?;
        if frame <= first.frame {
            return Some(first.matrix);
        }
        if frame >= last.frame {
            return Some(last.matrix);
        }
        let upper = self.keyframes.iter().position(|k| k.frame >= frame)?;
        let (a, b) = (&self.keyframes[upper - 1], &self.keyframes[upper]);
        let t = ((frame - a.frame) / (b.frame - a.frame)) as f32;
        Some(blend_matrices(a.matrix, b.matrix, t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use usdio_math::{Quat, Vec3};

    #[test]
    fn test_blend_halfway_rotation() {
        let a = Mat4::from_scale(Vec3::splat(2.0));
        let b = Mat4::from_scale_rotation_translation(
            Vec3::splat(4.0),
            Quat::from_rotation_z(std::f32::consts::FRAC_PI_2),
            Vec3::new(0.0, 0.0, 6.0),
        );
        let (scale, rotation, translation) = blend_matrices(a, b, 0.5).to_scale_rotation_translation();
        assert!((scale - Vec3::splat(3.0)).length() < 1e-4);
        assert!((translation - Vec3::new(0.0, 0.0, 3.0)).length() < 1e-4);
        let expected = Quat::from_rotation_z(std::f32::consts::FRAC_PI_4);
        assert!(rotation.dot(expected).abs() > 0.9999);
    }

    #[test]
    fn test_keyframe_interpolation() {
        let mut object = Object::new("cube", ObjectData::Empty);
        assert!(object.evaluate_keyframes(1.0).is_none());

        object.insert_keyframe(10.0, Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0)));
        object.insert_keyframe(0.0, Mat4::IDENTITY);
        assert_eq!(object.keyframes[0].frame, 0.0);

        let mid = object.evaluate_keyframes(5.0).unwrap();
        assert!((mid.w_axis.truncate() - Vec3::new(5.0, 0.0, 0.0)).length() < 1e-4);

        // Held outside the keyed range
        assert_eq!(object.evaluate_keyframes(-3.0).unwrap(), Mat4::IDENTITY);
        let end = object.evaluate_keyframes(20.0).unwrap();
        assert_eq!(end.w_axis.x, 10.0);
        assert!(object.recalc.contains(Recalc::ANIMATION));
    }

    #[test]
    fn test_insert_keyframe_replaces() {
        let mut object = Object::new("a", ObjectData::Empty);
        object.insert_keyframe(1.0, Mat4::IDENTITY);
        object.insert_keyframe(1.0, Mat4::from_scale(Vec3::splat(2.0)));
        assert_eq!(object.keyframes.len(), 1);
        assert_eq!(object.keyframes[0].matrix.x_axis.x, 2.0);
    }

    #[test]
    fn test_set_modifier_replaces_same_kind() {
        let mut object = Object::new("mesh", ObjectData::Mesh(Mesh::default()));
        object.set_modifier(Modifier::Subdivision { levels: 1 });
        object.set_modifier(Modifier::MeshSequenceCache {
            cache_file: CacheFileId(0),
            object_path: "/a".into(),
            read_flags: MeshReadFlags::ALL,
        });
        object.set_modifier(Modifier::Subdivision { levels: 2 });
        assert_eq!(object.modifiers.len(), 2);
        assert_eq!(object.modifiers[0], Modifier::Subdivision { levels: 2 });

        let (_, path, flags) = object.mesh_cache().unwrap();
        assert_eq!(path, "/a");
        assert!(flags.contains(MeshReadFlags::UV));
    }

    #[test]
    fn test_transform_cache_constraint() {
        let mut object = Object::new("xf", ObjectData::Empty);
        object.set_constraint(Constraint::TransformCache {
            cache_file: CacheFileId(0),
            object_path: "/old".into(),
        });
        object.set_constraint(Constraint::TransformCache {
            cache_file: CacheFileId(1),
            object_path: "/new".into(),
        });
        assert_eq!(object.constraints.len(), 1);
        assert_eq!(object.transform_cache(), Some((CacheFileId(1), "/new")));
    }

    #[test]
    fn test_read_flags() {
        let flags = MeshReadFlags::VERTICES.union(MeshReadFlags::UV);
        assert!(flags.contains(MeshReadFlags::VERTICES));
        assert!(!flags.contains(MeshReadFlags::POLYGONS));
        assert_eq!(MeshReadFlags::default(), MeshReadFlags::VERTICES);
    }
}
