use log::warn;
use usdio_core::scene::{CollectionId, ObjectData, PointInstances, Scene};
use usdio_core::usd::{Prim, SdfPath, TimeCode};
use usdio_math::{Mat4, Quat, Vec3};

use super::xform::read_xform_data;
use super::{PrimReader, ReadContext, ReaderBase, ReaderKind};

/// What an instance reader instances.
#[derive(Clone, Debug, PartialEq)]
pub enum InstanceSource {
    /// A scenegraph instance of the prototype at this path.
    Prototype(SdfPath),
    /// A `PointInstancer` and its prototype targets.
    PointInstancer(Vec<SdfPath>),
}

/// Reads scenegraph instances and point instancers.
///
/// Collections are assigned after all prototypes have been collected.
pub struct InstanceReader {
    base: ReaderBase,
    source: InstanceSource,
}

impl InstanceReader {
    pub fn new(base: ReaderBase, source: InstanceSource) -> Self {
        Self { base, source }
    }

    pub fn source(&self) -> &InstanceSource {
        &self.source
    }

    /// Prototype paths whose collections this reader needs.
    pub fn prototype_paths(&self) -> Vec<SdfPath> {
        match &self.source {
            InstanceSource::Prototype(path) => vec![path.clone()],
            InstanceSource::PointInstancer(paths) => paths.clone(),
        }
    }

    /// Point the object at the collections built for its prototypes.
    pub fn set_instance_collections(&self, scene: &mut Scene, lookup: impl Fn(&SdfPath) -> Option<CollectionId>) {
        let Some(object) = self.base.object.and_then(|id| scene.object_mut(id)) else {
            return;
        };
        match (&self.source, &mut object.data) {
            (InstanceSource::Prototype(path), _) => match lookup(path) {
                Some(collection) => object.instance_collection = Some(collection),
                None => warn!("Couldn't find prototype collection for {}", self.base.path),
            },
            (InstanceSource::PointInstancer(_), ObjectData::PointInstances(points)) => {
                points.prototypes = points
                    .prototype_paths
                    .iter()
                    .map(|p| lookup(&SdfPath::new(p)))
                    .collect();
            }
            _ => {}
        }
    }
}

fn read_point_instances(prim: &Prim, time: f64, targets: &[SdfPath]) -> PointInstances {
    let t = TimeCode::Time(time);
    let proto_indices = prim.get("protoIndices", t).and_then(|v| v.as_i32_array()).unwrap_or_default();
    let positions = prim.get("positions", t).and_then(|v| v.as_vec3_array()).unwrap_or_default();
    let orientations = prim.get("orientations", t).and_then(|v| v.as_quat_array()).unwrap_or_default();
    let scales = prim.get("scales", t).and_then(|v| v.as_vec3_array()).unwrap_or_default();

    let transforms = (0..proto_indices.len())
        .map(|i| {
            let translation = positions.get(i).copied().unwrap_or(Vec3::ZERO);
            let rotation = orientations.get(i).copied().unwrap_or(Quat::IDENTITY).normalize();
            let scale = scales.get(i).copied().unwrap_or(Vec3::ONE);
            Mat4::from_scale_rotation_translation(scale, rotation, translation)
        })
        .collect();

    PointInstances {
        prototype_paths: targets.iter().map(|p| p.to_string()).collect(),
        prototypes: vec![None; targets.len()],
        proto_indices,
        transforms,
    }
}

impl PrimReader for InstanceReader {
    fn base(&self) -> &ReaderBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ReaderBase {
        &mut self.base
    }

    fn kind(&self) -> ReaderKind {
        ReaderKind::Instance
    }

    fn create_object(&mut self, scene: &mut Scene, _ctx: &ReadContext<'_>, _time: f64) {
        let data = match &self.source {
            InstanceSource::Prototype(_) => ObjectData::Empty,
            InstanceSource::PointInstancer(_) => ObjectData::PointInstances(PointInstances::default()),
        };
        let id = scene.add_object_only(&self.base.name, data);
        self.base.object = Some(id);
    }

    fn read_object_data(&mut self, scene: &mut Scene, ctx: &ReadContext<'_>, time: f64) {
        if let InstanceSource::PointInstancer(targets) = &self.source {
            let prim = ctx.stage.prim(self.base.prim);
            let mut points = read_point_instances(prim, time, targets);
            if let Some(object) = self.base.object.and_then(|id| scene.object_mut(id)) {
                // Keep collections resolved by a previous finalize.
                if let ObjectData::PointInstances(previous) = &object.data {
                    if previous.prototype_paths == points.prototype_paths {
                        points.prototypes = previous.prototypes.clone();
                    }
                }
                object.data = ObjectData::PointInstances(points);
            }
        }
        read_xform_data(&self.base, scene, ctx, time);
    }

    fn as_instance(&self) -> Option<&InstanceReader> {
        Some(self)
    }
}
