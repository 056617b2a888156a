//! Prim writers: turn scene objects into prims on an export stage.
//!
//! The [`HierarchyIterator`] decides what gets exported and where; the
//! writers only author attributes for one prim each. Writers are created
//! once per export path and called again for every exported frame.

mod camera;
mod hierarchy;
mod light;
mod material;
mod mesh;
mod transform;

use usdio_core::scene::{ObjectId, Scene};
use usdio_core::usd::{PrimId, SdfPath, Stage, TimeCode, Value, Variability};
use usdio_math::Mat4;

use crate::params::ExportParams;

pub use camera::CameraWriter;
pub use hierarchy::{ExportGraph, HierarchyIterator};
pub use light::{write_world, LightWriter};
pub use material::{material_path, write_material};
pub use mesh::MeshWriter;
pub use transform::TransformWriter;

/// Per-frame state shared by every writer.
#[derive(Clone, Copy)]
pub struct ExportContext<'a> {
    pub scene: &'a Scene,
    pub params: &'a ExportParams,
    /// Time code to author animated values at; `Default` for static export.
    pub time: TimeCode,
}

impl ExportContext<'_> {
    /// Time to author a value at: the frame for animated values.
    pub fn time_for(&self, animated: bool) -> TimeCode {
        if animated {
            self.time
        } else {
            TimeCode::Default
        }
    }
}

/// One node of the export graph.
#[derive(Clone, Debug, PartialEq)]
pub struct HierarchyContext {
    pub object: ObjectId,
    pub export_path: SdfPath,
    /// Where the object data goes; `None` for transform-only prims.
    pub data_path: Option<SdfPath>,
    /// Local matrix relative to the exported parent.
    pub matrix: Mat4,
    pub is_animated: bool,
    /// Prototype an `instanceable` prim references.
    pub instance_of: Option<SdfPath>,
    /// Inside a `class` prototype.
    pub in_prototype: bool,
}

/// Authors one prim from a hierarchy context.
pub trait PrimWriter {
    fn usd_path(&self) -> &SdfPath;

    fn write(&mut self, stage: &mut Stage, ctx: &ExportContext<'_>, hier: &HierarchyContext);
}

/// Define `path` as `type_name`, or author a typeless `over` when exporting
/// overrides.
pub(crate) fn define_prim(stage: &mut Stage, params: &ExportParams, path: &SdfPath, type_name: &str) -> Option<PrimId> {
    if params.export_as_overs {
        stage.override_prim(path)
    } else {
        stage.define_prim(path, type_name)
    }
}

pub(crate) fn set_attr(
    stage: &mut Stage,
    prim: PrimId,
    name: &str,
    type_name: &str,
    value: impl Into<Value>,
    time: TimeCode,
) {
    stage
        .create_attribute(prim, name, type_name, Variability::Varying)
        .set(value, time);
}

pub(crate) fn set_uniform(stage: &mut Stage, prim: PrimId, name: &str, type_name: &str, value: impl Into<Value>) {
    stage
        .create_attribute(prim, name, type_name, Variability::Uniform)
        .set(value, TimeCode::Default);
}
