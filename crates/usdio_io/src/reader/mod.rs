//! Prim readers: one per imported prim, each producing one scene object.
//!
//! Readers live in the `StageReader`'s arena and refer to each other by
//! `ReaderId`. The stage, parameters and settings reach them through a
//! borrowed `ReadContext`.

mod camera;
mod instance;
mod light;
mod material;
mod mesh;
mod stage;
mod xform;

use usdio_core::scene::{ObjectId, Scene};
use usdio_core::usd::{PrimId, SdfPath, Stage};
use usdio_math::Mat4;

use crate::params::ImportParams;
use crate::settings::ImportSettings;

pub use camera::CameraReader;
pub use instance::{InstanceReader, InstanceSource};
pub use light::LightReader;
pub use material::import_material;
pub use mesh::{read_mesh_data, MeshReader};
pub use stage::{resolve_scene_path, StageReader};
pub use xform::{read_matrix, XformReader};

/// Index of a reader in its stage reader's arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReaderId(pub(crate) usize);

impl ReaderId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReaderKind {
    Xform,
    Camera,
    Light,
    Mesh,
    Instance,
}

/// Everything a reader may look at while decoding.
#[derive(Clone, Copy)]
pub struct ReadContext<'a> {
    pub stage: &'a Stage,
    pub params: &'a ImportParams,
    pub settings: &'a ImportSettings,
}

/// State shared by every reader kind.
#[derive(Clone, Debug)]
pub struct ReaderBase {
    /// Prim the data is read from.
    pub prim: PrimId,
    /// Path of the prim in the composed scene; differs from the prim's own
    /// path inside instance proxies.
    pub path: SdfPath,
    pub name: String,
    pub parent: Option<ReaderId>,
    pub object: Option<ObjectId>,
    /// The transform comes from the parent prim this reader absorbed.
    pub use_parent_xform: bool,
    pub xform_prim: PrimId,
    pub xform_path: SdfPath,
    pub in_prototype: bool,
    /// Root of a transform chain; receives global scale and axis conversion.
    pub is_root: bool,
}

impl ReaderBase {
    pub fn new(stage: &Stage, prim: PrimId, path: SdfPath) -> Self {
        let name = stage.prim(prim).name.clone();
        Self {
            prim,
            xform_prim: prim,
            xform_path: path.clone(),
            path,
            name,
            parent: None,
            object: None,
            use_parent_xform: false,
            in_prototype: false,
            is_root: false,
        }
    }

    /// Take over the transform of the parent prim at `parent_path`.
    pub fn merge_parent_xform(&mut self, parent_prim: PrimId, parent_path: SdfPath) {
        self.use_parent_xform = true;
        self.xform_prim = parent_prim;
        self.xform_path = parent_path;
    }
}

/// A decoder for one prim type.
pub trait PrimReader: Send {
    fn base(&self) -> &ReaderBase;
    fn base_mut(&mut self) -> &mut ReaderBase;
    fn kind(&self) -> ReaderKind;

    /// Allocate the object shell and its data block. Called once.
    fn create_object(&mut self, scene: &mut Scene, ctx: &ReadContext<'_>, time: f64);

    /// Decode the prim at `time` into the object. Repeated calls at the same
    /// time leave identical state.
    fn read_object_data(&mut self, scene: &mut Scene, ctx: &ReadContext<'_>, time: f64);

    /// Local matrix at `time` and whether it is constant over time.
    fn read_matrix(&self, ctx: &ReadContext<'_>, time: f64) -> (Mat4, bool) {
        read_matrix(self.base(), ctx, time)
    }

    fn object(&self) -> Option<ObjectId> {
        self.base().object
    }

    fn path(&self) -> &SdfPath {
        &self.base().path
    }

    fn parent(&self) -> Option<ReaderId> {
        self.base().parent
    }

    fn as_instance(&self) -> Option<&InstanceReader> {
        None
    }
}
