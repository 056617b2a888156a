use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::path::Path;

use log::{debug, info, warn};
use usdio_core::scene::{ObjectId, Scene};
use usdio_core::usd::{xform, Prim, PrimId, SdfPath, Specifier, Stage, TimeCode};

use crate::error::{IoError, IoResult};
use crate::params::ImportParams;
use crate::settings::ImportSettings;

use super::{
    CameraReader, InstanceReader, InstanceSource, LightReader, MeshReader, PrimReader, ReadContext, ReaderBase,
    ReaderId, XformReader,
};

const LIGHT_TYPES: [&str; 4] = ["DiskLight", "RectLight", "SphereLight", "DistantLight"];

/// Walks an open stage and owns one reader per imported prim.
pub struct StageReader {
    stage: Stage,
    params: ImportParams,
    settings: ImportSettings,
    /// Arena; slots of parents absorbed by their child are `None`.
    arena: Vec<Option<Box<dyn PrimReader>>>,
    /// Retained readers outside prototypes, in creation order.
    readers: Vec<ReaderId>,
    proto_readers: BTreeMap<SdfPath, Vec<ReaderId>>,
    dome_lights: Vec<PrimId>,
}

impl StageReader {
    pub fn new(stage: Stage, params: ImportParams) -> Self {
        let settings = ImportSettings::for_stage(&params, &stage);
        Self {
            stage,
            params,
            settings,
            arena: Vec::new(),
            readers: Vec::new(),
            proto_readers: BTreeMap::new(),
            dome_lights: Vec::new(),
        }
    }

    /// Open the stage at `path`.
    pub fn open(path: impl AsRef<Path>, params: ImportParams) -> IoResult<Self> {
        let path = path.as_ref();
        let stage = Stage::open(path).map_err(|e| IoError::from_stage(path, e))?;
        info!("Opened stage {} ({} prims)", path.display(), stage.prim_count());
        Ok(Self::new(stage, params))
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn params(&self) -> &ImportParams {
        &self.params
    }

    pub fn settings(&self) -> &ImportSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut ImportSettings {
        &mut self.settings
    }

    pub fn readers(&self) -> &[ReaderId] {
        &self.readers
    }

    pub fn proto_readers(&self) -> &BTreeMap<SdfPath, Vec<ReaderId>> {
        &self.proto_readers
    }

    /// Dome lights found during collection; they feed the world, not objects.
    pub fn dome_lights(&self) -> &[PrimId] {
        &self.dome_lights
    }

    pub fn reader(&self, id: ReaderId) -> Option<&dyn PrimReader> {
        self.arena.get(id.0)?.as_deref()
    }

    /// Total number of retained readers, prototypes included.
    pub fn reader_count(&self) -> usize {
        self.arena.iter().flatten().count()
    }

    pub fn context(&self) -> ReadContext<'_> {
        ReadContext {
            stage: &self.stage,
            params: &self.params,
            settings: &self.settings,
        }
    }

    /// Build the reader graph and allocate one object per retained reader.
    ///
    /// Objects are not linked to any collection.
    pub fn collect_readers(&mut self, scene: &mut Scene) {
        self.clear_readers(scene);

        let mut collector = Collector::new(&self.stage, &self.params);
        collector.collect();
        let Collector {
            mut arena,
            main,
            proto_readers,
            dome_lights,
            ..
        } = collector;

        let removed = merge_with_parents(&self.stage, &mut arena);
        mark_roots(&self.stage, &mut arena);

        let keep = |ids: Vec<ReaderId>| -> Vec<ReaderId> { ids.into_iter().filter(|id| !removed.contains(id)).collect() };
        self.readers = keep(main);
        self.proto_readers = proto_readers.into_iter().map(|(path, ids)| (path, keep(ids))).collect();
        self.arena = arena;
        self.dome_lights = dome_lights;

        let ctx = ReadContext {
            stage: &self.stage,
            params: &self.params,
            settings: &self.settings,
        };
        let time = self.settings.read_time;
        let order = self.readers.iter().chain(self.proto_readers.values().flatten());
        for id in order {
            if let Some(reader) = self.arena[id.0].as_mut() {
                reader.create_object(scene, &ctx, time);
            }
        }
        debug!(
            "Collected {} readers, {} prototypes, {} dome lights",
            self.readers.len(),
            self.proto_readers.len(),
            self.dome_lights.len()
        );
    }

    /// Decode `id`'s prim at `time` into its object.
    pub fn read_reader(&mut self, id: ReaderId, scene: &mut Scene, time: f64) {
        let ctx = ReadContext {
            stage: &self.stage,
            params: &self.params,
            settings: &self.settings,
        };
        if let Some(reader) = self.arena.get_mut(id.0).and_then(|slot| slot.as_mut()) {
            reader.read_object_data(scene, &ctx, time);
        }
    }

    /// Parent every object to the object of its nearest ancestor by prim
    /// path. Prototype readers only look inside their own prototype.
    pub fn resolve_parents(&self, scene: &mut Scene) {
        let mut groups: Vec<&[ReaderId]> = vec![self.readers.as_slice()];
        groups.extend(self.proto_readers.values().map(|ids| ids.as_slice()));

        for group in groups {
            let by_path: HashMap<&SdfPath, ObjectId> = group
                .iter()
                .filter_map(|id| self.reader(*id))
                .filter_map(|r| Some((hierarchy_path(r.base()), r.object()?)))
                .collect();

            for reader in group.iter().filter_map(|id| self.reader(*id)) {
                let Some(object) = reader.object() else {
                    continue;
                };
                let parent = hierarchy_path(reader.base())
                    .ancestors()
                    .find_map(|p| by_path.get(&p).copied());
                if parent.is_none() && reader.parent().is_some() {
                    debug!("Parent of {} produced no object, importing as root", reader.path());
                }
                if !scene.set_parent(object, parent) {
                    warn!("Could not parent {}", reader.path());
                }
            }
        }
    }

    /// Free every object created by any reader.
    pub fn free_objects(&mut self, scene: &mut Scene) {
        for reader in self.arena.iter_mut().flatten() {
            if let Some(id) = reader.base_mut().object.take() {
                scene.free_object(id);
            }
        }
    }

    fn clear_readers(&mut self, scene: &mut Scene) {
        if !self.arena.is_empty() {
            self.free_objects(scene);
        }
        self.arena.clear();
        self.readers.clear();
        self.proto_readers.clear();
        self.dome_lights.clear();
    }
}

/// Path a reader occupies in the object hierarchy: merged readers take
/// their absorbed parent's place.
fn hierarchy_path(base: &ReaderBase) -> &SdfPath {
    if base.use_parent_xform {
        &base.xform_path
    } else {
        &base.path
    }
}

/// Find the prim for a composed scene path, following internal references
/// for paths inside instance proxies.
pub fn resolve_scene_path(stage: &Stage, path: &SdfPath) -> Option<PrimId> {
    if let Some(id) = stage.prim_at_path(path) {
        return Some(id);
    }
    let mut components = path.as_str().split('/').filter(|c| !c.is_empty());
    let first = components.next()?;
    let mut current = *stage.root_prims().iter().find(|id| stage.prim(**id).name == first)?;
    let mut composing = Vec::new();
    for name in components {
        let target = reference_target(stage, current, &composing);
        current = composed_children(stage, current, target)
            .into_iter()
            .find(|id| stage.prim(*id).name == name)?;
        composing.extend(target);
    }
    Some(current)
}

/// Internal reference target of `id` to compose, unless it is the prim
/// itself or already being composed further up the descent.
fn reference_target(stage: &Stage, id: PrimId, composing: &[PrimId]) -> Option<PrimId> {
    let prim = stage.prim(id);
    let target = prim.internal_reference().and_then(|p| stage.prim_at_path(p))?;
    if target == id {
        return None;
    }
    if composing.contains(&target) {
        warn!(
            "Cyclic reference from {} to {}, using local children only",
            prim.path,
            stage.prim(target).path
        );
        return None;
    }
    Some(target)
}

/// Children of `id` with `target` composed in: the referenced prim's
/// children first, then local children with names not already taken.
fn composed_children(stage: &Stage, id: PrimId, target: Option<PrimId>) -> Vec<PrimId> {
    let prim = stage.prim(id);
    let Some(target) = target else {
        return prim.children.clone();
    };
    let mut children = stage.prim(target).children.clone();
    let names: HashSet<&str> = children.iter().map(|c| stage.prim(*c).name.as_str()).collect();
    let local: Vec<PrimId> = prim
        .children
        .iter()
        .copied()
        .filter(|c| !names.contains(stage.prim(*c).name.as_str()))
        .collect();
    children.extend(local);
    children
}

/// Type of `prim`, taken from its internal reference when it has none.
fn effective_type<'a>(stage: &'a Stage, prim: &'a Prim) -> &'a str {
    if prim.type_name.is_empty() {
        if let Some(target) = prim.internal_reference().and_then(|p| stage.get_prim(p)) {
            return &target.type_name;
        }
    }
    &prim.type_name
}

enum ProtoRoot {
    /// Scenegraph prototype: its children are the prototype's content.
    Children,
    /// PointInstancer target: the prim itself is the content.
    Prim,
}

struct Collector<'a> {
    stage: &'a Stage,
    params: &'a ImportParams,
    masks: Vec<SdfPath>,
    arena: Vec<Option<Box<dyn PrimReader>>>,
    main: Vec<ReaderId>,
    proto_readers: BTreeMap<SdfPath, Vec<ReaderId>>,
    pending: VecDeque<(SdfPath, ProtoRoot)>,
    dome_lights: Vec<PrimId>,
    /// Reference targets composed on the current descent.
    composing: Vec<PrimId>,
}

impl<'a> Collector<'a> {
    fn new(stage: &'a Stage, params: &'a ImportParams) -> Self {
        let masks = params
            .prim_path_mask
            .split([',', ';'])
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(SdfPath::new)
            .collect();
        Self {
            stage,
            params,
            masks,
            arena: Vec::new(),
            main: Vec::new(),
            proto_readers: BTreeMap::new(),
            pending: VecDeque::new(),
            dome_lights: Vec::new(),
            composing: Vec::new(),
        }
    }

    fn collect(&mut self) {
        let stage = self.stage;
        let mut main = Vec::new();
        for &root in stage.root_prims() {
            let path = stage.prim(root).path.clone();
            self.visit(root, path, None, false, &mut main);
        }
        self.main = main;

        // Prototypes may instance further prototypes.
        while let Some((proto_path, root)) = self.pending.pop_front() {
            let Some(proto) = stage.prim_at_path(&proto_path) else {
                warn!("Prototype {} not found", proto_path);
                continue;
            };
            let mut ids = Vec::new();
            match root {
                ProtoRoot::Children => {
                    let target = reference_target(stage, proto, &self.composing);
                    self.composing.extend(target);
                    for child in composed_children(stage, proto, target) {
                        let path = proto_path.append_child(&stage.prim(child).name);
                        self.visit(child, path, None, true, &mut ids);
                    }
                    self.composing.clear();
                }
                ProtoRoot::Prim => self.visit(proto, proto_path.clone(), None, true, &mut ids),
            }
            self.proto_readers.insert(proto_path, ids);
        }
    }

    /// Queue a prototype unless an earlier instance already claimed it.
    fn request_prototype(&mut self, path: &SdfPath, root: ProtoRoot) {
        if self.proto_readers.contains_key(path) {
            return;
        }
        self.proto_readers.insert(path.clone(), Vec::new());
        self.pending.push_back((path.clone(), root));
    }

    fn is_pruned(&self, prim: &Prim, path: &SdfPath, in_proto: bool) -> bool {
        if !prim.is_active() {
            return true;
        }
        match prim.specifier {
            Specifier::Over => return true,
            Specifier::Class if !in_proto => return true,
            _ => {}
        }
        !in_proto && !self.masks.is_empty() && !self.masks.iter().any(|m| path.has_prefix(m) || m.has_prefix(path))
    }

    /// Per-node inclusion; excluded prims still have their children visited.
    fn is_included(&self, prim: &Prim, type_name: &str) -> bool {
        if !xform::is_imageable_type(type_name) {
            return true;
        }
        if self.params.import_visible_only {
            if let Some(attr) = prim.attribute("visibility") {
                let invisible = attr
                    .get(TimeCode::Default)
                    .is_some_and(|v| v.as_str() == Some("invisible"));
                if invisible && !attr.might_be_time_varying() {
                    debug!("Skipping invisible prim {}", prim.path);
                    return false;
                }
            }
        }
        let purpose = prim
            .get("purpose", TimeCode::Default)
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| "default".to_string());
        if !self.params.purpose.includes(&purpose) {
            debug!("Skipping {} with purpose {}", prim.path, purpose);
            return false;
        }
        true
    }

    fn create_reader(&mut self, prim_id: PrimId, path: &SdfPath, type_name: &str) -> Option<Box<dyn PrimReader>> {
        let stage = self.stage;
        let prim = stage.prim(prim_id);
        let params = self.params;
        let base = ReaderBase::new(stage, prim_id, path.clone());

        if params.use_instancing && prim.is_instance() {
            let proto = prim.internal_reference()?.clone();
            self.request_prototype(&proto, ProtoRoot::Children);
            return Some(Box::new(InstanceReader::new(base, InstanceSource::Prototype(proto))));
        }

        let reader: Box<dyn PrimReader> = match type_name {
            "Xform" | "Scope" => Box::new(XformReader::new(base)),
            "Camera" if params.import_cameras => Box::new(CameraReader::new(base)),
            t if LIGHT_TYPES.contains(&t) && params.import_lights => Box::new(LightReader::new(base)),
            "DomeLight" if params.import_lights => {
                self.dome_lights.push(prim_id);
                return None;
            }
            "Mesh" if params.import_meshes => Box::new(MeshReader::new(base)),
            "PointInstancer" => {
                let targets = prim.relationship("prototypes").map(|r| r.targets.clone()).unwrap_or_default();
                for target in &targets {
                    self.request_prototype(target, ProtoRoot::Prim);
                }
                Box::new(InstanceReader::new(base, InstanceSource::PointInstancer(targets)))
            }
            _ => return None,
        };
        Some(reader)
    }

    fn visit(&mut self, prim_id: PrimId, path: SdfPath, parent: Option<ReaderId>, in_proto: bool, out: &mut Vec<ReaderId>) {
        let stage = self.stage;
        let prim = stage.prim(prim_id);
        if self.is_pruned(prim, &path, in_proto) {
            return;
        }
        let type_name = effective_type(stage, prim);

        let mut child_parent = parent;
        if self.is_included(prim, type_name) {
            if let Some(mut reader) = self.create_reader(prim_id, &path, type_name) {
                let base = reader.base_mut();
                base.parent = parent;
                base.in_prototype = in_proto;
                let id = ReaderId(self.arena.len());
                self.arena.push(Some(reader));
                out.push(id);
                child_parent = Some(id);
            }
        }

        if type_name == "PointInstancer" {
            // Prototypes are read through the instancer only.
            return;
        }
        if prim.is_instance() {
            let instanced = child_parent
                .and_then(|id| self.arena[id.0].as_ref())
                .is_some_and(|r| r.as_instance().is_some());
            if instanced || !self.params.import_instance_proxies {
                return;
            }
        }
        let target = reference_target(stage, prim_id, &self.composing);
        self.composing.extend(target);
        for child in composed_children(stage, prim_id, target) {
            let child_path = path.append_child(&stage.prim(child).name);
            self.visit(child, child_path, child_parent, in_proto, out);
        }
        if target.is_some() {
            self.composing.pop();
        }
    }
}

/// Let single children without their own transform absorb their parent
/// `Xform`. Returns the ids of absorbed parents, whose slots are emptied.
fn merge_with_parents(stage: &Stage, arena: &mut [Option<Box<dyn PrimReader>>]) -> HashSet<ReaderId> {
    let mut child_counts: HashMap<ReaderId, usize> = HashMap::new();
    for reader in arena.iter().flatten() {
        if let Some(parent) = reader.parent() {
            *child_counts.entry(parent).or_default() += 1;
        }
    }

    let mut removed = HashSet::new();
    for index in (0..arena.len()).rev() {
        let Some(reader) = arena[index].as_ref() else {
            continue;
        };
        let base = reader.base();
        let Some(parent_id) = base.parent else {
            continue;
        };
        let prim = stage.prim(base.prim);
        if base.use_parent_xform
            || reader.as_instance().is_some()
            || matches!(prim.type_name.as_str(), "Xform" | "Scope")
            || xform::has_xform_ops(prim)
        {
            continue;
        }
        let Some(parent) = arena[parent_id.0].as_ref() else {
            continue;
        };
        let parent_base = parent.base();
        let direct_child = base.path.parent().as_ref() == Some(&parent_base.path);
        if !direct_child
            || parent.as_instance().is_some()
            || !stage.prim(parent_base.prim).is_a("Xform")
            || child_counts.get(&parent_id).copied() != Some(1)
        {
            continue;
        }

        let (parent_prim, parent_path, grandparent) =
            (parent_base.prim, parent_base.path.clone(), parent_base.parent);
        if let Some(reader) = arena[index].as_mut() {
            let base = reader.base_mut();
            base.merge_parent_xform(parent_prim, parent_path);
            base.parent = grandparent;
        }
        debug!("Merged {} into its child", arena[parent_id.0].as_ref().map_or("?", |r| r.path().as_str()));
        arena[parent_id.0] = None;
        removed.insert(parent_id);
    }
    removed
}

/// A reader is a root when it is outside prototypes, its transform prim is
/// xformable and no ancestor reader's prim is.
fn mark_roots(stage: &Stage, arena: &mut [Option<Box<dyn PrimReader>>]) {
    let roots: Vec<bool> = arena
        .iter()
        .map(|slot| {
            let Some(reader) = slot else {
                return false;
            };
            let base = reader.base();
            if base.in_prototype || !xform::is_xformable_type(&stage.prim(base.xform_prim).type_name) {
                return false;
            }
            let mut parent = base.parent;
            while let Some(id) = parent {
                let Some(ancestor) = arena[id.0].as_ref() else {
                    break;
                };
                if xform::is_xformable_type(&stage.prim(ancestor.base().prim).type_name) {
                    return false;
                }
                parent = ancestor.parent();
            }
            true
        })
        .collect();

    for (slot, is_root) in arena.iter_mut().zip(roots) {
        if let Some(reader) = slot {
            reader.base_mut().is_root = is_root;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::PurposeFilter;
    use crate::reader::ReaderKind;
    use usdio_core::scene::{AreaShape, LightType, ObjectData};

    const SCENE: &str = r#"#usda 1.0
(
    upAxis = "Y"
)

def Xform "Root"
{
    double3 xformOp:translate = (0, 1, 0)
    uniform token[] xformOpOrder = ["xformOp:translate"]

    def Mesh "Body"
    {
        int[] faceVertexCounts = [3]
        int[] faceVertexIndices = [0, 1, 2]
        point3f[] points = [(0, 0, 0), (1, 0, 0), (0, 1, 0)]
    }
}

def DiskLight "Key"
{
    float inputs:radius = 0.75
}
"#;

    fn reader_for(usda: &str, params: ImportParams) -> (StageReader, Scene) {
        let stage = Stage::from_usda(usda).unwrap();
        let mut reader = StageReader::new(stage, params);
        let mut scene = Scene::default();
        reader.collect_readers(&mut scene);
        let ids: Vec<ReaderId> = reader.readers().to_vec();
        let time = reader.settings().read_time;
        for id in ids {
            reader.read_reader(id, &mut scene, time);
        }
        reader.resolve_parents(&mut scene);
        (reader, scene)
    }

    fn kinds(reader: &StageReader) -> Vec<(String, ReaderKind)> {
        reader
            .readers()
            .iter()
            .map(|id| {
                let r = reader.reader(*id).unwrap();
                (r.path().to_string(), r.kind())
            })
            .collect()
    }

    #[test]
    fn test_mesh_absorbs_single_parent_xform() {
        let params = ImportParams {
            purpose: PurposeFilter::default_only(),
            ..Default::default()
        };
        let (reader, scene) = reader_for(SCENE, params);

        assert_eq!(scene.object_count(), 2);
        assert_eq!(
            kinds(&reader),
            vec![
                ("/Root/Body".to_string(), ReaderKind::Mesh),
                ("/Key".to_string(), ReaderKind::Light)
            ]
        );

        let body = scene.find_object("Body").unwrap();
        let object = scene.object(body).unwrap();
        assert!(object.parent.is_none());
        // Uses the absorbed Xform's translation
        assert_eq!(object.matrix.w_axis.truncate(), usdio_math::Vec3::new(0.0, 1.0, 0.0));

        let key = scene.find_object("Key").unwrap();
        match &scene.object(key).unwrap().data {
            ObjectData::Light(light) => {
                assert_eq!(light.light_type, LightType::Area);
                assert_eq!(light.area_shape, AreaShape::Disk);
                assert!((light.area_size - 1.5).abs() < 1e-6);
            }
            other => panic!("Expected light, got {:?}", other),
        }
    }

    #[test]
    fn test_readers_created_after_parents() {
        let usda = r#"#usda 1.0
def Xform "A"
{
    def Xform "B"
    {
        def Camera "Cam"
        {
        }
        def Camera "Cam2"
        {
        }
    }
}
"#;
        let (reader, scene) = reader_for(usda, ImportParams::default());
        for id in reader.readers() {
            if let Some(parent) = reader.reader(*id).unwrap().parent() {
                assert!(parent < *id);
            }
        }
        assert_eq!(scene.object_count(), 4);
        let b = scene.find_object("B").unwrap();
        let cam = scene.find_object("Cam").unwrap();
        assert_eq!(scene.object(cam).unwrap().parent, Some(b));
        assert_eq!(scene.object(b).unwrap().parent, scene.find_object("A"));
    }

    #[test]
    fn test_purpose_filter_skips_without_pruning() {
        let usda = r#"#usda 1.0
def Xform "Root"
{
    def Xform "Guides"
    {
        uniform token purpose = "guide"
        double3 xformOp:translate = (1, 0, 0)
        uniform token[] xformOpOrder = ["xformOp:translate"]

        def Xform "Kept"
        {
            double3 xformOp:translate = (0, 0, 1)
            uniform token[] xformOpOrder = ["xformOp:translate"]
        }
    }
}
"#;
        let (reader, scene) = reader_for(usda, ImportParams::default());
        assert!(scene.find_object("Guides").is_none());
        let kept = scene.find_object("Kept").unwrap();
        let root = scene.find_object("Root").unwrap();
        assert_eq!(scene.object(kept).unwrap().parent, Some(root));
        let kept_reader = reader
            .readers()
            .iter()
            .map(|id| reader.reader(*id).unwrap())
            .find(|r| r.path().as_str() == "/Root/Guides/Kept")
            .unwrap();
        assert!(!kept_reader.base().is_root);
    }

    #[test]
    fn test_invisible_prims_skipped() {
        let usda = r#"#usda 1.0
def Xform "Hidden"
{
    token visibility = "invisible"
}

def Xform "Blinking"
{
    token visibility.timeSamples = {
        1: "invisible",
        2: "inherited",
    }
}
"#;
        let (_, scene) = reader_for(usda, ImportParams::default());
        assert!(scene.find_object("Hidden").is_none());
        assert!(scene.find_object("Blinking").is_some());

        let params = ImportParams {
            import_visible_only: false,
            ..Default::default()
        };
        let (_, scene) = reader_for(usda, params);
        assert!(scene.find_object("Hidden").is_some());
    }

    #[test]
    fn test_path_mask_and_unsupported_types() {
        let usda = r#"#usda 1.0
def Xform "World"
{
    def Xform "Props"
    {
        def Camera "PropCam"
        {
        }
    }
    def Xform "Sets"
    {
    }
    def BasisCurves "Hair"
    {
    }
}
"#;
        let params = ImportParams {
            prim_path_mask: "/World/Props".to_string(),
            ..Default::default()
        };
        let (_, scene) = reader_for(usda, params);
        assert!(scene.find_object("World").is_some());
        assert!(scene.find_object("PropCam").is_some());
        assert!(scene.find_object("Sets").is_none());

        let (_, scene) = reader_for(usda, ImportParams::default());
        assert!(scene.find_object("Hair").is_none());
        // PropCam absorbed Props
        assert!(scene.find_object("Props").is_none());
        assert_eq!(scene.object_count(), 3);
    }

    #[test]
    fn test_y_up_conversion_on_roots_only() {
        let usda = r#"#usda 1.0
(
    upAxis = "Y"
)
def Xform "Root"
{
    def Xform "Child"
    {
        double3 xformOp:translate = (0, 1, 0)
        uniform token[] xformOpOrder = ["xformOp:translate"]
    }
    def Xform "Sibling"
    {
    }
}
"#;
        let params = ImportParams {
            convert_to_z_up: true,
            ..Default::default()
        };
        let (_, scene) = reader_for(usda, params);
        let root = scene.object(scene.find_object("Root").unwrap()).unwrap();
        let child = scene.object(scene.find_object("Child").unwrap()).unwrap();

        // Y up becomes Z up on the root
        let up = root.matrix.transform_vector3(usdio_math::Vec3::Y);
        assert!((up - usdio_math::Vec3::Z).length() < 1e-5);
        // Child keeps its authored local transform
        assert_eq!(child.matrix, usdio_math::Mat4::from_translation(usdio_math::Vec3::Y));
    }

    #[test]
    fn test_dome_lights_collected_separately() {
        let usda = r#"#usda 1.0
def DomeLight "Sky"
{
    float inputs:intensity = 2
}
"#;
        let (reader, scene) = reader_for(usda, ImportParams::default());
        assert_eq!(reader.dome_lights().len(), 1);
        assert_eq!(scene.object_count(), 0);
    }

    const INSTANCES: &str = r#"#usda 1.0
class Xform "Proto"
{
    def Mesh "Leaf"
    {
        int[] faceVertexCounts = [3]
        int[] faceVertexIndices = [0, 1, 2]
        point3f[] points = [(0, 0, 0), (1, 0, 0), (0, 1, 0)]
    }
}

def Xform "A" (
    instanceable = true
    references = </Proto>
)
{
}

def Xform "B" (
    instanceable = true
    references = </Proto>
)
{
}
"#;

    #[test]
    fn test_instancing_collects_prototype_once() {
        let params = ImportParams {
            use_instancing: true,
            ..Default::default()
        };
        let (reader, scene) = reader_for(INSTANCES, params);
        assert_eq!(reader.proto_readers().len(), 1);
        let protos = &reader.proto_readers()[&SdfPath::new("/Proto")];
        assert_eq!(protos.len(), 1);
        let leaf = reader.reader(protos[0]).unwrap();
        assert!(leaf.base().in_prototype);
        assert!(!leaf.base().is_root);
        assert!(reader.readers().iter().all(|id| reader.reader(*id).unwrap().as_instance().is_some()));
        assert_eq!(scene.object_count(), 3);
    }

    #[test]
    fn test_instance_proxies_traversed_in_place() {
        let (reader, scene) = reader_for(INSTANCES, ImportParams::default());
        assert!(reader.proto_readers().is_empty());
        let paths: Vec<String> = kinds(&reader).into_iter().map(|(p, _)| p).collect();
        assert_eq!(paths, vec!["/A/Leaf".to_string(), "/B/Leaf".to_string()]);
        // Each leaf absorbed its instance Xform
        assert_eq!(scene.object_count(), 2);

        let leaf = resolve_scene_path(reader.stage(), &SdfPath::new("/B/Leaf")).unwrap();
        assert_eq!(reader.stage().prim(leaf).path.as_str(), "/Proto/Leaf");
    }

    #[test]
    fn test_point_instancer_prototypes() {
        let usda = r#"#usda 1.0
def PointInstancer "Forest"
{
    rel prototypes = [</Forest/Protos/Tree>]
    int[] protoIndices = [0, 0]
    point3f[] positions = [(0, 0, 0), (3, 0, 0)]

    def Scope "Protos"
    {
        def Xform "Tree"
        {
            def Mesh "Trunk"
            {
                double3 xformOp:translate = (0, 1, 0)
                uniform token[] xformOpOrder = ["xformOp:translate"]
            }
            def Mesh "Crown"
            {
            }
        }
    }
}
"#;
        let (reader, scene) = reader_for(usda, ImportParams::default());
        assert_eq!(kinds(&reader), vec![("/Forest".to_string(), ReaderKind::Instance)]);
        let protos = &reader.proto_readers()[&SdfPath::new("/Forest/Protos/Tree")];
        assert_eq!(protos.len(), 3);
        assert_eq!(scene.object_count(), 4);

        let tree = scene.find_object("Tree").unwrap();
        let trunk = scene.find_object("Trunk").unwrap();
        assert_eq!(scene.object(trunk).unwrap().parent, Some(tree));
        assert!(scene.object(tree).unwrap().parent.is_none());
    }

    #[test]
    fn test_cyclic_reference_stops_at_repeat() {
        let usda = r#"#usda 1.0
def Xform "A"
{
    def Xform "B" (
        references = </A>
    )
    {
    }
}
"#;
        let (reader, scene) = reader_for(usda, ImportParams::default());
        let paths: Vec<String> = kinds(&reader).into_iter().map(|(p, _)| p).collect();
        assert_eq!(paths, vec!["/A".to_string(), "/A/B".to_string(), "/A/B/B".to_string()]);
        assert_eq!(scene.object_count(), 3);

        let stage = reader.stage();
        assert!(resolve_scene_path(stage, &SdfPath::new("/A/B/B")).is_some());
        assert!(resolve_scene_path(stage, &SdfPath::new("/A/B/B/B")).is_none());
    }

    #[test]
    fn test_free_objects() {
        let (mut reader, mut scene) = reader_for(SCENE, ImportParams::default());
        assert_eq!(scene.object_count(), 2);
        reader.free_objects(&mut scene);
        assert_eq!(scene.object_count(), 0);
        assert!(reader.readers().iter().all(|id| reader.reader(*id).unwrap().object().is_none()));
    }
}
