//! Export graph construction and writer dispatch.

use std::collections::{BTreeMap, HashMap, HashSet};

use log::{debug, warn};
use usdio_core::scene::{CollectionId, Modifier, Object, ObjectData, ObjectId, Scene};
use usdio_core::usd::{make_valid_identifier, SdfPath, Stage, TimeCode};
use usdio_math::{axis_conversion, Axis, Mat4};

use super::light::write_world;
use super::{
    CameraWriter, ExportContext, HierarchyContext, LightWriter, MeshWriter, PrimWriter, TransformWriter,
};
use crate::params::ExportParams;

/// The prims one frame of export produces.
#[derive(Clone, Debug, Default)]
pub struct ExportGraph {
    /// Depth first, parents before children.
    pub contexts: Vec<HierarchyContext>,
    /// `class` prims holding instanced collections.
    pub prototypes: Vec<SdfPath>,
}

/// How a subtree is being visited.
#[derive(Clone, Copy, PartialEq)]
enum Mode {
    /// Regular scene objects, filtered by the export parameters.
    Scene,
    /// Contents of an instanced collection; only type filters apply.
    Collection { in_prototype: bool },
}

struct GraphBuilder<'a> {
    scene: &'a Scene,
    params: &'a ExportParams,
    included: HashSet<ObjectId>,
    used_paths: HashSet<SdfPath>,
    prototypes: BTreeMap<CollectionId, SdfPath>,
    pending: Vec<CollectionId>,
    /// Collections being realised, to stop self-instancing loops.
    realising: Vec<CollectionId>,
    root_conversion: Mat4,
    out: ExportGraph,
}

impl<'a> GraphBuilder<'a> {
    fn exports_data(&self, data: &ObjectData) -> bool {
        match data {
            ObjectData::Mesh(_) => self.params.export_meshes,
            ObjectData::Camera(_) => self.params.export_cameras,
            ObjectData::Light(_) => self.params.export_lights,
            ObjectData::Empty | ObjectData::PointInstances(_) => true,
        }
    }

    fn passes_filters(&self, id: ObjectId, object: &Object) -> bool {
        if self.params.selected_objects_only && !object.selected {
            return false;
        }
        if self.params.visible_objects_only && !self.scene.is_object_visible(id) {
            return false;
        }
        self.exports_data(&object.data)
    }

    fn sorted_by_name(&self, mut ids: Vec<ObjectId>) -> Vec<ObjectId> {
        ids.sort_by(|a, b| {
            let name = |id: &ObjectId| self.scene.object(*id).map(|o| o.name.clone()).unwrap_or_default();
            name(a).cmp(&name(b))
        });
        ids
    }

    /// Unique child path of `parent` for `name`.
    fn child_path(&mut self, parent: &SdfPath, name: &str) -> SdfPath {
        let base = make_valid_identifier(name);
        let mut path = parent.append_child(&base);
        let mut n = 1;
        while self.used_paths.contains(&path) {
            path = parent.append_child(&format!("{}_{:03}", base, n));
            n += 1;
        }
        self.used_paths.insert(path.clone());
        path
    }

    fn is_animated(&self, object: &Object) -> bool {
        self.params.export_animation
            && (object.keyframes.len() > 1
                || !object.constraints.is_empty()
                || object
                    .modifiers
                    .iter()
                    .any(|m| matches!(m, Modifier::MeshSequenceCache { .. })))
    }

    fn prototype_path(&mut self, collection: CollectionId, root: &SdfPath) -> SdfPath {
        if let Some(path) = self.prototypes.get(&collection) {
            return path.clone();
        }
        let name = self
            .scene
            .collection(collection)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| "prototype".to_string());
        let path = self.child_path(&root.append_child("prototypes"), &name);
        self.prototypes.insert(collection, path.clone());
        self.pending.push(collection);
        path
    }

    /// Objects of `collection` whose parent is not in it.
    fn collection_roots(&self, collection: CollectionId) -> Vec<ObjectId> {
        let Some(c) = self.scene.collection(collection) else {
            return Vec::new();
        };
        let roots = c
            .objects
            .iter()
            .copied()
            .filter(|id| {
                self.scene
                    .object(*id)
                    .and_then(|o| o.parent)
                    .map_or(true, |p| !c.contains(p))
            })
            .collect();
        self.sorted_by_name(roots)
    }

    fn visit(&mut self, id: ObjectId, parent_path: &SdfPath, is_root: bool, mode: Mode, root: &SdfPath) {
        let scene = self.scene;
        let Some(object) = scene.object(id) else {
            return;
        };
        let export_path = self.child_path(parent_path, &object.name);
        let exported = match mode {
            Mode::Scene => self.passes_filters(id, object),
            Mode::Collection { .. } => self.exports_data(&object.data),
        };

        let mut matrix = object.matrix;
        if is_root && mode == Mode::Scene {
            matrix = self.root_conversion * matrix;
        }

        let has_writer = matches!(
            object.data,
            ObjectData::Mesh(_) | ObjectData::Camera(_) | ObjectData::Light(_)
        );
        let data_path = (exported && has_writer).then(|| {
            if self.params.merge_transform_and_shape {
                export_path.clone()
            } else {
                export_path.append_child(&make_valid_identifier(&object.name))
            }
        });

        let mut instance_of = None;
        let mut realise = None;
        if let (true, Some(collection)) = (exported, object.instance_collection) {
            if self.params.use_instancing {
                instance_of = Some(self.prototype_path(collection, root));
            } else if !self.realising.contains(&collection) {
                realise = Some(collection);
            } else {
                warn!("{} instances a collection it belongs to", object.name);
            }
        }

        self.out.contexts.push(HierarchyContext {
            object: id,
            export_path: export_path.clone(),
            data_path,
            matrix,
            is_animated: self.is_animated(object),
            instance_of,
            in_prototype: matches!(mode, Mode::Collection { in_prototype: true }),
        });

        if let Some(collection) = realise {
            self.realising.push(collection);
            let in_prototype = matches!(mode, Mode::Collection { in_prototype: true });
            for child in self.collection_roots(collection) {
                self.visit(child, &export_path, false, Mode::Collection { in_prototype }, root);
            }
            self.realising.pop();
        }

        let children: Vec<ObjectId> = match mode {
            Mode::Scene => scene
                .children_of(id)
                .into_iter()
                .filter(|c| self.included.contains(c))
                .collect(),
            Mode::Collection { .. } => scene.children_of(id),
        };
        for child in self.sorted_by_name(children) {
            self.visit(child, &export_path, false, mode, root);
        }
    }
}

/// Walks the scene and drives one writer set per export path.
pub struct HierarchyIterator {
    params: ExportParams,
    writers: HashMap<SdfPath, Vec<Box<dyn PrimWriter>>>,
    root_conversion: Mat4,
    world_written: bool,
}

impl HierarchyIterator {
    pub fn new(params: ExportParams) -> Self {
        let root_conversion = if params.convert_orientation {
            match axis_conversion(Axis::Y, Axis::Z, params.forward_axis, params.up_axis) {
                Some(m) => Mat4::from_mat3(m),
                None => {
                    warn!(
                        "Invalid axis pair {:?}/{:?}, exporting without conversion",
                        params.forward_axis, params.up_axis
                    );
                    Mat4::IDENTITY
                }
            }
        } else {
            Mat4::IDENTITY
        };
        Self {
            params,
            writers: HashMap::new(),
            root_conversion,
            world_written: false,
        }
    }

    pub fn params(&self) -> &ExportParams {
        &self.params
    }

    /// Prim all exported roots live under.
    pub fn root_path(&self) -> SdfPath {
        if self.params.root_prim_path.is_empty() {
            SdfPath::root()
        } else {
            SdfPath::new(&self.params.root_prim_path)
        }
    }

    pub fn writer_count(&self) -> usize {
        self.writers.values().map(Vec::len).sum()
    }

    /// Build the export graph for the scene's current state.
    pub fn build_export_graph(&self, scene: &Scene) -> ExportGraph {
        let mut builder = GraphBuilder {
            scene,
            params: &self.params,
            included: HashSet::new(),
            used_paths: HashSet::new(),
            prototypes: BTreeMap::new(),
            pending: Vec::new(),
            realising: Vec::new(),
            root_conversion: self.root_conversion,
            out: ExportGraph::default(),
        };

        // Exported objects pull in their ancestors as plain transforms.
        for (id, object) in scene.objects() {
            if builder.passes_filters(id, object) {
                let mut current = Some(id);
                while let Some(c) = current {
                    if !builder.included.insert(c) {
                        break;
                    }
                    current = scene.object(c).and_then(|o| o.parent);
                }
            }
        }

        let root = self.root_path();
        let roots: Vec<ObjectId> = scene
            .objects()
            .filter(|(id, o)| builder.included.contains(id) && o.parent.is_none())
            .map(|(id, _)| id)
            .collect();
        for id in builder.sorted_by_name(roots) {
            builder.visit(id, &root, true, Mode::Scene, &root);
        }

        // Prototypes can instance further collections.
        let mut written = 0;
        while written < builder.pending.len() {
            let collection = builder.pending[written];
            written += 1;
            let Some(proto_path) = builder.prototypes.get(&collection).cloned() else {
                continue;
            };
            builder.realising.push(collection);
            for id in builder.collection_roots(collection) {
                builder.visit(id, &proto_path, false, Mode::Collection { in_prototype: true }, &root);
            }
            builder.realising.pop();
        }

        let GraphBuilder { mut out, prototypes, .. } = builder;
        out.prototypes = prototypes.into_values().collect();
        out
    }

    /// Write every exported object at `time`. Returns the number of
    /// hierarchy contexts written.
    pub fn iterate_and_write(&mut self, stage: &mut Stage, scene: &Scene, time: TimeCode) -> usize {
        let graph = self.build_export_graph(scene);
        for proto in &graph.prototypes {
            if stage.define_class(proto, "Xform").is_none() {
                warn!("Could not define prototype {}", proto);
            }
        }

        let ctx = ExportContext {
            scene,
            params: &self.params,
            time,
        };
        for hier in &graph.contexts {
            let writers = self
                .writers
                .entry(hier.export_path.clone())
                .or_insert_with(|| create_writers(scene, hier));
            for writer in writers.iter_mut() {
                writer.write(stage, &ctx, hier);
            }
        }

        if !self.world_written && self.params.export_lights && !self.params.selected_objects_only {
            if let Some(world) = &scene.world {
                let root = self.root_path();
                if write_world(stage, &self.params, world, &root).is_some() {
                    self.world_written = true;
                }
            }
        }
        graph.contexts.len()
    }

    /// Drop all writers; the next write creates fresh ones.
    pub fn release_writers(&mut self) {
        debug!("Releasing {} writers", self.writer_count());
        self.writers.clear();
        self.world_written = false;
    }
}

fn create_writers(scene: &Scene, hier: &HierarchyContext) -> Vec<Box<dyn PrimWriter>> {
    let mut writers: Vec<Box<dyn PrimWriter>> = vec![Box::new(TransformWriter::new(hier.export_path.clone()))];
    let (Some(data_path), Some(object)) = (&hier.data_path, scene.object(hier.object)) else {
        return writers;
    };
    match &object.data {
        ObjectData::Mesh(_) => writers.push(Box::new(MeshWriter::new(data_path.clone()))),
        ObjectData::Camera(_) => writers.push(Box::new(CameraWriter::new(data_path.clone()))),
        ObjectData::Light(_) => writers.push(Box::new(LightWriter::new(data_path.clone()))),
        ObjectData::Empty | ObjectData::PointInstances(_) => {}
    }
    writers
}
