//! Cache file handles.
//!
//! Imported objects with animated transforms or deforming meshes keep a
//! link back to the stage through a cache file. A [`CacheSession`] reopens
//! those stages and re-reads the linked prims when the scene frame changes.
//!
//! Handles are single-threaded: a [`CacheReader`] is shared between every
//! constraint and modifier that reads the same prim and is dropped with the
//! last of them.

use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

use log::{debug, warn};
use usdio_core::mesh::Mesh;
use usdio_core::scene::{CacheFileId, MeshReadFlags, ObjectData, ObjectId, Recalc, Scene};
use usdio_core::usd::{xform, PrimId, SdfPath, Stage, TimeCode};
use usdio_math::{Mat4, Vec3};

use crate::error::{IoError, IoResult};
use crate::params::ImportParams;
use crate::reader::{read_mesh_data, resolve_scene_path};
use crate::settings::ImportSettings;

struct Archive {
    stage: Stage,
    settings: ImportSettings,
}

/// An open stage kept around for re-reads.
#[derive(Clone)]
pub struct CacheArchiveHandle {
    archive: Rc<Archive>,
}

impl CacheArchiveHandle {
    pub fn open(path: impl AsRef<Path>, params: &ImportParams) -> IoResult<Self> {
        let path = path.as_ref();
        let stage = Stage::open(path).map_err(|e| IoError::from_stage(path, e))?;
        let settings = ImportSettings::for_stage(params, &stage);
        Ok(Self {
            archive: Rc::new(Archive { stage, settings }),
        })
    }

    pub fn from_stage(stage: Stage, params: &ImportParams) -> Self {
        let settings = ImportSettings::for_stage(params, &stage);
        Self {
            archive: Rc::new(Archive { stage, settings }),
        }
    }

    pub fn stage(&self) -> &Stage {
        &self.archive.stage
    }

    /// Paths of every traversable prim, children before their parents.
    pub fn object_paths(&self) -> Vec<SdfPath> {
        let stage = &self.archive.stage;
        let mut paths: Vec<SdfPath> = stage
            .traverse()
            .into_iter()
            .map(|id| stage.prim(id).path.clone())
            .filter(|p| !p.is_root())
            .collect();
        paths.reverse();
        paths
    }

    /// Reader for the prim at `object_path`.
    ///
    /// An empty path keeps `previous`, as does a path `previous` already
    /// reads. Prims without a cache reader give `None`.
    pub fn open_object(&self, object_path: &str, previous: Option<CacheReader>) -> Option<CacheReader> {
        if object_path.is_empty() {
            return previous;
        }
        let path = SdfPath::new(object_path);
        if let Some(prev) = previous {
            if prev.path() == &path && Rc::ptr_eq(&prev.inner.archive, &self.archive) {
                return Some(prev);
            }
        }

        let stage = &self.archive.stage;
        let Some(prim) = resolve_scene_path(stage, &path) else {
            warn!("No prim at {} in cache", path);
            return None;
        };
        let type_name = stage.prim(prim).type_name.as_str();
        if !xform::is_xformable_type(type_name) && type_name != "Scope" {
            debug!("No cache reader for {} ({})", path, type_name);
            return None;
        }
        Some(CacheReader {
            inner: Rc::new(CachedPrim {
                archive: Rc::clone(&self.archive),
                prim,
                path,
            }),
        })
    }
}

struct CachedPrim {
    archive: Rc<Archive>,
    prim: PrimId,
    path: SdfPath,
}

/// Shared handle to one prim of a cache archive.
#[derive(Clone)]
pub struct CacheReader {
    inner: Rc<CachedPrim>,
}

impl CacheReader {
    pub fn path(&self) -> &SdfPath {
        &self.inner.path
    }

    /// Number of live handles to this reader.
    pub fn refcount(&self) -> usize {
        Rc::strong_count(&self.inner)
    }

    fn stage(&self) -> &Stage {
        &self.inner.archive.stage
    }

    fn is_mesh(&self) -> bool {
        self.stage().prim(self.inner.prim).type_name == "Mesh"
    }

    /// Re-read the parts of `existing` selected by `flags` at `time`.
    pub fn read_mesh(&self, existing: &Mesh, time: f64, flags: MeshReadFlags) -> Mesh {
        if !self.is_mesh() {
            return existing.clone();
        }
        read_mesh_data(self.stage().prim(self.inner.prim), time, flags, Some(existing))
    }

    /// Whether the prim's topology at `time` differs from `existing`.
    pub fn mesh_topology_changed(&self, existing: &Mesh, time: f64) -> bool {
        if !self.is_mesh() {
            return false;
        }
        let read = read_mesh_data(self.stage().prim(self.inner.prim), time, MeshReadFlags::ALL, None);
        !read.topology_matches(existing)
    }

    /// World matrix of the prim at `time`, with the import scale and axis
    /// conversion applied on top.
    pub fn get_transform(&self, time: f64) -> Mat4 {
        let stage = self.stage();
        let t = TimeCode::Time(time);
        let mut world = Mat4::IDENTITY;
        let mut lineage: Vec<SdfPath> = self.inner.path.ancestors().filter(|p| !p.is_root()).collect();
        lineage.reverse();
        for path in lineage {
            if let Some(id) = resolve_scene_path(stage, &path) {
                world *= xform::local_transform(stage.prim(id), t).as_mat4();
            }
        }
        world *= xform::local_transform(stage.prim(self.inner.prim), t).as_mat4();

        let settings = &self.inner.archive.settings;
        if settings.scale != 1.0 {
            world = Mat4::from_scale(Vec3::splat(settings.scale)) * world;
        }
        if settings.do_convert_mat {
            world = settings.conversion_mat * world;
        }
        world
    }
}

enum Binding {
    Transform,
    Mesh(MeshReadFlags),
}

struct CacheBinding {
    object: ObjectId,
    cache_file: CacheFileId,
    binding: Binding,
    reader: CacheReader,
    /// Parent depth; parents are evaluated first.
    depth: usize,
}

/// Readers for every object in a scene that reads from a cache file.
pub struct CacheSession {
    bindings: Vec<CacheBinding>,
}

impl CacheSession {
    /// Open the cache files `scene` refers to. `params` supplies the axis
    /// conversion; each cache file supplies its own scale.
    pub fn new(scene: &Scene, params: &ImportParams) -> Self {
        let mut archives: HashMap<CacheFileId, Option<CacheArchiveHandle>> = HashMap::new();
        let mut readers: HashMap<(CacheFileId, String), CacheReader> = HashMap::new();
        let mut bindings = Vec::new();

        for (id, object) in scene.objects() {
            let mut wanted = Vec::new();
            if let Some((cache_file, path)) = object.transform_cache() {
                wanted.push((cache_file, path.to_string(), Binding::Transform));
            }
            if let Some((cache_file, path, flags)) = object.mesh_cache() {
                wanted.push((cache_file, path.to_string(), Binding::Mesh(flags)));
            }

            for (cache_file, path, binding) in wanted {
                let archive = archives.entry(cache_file).or_insert_with(|| {
                    let file = scene.cache_file(cache_file)?;
                    let params = ImportParams {
                        scale: file.scale,
                        apply_unit_conversion_scale: false,
                        ..params.clone()
                    };
                    match CacheArchiveHandle::open(&file.filepath, &params) {
                        Ok(handle) => Some(handle),
                        Err(e) => {
                            warn!("Could not open cache file {}: {}", file.filepath.display(), e);
                            None
                        }
                    }
                });
                let Some(archive) = archive.as_ref() else {
                    continue;
                };

                let key = (cache_file, path);
                let reader = match readers.get(&key) {
                    Some(reader) => reader.clone(),
                    None => match archive.open_object(&key.1, None) {
                        Some(reader) => {
                            readers.insert(key.clone(), reader.clone());
                            reader
                        }
                        None => continue,
                    },
                };
                bindings.push(CacheBinding {
                    object: id,
                    cache_file,
                    binding,
                    reader,
                    depth: parent_depth(scene, id),
                });
            }
        }
        bindings.sort_by_key(|b| b.depth);
        debug!("Cache session with {} bindings, {} readers", bindings.len(), readers.len());
        Self { bindings }
    }

    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    /// Readers in use, one per bound object and cache path.
    pub fn readers(&self) -> impl Iterator<Item = &CacheReader> {
        self.bindings.iter().map(|b| &b.reader)
    }

    /// Re-read every bound object at scene frame `frame`.
    pub fn evaluate(&self, scene: &mut Scene, frame: f64) {
        for b in &self.bindings {
            let Some(time) = scene.cache_file(b.cache_file).map(|c| c.sample_time(frame)) else {
                continue;
            };
            match b.binding {
                Binding::Transform => {
                    let world = b.reader.get_transform(time);
                    let parent_world = scene
                        .object(b.object)
                        .and_then(|o| o.parent)
                        .map_or(Mat4::IDENTITY, |p| scene.world_matrix(p));
                    if let Some(object) = scene.object_mut(b.object) {
                        object.matrix = parent_world.inverse() * world;
                        object.recalc.insert(Recalc::TRANSFORM);
                    }
                }
                Binding::Mesh(flags) => {
                    let Some(object) = scene.object_mut(b.object) else {
                        continue;
                    };
                    let ObjectData::Mesh(mesh) = &mut object.data else {
                        continue;
                    };
                    let flags = if b.reader.mesh_topology_changed(mesh, time) {
                        MeshReadFlags::ALL
                    } else {
                        flags
                    };
                    let material = mesh.material;
                    *mesh = b.reader.read_mesh(mesh, time, flags);
                    mesh.material = material;
                    object.recalc.insert(Recalc::GEOMETRY);
                }
            }
        }
    }
}

fn parent_depth(scene: &Scene, id: ObjectId) -> usize {
    let mut depth = 0;
    let mut current = scene.object(id).and_then(|o| o.parent);
    while let Some(p) = current {
        depth += 1;
        current = scene.object(p).and_then(|o| o.parent);
    }
    depth
}
