//! Host scene model.
//!
//! A `Scene` owns objects, collections, materials and cache files in flat
//! arenas addressed by typed ids. Freed objects leave a tombstone so ids
//! held elsewhere never alias a newer object.

mod cache_file;
mod camera;
mod collection;
mod light;
mod material;
mod object;

use std::collections::HashSet;

use log::debug;
use usdio_math::Mat4;

pub use cache_file::{CacheFile, CacheFileId};
pub use camera::{Camera, Projection};
pub use collection::{Collection, CollectionId};
pub use light::{AreaShape, Light, LightType};
pub use material::{Material, MaterialId, TextureSlots, World};
pub use object::{
    Constraint, Keyframe, MeshReadFlags, Modifier, Object, ObjectData, ObjectId, PointInstances,
    Recalc,
};

const MASTER_COLLECTION: CollectionId = CollectionId(0);

/// The host scene that USD stages are imported into and exported from.
#[derive(Clone, Debug)]
pub struct Scene {
    pub name: String,
    objects: Vec<Option<Object>>,
    collections: Vec<Option<Collection>>,
    active_collection: CollectionId,
    materials: Vec<Material>,
    cache_files: Vec<CacheFile>,
    active_object: Option<ObjectId>,

    pub world: Option<World>,
    pub world_recalc: bool,

    pub frame_current: f64,
    pub frame_start: i32,
    pub frame_end: i32,
    pub fps: f64,
    /// Scene units per metre is the inverse of this.
    pub unit_scale: f32,

    /// Set by jobs while they own the scene.
    pub interface_locked: bool,
    /// Parent or collection links changed since the last evaluation.
    pub relations_dirty: bool,
}

impl Scene {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            objects: Vec::new(),
            collections: vec![Some(Collection::new("Scene Collection"))],
            active_collection: MASTER_COLLECTION,
            materials: Vec::new(),
            cache_files: Vec::new(),
            active_object: None,
            world: None,
            world_recalc: false,
            frame_current: 1.0,
            frame_start: 1,
            frame_end: 250,
            fps: 24.0,
            unit_scale: 1.0,
            interface_locked: false,
            relations_dirty: false,
        }
    }

    // Objects

    /// Create an object that is not linked to any collection.
    ///
    /// The name is made unique with a `.001` style suffix.
    pub fn add_object_only(&mut self, name: &str, data: ObjectData) -> ObjectId {
        let name = unique_name(name, self.objects().map(|(_, o)| o.name.as_str()));
        let id = ObjectId(self.objects.len());
        self.objects.push(Some(Object::new(name, data)));
        id
    }

    pub fn object(&self, id: ObjectId) -> Option<&Object> {
        self.objects.get(id.0).and_then(Option::as_ref)
    }

    pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut Object> {
        self.objects.get_mut(id.0).and_then(Option::as_mut)
    }

    /// Live objects in creation order.
    pub fn objects(&self) -> impl Iterator<Item = (ObjectId, &Object)> {
        self.objects
            .iter()
            .enumerate()
            .filter_map(|(i, o)| o.as_ref().map(|o| (ObjectId(i), o)))
    }

    pub fn object_count(&self) -> usize {
        self.objects.iter().flatten().count()
    }

    pub fn find_object(&self, name: &str) -> Option<ObjectId> {
        self.objects()
            .find(|(_, o)| o.name == name)
            .map(|(id, _)| id)
    }

    /// Delete an object, unlink it everywhere and orphan its children.
    pub fn free_object(&mut self, id: ObjectId) -> bool {
        let Some(slot) = self.objects.get_mut(id.0) else {
            return false;
        };
        if slot.take().is_none() {
            return false;
        }
        for collection in self.collections.iter_mut().flatten() {
            collection.objects.retain(|&o| o != id);
        }
        for object in self.objects.iter_mut().flatten() {
            if object.parent == Some(id) {
                object.parent = None;
                object.recalc.insert(Recalc::TRANSFORM);
            }
        }
        if self.active_object == Some(id) {
            self.active_object = None;
        }
        self.relations_dirty = true;
        true
    }

    pub fn children_of(&self, id: ObjectId) -> Vec<ObjectId> {
        self.objects()
            .filter(|(_, o)| o.parent == Some(id))
            .map(|(child, _)| child)
            .collect()
    }

    /// Set `child`'s parent; refuses links that would form a cycle.
    pub fn set_parent(&mut self, child: ObjectId, parent: Option<ObjectId>) -> bool {
        if let Some(p) = parent {
            if self.object(p).is_none() || self.is_ancestor(child, p) {
                return false;
            }
        }
        match self.object_mut(child) {
            Some(object) => {
                object.parent = parent;
                object.recalc.insert(Recalc::TRANSFORM);
                self.relations_dirty = true;
                true
            }
            None => false,
        }
    }

    /// Whether `ancestor` is `id` or one of its parents.
    fn is_ancestor(&self, ancestor: ObjectId, id: ObjectId) -> bool {
        let mut current = Some(id);
        let mut seen = HashSet::new();
        while let Some(c) = current {
            if c == ancestor {
                return true;
            }
            if !seen.insert(c) {
                break;
            }
            current = self.object(c).and_then(|o| o.parent);
        }
        false
    }

    /// Object-to-world matrix following the parent chain.
    pub fn world_matrix(&self, id: ObjectId) -> Mat4 {
        let mut matrix = Mat4::IDENTITY;
        let mut current = Some(id);
        let mut seen = HashSet::new();
        while let Some(c) = current {
            if !seen.insert(c) {
                break;
            }
            let Some(object) = self.object(c) else { break };
            matrix = object.matrix * matrix;
            current = object.parent;
        }
        matrix
    }

    pub fn active_object(&self) -> Option<ObjectId> {
        self.active_object
    }

    pub fn set_active_object(&mut self, id: Option<ObjectId>) {
        self.active_object = id.filter(|&i| self.object(i).is_some());
    }

    pub fn deselect_all(&mut self) {
        for object in self.objects.iter_mut().flatten() {
            object.selected = false;
        }
    }

    // Collections

    pub fn master_collection(&self) -> CollectionId {
        MASTER_COLLECTION
    }

    pub fn active_collection(&self) -> CollectionId {
        self.active_collection
    }

    pub fn set_active_collection(&mut self, id: CollectionId) {
        if self.collection(id).is_some() {
            self.active_collection = id;
        }
    }

    /// Create a child collection of `parent` with a unique name.
    pub fn add_collection(&mut self, name: &str, parent: CollectionId) -> CollectionId {
        let parent = if self.collection(parent).is_some() {
            parent
        } else {
            MASTER_COLLECTION
        };
        let name = unique_name(name, self.collections().map(|(_, c)| c.name.as_str()));
        let id = CollectionId(self.collections.len());
        let mut collection = Collection::new(name);
        collection.parent = Some(parent);
        self.collections.push(Some(collection));
        if let Some(p) = self.collection_mut(parent) {
            p.children.push(id);
        }
        self.relations_dirty = true;
        id
    }

    pub fn collection(&self, id: CollectionId) -> Option<&Collection> {
        self.collections.get(id.0).and_then(Option::as_ref)
    }

    pub fn collection_mut(&mut self, id: CollectionId) -> Option<&mut Collection> {
        self.collections.get_mut(id.0).and_then(Option::as_mut)
    }

    pub fn collections(&self) -> impl Iterator<Item = (CollectionId, &Collection)> {
        self.collections
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.as_ref().map(|c| (CollectionId(i), c)))
    }

    pub fn find_collection(&self, name: &str) -> Option<CollectionId> {
        self.collections()
            .find(|(_, c)| c.name == name)
            .map(|(id, _)| id)
    }

    /// Remove a collection and its children. Objects stay in the scene.
    ///
    /// The master collection can't be removed.
    pub fn remove_collection(&mut self, id: CollectionId) -> bool {
        if id == MASTER_COLLECTION {
            return false;
        }
        let Some(collection) = self.collections.get_mut(id.0).and_then(Option::take) else {
            return false;
        };
        if let Some(parent) = collection.parent.and_then(|p| self.collection_mut(p)) {
            parent.children.retain(|&c| c != id);
        }
        for child in collection.children {
            self.remove_collection(child);
        }
        for object in self.objects.iter_mut().flatten() {
            if object.instance_collection == Some(id) {
                object.instance_collection = None;
            }
        }
        if self.active_collection == id {
            self.active_collection = MASTER_COLLECTION;
        }
        self.relations_dirty = true;
        debug!("Removed collection {}", collection.name);
        true
    }

    /// Link an object into a collection. Linking twice is a no-op.
    pub fn link_object(&mut self, collection: CollectionId, object: ObjectId) -> bool {
        if self.object(object).is_none() {
            return false;
        }
        match self.collection_mut(collection) {
            Some(c) => {
                if !c.contains(object) {
                    c.objects.push(object);
                }
                self.relations_dirty = true;
                true
            }
            None => false,
        }
    }

    pub fn object_collections(&self, object: ObjectId) -> Vec<CollectionId> {
        self.collections()
            .filter(|(_, c)| c.contains(object))
            .map(|(id, _)| id)
            .collect()
    }

    /// Whether a collection and every ancestor of it are shown.
    pub fn is_collection_visible(&self, id: CollectionId) -> bool {
        let mut current = Some(id);
        while let Some(c) = current {
            match self.collection(c) {
                Some(collection) if !collection.hidden => current = collection.parent,
                _ => return false,
            }
        }
        true
    }

    /// Visible objects are shown and linked into at least one visible collection.
    pub fn is_object_visible(&self, id: ObjectId) -> bool {
        self.object(id).is_some_and(|o| o.visible)
            && self
                .object_collections(id)
                .into_iter()
                .any(|c| self.is_collection_visible(c))
    }

    // Materials, cache files

    pub fn add_material(&mut self, material: Material) -> MaterialId {
        let id = MaterialId(self.materials.len());
        self.materials.push(material);
        id
    }

    pub fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id.0)
    }

    pub fn materials(&self) -> impl Iterator<Item = (MaterialId, &Material)> {
        self.materials
            .iter()
            .enumerate()
            .map(|(i, m)| (MaterialId(i), m))
    }

    pub fn find_material(&self, name: &str) -> Option<MaterialId> {
        self.materials().find(|(_, m)| m.name == name).map(|(id, _)| id)
    }

    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    pub fn add_cache_file(&mut self, cache_file: CacheFile) -> CacheFileId {
        let id = CacheFileId(self.cache_files.len());
        self.cache_files.push(cache_file);
        id
    }

    pub fn cache_file(&self, id: CacheFileId) -> Option<&CacheFile> {
        self.cache_files.get(id.0)
    }

    pub fn cache_file_mut(&mut self, id: CacheFileId) -> Option<&mut CacheFile> {
        self.cache_files.get_mut(id.0)
    }

    pub fn cache_files(&self) -> impl Iterator<Item = (CacheFileId, &CacheFile)> {
        self.cache_files
            .iter()
            .enumerate()
            .map(|(i, c)| (CacheFileId(i), c))
    }

    pub fn cache_file_count(&self) -> usize {
        self.cache_files.len()
    }

    /// Drop materials and cache files beyond the first `materials` and
    /// `cache_files`. Ids below those counts stay valid.
    pub fn truncate_data(&mut self, materials: usize, cache_files: usize) {
        self.materials.truncate(materials);
        self.cache_files.truncate(cache_files);
    }

    // Time

    /// Move to `frame` and apply keyframed transforms.
    pub fn set_frame(&mut self, frame: f64) {
        self.frame_current = frame;
        for object in self.objects.iter_mut().flatten() {
            if let Some(matrix) = object.evaluate_keyframes(frame) {
                object.matrix = matrix;
                object.recalc.insert(Recalc::TRANSFORM);
            }
        }
    }

    /// Total triangles across all mesh objects.
    pub fn total_triangle_count(&self) -> usize {
        self.objects()
            .filter_map(|(_, o)| o.mesh())
            .map(|m| m.triangle_count())
            .sum()
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new("Scene")
    }
}

/// `name`, or `name.001`, `name.002`, ... if already taken.
fn unique_name<'a>(name: &str, existing: impl Iterator<Item = &'a str>) -> String {
    let taken: HashSet<&str> = existing.collect();
    if !taken.contains(name) {
        return name.to_string();
    }
    let base = match name.rsplit_once('.') {
        Some((base, suffix)) if suffix.len() == 3 && suffix.bytes().all(|b| b.is_ascii_digit()) => base,
        _ => name,
    };
    (1..)
        .map(|n| format!("{base}.{n:03}"))
        .find(|candidate| !taken.contains(candidate.as_str()))
        .unwrap_or_else(|| base.to_string())
}
