//! In-memory USD stage: prims, properties and layer metadata.
//!
//! A [`Stage`] owns every prim in a flat arena addressed by [`PrimId`]. Prims
//! keep ordered child lists and an ordered property list, so writing a parsed
//! stage back out preserves authoring order.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use usdio_math::Axis;

use super::parser::{parse_usda, ParseError};
use super::path::SdfPath;
use super::value::{TimeCode, Value};
use super::writer::write_stage;

/// Errors that can occur while opening, creating or saving a stage.
#[derive(Error, Debug)]
pub enum StageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("no registered file format for '{0}'")]
    UnsupportedFormat(String),

    #[error("stage has no backing file")]
    NoBackingFile,
}

/// Result type for stage operations.
pub type StageResult<T> = Result<T, StageError>;

/// The on-disk layer formats this crate can read and write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileFormat {
    /// `.usda` text, also used for `.usd`.
    Usda,
}

impl FileFormat {
    /// Resolve the format from a file extension.
    ///
    /// Binary crate files (`.usdc`) and packages (`.usdz`) have no registered
    /// format here.
    pub fn from_path(path: &Path) -> StageResult<FileFormat> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "usda" | "usd" => Ok(FileFormat::Usda),
            _ => Err(StageError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Index of a prim inside its [`Stage`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PrimId(usize);

impl PrimId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Specifier {
    #[default]
    Def,
    Over,
    Class,
}

impl Specifier {
    pub fn keyword(self) -> &'static str {
        match self {
            Specifier::Def => "def",
            Specifier::Over => "over",
            Specifier::Class => "class",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Variability {
    #[default]
    Varying,
    Uniform,
}

/// A typed, possibly time-sampled attribute.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Attribute {
    pub name: String,
    /// Value type as written in USDA, e.g. `float`, `point3f[]`, `matrix4d`.
    pub type_name: String,
    pub variability: Variability,
    pub custom: bool,
    pub default: Option<Value>,
    /// Samples sorted by time.
    pub time_samples: Vec<(f64, Value)>,
    pub connections: Vec<SdfPath>,
    pub metadata: Vec<(String, Value)>,
}

impl Attribute {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            ..Default::default()
        }
    }

    /// Whether a default or any time sample has been authored.
    pub fn has_value(&self) -> bool {
        self.default.is_some() || !self.time_samples.is_empty()
    }

    /// More than one time sample means the value may change over time.
    pub fn might_be_time_varying(&self) -> bool {
        self.time_samples.len() > 1
    }

    pub fn time_sample_times(&self) -> Vec<f64> {
        self.time_samples.iter().map(|(t, _)| *t).collect()
    }

    /// Resolve the value at `time`.
    ///
    /// The default time prefers the default value and falls back to the first
    /// sample. Numeric times interpolate linearly between bracketing samples
    /// (held for non-numeric values) and clamp outside the sampled range.
    pub fn get(&self, time: TimeCode) -> Option<Value> {
        let value = match time {
            TimeCode::Default => self
                .default
                .clone()
                .or_else(|| self.time_samples.first().map(|(_, v)| v.clone())),
            TimeCode::Time(t) => self.sample_at(t).or_else(|| self.default.clone()),
        };
        match value {
            Some(Value::Blocked) => None,
            other => other,
        }
    }

    fn sample_at(&self, t: f64) -> Option<Value> {
        let samples = &self.time_samples;
        let (first, last) = (samples.first()?, samples.last()?);
        if t <= first.0 {
            return Some(first.1.clone());
        }
        if t >= last.0 {
            return Some(last.1.clone());
        }
        let idx = samples.partition_point(|(st, _)| *st <= t);
        let (t0, v0) = &samples[idx - 1];
        let (t1, v1) = &samples[idx];
        if *t0 == t {
            return Some(v0.clone());
        }
        let alpha = (t - t0) / (t1 - t0);
        Some(v0.lerp(v1, alpha).unwrap_or_else(|| v0.clone()))
    }

    /// Author a value at `time`, replacing any sample at the same time.
    pub fn set(&mut self, value: impl Into<Value>, time: TimeCode) {
        let value = value.into();
        match time {
            TimeCode::Default => self.default = Some(value),
            TimeCode::Time(t) => {
                let idx = self.time_samples.partition_point(|(st, _)| *st < t);
                match self.time_samples.get_mut(idx) {
                    Some(slot) if slot.0 == t => slot.1 = value,
                    _ => self.time_samples.insert(idx, (t, value)),
                }
            }
        }
    }

    pub fn metadata(&self, key: &str) -> Option<&Value> {
        self.metadata.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn set_metadata(&mut self, key: &str, value: impl Into<Value>) {
        let value = value.into();
        match self.metadata.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.metadata.push((key.to_string(), value)),
        }
    }
}

/// A relationship with its target paths.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Relationship {
    pub name: String,
    pub custom: bool,
    pub targets: Vec<SdfPath>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Property {
    Attribute(Attribute),
    Relationship(Relationship),
}

impl Property {
    pub fn name(&self) -> &str {
        match self {
            Property::Attribute(a) => &a.name,
            Property::Relationship(r) => &r.name,
        }
    }
}

/// A `references` list entry: `@asset@</Prim>`, `@asset@` or `</Prim>`.
#[derive(Clone, Debug, PartialEq)]
pub struct Reference {
    pub asset_path: Option<String>,
    pub prim_path: Option<SdfPath>,
}

impl Reference {
    pub fn internal(prim_path: SdfPath) -> Self {
        Self {
            asset_path: None,
            prim_path: Some(prim_path),
        }
    }

    pub fn is_internal(&self) -> bool {
        self.asset_path.is_none() && self.prim_path.is_some()
    }
}

/// Prim-level metadata.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PrimMetadata {
    pub instanceable: Option<bool>,
    pub active: Option<bool>,
    pub kind: Option<String>,
    pub references: Vec<Reference>,
    pub documentation: Option<String>,
    /// Entries this crate does not interpret, kept for writing back.
    pub other: Vec<(String, Value)>,
}

/// A prim: a node in the stage's namespace.
#[derive(Clone, Debug)]
pub struct Prim {
    pub id: PrimId,
    pub path: SdfPath,
    pub name: String,
    pub specifier: Specifier,
    /// Schema type such as `Xform` or `Mesh`; empty for typeless prims.
    pub type_name: String,
    pub parent: Option<PrimId>,
    pub children: Vec<PrimId>,
    pub metadata: PrimMetadata,
    pub properties: Vec<Property>,
}

impl Prim {
    pub fn is_a(&self, type_name: &str) -> bool {
        self.type_name == type_name
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.properties.iter().find_map(|p| match p {
            Property::Attribute(a) if a.name == name => Some(a),
            _ => None,
        })
    }

    pub fn attribute_mut(&mut self, name: &str) -> Option<&mut Attribute> {
        self.properties.iter_mut().find_map(|p| match p {
            Property::Attribute(a) if a.name == name => Some(a),
            _ => None,
        })
    }

    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.properties.iter().filter_map(|p| match p {
            Property::Attribute(a) => Some(a),
            _ => None,
        })
    }

    pub fn relationship(&self, name: &str) -> Option<&Relationship> {
        self.properties.iter().find_map(|p| match p {
            Property::Relationship(r) if r.name == name => Some(r),
            _ => None,
        })
    }

    /// Value of `name` at `time`, if authored.
    pub fn get(&self, name: &str, time: TimeCode) -> Option<Value> {
        self.attribute(name)?.get(time)
    }

    pub fn is_active(&self) -> bool {
        self.metadata.active.unwrap_or(true)
    }

    pub fn is_abstract(&self) -> bool {
        self.specifier == Specifier::Class
    }

    /// Target of the first internal reference, if any.
    pub fn internal_reference(&self) -> Option<&SdfPath> {
        self.metadata
            .references
            .iter()
            .find(|r| r.is_internal())
            .and_then(|r| r.prim_path.as_ref())
    }

    /// An instanceable prim with an internal reference is a scenegraph instance.
    pub fn is_instance(&self) -> bool {
        self.metadata.instanceable == Some(true) && self.internal_reference().is_some()
    }
}

/// Layer metadata found in the header block of a USDA file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StageMetadata {
    pub up_axis: Option<String>,
    pub meters_per_unit: Option<f64>,
    pub start_time_code: Option<f64>,
    pub end_time_code: Option<f64>,
    pub time_codes_per_second: Option<f64>,
    pub default_prim: Option<String>,
    pub documentation: Option<String>,
    pub other: Vec<(String, Value)>,
}

/// A composed-enough view of a single USDA layer.
#[derive(Clone, Debug, Default)]
pub struct Stage {
    prims: Vec<Prim>,
    roots: Vec<PrimId>,
    index: HashMap<SdfPath, PrimId>,
    pub metadata: StageMetadata,
    source_path: Option<PathBuf>,
}

impl Stage {
    /// Create an empty in-memory stage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open and parse a layer from disk.
    pub fn open(path: impl AsRef<Path>) -> StageResult<Stage> {
        let path = path.as_ref();
        FileFormat::from_path(path)?;
        log::info!("Opening stage: {}", path.display());
        let content = fs::read_to_string(path)?;
        let mut stage = parse_usda(&content)?;
        stage.source_path = Some(path.to_path_buf());
        log::debug!("Parsed {} prims from {}", stage.prims.len(), path.display());
        Ok(stage)
    }

    /// Parse a stage from USDA text.
    pub fn from_usda(content: &str) -> StageResult<Stage> {
        Ok(parse_usda(content)?)
    }

    /// Create a new, empty stage bound to `path`.
    ///
    /// The file is created immediately (truncated if present) so a later
    /// failure can be cleaned up by removing it.
    pub fn create_new(path: impl AsRef<Path>) -> StageResult<Stage> {
        let path = path.as_ref();
        FileFormat::from_path(path)?;
        fs::File::create(path)?;
        Ok(Stage {
            source_path: Some(path.to_path_buf()),
            ..Default::default()
        })
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    /// Write the stage to its backing file.
    pub fn save(&self) -> StageResult<()> {
        let path = self.source_path.as_ref().ok_or(StageError::NoBackingFile)?;
        self.export(path)
    }

    /// Write the stage to `path` as USDA.
    pub fn export(&self, path: impl AsRef<Path>) -> StageResult<()> {
        let path = path.as_ref();
        FileFormat::from_path(path)?;
        fs::write(path, self.to_usda())?;
        log::info!("Saved stage: {}", path.display());
        Ok(())
    }

    pub fn to_usda(&self) -> String {
        write_stage(self)
    }

    pub fn prim(&self, id: PrimId) -> &Prim {
        &self.prims[id.0]
    }

    pub fn prim_mut(&mut self, id: PrimId) -> &mut Prim {
        &mut self.prims[id.0]
    }

    pub fn prim_at_path(&self, path: &SdfPath) -> Option<PrimId> {
        self.index.get(path).copied()
    }

    pub fn get_prim(&self, path: &SdfPath) -> Option<&Prim> {
        self.prim_at_path(path).map(|id| self.prim(id))
    }

    pub fn root_prims(&self) -> &[PrimId] {
        &self.roots
    }

    pub fn prim_count(&self) -> usize {
        self.prims.len()
    }

    pub fn parent_of(&self, id: PrimId) -> Option<PrimId> {
        self.prim(id).parent
    }

    /// Add a child prim under `parent` (or at the root). Returns `None` when
    /// a prim already exists at that path.
    pub fn add_prim(
        &mut self,
        parent: Option<PrimId>,
        name: &str,
        specifier: Specifier,
        type_name: &str,
    ) -> Option<PrimId> {
        let path = match parent {
            Some(p) => self.prim(p).path.append_child(name),
            None => SdfPath::root().append_child(name),
        };
        if self.index.contains_key(&path) {
            return None;
        }
        let id = PrimId(self.prims.len());
        self.prims.push(Prim {
            id,
            path: path.clone(),
            name: name.to_string(),
            specifier,
            type_name: type_name.to_string(),
            parent,
            children: Vec::new(),
            metadata: PrimMetadata::default(),
            properties: Vec::new(),
        });
        self.index.insert(path, id);
        match parent {
            Some(p) => self.prims[p.0].children.push(id),
            None => self.roots.push(id),
        }
        Some(id)
    }

    fn ensure_prim(&mut self, path: &SdfPath, specifier: Specifier) -> Option<PrimId> {
        if path.is_root() {
            return None;
        }
        if let Some(id) = self.prim_at_path(path) {
            return Some(id);
        }
        let parent = path.parent().and_then(|p| self.ensure_prim(&p, specifier));
        self.add_prim(parent, path.name(), specifier, "")
    }

    /// Define a prim of `type_name` at `path`, creating typeless ancestors.
    ///
    /// An existing prim is upgraded to `def` and retyped when `type_name` is
    /// non-empty. Returns `None` only for the pseudo-root.
    pub fn define_prim(&mut self, path: &SdfPath, type_name: &str) -> Option<PrimId> {
        let id = self.ensure_prim(path, Specifier::Def)?;
        let prim = self.prim_mut(id);
        prim.specifier = Specifier::Def;
        if !type_name.is_empty() {
            prim.type_name = type_name.to_string();
        }
        Some(id)
    }

    /// Author an `over` at `path`, leaving any existing specifier alone.
    pub fn override_prim(&mut self, path: &SdfPath) -> Option<PrimId> {
        self.ensure_prim(path, Specifier::Over)
    }

    /// Define an abstract `class` prim at `path`.
    pub fn define_class(&mut self, path: &SdfPath, type_name: &str) -> Option<PrimId> {
        let id = self.ensure_prim(path, Specifier::Def)?;
        let prim = self.prim_mut(id);
        prim.specifier = Specifier::Class;
        if !type_name.is_empty() {
            prim.type_name = type_name.to_string();
        }
        Some(id)
    }

    /// Get or create an attribute on `prim`.
    pub fn create_attribute(
        &mut self,
        prim: PrimId,
        name: &str,
        type_name: &str,
        variability: Variability,
    ) -> &mut Attribute {
        let prim = self.prim_mut(prim);
        let idx = match prim.properties.iter().position(|p| p.name() == name) {
            Some(idx) => idx,
            None => {
                let mut attr = Attribute::new(name, type_name);
                attr.variability = variability;
                prim.properties.push(Property::Attribute(attr));
                prim.properties.len() - 1
            }
        };
        if let Property::Relationship(_) = &prim.properties[idx] {
            let mut attr = Attribute::new(name, type_name);
            attr.variability = variability;
            prim.properties[idx] = Property::Attribute(attr);
        }
        match &mut prim.properties[idx] {
            Property::Attribute(a) => a,
            Property::Relationship(_) => unreachable!("replaced above"),
        }
    }

    /// Get or create a relationship on `prim` and set its targets.
    pub fn set_relationship(&mut self, prim: PrimId, name: &str, targets: Vec<SdfPath>) {
        let prim = self.prim_mut(prim);
        let rel = Relationship {
            name: name.to_string(),
            custom: false,
            targets,
        };
        match prim.properties.iter().position(|p| p.name() == name) {
            Some(idx) => prim.properties[idx] = Property::Relationship(rel),
            None => prim.properties.push(Property::Relationship(rel)),
        }
    }

    /// Whether default traversal visits `id`: active, defined with `def`
    /// and not abstract, with all ancestors the same.
    pub fn is_traversable(&self, id: PrimId) -> bool {
        let mut current = Some(id);
        while let Some(c) = current {
            let prim = self.prim(c);
            if !prim.is_active() || prim.specifier != Specifier::Def {
                return false;
            }
            current = prim.parent;
        }
        true
    }

    /// Pre-order walk of the default traversal.
    pub fn traverse(&self) -> Vec<PrimId> {
        let mut out = Vec::new();
        let mut stack: Vec<PrimId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            let prim = self.prim(id);
            if !prim.is_active() || prim.specifier != Specifier::Def {
                continue;
            }
            out.push(id);
            stack.extend(prim.children.iter().rev().copied());
        }
        out
    }

    /// Declared up axis; USD treats an unauthored `upAxis` as Y.
    pub fn up_axis(&self) -> Axis {
        self.metadata
            .up_axis
            .as_deref()
            .and_then(Axis::from_letter)
            .unwrap_or(Axis::Y)
    }

    pub fn meters_per_unit(&self) -> Option<f64> {
        self.metadata.meters_per_unit
    }

    pub fn start_time_code(&self) -> Option<f64> {
        self.metadata.start_time_code
    }

    pub fn end_time_code(&self) -> Option<f64> {
        self.metadata.end_time_code
    }

    pub fn default_prim(&self) -> Option<PrimId> {
        let name = self.metadata.default_prim.as_deref()?;
        self.prim_at_path(&SdfPath::new(name))
    }

    pub fn set_default_prim(&mut self, name: &str) {
        self.metadata.default_prim = Some(name.trim_start_matches('/').to_string());
    }
}
