//! usdio io - USD import and export for the host scene model.
//!
//! - **Import**: [`StageReader`] walks a stage and creates one prim reader
//!   per imported prim; [`import_usd`] wraps it in a cancellable job.
//! - **Export**: [`HierarchyIterator`] decides which objects become which
//!   prims and drives the prim writers; [`export_usd`] runs it per frame.
//! - **Cache files**: [`CacheSession`] re-reads animated transforms and
//!   deforming meshes after import.
//!
//! # Example
//!
//! ```ignore
//! use usdio_core::scene::Scene;
//! use usdio_io::{import_usd, ImportParams};
//!
//! let mut scene = Scene::new("shot");
//! let outcome = import_usd(&mut scene, "shot.usda", &ImportParams::default());
//! assert!(outcome.success);
//! ```

pub mod cache;
pub mod error;
pub mod job;
pub mod light_convert;
pub mod params;
pub mod reader;
pub mod settings;
pub mod writer;

pub use cache::{CacheArchiveHandle, CacheReader, CacheSession};
pub use error::{IoError, IoResult};
pub use job::{
    export_usd, export_usd_with, import_usd, import_usd_with, spawn_export, spawn_import, JobContext, JobHandle,
    JobOutcome, JobState, Report, ReportLevel,
};
pub use params::{ExportParams, ImportParams, ImportShadersMode, PurposeFilter};
pub use reader::StageReader;
pub use settings::ImportSettings;
pub use writer::HierarchyIterator;
