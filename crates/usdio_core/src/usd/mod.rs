//! USD (Universal Scene Description) stage support.
//!
//! This module provides an in-memory stage model with USDA (ASCII) parsing
//! and writing, enough for scene interchange with the host scene model.
//!
//! ## Supported USD Features
//!
//! - Typed and typeless prims with `def`/`over`/`class` specifiers
//! - Attributes with default values and time samples
//! - Relationships and attribute connections
//! - `xformOp:*` transform stacks with `xformOpOrder`
//! - Layer metadata (`upAxis`, `metersPerUnit`, time codes, `defaultPrim`)
//! - Scenegraph instancing through `instanceable` prims with internal references
//!
//! ## Not Supported
//!
//! - Binary `.usdc` format and `.usdz` packages
//! - Composition of external references, payloads and variants
//!
//! # Example
//!
//! ```ignore
//! use usdio_core::usd::{Stage, SdfPath, TimeCode};
//!
//! let stage = Stage::open("path/to/scene.usda")?;
//! for id in stage.traverse() {
//!     let prim = stage.prim(id);
//!     println!("{} ({})", prim.path, prim.type_name);
//! }
//! ```

mod parser;
mod path;
mod stage;
mod value;
mod writer;
pub mod xform;

pub use parser::*;
pub use path::*;
pub use stage::*;
pub use value::*;
pub use writer::*;
