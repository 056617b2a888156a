//! usdio core - host scene model and USD stage support.
//!
//! This crate provides:
//!
//! - **Scene model**: `Scene`, `Object`, `Collection`, `Light`, `Camera`,
//!   `Mesh`, `Material`, `CacheFile`
//! - **USD support**: an in-memory `Stage` with USDA parsing and writing
//!
//! # Example
//!
//! ```ignore
//! use usdio_core::usd::Stage;
//! use usdio_core::scene::Scene;
//!
//! let stage = Stage::open("scene.usda")?;
//! println!("{} prims, up axis {}", stage.prim_count(), stage.up_axis().letter());
//!
//! let mut scene = Scene::new("untitled");
//! let cube = scene.add_object_only("Cube", usdio_core::scene::ObjectData::Empty);
//! scene.link_object(scene.master_collection(), cube);
//! ```

pub mod mesh;
pub mod scene;
pub mod usd;

// Re-export commonly used types
pub use mesh::Mesh;
pub use scene::{
    CacheFile, Camera, Collection, Light, Material, Object, ObjectData, ObjectId, Scene,
};
pub use usd::{SdfPath, Stage, TimeCode, Value};
