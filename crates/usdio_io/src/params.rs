//! Import and export options.
//!
//! Both parameter sets are plain serde structs with `#[serde(default)]`, so
//! a JSON file only needs the keys it wants to change.

use std::path::Path;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use usdio_core::scene::MeshReadFlags;
use usdio_math::Axis;

use crate::error::{IoError, IoResult};

/// How materials are imported.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportShadersMode {
    /// Named materials without shader parameters.
    None,
    /// Parameters read from `UsdPreviewSurface` shaders.
    UsdPreviewSurface,
}

/// Purposes that get imported. `default` purpose is always imported.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PurposeFilter {
    pub guide: bool,
    pub proxy: bool,
    pub render: bool,
}

impl Default for PurposeFilter {
    fn default() -> Self {
        Self {
            guide: false,
            proxy: true,
            render: true,
        }
    }
}

impl PurposeFilter {
    /// Only `default` purpose prims.
    pub fn default_only() -> Self {
        Self {
            guide: false,
            proxy: false,
            render: false,
        }
    }

    pub fn includes(&self, purpose: &str) -> bool {
        match purpose {
            "guide" => self.guide,
            "proxy" => self.proxy,
            "render" => self.render,
            _ => true,
        }
    }
}

/// Options frozen at the start of an import job.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportParams {
    pub scale: f32,
    /// Multiply `scale` by the stage's `metersPerUnit`.
    pub apply_unit_conversion_scale: bool,
    pub set_frame_range: bool,
    pub is_sequence: bool,
    pub sequence_len: i32,
    pub offset: f64,
    pub validate_meshes: bool,
    pub global_read_flag: MeshReadFlags,
    pub import_cameras: bool,
    pub import_curves: bool,
    pub import_lights: bool,
    pub import_materials: bool,
    pub import_meshes: bool,
    pub import_volumes: bool,
    pub import_subdiv: bool,
    pub import_instance_proxies: bool,
    pub import_visible_only: bool,
    pub create_collection: bool,
    /// Only import prims at or below this path. Empty imports everything.
    pub prim_path_mask: String,
    pub purpose: PurposeFilter,
    pub use_instancing: bool,
    pub import_shaders_mode: ImportShadersMode,
    pub convert_to_z_up: bool,
    pub light_intensity_scale: f32,
    pub convert_light_from_nits: bool,
    pub create_background_shader: bool,
}

impl Default for ImportParams {
    fn default() -> Self {
        Self {
            scale: 1.0,
            apply_unit_conversion_scale: true,
            set_frame_range: true,
            is_sequence: false,
            sequence_len: 1,
            offset: 0.0,
            validate_meshes: false,
            global_read_flag: MeshReadFlags::VERTICES
                .union(MeshReadFlags::POLYGONS)
                .union(MeshReadFlags::UV),
            import_cameras: true,
            import_curves: true,
            import_lights: true,
            import_materials: true,
            import_meshes: true,
            import_volumes: true,
            import_subdiv: false,
            import_instance_proxies: true,
            import_visible_only: true,
            create_collection: false,
            prim_path_mask: String::new(),
            purpose: PurposeFilter::default(),
            use_instancing: false,
            import_shaders_mode: ImportShadersMode::UsdPreviewSurface,
            convert_to_z_up: false,
            light_intensity_scale: 1.0,
            convert_light_from_nits: false,
            create_background_shader: true,
        }
    }
}

impl ImportParams {
    pub fn from_json_file(path: impl AsRef<Path>) -> IoResult<Self> {
        load_json(path.as_ref())
    }
}

/// Options frozen at the start of an export job.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportParams {
    pub export_animation: bool,
    pub frame_start: i32,
    pub frame_end: i32,
    pub frame_step: f64,
    pub selected_objects_only: bool,
    pub visible_objects_only: bool,
    pub export_meshes: bool,
    pub export_lights: bool,
    pub export_cameras: bool,
    pub export_materials: bool,
    pub export_normals: bool,
    pub export_uvmaps: bool,
    pub use_instancing: bool,
    pub generate_preview_surface: bool,
    pub convert_orientation: bool,
    pub forward_axis: Axis,
    pub up_axis: Axis,
    pub export_as_overs: bool,
    pub merge_transform_and_shape: bool,
    pub export_identity_transforms: bool,
    pub default_prim_path: String,
    pub root_prim_path: String,
    pub material_prim_path: String,
    pub light_intensity_scale: f32,
    pub convert_light_to_nits: bool,
    pub scale_light_radius: bool,
    /// Also author pre-`inputs:` light attribute names.
    pub backward_compatible: bool,
    pub author_object_name: bool,
}

impl Default for ExportParams {
    fn default() -> Self {
        Self {
            export_animation: false,
            frame_start: 1,
            frame_end: 250,
            frame_step: 1.0,
            selected_objects_only: false,
            visible_objects_only: true,
            export_meshes: true,
            export_lights: true,
            export_cameras: true,
            export_materials: true,
            export_normals: true,
            export_uvmaps: true,
            use_instancing: false,
            generate_preview_surface: true,
            convert_orientation: false,
            forward_axis: Axis::NegZ,
            up_axis: Axis::Y,
            export_as_overs: false,
            merge_transform_and_shape: false,
            export_identity_transforms: false,
            default_prim_path: String::new(),
            root_prim_path: String::new(),
            material_prim_path: "/Looks".to_string(),
            light_intensity_scale: 1.0,
            convert_light_to_nits: false,
            scale_light_radius: true,
            backward_compatible: true,
            author_object_name: true,
        }
    }
}

impl ExportParams {
    pub fn from_json_file(path: impl AsRef<Path>) -> IoResult<Self> {
        load_json(path.as_ref())
    }
}

fn load_json<T: DeserializeOwned>(path: &Path) -> IoResult<T> {
    let text = std::fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|e| IoError::Config(format!("{}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_defaults() {
        let params = ImportParams::default();
        assert_eq!(params.scale, 1.0);
        assert!(params.import_visible_only);
        assert!(!params.use_instancing);
        assert!(params.global_read_flag.contains(MeshReadFlags::UV));
        assert!(!params.global_read_flag.contains(MeshReadFlags::COLOR));
        assert!(!params.purpose.includes("guide"));
        assert!(params.purpose.includes("default"));
    }

    #[test]
    fn test_partial_json_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("import.json");
        std::fs::write(
            &path,
            r#"{ "scale": 0.01, "convert_to_z_up": true, "purpose": { "guide": true } }"#,
        )
        .unwrap();

        let params = ImportParams::from_json_file(&path).unwrap();
        assert_eq!(params.scale, 0.01);
        assert!(params.convert_to_z_up);
        assert!(params.purpose.guide);
        assert!(params.purpose.render);
        assert!(params.import_meshes);
    }

    #[test]
    fn test_export_json_axes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.json");
        std::fs::write(&path, r#"{ "up_axis": "Z", "forward_axis": "-Y", "frame_end": 10 }"#).unwrap();

        let params = ExportParams::from_json_file(&path).unwrap();
        assert_eq!(params.up_axis, Axis::Z);
        assert_eq!(params.forward_axis, Axis::NegY);
        assert_eq!(params.frame_end, 10);
        assert_eq!(params.material_prim_path, "/Looks");
    }

    #[test]
    fn test_bad_json_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ scale: ").unwrap();
        match ExportParams::from_json_file(&path) {
            Err(IoError::Config(_)) => {}
            other => panic!("Expected Config error, got {:?}", other),
        }
    }
}
