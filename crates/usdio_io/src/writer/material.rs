//! `UsdPreviewSurface` material export.

use log::debug;
use usdio_core::scene::Material;
use usdio_core::usd::{make_valid_identifier, PrimId, SdfPath, Stage, TimeCode, Value};

use super::{set_attr, set_uniform};
use crate::params::ExportParams;

const SURFACE: &str = "PreviewSurface";
const PRIMVAR_READER: &str = "uvmap";

/// Stage path of the material prim for `name`.
pub fn material_path(params: &ExportParams, name: &str) -> SdfPath {
    let root = if params.material_prim_path.is_empty() {
        "/Looks"
    } else {
        params.material_prim_path.as_str()
    };
    SdfPath::new(root).append_child(&make_valid_identifier(name))
}

fn connect(stage: &mut Stage, prim: PrimId, name: &str, type_name: &str, target: SdfPath) {
    let attr = stage.create_attribute(prim, name, type_name, Default::default());
    attr.connections = vec![target];
}

fn output(path: &SdfPath, name: &str) -> SdfPath {
    SdfPath::new(format!("{}.outputs:{}", path, name))
}

/// Add a `UsdUVTexture` reading `file` and connect its output to `input`
/// on the surface shader.
fn write_texture(stage: &mut Stage, material: &SdfPath, surface: PrimId, input: (&str, &str), channel: &str, file: &str) {
    let (input_name, input_type) = input;
    let reader_path = material.append_child(PRIMVAR_READER);
    let texture_path = material.append_child(&format!("{}_texture", input_name));
    let Some(texture) = stage.define_prim(&texture_path, "Shader") else {
        return;
    };
    set_uniform(stage, texture, "info:id", "token", "UsdUVTexture");
    set_attr(stage, texture, "inputs:file", "asset", Value::Asset(file.to_string()), TimeCode::Default);
    connect(stage, texture, "inputs:st", "float2", output(&reader_path, "result"));
    let channel_type = if channel == "rgb" { "float3" } else { "float" };
    stage.create_attribute(texture, &format!("outputs:{}", channel), channel_type, Default::default());

    connect(
        stage,
        surface,
        &format!("inputs:{}", input_name),
        input_type,
        output(&texture_path, channel),
    );
}

/// Write `material` under the material prim path unless it already exists.
/// Returns the material prim path.
pub fn write_material(stage: &mut Stage, params: &ExportParams, material: &Material) -> Option<SdfPath> {
    let path = material_path(params, &material.name);
    if stage.prim_at_path(&path).is_some() {
        return Some(path);
    }
    let looks = path.parent()?;
    stage.define_prim(&looks, "Scope")?;
    stage.define_prim(&path, "Material")?;
    debug!("Writing material {}", path);

    let surface_path = path.append_child(SURFACE);
    let surface = stage.define_prim(&surface_path, "Shader")?;
    let t = TimeCode::Default;
    set_uniform(stage, surface, "info:id", "token", "UsdPreviewSurface");
    set_attr(stage, surface, "inputs:diffuseColor", "color3f", material.diffuse_color, t);
    set_attr(stage, surface, "inputs:roughness", "float", material.roughness, t);
    set_attr(stage, surface, "inputs:metallic", "float", material.metallic, t);

    if params.generate_preview_surface {
        set_attr(stage, surface, "inputs:opacity", "float", material.opacity, t);
        set_attr(stage, surface, "inputs:ior", "float", material.ior, t);
        if material.is_emissive() {
            set_attr(stage, surface, "inputs:emissiveColor", "color3f", material.emissive_color, t);
        }

        if material.has_textures() {
            let reader_path = path.append_child(PRIMVAR_READER);
            if let Some(reader) = stage.define_prim(&reader_path, "Shader") {
                set_uniform(stage, reader, "info:id", "token", "UsdPrimvarReader_float2");
                set_attr(stage, reader, "inputs:varname", "token", "st", t);
                stage.create_attribute(reader, "outputs:result", "float2", Default::default());
            }
        }
        let textures = [
            (&material.textures.diffuse, ("diffuseColor", "color3f"), "rgb"),
            (&material.textures.roughness, ("roughness", "float"), "r"),
            (&material.textures.metallic, ("metallic", "float"), "r"),
            (&material.textures.normal, ("normal", "normal3f"), "rgb"),
            (&material.textures.emissive, ("emissiveColor", "color3f"), "rgb"),
        ];
        for (file, input, channel) in textures {
            if let Some(file) = file {
                write_texture(stage, &path, surface, input, channel, file);
            }
        }
    }

    stage.create_attribute(surface, "outputs:surface", "token", Default::default());
    let material_prim = stage.prim_at_path(&path)?;
    connect(stage, material_prim, "outputs:surface", "token", output(&surface_path, "surface"));
    Some(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ImportShadersMode;
    use crate::reader::import_material;
    use usdio_math::Vec3;

    #[test]
    fn test_material_round_trip() {
        let mut material = Material::new("Wood.001", Vec3::new(0.8, 0.4, 0.2));
        material.roughness = 0.7;
        material.textures.diffuse = Some("textures/wood.png".to_string());
        material.textures.roughness = Some("textures/wood_rough.png".to_string());

        let params = ExportParams::default();
        let mut stage = Stage::new();
        let path = write_material(&mut stage, &params, &material).unwrap();
        assert_eq!(path.as_str(), "/Looks/Wood_001");
        // Written once
        assert_eq!(write_material(&mut stage, &params, &material), Some(path.clone()));

        let prim = stage.get_prim(&path).unwrap();
        let read = import_material(&stage, prim, ImportShadersMode::UsdPreviewSurface);
        assert_eq!(read.name, "Wood_001");
        assert!((read.diffuse_color - material.diffuse_color).length() < 1e-6);
        assert!((read.roughness - 0.7).abs() < 1e-6);
        assert_eq!(read.textures.diffuse, material.textures.diffuse);
        assert_eq!(read.textures.roughness, material.textures.roughness);
        assert!(read.textures.normal.is_none());
    }

    #[test]
    fn test_custom_material_root() {
        let params = ExportParams {
            material_prim_path: "/World/Materials".to_string(),
            ..Default::default()
        };
        assert_eq!(material_path(&params, "Steel").as_str(), "/World/Materials/Steel");
    }
}
