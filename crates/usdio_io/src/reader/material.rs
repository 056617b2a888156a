//! `UsdPreviewSurface` material import.

use log::debug;
use usdio_core::scene::Material;
use usdio_core::usd::{Prim, SdfPath, Stage, TimeCode};

use crate::params::ImportShadersMode;

/// Split a connection target like `/Looks/Mat/Shader.outputs:rgb` into the
/// prim path and the property name.
fn split_target(target: &SdfPath) -> (SdfPath, &str) {
    match target.as_str().split_once('.') {
        Some((prim, prop)) => (SdfPath::new(prim), prop),
        None => (target.clone(), ""),
    }
}

fn connected_prim<'a>(stage: &'a Stage, prim: &Prim, attr: &str) -> Option<&'a Prim> {
    let target = prim.attribute(attr)?.connections.first()?;
    stage.get_prim(&split_target(target).0)
}

/// The preview surface shader bound to a material's surface output.
fn surface_shader<'a>(stage: &'a Stage, material: &Prim) -> Option<&'a Prim> {
    let shader = connected_prim(stage, material, "outputs:surface")?;
    let id = shader.get("info:id", TimeCode::Default)?;
    (id.as_str() == Some("UsdPreviewSurface")).then_some(shader)
}

/// Texture file of a `UsdUVTexture` connected to `input`, if any.
fn input_texture(stage: &Stage, shader: &Prim, input: &str) -> Option<String> {
    let texture = connected_prim(stage, shader, input)?;
    texture
        .get("inputs:file", TimeCode::Default)?
        .as_str()
        .map(str::to_string)
}

/// Build a material from a `Material` prim.
pub fn import_material(stage: &Stage, material: &Prim, mode: ImportShadersMode) -> Material {
    let mut out = Material {
        name: material.name.clone(),
        ..Default::default()
    };
    if mode == ImportShadersMode::None {
        return out;
    }
    let Some(shader) = surface_shader(stage, material) else {
        debug!("No UsdPreviewSurface found for {}", material.path);
        return out;
    };

    let t = TimeCode::Default;
    let f = |name: &str| shader.get(name, t).and_then(|v| v.as_f32());
    if let Some(c) = shader.get("inputs:diffuseColor", t).and_then(|v| v.as_vec3()) {
        out.diffuse_color = c;
    }
    if let Some(c) = shader.get("inputs:emissiveColor", t).and_then(|v| v.as_vec3()) {
        out.emissive_color = c;
    }
    if let Some(v) = f("inputs:metallic") {
        out.metallic = v;
    }
    if let Some(v) = f("inputs:roughness") {
        out.roughness = v;
    }
    if let Some(v) = f("inputs:opacity") {
        out.opacity = v;
        out.blend_alpha = v < 1.0;
    }
    if let Some(v) = f("inputs:ior") {
        out.ior = v;
    }

    out.textures.diffuse = input_texture(stage, shader, "inputs:diffuseColor");
    out.textures.roughness = input_texture(stage, shader, "inputs:roughness");
    out.textures.metallic = input_texture(stage, shader, "inputs:metallic");
    out.textures.normal = input_texture(stage, shader, "inputs:normal");
    out.textures.emissive = input_texture(stage, shader, "inputs:emissiveColor");
    out
}
