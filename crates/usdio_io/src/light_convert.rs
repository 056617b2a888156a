//! Light attribute conventions shared by the light reader and writer.
//!
//! UsdLux attributes moved under the `inputs:` namespace; older files use
//! the bare names. Readers try `inputs:` first.

use usdio_core::scene::World;
use usdio_core::usd::{Prim, TimeCode, Value};
use usdio_math::Vec3;

use crate::params::{ExportParams, ImportParams};

/// Watts-to-nits factor used when converting light intensities.
pub const NITS_TO_ENERGY: f32 = 0.001464;

/// Look up a light input by its bare name (`"intensity"`, `"radius"`, ...).
pub fn light_input(prim: &Prim, name: &str, time: TimeCode) -> Option<Value> {
    prim.get(&format!("inputs:{name}"), time)
        .or_else(|| prim.get(name, time))
}

pub fn light_input_f32(prim: &Prim, name: &str, time: TimeCode) -> Option<f32> {
    light_input(prim, name, time).and_then(|v| v.as_f32())
}

/// Intensity multiplier for imported lights.
pub fn import_intensity_scale(params: &ImportParams) -> f32 {
    if params.convert_light_from_nits {
        params.light_intensity_scale * NITS_TO_ENERGY
    } else {
        params.light_intensity_scale
    }
}

/// Intensity multiplier for exported lights; the inverse of the import
/// scale for matching parameters.
pub fn export_intensity_scale(params: &ExportParams) -> f32 {
    if params.convert_light_to_nits {
        params.light_intensity_scale / NITS_TO_ENERGY
    } else {
        params.light_intensity_scale
    }
}

/// Convert a `DomeLight` prim into the scene's world background.
///
/// Only the colour, intensity and texture file are carried over.
pub fn dome_light_to_world(prim: &Prim, params: &ImportParams, time: TimeCode) -> World {
    let mut world = World::default();
    if let Some(color) = light_input(prim, "color", time).and_then(|v| v.as_vec3()) {
        world.color = color;
    } else {
        world.color = Vec3::ONE;
    }
    if let Some(intensity) = light_input_f32(prim, "intensity", time) {
        world.strength = intensity * import_intensity_scale(params);
    }
    world.texture = light_input(prim, "texture:file", time)
        .and_then(|v| v.as_str().map(str::to_string))
        .filter(|s| !s.is_empty());
    world
}

#[cfg(test)]
mod tests {
    use super::*;
    use usdio_core::usd::{SdfPath, Stage};

    const DOME: &str = r#"#usda 1.0
def DomeLight "env"
{
    float inputs:intensity = 2
    asset inputs:texture:file = @sky.hdr@
}

def DomeLight "legacy"
{
    color3f color = (0.5, 0.25, 1)
    float intensity = 4
}
"#;

    #[test]
    fn test_dome_light_to_world() {
        let stage = Stage::from_usda(DOME).unwrap();
        let params = ImportParams::default();

        let env = stage.get_prim(&SdfPath::new("/env")).unwrap();
        let world = dome_light_to_world(env, &params, TimeCode::Default);
        assert_eq!(world.strength, 2.0);
        assert_eq!(world.color, Vec3::ONE);
        assert_eq!(world.texture.as_deref(), Some("sky.hdr"));

        let legacy = stage.get_prim(&SdfPath::new("/legacy")).unwrap();
        let world = dome_light_to_world(legacy, &params, TimeCode::Default);
        assert_eq!(world.strength, 4.0);
        assert_eq!(world.color, Vec3::new(0.5, 0.25, 1.0));
        assert!(world.texture.is_none());
    }

    #[test]
    fn test_nits_scale() {
        let params = ImportParams {
            convert_light_from_nits: true,
            light_intensity_scale: 2.0,
            ..Default::default()
        };
        assert!((import_intensity_scale(&params) - 0.002928).abs() < 1e-7);
    }
}
