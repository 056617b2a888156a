use log::{debug, warn};
use usdio_core::scene::{AreaShape, LightType, ObjectData, World};
use usdio_core::usd::{PrimId, SdfPath, Stage, TimeCode, Value};
use usdio_math::Mat4Ext;

use super::{define_prim, set_attr, ExportContext, HierarchyContext, PrimWriter};
use crate::light_convert::export_intensity_scale;
use crate::params::ExportParams;

/// Writes light data as a UsdLux light.
pub struct LightWriter {
    path: SdfPath,
}

impl LightWriter {
    pub fn new(path: SdfPath) -> Self {
        Self { path }
    }
}

/// Author `inputs:{name}`, plus the bare legacy name when writing for older
/// readers.
fn set_input(
    stage: &mut Stage,
    params: &ExportParams,
    prim: PrimId,
    name: &str,
    type_name: &str,
    value: impl Into<Value>,
    time: TimeCode,
) {
    let value = value.into();
    if params.backward_compatible {
        set_attr(stage, prim, name, type_name, value.clone(), time);
    }
    set_attr(stage, prim, &format!("inputs:{name}"), type_name, value, time);
}

impl PrimWriter for LightWriter {
    fn usd_path(&self) -> &SdfPath {
        &self.path
    }

    fn write(&mut self, stage: &mut Stage, ctx: &ExportContext<'_>, hier: &HierarchyContext) {
        let params = ctx.params;
        let Some(object) = ctx.scene.object(hier.object) else {
            return;
        };
        let ObjectData::Light(light) = &object.data else {
            return;
        };
        let t = ctx.time_for(hier.is_animated);

        let type_name = match (light.light_type, light.area_shape) {
            (LightType::Area, AreaShape::Square | AreaShape::Rect) => "RectLight",
            (LightType::Area, AreaShape::Disk | AreaShape::Ellipse) => "DiskLight",
            (LightType::Point | LightType::Spot, _) => "SphereLight",
            (LightType::Sun, _) => "DistantLight",
        };
        let Some(prim) = define_prim(stage, params, &self.path, type_name) else {
            warn!("Could not define light at {}", self.path);
            return;
        };

        // Sphere radii are authored in local space.
        let radius_scale = if params.scale_light_radius {
            let world_scale = ctx.scene.world_matrix(hier.object).uniform_scale();
            if world_scale > f32::EPSILON {
                1.0 / world_scale
            } else {
                1.0
            }
        } else {
            1.0
        };

        match light.light_type {
            LightType::Area => match light.area_shape {
                AreaShape::Square => {
                    set_input(stage, params, prim, "width", "float", light.area_size, t);
                    set_input(stage, params, prim, "height", "float", light.area_size, t);
                }
                AreaShape::Rect => {
                    set_input(stage, params, prim, "width", "float", light.area_size, t);
                    set_input(stage, params, prim, "height", "float", light.area_sizey, t);
                }
                AreaShape::Disk | AreaShape::Ellipse => {
                    if light.area_shape == AreaShape::Ellipse {
                        debug!("Writing ellipse light {} as a disk", object.name);
                    }
                    set_input(stage, params, prim, "radius", "float", light.area_size / 2.0, t);
                }
            },
            LightType::Point | LightType::Spot => {
                set_input(stage, params, prim, "radius", "float", light.area_size * radius_scale, t);
                if light.light_type == LightType::Spot {
                    let cone_angle = light.spotsize.to_degrees() / 2.0;
                    set_input(stage, params, prim, "shaping:cone:angle", "float", cone_angle, t);
                    set_input(stage, params, prim, "shaping:cone:softness", "float", light.spotblend, t);
                    set_attr(stage, prim, "treatAsPoint", "bool", true, t);
                }
            }
            LightType::Sun => {
                set_input(stage, params, prim, "angle", "float", light.sun_angle.to_degrees(), t);
            }
        }

        let intensity = light.energy * export_intensity_scale(params);
        set_input(stage, params, prim, "intensity", "float", intensity, t);
        set_input(stage, params, prim, "color", "color3f", light.color, t);
        set_input(stage, params, prim, "specular", "float", light.spec_fac, t);
    }
}

/// Write the world background as a dome light at `<root>/lights/environment`.
pub fn write_world(stage: &mut Stage, params: &ExportParams, world: &World, root: &SdfPath) -> Option<SdfPath> {
    let path = root.append_child("lights").append_child("environment");
    stage.define_prim(&path.parent()?, "Scope")?;
    let prim = define_prim(stage, params, &path, "DomeLight")?;
    let t = TimeCode::Default;

    let intensity = world.strength * export_intensity_scale(params);
    set_input(stage, params, prim, "intensity", "float", intensity, t);
    match &world.texture {
        Some(file) => set_attr(
            stage,
            prim,
            "inputs:texture:file",
            "asset",
            Value::Asset(file.clone()),
            t,
        ),
        None => set_input(stage, params, prim, "color", "color3f", world.color, t),
    }
    Some(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::light_convert::dome_light_to_world;
    use crate::params::ImportParams;
    use crate::reader::{LightReader, PrimReader, ReadContext, ReaderBase};
    use crate::settings::ImportSettings;
    use usdio_core::scene::{Light, Scene};
    use usdio_math::{Mat4, Vec3};

    fn export(light: Light, params: &ExportParams) -> (Scene, Stage) {
        let mut scene = Scene::default();
        let object = scene.add_object_only("Lamp", ObjectData::Light(light));
        let mut stage = Stage::new();
        let ctx = ExportContext {
            scene: &scene,
            params,
            time: TimeCode::Default,
        };
        let hier = HierarchyContext {
            object,
            export_path: SdfPath::new("/Lamp"),
            data_path: Some(SdfPath::new("/Lamp")),
            matrix: Mat4::IDENTITY,
            is_animated: false,
            instance_of: None,
            in_prototype: false,
        };
        LightWriter::new(SdfPath::new("/Lamp")).write(&mut stage, &ctx, &hier);
        (scene, stage)
    }

    fn import(stage: &Stage, params: &ImportParams) -> Light {
        let settings = ImportSettings::new(params);
        let ctx = ReadContext {
            stage,
            params,
            settings: &settings,
        };
        let prim = stage.prim_at_path(&SdfPath::new("/Lamp")).unwrap();
        let mut reader = LightReader::new(ReaderBase::new(stage, prim, SdfPath::new("/Lamp")));
        let mut scene = Scene::default();
        reader.create_object(&mut scene, &ctx, 0.0);
        reader.read_object_data(&mut scene, &ctx, 0.0);
        match &scene.object(reader.object().unwrap()).unwrap().data {
            ObjectData::Light(light) => light.clone(),
            other => panic!("Expected light, got {:?}", other),
        }
    }

    fn assert_close(a: f32, b: f32) {
        assert!((a - b).abs() < 1e-4, "{} != {}", a, b);
    }

    #[test]
    fn test_spot_cone_angle() {
        let mut light = Light::new(LightType::Spot);
        light.spotsize = 1.0471975512;
        light.spotblend = 0.5;
        let (_, stage) = export(light, &ExportParams::default());
        let prim = stage.get_prim(&SdfPath::new("/Lamp")).unwrap();
        assert_eq!(prim.type_name, "SphereLight");
        let angle = prim.get("inputs:shaping:cone:angle", TimeCode::Default).unwrap().as_f32().unwrap();
        assert_close(angle, 30.0);
        let softness = prim.get("inputs:shaping:cone:softness", TimeCode::Default).unwrap().as_f32().unwrap();
        assert_close(softness, 0.5);
        assert_eq!(prim.get("treatAsPoint", TimeCode::Default).unwrap().as_bool(), Some(true));
    }

    #[test]
    fn test_light_round_trip() {
        let mut spot = Light::new(LightType::Spot);
        spot.spotsize = 0.8;
        spot.area_size = 0.3;
        let mut sun = Light::new(LightType::Sun);
        sun.sun_angle = 0.05;
        let lights = [
            Light::area(AreaShape::Disk, 2.0, 2.0),
            Light::area(AreaShape::Rect, 2.0, 0.5),
            Light {
                color: Vec3::new(1.0, 0.5, 0.25),
                energy: 250.0,
                spec_fac: 0.5,
                ..Light::new(LightType::Point)
            },
            spot,
            sun,
        ];
        for light in lights {
            let (_, stage) = export(light.clone(), &ExportParams::default());
            let read = import(&stage, &ImportParams::default());
            assert_eq!(read.light_type, light.light_type);
            assert_close(read.energy, light.energy);
            assert_close(read.spec_fac, light.spec_fac);
            assert!((read.color - light.color).length() < 1e-5);
            match light.light_type {
                LightType::Area => {
                    assert_eq!(read.area_shape, light.area_shape);
                    assert_close(read.area_size, light.area_size);
                    if light.area_shape == AreaShape::Rect {
                        assert_close(read.area_sizey, light.area_sizey);
                    }
                }
                LightType::Point => assert_close(read.area_size, light.area_size),
                LightType::Spot => {
                    assert_close(read.area_size, light.area_size);
                    assert_close(read.spotsize, light.spotsize);
                    assert_close(read.spotblend, light.spotblend);
                }
                LightType::Sun => assert_close(read.sun_angle, light.sun_angle),
            }
        }
    }

    #[test]
    fn test_nits_round_trip() {
        let export_params = ExportParams {
            convert_light_to_nits: true,
            ..Default::default()
        };
        let import_params = ImportParams {
            convert_light_from_nits: true,
            ..Default::default()
        };
        let (_, stage) = export(Light::new(LightType::Point), &export_params);
        let prim = stage.get_prim(&SdfPath::new("/Lamp")).unwrap();
        let intensity = prim.get("inputs:intensity", TimeCode::Default).unwrap().as_f32().unwrap();
        assert!(intensity > 1000.0);
        assert_close(import(&stage, &import_params).energy, 10.0);
    }

    #[test]
    fn test_legacy_names_optional() {
        let params = ExportParams {
            backward_compatible: false,
            ..Default::default()
        };
        let (_, stage) = export(Light::area(AreaShape::Disk, 1.0, 1.0), &params);
        let prim = stage.get_prim(&SdfPath::new("/Lamp")).unwrap();
        assert!(prim.attribute("radius").is_none());
        assert!(prim.attribute("inputs:radius").is_some());

        let (_, stage) = export(Light::area(AreaShape::Disk, 1.0, 1.0), &ExportParams::default());
        let prim = stage.get_prim(&SdfPath::new("/Lamp")).unwrap();
        assert_eq!(prim.get("radius", TimeCode::Default).unwrap().as_f32(), Some(0.5));
    }

    #[test]
    fn test_world_dome_light() {
        let world = World {
            color: Vec3::new(0.2, 0.3, 0.4),
            strength: 1.5,
            texture: None,
        };
        let mut stage = Stage::new();
        let path = write_world(&mut stage, &ExportParams::default(), &world, &SdfPath::new("/root")).unwrap();
        assert_eq!(path.as_str(), "/root/lights/environment");
        let prim = stage.get_prim(&path).unwrap();
        let read = dome_light_to_world(prim, &ImportParams::default(), TimeCode::Default);
        assert_eq!(read, world);
    }
}
