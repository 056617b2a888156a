use usdio_core::scene::{AreaShape, Light, LightType, ObjectData, Scene};
use usdio_core::usd::TimeCode;

use super::xform::read_xform_data;
use super::{PrimReader, ReadContext, ReaderBase, ReaderKind};
use crate::light_convert::{import_intensity_scale, light_input, light_input_f32};

/// Reads disk, rect, sphere and distant lights.
pub struct LightReader {
    base: ReaderBase,
}

impl LightReader {
    pub fn new(base: ReaderBase) -> Self {
        Self { base }
    }
}

impl PrimReader for LightReader {
    fn base(&self) -> &ReaderBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ReaderBase {
        &mut self.base
    }

    fn kind(&self) -> ReaderKind {
        ReaderKind::Light
    }

    fn create_object(&mut self, scene: &mut Scene, _ctx: &ReadContext<'_>, _time: f64) {
        let id = scene.add_object_only(&self.base.name, ObjectData::Light(Light::default()));
        self.base.object = Some(id);
    }

    fn read_object_data(&mut self, scene: &mut Scene, ctx: &ReadContext<'_>, time: f64) {
        let Some(id) = self.base.object else {
            return;
        };
        let prim = ctx.stage.prim(self.base.prim);
        let t = TimeCode::Time(time);
        let scale = ctx.settings.scale;
        let input = |name: &str| light_input_f32(prim, name, t);

        if let Some(ObjectData::Light(light)) = scene.object_mut(id).map(|o| &mut o.data) {
            match prim.type_name.as_str() {
                "DiskLight" => {
                    light.light_type = LightType::Area;
                    light.area_shape = AreaShape::Disk;
                    if let Some(radius) = input("radius") {
                        light.area_size = radius * 2.0 * scale;
                    }
                }
                "RectLight" => {
                    light.light_type = LightType::Area;
                    light.area_shape = AreaShape::Rect;
                    if let Some(width) = input("width") {
                        light.area_size = width * scale;
                    }
                    if let Some(height) = input("height") {
                        light.area_sizey = height * scale;
                    }
                }
                "SphereLight" => {
                    let cone_angle = input("shaping:cone:angle");
                    light.light_type = if cone_angle.is_some() {
                        LightType::Spot
                    } else {
                        LightType::Point
                    };
                    if let Some(radius) = input("radius") {
                        light.area_size = radius * scale;
                    }
                    if let Some(angle) = cone_angle {
                        light.spotsize = (angle * 2.0).to_radians();
                    }
                    if let Some(softness) = input("shaping:cone:softness") {
                        light.spotblend = softness;
                    }
                }
                "DistantLight" => {
                    light.light_type = LightType::Sun;
                    if let Some(angle) = input("angle") {
                        light.sun_angle = angle.to_radians();
                    }
                }
                other => log::debug!("{} has unexpected light type '{}'", self.base.path, other),
            }

            if let Some(intensity) = input("intensity") {
                light.energy = intensity * import_intensity_scale(ctx.params);
            }
            if let Some(specular) = input("specular") {
                light.spec_fac = specular;
            }
            if let Some(color) = light_input(prim, "color", t).and_then(|v| v.as_vec3()) {
                light.color = color;
            }
        }

        read_xform_data(&self.base, scene, ctx, time);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ImportParams;
    use crate::settings::ImportSettings;
    use usdio_core::usd::{SdfPath, Stage};
    use usdio_math::Vec3;

    const LIGHTS: &str = r#"#usda 1.0
def DiskLight "Disk"
{
    float inputs:radius = 0.5
    float inputs:intensity = 20
    color3f inputs:color = (1, 0.5, 0.25)
}

def RectLight "Rect"
{
    float width = 2
    float height = 3
    float specular = 0.5
}

def SphereLight "Spot"
{
    float inputs:radius = 0.1
    float inputs:shaping:cone:angle = 30
    float inputs:shaping:cone:softness = 0.5
}

def SphereLight "Point"
{
}

def DistantLight "Sun"
{
    float inputs:angle = 2
}
"#;

    fn read(path: &str, params: &ImportParams, scale: f32) -> Light {
        let stage = Stage::from_usda(LIGHTS).unwrap();
        let mut settings = ImportSettings::new(params);
        settings.scale = scale;
        let ctx = ReadContext { stage: &stage, params, settings: &settings };
        let prim = stage.prim_at_path(&SdfPath::new(path)).unwrap();
        let mut reader = LightReader::new(ReaderBase::new(&stage, prim, SdfPath::new(path)));
        let mut scene = Scene::default();
        reader.create_object(&mut scene, &ctx, 0.0);
        reader.read_object_data(&mut scene, &ctx, 0.0);
        match &scene.object(reader.object().unwrap()).unwrap().data {
            ObjectData::Light(light) => light.clone(),
            other => panic!("Expected light data, got {:?}", other),
        }
    }

    #[test]
    fn test_disk_light() {
        let light = read("/Disk", &ImportParams::default(), 1.0);
        assert_eq!(light.light_type, LightType::Area);
        assert_eq!(light.area_shape, AreaShape::Disk);
        assert_eq!(light.area_size, 1.0);
        assert_eq!(light.energy, 20.0);
        assert_eq!(light.color, Vec3::new(1.0, 0.5, 0.25));
    }

    #[test]
    fn test_rect_light_legacy_names_and_scale() {
        let light = read("/Rect", &ImportParams::default(), 2.0);
        assert_eq!(light.area_shape, AreaShape::Rect);
        assert_eq!(light.area_size, 4.0);
        assert_eq!(light.area_sizey, 6.0);
        assert_eq!(light.spec_fac, 0.5);
        // Missing intensity keeps the default energy
        assert_eq!(light.energy, 10.0);
    }

    #[test]
    fn test_spot_light_cone() {
        let light = read("/Spot", &ImportParams::default(), 1.0);
        assert_eq!(light.light_type, LightType::Spot);
        assert!((light.spotsize - 60f32.to_radians()).abs() < 1e-5);
        assert_eq!(light.spotblend, 0.5);
        assert!((light.area_size - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_point_light_defaults() {
        let light = read("/Point", &ImportParams::default(), 1.0);
        assert_eq!(light.light_type, LightType::Point);
        assert_eq!(light, Light::new(LightType::Point));
    }

    #[test]
    fn test_sun_angle_in_radians() {
        let light = read("/Sun", &ImportParams::default(), 1.0);
        assert_eq!(light.light_type, LightType::Sun);
        assert!((light.sun_angle - 2f32.to_radians()).abs() < 1e-6);
    }

    #[test]
    fn test_intensity_from_nits() {
        let params = ImportParams {
            convert_light_from_nits: true,
            ..Default::default()
        };
        let light = read("/Disk", &params, 1.0);
        assert!((light.energy - 20.0 * 0.001464).abs() < 1e-6);
    }

    #[test]
    fn test_read_is_idempotent() {
        let stage = Stage::from_usda(LIGHTS).unwrap();
        let params = ImportParams::default();
        let settings = ImportSettings::new(&params);
        let ctx = ReadContext { stage: &stage, params: &params, settings: &settings };
        let prim = stage.prim_at_path(&SdfPath::new("/Spot")).unwrap();
        let mut reader = LightReader::new(ReaderBase::new(&stage, prim, SdfPath::new("/Spot")));
        let mut scene = Scene::default();
        reader.create_object(&mut scene, &ctx, 0.0);
        reader.read_object_data(&mut scene, &ctx, 0.0);
        let first = scene.object(reader.object().unwrap()).unwrap().clone();
        reader.read_object_data(&mut scene, &ctx, 0.0);
        assert_eq!(scene.object(reader.object().unwrap()).unwrap(), &first);
    }
}
