use usdio_core::scene::{Camera, ObjectData, Projection, Scene};
use usdio_core::usd::TimeCode;

use super::xform::read_xform_data;
use super::{PrimReader, ReadContext, ReaderBase, ReaderKind};

/// Reads `Camera` prims.
pub struct CameraReader {
    base: ReaderBase,
}

impl CameraReader {
    pub fn new(base: ReaderBase) -> Self {
        Self { base }
    }
}

impl PrimReader for CameraReader {
    fn base(&self) -> &ReaderBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ReaderBase {
        &mut self.base
    }

    fn kind(&self) -> ReaderKind {
        ReaderKind::Camera
    }

    fn create_object(&mut self, scene: &mut Scene, _ctx: &ReadContext<'_>, _time: f64) {
        let id = scene.add_object_only(&self.base.name, ObjectData::Camera(Camera::default()));
        self.base.object = Some(id);
    }

    fn read_object_data(&mut self, scene: &mut Scene, ctx: &ReadContext<'_>, time: f64) {
        let Some(id) = self.base.object else {
            return;
        };
        let prim = ctx.stage.prim(self.base.prim);
        let t = TimeCode::Time(time);
        let f = |name: &str| prim.get(name, t).and_then(|v| v.as_f32());
        let scale = ctx.settings.scale;

        if let Some(ObjectData::Camera(cam)) = scene.object_mut(id).map(|o| &mut o.data) {
            if let Some(v) = f("focalLength") {
                cam.lens = v;
            }
            if let Some(v) = f("horizontalAperture") {
                cam.sensor_x = v;
            }
            if let Some(v) = f("verticalAperture") {
                cam.sensor_y = v;
            }
            if let Some(v) = f("horizontalApertureOffset") {
                cam.shift_x = v;
            }
            if let Some(v) = f("verticalApertureOffset") {
                cam.shift_y = v;
            }
            if let Some(token) = prim.get("projection", t) {
                cam.projection = match token.as_str() {
                    Some("orthographic") => Projection::Orthographic,
                    _ => Projection::Perspective,
                };
            }
            if let Some(range) = prim.get("clippingRange", t).and_then(|v| v.as_vec2()) {
                cam.clip_start = (range.x * scale).max(0.1);
                cam.clip_end = range.y * scale;
            }
            if let Some(v) = f("focusDistance") {
                cam.focus_distance = v * scale;
            }
            if let Some(v) = f("fStop") {
                cam.fstop = v;
            }
            if cam.projection == Projection::Orthographic {
                let h = f("horizontalAperture").unwrap_or(cam.sensor_x);
                let v = f("verticalAperture").unwrap_or(cam.sensor_y);
                cam.ortho_scale = h.max(v);
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

    const CAMERAS: &str = r#"#usda 1.0
def Camera "Persp"
{
    float focalLength = 35
    float horizontalAperture = 36
    float verticalAperture = 24
    float horizontalApertureOffset = 0.25
    float verticalApertureOffset = -0.5
    float2 clippingRange = (0.01, 500)
    float focusDistance = 4
    float fStop = 5.6
    token projection = "perspective"
}

def Camera "Ortho"
{
    float horizontalAperture = 10
    float verticalAperture = 12
    token projection = "orthographic"
}
"#;

    fn read(path: &str, scale: f32) -> Camera {
        let stage = Stage::from_usda(CAMERAS).unwrap();
        let params = ImportParams::default();
        let mut settings = ImportSettings::new(&params);
        settings.scale = scale;
        let ctx = ReadContext { stage: &stage, params: &params, settings: &settings };
        let prim = stage.prim_at_path(&SdfPath::new(path)).unwrap();
        let mut reader = CameraReader::new(ReaderBase::new(&stage, prim, SdfPath::new(path)));
        let mut scene = Scene::default();
        reader.create_object(&mut scene, &ctx, 0.0);
        reader.read_object_data(&mut scene, &ctx, 0.0);
        match &scene.object(reader.object().unwrap()).unwrap().data {
            ObjectData::Camera(cam) => cam.clone(),
            other => panic!("Expected camera data, got {:?}", other),
        }
    }

    #[test]
    fn test_perspective_camera() {
        let cam = read("/Persp", 1.0);
        assert_eq!(cam.projection, Projection::Perspective);
        assert_eq!(cam.lens, 35.0);
        assert_eq!(cam.sensor_x, 36.0);
        assert_eq!(cam.sensor_y, 24.0);
        assert_eq!(cam.shift_x, 0.25);
        assert_eq!(cam.shift_y, -0.5);
        // Near plane is floored
        assert_eq!(cam.clip_start, 0.1);
        assert_eq!(cam.clip_end, 500.0);
        assert_eq!(cam.focus_distance, 4.0);
        assert!((cam.fstop - 5.6).abs() < 1e-5);
    }

    #[test]
    fn test_camera_distances_scale() {
        let cam = read("/Persp", 100.0);
        assert!((cam.clip_start - 1.0).abs() < 1e-4);
        assert!((cam.clip_end - 50000.0).abs() < 1e-2);
        assert!((cam.focus_distance - 400.0).abs() < 1e-3);
        assert_eq!(cam.lens, 35.0);
    }

    #[test]
    fn test_orthographic_camera() {
        let cam = read("/Ortho", 1.0);
        assert_eq!(cam.projection, Projection::Orthographic);
        assert_eq!(cam.ortho_scale, 12.0);
        // Unauthored values keep the camera defaults
        assert_eq!(cam.lens, 50.0);
        assert_eq!(cam.clip_end, 100.0);
    }
}
