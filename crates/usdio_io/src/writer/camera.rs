use log::warn;
use usdio_core::scene::{ObjectData, Projection};
use usdio_core::usd::{SdfPath, Stage, Value};
use usdio_math::Vec2;

use super::{define_prim, set_attr, ExportContext, HierarchyContext, PrimWriter};

/// Writes camera data as a `Camera` prim.
pub struct CameraWriter {
    path: SdfPath,
}

impl CameraWriter {
    pub fn new(path: SdfPath) -> Self {
        Self { path }
    }
}

impl PrimWriter for CameraWriter {
    fn usd_path(&self) -> &SdfPath {
        &self.path
    }

    fn write(&mut self, stage: &mut Stage, ctx: &ExportContext<'_>, hier: &HierarchyContext) {
        let Some(ObjectData::Camera(cam)) = ctx.scene.object(hier.object).map(|o| &o.data) else {
            return;
        };
        let Some(prim) = define_prim(stage, ctx.params, &self.path, "Camera") else {
            warn!("Could not define camera at {}", self.path);
            return;
        };
        let t = ctx.time_for(hier.is_animated);

        let (aperture_x, aperture_y, projection) = match cam.projection {
            Projection::Perspective => (cam.sensor_x, cam.sensor_y, "perspective"),
            Projection::Orthographic => {
                let aspect = if cam.sensor_x > 0.0 { cam.sensor_y / cam.sensor_x } else { 1.0 };
                (cam.ortho_scale, cam.ortho_scale * aspect, "orthographic")
            }
        };
        set_attr(stage, prim, "projection", "token", projection, t);
        set_attr(stage, prim, "focalLength", "float", cam.lens, t);
        set_attr(stage, prim, "horizontalAperture", "float", aperture_x, t);
        set_attr(stage, prim, "verticalAperture", "float", aperture_y, t);
        set_attr(stage, prim, "horizontalApertureOffset", "float", cam.shift_x, t);
        set_attr(stage, prim, "verticalApertureOffset", "float", cam.shift_y, t);
        set_attr(
            stage,
            prim,
            "clippingRange",
            "float2",
            Value::from_vec2(Vec2::new(cam.clip_start, cam.clip_end)),
            t,
        );
        set_attr(stage, prim, "focusDistance", "float", cam.focus_distance, t);
        set_attr(stage, prim, "fStop", "float", cam.fstop, t);
    }
}
