use log::debug;
use usdio_core::scene::{Constraint, ObjectData, Recalc, Scene};
use usdio_core::usd::{xform, TimeCode};
use usdio_math::{Mat4, Vec3};

use super::{PrimReader, ReadContext, ReaderBase, ReaderKind};

/// Reads `Xform` and `Scope` prims into empties.
pub struct XformReader {
    base: ReaderBase,
}

impl XformReader {
    pub fn new(base: ReaderBase) -> Self {
        Self { base }
    }
}

impl PrimReader for XformReader {
    fn base(&self) -> &ReaderBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ReaderBase {
        &mut self.base
    }

    fn kind(&self) -> ReaderKind {
        ReaderKind::Xform
    }

    fn create_object(&mut self, scene: &mut Scene, _ctx: &ReadContext<'_>, _time: f64) {
        let id = scene.add_object_only(&self.base.name, ObjectData::Empty);
        if let Some(object) = scene.object_mut(id) {
            object.empty_display_size = 0.1;
        }
        self.base.object = Some(id);
    }

    fn read_object_data(&mut self, scene: &mut Scene, ctx: &ReadContext<'_>, time: f64) {
        read_xform_data(&self.base, scene, ctx, time);
    }
}

/// Local matrix of the reader's transform prim at `time`.
///
/// Global scale and the axis conversion are applied to root readers only;
/// children inherit them through parenting.
pub fn read_matrix(base: &ReaderBase, ctx: &ReadContext<'_>, time: f64) -> (Mat4, bool) {
    let prim = ctx.stage.prim(base.xform_prim);
    if !xform::is_xformable_type(&prim.type_name) {
        // Scopes and typeless prims
        return (Mat4::IDENTITY, true);
    }

    let is_constant = !xform::transform_might_be_time_varying(prim);
    let mut matrix = xform::local_transform(prim, TimeCode::Time(time)).as_mat4();

    if base.is_root {
        let scale = ctx.settings.scale;
        if scale != 1.0 {
            matrix = Mat4::from_scale(Vec3::splat(scale)) * matrix;
        }
        if ctx.settings.do_convert_mat {
            matrix = ctx.settings.conversion_mat * matrix;
        }
    }
    (matrix, is_constant)
}

/// Apply the reader's transform to its object, adding a transform-cache
/// constraint when the transform is animated.
pub(crate) fn read_xform_data(base: &ReaderBase, scene: &mut Scene, ctx: &ReadContext<'_>, time: f64) {
    let Some(id) = base.object else {
        return;
    };
    let (matrix, is_constant) = read_matrix(base, ctx, time);
    let Some(object) = scene.object_mut(id) else {
        debug!("Object for {} was freed", base.path);
        return;
    };

    if !is_constant {
        match ctx.settings.cache_file {
            Some(cache_file) => object.set_constraint(Constraint::TransformCache {
                cache_file,
                object_path: base.xform_path.to_string(),
            }),
            None => debug!("No cache file to animate {}", base.path),
        }
    }
    object.matrix = matrix;
    object.recalc.insert(Recalc::TRANSFORM);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ImportParams;
    use crate::settings::ImportSettings;
    use usdio_core::scene::CacheFile;
    use usdio_core::usd::{SdfPath, Stage};

    const XFORMS: &str = r#"#usda 1.0
def Xform "Static"
{
    double3 xformOp:translate = (1, 2, 3)
    uniform token[] xformOpOrder = ["xformOp:translate"]
}

def Xform "Animated"
{
    double3 xformOp:translate.timeSamples = {
        1: (0, 0, 0),
        3: (4, 0, 0),
    }
    uniform token[] xformOpOrder = ["xformOp:translate"]
}

def Scope "Group"
{
}
"#;

    fn reader(stage: &Stage, path: &str) -> XformReader {
        let prim = stage.prim_at_path(&SdfPath::new(path)).unwrap();
        XformReader::new(ReaderBase::new(stage, prim, SdfPath::new(path)))
    }

    #[test]
    fn test_static_xform() {
        let stage = Stage::from_usda(XFORMS).unwrap();
        let params = ImportParams::default();
        let mut scene = Scene::default();
        let mut settings = ImportSettings::new(&params);
        settings.cache_file = Some(scene.add_cache_file(CacheFile::new("xforms.usda")));
        let ctx = ReadContext { stage: &stage, params: &params, settings: &settings };

        let mut r = reader(&stage, "/Static");
        r.create_object(&mut scene, &ctx, 0.0);
        r.read_object_data(&mut scene, &ctx, 0.0);

        let object = scene.object(r.object().unwrap()).unwrap();
        assert_eq!(object.empty_display_size, 0.1);
        assert_eq!(object.matrix.w_axis.truncate(), Vec3::new(1.0, 2.0, 3.0));
        assert!(object.constraints.is_empty());
    }

    #[test]
    fn test_animated_xform_gets_single_constraint() {
        let stage = Stage::from_usda(XFORMS).unwrap();
        let params = ImportParams::default();
        let mut scene = Scene::default();
        let mut settings = ImportSettings::new(&params);
        settings.cache_file = Some(scene.add_cache_file(CacheFile::new("xforms.usda")));
        let ctx = ReadContext { stage: &stage, params: &params, settings: &settings };

        let mut r = reader(&stage, "/Animated");
        r.create_object(&mut scene, &ctx, 0.0);
        r.read_object_data(&mut scene, &ctx, 2.0);
        let first = scene.object(r.object().unwrap()).unwrap().clone();
        r.read_object_data(&mut scene, &ctx, 2.0);
        let second = scene.object(r.object().unwrap()).unwrap();

        assert_eq!(&first, second);
        assert_eq!(second.constraints.len(), 1);
        assert_eq!(second.transform_cache().unwrap().1, "/Animated");
        assert!((second.matrix.w_axis.x - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_scale_and_conversion_only_on_root() {
        let stage = Stage::from_usda(XFORMS).unwrap();
        let params = ImportParams::default();
        let mut settings = ImportSettings::new(&params);
        settings.scale = 2.0;
        settings.do_convert_mat = true;
        settings.conversion_mat = usdio_math::z_up_conversion();
        let ctx = ReadContext { stage: &stage, params: &params, settings: &settings };

        let mut r = reader(&stage, "/Static");
        let (local, constant) = r.read_matrix(&ctx, 0.0);
        assert!(constant);
        assert_eq!(local.w_axis.truncate(), Vec3::new(1.0, 2.0, 3.0));

        r.base_mut().is_root = true;
        let (root, _) = r.read_matrix(&ctx, 0.0);
        // (1, 2, 3) scaled by 2 then rotated +90 degrees about X
        assert!((root.w_axis.truncate() - Vec3::new(2.0, -6.0, 4.0)).length() < 1e-4);
    }

    #[test]
    fn test_scope_is_identity() {
        let stage = Stage::from_usda(XFORMS).unwrap();
        let params = ImportParams::default();
        let settings = ImportSettings::new(&params);
        let ctx = ReadContext { stage: &stage, params: &params, settings: &settings };
        let mut r = reader(&stage, "/Group");
        r.base_mut().is_root = true;
        assert_eq!(r.read_matrix(&ctx, 0.0), (Mat4::IDENTITY, true));
    }
}
