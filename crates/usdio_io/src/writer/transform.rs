use log::warn;
use usdio_core::usd::{xform::XFORM_OP_ORDER, Reference, SdfPath, Stage, TimeCode, Value, Variability};
use usdio_math::Mat4Ext;

use super::{define_prim, set_attr, set_uniform, ExportContext, HierarchyContext, PrimWriter};

const TRANSFORM_OP: &str = "xformOp:transform";

/// Writes an object's transform as a single `xformOp:transform`.
pub struct TransformWriter {
    path: SdfPath,
}

impl TransformWriter {
    pub fn new(path: SdfPath) -> Self {
        Self { path }
    }
}

impl PrimWriter for TransformWriter {
    fn usd_path(&self) -> &SdfPath {
        &self.path
    }

    fn write(&mut self, stage: &mut Stage, ctx: &ExportContext<'_>, hier: &HierarchyContext) {
        let params = ctx.params;
        let Some(prim) = define_prim(stage, params, &self.path, "Xform") else {
            warn!("Could not define transform at {}", self.path);
            return;
        };

        if let Some(proto) = &hier.instance_of {
            let meta = &mut stage.prim_mut(prim).metadata;
            meta.instanceable = Some(true);
            if meta.references.iter().all(|r| r.prim_path.as_ref() != Some(proto)) {
                meta.references.push(Reference::internal(proto.clone()));
            }
        }

        if hier.is_animated || params.export_identity_transforms || !hier.matrix.is_identity_approx(1e-6) {
            set_attr(
                stage,
                prim,
                TRANSFORM_OP,
                "matrix4d",
                Value::from_mat4(hier.matrix),
                ctx.time_for(hier.is_animated),
            );
            set_uniform(stage, prim, XFORM_OP_ORDER, "token[]", Value::from_str_array(&[TRANSFORM_OP]));
        }

        if params.author_object_name {
            if let Some(object) = ctx.scene.object(hier.object) {
                let attr =
                    stage.create_attribute(prim, "userProperties:usdio:object_name", "string", Variability::Uniform);
                attr.custom = true;
                attr.set(object.name.as_str(), TimeCode::Default);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ExportParams;
    use usdio_core::scene::{ObjectData, Scene};
    use usdio_core::usd::xform;
    use usdio_math::{Mat4, Vec3};

    fn write(params: &ExportParams, matrix: Mat4) -> Stage {
        let mut scene = Scene::default();
        let object = scene.add_object_only("Cube", ObjectData::Empty);
        let mut stage = Stage::new();
        let ctx = ExportContext {
            scene: &scene,
            params,
            time: TimeCode::Default,
        };
        let hier = HierarchyContext {
            object,
            export_path: SdfPath::new("/Cube"),
            data_path: None,
            matrix,
            is_animated: false,
            instance_of: None,
            in_prototype: false,
        };
        TransformWriter::new(SdfPath::new("/Cube")).write(&mut stage, &ctx, &hier);
        stage
    }

    #[test]
    fn test_transform_round_trip() {
        let matrix = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)) * Mat4::from_rotation_z(0.5);
        let stage = write(&ExportParams::default(), matrix);
        let prim = stage.get_prim(&SdfPath::new("/Cube")).unwrap();
        assert_eq!(prim.type_name, "Xform");
        let read = xform::local_transform(prim, TimeCode::Default).as_mat4();
        assert!(read.abs_diff_eq(matrix, 1e-5));
        assert_eq!(
            prim.get("userProperties:usdio:object_name", TimeCode::Default).unwrap().as_str(),
            Some("Cube")
        );
    }

    #[test]
    fn test_identity_skipped() {
        let stage = write(&ExportParams::default(), Mat4::IDENTITY);
        let prim = stage.get_prim(&SdfPath::new("/Cube")).unwrap();
        assert!(!xform::has_xform_ops(prim));

        let params = ExportParams {
            export_identity_transforms: true,
            export_as_overs: true,
            ..Default::default()
        };
        let stage = write(&params, Mat4::IDENTITY);
        let prim = stage.get_prim(&SdfPath::new("/Cube")).unwrap();
        assert!(xform::has_xform_ops(prim));
        assert_eq!(prim.specifier, usdio_core::usd::Specifier::Over);
    }
}
