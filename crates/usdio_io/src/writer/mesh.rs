use log::warn;
use usdio_core::scene::{Modifier, ObjectData};
use usdio_core::usd::{PrimId, SdfPath, Stage, TimeCode, Value};
use usdio_core::Mesh;
use usdio_math::Vec2;

use super::material::write_material;
use super::{define_prim, set_attr, set_uniform, ExportContext, HierarchyContext, PrimWriter};

/// Writes mesh data as a `Mesh` prim.
pub struct MeshWriter {
    path: SdfPath,
}

impl MeshWriter {
    pub fn new(path: SdfPath) -> Self {
        Self { path }
    }
}

fn interpolation(per_corner: bool) -> &'static str {
    if per_corner {
        "faceVarying"
    } else {
        "vertex"
    }
}

fn to_i32(values: &[u32]) -> Vec<i32> {
    values.iter().map(|&v| v as i32).collect()
}

impl PrimWriter for MeshWriter {
    fn usd_path(&self) -> &SdfPath {
        &self.path
    }

    fn write(&mut self, stage: &mut Stage, ctx: &ExportContext<'_>, hier: &HierarchyContext) {
        let params = ctx.params;
        let Some(object) = ctx.scene.object(hier.object) else {
            return;
        };
        let ObjectData::Mesh(mesh) = &object.data else {
            warn!("{} is not a mesh", object.name);
            return;
        };
        let Some(prim) = define_prim(stage, params, &self.path, "Mesh") else {
            warn!("Could not define mesh at {}", self.path);
            return;
        };
        let time = ctx.time_for(hier.is_animated);

        write_mesh_data(stage, prim, mesh, params.export_normals, params.export_uvmaps, time);

        let subdivided = object.modifiers.iter().any(|m| matches!(m, Modifier::Subdivision { .. }));
        set_uniform(
            stage,
            prim,
            "subdivisionScheme",
            "token",
            if subdivided { "catmullClark" } else { "none" },
        );

        if params.export_materials {
            let material = mesh.material.and_then(|id| ctx.scene.material(id));
            if let Some(path) = material.and_then(|m| write_material(stage, params, m)) {
                stage.set_relationship(prim, "material:binding", vec![path]);
            }
        }
    }
}

fn write_mesh_data(
    stage: &mut Stage,
    prim: PrimId,
    mesh: &Mesh,
    normals: bool,
    uvs: bool,
    time: TimeCode,
) {
    set_attr(stage, prim, "points", "point3f[]", Value::from_vec3_array(&mesh.positions), time);
    set_attr(
        stage,
        prim,
        "faceVertexCounts",
        "int[]",
        Value::from_i32_array(&to_i32(&mesh.face_vertex_counts)),
        time,
    );
    set_attr(
        stage,
        prim,
        "faceVertexIndices",
        "int[]",
        Value::from_i32_array(&to_i32(&mesh.face_vertex_indices)),
        time,
    );
    if let Some((min, max)) = mesh.bounds() {
        set_attr(stage, prim, "extent", "float3[]", Value::from_vec3_array(&[min, max]), time);
    }

    if let (true, Some(values)) = (normals, &mesh.normals) {
        let attr = stage.create_attribute(prim, "normals", "normal3f[]", Default::default());
        attr.set(Value::from_vec3_array(values), time);
        attr.set_metadata("interpolation", interpolation(mesh.normals_are_face_varying()));
    }
    if let (true, Some(values)) = (uvs, &mesh.uvs) {
        let st: Vec<Vec2> = values.iter().map(|uv| Vec2::from_array(*uv)).collect();
        let attr = stage.create_attribute(prim, "primvars:st", "texCoord2f[]", Default::default());
        attr.set(Value::from_vec2_array(&st), time);
        attr.set_metadata("interpolation", interpolation(mesh.uvs_are_face_varying()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{ExportParams, ImportParams};
    use crate::reader::read_mesh_data;
    use usdio_core::scene::{Material, MeshReadFlags, Scene};
    use usdio_math::{Mat4, Vec3};

    fn quad() -> Mesh {
        let mut mesh = Mesh::new(
            vec![Vec3::ZERO, Vec3::X, Vec3::new(1.0, 1.0, 0.0), Vec3::Y],
            vec![4],
            vec![0, 1, 2, 3],
        );
        mesh.uvs = Some(vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]);
        mesh
    }

    fn export(scene: &Scene, object: usdio_core::scene::ObjectId, params: &ExportParams) -> Stage {
        let mut stage = Stage::new();
        let ctx = ExportContext {
            scene,
            params,
            time: TimeCode::Default,
        };
        let hier = HierarchyContext {
            object,
            export_path: SdfPath::new("/Quad"),
            data_path: Some(SdfPath::new("/Quad/Quad")),
            matrix: Mat4::IDENTITY,
            is_animated: false,
            instance_of: None,
            in_prototype: false,
        };
        MeshWriter::new(SdfPath::new("/Quad/Quad")).write(&mut stage, &ctx, &hier);
        stage
    }

    #[test]
    fn test_mesh_round_trip() {
        let mut scene = Scene::default();
        let mut mesh = quad();
        mesh.material = Some(scene.add_material(Material::new("Red", Vec3::X)));
        let object = scene.add_object_only("Quad", ObjectData::Mesh(mesh.clone()));

        let stage = export(&scene, object, &ExportParams::default());
        let prim = stage.get_prim(&SdfPath::new("/Quad/Quad")).unwrap();
        assert_eq!(prim.type_name, "Mesh");
        assert_eq!(
            prim.relationship("material:binding").unwrap().targets,
            vec![SdfPath::new("/Looks/Red")]
        );
        assert_eq!(
            prim.attribute("primvars:st").unwrap().metadata("interpolation").and_then(|v| v.as_str()),
            Some("vertex")
        );

        let read = read_mesh_data(prim, 0.0, ImportParams::default().global_read_flag, None);
        assert_eq!(read.positions, mesh.positions);
        assert_eq!(read.face_vertex_counts, mesh.face_vertex_counts);
        assert_eq!(read.face_vertex_indices, mesh.face_vertex_indices);
        assert_eq!(read.uvs, mesh.uvs);
    }

    #[test]
    fn test_uvs_and_materials_optional() {
        let mut scene = Scene::default();
        let mut mesh = quad();
        mesh.material = Some(scene.add_material(Material::new("Red", Vec3::X)));
        let object = scene.add_object_only("Quad", ObjectData::Mesh(mesh));
        scene
            .object_mut(object)
            .unwrap()
            .set_modifier(Modifier::Subdivision { levels: 2 });

        let params = ExportParams {
            export_uvmaps: false,
            export_materials: false,
            ..Default::default()
        };
        let stage = export(&scene, object, &params);
        let prim = stage.get_prim(&SdfPath::new("/Quad/Quad")).unwrap();
        assert!(prim.attribute("primvars:st").is_none());
        assert!(prim.relationship("material:binding").is_none());
        assert!(stage.get_prim(&SdfPath::new("/Looks")).is_none());
        assert_eq!(
            prim.get("subdivisionScheme", TimeCode::Default).unwrap().as_str(),
            Some("catmullClark")
        );
        let read = read_mesh_data(prim, 0.0, MeshReadFlags::ALL, None);
        assert!(read.uvs.is_none());
    }
}
