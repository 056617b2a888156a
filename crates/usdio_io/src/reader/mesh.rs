use log::{debug, warn};
use usdio_core::scene::{MeshReadFlags, Modifier, ObjectData, Recalc, Scene};
use usdio_core::usd::{Prim, Stage, TimeCode};
use usdio_core::Mesh;

use super::material::import_material;
use super::xform::read_xform_data;
use super::{PrimReader, ReadContext, ReaderBase, ReaderKind};

/// Reads `Mesh` prims.
pub struct MeshReader {
    base: ReaderBase,
}

impl MeshReader {
    pub fn new(base: ReaderBase) -> Self {
        Self { base }
    }

    /// Points or topology change over time.
    fn is_animated(prim: &Prim) -> bool {
        ["points", "faceVertexCounts", "faceVertexIndices"]
            .iter()
            .any(|name| prim.attribute(name).is_some_and(|a| a.might_be_time_varying()))
    }
}

/// Convert authored ints, replacing negative entries with `invalid`.
fn to_unsigned(values: Vec<i32>, invalid: u32, what: &str, prim: &Prim) -> Vec<u32> {
    let mut out = Vec::with_capacity(values.len());
    for v in values {
        match u32::try_from(v) {
            Ok(v) => out.push(v),
            Err(_) => {
                warn!("Negative {} on {}", what, prim.path);
                out.push(invalid);
            }
        }
    }
    out
}

/// Read mesh data from `prim` at `time`.
///
/// Parts not selected by `flags` are copied from `existing` when given. UVs
/// come from `primvars:st`, expanded through `primvars:st:indices`.
pub fn read_mesh_data(prim: &Prim, time: f64, flags: MeshReadFlags, existing: Option<&Mesh>) -> Mesh {
    let t = TimeCode::Time(time);
    let mut mesh = existing.cloned().unwrap_or_default();

    if flags.contains(MeshReadFlags::VERTICES) || existing.is_none() {
        mesh.positions = prim
            .get("points", t)
            .and_then(|v| v.as_vec3_array())
            .unwrap_or_default();
    }
    if flags.contains(MeshReadFlags::POLYGONS) || existing.is_none() {
        let counts = prim.get("faceVertexCounts", t).and_then(|v| v.as_i32_array()).unwrap_or_default();
        let indices = prim.get("faceVertexIndices", t).and_then(|v| v.as_i32_array()).unwrap_or_default();
        // A negative count becomes an empty face so later faces keep their corners.
        mesh.face_vertex_counts = to_unsigned(counts, 0, "face vertex count", prim);
        mesh.face_vertex_indices = to_unsigned(indices, u32::MAX, "face vertex index", prim);

        mesh.normals = prim
            .get("normals", t)
            .or_else(|| prim.get("primvars:normals", t))
            .and_then(|v| v.as_vec3_array())
            .filter(|n| n.len() == mesh.vertex_count() || n.len() == mesh.corner_count());
    }
    if flags.contains(MeshReadFlags::UV) || existing.is_none() {
        mesh.uvs = read_uvs(prim, t, &mesh);
    }

    let left_handed = prim
        .get("orientation", TimeCode::Default)
        .is_some_and(|v| v.as_str() == Some("leftHanded"));
    if left_handed && (flags.contains(MeshReadFlags::POLYGONS) || existing.is_none()) {
        mesh.flip_winding();
    }
    mesh
}

fn read_uvs(prim: &Prim, t: TimeCode, mesh: &Mesh) -> Option<Vec<[f32; 2]>> {
    let values = prim.get("primvars:st", t)?.as_vec2_array()?;
    let uvs: Vec<[f32; 2]> = match prim.get("primvars:st:indices", t).and_then(|v| v.as_i32_array()) {
        Some(indices) => indices
            .iter()
            .map(|&i| usize::try_from(i).ok().and_then(|i| values.get(i)).map(|v| [v.x, v.y]))
            .collect::<Option<Vec<_>>>()?,
        None => values.iter().map(|v| [v.x, v.y]).collect(),
    };
    if uvs.len() == mesh.vertex_count() || uvs.len() == mesh.corner_count() {
        Some(uvs)
    } else {
        debug!("Ignoring {} UVs on {} with {} corners", uvs.len(), prim.path, mesh.corner_count());
        None
    }
}

impl PrimReader for MeshReader {
    fn base(&self) -> &ReaderBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ReaderBase {
        &mut self.base
    }

    fn kind(&self) -> ReaderKind {
        ReaderKind::Mesh
    }

    fn create_object(&mut self, scene: &mut Scene, _ctx: &ReadContext<'_>, _time: f64) {
        let id = scene.add_object_only(&self.base.name, ObjectData::Mesh(Mesh::default()));
        self.base.object = Some(id);
    }

    fn read_object_data(&mut self, scene: &mut Scene, ctx: &ReadContext<'_>, time: f64) {
        let Some(id) = self.base.object else {
            return;
        };
        let stage: &Stage = ctx.stage;
        let prim = stage.prim(self.base.prim);

        let mut mesh = read_mesh_data(prim, time, MeshReadFlags::ALL, None);
        if ctx.params.validate_meshes && mesh.validate() {
            debug!("Removed invalid faces from {}", self.base.path);
        }

        if ctx.params.import_materials {
            let bound = prim
                .relationship("material:binding")
                .and_then(|rel| rel.targets.first())
                .and_then(|target| stage.get_prim(target));
            if let Some(material_prim) = bound {
                mesh.material = Some(match scene.find_material(&material_prim.name) {
                    Some(existing) => existing,
                    None => scene.add_material(import_material(stage, material_prim, ctx.params.import_shaders_mode)),
                });
            }
        }

        let animated = Self::is_animated(prim);
        let subdivide = ctx.params.import_subdiv
            && prim
                .get("subdivisionScheme", TimeCode::Default)
                .and_then(|v| v.as_str().map(str::to_string))
                .map_or(true, |scheme| scheme != "none");

        if let Some(object) = scene.object_mut(id) {
            object.data = ObjectData::Mesh(mesh);
            object.recalc.insert(Recalc::GEOMETRY);
            if subdivide {
                object.set_modifier(Modifier::Subdivision { levels: 1 });
            }
            if animated {
                if let Some(cache_file) = ctx.settings.cache_file {
                    object.set_modifier(Modifier::MeshSequenceCache {
                        cache_file,
                        object_path: self.base.path.to_string(),
                        read_flags: ctx.params.global_read_flag,
                    });
                }
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
    use usdio_core::scene::CacheFile;
    use usdio_core::usd::SdfPath;
    use usdio_math::Vec3;

    fn face_normal(a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
        (b - a).cross(c - a).normalize_or_zero()
    }

    const MESHES: &str = r#"#usda 1.0
def Mesh "Quad"
{
    int[] faceVertexCounts = [4]
    int[] faceVertexIndices = [0, 1, 2, 3]
    point3f[] points = [(0, 0, 0), (1, 0, 0), (1, 1, 0), (0, 1, 0)]
    texCoord2f[] primvars:st = [(0, 0), (1, 1)] (
        interpolation = "faceVarying"
    )
    int[] primvars:st:indices = [0, 1, 1, 0]
    rel material:binding = </Looks/Red>
}

def Mesh "LeftHanded"
{
    uniform token orientation = "leftHanded"
    int[] faceVertexCounts = [3]
    int[] faceVertexIndices = [0, 1, 2]
    point3f[] points = [(0, 0, 0), (1, 0, 0), (0, 1, 0)]
}

def Mesh "Deforming"
{
    uniform token subdivisionScheme = "catmullClark"
    int[] faceVertexCounts = [3]
    int[] faceVertexIndices = [0, 1, 2]
    point3f[] points.timeSamples = {
        1: [(0, 0, 0), (1, 0, 0), (0, 1, 0)],
        2: [(0, 0, 1), (1, 0, 1), (0, 1, 1)],
    }
}

def Scope "Looks"
{
    def Material "Red"
    {
    }
}
"#;

    struct Fixture {
        stage: Stage,
        params: ImportParams,
        scene: Scene,
        settings: ImportSettings,
    }

    impl Fixture {
        fn new(params: ImportParams) -> Self {
            let stage = Stage::from_usda(MESHES).unwrap();
            let mut scene = Scene::default();
            let mut settings = ImportSettings::new(&params);
            settings.cache_file = Some(scene.add_cache_file(CacheFile::new("meshes.usda")));
            Self { stage, params, scene, settings }
        }

        fn read(&mut self, path: &str, time: f64) -> MeshReader {
            let ctx = ReadContext { stage: &self.stage, params: &self.params, settings: &self.settings };
            let prim = self.stage.prim_at_path(&SdfPath::new(path)).unwrap();
            let mut reader = MeshReader::new(ReaderBase::new(&self.stage, prim, SdfPath::new(path)));
            reader.create_object(&mut self.scene, &ctx, time);
            reader.read_object_data(&mut self.scene, &ctx, time);
            reader
        }
    }

    #[test]
    fn test_quad_with_indexed_uvs_and_material() {
        let mut fx = Fixture::new(ImportParams::default());
        let reader = fx.read("/Quad", 0.0);
        let object = fx.scene.object(reader.object().unwrap()).unwrap();
        let mesh = object.mesh().unwrap();

        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.face_vertex_counts, vec![4]);
        assert_eq!(mesh.uvs.as_ref().unwrap()[1], [1.0, 1.0]);
        assert_eq!(mesh.uvs.as_ref().unwrap()[3], [0.0, 0.0]);

        let material = fx.scene.material(mesh.material.unwrap()).unwrap();
        assert_eq!(material.name, "Red");
        assert!(object.modifiers.is_empty());
    }

    #[test]
    fn test_left_handed_winding_is_flipped() {
        let mut fx = Fixture::new(ImportParams::default());
        let reader = fx.read("/LeftHanded", 0.0);
        let mesh = fx.scene.object(reader.object().unwrap()).unwrap().mesh().unwrap();
        assert_eq!(mesh.face_vertex_indices, vec![2, 1, 0]);
        let p = &mesh.positions;
        let n = face_normal(p[2], p[1], p[0]);
        assert!((n - Vec3::NEG_Z).length() < 1e-6);
    }

    #[test]
    fn test_deforming_mesh_gets_cache_modifier() {
        let params = ImportParams {
            import_subdiv: true,
            ..Default::default()
        };
        let mut fx = Fixture::new(params);
        let mut reader = fx.read("/Deforming", 2.0);
        {
            let ctx = ReadContext { stage: &fx.stage, params: &fx.params, settings: &fx.settings };
            reader.read_object_data(&mut fx.scene, &ctx, 2.0);
        }
        let object = fx.scene.object(reader.object().unwrap()).unwrap();
        assert_eq!(object.mesh().unwrap().positions[0], Vec3::Z);
        assert_eq!(object.modifiers.len(), 2);
        let (_, path, flags) = object.mesh_cache().unwrap();
        assert_eq!(path, "/Deforming");
        assert!(flags.contains(MeshReadFlags::POLYGONS));
    }

    #[test]
    fn test_materials_are_shared_by_name() {
        let mut fx = Fixture::new(ImportParams::default());
        fx.read("/Quad", 0.0);
        fx.read("/Quad", 0.0);
        assert_eq!(fx.scene.material_count(), 1);
    }

    #[test]
    fn test_negative_face_count_keeps_other_faces() {
        let usda = r#"#usda 1.0
def Mesh "Broken"
{
    int[] faceVertexCounts = [-1, 3]
    int[] faceVertexIndices = [0, 1, 2]
    point3f[] points = [(0, 0, 0), (1, 0, 0), (0, 1, 0)]
}
"#;
        let stage = Stage::from_usda(usda).unwrap();
        let prim = stage.get_prim(&SdfPath::new("/Broken")).unwrap();
        let mut mesh = read_mesh_data(prim, 0.0, MeshReadFlags::ALL, None);
        assert_eq!(mesh.face_vertex_counts, vec![0, 3]);
        assert_eq!(mesh.triangulate(), vec![0, 1, 2]);

        assert!(mesh.validate());
        assert_eq!(mesh.face_vertex_counts, vec![3]);
        assert_eq!(mesh.face_vertex_indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_read_flags_keep_existing_parts() {
        let stage = Stage::from_usda(MESHES).unwrap();
        let prim = stage.get_prim(&SdfPath::new("/Deforming")).unwrap();
        let at_one = read_mesh_data(prim, 1.0, MeshReadFlags::ALL, None);
        let mut stale = at_one.clone();
        stale.face_vertex_indices = vec![0, 2, 1];

        let updated = read_mesh_data(prim, 2.0, MeshReadFlags::VERTICES, Some(&stale));
        assert_eq!(updated.positions[0], Vec3::Z);
        assert_eq!(updated.face_vertex_indices, vec![0, 2, 1]);
    }
}
