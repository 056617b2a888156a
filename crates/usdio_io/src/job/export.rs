use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use log::{debug, info, warn};
use usdio_core::scene::Scene;
use usdio_core::usd::{SdfPath, Stage, TimeCode};

use super::{JobContext, JobHandle, JobOutcome, JobState, ReportLevel};
use crate::error::{IoError, IoResult};
use crate::params::ExportParams;
use crate::writer::HierarchyIterator;

/// Export `scene` to `path` on the calling thread.
///
/// The scene is mutable because animated exports step its frame; the
/// current frame is restored before returning.
pub fn export_usd(scene: &mut Scene, path: impl AsRef<Path>, params: &ExportParams) -> JobOutcome {
    export_usd_with(scene, path.as_ref(), params, &JobContext::new())
}

/// Export with a caller-provided context for progress and cancellation.
pub fn export_usd_with(scene: &mut Scene, path: &Path, params: &ExportParams, ctx: &JobContext) -> JobOutcome {
    let mut job = ExportJob {
        path: with_usd_extension(path),
        params: params.clone(),
        created: false,
    };

    ctx.set_state(JobState::Running);
    scene.interface_locked = true;
    let original_frame = scene.frame_current;
    let started = Instant::now();
    let result = job.run(scene, ctx);
    if scene.frame_current != original_frame {
        scene.set_frame(original_frame);
    }
    if result.is_err() {
        job.remove_output();
    }
    scene.interface_locked = false;

    match &result {
        Ok(()) => info!("USD export to {} took {:.2?}", job.path.display(), started.elapsed()),
        Err(IoError::CancellationRequested) => ctx.report(ReportLevel::Info, "USD export canceled"),
        Err(_) => {}
    }
    JobOutcome::finish(ctx, result)
}

/// Run an export on a worker thread. The scene comes back with the outcome.
pub fn spawn_export(
    scene: Scene,
    path: impl Into<PathBuf>,
    params: ExportParams,
) -> IoResult<JobHandle<(Scene, JobOutcome)>> {
    let path = path.into();
    JobHandle::spawn("usd-export", Arc::new(JobContext::new()), move |ctx| {
        let mut scene = scene;
        let outcome = export_usd_with(&mut scene, &path, &params, &ctx);
        (scene, outcome)
    })
}

/// `path` with `.usd` appended unless it already has a USD extension.
pub fn with_usd_extension(path: &Path) -> PathBuf {
    let has_usd_ext = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| matches!(e.to_ascii_lowercase().as_str(), "usd" | "usda" | "usdc"));
    if has_usd_ext {
        path.to_path_buf()
    } else {
        let mut s = OsString::from(path.as_os_str());
        s.push(".usd");
        PathBuf::from(s)
    }
}

/// Frames sampled by an animated export, inclusive of both ends.
fn export_frames(params: &ExportParams) -> Vec<f64> {
    let step = if params.frame_step > 0.0 { params.frame_step } else { 1.0 };
    let start = f64::from(params.frame_start);
    let end = f64::from(params.frame_end);
    let mut frames = Vec::new();
    let mut frame = start;
    while frame <= end + 1e-9 {
        frames.push(frame);
        frame += step;
    }
    frames
}

struct ExportJob {
    path: PathBuf,
    params: ExportParams,
    created: bool,
}

fn check_canceled(ctx: &JobContext) -> IoResult<()> {
    if ctx.is_canceled() {
        Err(IoError::CancellationRequested)
    } else {
        Ok(())
    }
}

impl ExportJob {
    fn run(&mut self, scene: &mut Scene, ctx: &JobContext) -> IoResult<()> {
        check_canceled(ctx)?;

        let mut stage = match Stage::create_new(&self.path) {
            Ok(stage) => stage,
            Err(e) => {
                ctx.report(
                    ReportLevel::Error,
                    format!("USD Export: unable to create stage at {}", self.path.display()),
                );
                return Err(IoError::from_stage(&self.path, e));
            }
        };
        self.created = true;

        stage.metadata.up_axis = Some(if self.params.convert_orientation {
            self.params.up_axis.letter().to_string()
        } else {
            "Z".to_string()
        });
        stage.metadata.meters_per_unit = Some(f64::from(scene.unit_scale));
        stage.metadata.documentation = Some(format!("usdio v{}", env!("CARGO_PKG_VERSION")));
        if self.params.export_animation {
            stage.metadata.time_codes_per_second = Some(scene.fps);
            stage.metadata.start_time_code = Some(f64::from(self.params.frame_start));
            stage.metadata.end_time_code = Some(f64::from(self.params.frame_end));
        }

        let mut iterator = HierarchyIterator::new(self.params.clone());
        let root = iterator.root_path();
        if !root.is_root() && stage.define_prim(&root, "Xform").is_none() {
            return Err(IoError::InvalidObject(format!("bad root prim path {}", root)));
        }

        if self.params.export_animation {
            let frames = export_frames(&self.params);
            let total = frames.len().max(1) as f32;
            for (i, frame) in frames.into_iter().enumerate() {
                check_canceled(ctx)?;
                scene.set_frame(frame);
                let written = iterator.iterate_and_write(&mut stage, scene, TimeCode::Time(frame));
                debug!("Frame {}: wrote {} prims", frame, written);
                ctx.set_progress((i + 1) as f32 / total);
            }
        } else {
            iterator.iterate_and_write(&mut stage, scene, TimeCode::Default);
            ctx.set_progress(1.0);
        }
        iterator.release_writers();
        check_canceled(ctx)?;

        self.set_default_prim(&mut stage, &root, ctx);
        stage.save().map_err(|e| IoError::from_stage(&self.path, e))?;
        ctx.report(
            ReportLevel::Info,
            format!("Exported {} prims to {}", stage.prim_count(), self.path.display()),
        );
        Ok(())
    }

    /// Use the requested default prim, falling back to the root prim or
    /// the first root-level prim.
    fn set_default_prim(&self, stage: &mut Stage, root: &SdfPath, ctx: &JobContext) {
        let requested = &self.params.default_prim_path;
        if !requested.is_empty() {
            let path = SdfPath::new(requested);
            if path.depth() == 1 && stage.prim_at_path(&path).is_some() {
                stage.set_default_prim(path.name());
                return;
            }
            ctx.report(
                ReportLevel::Warning,
                format!("Default prim {} is not a root prim of the export, ignoring", requested),
            );
        }

        let fallback = if root.is_root() {
            stage.root_prims().first().map(|&id| stage.prim(id).name.clone())
        } else {
            root.ancestors()
                .chain(std::iter::once(root.clone()))
                .find(|p| p.depth() == 1)
                .map(|p| p.name().to_string())
        };
        match fallback {
            Some(name) => {
                ctx.report(ReportLevel::Info, format!("Default prim set to /{}", name));
                stage.set_default_prim(&name);
            }
            None => debug!("Nothing exported, no default prim"),
        }
    }

    fn remove_output(&mut self) {
        if !self.created {
            return;
        }
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed partial export {}", self.path.display()),
            Err(e) => warn!("Could not remove {}: {}", self.path.display(), e),
        }
        self.created = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use usdio_core::scene::{Camera, Light, LightType, ObjectData, ObjectId};
    use usdio_math::{Mat4, Vec3};

    fn add(scene: &mut Scene, name: &str, data: ObjectData) -> ObjectId {
        let id = scene.add_object_only(name, data);
        scene.link_object(scene.master_collection(), id);
        id
    }

    fn lit_scene() -> Scene {
        let mut scene = Scene::default();
        let mut spot = Light::new(LightType::Spot);
        spot.spotsize = 60f32.to_radians();
        add(&mut scene, "Lamp", ObjectData::Light(spot));
        add(&mut scene, "Cam", ObjectData::Camera(Camera::default()));
        scene
    }

    #[test]
    fn test_usd_extension() {
        assert_eq!(with_usd_extension(Path::new("out")), PathBuf::from("out.usd"));
        assert_eq!(with_usd_extension(Path::new("out.v2")), PathBuf::from("out.v2.usd"));
        assert_eq!(with_usd_extension(Path::new("out.USDA")), PathBuf::from("out.USDA"));
    }

    #[test]
    fn test_export_frames() {
        let params = ExportParams {
            frame_start: 1,
            frame_end: 3,
            frame_step: 0.5,
            ..Default::default()
        };
        assert_eq!(export_frames(&params), vec![1.0, 1.5, 2.0, 2.5, 3.0]);
    }

    #[test]
    fn test_export_scene() {
        let dir = tempfile::tempdir().unwrap();
        let mut scene = lit_scene();
        let outcome = export_usd(&mut scene, dir.path().join("shot"), &ExportParams::default());
        assert_eq!(outcome.state, JobState::Finished);

        let path = dir.path().join("shot.usd");
        let stage = Stage::open(&path).unwrap();
        assert_eq!(stage.metadata.up_axis.as_deref(), Some("Z"));
        assert_eq!(stage.metadata.meters_per_unit, Some(1.0));
        assert_eq!(stage.metadata.default_prim.as_deref(), Some("Cam"));

        let lamp = stage.get_prim(&SdfPath::new("/Lamp/Lamp")).unwrap();
        assert_eq!(lamp.type_name, "SphereLight");
        let angle = lamp
            .get("inputs:shaping:cone:angle", TimeCode::Default)
            .and_then(|v| v.as_f32())
            .unwrap();
        assert!((angle - 30.0).abs() < 1e-4);
        assert_eq!(stage.get_prim(&SdfPath::new("/Cam/Cam")).unwrap().type_name, "Camera");
        assert!(!scene.interface_locked);
    }

    #[test]
    fn test_root_prim_and_default_prim() {
        let dir = tempfile::tempdir().unwrap();
        let mut scene = lit_scene();
        let params = ExportParams {
            root_prim_path: "/World".to_string(),
            default_prim_path: "/Missing/Deep".to_string(),
            ..Default::default()
        };
        let path = dir.path().join("shot.usda");
        let outcome = export_usd(&mut scene, &path, &params);
        assert!(outcome.success);
        assert!(outcome
            .reports
            .iter()
            .any(|r| r.level == ReportLevel::Warning && r.message.contains("/Missing/Deep")));

        let stage = Stage::open(&path).unwrap();
        assert_eq!(stage.get_prim(&SdfPath::new("/World")).unwrap().type_name, "Xform");
        assert!(stage.get_prim(&SdfPath::new("/World/Lamp/Lamp")).is_some());
        assert_eq!(stage.metadata.default_prim.as_deref(), Some("World"));
    }

    #[test]
    fn test_usdc_is_plugin_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut scene = lit_scene();
        let path = dir.path().join("shot.usdc");
        let outcome = export_usd(&mut scene, &path, &ExportParams::default());
        assert_eq!(outcome.state, JobState::Failed);
        assert!(matches!(outcome.error, Some(IoError::PluginNotFound(_))));
        assert!(!path.exists());
    }

    #[test]
    fn test_animated_export() {
        let dir = tempfile::tempdir().unwrap();
        let mut scene = lit_scene();
        scene.frame_current = 7.0;
        let lamp = scene.find_object("Lamp").unwrap();
        let object = scene.object_mut(lamp).unwrap();
        object.insert_keyframe(1.0, Mat4::IDENTITY);
        object.insert_keyframe(3.0, Mat4::from_translation(Vec3::new(2.0, 0.0, 0.0)));

        let params = ExportParams {
            export_animation: true,
            frame_start: 1,
            frame_end: 3,
            ..Default::default()
        };
        let path = dir.path().join("anim.usda");
        let outcome = export_usd(&mut scene, &path, &params);
        assert!(outcome.success);
        assert_eq!(scene.frame_current, 7.0);

        let stage = Stage::open(&path).unwrap();
        assert_eq!(stage.start_time_code(), Some(1.0));
        assert_eq!(stage.end_time_code(), Some(3.0));
        let xform = stage.get_prim(&SdfPath::new("/Lamp")).unwrap();
        let op = xform.attribute("xformOp:transform").unwrap();
        assert_eq!(op.time_sample_times(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_cancel_removes_output() {
        let dir = tempfile::tempdir().unwrap();
        let mut scene = lit_scene();
        scene.frame_current = 4.0;
        let params = ExportParams {
            export_animation: true,
            frame_start: 1,
            frame_end: 10,
            ..Default::default()
        };
        let ctx = JobContext::with_update(|ctx, _| ctx.cancel());
        let path = dir.path().join("anim.usda");

        let outcome = export_usd_with(&mut scene, &path, &params, &ctx);
        assert_eq!(outcome.state, JobState::Canceled);
        assert!(!path.exists());
        assert_eq!(scene.frame_current, 4.0);
        assert!(!scene.interface_locked);
    }

    #[test]
    fn test_background_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bg.usda");
        let handle = spawn_export(lit_scene(), &path, ExportParams::default()).unwrap();
        let (_, outcome) = handle.wait().unwrap();
        assert!(outcome.success);
        assert!(path.exists());
    }
}
