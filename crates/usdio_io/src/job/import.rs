use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use log::{debug, info};
use usdio_core::scene::{CacheFile, CollectionId, Recalc, Scene, World};
use usdio_core::usd::{SdfPath, TimeCode};

use super::{JobContext, JobHandle, JobOutcome, JobState, ReportLevel};
use crate::error::{IoError, IoResult};
use crate::light_convert::dome_light_to_world;
use crate::params::ImportParams;
use crate::reader::{ReaderId, StageReader};

/// Import the stage at `path` into `scene` on the calling thread.
pub fn import_usd(scene: &mut Scene, path: impl AsRef<Path>, params: &ImportParams) -> JobOutcome {
    import_usd_with(scene, path.as_ref(), params, &JobContext::new())
}

/// Import with a caller-provided context for progress and cancellation.
pub fn import_usd_with(scene: &mut Scene, path: &Path, params: &ImportParams, ctx: &JobContext) -> JobOutcome {
    let mut job = ImportJob {
        path: path.to_path_buf(),
        params: params.clone(),
        reader: None,
        import_collection: None,
        restore: SceneState::capture(scene),
    };

    ctx.set_state(JobState::Running);
    scene.interface_locked = true;
    let started = Instant::now();
    let result = job.run(scene, ctx);
    if result.is_err() {
        job.rollback(scene);
    }
    scene.interface_locked = false;
    scene.relations_dirty = true;

    match &result {
        Ok(()) => info!("USD import of {} took {:.2?}", path.display(), started.elapsed()),
        Err(IoError::CancellationRequested) => ctx.report(ReportLevel::Info, "USD import canceled"),
        Err(_) => {}
    }
    JobOutcome::finish(ctx, result)
}

/// Run an import on a worker thread. The scene comes back with the outcome.
pub fn spawn_import(
    scene: Scene,
    path: impl Into<PathBuf>,
    params: ImportParams,
) -> IoResult<JobHandle<(Scene, JobOutcome)>> {
    let path = path.into();
    JobHandle::spawn("usd-import", Arc::new(JobContext::new()), move |ctx| {
        let mut scene = scene;
        let outcome = import_usd_with(&mut scene, &path, &params, &ctx);
        (scene, outcome)
    })
}

/// Per-run state. Dropped when the job ends, whatever the outcome.
struct ImportJob {
    path: PathBuf,
    params: ImportParams,
    reader: Option<StageReader>,
    import_collection: Option<CollectionId>,
    restore: SceneState,
}

/// Scene settings an import may overwrite, taken before it starts.
struct SceneState {
    world: Option<World>,
    world_recalc: bool,
    frame_start: i32,
    frame_end: i32,
    fps: f64,
    material_count: usize,
    cache_file_count: usize,
}

impl SceneState {
    fn capture(scene: &Scene) -> Self {
        Self {
            world: scene.world.clone(),
            world_recalc: scene.world_recalc,
            frame_start: scene.frame_start,
            frame_end: scene.frame_end,
            fps: scene.fps,
            material_count: scene.material_count(),
            cache_file_count: scene.cache_file_count(),
        }
    }

    fn restore(&self, scene: &mut Scene) {
        scene.world = self.world.clone();
        scene.world_recalc = self.world_recalc;
        scene.frame_start = self.frame_start;
        scene.frame_end = self.frame_end;
        scene.fps = self.fps;
        scene.truncate_data(self.material_count, self.cache_file_count);
    }
}

fn check_canceled(ctx: &JobContext) -> IoResult<()> {
    if ctx.is_canceled() {
        Err(IoError::CancellationRequested)
    } else {
        Ok(())
    }
}

impl ImportJob {
    fn run(&mut self, scene: &mut Scene, ctx: &JobContext) -> IoResult<()> {
        ctx.set_progress(0.05);
        check_canceled(ctx)?;

        let mut reader = match StageReader::open(&self.path, self.params.clone()) {
            Ok(reader) => reader,
            Err(e) => {
                ctx.report(
                    ReportLevel::Error,
                    format!("USD Import: unable to open stage to read {}", self.path.display()),
                );
                return Err(e);
            }
        };
        ctx.set_progress(0.1);

        if self.params.create_collection {
            let name = self
                .path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "USD".to_string());
            let collection = scene.add_collection(&name, scene.active_collection());
            scene.set_active_collection(collection);
            self.import_collection = Some(collection);
        }

        let mut cache_file = CacheFile::new(&self.path);
        cache_file.is_sequence = self.params.is_sequence;
        cache_file.scale = reader.settings().scale;
        cache_file.frame_offset = self.params.offset;
        reader.settings_mut().cache_file = Some(scene.add_cache_file(cache_file));

        if self.params.set_frame_range {
            let stage = reader.stage();
            if let Some(start) = stage.start_time_code() {
                scene.frame_start = start.round() as i32;
            }
            if let Some(end) = stage.end_time_code() {
                scene.frame_end = end.round() as i32;
            }
            if let Some(fps) = stage.metadata.time_codes_per_second {
                scene.fps = fps;
            }
        }

        reader.collect_readers(scene);
        // Objects exist from here on; rollback must see the reader.
        let reader = self.reader.insert(reader);
        ctx.set_progress(0.15);
        check_canceled(ctx)?;

        if self.params.import_lights && self.params.create_background_shader {
            if let Some(&dome) = reader.dome_lights().first() {
                let time = TimeCode::Time(reader.settings().read_time);
                scene.world = Some(dome_light_to_world(reader.stage().prim(dome), &self.params, time));
                scene.world_recalc = true;
            }
        }
        ctx.set_progress(0.2);

        // Prototypes first so instances can find their collections.
        let ids: Vec<ReaderId> = reader
            .proto_readers()
            .values()
            .flatten()
            .chain(reader.readers())
            .copied()
            .collect();
        let time = reader.settings().read_time;
        let total = ids.len().max(1) as f32;
        for (i, id) in ids.into_iter().enumerate() {
            check_canceled(ctx)?;
            reader.read_reader(id, scene, time);
            ctx.set_progress(0.2 + 0.8 * (i + 1) as f32 / total);
        }
        check_canceled(ctx)?;

        self.finalize(scene, ctx);
        Ok(())
    }

    /// Parent, link and select the imported objects.
    fn finalize(&self, scene: &mut Scene, ctx: &JobContext) {
        let Some(reader) = &self.reader else {
            return;
        };
        scene.deselect_all();
        reader.resolve_parents(scene);

        let destination = scene.active_collection();

        let mut proto_collections: HashMap<SdfPath, CollectionId> = HashMap::new();
        if !reader.proto_readers().is_empty() {
            let parent = scene.add_collection("prototypes", destination);
            if let Some(c) = scene.collection_mut(parent) {
                c.hidden = true;
            }
            for (path, ids) in reader.proto_readers() {
                let collection = scene.add_collection(path.as_str(), parent);
                for object in ids.iter().filter_map(|id| reader.reader(*id)?.object()) {
                    scene.link_object(collection, object);
                }
                proto_collections.insert(path.clone(), collection);
            }
        }

        let all = reader.readers().iter().chain(reader.proto_readers().values().flatten());
        for instance in all.filter_map(|id| reader.reader(*id)?.as_instance()) {
            instance.set_instance_collections(scene, |path| proto_collections.get(path).copied());
        }

        let mut first = None;
        for object in reader.readers().iter().filter_map(|id| reader.reader(*id)?.object()) {
            scene.link_object(destination, object);
            if let Some(o) = scene.object_mut(object) {
                o.selected = true;
                o.recalc.insert(Recalc::ALL);
            }
            first.get_or_insert(object);
        }
        if first.is_some() {
            scene.set_active_object(first);
        }
        scene.relations_dirty = true;

        let count = reader.readers().len() + reader.proto_readers().values().map(Vec::len).sum::<usize>();
        ctx.report(
            ReportLevel::Info,
            format!("Imported {} objects from {}", count, self.path.display()),
        );
    }

    /// Undo everything a failed or canceled import created.
    fn rollback(&mut self, scene: &mut Scene) {
        if let Some(reader) = self.reader.as_mut() {
            reader.free_objects(scene);
        }
        if let Some(collection) = self.import_collection.take() {
            scene.remove_collection(collection);
        }
        self.restore.restore(scene);
        debug!("Rolled back import of {}", self.path.display());
    }
}
