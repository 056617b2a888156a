//! Import and export jobs.
//!
//! A job runs on the calling thread or on a named worker thread. Either way
//! it owns a [`JobContext`] that carries the stop flag, progress, reports and
//! state; the interactive side reads those through a [`JobHandle`].

mod export;
mod import;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{error, info, warn};
use parking_lot::Mutex;

use crate::error::{IoError, IoResult};

pub use export::{export_usd, export_usd_with, spawn_export};
pub use import::{import_usd, import_usd_with, spawn_import};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobState {
    Init,
    Running,
    Finished,
    Canceled,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Finished | JobState::Canceled | JobState::Failed)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReportLevel {
    Info,
    Warning,
    Error,
}

/// A user-facing message produced by a job.
#[derive(Clone, Debug, PartialEq)]
pub struct Report {
    pub level: ReportLevel,
    pub message: String,
}

type UpdateFn = Box<dyn Fn(&JobContext, f32) + Send + Sync>;

/// Job-scoped state shared between a job and whoever watches it.
pub struct JobContext {
    stop: AtomicBool,
    progress: Mutex<f32>,
    state: Mutex<JobState>,
    reports: Mutex<Vec<Report>>,
    on_update: Option<UpdateFn>,
}

impl Default for JobContext {
    fn default() -> Self {
        Self::new()
    }
}

impl JobContext {
    pub fn new() -> Self {
        Self {
            stop: AtomicBool::new(false),
            progress: Mutex::new(0.0),
            state: Mutex::new(JobState::Init),
            reports: Mutex::new(Vec::new()),
            on_update: None,
        }
    }

    /// Call `f` with every progress update.
    pub fn with_update(f: impl Fn(&JobContext, f32) + Send + Sync + 'static) -> Self {
        Self {
            on_update: Some(Box::new(f)),
            ..Self::new()
        }
    }

    /// Ask the job to stop at its next unit boundary.
    pub fn cancel(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn is_canceled(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    pub fn progress(&self) -> f32 {
        *self.progress.lock()
    }

    /// Raise progress to `value`; progress never goes back.
    pub fn set_progress(&self, value: f32) {
        let value = {
            let mut progress = self.progress.lock();
            *progress = progress.max(value.clamp(0.0, 1.0));
            *progress
        };
        if let Some(f) = &self.on_update {
            f(self, value);
        }
    }

    pub fn state(&self) -> JobState {
        *self.state.lock()
    }

    pub fn set_state(&self, state: JobState) {
        *self.state.lock() = state;
    }

    /// Record a report and echo it to the log.
    pub fn report(&self, level: ReportLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            ReportLevel::Info => info!("{}", message),
            ReportLevel::Warning => warn!("{}", message),
            ReportLevel::Error => error!("{}", message),
        }
        self.reports.lock().push(Report { level, message });
    }

    pub fn reports(&self) -> Vec<Report> {
        self.reports.lock().clone()
    }
}

/// Result of a finished job.
#[derive(Debug)]
pub struct JobOutcome {
    pub state: JobState,
    pub success: bool,
    pub reports: Vec<Report>,
    pub error: Option<IoError>,
}

impl JobOutcome {
    /// Close the job: record the terminal state and collect the reports.
    pub(crate) fn finish(ctx: &JobContext, result: IoResult<()>) -> Self {
        let (state, error) = match result {
            Ok(()) => (JobState::Finished, None),
            Err(IoError::CancellationRequested) => (JobState::Canceled, None),
            Err(e) => (JobState::Failed, Some(e)),
        };
        ctx.set_state(state);
        Self {
            state,
            success: state == JobState::Finished,
            reports: ctx.reports(),
            error,
        }
    }
}

/// Handle to a job running on a worker thread.
///
/// Dropping the handle cancels the job and waits for the thread.
pub struct JobHandle<T> {
    ctx: Arc<JobContext>,
    handle: Option<JoinHandle<T>>,
}

impl<T: Send + 'static> JobHandle<T> {
    pub(crate) fn spawn(
        name: &str,
        ctx: Arc<JobContext>,
        f: impl FnOnce(Arc<JobContext>) -> T + Send + 'static,
    ) -> IoResult<Self> {
        let worker_ctx = Arc::clone(&ctx);
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || f(worker_ctx))?;
        Ok(Self {
            ctx,
            handle: Some(handle),
        })
    }

    pub fn context(&self) -> &JobContext {
        &self.ctx
    }

    pub fn cancel(&self) {
        self.ctx.cancel();
    }

    pub fn progress(&self) -> f32 {
        self.ctx.progress()
    }

    pub fn state(&self) -> JobState {
        self.ctx.state()
    }

    pub fn reports(&self) -> Vec<Report> {
        self.ctx.reports()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Wait for the worker and take its result.
    pub fn wait(mut self) -> IoResult<T> {
        let handle = self.handle.take().ok_or(IoError::WorkerPanicked)?;
        handle.join().map_err(|_| IoError::WorkerPanicked)
    }
}

impl<T> Drop for JobHandle<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.ctx.cancel();
            let _ = handle.join();
        }
    }
}
