//! Single-slot background execution of the external converter.

use std::any::Any;
use std::fmt;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{error, info, warn};

use crate::error::{Failure, RunnerBusy};
use crate::preset::Preset;
use crate::stager::{ASSETS_DIR_NAME, CONFIG_FILE_NAME};

/// Exact status string the converter returns on success.
pub const STATUS_SUCCESS: &str = "success";

pub const STEP_INITIALIZING: &str = "Initializing Torch...";
pub const STEP_READING_ROM: &str = "Reading ROM file...";
pub const STEP_LOADING_CONFIG: &str = "Loading configuration...";
pub const STEP_PROCESSING: &str = "Processing assets...";

pub const DEFAULT_STEP_DELAY: Duration = Duration::from_millis(500);

/// Progress channel handed to the converter.
///
/// Cloneable and callable from any thread; ordering is preserved per calling
/// thread.
#[derive(Clone)]
pub struct ProgressSink {
    callback: Arc<dyn Fn(&str) + Send + Sync>,
}

impl ProgressSink {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(callback),
        }
    }

    pub fn discard() -> Self {
        Self::new(|_| {})
    }

    pub fn update_progress(&self, message: &str) {
        (self.callback)(message);
    }
}

impl fmt::Debug for ProgressSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressSink").finish_non_exhaustive()
    }
}

/// The externally supplied conversion routine.
///
/// Returns [`STATUS_SUCCESS`] on success; any other string is the failure
/// reason.
pub trait Converter: Send + Sync {
    fn convert(&self, rom: &Path, output: &Path, config: &Path, progress: &ProgressSink) -> String;
}

impl<F> Converter for F
where
    F: Fn(&Path, &Path, &Path, &ProgressSink) -> String + Send + Sync,
{
    fn convert(&self, rom: &Path, output: &Path, config: &Path, progress: &ProgressSink) -> String {
        self(rom, output, config, progress)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionJob {
    rom_path: PathBuf,
    output_path: PathBuf,
    config_path: PathBuf,
    preset: Preset,
}

impl ConversionJob {
    pub fn new(
        rom_path: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
        config_path: impl Into<PathBuf>,
        preset: Preset,
    ) -> Self {
        Self {
            rom_path: rom_path.into(),
            output_path: output_path.into(),
            config_path: config_path.into(),
            preset,
        }
    }

    pub fn rom_path(&self) -> &Path {
        &self.rom_path
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn preset(&self) -> Preset {
        self.preset
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    InProgress(String),
    Success { output_path: PathBuf, bytes: u64 },
    Failure(Failure),
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::InProgress(_))
    }
}

/// Runs at most one [`ConversionJob`] at a time on a dedicated thread.
///
/// Callbacks run on the worker thread; callers that own UI state pass
/// callbacks that post back onto their UI thread.
pub struct TaskRunner {
    converter: Arc<dyn Converter>,
    step_delay: Duration,
    in_flight: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl TaskRunner {
    pub fn new(converter: Arc<dyn Converter>) -> Self {
        Self {
            converter,
            step_delay: DEFAULT_STEP_DELAY,
            in_flight: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
        }
    }

    pub fn with_step_delay(mut self, step_delay: Duration) -> Self {
        self.step_delay = step_delay;
        self
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Starts `job` in the background.
    ///
    /// `on_progress` sees every progress message in emission order and
    /// `on_complete` is invoked exactly once, last.
    pub fn submit<P, C>(&self, job: ConversionJob, on_progress: P, on_complete: C) -> Result<(), RunnerBusy>
    where
        P: Fn(String) + Send + Sync + 'static,
        C: FnOnce(JobStatus) + Send + 'static,
    {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!(preset = %job.preset(), "conversion already running; submit rejected");
            return Err(RunnerBusy);
        }

        let mut worker = self
            .worker
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        if let Some(previous) = worker.take() {
            let _ = previous.join();
        }

        let converter = Arc::clone(&self.converter);
        let in_flight = Arc::clone(&self.in_flight);
        let step_delay = self.step_delay;
        let progress = ProgressSink::new(move |message| on_progress(message.to_string()));

        *worker = Some(thread::spawn(move || {
            let status = panic::catch_unwind(AssertUnwindSafe(|| {
                execute(&job, converter.as_ref(), &progress, step_delay)
            }))
            .unwrap_or_else(|payload| {
                let message = panic_message(payload.as_ref());
                error!(%message, "conversion worker panicked");
                JobStatus::Failure(Failure::Unexpected(message))
            });

            if panic::catch_unwind(AssertUnwindSafe(|| on_complete(status))).is_err() {
                error!("completion callback panicked");
            }
            in_flight.store(false, Ordering::Release);
        }));

        Ok(())
    }

    /// Blocks until the current worker thread, if any, has exited.
    pub fn join(&self) {
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}

impl Drop for TaskRunner {
    fn drop(&mut self) {
        self.join();
    }
}

fn execute(
    job: &ConversionJob,
    converter: &dyn Converter,
    progress: &ProgressSink,
    step_delay: Duration,
) -> JobStatus {
    progress.update_progress(STEP_INITIALIZING);
    info!(
        rom = %job.rom_path().display(),
        output = %job.output_path().display(),
        config = %job.config_path().display(),
        preset = %job.preset(),
        "starting conversion"
    );

    progress.update_progress(STEP_READING_ROM);
    match fs::metadata(job.rom_path()) {
        Ok(metadata) if metadata.is_file() => {
            info!(bytes = metadata.len(), "ROM file present");
        }
        _ => {
            error!(rom = %job.rom_path().display(), "ROM file does not exist");
            return JobStatus::Failure(Failure::ConversionFailed("ROM file not found".to_string()));
        }
    }
    thread::sleep(step_delay);

    progress.update_progress(STEP_LOADING_CONFIG);
    if !job.config_path().join(CONFIG_FILE_NAME).is_file() {
        error!(config = %job.config_path().display(), "config.yml not found");
        return JobStatus::Failure(Failure::ConversionFailed(
            "config.yml not found in selected folder".to_string(),
        ));
    }
    if !job.config_path().join(ASSETS_DIR_NAME).is_dir() {
        error!(config = %job.config_path().display(), "assets directory not found");
        return JobStatus::Failure(Failure::ConversionFailed(
            "assets directory not found in selected folder".to_string(),
        ));
    }
    info!("found config.yml and assets directory");
    if let Some(parent) = job.output_path().parent() {
        if let Err(err) = fs::create_dir_all(parent) {
            error!(error = %err, "failed to create output directory");
            return JobStatus::Failure(Failure::ConversionFailed(err.to_string()));
        }
    }
    thread::sleep(step_delay);

    progress.update_progress(STEP_PROCESSING);
    info!("starting native conversion");
    let result = converter.convert(job.rom_path(), job.output_path(), job.config_path(), progress);
    info!(%result, "native conversion returned");

    if result != STATUS_SUCCESS {
        return JobStatus::Failure(Failure::ConversionFailed(result));
    }

    match fs::metadata(job.output_path()) {
        Ok(metadata) if metadata.is_file() && metadata.len() > 0 => {
            info!(
                output = %job.output_path().display(),
                bytes = metadata.len(),
                "output file confirmed"
            );
            JobStatus::Success {
                output_path: job.output_path().to_path_buf(),
                bytes: metadata.len(),
            }
        }
        _ => {
            error!(output = %job.output_path().display(), "no output file found");
            JobStatus::Failure(Failure::OutputMissing)
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "conversion worker panicked".to_string()
    }
}
