//! The controller behind every user-visible command.
//!
//! A [`Workflow`] lives on the UI thread. Commands mutate it directly; the
//! conversion worker reaches it only through the [`UiQueue`] it was created
//! with, and those posts are applied by [`Workflow::pump`] or
//! [`Workflow::wait_for_completion`].

use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::bridge::{
    ui_channel, ToastDuration, UiQueue, UiReceiver, ViewState, CONFIG_NOT_SELECTED,
};
use crate::bundle::AssetBundle;
use crate::error::{ExportError, Failure, RomError};
use crate::export::{ExportSink, FinalLocation};
use crate::handle::{self, DocumentProvider, ResourceHandle, OCTET_STREAM_MIME};
use crate::preset::Preset;
use crate::readiness::Readiness;
use crate::runner::{self, ConversionJob, JobStatus, TaskRunner};
use crate::stager::Stager;

const APP_DIRECTORY: &str = "app directory";

/// MIME filters offered when picking a ROM. Advisory only; the suffix check
/// decides.
pub const ROM_MIME_FILTERS: [&str; 2] = [OCTET_STREAM_MIME, "*/*"];

/// The host's document picker.
///
/// Both methods block until the user chooses or cancels.
pub trait DocumentPicker {
    fn pick_document(&self, mime_filters: &[&str]) -> Option<ResourceHandle>;

    fn pick_tree(&self) -> Option<ResourceHandle>;
}

struct JobOutcome {
    preset: Preset,
    status: JobStatus,
    export: Option<Result<FinalLocation, ExportError>>,
}

pub struct Workflow<B> {
    stager: Stager<B>,
    docs: Arc<dyn DocumentProvider>,
    runner: TaskRunner,
    preset: Preset,
    readiness: Readiness,
    rom: Option<Arc<ResourceHandle>>,
    output: Option<Arc<ResourceHandle>>,
    view: ViewState,
    last_status: Option<JobStatus>,
    queue: UiQueue<Self>,
    inbox: UiReceiver<Self>,
    generation: u64,
    active_job: Option<u64>,
}

impl<B: AssetBundle + 'static> Workflow<B> {
    /// Must be called on the thread that will drive the UI.
    pub fn new(stager: Stager<B>, docs: Arc<dyn DocumentProvider>, runner: TaskRunner) -> Self {
        Self::with_waker(stager, docs, runner, None)
    }

    /// Like [`Workflow::new`]; `waker` runs whenever the worker posts an
    /// update.
    pub fn with_waker(
        stager: Stager<B>,
        docs: Arc<dyn DocumentProvider>,
        runner: TaskRunner,
        waker: Option<Arc<dyn Fn() + Send + Sync>>,
    ) -> Self {
        let (queue, inbox) = ui_channel(waker);
        Self {
            stager,
            docs,
            runner,
            preset: Preset::default(),
            readiness: Readiness::default(),
            rom: None,
            output: None,
            view: ViewState::default(),
            last_status: None,
            queue,
            inbox,
            generation: 0,
            active_job: None,
        }
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut ViewState {
        &mut self.view
    }

    pub fn readiness(&self) -> Readiness {
        self.readiness
    }

    pub fn preset(&self) -> Preset {
        self.preset
    }

    pub fn stager(&self) -> &Stager<B> {
        &self.stager
    }

    pub fn rom(&self) -> Option<&ResourceHandle> {
        self.rom.as_deref()
    }

    pub fn output(&self) -> Option<&ResourceHandle> {
        self.output.as_deref()
    }

    /// Terminal status of the most recent conversion.
    pub fn last_status(&self) -> Option<&JobStatus> {
        self.last_status.as_ref()
    }

    pub fn pick_rom(&mut self, picker: &dyn DocumentPicker) {
        match picker.pick_document(&ROM_MIME_FILTERS) {
            Some(rom) => self.accept_rom(rom),
            None => debug!("ROM selection cancelled"),
        }
    }

    pub fn accept_rom(&mut self, rom: ResourceHandle) {
        if self.readiness.job_in_flight() {
            warn!("refusing to replace the ROM while a conversion is running");
            return;
        }
        let rom = Arc::new(rom);
        match self.stager.import_rom(self.docs.as_ref(), &rom) {
            Ok(path) => {
                let name = handle::display_name(self.docs.as_ref(), &rom);
                info!(rom = %name, path = %path.display(), "ROM staged");
                self.view.rom_status = format!("ROM: {name}");
                self.readiness.rom_imported();
                self.rom = Some(rom);
            }
            Err(err @ RomError::UnsupportedRomFormat { .. }) => {
                warn!(error = %err, "rejected ROM");
                self.view.rom_status = err.user_message();
                self.view.toast(
                    format!(
                        "Please select a .z64 format {} ROM",
                        self.preset.game_title()
                    ),
                    ToastDuration::Long,
                );
            }
            Err(err) => {
                error!(error = %err, "error handling selected ROM");
                self.view.toast(err.user_message(), ToastDuration::Short);
                self.readiness.rom_import_failed();
            }
        }
        self.view.sync_readiness(&self.readiness);
    }

    /// Selects `preset` without staging it; Load Config stages it later.
    pub fn select_preset(&mut self, preset: Preset) {
        if preset == self.preset {
            return;
        }
        info!(preset = %preset, label = preset.label(), "selected configuration");
        self.preset = preset;
        self.readiness.preset_changed();
        self.view.config_status = CONFIG_NOT_SELECTED.to_string();
        self.view.sync_readiness(&self.readiness);
    }

    /// Selects `preset` and stages its bundled config right away.
    pub fn choose_preset(&mut self, preset: Preset) {
        self.select_preset(preset);
        self.stage_config();
    }

    /// Materialises the selected preset into the working directory.
    pub fn stage_config(&mut self) -> bool {
        if self.readiness.job_in_flight() {
            warn!("refusing to restage config while a conversion is running");
            return false;
        }
        let staged = match self.stager.stage_preset(self.preset) {
            Ok(_) => {
                self.view.config_status = format!("Config: {} assets loaded", self.preset.label());
                self.readiness.config_staged_ok();
                true
            }
            Err(err) => {
                error!(error = %err, preset = %self.preset, "error loading bundled config");
                self.view.config_status = CONFIG_NOT_SELECTED.to_string();
                self.view.toast(err.user_message(), ToastDuration::Short);
                self.readiness.config_lost();
                false
            }
        };
        self.view.sync_readiness(&self.readiness);
        staged
    }

    pub fn pick_config_tree(&mut self, picker: &dyn DocumentPicker) {
        match picker.pick_tree() {
            Some(tree) => {
                self.accept_config_tree(tree);
            }
            None => debug!("config folder selection cancelled"),
        }
    }

    /// Stages a user-chosen config folder in place of the bundled preset.
    pub fn accept_config_tree(&mut self, tree: ResourceHandle) -> bool {
        if self.readiness.job_in_flight() {
            warn!("refusing to restage config while a conversion is running");
            return false;
        }
        let staged = match self.stager.import_config_tree(self.docs.as_ref(), &tree) {
            Ok(_) => {
                let name = handle::display_name(self.docs.as_ref(), &tree);
                self.view.config_status = format!("Config: {name} loaded");
                self.readiness.config_staged_ok();
                true
            }
            Err(err) => {
                error!(error = %err, tree = %tree, "error importing config folder");
                self.view.config_status = CONFIG_NOT_SELECTED.to_string();
                self.view.toast(err.user_message(), ToastDuration::Short);
                self.readiness.config_lost();
                false
            }
        };
        self.view.sync_readiness(&self.readiness);
        staged
    }

    pub fn pick_output(&mut self, picker: &dyn DocumentPicker) {
        match picker.pick_tree() {
            Some(tree) => self.accept_output(tree),
            None => debug!("output selection cancelled"),
        }
    }

    pub fn accept_output(&mut self, tree: ResourceHandle) {
        if !tree.is_tree() || !tree.capabilities().writable {
            error!(handle = %tree, "selected output is not a writable folder");
            self.view
                .toast("Error accessing selected directory", ToastDuration::Short);
            return;
        }
        let rendered = handle::render_destination(&tree);
        info!(destination = %rendered, handle = %tree, "output directory selected");
        self.view.output_status = format!("Output: {rendered}");
        self.readiness.output_accepted();
        self.output = Some(Arc::new(tree));
        self.view.sync_readiness(&self.readiness);
    }

    /// Starts a conversion with the staged inputs. Returns `false` when the
    /// request was refused.
    pub fn convert(&mut self) -> bool {
        if !self.readiness.rom_staged() {
            self.view.toast("Please select a ROM first", ToastDuration::Short);
            return false;
        }
        if !self.readiness.config_staged() {
            self.view
                .toast("Please select config directory first", ToastDuration::Short);
            return false;
        }
        if self.readiness.job_in_flight() {
            warn!("conversion already in flight");
            return false;
        }

        let job = ConversionJob::new(
            self.stager.rom_path(),
            self.stager.output_path(self.preset),
            self.stager.config_path(),
            self.preset,
        );
        let preset = self.preset;
        let sink = match &self.output {
            Some(destination) => ExportSink::to_destination(Arc::clone(destination)),
            None => ExportSink::app_directory(),
        };
        let docs = Arc::clone(&self.docs);

        self.generation += 1;
        let generation = self.generation;
        let progress_queue = self.queue.clone();
        let complete_queue = self.queue.clone();

        let submitted = self.runner.submit(
            job,
            move |message| {
                progress_queue.post(move |workflow: &mut Self| {
                    workflow.job_progress(generation, message)
                });
            },
            move |status| {
                let export = match &status {
                    JobStatus::Success { output_path, .. } => Some(guarded_export(
                        &sink,
                        docs.as_ref(),
                        output_path,
                        preset.output_file_name(),
                    )),
                    _ => None,
                };
                let outcome = JobOutcome {
                    preset,
                    status,
                    export,
                };
                complete_queue.post(move |workflow: &mut Self| {
                    workflow.job_complete(generation, outcome)
                });
            },
        );

        if let Err(err) = submitted {
            warn!(error = %err, "conversion not started");
            return false;
        }

        self.active_job = Some(generation);
        self.last_status = None;
        self.readiness.job_started();
        self.view.job_started();
        info!(preset = %self.preset, "conversion submitted");
        true
    }

    /// Applies everything the worker has posted so far.
    pub fn pump(&mut self) -> usize {
        let tasks = self.inbox.take_pending();
        let count = tasks.len();
        for task in tasks {
            task(self);
        }
        count
    }

    /// Applies worker posts until the running conversion finishes or
    /// `timeout` elapses. Returns whether no conversion is in flight anymore.
    pub fn wait_for_completion(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.readiness.job_in_flight() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            for task in self.inbox.wait_pending(remaining) {
                task(self);
            }
        }
        true
    }

    fn job_progress(&mut self, generation: u64, message: String) {
        if self.active_job != Some(generation) {
            debug!(%message, "dropping progress from a finished conversion");
            return;
        }
        self.view.job_progress(message);
    }

    fn job_complete(&mut self, generation: u64, outcome: JobOutcome) {
        if self.active_job != Some(generation) {
            warn!("ignoring completion of an unknown conversion");
            return;
        }
        self.active_job = None;
        // The worker only has to release its slot after posting.
        self.runner.join();
        self.readiness.job_finished();

        let status_line = match &outcome.status {
            JobStatus::Success { output_path, bytes } => {
                let (saved_to, toast) =
                    success_messages(outcome.preset, output_path, outcome.export);
                info!(output = %output_path.display(), bytes, "conversion complete");
                self.view.toast(toast, ToastDuration::Long);
                format!(
                    "Conversion complete! {} saved to {saved_to} ({} KB)",
                    outcome.preset.output_file_name(),
                    bytes / 1024
                )
            }
            JobStatus::Failure(failure) => {
                error!(error = %failure, "conversion failed");
                let toast = match failure {
                    Failure::OutputMissing => "No output file created",
                    _ => "Conversion failed",
                };
                self.view.toast(toast, ToastDuration::Short);
                failure.user_message()
            }
            JobStatus::InProgress(message) => {
                warn!(%message, "non-terminal status delivered as completion");
                Failure::Unexpected(message.clone()).user_message()
            }
        };

        self.view.job_finished(status_line, &self.readiness);
        self.last_status = Some(outcome.status);
    }
}

/// Runs the export on the worker; a panicking document provider counts as a
/// failed copy so the completion is still delivered.
fn guarded_export(
    sink: &ExportSink,
    docs: &dyn DocumentProvider,
    output_path: &Path,
    name: &str,
) -> Result<FinalLocation, ExportError> {
    panic::catch_unwind(AssertUnwindSafe(|| sink.export(docs, output_path, name)))
        .unwrap_or_else(|payload| {
            let message = runner::panic_message(payload.as_ref());
            error!(%message, "export panicked");
            Err(ExportError::CopyFailed(io::Error::other(message)))
        })
}

/// Where the status line says the artifact went, and the toast text.
fn success_messages(
    preset: Preset,
    output_path: &Path,
    export: Option<Result<FinalLocation, ExportError>>,
) -> (String, String) {
    let created = format!(
        "{} created successfully for {}!",
        preset.output_file_name(),
        preset.short_name()
    );
    match export {
        Some(Ok(FinalLocation::Destination { display, .. })) => {
            let toast = format!("{created}\nSaved to: {display}");
            (display, toast)
        }
        Some(Err(err)) => {
            error!(error = %err, "failed to copy to selected directory");
            (
                APP_DIRECTORY.to_string(),
                format!("{created}\nSaved to app directory (failed to copy to selected location)"),
            )
        }
        Some(Ok(FinalLocation::AppDirectory(_))) | None => {
            let parent = output_path
                .parent()
                .map(|parent| parent.display().to_string())
                .unwrap_or_default();
            (APP_DIRECTORY.to_string(), format!("{created}\nLocation: {parent}"))
        }
    }
}

impl<B> fmt::Debug for Workflow<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workflow")
            .field("preset", &self.preset)
            .field("readiness", &self.readiness)
            .field("output", &self.output)
            .finish_non_exhaustive()
    }
}
