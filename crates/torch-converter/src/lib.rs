//! Orchestrates ROM to O2R conversions: stages a ROM and a bundled preset in a
//! private working directory, runs the external converter on a background
//! thread and exports the artifact to the user's chosen folder.

pub mod bridge;
pub mod bundle;
pub mod command;
pub mod documents;
pub mod error;
pub mod export;
pub mod handle;
pub mod preset;
pub mod readiness;
pub mod runner;
pub mod settings;
pub mod stager;
pub mod workflow;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

pub use bridge::{Toast, ToastDuration, TorchAnimation, UiQueue, ViewState};
pub use bundle::{AssetBundle, DirBundle, MemoryBundle};
pub use command::CommandConverter;
pub use documents::LocalDocuments;
pub use error::{ExportError, Failure, HandleError, RomError, RunnerBusy, SettingsError, StagingError};
pub use export::{ExportSink, FinalLocation};
pub use handle::{Capabilities, DocumentProvider, HandleScheme, Location, ResourceHandle};
pub use preset::Preset;
pub use readiness::Readiness;
pub use runner::{ConversionJob, Converter, JobStatus, ProgressSink, TaskRunner};
pub use settings::{ConverterCommand, Settings};
pub use stager::Stager;
pub use workflow::{DocumentPicker, Workflow};

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_level` applies. Calling this
/// twice is harmless.
pub fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Builds a workflow over local folders from `settings`, using `converter`.
///
/// The returned controller is bound to the calling thread.
pub fn local_workflow(
    settings: &Settings,
    converter: Arc<dyn Converter>,
    waker: Option<Arc<dyn Fn() + Send + Sync>>,
) -> Workflow<DirBundle> {
    let stager = Stager::new(&settings.work_dir, DirBundle::new(&settings.assets_dir));
    let runner = TaskRunner::new(converter).with_step_delay(settings.step_delay());
    let mut workflow = Workflow::with_waker(stager, Arc::new(LocalDocuments::new()), runner, waker);
    workflow.select_preset(settings.preset);
    workflow
}
