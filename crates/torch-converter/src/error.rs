use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::preset::Preset;

/// Failures of the mediated document interface.
#[derive(Debug, Error)]
pub enum HandleError {
    #[error("handle is not readable")]
    NotReadable,
    #[error("handle is not writable")]
    NotWritable,
    #[error("handle does not refer to a document tree")]
    NotATree,
    #[error("failed to create {name}")]
    CreateFailed { name: String },
    #[error("{name} already exists and could not be deleted")]
    AlreadyExistsAndUndeletable { name: String },
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum RomError {
    #[error("unsupported ROM format: {name}")]
    UnsupportedRomFormat { name: String },
    #[error("failed to import ROM")]
    RomImportFailed(#[source] HandleError),
}

impl RomError {
    pub fn user_message(&self) -> String {
        match self {
            RomError::UnsupportedRomFormat { .. } => {
                format!(
                    "Error: Only {} format ROMs are supported",
                    crate::stager::ROM_SUFFIX
                )
            }
            RomError::RomImportFailed(_) => "Error reading ROM file".to_string(),
        }
    }
}

impl From<io::Error> for RomError {
    fn from(err: io::Error) -> Self {
        RomError::RomImportFailed(HandleError::Io(err))
    }
}

impl From<HandleError> for RomError {
    fn from(err: HandleError) -> Self {
        RomError::RomImportFailed(err)
    }
}

#[derive(Debug, Error)]
pub enum StagingError {
    #[error("no bundled assets found for preset {0}")]
    PresetNotFound(Preset),
    #[error("failed to stage {}", path.display())]
    StagingFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read the selected config folder")]
    TreeImportFailed(#[source] HandleError),
}

impl StagingError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        StagingError::StagingFailed {
            path: path.into(),
            source,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            StagingError::PresetNotFound(preset) => {
                format!("Bundled config for {} is missing", preset.label())
            }
            StagingError::StagingFailed { .. } => "Error loading bundled config".to_string(),
            StagingError::TreeImportFailed(_) => "Error reading the selected config folder".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("cannot write to selected directory")]
    NotWritable,
    #[error("failed to create {name} in selected directory")]
    CreateFailed { name: String },
    #[error("failed to copy file: {0}")]
    CopyFailed(#[source] io::Error),
}

impl From<HandleError> for ExportError {
    fn from(err: HandleError) -> Self {
        match err {
            HandleError::NotWritable | HandleError::NotATree => ExportError::NotWritable,
            HandleError::CreateFailed { name }
            | HandleError::AlreadyExistsAndUndeletable { name } => {
                ExportError::CreateFailed { name }
            }
            HandleError::NotReadable => {
                ExportError::CopyFailed(io::Error::other("source is not readable"))
            }
            HandleError::Io(err) => ExportError::CopyFailed(err),
        }
    }
}

/// Terminal failure of a conversion job.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Failure {
    #[error("conversion failed: {0:?}")]
    ConversionFailed(String),
    #[error("conversion reported success but the output is missing or empty")]
    OutputMissing,
    #[error("unexpected conversion error: {0}")]
    Unexpected(String),
}

impl Failure {
    pub fn user_message(&self) -> String {
        match self {
            Failure::ConversionFailed(reason) if reason.is_empty() => {
                "Conversion failed: Unknown error".to_string()
            }
            Failure::ConversionFailed(reason) => format!("Conversion failed: {reason}"),
            Failure::OutputMissing => {
                "Conversion reported success but no output file found".to_string()
            }
            Failure::Unexpected(message) => format!("Conversion failed: {message}"),
        }
    }
}

#[derive(Debug, Error)]
#[error("a conversion is already running")]
pub struct RunnerBusy;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid settings in {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
