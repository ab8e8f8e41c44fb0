use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::error::ExportError;
use crate::handle::{self, DocumentProvider, ResourceHandle, OCTET_STREAM_MIME};
use crate::stager::copy_stream;

/// Where an exported artifact ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalLocation {
    /// The artifact stayed where the converter wrote it.
    AppDirectory(PathBuf),
    /// A copy was written into the user's destination.
    Destination { display: String, name: String },
}

impl FinalLocation {
    pub fn describe(&self) -> String {
        match self {
            FinalLocation::AppDirectory(_) => "app directory".to_string(),
            FinalLocation::Destination { display, .. } => display.clone(),
        }
    }
}

/// Copies a finished artifact to the user's chosen destination, if any.
///
/// The converter always writes into the working directory; exporting is a copy
/// made afterwards, so the local file survives a failed export.
#[derive(Debug, Clone, Default)]
pub struct ExportSink {
    destination: Option<Arc<ResourceHandle>>,
}

impl ExportSink {
    pub fn app_directory() -> Self {
        Self::default()
    }

    pub fn to_destination(destination: Arc<ResourceHandle>) -> Self {
        Self {
            destination: Some(destination),
        }
    }

    pub fn destination(&self) -> Option<&ResourceHandle> {
        self.destination.as_deref()
    }

    pub fn export(
        &self,
        docs: &dyn DocumentProvider,
        source: &Path,
        name: &str,
    ) -> Result<FinalLocation, ExportError> {
        let Some(destination) = self.destination.as_deref() else {
            return Ok(FinalLocation::AppDirectory(source.to_path_buf()));
        };

        let mut input = File::open(source).map_err(ExportError::CopyFailed)?;
        let mut output = handle::open_write_child(docs, destination, name, OCTET_STREAM_MIME)?;
        let bytes = copy_stream(&mut input, &mut output).map_err(ExportError::CopyFailed)?;

        let rendered = handle::render_destination(destination);
        info!(file = name, destination = %rendered, bytes, "copied output to selected directory");
        Ok(FinalLocation::Destination {
            display: rendered,
            name: name.to_string(),
        })
    }
}
