use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;

use torch_converter::handle::{Location, ResourceHandle};
use torch_converter::DocumentPicker;
use tracing::error;

/// Native file dialogs. Desktop dialogs return plain paths, so every handle
/// is a [`Location::LocalPath`].
#[derive(Debug, Default, Clone, Copy)]
pub struct RfdPicker;

fn guarded(dialog: impl FnOnce() -> Option<PathBuf>) -> Option<PathBuf> {
    match panic::catch_unwind(AssertUnwindSafe(dialog)) {
        Ok(path) => path,
        Err(_) => {
            error!("native file dialog failed");
            None
        }
    }
}

impl DocumentPicker for RfdPicker {
    fn pick_document(&self, _mime_filters: &[&str]) -> Option<ResourceHandle> {
        let path = guarded(|| {
            rfd::FileDialog::new()
                .set_title("Select ROM")
                .add_filter("N64 ROM", &["z64", "Z64"])
                .add_filter("All files", &["*"])
                .pick_file()
        })?;
        let size = path.metadata().map(|metadata| metadata.len()).ok();
        let handle = ResourceHandle::file_read(Location::LocalPath(path));
        Some(match size {
            Some(size) => handle.with_size(size),
            None => handle,
        })
    }

    fn pick_tree(&self) -> Option<ResourceHandle> {
        let path = guarded(|| rfd::FileDialog::new().pick_folder())?;
        Some(ResourceHandle::tree_write(Location::LocalPath(path)))
    }
}
