use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::Path;

use tracing::debug;

use crate::handle::{
    Capabilities, ChildEntry, DocumentProvider, HandleScheme, Location, ResourceHandle,
    DIRECTORY_MIME,
};

/// Document provider backed by the local filesystem.
///
/// Desktop hosts hand out plain paths from their file dialogs, so every grant
/// is implicit and only [`Location::LocalPath`] handles are understood.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalDocuments;

impl LocalDocuments {
    pub fn new() -> Self {
        Self
    }
}

fn local_path(handle: &ResourceHandle) -> io::Result<&Path> {
    match handle.location() {
        Location::LocalPath(path) => Ok(path.as_path()),
        Location::Document(id) => Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("{id} is not reachable through the local filesystem"),
        )),
    }
}

impl DocumentProvider for LocalDocuments {
    fn query_display_name(&self, handle: &ResourceHandle) -> Option<String> {
        let path = local_path(handle).ok()?;
        path.file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
    }

    fn open_input(&self, handle: &ResourceHandle) -> io::Result<Box<dyn Read + Send>> {
        let file = File::open(local_path(handle)?)?;
        Ok(Box::new(file))
    }

    fn open_output(&self, handle: &ResourceHandle) -> io::Result<Box<dyn Write + Send>> {
        let file = File::create(local_path(handle)?)?;
        Ok(Box::new(file))
    }

    fn can_write(&self, tree: &ResourceHandle) -> bool {
        let Ok(path) = local_path(tree) else {
            return false;
        };
        fs::metadata(path)
            .map(|metadata| metadata.is_dir() && !metadata.permissions().readonly())
            .unwrap_or(false)
    }

    fn find_child(&self, tree: &ResourceHandle, name: &str) -> io::Result<Option<ResourceHandle>> {
        let candidate = local_path(tree)?.join(name);
        match fs::metadata(&candidate) {
            Ok(metadata) if metadata.is_dir() => Ok(Some(ResourceHandle::tree_write(
                Location::LocalPath(candidate),
            ))),
            Ok(metadata) => Ok(Some(
                ResourceHandle::file_write(Location::LocalPath(candidate))
                    .with_size(metadata.len()),
            )),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn delete(&self, handle: &ResourceHandle) -> io::Result<bool> {
        let path = local_path(handle)?;
        let result = if path.is_dir() {
            fs::remove_dir_all(path)
        } else {
            fs::remove_file(path)
        };
        match result {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::PermissionDenied => {
                debug!(path = %path.display(), "delete refused");
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    fn create_child(
        &self,
        tree: &ResourceHandle,
        mime: &str,
        name: &str,
    ) -> io::Result<Option<ResourceHandle>> {
        let path = local_path(tree)?.join(name);
        if mime == DIRECTORY_MIME {
            fs::create_dir_all(&path)?;
            return Ok(Some(ResourceHandle::tree_write(Location::LocalPath(path))));
        }
        File::create(&path)?;
        Ok(Some(ResourceHandle::file_write(Location::LocalPath(path))))
    }

    fn children(&self, tree: &ResourceHandle) -> io::Result<Vec<ChildEntry>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(local_path(tree)?)? {
            let entry = entry?;
            let Ok(name) = entry.file_name().into_string() else {
                debug!(path = %entry.path().display(), "skipping entry with non UTF-8 name");
                continue;
            };
            let is_dir = entry.file_type()?.is_dir();
            let handle = if is_dir {
                ResourceHandle::tree_write(Location::LocalPath(entry.path()))
            } else {
                ResourceHandle::new(
                    Location::LocalPath(entry.path()),
                    HandleScheme::FileRead,
                    Capabilities::READ,
                )
            };
            entries.push(ChildEntry {
                name,
                is_dir,
                mime: is_dir.then(|| DIRECTORY_MIME.to_string()),
                handle,
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }
}
