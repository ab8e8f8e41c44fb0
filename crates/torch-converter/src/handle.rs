//! Opaque references to files and folders chosen through the host's document
//! picker.
//!
//! A handle is either a plain [`Location::LocalPath`] or a
//! [`Location::Document`] identifier that can only be reached through a
//! [`DocumentProvider`]. Every operation in this module goes through the
//! provider so that callers never assume a handle is a filesystem path.

use std::borrow::Cow;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::{fmt, io};

use crate::error::HandleError;

/// MIME type the host reports for directories inside a document tree.
pub const DIRECTORY_MIME: &str = "vnd.android.document/directory";
pub const OCTET_STREAM_MIME: &str = "application/octet-stream";

const PRIMARY_STORAGE_PREFIX: &str = "primary:";
const DOCUMENTS_PREFIX: &str = "home:";
const UNKNOWN_DESTINATION: &str = "Selected Directory";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Location {
    LocalPath(PathBuf),
    Document(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleScheme {
    FileRead,
    FileWrite,
    TreeWrite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Capabilities {
    pub readable: bool,
    pub writable: bool,
    pub listable: bool,
}

impl Capabilities {
    pub const READ: Capabilities = Capabilities {
        readable: true,
        writable: false,
        listable: false,
    };
    pub const WRITE: Capabilities = Capabilities {
        readable: false,
        writable: true,
        listable: false,
    };
    pub const TREE: Capabilities = Capabilities {
        readable: true,
        writable: true,
        listable: true,
    };
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceHandle {
    location: Location,
    scheme: HandleScheme,
    capabilities: Capabilities,
    size: Option<u64>,
}

impl ResourceHandle {
    pub fn file_read(location: Location) -> Self {
        Self::new(location, HandleScheme::FileRead, Capabilities::READ)
    }

    pub fn file_write(location: Location) -> Self {
        Self::new(location, HandleScheme::FileWrite, Capabilities::WRITE)
    }

    pub fn tree_write(location: Location) -> Self {
        Self::new(location, HandleScheme::TreeWrite, Capabilities::TREE)
    }

    pub fn new(location: Location, scheme: HandleScheme, capabilities: Capabilities) -> Self {
        Self {
            location,
            scheme,
            capabilities,
            size: None,
        }
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn scheme(&self) -> HandleScheme {
        self.scheme
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn size(&self) -> Option<u64> {
        self.size
    }

    pub fn is_tree(&self) -> bool {
        self.scheme == HandleScheme::TreeWrite
    }

    /// The raw identifier: a path rendered as text, or the document id.
    pub fn identifier(&self) -> Cow<'_, str> {
        match &self.location {
            Location::LocalPath(path) => path.to_string_lossy(),
            Location::Document(id) => Cow::Borrowed(id),
        }
    }
}

impl fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identifier())
    }
}

/// One entry of a document tree listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildEntry {
    pub name: String,
    pub is_dir: bool,
    pub mime: Option<String>,
    pub handle: ResourceHandle,
}

impl ChildEntry {
    pub fn is_directory(&self) -> bool {
        self.is_dir || self.mime.as_deref() == Some(DIRECTORY_MIME)
    }
}

/// The host's mediated document interface.
///
/// Implementations decide how grants are resolved; the free functions of this
/// module enforce the capability checks before any of these are reached.
pub trait DocumentProvider: Send + Sync {
    /// Display name reported by the host for the originating file, if any.
    fn query_display_name(&self, handle: &ResourceHandle) -> Option<String>;

    fn open_input(&self, handle: &ResourceHandle) -> io::Result<Box<dyn Read + Send>>;

    fn open_output(&self, handle: &ResourceHandle) -> io::Result<Box<dyn Write + Send>>;

    fn can_write(&self, tree: &ResourceHandle) -> bool;

    fn find_child(&self, tree: &ResourceHandle, name: &str) -> io::Result<Option<ResourceHandle>>;

    /// Returns `false` when the host refused to delete the entry.
    fn delete(&self, handle: &ResourceHandle) -> io::Result<bool>;

    fn create_child(
        &self,
        tree: &ResourceHandle,
        mime: &str,
        name: &str,
    ) -> io::Result<Option<ResourceHandle>>;

    fn children(&self, tree: &ResourceHandle) -> io::Result<Vec<ChildEntry>>;
}

/// Name to show for a picked file.
///
/// Read handles ask the host first; otherwise the trailing segment of the
/// identifier is used.
pub fn display_name(docs: &dyn DocumentProvider, handle: &ResourceHandle) -> String {
    if handle.scheme() == HandleScheme::FileRead {
        if let Some(name) = docs.query_display_name(handle).filter(|name| !name.is_empty()) {
            return name;
        }
    }

    let identifier = decode_separators(&handle.identifier());
    let trimmed = identifier.trim_end_matches(['/', '\\']);
    trimmed
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(trimmed)
        .to_string()
}

pub fn open_read(
    docs: &dyn DocumentProvider,
    handle: &ResourceHandle,
) -> Result<Box<dyn Read + Send>, HandleError> {
    if !handle.capabilities().readable {
        return Err(HandleError::NotReadable);
    }
    Ok(docs.open_input(handle)?)
}

/// Creates (or replaces) `name` inside a tree write-handle and opens it for
/// writing.
pub fn open_write_child(
    docs: &dyn DocumentProvider,
    tree: &ResourceHandle,
    name: &str,
    mime: &str,
) -> Result<Box<dyn Write + Send>, HandleError> {
    if !tree.is_tree() {
        return Err(HandleError::NotATree);
    }
    if !tree.capabilities().writable || !docs.can_write(tree) {
        return Err(HandleError::NotWritable);
    }

    if let Some(existing) = docs.find_child(tree, name)? {
        if !docs.delete(&existing)? {
            return Err(HandleError::AlreadyExistsAndUndeletable {
                name: name.to_string(),
            });
        }
    }

    let child = docs
        .create_child(tree, mime, name)?
        .ok_or_else(|| HandleError::CreateFailed {
            name: name.to_string(),
        })?;
    Ok(docs.open_output(&child)?)
}

pub fn list_children(
    docs: &dyn DocumentProvider,
    tree: &ResourceHandle,
) -> Result<Vec<ChildEntry>, HandleError> {
    if !tree.is_tree() || !tree.capabilities().listable {
        return Err(HandleError::NotATree);
    }
    Ok(docs.children(tree)?)
}

/// User-facing rendering of an output destination.
pub fn render_destination(handle: &ResourceHandle) -> String {
    match handle.location() {
        Location::LocalPath(path) => path.display().to_string(),
        Location::Document(id) => render_document_id(id),
    }
}

fn render_document_id(id: &str) -> String {
    let decoded = decode_separators(id);
    if let Some(index) = decoded.rfind(PRIMARY_STORAGE_PREFIX) {
        let folder = &decoded[index + PRIMARY_STORAGE_PREFIX.len()..];
        format!("Internal Storage/{folder}")
    } else if let Some(index) = decoded.rfind(DOCUMENTS_PREFIX) {
        let folder = &decoded[index + DOCUMENTS_PREFIX.len()..];
        format!("Documents/{folder}")
    } else {
        UNKNOWN_DESTINATION.to_string()
    }
}

fn decode_separators(value: &str) -> String {
    let mut decoded = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(index) = rest.find('%') {
        decoded.push_str(&rest[..index]);
        let escape = rest.get(index + 1..index + 3).unwrap_or("");
        match escape.to_ascii_uppercase().as_str() {
            "2F" => {
                decoded.push('/');
                rest = &rest[index + 3..];
            }
            "3A" => {
                decoded.push(':');
                rest = &rest[index + 3..];
            }
            _ => {
                decoded.push('%');
                rest = &rest[index + 1..];
            }
        }
    }
    decoded.push_str(rest);
    decoded
}
