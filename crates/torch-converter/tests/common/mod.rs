#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{self, Cursor, Read, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::TempDir;
use torch_converter::handle::{
    ChildEntry, DocumentProvider, Location, ResourceHandle, DIRECTORY_MIME, OCTET_STREAM_MIME,
};
use torch_converter::runner::STATUS_SUCCESS;
use torch_converter::{
    Converter, MemoryBundle, ProgressSink, Stager, TaskRunner, Workflow,
};

pub const DOWNLOADS_TREE: &str =
    "content://com.android.externalstorage.documents/tree/primary%3ADownloads";

pub fn bundle() -> MemoryBundle {
    MemoryBundle::new()
        .with_file("starship/config.yml", "game: sf64\n")
        .with_file("starship/assets/yaml/us/ast_arwing.yaml", "arwing: {}\n")
        .with_file("starship/assets/yaml/us/ast_corneria.yaml", "corneria: {}\n")
        .with_file("starship/include/sf64.h", "#pragma once\n")
        .with_file("spaghetti/config.yml", "game: mk64\n")
        .with_file("spaghetti/assets/courses/mario_raceway.yaml", "course: {}\n")
        .with_file("spaghetti/yamls/us/courses.yml", "courses: []\n")
        .with_empty_dir("spaghetti/include")
}

/// Mediated documents kept in memory, addressed by opaque ids.
///
/// A child of `tree` has the id `<tree>/document/<name>`.
#[derive(Default)]
pub struct MemoryDocuments {
    files: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
    dirs: Mutex<BTreeSet<String>>,
    names: Mutex<BTreeMap<String, String>>,
    read_only: Mutex<BTreeSet<String>>,
}

impl MemoryDocuments {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn child_id(tree: &str, name: &str) -> String {
        format!("{tree}/document/{name}")
    }

    pub fn add_file(&self, id: &str, display_name: &str, contents: impl Into<Vec<u8>>) {
        self.files
            .lock()
            .expect("files")
            .insert(id.to_string(), contents.into());
        self.names
            .lock()
            .expect("names")
            .insert(id.to_string(), display_name.to_string());
    }

    pub fn add_dir(&self, id: &str) {
        self.dirs.lock().expect("dirs").insert(id.to_string());
    }

    pub fn make_read_only(&self, tree: &str) {
        self.read_only
            .lock()
            .expect("read only")
            .insert(tree.to_string());
    }

    pub fn read(&self, id: &str) -> Option<Vec<u8>> {
        self.files.lock().expect("files").get(id).cloned()
    }

    fn id(handle: &ResourceHandle) -> io::Result<String> {
        match handle.location() {
            Location::Document(id) => Ok(id.clone()),
            Location::LocalPath(path) => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("{} is not a document", path.display()),
            )),
        }
    }
}

/// Appends straight into the shared document store.
struct DocumentWriter {
    id: String,
    files: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
}

impl Write for DocumentWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.files
            .lock()
            .expect("files")
            .entry(self.id.clone())
            .or_default()
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl DocumentProvider for MemoryDocuments {
    fn query_display_name(&self, handle: &ResourceHandle) -> Option<String> {
        let id = Self::id(handle).ok()?;
        self.names.lock().expect("names").get(&id).cloned()
    }

    fn open_input(&self, handle: &ResourceHandle) -> io::Result<Box<dyn Read + Send>> {
        let id = Self::id(handle)?;
        let contents = self
            .files
            .lock()
            .expect("files")
            .get(&id)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, id))?;
        Ok(Box::new(Cursor::new(contents)))
    }

    fn open_output(&self, handle: &ResourceHandle) -> io::Result<Box<dyn Write + Send>> {
        let id = Self::id(handle)?;
        self.files
            .lock()
            .expect("files")
            .insert(id.clone(), Vec::new());
        Ok(Box::new(DocumentWriter {
            id,
            files: Arc::clone(&self.files),
        }))
    }

    fn can_write(&self, tree: &ResourceHandle) -> bool {
        match Self::id(tree) {
            Ok(id) => !self.read_only.lock().expect("read only").contains(&id),
            Err(_) => false,
        }
    }

    fn find_child(&self, tree: &ResourceHandle, name: &str) -> io::Result<Option<ResourceHandle>> {
        let id = Self::child_id(&Self::id(tree)?, name);
        let exists = self.files.lock().expect("files").contains_key(&id)
            || self.dirs.lock().expect("dirs").contains(&id);
        Ok(exists.then(|| ResourceHandle::file_write(Location::Document(id))))
    }

    fn delete(&self, handle: &ResourceHandle) -> io::Result<bool> {
        let id = Self::id(handle)?;
        let removed = self.files.lock().expect("files").remove(&id).is_some();
        Ok(removed || self.dirs.lock().expect("dirs").remove(&id))
    }

    fn create_child(
        &self,
        tree: &ResourceHandle,
        mime: &str,
        name: &str,
    ) -> io::Result<Option<ResourceHandle>> {
        let id = Self::child_id(&Self::id(tree)?, name);
        if mime == DIRECTORY_MIME {
            self.add_dir(&id);
            return Ok(Some(ResourceHandle::tree_write(Location::Document(id))));
        }
        self.add_file(&id, name, Vec::new());
        Ok(Some(ResourceHandle::file_write(Location::Document(id))))
    }

    fn children(&self, tree: &ResourceHandle) -> io::Result<Vec<ChildEntry>> {
        let prefix = Self::child_id(&Self::id(tree)?, "");
        let direct = |id: &String| {
            id.strip_prefix(prefix.as_str())
                .filter(|rest| !rest.contains("/document/"))
                .map(str::to_string)
        };

        let mut entries = Vec::new();
        for id in self.dirs.lock().expect("dirs").iter() {
            if let Some(name) = direct(id) {
                entries.push(ChildEntry {
                    name,
                    is_dir: false,
                    mime: Some(DIRECTORY_MIME.to_string()),
                    handle: ResourceHandle::tree_write(Location::Document(id.clone())),
                });
            }
        }
        for id in self.files.lock().expect("files").keys() {
            if let Some(name) = direct(id) {
                entries.push(ChildEntry {
                    name,
                    is_dir: false,
                    mime: Some(OCTET_STREAM_MIME.to_string()),
                    handle: ResourceHandle::file_read(Location::Document(id.clone())),
                });
            }
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }
}

pub const ROM_ID: &str =
    "content://com.android.externalstorage.documents/document/primary%3ADownload%2Fsf64.z64";

/// A working directory plus a document store with one picked ROM in it.
pub struct Fixture {
    pub work: TempDir,
    pub docs: Arc<MemoryDocuments>,
}

impl Fixture {
    pub fn new() -> Self {
        let docs = MemoryDocuments::new();
        docs.add_file(ROM_ID, "Star Fox 64 (U) [!].z64", rom_bytes());
        Self {
            work: tempfile::tempdir().expect("work dir"),
            docs,
        }
    }

    pub fn work_dir(&self) -> &Path {
        self.work.path()
    }

    pub fn rom(&self) -> ResourceHandle {
        ResourceHandle::file_read(Location::Document(ROM_ID.to_string()))
    }

    pub fn stager(&self) -> Stager<MemoryBundle> {
        Stager::new(self.work.path(), bundle())
    }

    pub fn workflow<C>(&self, converter: C) -> Workflow<MemoryBundle>
    where
        C: Converter + 'static,
    {
        let runner = TaskRunner::new(Arc::new(converter)).with_step_delay(Duration::ZERO);
        let docs: Arc<dyn DocumentProvider> = self.docs.clone();
        Workflow::new(self.stager(), docs, runner)
    }
}

pub fn rom_bytes() -> Vec<u8> {
    (0..40_000u32).map(|i| (i * 7 % 256) as u8).collect()
}

/// Converter that writes `bytes` bytes to the output and succeeds.
pub fn writes_bytes(
    bytes: usize,
) -> impl Fn(&Path, &Path, &Path, &ProgressSink) -> String + Send + Sync {
    move |rom: &Path, output: &Path, config: &Path, progress: &ProgressSink| {
        assert!(rom.is_file(), "ROM must be staged before converting");
        assert!(config.join("config.yml").is_file(), "config must be staged");
        progress.update_progress("Generating O2R file...");
        fs::write(output, vec![0x4fu8; bytes]).expect("write output");
        STATUS_SUCCESS.to_string()
    }
}

/// Converter that returns `status` without producing anything.
pub fn returns(
    status: &'static str,
) -> impl Fn(&Path, &Path, &Path, &ProgressSink) -> String + Send + Sync {
    move |_: &Path, _: &Path, _: &Path, _: &ProgressSink| status.to_string()
}
