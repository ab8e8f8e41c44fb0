//! Read-only namespaces holding the bundled preset trees.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};

/// A read-only asset namespace addressed with `/`-separated relative paths.
///
/// Mirrors the platform asset managers the bundles ship in: a directory lists
/// its entry names, while a file, an empty directory and a missing path all
/// list as empty.
pub trait AssetBundle: Send + Sync {
    fn list(&self, path: &str) -> io::Result<Vec<String>>;

    /// Opening a directory fails with [`io::ErrorKind::IsADirectory`].
    fn open(&self, path: &str) -> io::Result<Box<dyn Read + Send + '_>>;
}

pub(crate) fn join(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", parent.trim_end_matches('/'), name)
    }
}

/// Bundle rooted at a directory on disk.
#[derive(Debug, Clone)]
pub struct DirBundle {
    root: PathBuf,
}

impl DirBundle {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        path.split('/')
            .filter(|segment| !segment.is_empty() && *segment != "." && *segment != "..")
            .fold(self.root.clone(), |acc, segment| acc.join(segment))
    }
}

impl AssetBundle for DirBundle {
    fn list(&self, path: &str) -> io::Result<Vec<String>> {
        let dir = self.resolve(path);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(_) if dir.is_file() => return Ok(Vec::new()),
            Err(err) => return Err(err),
        };

        let mut names = entries
            .filter_map(Result::ok)
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect::<Vec<_>>();
        names.sort();
        Ok(names)
    }

    fn open(&self, path: &str) -> io::Result<Box<dyn Read + Send + '_>> {
        let file_path = self.resolve(path);
        if file_path.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::IsADirectory,
                format!("{path} is a directory"),
            ));
        }
        Ok(Box::new(File::open(file_path)?))
    }
}

/// In-memory bundle, handy for tests and embedded presets.
#[derive(Debug, Clone, Default)]
pub struct MemoryBundle {
    files: BTreeMap<String, Vec<u8>>,
    empty_dirs: BTreeSet<String>,
}

impl MemoryBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: &str, contents: impl Into<Vec<u8>>) -> Self {
        self.files
            .insert(path.trim_matches('/').to_string(), contents.into());
        self
    }

    pub fn with_empty_dir(mut self, path: &str) -> Self {
        self.empty_dirs.insert(path.trim_matches('/').to_string());
        self
    }

    fn paths(&self) -> impl Iterator<Item = &String> {
        self.files.keys().chain(self.empty_dirs.iter())
    }

    fn is_dir(&self, path: &str) -> bool {
        let prefix = format!("{path}/");
        self.empty_dirs.contains(path) || self.paths().any(|p| p.starts_with(&prefix))
    }
}

impl AssetBundle for MemoryBundle {
    fn list(&self, path: &str) -> io::Result<Vec<String>> {
        let path = path.trim_matches('/');
        let prefix = if path.is_empty() {
            String::new()
        } else {
            format!("{path}/")
        };
        let names = self
            .paths()
            .filter_map(|p| p.strip_prefix(prefix.as_str()))
            .filter_map(|rest| rest.split('/').next())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect::<BTreeSet<_>>();
        Ok(names.into_iter().collect())
    }

    fn open(&self, path: &str) -> io::Result<Box<dyn Read + Send + '_>> {
        let path = path.trim_matches('/');
        if let Some(contents) = self.files.get(path) {
            return Ok(Box::new(Cursor::new(contents.as_slice())));
        }
        if self.is_dir(path) {
            return Err(io::Error::new(
                io::ErrorKind::IsADirectory,
                format!("{path} is a directory"),
            ));
        }
        Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{path} is not in the bundle"),
        ))
    }
}
