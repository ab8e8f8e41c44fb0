//! Private scratch directory the converter runs against.
//!
//! Layout after a successful stage:
//!
//! ```text
//! <work_dir>/
//!   baserom.z64
//!   config.yml
//!   assets/...
//!   yamls/...      (when the preset ships it)
//!   include/...    (when the preset ships it)
//! ```

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::bundle::{self, AssetBundle};
use crate::error::{RomError, StagingError};
use crate::handle::{self, DocumentProvider, ResourceHandle};
use crate::preset::Preset;

pub const ROM_FILE_NAME: &str = "baserom.z64";
const PARTIAL_ROM_FILE_NAME: &str = "baserom.z64.part";
pub const ROM_SUFFIX: &str = ".z64";
pub const CONFIG_FILE_NAME: &str = "config.yml";
pub const ASSETS_DIR_NAME: &str = "assets";
/// Entries removed from the working directory before new config is staged.
pub const CONFIG_ARTIFACTS: [&str; 4] = [CONFIG_FILE_NAME, ASSETS_DIR_NAME, "yamls", "include"];

const COPY_BUFFER_SIZE: usize = 8 * 1024;

/// Copies `reader` into `writer` through a fixed 8 KiB buffer.
pub fn copy_stream<R, W>(reader: &mut R, writer: &mut W) -> io::Result<u64>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut buffer = [0u8; COPY_BUFFER_SIZE];
    let mut total = 0u64;
    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        writer.write_all(&buffer[..read])?;
        total += read as u64;
    }
    writer.flush()?;
    Ok(total)
}

pub fn is_supported_rom_name(name: &str) -> bool {
    name.len() >= ROM_SUFFIX.len()
        && name
            .get(name.len() - ROM_SUFFIX.len()..)
            .is_some_and(|suffix| suffix.eq_ignore_ascii_case(ROM_SUFFIX))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkDirEntry {
    /// Path relative to the working directory.
    pub path: PathBuf,
    pub is_dir: bool,
    pub size: u64,
    pub depth: usize,
}

pub struct Stager<B> {
    work_dir: PathBuf,
    bundle: B,
}

impl<B: AssetBundle> Stager<B> {
    pub fn new(work_dir: impl Into<PathBuf>, bundle: B) -> Self {
        Self {
            work_dir: work_dir.into(),
            bundle,
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn bundle(&self) -> &B {
        &self.bundle
    }

    pub fn rom_path(&self) -> PathBuf {
        self.work_dir.join(ROM_FILE_NAME)
    }

    /// Directory handed to the converter as its config path.
    pub fn config_path(&self) -> PathBuf {
        self.work_dir.clone()
    }

    pub fn output_path(&self, preset: Preset) -> PathBuf {
        self.work_dir.join(preset.output_file_name())
    }

    /// Copies a picked ROM into the fixed `baserom.z64` slot.
    pub fn import_rom(
        &self,
        docs: &dyn DocumentProvider,
        rom: &ResourceHandle,
    ) -> Result<PathBuf, RomError> {
        let name = handle::display_name(docs, rom);
        if !is_supported_rom_name(&name) {
            return Err(RomError::UnsupportedRomFormat { name });
        }

        fs::create_dir_all(&self.work_dir)?;
        let destination = self.rom_path();
        // The picked file may be the slot itself; never truncate it before
        // the copy has finished.
        let partial = self.work_dir.join(PARTIAL_ROM_FILE_NAME);
        let copied = handle::open_read(docs, rom)
            .map_err(RomError::from)
            .and_then(|mut input| {
                let mut output = File::create(&partial)?;
                Ok(copy_stream(&mut input, &mut output)?)
            })
            .and_then(|bytes| {
                fs::rename(&partial, &destination)?;
                Ok(bytes)
            });
        let bytes = match copied {
            Ok(bytes) => bytes,
            Err(err) => {
                if let Err(cleanup) = fs::remove_file(&partial) {
                    if cleanup.kind() != io::ErrorKind::NotFound {
                        warn!(
                            error = %cleanup,
                            path = %partial.display(),
                            "failed to remove partial ROM"
                        );
                    }
                }
                return Err(err);
            }
        };

        info!(
            rom = %name,
            path = %destination.display(),
            bytes,
            "ROM copied to working directory"
        );
        Ok(destination)
    }

    /// Replaces any staged config with the preset's bundled tree.
    pub fn stage_preset(&self, preset: Preset) -> Result<PathBuf, StagingError> {
        let root = preset.bundle_root();
        let entries = self
            .bundle
            .list(root)
            .map_err(|err| StagingError::io(root, err))?;
        if entries.is_empty() {
            return Err(StagingError::PresetNotFound(preset));
        }

        fs::create_dir_all(&self.work_dir).map_err(|err| StagingError::io(&self.work_dir, err))?;
        self.purge_config_artifacts()?;
        self.copy_bundle_dir(root, &self.work_dir)?;

        info!(
            preset = %preset,
            work_dir = %self.work_dir.display(),
            "config copied to working directory"
        );
        self.log_contents();
        Ok(self.config_path())
    }

    /// Replaces any staged config with the contents of a user-picked tree.
    pub fn import_config_tree(
        &self,
        docs: &dyn DocumentProvider,
        tree: &ResourceHandle,
    ) -> Result<PathBuf, StagingError> {
        fs::create_dir_all(&self.work_dir).map_err(|err| StagingError::io(&self.work_dir, err))?;
        self.purge_config_artifacts()?;
        info!(tree = %tree, "copying config directory");
        copy_tree(docs, tree, &self.work_dir)?;
        self.log_contents();
        Ok(self.config_path())
    }

    pub fn purge_config_artifacts(&self) -> Result<(), StagingError> {
        for name in CONFIG_ARTIFACTS {
            let path = self.work_dir.join(name);
            let result = match fs::symlink_metadata(&path) {
                Ok(metadata) if metadata.is_dir() => fs::remove_dir_all(&path),
                Ok(_) => fs::remove_file(&path),
                Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
                Err(err) => Err(err),
            };
            result.map_err(|err| StagingError::io(&path, err))?;
            debug!(path = %path.display(), "removed staged config artifact");
        }
        Ok(())
    }

    /// Depth-first listing of everything currently in the working directory.
    pub fn list_contents(&self) -> io::Result<Vec<WorkDirEntry>> {
        let mut entries = Vec::new();
        if self.work_dir.is_dir() {
            collect_entries(&self.work_dir, Path::new(""), 0, &mut entries)?;
        }
        Ok(entries)
    }

    fn copy_bundle_dir(&self, asset_path: &str, destination: &Path) -> Result<(), StagingError> {
        let names = self
            .bundle
            .list(asset_path)
            .map_err(|err| StagingError::io(destination, err))?;

        for name in names {
            let child = bundle::join(asset_path, &name);
            let target = destination.join(&name);
            match self.bundle.list(&child) {
                Ok(grandchildren) if !grandchildren.is_empty() => {
                    fs::create_dir_all(&target).map_err(|err| StagingError::io(&target, err))?;
                    self.copy_bundle_dir(&child, &target)?;
                }
                // Empty directories list exactly like files.
                _ => self.copy_bundle_file(&child, &target)?,
            }
        }
        Ok(())
    }

    fn copy_bundle_file(&self, asset_path: &str, target: &Path) -> Result<(), StagingError> {
        let mut input = match self.bundle.open(asset_path) {
            Ok(input) => input,
            Err(err) if err.kind() == io::ErrorKind::IsADirectory => {
                return fs::create_dir_all(target).map_err(|err| StagingError::io(target, err));
            }
            Err(err) => return Err(StagingError::io(target, err)),
        };
        let mut output = File::create(target).map_err(|err| StagingError::io(target, err))?;
        let bytes =
            copy_stream(&mut input, &mut output).map_err(|err| StagingError::io(target, err))?;
        debug!(asset = asset_path, bytes, "copied asset");
        Ok(())
    }

    fn log_contents(&self) {
        match self.list_contents() {
            Ok(entries) => {
                for entry in entries {
                    let indent = "  ".repeat(entry.depth);
                    if entry.is_dir {
                        debug!("{indent}{}/", entry.path.display());
                    } else {
                        debug!("{indent}{} ({} bytes)", entry.path.display(), entry.size);
                    }
                }
            }
            Err(err) => warn!(error = %err, "failed to list working directory"),
        }
    }
}

fn copy_tree(
    docs: &dyn DocumentProvider,
    tree: &ResourceHandle,
    destination: &Path,
) -> Result<(), StagingError> {
    let children = handle::list_children(docs, tree).map_err(StagingError::TreeImportFailed)?;
    for child in children {
        let target = destination.join(&child.name);
        if child.is_directory() {
            fs::create_dir_all(&target).map_err(|err| StagingError::io(&target, err))?;
            copy_tree(docs, &child.handle, &target)?;
        } else {
            let mut input =
                handle::open_read(docs, &child.handle).map_err(StagingError::TreeImportFailed)?;
            let mut output = File::create(&target).map_err(|err| StagingError::io(&target, err))?;
            copy_stream(&mut input, &mut output).map_err(|err| StagingError::io(&target, err))?;
            debug!(file = %child.name, "copied config file");
        }
    }
    Ok(())
}

fn collect_entries(
    root: &Path,
    relative: &Path,
    depth: usize,
    entries: &mut Vec<WorkDirEntry>,
) -> io::Result<()> {
    let mut children = fs::read_dir(root.join(relative))?
        .collect::<Result<Vec<_>, _>>()?;
    children.sort_by_key(|entry| entry.file_name());

    for child in children {
        let path = relative.join(child.file_name());
        let metadata = child.metadata()?;
        let is_dir = metadata.is_dir();
        entries.push(WorkDirEntry {
            path: path.clone(),
            is_dir,
            size: if is_dir { 0 } else { metadata.len() },
            depth,
        });
        if is_dir {
            collect_entries(root, &path, depth + 1, entries)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::MemoryBundle;

    #[test]
    fn rom_suffix_check_is_case_insensitive() {
        assert!(is_supported_rom_name("Star Fox 64 (U).z64"));
        assert!(is_supported_rom_name("STARFOX.Z64"));
        assert!(!is_supported_rom_name("starfox.v64"));
        assert!(!is_supported_rom_name("starfox.n64"));
        assert!(!is_supported_rom_name("z64"));
        assert!(!is_supported_rom_name("rom.z64.zip"));
    }

    #[test]
    fn copy_stream_handles_inputs_larger_than_buffer() {
        let data = (0..COPY_BUFFER_SIZE * 3 + 17)
            .map(|i| (i % 251) as u8)
            .collect::<Vec<_>>();
        let mut output = Vec::new();
        let copied = copy_stream(&mut data.as_slice(), &mut output).expect("copy");
        assert_eq!(copied, data.len() as u64);
        assert_eq!(output, data);
    }

    #[test]
    fn missing_preset_root_is_reported() {
        let dir = tempfile::tempdir().expect("temp dir");
        let bundle = MemoryBundle::new().with_file("starship/config.yml", "cfg");
        let stager = Stager::new(dir.path(), bundle);

        let err = stager.stage_preset(Preset::Spaghetti).unwrap_err();
        assert!(matches!(err, StagingError::PresetNotFound(Preset::Spaghetti)));
    }
}
