use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{fs, io};

use serde::{Deserialize, Serialize};

use crate::error::SettingsError;
use crate::preset::Preset;
use crate::runner::DEFAULT_STEP_DELAY;

pub const SETTINGS_FILE_NAME: &str = "converter.toml";
pub const DEFAULT_WORK_DIR: &str = "torch-workdir";
pub const DEFAULT_ASSETS_DIR: &str = "assets";

/// External program used as the converter.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ConverterCommand {
    pub program: String,
    /// `{rom}`, `{output}` and `{config}` are replaced per job.
    #[serde(default = "ConverterCommand::default_args")]
    pub args: Vec<String>,
}

impl ConverterCommand {
    fn default_args() -> Vec<String> {
        ["o2r", "{rom}", "{output}", "{config}"]
            .map(str::to_string)
            .to_vec()
    }

    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Self::default_args(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default = "Settings::default_work_dir")]
    pub work_dir: PathBuf,
    #[serde(default = "Settings::default_assets_dir")]
    pub assets_dir: PathBuf,
    #[serde(default)]
    pub preset: Preset,
    #[serde(default = "Settings::default_step_delay_ms")]
    pub step_delay_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub converter: Option<ConverterCommand>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            work_dir: Self::default_work_dir(),
            assets_dir: Self::default_assets_dir(),
            preset: Preset::default(),
            step_delay_ms: Self::default_step_delay_ms(),
            converter: None,
        }
    }
}

impl Settings {
    fn default_work_dir() -> PathBuf {
        PathBuf::from(DEFAULT_WORK_DIR)
    }

    fn default_assets_dir() -> PathBuf {
        PathBuf::from(DEFAULT_ASSETS_DIR)
    }

    const fn default_step_delay_ms() -> u64 {
        DEFAULT_STEP_DELAY.as_millis() as u64
    }

    pub fn step_delay(&self) -> Duration {
        Duration::from_millis(self.step_delay_ms)
    }

    pub fn from_toml_str(path: &Path, contents: &str) -> Result<Self, SettingsError> {
        toml::from_str(contents).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads `path`, falling back to defaults when the file does not exist.
    /// Relative directories are resolved against the file's folder.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(SettingsError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let mut settings = Self::from_toml_str(path, &contents)?;
        if let Some(base) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            settings.work_dir = base.join(&settings.work_dir);
            settings.assets_dir = base.join(&settings.assets_dir);
        }
        Ok(settings)
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
