use std::path::{Path, PathBuf};
use std::result::Result as StdResult;
use std::time::Duration;

use anyhow::{bail, Context as _};
use rust_embed::RustEmbed;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::testing::ProcessToolchain;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(skip)]
    pub source_config_file: Option<PathBuf>,
    pub paths: PathsConfig,
    pub toolchain: ToolchainConfig,
    pub run: RunConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub root: Option<PathBuf>,
    pub storage: Option<PathBuf>,
    pub code_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    pub source_ext: String,
    pub compiler: Vec<String>,
    pub runtime: Vec<String>,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            source_ext: "java".to_owned(),
            compiler: vec!["javac".to_owned()],
            runtime: vec!["java".to_owned()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub timeout_ms: u64,
    pub compile_timeout_ms: u64,
    pub jobs: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            compile_timeout_ms: 60_000,
            jobs: 1,
        }
    }
}

#[derive(RustEmbed)]
#[folder = "assets/"]
struct Asset;

impl Config {
    pub const FILENAME: &str = "gradekit.toml";

    pub fn example_toml() -> anyhow::Result<String> {
        let file = Asset::get(Self::FILENAME).context("Example config is not embedded")?;
        let toml = std::str::from_utf8(file.data.as_ref()).context("Example config is not UTF-8")?;
        Ok(toml.to_owned())
    }

    pub fn from_toml(s: &str) -> StdResult<Self, toml::de::Error> {
        toml::from_str(s)
    }

    /// Parses the file and resolves relative paths against its directory.
    pub fn from_toml_file(filepath: PathBuf) -> anyhow::Result<Self> {
        let toml = fsutil::read_to_string(&filepath).context("Cannot read a file")?;
        let mut cfg = Self::from_toml(&toml)
            .with_context(|| format!("Invalid config TOML: {:?}", filepath))?;

        let base = filepath.parent().unwrap_or(Path::new("."));
        cfg.paths.root = cfg.paths.root.map(|p| Self::resolve_against(base, p));
        cfg.paths.storage = cfg.paths.storage.map(|p| Self::resolve_against(base, p));
        cfg.source_config_file = Some(filepath);
        Ok(cfg)
    }

    fn resolve_against(base: &Path, path: PathBuf) -> PathBuf {
        if path.is_absolute() {
            path
        } else {
            fsutil::normalize_path(base.join(path))
        }
    }

    /// Find config file ancestor dirs, including current dir.
    pub fn find_file_in_ancestors(cur_dir: impl AsRef<Path>) -> anyhow::Result<PathBuf> {
        let cur_dir = cur_dir.as_ref();
        cur_dir
            .ancestors()
            .map(|dir| dir.join(Self::FILENAME))
            .find(|path| path.is_file())
            .with_context(|| {
                format!(
                    "Not in a gradekit project dir: Cannot find '{}'",
                    Self::FILENAME
                )
            })
    }

    pub fn from_file_finding_in_ancestors(cur_dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let config_filepath = Config::find_file_in_ancestors(cur_dir)?;
        Self::from_toml_file(config_filepath)
    }

    /// Writes the example config into `dir`. Fails if `dir` already belongs to a project.
    pub fn init_with_example(dir: impl AsRef<Path>) -> anyhow::Result<PathBuf> {
        let dir = dir.as_ref();
        if let Ok(config_filepath) = Config::find_file_in_ancestors(dir) {
            bail!(
                "Already in a gradekit project.\nIf it's intentional, remove {:?} and then try again.",
                config_filepath
            );
        }
        let config_filepath = dir.join(Self::FILENAME);
        fsutil::write_with_mkdir(&config_filepath, Self::example_toml()?)?;
        Ok(config_filepath)
    }

    pub fn storage_dir(&self) -> StdResult<&Path, ConfigError> {
        self.paths.storage.as_deref().ok_or(ConfigError::StorageUnset)
    }

    pub fn process_toolchain(&self) -> ProcessToolchain {
        ProcessToolchain::new(self.toolchain.compiler.clone(), self.toolchain.runtime.clone())
            .execution_time_limit(self.run.timeout())
            .compile_time_limit(self.run.compile_timeout())
    }
}

fn millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

impl RunConfig {
    /// `None` when disabled.
    pub fn timeout(&self) -> Option<Duration> {
        millis(self.timeout_ms)
    }

    pub fn compile_timeout(&self) -> Option<Duration> {
        millis(self.compile_timeout_ms)
    }
}
