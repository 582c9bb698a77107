//! Host configuration.
//!
//! Every directory the host touches is derived from one root in
//! [`HostPaths`], constructed once at startup and passed by reference into
//! the components that need it. No component reads shared globals.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Root directory name under the user's home, normal mode.
pub const DEFAULT_ROOT_DIR: &str = ".modhost";
/// Root directory name under the user's home, dev mode.
pub const DEV_ROOT_DIR: &str = ".modhost_dev";

/// Shared asset file names copied into every compiled module.
pub const SHARED_STYLESHEET: &str = "colors.css";
pub const SHARED_FONT: &str = "host.ttf";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Filesystem layout of the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostPaths {
    /// Host root; everything else lives under it.
    pub root: PathBuf,
    /// Where module distribution archives are dropped.
    pub archives_dir: PathBuf,
    /// Temp extraction root, wiped every build pass.
    pub temp_dir: PathBuf,
    /// Compiled module artifact trees, one subdirectory per module.
    pub compiled_dir: PathBuf,
    /// Per-module settings and storage files.
    pub storage_dir: PathBuf,
    /// Source of the shared host assets (stylesheet, font).
    pub assets_dir: PathBuf,
}

impl HostPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let archives_dir = root.join("external_modules");
        Self {
            temp_dir: archives_dir.join("temp"),
            archives_dir,
            compiled_dir: root.join("built"),
            storage_dir: root.join("storage"),
            assets_dir: root.join("view"),
            root,
        }
    }

    /// Default layout under the user's home directory; dev mode uses a
    /// separate root so development builds never touch real module state.
    pub fn in_home(dev: bool) -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::new(home.join(if dev { DEV_ROOT_DIR } else { DEFAULT_ROOT_DIR }))
    }

    /// The shared asset files copied into every rebuilt module.
    pub fn shared_asset_files(&self) -> Vec<PathBuf> {
        vec![
            self.assets_dir.join(SHARED_STYLESHEET),
            self.assets_dir.join(SHARED_FONT),
        ]
    }

    /// Create the directories the host needs to start. Failure here is fatal
    /// to startup: it is a storage-layer problem, not a module problem.
    pub async fn ensure_directories(&self) -> io::Result<()> {
        for dir in [&self.archives_dir, &self.compiled_dir, &self.storage_dir] {
            tokio::fs::create_dir_all(dir).await?;
        }
        Ok(())
    }
}

impl Default for HostPaths {
    fn default() -> Self {
        Self::in_home(false)
    }
}

/// Top-level host configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostConfig {
    #[serde(default)]
    pub paths: HostPaths,

    /// Recompile every module this run, ignoring the build cache.
    #[serde(default)]
    pub force_reload: bool,

    /// Log filter applied when RUST_LOG is unset.
    #[serde(default)]
    pub log_filter: Option<String>,
}

impl HostConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }
}
