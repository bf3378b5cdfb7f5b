//! Configuration for the module index and the corpus scanner
//!
//! Defaults come from the embedded `modstat-default.toml`; a site can point the
//! tool at a different repository layout with `--config FILE`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_TOML: &str = include_str!("../modstat-default.toml");

/// Repository layout and corpus conventions
///
/// # Example
/// ```
/// use modstat::config::StatConfig;
///
/// let config = StatConfig::default();
/// assert_eq!(config.baseline_epoch, 2014);
/// assert!(config.bin_dirs.contains(&"bin64".to_string()));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatConfig {
    /// Root of the installed-software tree
    pub repository: PathBuf,

    /// Toolchain epochs with an installed tree, walked in this order
    pub epochs: Vec<u16>,

    /// Suffix appended to the epoch year in directory names (`2016a`)
    pub epoch_suffix: String,

    /// Toolchain assumed for scripts that never switch
    pub baseline_epoch: u16,

    /// Directories under `software/` that are not modules
    pub excluded_modules: Vec<String>,

    /// Names of executable-holding directories
    pub bin_dirs: Vec<String>,

    /// File suffixes that never name an executable
    pub blocked_extensions: Vec<String>,

    /// Extension of job scripts (without the dot)
    pub script_extension: String,

    /// Extension of job metadata records (without the dot)
    pub record_extension: String,
}

impl Default for StatConfig {
    fn default() -> Self {
        Self {
            repository: PathBuf::from("/apps/leuven/thinking"),
            epochs: vec![2014, 2015, 2016],
            epoch_suffix: "a".to_string(),
            baseline_epoch: 2014,
            excluded_modules: ["bin", "accounting", "intel_env", "foss_env"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            bin_dirs: vec!["bin".to_string(), "bin64".to_string()],
            blocked_extensions: [
                "dat", "txt", "so", "conf", "config", "cmd", "bat", "a", "la", "tar", "gz", "zip",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            script_extension: "SC".to_string(),
            record_extension: "JB".to_string(),
        }
    }
}

impl StatConfig {
    /// Configuration shipped with the binary
    pub fn embedded() -> Result<Self> {
        toml::from_str(DEFAULT_TOML).context("Failed to parse embedded modstat-default.toml")
    }

    /// Load configuration from a TOML file; missing keys fall back to defaults
    pub fn from_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).with_context(|| {
            format!("Failed to read config file: {}", path.as_ref().display())
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: StatConfig = toml::from_str(content).context("Failed to parse TOML config")?;
        if config.epochs.is_empty() {
            anyhow::bail!("Invalid config: at least one epoch is required");
        }
        if config.bin_dirs.is_empty() {
            anyhow::bail!("Invalid config: bin_dirs must not be empty");
        }
        Ok(config)
    }

    /// Directory holding one epoch's tree, e.g. `/apps/leuven/thinking/2016a`
    pub fn epoch_root(&self, epoch: u16) -> PathBuf {
        self.repository
            .join(format!("{}{}", epoch, self.epoch_suffix))
    }

    /// `<epoch root>/software`, walked for executables
    pub fn software_root(&self, epoch: u16) -> PathBuf {
        self.epoch_root(epoch).join("software")
    }

    /// `<epoch root>/modules/all`, listed for available modules
    pub fn modules_root(&self, epoch: u16) -> PathBuf {
        self.epoch_root(epoch).join("modules").join("all")
    }

    /// Builder-style override of the repository root
    pub fn with_repository(mut self, repository: impl Into<PathBuf>) -> Self {
        self.repository = repository.into();
        self
    }

    /// Builder-style override of the walked epochs
    pub fn with_epochs(mut self, epochs: Vec<u16>) -> Self {
        self.epochs = epochs;
        self
    }
}
