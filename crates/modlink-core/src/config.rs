//! Host configuration.

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How signal names are resolved across modules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalScope {
    /// One flat namespace: the first module (in load order) exporting a
    /// handler for a name owns that name.
    #[default]
    Global,
    /// Signal names are qualified as `module:signal` and route only to the
    /// named module.
    PerModule,
}

/// Configuration for a [`PluginHost`](crate::host::PluginHost).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Directories scanned by [`discover`](crate::loader::discover) and
    /// `PluginHost::load_all`.
    pub module_dirs: Vec<PathBuf>,

    /// Lowest module API version the host accepts.
    pub min_api_version: u32,

    /// Highest module API version the host accepts.
    pub max_api_version: u32,

    /// Signal namespace policy.
    pub signal_scope: SignalScope,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            module_dirs: Vec::new(),
            min_api_version: modlink_plugin_sdk::API_VERSION,
            max_api_version: modlink_plugin_sdk::API_VERSION,
            signal_scope: SignalScope::default(),
        }
    }
}

impl HostConfig {
    /// Load a configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The accepted module API version range.
    pub fn supported_versions(&self) -> RangeInclusive<u32> {
        self.min_api_version..=self.max_api_version
    }

    /// Add a module search directory.
    pub fn with_module_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.module_dirs.push(dir.into());
        self
    }

    /// Set the signal namespace policy.
    pub fn with_signal_scope(mut self, scope: SignalScope) -> Self {
        self.signal_scope = scope;
        self
    }
}
