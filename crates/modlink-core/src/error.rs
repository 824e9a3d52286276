//! Error types for the host core.
//!
//! Every failure is a value returned to the immediate caller; nothing in
//! this crate panics or unwinds across the module boundary, and a single
//! bad plugin never takes the host down with it.

use std::path::PathBuf;

/// Failure to load and activate a module.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("module image not found: {0}")]
    NotFound(PathBuf),

    #[error("invalid module image {path}: {reason}")]
    InvalidImage { path: PathBuf, reason: String },

    #[error("required symbol `{0}` missing")]
    SymbolMissing(String),

    #[error(transparent)]
    Version(#[from] VersionError),

    #[error("module name `{0}` is already loaded")]
    DuplicateName(String),
}

/// The module's reported API version is outside the host's supported range.
#[derive(Debug, thiserror::Error)]
pub enum VersionError {
    #[error("unsupported module api version {reported}, host supports {min}..={max}")]
    Unsupported { reported: u32, min: u32, max: u32 },
}

/// Failure to unload a module.
#[derive(Debug, thiserror::Error)]
pub enum UnloadError {
    #[error("module `{0}` is not loaded")]
    NotFound(String),

    /// Reserved for a future strict mode that refuses to unload a module
    /// while its interfaces still have live consumers.
    #[error("module `{0}` is still in use")]
    InUse(String),
}

/// Failure to publish an interface.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("interface `{name}` v{version} is already registered")]
    AlreadyExists { name: String, version: u32 },

    /// The claimed owning module is not loaded. Rejected up front so an
    /// interface record can never outlive (or predate) its owner.
    #[error("owning module `{0}` is not loaded")]
    UnknownModule(String),
}

/// Failure to read or parse a host configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
