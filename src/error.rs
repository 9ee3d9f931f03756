//! Error types

use std::path::PathBuf;

/// Errors raised while loading, post-processing or deriving configurations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("extension of the file '{}' was not recognized", path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("configuration root of {} must be a mapping, got {found}", path.display())]
    InvalidRoot { path: PathBuf, found: &'static str },

    #[error("the key '{key}' has not both keys 'source_url' and 'sink_path'")]
    MissingDownloadInfo { key: String },

    #[error("unknown protocol: source_url='{url}'")]
    UnknownProtocol { url: String },

    #[error("invalid remote descriptor for '{url}': {reason}")]
    InvalidDescriptor { url: String, reason: String },

    #[error("value of '{key}' must be {expected}, got {found}")]
    TypeConflict { key: String, expected: &'static str, found: &'static str },

    #[error("unknown converter '{name}'")]
    UnknownConverter { name: String },

    #[error("invalid environment mapping for '{env_name}': {reason}")]
    InvalidEnvMapping { env_name: String, reason: String },

    #[error("cannot convert value of '{name}' with converter '{converter}': {reason}")]
    Conversion { name: String, converter: String, reason: String },

    #[error("key not found: '{key}'")]
    KeyNotFound { key: String },

    #[error("failed to load module '{name}' from {}: {reason}", path.display())]
    ModuleLoad { name: String, path: PathBuf, reason: String },

    #[error("fetching '{url}' failed: {reason}")]
    FetchFailed { url: String, reason: String },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    pub(crate) fn fetch(url: &str, reason: impl ToString) -> Self {
        Self::FetchFailed { url: url.to_string(), reason: reason.to_string() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
