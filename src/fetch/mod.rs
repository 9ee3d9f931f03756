//! Remote resource fetching (HTTP(S), FTP, object storage)

use std::fmt;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use tempfile::NamedTempFile;

use crate::error::{Error, Result};

pub mod ftp;
pub mod http;
pub mod object_store;
pub mod sigv4;

pub use ftp::FtpHandler;
pub use http::HttpHandler;
pub use object_store::{HttpObjectStore, ObjectStore, ObjectStoreHandler};
pub use sigv4::{AwsCredentials, Signer};

/// Whether an existing sink file blocks a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchPolicy {
    #[default]
    LoadIfMissing,
    LoadAlways,
}

impl FetchPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LoadIfMissing => "load_if_missing",
            Self::LoadAlways => "load_always",
        }
    }
}

impl FromStr for FetchPolicy {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value {
            "load_if_missing" => Ok(Self::LoadIfMissing),
            "load_always" => Ok(Self::LoadAlways),
            other => Err(format!(
                "unknown policy '{other}' (expected 'load_if_missing' or 'load_always')"
            )),
        }
    }
}

/// What to fetch, where to put it, and when to bother.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteDescriptor {
    pub source_url: String,
    pub sink_path: PathBuf,
    pub policy: FetchPolicy,
}

impl RemoteDescriptor {
    pub fn new(source_url: impl Into<String>, sink_path: impl Into<PathBuf>) -> Self {
        Self { source_url: source_url.into(), sink_path: sink_path.into(), policy: FetchPolicy::default() }
    }

    pub fn with_policy(mut self, policy: FetchPolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// Result of [`Dispatcher::fetch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The sink already existed and the policy allowed reusing it.
    Skipped,
    Downloaded,
}

/// Streams one remote resource into a writer.
pub trait ProtocolHandler: Send + Sync {
    /// Reject a malformed URL before any I/O happens.
    fn validate(&self, _source_url: &str) -> Result<()> {
        Ok(())
    }

    fn fetch(&self, source_url: &str, sink: &mut dyn Write) -> Result<()>;
}

/// Ordered registry of URL prefixes and their handlers; the first matching
/// prefix wins.
#[derive(Clone, Default)]
pub struct Dispatcher {
    handlers: Vec<(String, Arc<dyn ProtocolHandler>)>,
}

impl Dispatcher {
    /// An empty registry. Every URL is an unknown protocol until handlers are
    /// registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in handlers:
    /// - `http://`, `https://` → [`HttpHandler`]
    /// - `ftp://` → [`FtpHandler`]
    /// - `s3://bucket/key` → [`ObjectStoreHandler`] over [`HttpObjectStore::from_env`]
    pub fn with_defaults() -> Self {
        let http: Arc<dyn ProtocolHandler> = Arc::new(HttpHandler::default());
        Self::new()
            .register("http://", Arc::clone(&http))
            .register("https://", http)
            .register("ftp://", Arc::new(FtpHandler::default()))
            .register("s3://", Arc::new(ObjectStoreHandler::new("s3://", HttpObjectStore::from_env())))
    }

    /// Append a handler. Earlier registrations take precedence.
    pub fn register(mut self, prefix: impl Into<String>, handler: Arc<dyn ProtocolHandler>) -> Self {
        self.handlers.push((prefix.into(), handler));
        self
    }

    pub fn prefixes(&self) -> impl Iterator<Item = &str> {
        self.handlers.iter().map(|(prefix, _)| prefix.as_str())
    }

    pub fn resolve(&self, source_url: &str) -> Result<&dyn ProtocolHandler> {
        self.handlers
            .iter()
            .find(|(prefix, _)| source_url.starts_with(prefix.as_str()))
            .map(|(_, handler)| handler.as_ref())
            .ok_or_else(|| Error::UnknownProtocol { url: source_url.to_string() })
    }

    /// Fetch `descriptor.source_url` into `descriptor.sink_path`.
    ///
    /// With [`FetchPolicy::LoadIfMissing`] an existing sink file short-circuits
    /// the fetch; this is a presence check only. Anything else at the sink
    /// path, such as a directory, does not count as present. The body is written to a
    /// temporary file next to the sink and renamed into place, so a failed
    /// fetch never leaves a partial sink behind.
    pub fn fetch(&self, descriptor: &RemoteDescriptor) -> Result<FetchOutcome> {
        let url = descriptor.source_url.as_str();
        let sink = descriptor.sink_path.as_path();

        if descriptor.policy == FetchPolicy::LoadIfMissing && sink.is_file() {
            tracing::debug!("Sink {} exists; skipping {}", sink.display(), url);
            return Ok(FetchOutcome::Skipped);
        }

        let handler = self.resolve(url)?;
        handler.validate(url)?;

        let dir = sink_dir(sink);
        std::fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
        let mut staged = NamedTempFile::new_in(dir).map_err(|e| Error::io(dir, e))?;
        {
            let mut writer = BufWriter::new(staged.as_file_mut());
            handler.fetch(url, &mut writer)?;
            writer.flush().map_err(|e| Error::io(sink, e))?;
        }
        staged.persist(sink).map_err(|e| Error::io(sink, e.error))?;

        tracing::info!("Fetched {} -> {}", url, sink.display());
        Ok(FetchOutcome::Downloaded)
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher").field("prefixes", &self.prefixes().collect::<Vec<_>>()).finish()
    }
}

fn sink_dir(sink: &Path) -> &Path {
    match sink.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Fetch with the built-in handlers.
pub fn fetch_remote(source_url: &str, sink_path: &Path, policy: FetchPolicy) -> Result<FetchOutcome> {
    Dispatcher::with_defaults().fetch(&RemoteDescriptor::new(source_url, sink_path).with_policy(policy))
}
