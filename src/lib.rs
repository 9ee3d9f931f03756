//! cfg-load: load YAML, JSON and INI configuration files into an enriched,
//! read-mostly tree
//!
//! After parsing, reserved key suffixes drive post-processing passes:
//! `*_path` values become absolute paths, `*_module_path` entries are bound as
//! modules and `*_load_url` descriptors are fetched to local sinks. Top-level
//! keys can be overridden from the environment.
//!
//! ```no_run
//! let loaded = cfg_load::load("config.yaml", false, true)?;
//! if let Some(cfg) = loaded.configuration() {
//!     println!("{}", cfg.pformat(4, true).unwrap_or_default());
//! }
//! # Ok::<(), cfg_load::Error>(())
//! ```

pub mod config;
pub mod env;
pub mod error;
pub mod fetch;
pub mod resolve;
pub mod tree;
pub mod utils;

pub use config::{deep_merge, load, Configuration, Format, Loaded, Loader, Metadata};
pub use env::{apply_overlay, load_env, Converter, EnvMappingEntry, EnvSource, ProcessEnv};
pub use error::{Error, Result};
pub use fetch::{fetch_remote, Dispatcher, FetchOutcome, FetchPolicy, ProtocolHandler, RemoteDescriptor};
pub use tree::{ConfigMap, ConfigNode};
