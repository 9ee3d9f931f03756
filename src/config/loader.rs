//! Config file loading
//!
//! `parse → path resolution → implicit env overlay → Configuration`
//! (module binding, then remote materialization). A raw load stops after
//! parsing.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use ini::{Ini, ParseOption};

use super::configuration::{Configuration, Metadata, Pipeline};
use crate::env::{load_env, EnvSource, ProcessEnv};
use crate::error::{Error, Result};
use crate::fetch::Dispatcher;
use crate::resolve::{FileModuleLoader, ModuleLoader, PathResolver};
use crate::tree::{ConfigMap, ConfigNode};
use crate::utils::absolutize;

/// Supported file formats, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Yaml,
    Json,
    Ini,
}

impl Format {
    /// `.yaml`/`.yml`, `.json` and `.ini`, case-insensitively.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("").to_ascii_lowercase();
        match ext.as_str() {
            "yaml" | "yml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            "ini" => Ok(Self::Ini),
            _ => Err(Error::UnsupportedFormat { path: path.to_path_buf() }),
        }
    }

    /// Parse `content`; `path` is only used in error messages.
    pub fn parse(&self, content: &str, path: &Path) -> Result<ConfigNode> {
        let parse_err = |message: String| Error::Parse { path: path.to_path_buf(), message };
        match self {
            Self::Yaml => {
                let mut raw: serde_yaml::Value =
                    serde_yaml::from_str(content).map_err(|e| parse_err(e.to_string()))?;
                raw.apply_merge().map_err(|e| parse_err(e.to_string()))?;
                serde_yaml::from_value(raw).map_err(|e| parse_err(e.to_string()))
            }
            Self::Json => serde_json::from_str(content).map_err(|e| parse_err(e.to_string())),
            Self::Ini => parse_ini(content, path).map(ConfigNode::Mapping),
        }
    }
}

/// Sections become mappings of raw text values.
///
/// Keys are lower-cased, the `DEFAULT` section is left out and a section
/// declared twice is merged in declaration order. Indented lines continue the
/// previous value, joined with `\n`.
fn parse_ini(content: &str, path: &Path) -> Result<ConfigMap> {
    let options = ParseOption {
        enabled_quote: false,
        enabled_escape: false,
        enabled_indented_mutiline_value: true,
        ..Default::default()
    };
    let ini = Ini::load_from_str_opt(content, options)
        .map_err(|e| Error::Parse { path: path.to_path_buf(), message: e.to_string() })?;

    let mut sections = ConfigMap::new();
    for (section, properties) in ini.iter() {
        let Some(section) = section else {
            if !properties.is_empty() {
                tracing::warn!("Ignoring {} key(s) before the first section of {}", properties.len(), path.display());
            }
            continue;
        };
        if section == "DEFAULT" {
            continue;
        }

        let slot = sections.entry(section.to_string()).or_insert_with(|| ConfigNode::Mapping(ConfigMap::new()));
        if let ConfigNode::Mapping(values) = slot {
            for (key, value) in properties.iter() {
                values.insert(key.to_lowercase(), ConfigNode::from(value));
            }
        }
    }
    Ok(sections)
}

/// Result of [`Loader::load`].
#[derive(Debug)]
pub enum Loaded {
    /// The parsed file, untouched.
    Raw(ConfigNode),
    Config(Configuration),
}

impl Loaded {
    /// The tree, whichever way it was loaded.
    pub fn into_node(self) -> ConfigNode {
        match self {
            Self::Raw(node) => node,
            Self::Config(cfg) => ConfigNode::Mapping(cfg.to_dict()),
        }
    }

    pub fn configuration(&self) -> Option<&Configuration> {
        match self {
            Self::Raw(_) => None,
            Self::Config(cfg) => Some(cfg),
        }
    }
}

/// Builder for loading a configuration file.
pub struct Loader {
    raw: bool,
    load_remote: bool,
    home_dir: Option<PathBuf>,
    env: Arc<dyn EnvSource>,
    dispatcher: Dispatcher,
    module_loader: Arc<dyn ModuleLoader>,
}

impl Default for Loader {
    fn default() -> Self {
        Self {
            raw: false,
            load_remote: true,
            home_dir: None,
            env: Arc::new(ProcessEnv),
            dispatcher: Dispatcher::with_defaults(),
            module_loader: Arc::new(FileModuleLoader),
        }
    }
}

impl Loader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only parse; skip every post-processing pass.
    pub fn raw(mut self, raw: bool) -> Self {
        self.raw = raw;
        self
    }

    pub fn load_remote(mut self, load_remote: bool) -> Self {
        self.load_remote = load_remote;
        self
    }

    /// Directory `~` expands to; defaults to the user's home.
    pub fn home_dir(mut self, home_dir: impl Into<PathBuf>) -> Self {
        self.home_dir = Some(home_dir.into());
        self
    }

    pub fn env(mut self, env: Arc<dyn EnvSource>) -> Self {
        self.env = env;
        self
    }

    pub fn dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn module_loader(mut self, module_loader: Arc<dyn ModuleLoader>) -> Self {
        self.module_loader = module_loader;
        self
    }

    pub fn load(&self, path: impl AsRef<Path>) -> Result<Loaded> {
        let path = path.as_ref();
        let format = Format::from_path(path)?;
        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let parsed = format.parse(&content, path)?;
        let parse_datetime = Utc::now();
        tracing::debug!("Parsed {} as {:?}", path.display(), format);

        if self.raw {
            return Ok(Loaded::Raw(parsed));
        }

        let tree = match parsed {
            ConfigNode::Mapping(map) => map,
            ConfigNode::Null => ConfigMap::new(),
            other => return Err(Error::InvalidRoot { path: path.to_path_buf(), found: other.type_name() }),
        };

        let cwd = std::env::current_dir().map_err(|e| Error::io(path, e))?;
        let file = absolutize(&cwd, path);
        let base_dir = file.parent().map(Path::to_path_buf).unwrap_or(cwd);

        let mut resolver = PathResolver::new(base_dir);
        if let Some(home) = &self.home_dir {
            resolver = resolver.with_home_dir(home);
        }
        let tree = resolver.resolve(tree)?;
        let tree = load_env(tree, self.env.as_ref())?;

        let meta = Metadata::at(&file, parse_datetime, self.load_remote)?;
        let pipeline = Pipeline::new(Arc::clone(&self.module_loader), self.dispatcher.clone());
        Configuration::with_pipeline(tree, meta, pipeline).map(Loaded::Config)
    }
}

/// Load a configuration file with the built-in handlers and the process
/// environment.
pub fn load(path: impl AsRef<Path>, load_raw: bool, load_remote: bool) -> Result<Loaded> {
    Loader::new().raw(load_raw).load_remote(load_remote).load(path)
}
