//! Absolutize `*_path` values

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::tree::{ConfigMap, ConfigNode, Walker};
use crate::utils::{absolutize, expand_home};

pub const PATH_SUFFIX: &str = "_path";

/// Rewrites every `*_path` value to an absolute, normalized path.
///
/// Relative values are joined onto the directory of the file being loaded;
/// values starting with `~` are joined onto the user's home directory.
#[derive(Debug, Clone)]
pub struct PathResolver {
    base_dir: PathBuf,
    home_dir: Option<PathBuf>,
}

impl PathResolver {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into(), home_dir: dirs::home_dir() }
    }

    /// Override the directory `~` expands to.
    pub fn with_home_dir(mut self, home_dir: impl Into<PathBuf>) -> Self {
        self.home_dir = Some(home_dir.into());
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn resolve(&self, tree: ConfigMap) -> Result<ConfigMap> {
        Walker::new(PATH_SUFFIX).transform_map(tree, &mut |key, value| self.resolve_entry(key, value))
    }

    fn resolve_entry(&self, key: &str, value: ConfigNode) -> Result<ConfigNode> {
        let raw = match value {
            ConfigNode::Text(raw) => raw,
            other => {
                return Err(Error::TypeConflict {
                    key: key.to_string(),
                    expected: "text",
                    found: other.type_name(),
                })
            }
        };

        let expanded = match &self.home_dir {
            Some(home) => expand_home(&raw, home),
            None => {
                if raw.starts_with('~') {
                    tracing::debug!("No home directory known; treating '{}' as relative", raw);
                }
                None
            }
        };
        let resolved = match expanded {
            Some(path) => absolutize(&self.base_dir, &path),
            None => absolutize(&self.base_dir, Path::new(&raw)),
        };

        tracing::debug!("Resolved {} = '{}' -> {}", key, raw, resolved.display());
        Ok(ConfigNode::Text(resolved.to_string_lossy().into_owned()))
    }
}

/// Make all `*_path` values of `tree` absolute to `base_dir`.
pub fn make_paths_absolute(base_dir: &Path, tree: ConfigMap) -> Result<ConfigMap> {
    PathResolver::new(base_dir).resolve(tree)
}
