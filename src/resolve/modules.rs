//! Bind `*_module_path` entries as named modules
//!
//! Binding never mutates the tree; it produces a side table keyed by the
//! suffix-stripped key (`transform_module_path` binds `transform`). What a
//! "module" is belongs to the [`ModuleLoader`] the caller installs. The default
//! [`FileModuleLoader`] only reads and fingerprints the file and never executes it.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::tree::{ConfigMap, Walker};
use crate::utils::sha256_hex;

pub const MODULE_SUFFIX: &str = "_module_path";

/// Logical module name -> bound handle.
pub type ModuleTable = BTreeMap<String, ModuleHandle>;

/// A module bound from a configuration entry.
#[derive(Clone, PartialEq, Eq)]
pub struct ModuleHandle {
    name: String,
    path: PathBuf,
    digest: String,
    source: Arc<[u8]>,
}

impl ModuleHandle {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, source: Vec<u8>) -> Self {
        let digest = sha256_hex(&source);
        Self { name: name.into(), path: path.into(), digest, source: source.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// SHA-256 of the module source, lower-case hex.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn source(&self) -> &[u8] {
        &self.source
    }
}

impl fmt::Debug for ModuleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleHandle")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("digest", &self.digest)
            .field("len", &self.source.len())
            .finish()
    }
}

/// Turns a path named by a `*_module_path` key into a module handle.
pub trait ModuleLoader: Send + Sync {
    fn load(&self, name: &str, path: &Path) -> Result<ModuleHandle>;
}

/// Reads the module file into memory and records its digest.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileModuleLoader;

impl ModuleLoader for FileModuleLoader {
    fn load(&self, name: &str, path: &Path) -> Result<ModuleHandle> {
        if !path.is_file() {
            return Err(Error::ModuleLoad {
                name: name.to_string(),
                path: path.to_path_buf(),
                reason: "no such file".to_string(),
            });
        }
        let source = std::fs::read(path).map_err(|e| Error::ModuleLoad {
            name: name.to_string(),
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(ModuleHandle::new(name, path, source))
    }
}

/// Load every `*_module_path` entry of `tree` through `loader`.
///
/// The first failing load aborts binding. A name bound twice keeps the entry
/// found last in document order.
pub fn bind_modules(tree: &ConfigMap, loader: &dyn ModuleLoader) -> Result<ModuleTable> {
    let mut table = ModuleTable::new();
    Walker::new(MODULE_SUFFIX).visit_map(tree, &mut |key, value| {
        let name = key.strip_suffix(MODULE_SUFFIX).unwrap_or(key);
        let Some(raw) = value.as_str() else {
            return Err(Error::TypeConflict {
                key: key.to_string(),
                expected: "text",
                found: value.type_name(),
            });
        };

        let handle = loader.load(name, Path::new(raw))?;
        tracing::info!("Bound module '{}' from {} ({})", name, raw, handle.digest());
        if table.insert(name.to_string(), handle).is_some() {
            tracing::warn!("Module '{}' was bound more than once; keeping {}", name, raw);
        }
        Ok(())
    })?;
    Ok(table)
}
