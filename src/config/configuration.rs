//! The loaded, post-processed configuration

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::merge::deep_merge;
use crate::env::{apply_overlay, EnvMappingEntry, EnvSource};
use crate::error::{Error, Result};
use crate::fetch::Dispatcher;
use crate::resolve::{bind_modules, materialize, FileModuleLoader, ModuleHandle, ModuleLoader, ModuleTable};
use crate::tree::{ConfigMap, ConfigNode};
use crate::utils::absolutize;

/// Where a configuration came from and how it was loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Metadata {
    filepath: PathBuf,
    parse_datetime: DateTime<Utc>,
    load_remote: bool,
}

impl Metadata {
    /// Metadata stamped with the current time. A relative `filepath` is made
    /// absolute against the working directory.
    pub fn new(filepath: impl AsRef<Path>, load_remote: bool) -> Result<Self> {
        Self::at(filepath, Utc::now(), load_remote)
    }

    /// Fails only when `filepath` is relative and the working directory
    /// cannot be read.
    pub fn at(filepath: impl AsRef<Path>, parse_datetime: DateTime<Utc>, load_remote: bool) -> Result<Self> {
        let filepath = filepath.as_ref();
        let filepath = if filepath.is_absolute() {
            absolutize(filepath, filepath)
        } else {
            let cwd = std::env::current_dir().map_err(|e| Error::io(filepath, e))?;
            absolutize(&cwd, filepath)
        };
        Ok(Self { filepath, parse_datetime, load_remote })
    }

    pub fn filepath(&self) -> &Path {
        &self.filepath
    }

    pub fn parse_datetime(&self) -> DateTime<Utc> {
        self.parse_datetime
    }

    pub fn load_remote(&self) -> bool {
        self.load_remote
    }
}

/// The side effects run while constructing a [`Configuration`].
#[derive(Clone)]
pub struct Pipeline {
    module_loader: Arc<dyn ModuleLoader>,
    dispatcher: Dispatcher,
}

impl Pipeline {
    pub fn new(module_loader: Arc<dyn ModuleLoader>, dispatcher: Dispatcher) -> Self {
        Self { module_loader, dispatcher }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(Arc::new(FileModuleLoader), Dispatcher::with_defaults())
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline").field("dispatcher", &self.dispatcher).finish_non_exhaustive()
    }
}

/// A read-mostly configuration: the tree, its metadata and bound modules.
///
/// Two configurations are equal when their trees are equal; metadata and
/// modules do not take part.
#[derive(Debug, Clone)]
pub struct Configuration {
    tree: ConfigMap,
    meta: Metadata,
    modules: ModuleTable,
    pipeline: Pipeline,
}

impl Configuration {
    /// Wrap `tree` using the default module loader and protocol handlers.
    pub fn new(tree: ConfigMap, meta: Metadata) -> Result<Self> {
        Self::with_pipeline(tree, meta, Pipeline::default())
    }

    /// Wrap `tree`, binding `*_module_path` entries and, when
    /// `meta.load_remote()` is set, materializing `*_load_url` entries.
    pub fn with_pipeline(tree: ConfigMap, meta: Metadata, pipeline: Pipeline) -> Result<Self> {
        let modules = bind_modules(&tree, pipeline.module_loader.as_ref())?;
        if meta.load_remote {
            let outcomes = materialize(&tree, &pipeline.dispatcher)?;
            tracing::debug!("Materialized {} remote resource(s)", outcomes.len());
        }
        Ok(Self { tree, meta, modules, pipeline })
    }

    pub fn get(&self, key: &str) -> Result<&ConfigNode> {
        self.tree.get(key).ok_or_else(|| Error::KeyNotFound { key: key.to_string() })
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.tree.contains_key(key)
    }

    /// Top-level keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.tree.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigNode)> {
        self.tree.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    pub fn meta(&self) -> &Metadata {
        &self.meta
    }

    pub fn modules(&self) -> &ModuleTable {
        &self.modules
    }

    pub fn module(&self, name: &str) -> Option<&ModuleHandle> {
        self.modules.get(name)
    }

    pub fn as_map(&self) -> &ConfigMap {
        &self.tree
    }

    /// Overwrite one top-level key.
    ///
    /// Discouraged: configurations are meant to be read-only after loading. To
    /// change a nested value, take the enclosing mapping, edit it and set it
    /// back. No post-processing pass runs on `value`.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<ConfigNode>) -> &mut Self {
        self.tree.insert(key.into(), value.into());
        self
    }

    /// Unwrap the tree, dropping metadata and modules.
    pub fn to_dict(self) -> ConfigMap {
        self.tree
    }

    /// Deep-merge `other` on top of this configuration.
    ///
    /// The result carries `other`'s metadata and is constructed again, so its
    /// modules are rebound and, if `other` loads remotes, remotes fetched.
    pub fn merge(&self, other: &Configuration) -> Result<Configuration> {
        let tree = deep_merge(self.tree.clone(), other.tree.clone());
        Self::with_pipeline(tree, other.meta.clone(), other.pipeline.clone())
    }

    /// Apply explicit environment overlays, keeping this configuration's
    /// metadata.
    pub fn apply_env(&self, entries: &[EnvMappingEntry], env: &dyn EnvSource) -> Result<Configuration> {
        let tree = apply_overlay(&self.tree, entries, env)?;
        Self::with_pipeline(tree, self.meta.clone(), self.pipeline.clone())
    }

    /// Pretty JSON rendering indented by `indent` spaces, optionally preceded
    /// by a metadata header.
    pub fn pformat(&self, indent: usize, meta: bool) -> serde_json::Result<String> {
        let values = pretty_json(&self.tree, indent)?;
        if !meta {
            return Ok(values);
        }
        Ok(format!("{}\n{}", self.meta_header(), values))
    }

    /// Source and parse time, as printed by [`Configuration::pformat`].
    pub fn meta_header(&self) -> String {
        format!(
            "Configuration:\nMeta:\n\tSource: {}\n\tParsed at: {}\nValues:",
            self.meta.filepath.display(),
            self.meta.parse_datetime.to_rfc3339()
        )
    }
}

/// Pretty JSON with `indent` spaces per level.
pub fn pretty_json<T: Serialize + ?Sized>(value: &T, indent: usize) -> serde_json::Result<String> {
    let pad = " ".repeat(indent);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(pad.as_bytes());
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

impl PartialEq for Configuration {
    fn eq(&self, other: &Self) -> bool {
        self.tree == other.tree
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Configuration({})", self.meta.filepath.display())
    }
}

impl<'a> IntoIterator for &'a Configuration {
    type Item = (&'a String, &'a ConfigNode);
    type IntoIter = indexmap::map::Iter<'a, String, ConfigNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.tree.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::ProtocolHandler;
    use std::collections::HashMap;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn tree(json: &str) -> ConfigMap {
        serde_json::from_str(json).unwrap()
    }

    struct StubLoader;

    impl ModuleLoader for StubLoader {
        fn load(&self, name: &str, path: &Path) -> Result<ModuleHandle> {
            Ok(ModuleHandle::new(name, path, name.as_bytes().to_vec()))
        }
    }

    #[derive(Default)]
    struct CountingHandler {
        calls: AtomicUsize,
    }

    impl ProtocolHandler for CountingHandler {
        fn fetch(&self, _source_url: &str, sink: &mut dyn Write) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            sink.write_all(b"payload").map_err(|e| Error::io("mem", e))
        }
    }

    fn pipeline(handler: Arc<CountingHandler>) -> Pipeline {
        Pipeline::new(Arc::new(StubLoader), Dispatcher::new().register("mem://", handler))
    }

    fn configuration(json: &str) -> Configuration {
        let meta = Metadata::new("/etc/app/config.yaml", false).unwrap();
        Configuration::with_pipeline(tree(json), meta, pipeline(Arc::default())).unwrap()
    }

    #[test]
    fn map_surface() {
        let cfg = configuration(r#"{"b": 1, "a": {"x": true}}"#);
        assert_eq!(cfg.len(), 2);
        assert!(!cfg.is_empty());
        assert_eq!(cfg.keys().collect::<Vec<_>>(), ["b", "a"]);
        assert_eq!(cfg.get("b").unwrap(), &ConfigNode::Integer(1));
        assert!(cfg.contains_key("a"));
        assert!(matches!(cfg.get("zzz"), Err(Error::KeyNotFound { ref key }) if key == "zzz"));
        assert_eq!((&cfg).into_iter().count(), 2);
    }

    #[test]
    fn equality_ignores_metadata() {
        let a = configuration(r#"{"a": 1}"#);
        let b = Configuration::with_pipeline(
            tree(r#"{"a": 1}"#),
            Metadata::new("/somewhere/else.json", false).unwrap(),
            pipeline(Arc::default()),
        )
        .unwrap();
        assert_eq!(a, b);
        assert_ne!(a.meta(), b.meta());
    }

    #[test]
    fn set_overwrites_one_key() {
        let mut cfg = configuration(r#"{"a": {"x": 1}}"#);
        cfg.set("a", 2_i64).set("b", "new");
        assert_eq!(cfg.to_dict(), tree(r#"{"a": 2, "b": "new"}"#));
    }

    #[test]
    fn display_names_the_source() {
        let cfg = configuration("{}");
        assert_eq!(cfg.to_string(), format!("Configuration({})", Path::new("/etc/app/config.yaml").display()));
    }

    #[test]
    fn relative_metadata_path_is_absolutized() {
        let meta = Metadata::new("config.yaml", true).unwrap();
        assert!(meta.filepath().is_absolute());
        assert!(meta.load_remote());
    }

    #[test]
    fn absolute_metadata_path_is_kept() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.yaml");
        let meta = Metadata::new(&path, false).unwrap();
        assert_eq!(meta.filepath(), path);
    }

    #[test]
    fn modules_are_bound_on_construction() {
        let cfg = configuration(r#"{"transform_module_path": "/m/transform.py", "nested": {"x_module_path": "/m/x"}}"#);
        assert_eq!(cfg.modules().len(), 2);
        assert_eq!(cfg.module("transform").unwrap().source(), b"transform");
        assert!(cfg.module("missing").is_none());
    }

    #[test]
    fn remotes_load_only_when_enabled() {
        let tmp = TempDir::new().unwrap();
        let sink = tmp.path().join("data.bin");
        let json = format!(
            r#"{{"data_load_url": {{"source_url": "mem://data", "sink_path": "{}"}}}}"#,
            sink.display()
        );

        let handler = Arc::new(CountingHandler::default());
        let meta = Metadata::new("c.json", false).unwrap();
        Configuration::with_pipeline(tree(&json), meta, pipeline(Arc::clone(&handler))).unwrap();
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
        assert!(!sink.exists());

        let meta = Metadata::new("c.json", true).unwrap();
        Configuration::with_pipeline(tree(&json), meta, pipeline(Arc::clone(&handler))).unwrap();
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
        assert_eq!(std::fs::read(&sink).unwrap(), b"payload");
    }

    #[test]
    fn module_failure_prevents_any_fetch() {
        let tmp = TempDir::new().unwrap();
        let sink = tmp.path().join("data.bin");
        let json = format!(
            r#"{{"data_load_url": {{"source_url": "mem://data", "sink_path": "{}"}}, "a_module_path": "{}"}}"#,
            sink.display(),
            tmp.path().join("missing.py").display()
        );

        let handler = Arc::new(CountingHandler::default());
        let pipeline = Pipeline::new(
            Arc::new(FileModuleLoader),
            Dispatcher::new().register("mem://", Arc::clone(&handler) as Arc<dyn ProtocolHandler>),
        );
        let meta = Metadata::new("c.json", true).unwrap();
        let err = Configuration::with_pipeline(tree(&json), meta, pipeline).unwrap_err();

        assert!(matches!(err, Error::ModuleLoad { .. }), "{err:?}");
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
        assert!(!sink.exists());
    }

    #[test]
    fn merge_carries_incoming_metadata() {
        let base = configuration(r#"{"foo": 1, "only": "base", "nested": {"overwrite": true, "inner_only_base": 28}}"#);
        let other = Configuration::with_pipeline(
            tree(r#"{"foo": "bar", "nested": {"overwrite": false}}"#),
            Metadata::new("/etc/app/override.yaml", false).unwrap(),
            pipeline(Arc::default()),
        )
        .unwrap();

        let merged = base.merge(&other).unwrap();
        assert_eq!(
            merged.as_map(),
            &tree(r#"{"foo": "bar", "only": "base", "nested": {"overwrite": false, "inner_only_base": 28}}"#)
        );
        assert_eq!(merged.meta(), other.meta());
    }

    #[test]
    fn apply_env_keeps_own_metadata() {
        let cfg = configuration(r#"{"AWS": {"REGION": "us-east-1"}}"#);
        let env: HashMap<String, String> = [("AWS_REGION".to_string(), "eu-central-1".to_string())].into();
        let entries = vec![EnvMappingEntry::new("AWS_REGION", &["AWS", "REGION"], "str")];

        let derived = cfg.apply_env(&entries, &env).unwrap();
        assert_eq!(derived.as_map(), &tree(r#"{"AWS": {"REGION": "eu-central-1"}}"#));
        assert_eq!(derived.meta(), cfg.meta());
        assert_eq!(cfg.as_map(), &tree(r#"{"AWS": {"REGION": "us-east-1"}}"#));
    }

    #[test]
    fn apply_env_without_set_variables_is_equal() {
        let cfg = configuration(r#"{"a": 1}"#);
        let entries = vec![EnvMappingEntry::new("CFG_LOAD_SURELY_UNSET", &["a"], "int")];
        assert_eq!(cfg.apply_env(&entries, &HashMap::<String, String>::new()).unwrap(), cfg);
    }

    #[test]
    fn pformat_respects_indent_and_meta() {
        let cfg = configuration(r#"{"a": {"b": 1}}"#);
        assert_eq!(cfg.pformat(2, false).unwrap(), "{\n  \"a\": {\n    \"b\": 1\n  }\n}");

        let with_meta = cfg.pformat(4, true).unwrap();
        assert!(with_meta.starts_with("Configuration:\nMeta:\n\tSource: "));
        assert!(with_meta.contains("\tParsed at: "));
        assert!(with_meta.ends_with("{\n    \"a\": {\n        \"b\": 1\n    }\n}"));
    }
}
