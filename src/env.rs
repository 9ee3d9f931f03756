//! Environment variable overlays
//!
//! Two independent strategies:
//! - [`load_env`]: implicit, top-level only. A variable overrides a top-level
//!   key of the same name; the existing value's type decides how the string is
//!   read.
//! - [`apply_overlay`]: explicit. Each [`EnvMappingEntry`] names a variable, a
//!   key path and a [`Converter`].

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::tree::{ConfigMap, ConfigNode};

/// Where environment variables come from.
pub trait EnvSource: Send + Sync {
    fn var(&self, name: &str) -> Option<String>;

    /// All variables with valid UTF-8 names and values.
    fn vars(&self) -> Vec<(String, String)>;
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }

    fn vars(&self) -> Vec<(String, String)> {
        std::env::vars_os()
            .filter_map(|(name, value)| Some((name.into_string().ok()?, value.into_string().ok()?)))
            .collect()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }

    fn vars(&self) -> Vec<(String, String)> {
        self.iter().map(|(name, value)| (name.clone(), value.clone())).collect()
    }
}

/// Overlay environment variables onto matching top-level keys.
///
/// Variables starting with `_` are ignored and no key is ever created. Text
/// values are replaced verbatim; sequences, mappings, numbers and booleans are
/// replaced by the variable parsed as JSON. Anything else (null) falls back to
/// the raw string with a warning.
pub fn load_env(mut tree: ConfigMap, env: &dyn EnvSource) -> Result<ConfigMap> {
    for (name, raw) in env.vars() {
        if name.starts_with('_') {
            continue;
        }
        let Some(current) = tree.get_mut(&name) else {
            continue;
        };

        let replacement = match &*current {
            ConfigNode::Text(_) => ConfigNode::Text(raw),
            ConfigNode::Sequence(_)
            | ConfigNode::Mapping(_)
            | ConfigNode::Integer(_)
            | ConfigNode::Float(_)
            | ConfigNode::Bool(_) => Converter::Json.convert(&name, &raw)?,
            other => {
                tracing::warn!(
                    "Configuration value of '{}' was of type {}, but is overwritten with a string from the environment",
                    name,
                    other.type_name()
                );
                ConfigNode::Text(raw)
            }
        };
        tracing::debug!("Environment overrides '{}'", name);
        *current = replacement;
    }
    Ok(tree)
}

/// Named string-to-value conversions for explicit overlays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Converter {
    /// `str`: the string as is.
    Str,
    /// `str2str_or_none`: null for `none`, `null`, `undefined`, `unknown`
    /// and the empty string, otherwise the string.
    StrOrNone,
    /// `bool`
    Bool,
    /// `int`
    Int,
    /// `float`
    Float,
    /// `json`
    Json,
}

const TRUE_WORDS: &[&str] = &["true", "t", "1", "y", "yes", "enabled", "enable", "on"];
const FALSE_WORDS: &[&str] = &["false", "f", "0", "n", "no", "disabled", "disable", "off"];
const NONE_WORDS: &[&str] = &["none", "undefined", "unknown", "null", ""];

impl Converter {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Str => "str",
            Self::StrOrNone => "str2str_or_none",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Json => "json",
        }
    }

    /// Convert the value of variable `env_name`.
    pub fn convert(&self, env_name: &str, raw: &str) -> Result<ConfigNode> {
        let fail = |reason: String| Error::Conversion {
            name: env_name.to_string(),
            converter: self.name().to_string(),
            reason,
        };

        match self {
            Self::Str => Ok(ConfigNode::from(raw)),
            Self::StrOrNone => {
                if NONE_WORDS.contains(&raw.to_lowercase().as_str()) {
                    Ok(ConfigNode::Null)
                } else {
                    Ok(ConfigNode::from(raw))
                }
            }
            Self::Bool => {
                let lower = raw.to_lowercase();
                if TRUE_WORDS.contains(&lower.as_str()) {
                    Ok(ConfigNode::Bool(true))
                } else if FALSE_WORDS.contains(&lower.as_str()) {
                    Ok(ConfigNode::Bool(false))
                } else {
                    Err(fail(format!("'{raw}' is not a boolean")))
                }
            }
            Self::Int => raw.trim().parse::<i64>().map(ConfigNode::Integer).map_err(|e| fail(e.to_string())),
            Self::Float => raw.trim().parse::<f64>().map(ConfigNode::Float).map_err(|e| fail(e.to_string())),
            Self::Json => ConfigNode::from_json(raw).map_err(|e| fail(e.to_string())),
        }
    }
}

impl FromStr for Converter {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        match name {
            "str" => Ok(Self::Str),
            "str2str_or_none" => Ok(Self::StrOrNone),
            "bool" => Ok(Self::Bool),
            "int" => Ok(Self::Int),
            "float" => Ok(Self::Float),
            "json" => Ok(Self::Json),
            other => Err(Error::UnknownConverter { name: other.to_string() }),
        }
    }
}

impl fmt::Display for Converter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One explicit overlay rule.
///
/// ```yaml
/// - env_name: AWS_REGION
///   keys: [AWS, REGION]
///   converter: str
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvMappingEntry {
    pub env_name: String,
    pub keys: Vec<String>,
    pub converter: String,
}

impl EnvMappingEntry {
    pub fn new(env_name: impl Into<String>, keys: &[&str], converter: impl Into<String>) -> Self {
        Self {
            env_name: env_name.into(),
            keys: keys.iter().map(|key| key.to_string()).collect(),
            converter: converter.into(),
        }
    }
}

/// Apply `entries` to a copy of `tree`.
///
/// Entries whose variable is unset are skipped before their converter is
/// looked up. Intermediate mappings along a key path are created as needed.
pub fn apply_overlay(tree: &ConfigMap, entries: &[EnvMappingEntry], env: &dyn EnvSource) -> Result<ConfigMap> {
    let mut out = tree.clone();
    for entry in entries {
        let Some(raw) = env.var(&entry.env_name) else {
            continue;
        };
        let converter: Converter = entry.converter.parse()?;
        let value = converter.convert(&entry.env_name, &raw)?;
        tracing::debug!("Environment '{}' sets {}", entry.env_name, entry.keys.join("."));
        set_at_path(&mut out, &entry.env_name, &entry.keys, value)?;
    }
    Ok(out)
}

fn set_at_path(root: &mut ConfigMap, env_name: &str, keys: &[String], value: ConfigNode) -> Result<()> {
    let Some((last, parents)) = keys.split_last() else {
        return Err(Error::InvalidEnvMapping {
            env_name: env_name.to_string(),
            reason: "empty key path".to_string(),
        });
    };

    let mut cursor = root;
    for key in parents {
        let slot = cursor.entry(key.clone()).or_insert_with(|| ConfigNode::Mapping(ConfigMap::new()));
        cursor = match slot {
            ConfigNode::Mapping(map) => map,
            other => {
                return Err(Error::TypeConflict {
                    key: key.clone(),
                    expected: "mapping",
                    found: other.type_name(),
                })
            }
        };
    }
    cursor.insert(last.clone(), value);
    Ok(())
}
