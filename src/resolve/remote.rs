//! Materialize `*_load_url` descriptors
//!
//! ```yaml
//! weights_load_url:
//!   source_url: https://example.com/weights.bin
//!   sink_path: weights.bin        # absolutized by the path pass
//!   policy: load_if_missing       # optional, or load_always
//! ```

use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::fetch::{Dispatcher, FetchOutcome, FetchPolicy, RemoteDescriptor};
use crate::tree::{ConfigMap, ConfigNode, Walker};

pub const REMOTE_SUFFIX: &str = "_load_url";

/// Build a descriptor from the value of a `*_load_url` entry.
///
/// Returns [`Error::MissingDownloadInfo`] when `source_url` or `sink_path` is
/// absent or not text, and [`Error::InvalidDescriptor`] for an unknown policy.
pub fn parse_descriptor(key: &str, value: &ConfigNode) -> Result<RemoteDescriptor> {
    let missing = || Error::MissingDownloadInfo { key: key.to_string() };

    let source_url = value.get("source_url").and_then(ConfigNode::as_str).ok_or_else(missing)?;
    let sink_path = value.get("sink_path").and_then(ConfigNode::as_str).ok_or_else(missing)?;

    let policy = match value.get("policy") {
        None | Some(ConfigNode::Null) => FetchPolicy::default(),
        Some(ConfigNode::Text(text)) => text.parse::<FetchPolicy>().map_err(|reason| Error::InvalidDescriptor {
            url: source_url.to_string(),
            reason,
        })?,
        Some(other) => {
            return Err(Error::InvalidDescriptor {
                url: source_url.to_string(),
                reason: format!("policy must be text, got {}", other.type_name()),
            })
        }
    };

    Ok(RemoteDescriptor::new(source_url, PathBuf::from(sink_path)).with_policy(policy))
}

/// Fetch every well-formed `*_load_url` descriptor in `tree`.
///
/// Malformed descriptors are logged and skipped; dispatch errors (unknown
/// protocol, invalid URL, failed transfer) abort.
pub fn materialize(tree: &ConfigMap, dispatcher: &Dispatcher) -> Result<Vec<(String, FetchOutcome)>> {
    let mut outcomes = Vec::new();
    Walker::new(REMOTE_SUFFIX).visit_map(tree, &mut |key, value| {
        let descriptor = match parse_descriptor(key, value) {
            Ok(descriptor) => descriptor,
            Err(e) => {
                tracing::warn!("{}; skipping", e);
                return Ok(());
            }
        };
        tracing::debug!(
            "Materializing {}: {} -> {} ({})",
            key,
            descriptor.source_url,
            descriptor.sink_path.display(),
            descriptor.policy.as_str()
        );
        let outcome = dispatcher.fetch(&descriptor)?;
        outcomes.push((key.to_string(), outcome));
        Ok(())
    })?;
    Ok(outcomes)
}
