//! Suffix-driven tree traversal
//!
//! Each post-processing pass is the same walk parameterized by a reserved key
//! suffix (`_path`, `_module_path`, `_load_url`). Keys starting with `_` are
//! skipped together with everything below them.

use super::{ConfigMap, ConfigNode};
use crate::error::Result;

#[derive(Debug, Clone, Copy)]
pub struct Walker<'a> {
    suffix: &'a str,
}

impl<'a> Walker<'a> {
    pub const fn new(suffix: &'a str) -> Self {
        Self { suffix }
    }

    pub fn suffix(&self) -> &'a str {
        self.suffix
    }

    /// Whether `key` triggers the handler for this walker.
    pub fn matches(&self, key: &str) -> bool {
        !key.starts_with('_') && key.ends_with(self.suffix)
    }

    /// Rebuild `node`, replacing every matched value by the handler's result.
    ///
    /// The replacement is itself walked, so a handler may return a mapping
    /// that contains further matches.
    pub fn transform<F>(&self, node: ConfigNode, handler: &mut F) -> Result<ConfigNode>
    where
        F: FnMut(&str, ConfigNode) -> Result<ConfigNode>,
    {
        match node {
            ConfigNode::Mapping(map) => self.transform_map(map, handler).map(ConfigNode::Mapping),
            ConfigNode::Sequence(items) => items
                .into_iter()
                .map(|item| self.transform(item, handler))
                .collect::<Result<Vec<_>>>()
                .map(ConfigNode::Sequence),
            leaf => Ok(leaf),
        }
    }

    /// [`Walker::transform`] for a mapping root.
    pub fn transform_map<F>(&self, map: ConfigMap, handler: &mut F) -> Result<ConfigMap>
    where
        F: FnMut(&str, ConfigNode) -> Result<ConfigNode>,
    {
        let mut out = ConfigMap::with_capacity(map.len());
        for (key, value) in map {
            if key.starts_with('_') {
                out.insert(key, value);
                continue;
            }
            let value = if key.ends_with(self.suffix) { handler(&key, value)? } else { value };
            let value = self.transform(value, handler)?;
            out.insert(key, value);
        }
        Ok(out)
    }

    /// Visit every matched entry without modifying the tree.
    pub fn visit<F>(&self, node: &ConfigNode, handler: &mut F) -> Result<()>
    where
        F: FnMut(&str, &ConfigNode) -> Result<()>,
    {
        match node {
            ConfigNode::Mapping(map) => self.visit_map(map, handler),
            ConfigNode::Sequence(items) => items.iter().try_for_each(|item| self.visit(item, handler)),
            _ => Ok(()),
        }
    }

    /// [`Walker::visit`] for a mapping root.
    pub fn visit_map<F>(&self, map: &ConfigMap, handler: &mut F) -> Result<()>
    where
        F: FnMut(&str, &ConfigNode) -> Result<()>,
    {
        for (key, value) in map {
            if key.starts_with('_') {
                continue;
            }
            if key.ends_with(self.suffix) {
                handler(key, value)?;
            }
            self.visit(value, handler)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::testing::node_strategy;
    use proptest::prelude::*;

    fn tree(json: &str) -> ConfigNode {
        ConfigNode::from_json(json).unwrap()
    }

    fn stamp(_key: &str, _value: ConfigNode) -> Result<ConfigNode> {
        Ok(ConfigNode::from("X"))
    }

    #[test]
    fn replaces_matching_keys_at_every_depth() {
        let input = tree(r#"{"a_path": "1", "inner": {"b_path": "2", "c": "3"}}"#);
        let out = Walker::new("_path").transform(input, &mut stamp).unwrap();
        assert_eq!(out, tree(r#"{"a_path": "X", "inner": {"b_path": "X", "c": "3"}}"#));
    }

    #[test]
    fn underscore_keys_shield_their_subtree() {
        let input = tree(r#"{"_path": "keep", "_inner": {"a_path": "keep"}}"#);
        let out = Walker::new("_path").transform(input.clone(), &mut stamp).unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn sequences_are_walked_positionally() {
        let input = tree(r#"[{"a_path": "1"}, "plain", [{"b_path": "2"}]]"#);
        let out = Walker::new("_path").transform(input, &mut stamp).unwrap();
        assert_eq!(out, tree(r#"[{"a_path": "X"}, "plain", [{"b_path": "X"}]]"#));
    }

    #[test]
    fn replacement_mapping_is_walked_again() {
        let input = tree(r#"{"data_path": "unused"}"#);
        let mut handler = |key: &str, _value: ConfigNode| -> Result<ConfigNode> {
            if key == "data_path" {
                Ok(tree(r#"{"nested_path": "again"}"#))
            } else {
                Ok(ConfigNode::from("X"))
            }
        };
        let out = Walker::new("_path").transform(input, &mut handler).unwrap();
        assert_eq!(out, tree(r#"{"data_path": {"nested_path": "X"}}"#));
    }

    #[test]
    fn visit_reports_matches_in_document_order() {
        let input = tree(r#"{"x_module_path": "a", "list": [{"y_module_path": "b"}], "_z_module_path": "c"}"#);
        let mut seen = Vec::new();
        Walker::new("_module_path")
            .visit(&input, &mut |key, value| {
                seen.push((key.to_string(), value.as_str().unwrap_or_default().to_string()));
                Ok(())
            })
            .unwrap();
        assert_eq!(
            seen,
            vec![("x_module_path".to_string(), "a".to_string()), ("y_module_path".to_string(), "b".to_string())]
        );
    }

    #[test]
    fn handler_errors_abort_the_walk() {
        let input = tree(r#"{"a_path": 1}"#);
        let mut failing = |key: &str, value: ConfigNode| -> Result<ConfigNode> {
            Err(crate::Error::TypeConflict {
                key: key.to_string(),
                expected: "text",
                found: value.type_name(),
            })
        };
        assert!(Walker::new("_path").transform(input, &mut failing).is_err());
    }

    fn strip_matches(node: &ConfigNode, walker: &Walker) -> ConfigNode {
        match node {
            ConfigNode::Mapping(map) => ConfigNode::Mapping(
                map.iter()
                    .filter(|(key, _)| !walker.matches(key))
                    .map(|(key, value)| {
                        let value =
                            if key.starts_with('_') { value.clone() } else { strip_matches(value, walker) };
                        (key.clone(), value)
                    })
                    .collect(),
            ),
            ConfigNode::Sequence(items) => {
                ConfigNode::Sequence(items.iter().map(|item| strip_matches(item, walker)).collect())
            }
            leaf => leaf.clone(),
        }
    }

    proptest! {
        #[test]
        fn non_matching_entries_are_untouched(input in node_strategy()) {
            let walker = Walker::new("_path");
            let out = walker.transform(input.clone(), &mut stamp).unwrap();
            prop_assert_eq!(strip_matches(&out, &walker), strip_matches(&input, &walker));
        }
    }
}
