//! Deep merge of configuration trees

use crate::tree::{ConfigMap, ConfigNode};

/// Merge `other` into `base`.
///
/// Mappings present on both sides are merged key by key. Everything else,
/// sequences included, is replaced wholesale by the value from `other`.
pub fn deep_merge(mut base: ConfigMap, other: ConfigMap) -> ConfigMap {
    for (key, incoming) in other {
        match (base.get_mut(&key), incoming) {
            (Some(ConfigNode::Mapping(existing)), ConfigNode::Mapping(incoming)) => {
                let merged = deep_merge(std::mem::take(existing), incoming);
                *existing = merged;
            }
            (_, incoming) => {
                base.insert(key, incoming);
            }
        }
    }
    base
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::testing::map_strategy;
    use proptest::prelude::*;
    use similar_asserts::assert_eq;

    fn tree(json: &str) -> ConfigMap {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn nested_mappings_merge_and_scalars_are_replaced() {
        let base = tree(r#"{"foo": 1, "only": "base", "nested": {"overwrite": true, "inner_only_base": 28}}"#);
        let other = tree(r#"{"foo": "bar", "nested": {"overwrite": false}}"#);

        assert_eq!(
            deep_merge(base, other),
            tree(r#"{"foo": "bar", "only": "base", "nested": {"overwrite": false, "inner_only_base": 28}}"#)
        );
    }

    #[test]
    fn sequences_are_replaced_not_concatenated() {
        let out = deep_merge(tree(r#"{"hosts": ["a", "b"]}"#), tree(r#"{"hosts": ["c"]}"#));
        assert_eq!(out, tree(r#"{"hosts": ["c"]}"#));
    }

    #[test]
    fn mapping_and_scalar_replace_each_other() {
        let out = deep_merge(tree(r#"{"a": {"x": 1}, "b": 2}"#), tree(r#"{"a": 0, "b": {"y": 3}}"#));
        assert_eq!(out, tree(r#"{"a": 0, "b": {"y": 3}}"#));
    }

    #[test]
    fn incoming_null_wins() {
        let out = deep_merge(tree(r#"{"a": {"x": 1}}"#), tree(r#"{"a": null}"#));
        assert_eq!(out, tree(r#"{"a": null}"#));
    }

    proptest! {
        #[test]
        fn merge_with_itself_is_identity(a in map_strategy()) {
            prop_assert_eq!(deep_merge(a.clone(), a.clone()), a);
        }

        #[test]
        fn disjoint_merge_is_union(a in map_strategy(), b in map_strategy()) {
            let b: ConfigMap = b.into_iter().filter(|(key, _)| !a.contains_key(key)).collect();
            let mut union = a.clone();
            union.extend(b.clone());
            prop_assert_eq!(deep_merge(a, b), union);
        }
    }
}
