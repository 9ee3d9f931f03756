//! Configuration tree model and traversal

pub mod node;
pub mod walker;

pub use node::{ConfigMap, ConfigNode};
pub use walker::Walker;

#[cfg(test)]
pub(crate) mod testing {
    use super::{ConfigMap, ConfigNode};
    use proptest::prelude::*;

    fn key_strategy() -> impl Strategy<Value = String> {
        prop_oneof!["[a-d]{1,3}", "[a-d]{1,2}_path", "_[a-d]{0,2}", "_[a-d]{1,2}_path"]
    }

    fn leaf_strategy() -> impl Strategy<Value = ConfigNode> {
        prop_oneof![
            Just(ConfigNode::Null),
            any::<bool>().prop_map(ConfigNode::Bool),
            any::<i64>().prop_map(ConfigNode::Integer),
            "[a-z/.]{0,8}".prop_map(ConfigNode::Text),
        ]
    }

    /// Arbitrary trees without floats, so equality is reflexive.
    pub(crate) fn node_strategy() -> impl Strategy<Value = ConfigNode> {
        leaf_strategy().prop_recursive(4, 48, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(ConfigNode::Sequence),
                prop::collection::vec((key_strategy(), inner), 0..4)
                    .prop_map(|entries| ConfigNode::Mapping(entries.into_iter().collect())),
            ]
        })
    }

    pub(crate) fn map_strategy() -> impl Strategy<Value = ConfigMap> {
        prop::collection::vec((key_strategy(), node_strategy()), 0..6)
            .prop_map(|entries| entries.into_iter().collect())
    }
}
