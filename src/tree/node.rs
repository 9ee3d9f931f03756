//! Configuration tree values

use indexmap::IndexMap;
use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{Serialize, Serializer};
use std::fmt;

/// Mapping level of a configuration tree.
///
/// Keys keep insertion order for display; equality ignores order.
pub type ConfigMap = IndexMap<String, ConfigNode>;

/// One value of a parsed configuration file.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ConfigNode {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Sequence(Vec<ConfigNode>),
    Mapping(ConfigMap),
}

impl ConfigNode {
    /// Short type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Sequence(_) => "sequence",
            Self::Mapping(_) => "mapping",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&ConfigMap> {
        match self {
            Self::Mapping(map) => Some(map),
            _ => None,
        }
    }

    pub fn is_mapping(&self) -> bool {
        matches!(self, Self::Mapping(_))
    }

    /// Look up a key when this node is a mapping.
    pub fn get(&self, key: &str) -> Option<&ConfigNode> {
        self.as_mapping().and_then(|map| map.get(key))
    }

    /// Parse JSON text into a tree.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

impl From<&str> for ConfigNode {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ConfigNode {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for ConfigNode {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ConfigNode {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for ConfigNode {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<Vec<ConfigNode>> for ConfigNode {
    fn from(value: Vec<ConfigNode>) -> Self {
        Self::Sequence(value)
    }
}

impl From<ConfigMap> for ConfigNode {
    fn from(value: ConfigMap) -> Self {
        Self::Mapping(value)
    }
}

impl Serialize for ConfigNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(value) => serializer.serialize_bool(*value),
            Self::Integer(value) => serializer.serialize_i64(*value),
            Self::Float(value) => serializer.serialize_f64(*value),
            Self::Text(value) => serializer.serialize_str(value),
            Self::Sequence(items) => items.serialize(serializer),
            Self::Mapping(map) => map.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for ConfigNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(NodeVisitor)
    }
}

struct NodeVisitor;

impl<'de> Visitor<'de> for NodeVisitor {
    type Value = ConfigNode;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a configuration value")
    }

    fn visit_bool<E>(self, value: bool) -> Result<ConfigNode, E> {
        Ok(ConfigNode::Bool(value))
    }

    fn visit_i64<E>(self, value: i64) -> Result<ConfigNode, E> {
        Ok(ConfigNode::Integer(value))
    }

    fn visit_u64<E>(self, value: u64) -> Result<ConfigNode, E> {
        // Integers beyond i64 become floats.
        Ok(i64::try_from(value).map(ConfigNode::Integer).unwrap_or(ConfigNode::Float(value as f64)))
    }

    fn visit_f64<E>(self, value: f64) -> Result<ConfigNode, E> {
        Ok(ConfigNode::Float(value))
    }

    fn visit_str<E>(self, value: &str) -> Result<ConfigNode, E> {
        Ok(ConfigNode::Text(value.to_string()))
    }

    fn visit_string<E>(self, value: String) -> Result<ConfigNode, E> {
        Ok(ConfigNode::Text(value))
    }

    fn visit_unit<E>(self) -> Result<ConfigNode, E> {
        Ok(ConfigNode::Null)
    }

    fn visit_none<E>(self) -> Result<ConfigNode, E> {
        Ok(ConfigNode::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<ConfigNode, D::Error> {
        ConfigNode::deserialize(deserializer)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<ConfigNode, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(ConfigNode::Sequence(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<ConfigNode, A::Error> {
        let mut map = ConfigMap::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((MapKey(key), value)) = access.next_entry::<MapKey, ConfigNode>()? {
            map.insert(key, value);
        }
        Ok(ConfigNode::Mapping(map))
    }
}

/// Mapping key coerced to text. Scalar keys (`1: x`, `true: y` in YAML) keep
/// their textual form; container keys are rejected.
struct MapKey(String);

impl<'de> Deserialize<'de> for MapKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(KeyVisitor)
    }
}

struct KeyVisitor;

impl<'de> Visitor<'de> for KeyVisitor {
    type Value = MapKey;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a scalar mapping key")
    }

    fn visit_bool<E>(self, value: bool) -> Result<MapKey, E> {
        Ok(MapKey(value.to_string()))
    }

    fn visit_i64<E>(self, value: i64) -> Result<MapKey, E> {
        Ok(MapKey(value.to_string()))
    }

    fn visit_u64<E>(self, value: u64) -> Result<MapKey, E> {
        Ok(MapKey(value.to_string()))
    }

    fn visit_f64<E>(self, value: f64) -> Result<MapKey, E> {
        Ok(MapKey(value.to_string()))
    }

    fn visit_str<E>(self, value: &str) -> Result<MapKey, E> {
        Ok(MapKey(value.to_string()))
    }

    fn visit_string<E>(self, value: String) -> Result<MapKey, E> {
        Ok(MapKey(value))
    }

    fn visit_unit<E>(self) -> Result<MapKey, E> {
        Ok(MapKey("null".to_string()))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, _seq: A) -> Result<MapKey, A::Error> {
        Err(de::Error::custom("sequences cannot be used as mapping keys"))
    }

    fn visit_map<A: MapAccess<'de>>(self, _map: A) -> Result<MapKey, A::Error> {
        Err(de::Error::custom("mappings cannot be used as mapping keys"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_preserves_key_order_and_types() {
        let node: ConfigNode =
            serde_yaml::from_str("zeta: 1\nalpha: 2.5\nmid: [true, null, text]\n").unwrap();
        let map = node.as_mapping().unwrap();
        let keys: Vec<&str> = map.keys().map(String::as_str).collect();
        assert_eq!(keys, ["zeta", "alpha", "mid"]);
        assert_eq!(map["zeta"], ConfigNode::Integer(1));
        assert_eq!(map["alpha"], ConfigNode::Float(2.5));
        assert_eq!(
            map["mid"],
            ConfigNode::Sequence(vec![ConfigNode::Bool(true), ConfigNode::Null, "text".into()])
        );
    }

    #[test]
    fn scalar_yaml_keys_become_text() {
        let node: ConfigNode = serde_yaml::from_str("1: one\ntrue: yes\n").unwrap();
        assert_eq!(node.get("1"), Some(&ConfigNode::from("one")));
        assert_eq!(node.get("true"), Some(&ConfigNode::from("yes")));
    }

    #[test]
    fn complex_yaml_keys_are_rejected() {
        let result: Result<ConfigNode, _> = serde_yaml::from_str("? [a, b]\n: value\n");
        assert!(result.is_err());
    }

    #[test]
    fn mapping_equality_ignores_order() {
        let a = ConfigNode::from_json(r#"{"a": 1, "b": 2}"#).unwrap();
        let b = ConfigNode::from_json(r#"{"b": 2, "a": 1}"#).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn json_round_trip_keeps_order() {
        let text = r#"{"b":[1,2],"a":{"y":null,"x":"s"}}"#;
        let node = ConfigNode::from_json(text).unwrap();
        assert_eq!(serde_json::to_string(&node).unwrap(), text);
    }
}
