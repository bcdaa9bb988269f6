//! Product attribute schemas and attribute maps.
//!
//! A product declares an [`AttributeSchema`]: an ordered list of
//! [`AttributeSpec`] entries whose `type` selects an [`AttributeKind`].
//! Orders and variants carry a flat [`AttributeMap`] of string keys to string
//! values. The map is kept in canonical form (trimmed, lower-cased keys,
//! sorted) so that its serialization and [`AttributeMap::content_hash`] are
//! deterministic.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// The value type declared for one attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AttributeKind {
    /// Free text.
    String,
    /// One of a closed set of values.
    Enum {
        /// Accepted values, compared exactly after trimming.
        allowed_values: Vec<String>,
    },
    /// A decimal number with optional inclusive bounds.
    Number {
        /// Inclusive lower bound.
        #[serde(default)]
        min: Option<Decimal>,
        /// Inclusive upper bound.
        #[serde(default)]
        max: Option<Decimal>,
        /// Display unit.
        #[serde(default)]
        unit: Option<String>,
    },
    /// Yes/no.
    Boolean,
    /// A measurement such as `42` or `38 EU`.
    Measure {
        /// Display unit.
        #[serde(default)]
        unit: Option<String>,
    },
}

impl AttributeKind {
    /// Short name of the kind as used in the `type` tag.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Enum { .. } => "enum",
            Self::Number { .. } => "number",
            Self::Boolean => "boolean",
            Self::Measure { .. } => "measure",
        }
    }
}

/// One entry of a product's attribute schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeSpec {
    /// Attribute key, matched against [`AttributeMap`] keys.
    pub key: String,
    /// Human-facing title.
    pub title: String,
    /// Whether the attribute must be present.
    #[serde(default)]
    pub required: bool,
    /// Declared type.
    #[serde(flatten)]
    pub kind: AttributeKind,
}

/// A product's ordered attribute schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeSchema(Vec<AttributeSpec>);

impl AttributeSchema {
    /// Create a schema from its entries.
    #[must_use]
    pub const fn new(specs: Vec<AttributeSpec>) -> Self {
        Self(specs)
    }

    /// Iterate the entries in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &AttributeSpec> {
        self.0.iter()
    }

    /// Find the entry for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&AttributeSpec> {
        let key = canonical_key(key);
        self.0.iter().find(|spec| canonical_key(&spec.key) == key)
    }

    /// Whether the schema declares no attributes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A canonical attribute map.
///
/// Keys are trimmed and lower-cased, values are trimmed, and entries with an
/// empty value are dropped. Deserialization applies the same rules.
///
/// ```
/// use chatshop_core::AttributeMap;
///
/// let a = AttributeMap::from_pairs([(" Color ", "red"), ("size", "42")]);
/// let b = AttributeMap::from_pairs([("size", "42 "), ("color", "red")]);
/// assert_eq!(a, b);
/// assert_eq!(a.canonical_json(), r#"{"color":"red","size":"42"}"#);
/// assert_eq!(a.content_hash(), b.content_hash());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct AttributeMap(BTreeMap<String, String>);

impl AttributeMap {
    /// Create an empty map.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Build a canonical map from key/value pairs.
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut map = Self::new();
        for (k, v) in pairs {
            map.insert(k.as_ref(), v.as_ref());
        }
        map
    }

    /// Insert a pair in canonical form. Empty values are ignored.
    pub fn insert(&mut self, key: &str, value: &str) {
        let key = canonical_key(key);
        let value = value.trim();
        if key.is_empty() || value.is_empty() {
            return;
        }
        self.0.insert(key, value.to_owned());
    }

    /// Get the value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(&canonical_key(key)).map(String::as_str)
    }

    /// Whether `key` is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(&canonical_key(key))
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Stable JSON serialization (keys sorted, no whitespace).
    #[must_use]
    pub fn canonical_json(&self) -> String {
        // Serializing a BTreeMap<String, String> cannot fail
        serde_json::to_string(&self.0).unwrap_or_default()
    }

    /// Hex SHA-256 of [`Self::canonical_json`], the variant lookup key.
    #[must_use]
    pub fn content_hash(&self) -> String {
        let digest = Sha256::digest(self.canonical_json().as_bytes());
        hex::encode(digest)
    }

    /// Number of requested pairs in `self` that `other` holds with the same
    /// value.
    #[must_use]
    pub fn matching_pairs(&self, other: &Self) -> usize {
        self.0
            .iter()
            .filter(|(k, v)| other.0.get(*k) == Some(*v))
            .count()
    }
}

impl From<BTreeMap<String, String>> for AttributeMap {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self::from_pairs(map)
    }
}

impl From<AttributeMap> for BTreeMap<String, String> {
    fn from(map: AttributeMap) -> Self {
        map.0
    }
}

fn canonical_key(key: &str) -> String {
    key.trim().to_lowercase()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_normalizes() {
        let mut map = AttributeMap::new();
        map.insert("  COLOR ", " red ");
        map.insert("size", "   ");
        assert_eq!(map.get("color"), Some("red"));
        assert!(!map.contains_key("size"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_hash_is_order_independent() {
        let a = AttributeMap::from_pairs([("b", "2"), ("a", "1")]);
        let b = AttributeMap::from_pairs([("a", "1"), ("b", "2")]);
        assert_eq!(a.content_hash(), b.content_hash());
        assert_eq!(a.content_hash().len(), 64);
    }

    #[test]
    fn test_hash_differs_on_value() {
        let a = AttributeMap::from_pairs([("color", "red")]);
        let b = AttributeMap::from_pairs([("color", "black")]);
        assert_ne!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn test_matching_pairs_needs_key_and_value() {
        let requested = AttributeMap::from_pairs([("color", "red"), ("size", "42")]);
        let variant = AttributeMap::from_pairs([("color", "red"), ("size", "43")]);
        assert_eq!(requested.matching_pairs(&variant), 1);
    }

    #[test]
    fn test_deserialize_normalizes() {
        let map: AttributeMap = serde_json::from_str(r#"{"Color":" red ","Empty":""}"#).unwrap();
        assert_eq!(map.canonical_json(), r#"{"color":"red"}"#);
    }

    #[test]
    fn test_schema_deserialize_tagged_kinds() {
        let json = r#"[
            {"key":"color","title":"Color","required":true,"type":"enum","allowed_values":["red","black"]},
            {"key":"size","title":"Size","type":"number","min":"36","max":"46"},
            {"key":"gift","title":"Gift wrap","type":"boolean"}
        ]"#;
        let schema: AttributeSchema = serde_json::from_str(json).unwrap();
        let color = schema.get("Color").unwrap();
        assert!(color.required);
        assert_eq!(color.kind.name(), "enum");
        let size = schema.get("size").unwrap();
        assert!(!size.required);
        assert!(matches!(
            size.kind,
            AttributeKind::Number { min: Some(_), max: Some(_), unit: None }
        ));
        assert_eq!(schema.get("gift").unwrap().kind, AttributeKind::Boolean);
    }
}
