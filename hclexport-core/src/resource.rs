//! Resource - Exported objects and their configuration values

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Address of a resource block in the generated configuration
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceAddress {
    /// Terraform resource type (e.g., "genesyscloud_routing_queue")
    pub resource_type: String,
    /// Sanitized block label
    pub label: String,
}

impl ResourceAddress {
    pub fn new(resource_type: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            label: label.into(),
        }
    }

    /// Bare traversal to the `id` attribute, as written in HCL
    pub fn id_traversal(&self) -> String {
        format!("{}.{}.id", self.resource_type, self.label)
    }

    /// Template interpolation of the `id` attribute, as written in JSON
    pub fn interpolation(&self) -> String {
        format!("${{{}}}", self.id_traversal())
    }
}

impl fmt::Display for ResourceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.resource_type, self.label)
    }
}

/// Flattened attributes of one object
pub type Attributes = BTreeMap<String, Value>;

/// Configuration value of an exported attribute
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(Attributes),
    /// Resolved reference to another exported resource's ID
    ResourceRef(ResourceAddress),
}

impl Value {
    /// Whether the value is the zero value of its type.
    ///
    /// Booleans are never zero: `false` is a meaningful setting.
    pub fn is_zero(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Bool(_) => false,
            Value::Int(n) => *n == 0,
            Value::Float(f) => *f == 0.0,
            Value::String(s) => s.is_empty(),
            Value::List(items) => items.is_empty(),
            Value::Map(map) => map.is_empty(),
            Value::ResourceRef(_) => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn type_name(&self) -> String {
        match self {
            Value::Null => "Null".to_string(),
            Value::Bool(_) => "Bool".to_string(),
            Value::Int(_) => "Int".to_string(),
            Value::Float(_) => "Float".to_string(),
            Value::String(_) => "String".to_string(),
            Value::List(_) => "List".to_string(),
            Value::Map(_) => "Map".to_string(),
            Value::ResourceRef(addr) => format!("ResourceRef({})", addr),
        }
    }

    /// Convert an API payload fragment into a configuration value
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert into a plain JSON value. References become interpolation strings.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(n) => serde_json::Value::from(*n),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Value::ResourceRef(addr) => serde_json::Value::String(addr.interpolation()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<Attributes> for Value {
    fn from(map: Attributes) -> Self {
        Value::Map(map)
    }
}

/// Metadata of one live object, as returned by a listing handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceMeta {
    /// Display name used to derive the block label
    pub name: String,
    /// Prefix prepended to the ID when reading and in state
    pub id_prefix: Option<String>,
}

impl ResourceMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id_prefix: None,
        }
    }

    pub fn with_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.id_prefix = Some(prefix.into());
        self
    }

    /// Full ID of the object as Terraform knows it
    pub fn state_id(&self, id: &str) -> String {
        match &self.id_prefix {
            Some(prefix) => format!("{}{}", prefix, id),
            None => id.to_string(),
        }
    }
}

/// External ID -> metadata, one per resource type
pub type ResourceIdMetaMap = BTreeMap<String, ResourceMeta>;

/// Metadata after a label has been assigned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledMeta {
    pub label: String,
    pub meta: ResourceMeta,
}

/// External ID -> labeled metadata, one per resource type
pub type SanitizedResourceMap = BTreeMap<String, LabeledMeta>;

/// A fully resolved resource ready to be emitted
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedResource {
    pub address: ResourceAddress,
    /// External ID including any prefix
    pub id: String,
    /// Attributes as read, before resolution
    pub raw: Attributes,
    /// Attributes after reference resolution and cleanup
    pub attributes: Attributes,
    /// Resources this one references
    pub depends_on: BTreeSet<ResourceAddress>,
    /// Top-level attributes holding JSON text, written with `jsonencode`
    pub json_encoded: BTreeSet<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn address_renders_interpolation() {
        let addr = ResourceAddress::new("genesyscloud_user", "jane_doe");
        assert_eq!(addr.to_string(), "genesyscloud_user.jane_doe");
        assert_eq!(addr.id_traversal(), "genesyscloud_user.jane_doe.id");
        assert_eq!(addr.interpolation(), "${genesyscloud_user.jane_doe.id}");
    }

    #[test]
    fn zero_values() {
        assert!(Value::Null.is_zero());
        assert!(Value::from("").is_zero());
        assert!(Value::Int(0).is_zero());
        assert!(Value::List(vec![]).is_zero());
        assert!(!Value::Bool(false).is_zero());
        assert!(!Value::from("x").is_zero());
    }

    #[test]
    fn from_json_keeps_integers_and_floats_apart() {
        let value = Value::from_json(json!({"a": 1, "b": 1.5, "c": [true, null]}));
        let Value::Map(map) = value else {
            panic!("expected map");
        };
        assert_eq!(map["a"], Value::Int(1));
        assert_eq!(map["b"], Value::Float(1.5));
        assert_eq!(map["c"], Value::List(vec![Value::Bool(true), Value::Null]));
    }

    #[test]
    fn to_json_writes_references_as_interpolations() {
        let value = Value::ResourceRef(ResourceAddress::new("t", "l"));
        assert_eq!(value.to_json(), json!("${t.l.id}"));
    }

    #[test]
    fn state_id_applies_prefix() {
        let meta = ResourceMeta::new("route").with_id_prefix("domain.com/");
        assert_eq!(meta.state_id("abc"), "domain.com/abc");
        assert_eq!(ResourceMeta::new("x").state_id("abc"), "abc");
    }
}
