//! Values passed to and returned from backend operations.
//!
//! The shape of a value matters: the router merges results by kind, and
//! the access-control layer filters only map- and object-shaped items.

use std::collections::{BTreeMap, BTreeSet};

/// Attribute map of a map-shaped value or a typed object.
pub type Attributes = serde_json::Map<String, serde_json::Value>;

/// Keyword arguments of a call.
pub type Kwargs = BTreeMap<String, Value>;

/// Backend options.
pub type Options = serde_json::Map<String, serde_json::Value>;

/// A typed domain object, e.g. an `OpsiClient` host.
///
/// The type name is the object's `type` attribute; it is held separately
/// so attribute filtering can never remove it.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub type_name: String,
    pub attributes: Attributes,
}

impl Entity {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            attributes: Attributes::new(),
        }
    }

    pub fn with_attribute(
        mut self,
        name: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&serde_json::Value> {
        self.attributes.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(serde_json::Value::as_str)
    }

    /// Attributes including `type`, as a plain map.
    pub fn to_hash(&self) -> Attributes {
        let mut hash = self.attributes.clone();
        hash.insert(
            fleetgate_policy::TYPE_ATTRIBUTE.to_string(),
            serde_json::Value::String(self.type_name.clone()),
        );
        hash
    }
}

/// Call argument or result.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    None,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    List(Vec<Value>),
    /// Fixed-size sequence; merges by concatenation like a list but keeps
    /// its own kind.
    Tuple(Vec<Value>),
    Set(BTreeSet<String>),
    Map(Attributes),
    Object(Entity),
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Tuple(_) => "tuple",
            Self::Set(_) => "set",
            Self::Map(_) => "map",
            Self::Object(_) => "object",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// True for values that are falsy as call results: `None`, `false`,
    /// zero, and empty strings or collections.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::None => true,
            Self::Bool(b) => !b,
            Self::Number(n) => n.as_f64() == Some(0.0),
            Self::String(s) => s.is_empty(),
            Self::List(items) | Self::Tuple(items) => items.is_empty(),
            Self::Set(items) => items.is_empty(),
            Self::Map(map) => map.is_empty(),
            Self::Object(_) => false,
        }
    }

    /// True for map- and object-shaped values.
    pub fn is_record(&self) -> bool {
        matches!(self, Self::Map(_) | Self::Object(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_entity(&self) -> Option<&Entity> {
        match self {
            Self::Object(entity) => Some(entity),
            _ => None,
        }
    }

    /// First typed object of a single-object or sequence value.
    pub fn first_entity(&self) -> Option<&Entity> {
        match self {
            Self::Object(entity) => Some(entity),
            Self::List(items) | Self::Tuple(items) => items.first().and_then(Value::as_entity),
            _ => None,
        }
    }

    /// JSON rendering. Sets and tuples become arrays; objects become maps
    /// carrying their `type`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::None => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Number(n) => serde_json::Value::Number(n.clone()),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::List(items) | Self::Tuple(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Self::Set(items) => serde_json::Value::Array(
                items
                    .iter()
                    .cloned()
                    .map(serde_json::Value::String)
                    .collect(),
            ),
            Self::Map(map) => serde_json::Value::Object(map.clone()),
            Self::Object(entity) => serde_json::Value::Object(entity.to_hash()),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::None,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Self::Map(map),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Entity> for Value {
    fn from(value: Entity) -> Self {
        Self::Object(value)
    }
}

impl From<Attributes> for Value {
    fn from(value: Attributes) -> Self {
        Self::Map(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Self::List(value)
    }
}

impl From<BTreeSet<String>> for Value {
    fn from(value: BTreeSet<String>) -> Self {
        Self::Set(value)
    }
}
