//! Object type catalog.
//!
//! Attribute filtering never strips an object below what is needed to
//! reconstruct it: the `type` attribute and the mandatory constructor
//! attributes of its type always survive.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Attribute that identifies an object's type. Never filtered.
pub const TYPE_ATTRIBUTE: &str = "type";

/// Mandatory attributes per object type name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeCatalog {
    types: BTreeMap<String, Vec<String>>,
}

impl TypeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type<I, S>(mut self, type_name: impl Into<String>, mandatory: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert(type_name, mandatory);
        self
    }

    pub fn insert<I, S>(&mut self, type_name: impl Into<String>, mandatory: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.types.insert(
            type_name.into(),
            mandatory.into_iter().map(Into::into).collect(),
        );
    }

    /// Mandatory attributes for `type_name`; empty for unknown types.
    pub fn mandatory_attributes(&self, type_name: &str) -> &[String] {
        self.types.get(type_name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_type_has_no_mandatory_attributes() {
        let catalog = TypeCatalog::new().with_type("OpsiClient", ["id"]);
        assert_eq!(catalog.mandatory_attributes("OpsiClient"), ["id".to_string()]);
        assert!(catalog.mandatory_attributes("Product").is_empty());
    }

    #[test]
    fn test_yaml_is_a_plain_map() {
        let catalog: TypeCatalog =
            serde_yaml::from_str("ProductOnClient: [productId, productType, clientId]\n").unwrap();
        assert!(catalog.contains("ProductOnClient"));
        assert_eq!(catalog.mandatory_attributes("ProductOnClient").len(), 3);
    }
}
