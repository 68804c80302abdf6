//! Object and attribute filtering for partial grants.

use crate::error::{Error, Result};
use crate::value::{Attributes, Kwargs, Value};
use fleetgate_policy::{AclEntry, AclEntryType, TypeCatalog};
use std::collections::BTreeSet;

/// Attributes naming an object's owner, checked in this order. The first
/// one present decides.
pub const OWNER_ATTRIBUTES: [&str; 6] =
    ["id", "objectId", "hostId", "clientId", "depotId", "serverId"];

/// Filters map- and object-shaped values against the entries of a
/// partial grant.
#[derive(Debug)]
pub struct ObjectFilter<'a> {
    entries: &'a [AclEntry],
    principal: &'a str,
    types: &'a TypeCatalog,
}

/// Collection shape of a filtered value, restored after filtering.
enum Shape {
    Single,
    List,
    Tuple,
}

fn split(value: Value) -> std::result::Result<(Shape, Vec<Value>), Value> {
    match value {
        Value::List(items) if items.first().is_some_and(Value::is_record) => {
            Ok((Shape::List, items))
        }
        Value::Tuple(items) if items.first().is_some_and(Value::is_record) => {
            Ok((Shape::Tuple, items))
        }
        record @ (Value::Map(_) | Value::Object(_)) => Ok((Shape::Single, vec![record])),
        other => Err(other),
    }
}

fn owner_id(attributes: &Attributes) -> Option<&str> {
    OWNER_ATTRIBUTES
        .iter()
        .find_map(|name| attributes.get(*name))
        .and_then(serde_json::Value::as_str)
}

impl<'a> ObjectFilter<'a> {
    pub fn new(entries: &'a [AclEntry], principal: &'a str, types: &'a TypeCatalog) -> Self {
        Self {
            entries,
            principal,
            types,
        }
    }

    fn is_owned(&self, attributes: &Attributes) -> bool {
        matches!(owner_id(attributes), Some(id) if !id.is_empty() && id == self.principal)
    }

    /// Union over all entries of the attributes each one allows on an item.
    fn allowed_attributes(&self, attributes: &Attributes) -> BTreeSet<String> {
        let mut allowed = BTreeSet::new();
        for entry in self.entries {
            if *entry.entry_type() == AclEntryType::SelfOwned && !self.is_owned(attributes) {
                continue;
            }
            if let Some(allow) = entry.allow_attributes() {
                allowed.extend(allow.iter().cloned());
            } else if let Some(deny) = entry.deny_attributes() {
                allowed.extend(attributes.keys().filter(|key| !deny.contains(*key)).cloned());
            } else {
                allowed.extend(attributes.keys().cloned());
            }
        }
        allowed
    }

    /// Strip an item to its allowed attributes, or `None` to drop it.
    fn filter_item(&self, item: Value) -> Option<Value> {
        match item {
            Value::Map(mut attributes) => {
                let allowed = self.allowed_attributes(&attributes);
                if allowed.is_empty() {
                    return None;
                }
                attributes.retain(|key, _| allowed.contains(key));
                Some(Value::Map(attributes))
            }
            Value::Object(mut entity) => {
                let mut allowed = self.allowed_attributes(&entity.to_hash());
                if allowed.is_empty() {
                    return None;
                }
                allowed.extend(self.types.mandatory_attributes(&entity.type_name).iter().cloned());
                entity.attributes.retain(|key, _| allowed.contains(key));
                Some(Value::Object(entity))
            }
            _ => None,
        }
    }

    /// Filter `items`. When every item is removed, `strict` turns that
    /// into a permission error.
    pub fn filter_objects(&self, items: Vec<Value>, strict: bool) -> Result<Vec<Value>> {
        let original = items.len();
        let kept: Vec<Value> = items
            .into_iter()
            .filter_map(|item| self.filter_item(item))
            .collect();

        if kept.len() < original {
            tracing::warn!(
                removed = original - kept.len(),
                left = kept.len(),
                "objects removed by acl"
            );
            if kept.is_empty() && strict {
                return Err(Error::permission_denied("access denied"));
            }
        }
        Ok(kept)
    }

    /// Filter record-valued parameters. Other parameters pass unchanged.
    pub fn filter_params(&self, kwargs: Kwargs) -> Result<Kwargs> {
        let mut filtered = Kwargs::new();
        for (name, value) in kwargs {
            let (shape, items) = match split(value) {
                Ok(parts) => parts,
                Err(value) => {
                    filtered.insert(name, value);
                    continue;
                }
            };
            let kept = self.filter_objects(items, true)?;
            let value = match shape {
                Shape::List => Value::List(kept),
                Shape::Tuple => Value::Tuple(kept),
                Shape::Single => match kept.into_iter().next() {
                    Some(item) => item,
                    None => continue,
                },
            };
            filtered.insert(name, value);
        }
        Ok(filtered)
    }

    /// Filter a call result. Removing everything is not an error.
    pub fn filter_result(&self, result: Value) -> Value {
        if result.is_empty() {
            return result;
        }
        let (shape, items) = match split(result) {
            Ok(parts) => parts,
            Err(result) => return result,
        };
        let kept = self.filter_objects(items, false).unwrap_or_default();
        match shape {
            Shape::List => Value::List(kept),
            Shape::Tuple => Value::Tuple(kept),
            Shape::Single => kept.into_iter().next().unwrap_or(Value::None),
        }
    }
}
