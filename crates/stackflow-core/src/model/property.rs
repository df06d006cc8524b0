//! Property values
//!
//! A declaration's properties are a tagged union instead of a loose bag
//! of JSON: references and imports stay distinguishable from plain
//! strings until the provisioning engine resolves them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Pointer to an attribute of another declaration, resolved after the
/// target is materialized
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Reference {
    /// Logical id of the referenced declaration
    pub target: String,

    /// Attribute name on the materialized resource (e.g. "id", "url")
    pub attribute: String,
}

impl Reference {
    pub fn new(target: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            attribute: attribute.into(),
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.target, self.attribute)
    }
}

impl FromStr for Reference {
    type Err = String;

    /// Parses `target.attribute`. The attribute may itself contain dots.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('.') {
            Some((target, attribute)) if !target.is_empty() && !attribute.is_empty() => {
                Ok(Reference::new(target, attribute))
            }
            _ => Err(format!(
                "invalid reference '{}': expected <logical-id>.<attribute>",
                s
            )),
        }
    }
}

/// Value exported by another stack, looked up by name at apply time.
///
/// Imports never add graph edges and do not share the logical id space.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Import {
    pub name: String,
}

impl Import {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Value of a single declaration property
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyValue {
    String(String),
    Integer(i64),
    Bool(bool),
    List(Vec<PropertyValue>),
    Map(BTreeMap<String, PropertyValue>),
    Reference(Reference),
    Import(Import),
}

impl PropertyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            PropertyValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&Reference> {
        match self {
            PropertyValue::Reference(r) => Some(r),
            _ => None,
        }
    }

    /// Walk the value depth-first and collect every embedded reference
    pub fn collect_references<'a>(&'a self, out: &mut Vec<&'a Reference>) {
        match self {
            PropertyValue::Reference(r) => out.push(r),
            PropertyValue::List(items) => {
                for item in items {
                    item.collect_references(out);
                }
            }
            PropertyValue::Map(entries) => {
                for value in entries.values() {
                    value.collect_references(out);
                }
            }
            _ => {}
        }
    }

    /// Walk the value depth-first and collect every embedded import
    pub fn collect_imports<'a>(&'a self, out: &mut Vec<&'a Import>) {
        match self {
            PropertyValue::Import(i) => out.push(i),
            PropertyValue::List(items) => {
                for item in items {
                    item.collect_imports(out);
                }
            }
            PropertyValue::Map(entries) => {
                for value in entries.values() {
                    value.collect_imports(out);
                }
            }
            _ => {}
        }
    }

    /// Convert into JSON once every reference and import has a concrete value
    pub fn resolve<F>(&self, resolver: &mut F) -> Result<serde_json::Value, String>
    where
        F: FnMut(ResolveRequest<'_>) -> Result<serde_json::Value, String>,
    {
        Ok(match self {
            PropertyValue::String(s) => serde_json::Value::String(s.clone()),
            PropertyValue::Integer(i) => serde_json::Value::from(*i),
            PropertyValue::Bool(b) => serde_json::Value::Bool(*b),
            PropertyValue::List(items) => serde_json::Value::Array(
                items
                    .iter()
                    .map(|item| item.resolve(resolver))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            PropertyValue::Map(entries) => {
                let mut map = serde_json::Map::new();
                for (key, value) in entries {
                    map.insert(key.clone(), value.resolve(resolver)?);
                }
                serde_json::Value::Object(map)
            }
            PropertyValue::Reference(r) => resolver(ResolveRequest::Reference(r))?,
            PropertyValue::Import(i) => resolver(ResolveRequest::Import(i))?,
        })
    }
}

/// Lookup requested by [`PropertyValue::resolve`]
#[derive(Debug, Clone, Copy)]
pub enum ResolveRequest<'a> {
    Reference(&'a Reference),
    Import(&'a Import),
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Integer(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl From<Reference> for PropertyValue {
    fn from(value: Reference) -> Self {
        PropertyValue::Reference(value)
    }
}

impl From<Import> for PropertyValue {
    fn from(value: Import) -> Self {
        PropertyValue::Import(value)
    }
}

impl<T: Into<PropertyValue>> From<Vec<T>> for PropertyValue {
    fn from(value: Vec<T>) -> Self {
        PropertyValue::List(value.into_iter().map(Into::into).collect())
    }
}
