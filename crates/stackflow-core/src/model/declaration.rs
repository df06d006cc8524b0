//! Resource declarations

use super::{Import, PropertyValue, Reference, ResourceKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Desired state of one resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDeclaration {
    /// Caller-chosen identifier, unique within the graph
    pub logical_id: String,

    /// Resource kind
    pub kind: ResourceKind,

    /// Kind-specific properties
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyValue>,

    /// Logical ids this declaration must be created after.
    ///
    /// Filled by the builder from embedded references, plus any explicit
    /// dependency given with [`ResourceDeclaration::with_dependency`].
    #[serde(default)]
    pub depends_on: BTreeSet<String>,
}

impl ResourceDeclaration {
    pub fn new(logical_id: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            logical_id: logical_id.into(),
            kind,
            properties: BTreeMap::new(),
            depends_on: BTreeSet::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Add an ordering edge that is not implied by any property
    pub fn with_dependency(mut self, logical_id: impl Into<String>) -> Self {
        self.depends_on.insert(logical_id.into());
        self
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<PropertyValue>) {
        self.properties.insert(key.into(), value.into());
    }

    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    /// String property shortcut
    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(PropertyValue::as_str)
    }

    /// Every reference embedded in the properties, in property-key order
    pub fn references(&self) -> impl Iterator<Item = &Reference> {
        let mut out = Vec::new();
        for value in self.properties.values() {
            value.collect_references(&mut out);
        }
        out.into_iter()
    }

    /// Every cross-stack import embedded in the properties
    pub fn imports(&self) -> impl Iterator<Item = &Import> {
        let mut out = Vec::new();
        for value in self.properties.values() {
            value.collect_imports(&mut out);
        }
        out.into_iter()
    }

    /// Distinct logical ids targeted by embedded references
    pub fn referenced_ids(&self) -> BTreeSet<String> {
        self.references().map(|r| r.target.clone()).collect()
    }
}
