//! resource node parsing

use super::{first_string, named_string, positional};
use crate::error::{FlowError, Result};
use crate::model::{Import, PropertyValue, Reference, ResourceDeclaration, ResourceKind};
use kdl::{KdlEntry, KdlNode, KdlValue};
use std::collections::BTreeMap;

/// Parse a resource node
///
/// ```kdl
/// resource "vm" kind="compute-instance" {
///     instance_type "t3.micro"
///     security_group (ref)"sg.id"
///     depends-on "vpc"
/// }
/// ```
pub fn parse_resource(node: &KdlNode) -> Result<ResourceDeclaration> {
    let logical_id = first_string(node)
        .ok_or_else(|| FlowError::InvalidConfig("resource requires a name".to_string()))?
        .to_string();

    let kind: ResourceKind = named_string(node, "kind")
        .ok_or_else(|| {
            FlowError::InvalidConfig(format!("resource '{}' requires kind=", logical_id))
        })?
        .parse()
        .map_err(FlowError::InvalidConfig)?;

    let mut decl = ResourceDeclaration::new(logical_id.clone(), kind);

    if let Some(children) = node.children() {
        // Repeated property nodes become a list, in document order
        let mut collected: BTreeMap<String, Vec<PropertyValue>> = BTreeMap::new();
        for child in children.nodes() {
            let key = child.name().value();
            match key {
                "depends-on" | "depends_on" => {
                    for entry in positional(child) {
                        let dep = entry.value().as_string().ok_or_else(|| {
                            FlowError::InvalidConfig(format!(
                                "depends-on in '{}' takes logical ids",
                                logical_id
                            ))
                        })?;
                        decl = decl.with_dependency(dep);
                    }
                }
                _ => {
                    let value = parse_property_value(child).map_err(|e| match e {
                        FlowError::InvalidConfig(msg) => {
                            FlowError::InvalidConfig(format!("{}.{}: {}", logical_id, key, msg))
                        }
                        other => other,
                    })?;
                    collected.entry(key.to_string()).or_default().push(value);
                }
            }
        }

        for (key, mut values) in collected {
            let value = if values.len() == 1 {
                values.remove(0)
            } else {
                PropertyValue::List(values)
            };
            decl.set_property(key, value);
        }
    }

    Ok(decl)
}

/// Parse a property node into a value.
///
/// Children become a map, several arguments a list, a single argument a
/// scalar (or a reference/import when annotated).
pub fn parse_property_value(node: &KdlNode) -> Result<PropertyValue> {
    if let Some(children) = node.children() {
        let mut map: BTreeMap<String, Vec<PropertyValue>> = BTreeMap::new();
        for child in children.nodes() {
            map.entry(child.name().value().to_string())
                .or_default()
                .push(parse_property_value(child)?);
        }
        return Ok(PropertyValue::Map(
            map.into_iter()
                .map(|(k, mut v)| {
                    let value = if v.len() == 1 {
                        v.remove(0)
                    } else {
                        PropertyValue::List(v)
                    };
                    (k, value)
                })
                .collect(),
        ));
    }

    let args: Vec<&KdlEntry> = positional(node).collect();
    match args.as_slice() {
        [] => Err(FlowError::InvalidConfig("property has no value".to_string())),
        [single] => entry_value(single),
        many => Ok(PropertyValue::List(
            many.iter()
                .map(|e| entry_value(e))
                .collect::<Result<Vec<_>>>()?,
        )),
    }
}

fn entry_value(entry: &KdlEntry) -> Result<PropertyValue> {
    match entry.ty().map(|t| t.value()) {
        Some("ref") => {
            let raw = entry.value().as_string().ok_or_else(|| {
                FlowError::InvalidConfig("(ref) expects a \"target.attribute\" string".to_string())
            })?;
            Ok(PropertyValue::Reference(
                raw.parse::<Reference>().map_err(FlowError::InvalidConfig)?,
            ))
        }
        Some("import") => {
            let raw = entry.value().as_string().ok_or_else(|| {
                FlowError::InvalidConfig("(import) expects an export name".to_string())
            })?;
            Ok(PropertyValue::Import(Import::new(raw)))
        }
        Some(other) => Err(FlowError::InvalidConfig(format!(
            "unknown type annotation ({})",
            other
        ))),
        None => scalar_value(entry.value()),
    }
}

fn scalar_value(value: &KdlValue) -> Result<PropertyValue> {
    if let Some(s) = value.as_string() {
        return Ok(PropertyValue::String(s.to_string()));
    }
    if let Some(b) = value.as_bool() {
        return Ok(PropertyValue::Bool(b));
    }
    if let Some(i) = value.as_integer() {
        let i = i64::try_from(i)
            .map_err(|_| FlowError::InvalidConfig(format!("integer out of range: {}", i)))?;
        return Ok(PropertyValue::Integer(i));
    }
    if let Some(f) = value.as_float() {
        // Floats are kept textually so graphs stay Eq and byte-stable
        return Ok(PropertyValue::String(f.to_string()));
    }
    Err(FlowError::InvalidConfig("null is not a valid property value".to_string()))
}
