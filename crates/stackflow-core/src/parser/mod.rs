//! KDL stack parser
//!
//! Turns a rendered `stack.kdl` document into builder calls. The builder is
//! returned still open so callers can add declarations of their own before
//! building.
//!
//! ```kdl
//! stack "cdk-101"
//! resource "sg" kind="security-group" { description "Allow HTTP" }
//! resource "vm" kind="compute-instance" { security_group (ref)"sg.id" }
//! grant "lambda-role" "AWSLambdaBasicExecutionRole"
//! deploy "site" bucket="site-bucket" source="static_web_hosting"
//! output "Public DNS" (ref)"vm.public_dns_name"
//! ```

mod resource;

pub use resource::{parse_property_value, parse_resource};

use crate::builder::GraphBuilder;
use crate::error::{FlowError, Result};
use crate::model::{AssetUpload, Reference};
use kdl::{KdlDocument, KdlEntry, KdlNode};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Parse a stack file. The stack name defaults to the parent directory name.
pub fn parse_stack_file<P: AsRef<Path>>(path: P) -> Result<GraphBuilder> {
    let content = fs::read_to_string(path.as_ref())?;
    let name = path
        .as_ref()
        .parent()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .unwrap_or("unnamed")
        .to_string();
    parse_stack_string(&content, name)
}

/// Parse a rendered stack document
pub fn parse_stack_string(content: &str, default_name: impl Into<String>) -> Result<GraphBuilder> {
    let doc: KdlDocument = content.parse()?;
    let mut builder = GraphBuilder::new(default_name);

    for node in doc.nodes() {
        match node.name().value() {
            "stack" | "project" => {
                if let Some(name) = first_string(node) {
                    builder.set_stack_name(name)?;
                }
            }
            "resource" => {
                let decl = parse_resource(node)?;
                builder.add(decl)?;
            }
            "grant" => {
                let args = string_args(node);
                match args.as_slice() {
                    [role, policies @ ..] if !policies.is_empty() => {
                        for policy in policies {
                            builder.grant(*role, *policy)?;
                        }
                    }
                    _ => {
                        return Err(FlowError::InvalidConfig(
                            "grant requires a role id and at least one policy name".to_string(),
                        ));
                    }
                }
            }
            "deploy" => {
                let (id, bucket, upload) = parse_deploy(node)?;
                builder.upload_asset(id, bucket, upload)?;
            }
            "output" => {
                let (name, reference) = parse_output(node)?;
                builder.output(name, reference)?;
            }
            // Consumed by the template stage
            "variables" => {}
            other => {
                warn!(node = %other, "Ignoring unknown top-level node");
            }
        }
    }

    debug!(
        stack = %builder.stack_name(),
        resources = builder.len(),
        "Parsed stack document"
    );
    Ok(builder)
}

/// deploy "site" bucket="site-bucket" source="dir" prefix="/" content-type="text/html" cache-policy="max-age=60"
fn parse_deploy(node: &KdlNode) -> Result<(String, String, AssetUpload)> {
    let id = first_string(node)
        .ok_or_else(|| FlowError::InvalidConfig("deploy requires a name".to_string()))?
        .to_string();
    let bucket = named_string(node, "bucket")
        .ok_or_else(|| FlowError::InvalidConfig(format!("deploy '{}' requires bucket=", id)))?;
    let source = named_string(node, "source")
        .ok_or_else(|| FlowError::InvalidConfig(format!("deploy '{}' requires source=", id)))?;

    let mut upload = AssetUpload::new(source);
    if let Some(prefix) = named_string(node, "prefix") {
        upload = upload.with_prefix(prefix);
    }
    if let Some(content_type) =
        named_string(node, "content-type").or_else(|| named_string(node, "content_type"))
    {
        upload = upload.with_content_type(content_type);
    }
    if let Some(cache_policy) =
        named_string(node, "cache-policy").or_else(|| named_string(node, "cache_policy"))
    {
        upload = upload.with_cache_policy(cache_policy);
    }
    Ok((id, bucket.to_string(), upload))
}

/// output "name" (ref)"target.attribute"
fn parse_output(node: &KdlNode) -> Result<(String, Reference)> {
    let args: Vec<&KdlEntry> = positional(node).collect();
    let [name, source] = args.as_slice() else {
        return Err(FlowError::InvalidConfig(
            "output requires a name and a (ref) value".to_string(),
        ));
    };
    let name = name
        .value()
        .as_string()
        .ok_or_else(|| FlowError::InvalidConfig("output name must be a string".to_string()))?;
    let reference = source
        .value()
        .as_string()
        .ok_or_else(|| FlowError::InvalidConfig(format!("output '{}' needs a reference", name)))?
        .parse::<Reference>()
        .map_err(FlowError::InvalidConfig)?;
    Ok((name.to_string(), reference))
}

/// Positional arguments (entries without a name)
pub(crate) fn positional(node: &KdlNode) -> impl Iterator<Item = &KdlEntry> {
    node.entries().iter().filter(|e| e.name().is_none())
}

pub(crate) fn first_string(node: &KdlNode) -> Option<&str> {
    positional(node).next().and_then(|e| e.value().as_string())
}

fn string_args(node: &KdlNode) -> Vec<&str> {
    positional(node)
        .filter_map(|e| e.value().as_string())
        .collect()
}

/// Value of a `key="value"` property on the node
pub(crate) fn named_string<'a>(node: &'a KdlNode, key: &str) -> Option<&'a str> {
    node.entries()
        .iter()
        .find(|e| e.name().map(|n| n.value()) == Some(key))
        .and_then(|e| e.value().as_string())
}
