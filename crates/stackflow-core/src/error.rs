use std::path::PathBuf;
use thiserror::Error;

use crate::builder::BuilderState;

/// Structural errors raised by the graph builder.
///
/// None of these are retried: they describe a broken declaration set and
/// carry the offending logical id(s) so the caller can fix it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("duplicate logical id: {0}")]
    DuplicateIdentifier(String),

    #[error("{from} references unknown logical id '{target}'")]
    DanglingReference { from: String, target: String },

    #[error("dependency cycle detected: {}", .0.join(" -> "))]
    CycleDetected(Vec<String>),

    #[error("duplicate output name: {0}")]
    DuplicateOutput(String),

    #[error("invalid logical id '{0}': must be non-empty, without whitespace or '.'")]
    InvalidIdentifier(String),

    #[error("invalid property on '{id}': {message}")]
    InvalidProperty { id: String, message: String },

    #[error("'{id}' is a {found}, expected a {expected}")]
    KindMismatch {
        id: String,
        expected: String,
        found: String,
    },

    #[error("builder is {0}; create a new builder to retry")]
    BuilderClosed(BuilderState),
}

/// Errors raised while loading a stack file.
#[derive(Error, Debug)]
pub enum FlowError {
    #[error("KDL parse error: {0}")]
    KdlParse(#[from] kdl::KdlError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("IO error: {path}\nreason: {message}")]
    IoError { path: PathBuf, message: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("template error: {file}\nreason: {message}")]
    TemplateError { file: PathBuf, message: String },

    #[error("template render error: {0}")]
    TemplateRenderError(String),

    #[error(
        "project root not found\nsearched from: {0}\nhint: run inside a directory containing stack.kdl"
    )]
    ProjectRootNotFound(PathBuf),

    #[error(transparent)]
    Graph(#[from] GraphError),
}

pub type Result<T> = std::result::Result<T, FlowError>;
