//! Stack loader
//!
//! Discovery, template expansion, parsing and graph validation in one call.

use crate::discovery::{DiscoveredFiles, discover_files, find_project_root};
use crate::error::Result;
use crate::model::ResourceGraph;
use crate::parser::parse_stack_string;
use crate::template::{TemplateProcessor, Variables, extract_variables};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// A validated stack together with where it came from
#[derive(Debug, Clone)]
pub struct LoadedStack {
    pub project_root: PathBuf,
    pub files: Vec<PathBuf>,
    pub variables: Variables,
    pub graph: ResourceGraph,
}

/// Find the project root from the current directory and load it
#[instrument]
pub fn load_project() -> Result<LoadedStack> {
    info!("Starting stack load");
    let project_root = find_project_root()?;
    load_project_from_root(&project_root)
}

/// Load the stack under `project_root`
///
/// 1. discover stack.kdl, stack.local.kdl and .env
/// 2. collect variables (environment < .env < variables blocks)
/// 3. render templates
/// 4. parse and build the graph
#[instrument(skip(project_root), fields(project_root = %project_root.display()))]
pub fn load_project_from_root(project_root: &Path) -> Result<LoadedStack> {
    debug!("Step 1: Discovering files");
    let discovered = discover_files(project_root)?;
    let files = stack_files(&discovered);

    debug!("Step 2: Preparing template processor");
    let mut processor = TemplateProcessor::new();
    processor.add_env_variables();
    if let Some(env_file) = &discovered.env_file {
        processor.add_env_file_variables(env_file)?;
    }
    let mut variables = Variables::new();
    for file in &files {
        let raw = std::fs::read_to_string(file)?;
        variables.extend(extract_variables(&raw)?);
    }
    processor.add_variables(variables.clone());

    debug!("Step 3: Expanding templates");
    let mut rendered = String::new();
    for file in &files {
        rendered.push_str(&processor.render_file(file)?);
        rendered.push('\n');
    }

    debug!("Step 4: Parsing and building graph");
    let name = project_root
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unnamed")
        .to_string();
    let mut builder = parse_stack_string(&rendered, name)?;
    let graph = builder.build()?;

    info!(
        stack = %graph.stack,
        resources = graph.resources.len(),
        outputs = graph.outputs.len(),
        "Stack loaded successfully"
    );

    Ok(LoadedStack {
        project_root: project_root.to_path_buf(),
        files,
        variables,
        graph,
    })
}

/// Load a single stack file, bypassing discovery
#[instrument(skip(path), fields(path = %path.display()))]
pub fn load_stack_file(path: &Path) -> Result<LoadedStack> {
    let raw = std::fs::read_to_string(path)?;
    let variables = extract_variables(&raw)?;

    let mut processor = TemplateProcessor::new();
    processor.add_env_variables();
    processor.add_variables(variables.clone());
    let rendered = processor.render_file(path)?;

    let project_root = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let name = project_root
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unnamed")
        .to_string();
    let mut builder = parse_stack_string(&rendered, name)?;
    let graph = builder.build()?;

    Ok(LoadedStack {
        project_root,
        files: vec![path.to_path_buf()],
        variables,
        graph,
    })
}

fn stack_files(discovered: &DiscoveredFiles) -> Vec<PathBuf> {
    discovered
        .root
        .iter()
        .chain(discovered.local_override.iter())
        .cloned()
        .collect()
}
