//! Project discovery
//!
//! Locates the stack file and the optional files next to it.

use crate::error::{FlowError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Stack file name
pub const STACK_FILE: &str = "stack.kdl";

/// Hidden project directory, also home of the state file
pub const PROJECT_DIR: &str = ".stackflow";

/// Files that make up a project
#[derive(Debug, Clone, Default)]
pub struct DiscoveredFiles {
    /// Root stack file (stack.kdl)
    pub root: Option<PathBuf>,
    /// Local override appended after the root file (stack.local.kdl)
    pub local_override: Option<PathBuf>,
    /// Environment variable file (.env)
    pub env_file: Option<PathBuf>,
}

fn has_stack_file(dir: &Path) -> bool {
    dir.join(STACK_FILE).exists() || dir.join(PROJECT_DIR).join(STACK_FILE).exists()
}

/// Find the project root
///
/// 1. `STACKFLOW_PROJECT_ROOT` when it contains a stack file
/// 2. the nearest ancestor of the current directory containing
///    `stack.kdl` or `.stackflow/stack.kdl`
#[tracing::instrument]
pub fn find_project_root() -> Result<PathBuf> {
    if let Ok(root) = std::env::var("STACKFLOW_PROJECT_ROOT") {
        let path = PathBuf::from(&root);
        debug!(env_root = %root, "Checking STACKFLOW_PROJECT_ROOT");
        if has_stack_file(&path) {
            info!(project_root = %path.display(), "Found project root from environment variable");
            return Ok(path);
        }
    }

    let start_dir = std::env::current_dir()?;
    find_project_root_from(&start_dir)
}

/// Walk up from `start_dir` looking for a stack file
pub fn find_project_root_from(start_dir: &Path) -> Result<PathBuf> {
    let mut current = start_dir.to_path_buf();
    loop {
        if has_stack_file(&current) {
            info!(project_root = %current.display(), "Found project root");
            return Ok(current);
        }
        if !current.pop() {
            break;
        }
    }

    warn!(start_dir = %start_dir.display(), "Project root not found");
    Err(FlowError::ProjectRootNotFound(start_dir.to_path_buf()))
}

/// Discover the project files under `project_root`
#[tracing::instrument(skip(project_root), fields(project_root = %project_root.display()))]
pub fn discover_files(project_root: &Path) -> Result<DiscoveredFiles> {
    let mut discovered = DiscoveredFiles::default();

    for dir in [project_root.to_path_buf(), project_root.join(PROJECT_DIR)] {
        let root = dir.join(STACK_FILE);
        if discovered.root.is_none() && root.exists() {
            debug!(file = %root.display(), "Found stack file");
            discovered.root = Some(root);
        }
        let local = dir.join("stack.local.kdl");
        if discovered.local_override.is_none() && local.exists() {
            debug!(file = %local.display(), "Found local override");
            discovered.local_override = Some(local);
        }
    }

    let env_file = project_root.join(".env");
    if env_file.exists() {
        discovered.env_file = Some(env_file);
    }

    if discovered.root.is_none() {
        return Err(FlowError::ProjectRootNotFound(project_root.to_path_buf()));
    }
    Ok(discovered)
}
