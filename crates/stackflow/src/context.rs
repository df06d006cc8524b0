//! Loading the stack and wiring the engine for a command

use colored::Colorize;
use stackflow_cloud::{FsAssetUploader, LocalEngine, StateManager, StaticImportResolver};
use stackflow_config::Settings;
use stackflow_core::{FlowError, LoadedStack};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Load the stack from `file`, the enclosing project, or the configured
/// fallback locations, in that order
pub fn load_stack(file: Option<&Path>) -> anyhow::Result<LoadedStack> {
    if let Some(path) = file {
        return Ok(stackflow_core::load_stack_file(path)?);
    }

    match stackflow_core::find_project_root() {
        Ok(root) => Ok(stackflow_core::load_project_from_root(&root)?),
        Err(FlowError::ProjectRootNotFound(_)) => {
            let path = stackflow_config::find_stack_file()?;
            tracing::debug!(path = %path.display(), "Using stack file from configuration");
            Ok(stackflow_core::load_stack_file(&path)?)
        }
        Err(e) => Err(e.into()),
    }
}

/// Everything a state-touching command needs
pub struct StackContext {
    pub loaded: LoadedStack,
    pub settings: Settings,
    pub state: StateManager,
}

impl StackContext {
    pub fn load(file: Option<&Path>, settings: Settings) -> anyhow::Result<Self> {
        let loaded = load_stack(file)?;
        let state = StateManager::new(settings.state_dir_for(&loaded.project_root));
        Ok(Self {
            loaded,
            settings,
            state,
        })
    }

    pub fn stack_name(&self) -> &str {
        &self.loaded.graph.stack
    }

    pub fn asset_dir(&self) -> PathBuf {
        self.settings.asset_dir_for(&self.loaded.project_root)
    }

    /// Engine with collaborators bound to this project
    pub async fn engine(&self) -> anyhow::Result<LocalEngine> {
        let exports = self.state.load_exports().await?;
        let mut engine = LocalEngine::new()
            .with_uploader(Arc::new(FsAssetUploader::new(
                &self.loaded.project_root,
                self.asset_dir(),
            )))
            .with_import_resolver(Arc::new(StaticImportResolver::new(exports)));
        if let Some(region) = &self.settings.region {
            engine = engine.with_region(region.clone());
        }
        Ok(engine)
    }

    pub fn print_header(&self) {
        println!("Stack: {}", self.stack_name().cyan());
        for file in &self.loaded.files {
            println!("  • {}", file.display().to_string().dimmed());
        }
    }
}
