pub mod error;

pub use error::*;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings file name inside the configuration directory
pub const SETTINGS_FILE: &str = "config.yaml";

const STACK_FILE_CANDIDATES: [&str; 2] = ["stack.kdl", ".stack.kdl"];

/// Get the StackFlow configuration directory, creating it if needed.
///
/// `STACKFLOW_CONFIG_DIR` overrides the platform default.
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = match std::env::var("STACKFLOW_CONFIG_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => dirs::config_dir()
            .ok_or(ConfigError::ConfigDirNotFound)?
            .join("stackflow"),
    };

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

/// Find a stack file outside of any project
///
/// Search order:
/// 1. `STACKFLOW_CONFIG_PATH` (direct path)
/// 2. current directory: stack.kdl, .stack.kdl
/// 3. ./.stackflow/ with the same names
/// 4. ~/.config/stackflow/stack.kdl
pub fn find_stack_file() -> Result<PathBuf> {
    if let Ok(config_path) = std::env::var("STACKFLOW_CONFIG_PATH") {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
    }

    let current_dir = std::env::current_dir()?;
    for dir in [current_dir.clone(), current_dir.join(".stackflow")] {
        for filename in &STACK_FILE_CANDIDATES {
            let path = dir.join(filename);
            if path.exists() {
                return Ok(path);
            }
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global = config_dir.join("stackflow").join("stack.kdl");
        if global.exists() {
            return Ok(global);
        }
    }

    Err(ConfigError::StackFileNotFound)
}

/// User settings read from `config.yaml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Region passed to the engine
    pub region: Option<String>,

    /// Where state files live; defaults to `<project>/.stackflow`
    pub state_dir: Option<PathBuf>,

    /// Where the local asset uploader writes bucket contents
    pub asset_dir: Option<PathBuf>,

    /// Default log filter when RUST_LOG is unset
    pub log_level: Option<String>,
}

impl Settings {
    /// Load settings from the configuration directory, or defaults if absent
    pub fn load() -> Result<Self> {
        Self::load_from(&get_config_dir()?.join(SETTINGS_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&content).map_err(|e| ConfigError::InvalidSettings {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self).map_err(|e| ConfigError::InvalidSettings {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// State directory for a project rooted at `project_root`
    pub fn state_dir_for(&self, project_root: &Path) -> PathBuf {
        match &self.state_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => project_root.join(dir),
            None => project_root.join(".stackflow"),
        }
    }

    /// Asset directory for a project rooted at `project_root`
    pub fn asset_dir_for(&self, project_root: &Path) -> PathBuf {
        match &self.asset_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => project_root.join(dir),
            None => self.state_dir_for(project_root).join("buckets"),
        }
    }
}
