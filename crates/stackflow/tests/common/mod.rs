#![allow(deprecated)] // cargo_bin is fine while the bin lives in this package

use assert_cmd::Command;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

pub struct TestProject {
    pub root: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        Self { root }
    }

    pub fn write_stack_kdl(&self, content: &str) {
        let path = self.root.path().join("stack.kdl");
        fs::write(path, content).unwrap();
    }

    #[allow(dead_code)]
    pub fn write_file(&self, relative: &str, content: &str) {
        let path = self.root.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    pub fn path(&self) -> PathBuf {
        self.root.path().to_path_buf()
    }

    /// `stack` command isolated from the user's configuration
    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("stack").unwrap();
        cmd.current_dir(self.path())
            .env("STACKFLOW_CONFIG_DIR", self.path().join(".config"))
            .env_remove("STACKFLOW_PROJECT_ROOT")
            .env_remove("STACKFLOW_CONFIG_PATH")
            .env_remove("STACKFLOW_FILE")
            .env_remove("RUST_LOG");
        cmd
    }
}
