//! External collaborators reached by the engine
//!
//! Identity and access enforcement, static asset upload and cross-stack
//! imports live outside the graph. Each is a narrow trait with a local
//! implementation used by [`LocalEngine`](crate::LocalEngine) and tests.

use crate::error::{CloudError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use stackflow_core::{AssetUpload, Grant};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::fs;

/// Attaches permission policies to roles
#[async_trait]
pub trait AccessManager: Send + Sync {
    async fn grant(&self, role_logical_id: &str, policy_name: &str) -> Result<()>;
}

/// Copies static assets into a bucket
#[async_trait]
pub trait AssetUploader: Send + Sync {
    /// Upload `upload.source_path` under `upload.destination_prefix` of
    /// `bucket`, returning the uploaded object keys
    async fn upload_asset(&self, bucket: &str, upload: &AssetUpload) -> Result<Vec<String>>;
}

/// Looks up values exported by other stacks
pub trait ImportResolver: Send + Sync {
    fn resolve(&self, name: &str) -> Option<serde_json::Value>;
}

/// Access manager that records grants in memory
#[derive(Debug, Default)]
pub struct LocalAccessManager {
    grants: Mutex<Vec<Grant>>,
}

impl LocalAccessManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grants recorded so far, in call order
    pub fn grants(&self) -> Vec<Grant> {
        self.grants
            .lock()
            .map(|g| g.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl AccessManager for LocalAccessManager {
    async fn grant(&self, role_logical_id: &str, policy_name: &str) -> Result<()> {
        let mut grants = self
            .grants
            .lock()
            .map_err(|_| CloudError::CollaboratorFailed("grant registry poisoned".to_string()))?;
        if !grants
            .iter()
            .any(|g| g.role == role_logical_id && g.policy == policy_name)
        {
            grants.push(Grant {
                role: role_logical_id.to_string(),
                policy: policy_name.to_string(),
            });
        }
        tracing::info!(role = role_logical_id, policy = policy_name, "Granted policy");
        Ok(())
    }
}

/// Import resolver over a fixed table of `stack:output` values
#[derive(Debug, Clone, Default)]
pub struct StaticImportResolver {
    values: BTreeMap<String, serde_json::Value>,
}

impl StaticImportResolver {
    pub fn new(values: BTreeMap<String, serde_json::Value>) -> Self {
        Self { values }
    }

    pub fn with_value(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.values.insert(name.into(), value);
        self
    }
}

impl ImportResolver for StaticImportResolver {
    fn resolve(&self, name: &str) -> Option<serde_json::Value> {
        self.values.get(name).cloned()
    }
}

/// Per-object metadata written next to uploaded files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    pub content_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<String>,
}

/// Name of the metadata manifest inside each bucket directory
pub const MANIFEST_FILE: &str = ".objects.json";

/// Asset uploader that copies files into `<root>/<bucket>/<prefix>`.
///
/// Relative source paths are resolved against `source_dir`.
#[derive(Debug, Clone)]
pub struct FsAssetUploader {
    source_dir: PathBuf,
    root: PathBuf,
}

impl FsAssetUploader {
    pub fn new(source_dir: impl AsRef<Path>, root: impl AsRef<Path>) -> Self {
        Self {
            source_dir: source_dir.as_ref().to_path_buf(),
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn bucket_dir(&self, bucket: &str) -> PathBuf {
        self.root.join(bucket)
    }

    fn source_files(&self, source: &Path) -> Result<Vec<(PathBuf, String)>> {
        if source.is_file() {
            let name = source
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            return Ok(vec![(source.to_path_buf(), name)]);
        }
        if !source.is_dir() {
            return Err(CloudError::CollaboratorFailed(format!(
                "asset source not found: {}",
                source.display()
            )));
        }

        let pattern = format!("{}/**/*", source.display());
        let entries = glob::glob(&pattern)
            .map_err(|e| CloudError::CollaboratorFailed(format!("invalid asset pattern: {}", e)))?;

        let mut files = Vec::new();
        for entry in entries {
            let path =
                entry.map_err(|e| CloudError::CollaboratorFailed(format!("asset walk: {}", e)))?;
            if !path.is_file() {
                continue;
            }
            let Ok(relative) = path.strip_prefix(source) else {
                continue;
            };
            let key = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            files.push((path, key));
        }
        files.sort_by(|a, b| a.1.cmp(&b.1));
        Ok(files)
    }
}

#[async_trait]
impl AssetUploader for FsAssetUploader {
    async fn upload_asset(&self, bucket: &str, upload: &AssetUpload) -> Result<Vec<String>> {
        let source = self.source_dir.join(&upload.source_path);
        let bucket_dir = self.bucket_dir(bucket);
        let prefix = upload.destination_prefix.trim_matches('/');

        let manifest_path = bucket_dir.join(MANIFEST_FILE);
        let mut manifest: BTreeMap<String, ObjectMetadata> = if manifest_path.exists() {
            serde_json::from_str(&fs::read_to_string(&manifest_path).await?)?
        } else {
            BTreeMap::new()
        };

        let mut keys = Vec::new();
        for (path, relative) in self.source_files(&source)? {
            let key = if prefix.is_empty() {
                relative
            } else {
                format!("{}/{}", prefix, relative)
            };
            let target = bucket_dir.join(&key);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).await?;
            }
            fs::copy(&path, &target).await?;

            let content_type = upload
                .content_type
                .clone()
                .unwrap_or_else(|| guess_content_type(&key).to_string());
            manifest.insert(
                key.clone(),
                ObjectMetadata {
                    content_type,
                    cache_control: upload.cache_policy.clone(),
                },
            );
            keys.push(key);
        }

        fs::create_dir_all(&bucket_dir).await?;
        fs::write(&manifest_path, serde_json::to_string_pretty(&manifest)?).await?;

        tracing::info!(
            bucket,
            source = %source.display(),
            objects = keys.len(),
            "Uploaded assets"
        );
        Ok(keys)
    }
}

/// Content type from a file extension
pub fn guess_content_type(key: &str) -> &'static str {
    let ext = key.rsplit_once('.').map(|(_, e)| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("html" | "htm") => "text/html",
        Some("css") => "text/css",
        Some("js" | "mjs") => "application/javascript",
        Some("json") => "application/json",
        Some("txt") => "text/plain",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("ico") => "image/x-icon",
        Some("py") => "text/x-python",
        _ => "application/octet-stream",
    }
}
