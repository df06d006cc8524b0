//! State management for provisioned stacks
//!
//! Manages `.stackflow/<stack>.state.json`, which records what the last
//! apply materialized. The provisioning engine itself never reads it; the
//! CLI uses it for planning, outputs and cross-stack imports.

use crate::action::{ApplyResult, Attributes, ResolvedOutput, ResourceOutcome, declaration_hash};
use crate::error::{CloudError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stackflow_core::{ResourceGraph, ResourceKind};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;

const STATE_VERSION: u32 = 1;
const STATE_SUFFIX: &str = ".state.json";
const BACKUP_SUFFIX: &str = ".state.json.backup";
const LOCK_SUFFIX: &str = ".lock.json";

/// Locks older than this are considered abandoned
const STALE_LOCK_HOURS: i64 = 1;

/// Recorded state of one stack
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackState {
    /// State file version
    pub version: u32,

    /// Stack name
    pub stack: String,

    /// Last modified timestamp
    pub updated_at: DateTime<Utc>,

    /// Fingerprint of the last successfully applied graph
    #[serde(default)]
    pub fingerprint: Option<String>,

    /// Resources indexed by logical id
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceState>,

    /// Outputs of the last successful apply
    #[serde(default)]
    pub outputs: BTreeMap<String, serde_json::Value>,
}

impl StackState {
    pub fn new(stack: impl Into<String>) -> Self {
        Self {
            version: STATE_VERSION,
            stack: stack.into(),
            updated_at: Utc::now(),
            fingerprint: None,
            resources: BTreeMap::new(),
            outputs: BTreeMap::new(),
        }
    }

    /// Add or update a resource
    pub fn set_resource(&mut self, logical_id: impl Into<String>, state: ResourceState) {
        self.resources.insert(logical_id.into(), state);
        self.updated_at = Utc::now();
    }

    /// Remove a resource
    pub fn remove_resource(&mut self, logical_id: &str) -> Option<ResourceState> {
        let result = self.resources.remove(logical_id);
        if result.is_some() {
            self.updated_at = Utc::now();
        }
        result
    }

    pub fn get_resource(&self, logical_id: &str) -> Option<&ResourceState> {
        self.resources.get(logical_id)
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Resources in reverse apply order (dependents first)
    pub fn teardown_order(&self) -> Vec<(&str, &ResourceState)> {
        let mut entries: Vec<(&str, &ResourceState)> = self
            .resources
            .iter()
            .map(|(id, r)| (id.as_str(), r))
            .collect();
        entries.sort_by(|a, b| b.1.position.cmp(&a.1.position).then(a.0.cmp(b.0)));
        entries
    }

    /// Record an apply result against the graph that produced it
    pub fn record_apply(&mut self, graph: &ResourceGraph, result: &ApplyResult) {
        for entry in &result.resources {
            let Some(decl) = graph.get(&entry.logical_id) else {
                continue;
            };
            let position = graph
                .resources
                .iter()
                .position(|r| r.logical_id == decl.logical_id)
                .unwrap_or_default();

            match &entry.outcome {
                ResourceOutcome::Materialized { attributes } => {
                    let physical_id = attributes
                        .get("id")
                        .and_then(|v| v.as_str())
                        .unwrap_or(&entry.logical_id)
                        .to_string();
                    let created_at = self
                        .get_resource(&entry.logical_id)
                        .map(|r| r.created_at)
                        .unwrap_or_else(Utc::now);
                    let mut resource = ResourceState::new(physical_id, decl.kind)
                        .with_status(ResourceStatus::Running)
                        .with_hash(declaration_hash(graph, decl))
                        .with_position(position);
                    resource.attributes = attributes.clone();
                    resource.created_at = created_at;
                    self.set_resource(entry.logical_id.clone(), resource);
                }
                ResourceOutcome::Failed { error } => {
                    let mut resource = self
                        .get_resource(&entry.logical_id)
                        .cloned()
                        .unwrap_or_else(|| {
                            ResourceState::new(entry.logical_id.clone(), decl.kind)
                                .with_position(position)
                        });
                    resource.status = ResourceStatus::Error;
                    resource.last_error = Some(error.clone());
                    resource.updated_at = Utc::now();
                    self.set_resource(entry.logical_id.clone(), resource);
                }
                ResourceOutcome::Deleted => {
                    self.remove_resource(&entry.logical_id);
                }
            }
        }

        if result.is_success() {
            self.fingerprint = graph.fingerprint().ok();
        }
    }

    /// Record the outputs of a successful apply
    pub fn record_outputs(&mut self, outputs: &[ResolvedOutput]) {
        self.outputs = outputs
            .iter()
            .map(|o| (o.name.clone(), o.value.clone()))
            .collect();
        self.updated_at = Utc::now();
    }

    /// Re-resolve the graph's outputs from recorded attributes.
    ///
    /// Used when only outputs changed since the last apply, so nothing is
    /// resubmitted to the engine.
    pub fn refresh_outputs(&mut self, graph: &ResourceGraph) -> Result<Vec<ResolvedOutput>> {
        let outputs = graph
            .outputs
            .iter()
            .map(|output| {
                let value = self
                    .get_resource(&output.source.target)
                    .filter(|r| r.status == ResourceStatus::Running)
                    .and_then(|r| r.attributes.get(&output.source.attribute))
                    .cloned()
                    .ok_or_else(|| CloudError::UnresolvedOutput {
                        name: output.name.clone(),
                        reference: output.source.to_string(),
                    })?;
                Ok(ResolvedOutput {
                    name: output.name.clone(),
                    value,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        self.record_outputs(&outputs);
        self.fingerprint = graph.fingerprint().ok();
        Ok(outputs)
    }

    /// Record a destroy result
    pub fn record_destroy(&mut self, result: &ApplyResult) {
        for entry in &result.resources {
            match &entry.outcome {
                ResourceOutcome::Deleted => {
                    self.remove_resource(&entry.logical_id);
                }
                ResourceOutcome::Failed { error } => {
                    if let Some(resource) = self.resources.get_mut(&entry.logical_id) {
                        resource.status = ResourceStatus::Error;
                        resource.last_error = Some(error.clone());
                        resource.updated_at = Utc::now();
                    }
                }
                ResourceOutcome::Materialized { .. } => {}
            }
        }
        if self.resources.is_empty() {
            self.outputs.clear();
            self.fingerprint = None;
        }
        self.updated_at = Utc::now();
    }
}

/// State of a single resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceState {
    /// Provider-assigned resource ID
    pub id: String,

    /// Resource kind
    pub kind: ResourceKind,

    /// Current status
    pub status: ResourceStatus,

    /// Hash of the declaration that produced this resource
    #[serde(default)]
    pub declaration_hash: String,

    /// Position in the apply order
    #[serde(default)]
    pub position: usize,

    /// Resource attributes (address, URL, etc.)
    #[serde(default)]
    pub attributes: Attributes,

    /// Error from the last failed operation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,

    /// When the resource was created
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl ResourceState {
    pub fn new(id: impl Into<String>, kind: ResourceKind) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            kind,
            status: ResourceStatus::Unknown,
            declaration_hash: String::new(),
            position: 0,
            attributes: Attributes::new(),
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_status(mut self, status: ResourceStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.declaration_hash = hash.into();
        self
    }

    pub fn with_position(mut self, position: usize) -> Self {
        self.position = position;
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn get_attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// Status of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    /// Resource is running/active
    Running,
    /// Last operation on the resource failed
    Error,
    /// Status is unknown
    Unknown,
}

impl std::fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceStatus::Running => write!(f, "running"),
            ResourceStatus::Error => write!(f, "error"),
            ResourceStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// State manager for reading/writing state files
pub struct StateManager {
    /// Directory holding every stack's state file
    state_dir: PathBuf,
}

impl StateManager {
    pub fn new(state_dir: impl AsRef<Path>) -> Self {
        Self {
            state_dir: state_dir.as_ref().to_path_buf(),
        }
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    fn state_path(&self, stack: &str) -> PathBuf {
        self.state_dir.join(format!("{}{}", stack, STATE_SUFFIX))
    }

    fn backup_path(&self, stack: &str) -> PathBuf {
        self.state_dir.join(format!("{}{}", stack, BACKUP_SUFFIX))
    }

    fn lock_path(&self, stack: &str) -> PathBuf {
        self.state_dir.join(format!("{}{}", stack, LOCK_SUFFIX))
    }

    /// Ensure the state directory exists
    async fn ensure_state_dir(&self) -> Result<()> {
        if !self.state_dir.exists() {
            fs::create_dir_all(&self.state_dir).await?;
            tracing::debug!("Created state directory: {}", self.state_dir.display());
        }
        Ok(())
    }

    /// Load the state of `stack`, or an empty state if none was saved
    pub async fn load(&self, stack: &str) -> Result<StackState> {
        let path = self.state_path(stack);
        if !path.exists() {
            tracing::debug!(stack, "State file not found, returning empty state");
            return Ok(StackState::new(stack));
        }
        self.read_state(&path).await
    }

    async fn read_state(&self, path: &Path) -> Result<StackState> {
        let content = fs::read_to_string(path).await?;
        let state: StackState = serde_json::from_str(&content)?;

        if state.version > STATE_VERSION {
            return Err(CloudError::StateError(format!(
                "State file version {} is newer than supported version {}",
                state.version, STATE_VERSION
            )));
        }

        tracing::debug!(
            stack = %state.stack,
            resources = state.resources.len(),
            "Loaded state"
        );
        Ok(state)
    }

    /// Save the state, keeping the previous file as a backup
    pub async fn save(&self, state: &StackState) -> Result<()> {
        self.ensure_state_dir().await?;

        let path = self.state_path(&state.stack);
        let backup = self.backup_path(&state.stack);

        if path.exists() {
            if backup.exists() {
                fs::remove_file(&backup).await?;
            }
            fs::rename(&path, &backup).await?;
            tracing::debug!("Created state backup");
        }

        let content = serde_json::to_string_pretty(state)?;
        fs::write(&path, content).await?;

        tracing::debug!(
            stack = %state.stack,
            resources = state.resources.len(),
            "Saved state"
        );
        Ok(())
    }

    /// Outputs of every stack in the state directory, keyed `stack:output`
    pub async fn load_exports(&self) -> Result<BTreeMap<String, serde_json::Value>> {
        let mut exports = BTreeMap::new();
        if !self.state_dir.exists() {
            return Ok(exports);
        }

        let mut entries = fs::read_dir(&self.state_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_state = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(STATE_SUFFIX));
            if !is_state {
                continue;
            }
            let state = self.read_state(&path).await?;
            for (name, value) in state.outputs {
                exports.insert(format!("{}:{}", state.stack, name), value);
            }
        }
        Ok(exports)
    }

    /// Acquire a lock for exclusive access to `stack`'s state
    pub async fn acquire_lock(&self, stack: &str) -> Result<StateLock> {
        self.ensure_state_dir().await?;

        let lock_path = self.lock_path(stack);

        if lock_path.exists() {
            let content = fs::read_to_string(&lock_path).await?;
            let lock_info: LockInfo = serde_json::from_str(&content)?;

            let age = Utc::now().signed_duration_since(lock_info.acquired_at);
            if age.num_hours() < STALE_LOCK_HOURS {
                return Err(CloudError::LockError(format!(
                    "State of '{}' is locked by {} since {}",
                    stack, lock_info.holder, lock_info.acquired_at
                )));
            }

            tracing::warn!("Removing stale lock from {}", lock_info.holder);
        }

        let lock_info = LockInfo {
            holder: std::env::var("HOSTNAME")
                .or_else(|_| std::env::var("HOST"))
                .unwrap_or_else(|_| "unknown".to_string()),
            acquired_at: Utc::now(),
        };

        let content = serde_json::to_string_pretty(&lock_info)?;
        fs::write(&lock_path, content).await?;

        tracing::debug!(stack, "Acquired state lock");
        Ok(StateLock {
            lock_path,
            released: false,
        })
    }
}

/// Lock information
#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    holder: String,
    acquired_at: DateTime<Utc>,
}

/// RAII guard for state lock
pub struct StateLock {
    lock_path: PathBuf,
    released: bool,
}

impl StateLock {
    /// Release the lock
    pub async fn release(mut self) -> Result<()> {
        if !self.released {
            if self.lock_path.exists() {
                fs::remove_file(&self.lock_path).await?;
                tracing::debug!("Released state lock");
            }
            self.released = true;
        }
        Ok(())
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if !self.released && self.lock_path.exists() {
            // Synchronous cleanup in drop - not ideal but necessary
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }
}
