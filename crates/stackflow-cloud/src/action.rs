//! Plan and apply types

use crate::error::{CloudError, Result};
use crate::state::{ResourceStatus, StackState};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use stackflow_core::{ResourceDeclaration, ResourceGraph};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Materialized attributes of one resource
pub type Attributes = BTreeMap<String, serde_json::Value>;

/// Represents a planned action for a resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    /// Unique identifier for the action
    pub id: String,

    /// Type of action to perform
    pub action_type: ActionType,

    /// Resource kind (e.g., "bucket", "security-group")
    pub resource_type: String,

    /// Logical id of the resource
    pub resource_id: String,

    /// Description of the action
    pub description: String,

    /// Additional details about the action
    pub details: HashMap<String, serde_json::Value>,
}

/// Type of action to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Create a new resource
    Create,
    /// Update an existing resource
    Update,
    /// Delete a resource
    Delete,
    /// No changes needed
    NoOp,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionType::Create => write!(f, "create"),
            ActionType::Update => write!(f, "update"),
            ActionType::Delete => write!(f, "delete"),
            ActionType::NoOp => write!(f, "no-op"),
        }
    }
}

/// Plan containing all actions to be applied
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// List of actions to perform, in apply order
    pub actions: Vec<Action>,

    /// Whether the plan has any changes
    pub has_changes: bool,

    /// Declared outputs differ from the recorded ones, or the graph changed
    /// since the last successful apply
    #[serde(default)]
    pub outputs_changed: bool,
}

impl Plan {
    pub fn new(actions: Vec<Action>) -> Self {
        let has_changes = actions.iter().any(|a| a.action_type != ActionType::NoOp);
        Self {
            actions,
            has_changes,
            outputs_changed: false,
        }
    }

    pub fn with_outputs_changed(mut self, changed: bool) -> Self {
        self.outputs_changed = changed;
        self.has_changes |= changed;
        self
    }

    /// Whether any resource needs to be created, updated or deleted
    pub fn has_resource_changes(&self) -> bool {
        self.actions.iter().any(|a| a.action_type != ActionType::NoOp)
    }

    /// Get actions by type
    pub fn actions_by_type(&self, action_type: ActionType) -> Vec<&Action> {
        self.actions
            .iter()
            .filter(|a| a.action_type == action_type)
            .collect()
    }

    /// Summary of the plan
    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            create: self.actions_by_type(ActionType::Create).len(),
            update: self.actions_by_type(ActionType::Update).len(),
            delete: self.actions_by_type(ActionType::Delete).len(),
            no_change: self.actions_by_type(ActionType::NoOp).len(),
        }
    }
}

/// Summary of planned actions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSummary {
    pub create: usize,
    pub update: usize,
    pub delete: usize,
    pub no_change: usize,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to create, {} to update, {} to delete, {} unchanged",
            self.create, self.update, self.delete, self.no_change
        )
    }
}

/// Hash of everything that determines a resource's desired state: the
/// declaration itself and, for roles, the grants attached to it
pub fn declaration_hash(graph: &ResourceGraph, decl: &ResourceDeclaration) -> String {
    let grants: Vec<&str> = graph
        .grants_for(&decl.logical_id)
        .map(|g| g.policy.as_str())
        .collect();
    let canonical = serde_json::json!({ "declaration": decl, "grants": grants });
    hex::encode(Sha256::digest(canonical.to_string().as_bytes()))
}

/// Compare the desired graph with recorded state.
///
/// Creates and updates follow the graph's topological order; deletes of
/// resources no longer declared come last, newest first.
pub fn diff(graph: &ResourceGraph, current: &StackState) -> Plan {
    let mut actions = Vec::new();

    for decl in &graph.resources {
        let hash = declaration_hash(graph, decl);
        let (action_type, description) = match current.get_resource(&decl.logical_id) {
            None => (
                ActionType::Create,
                format!("create {} {}", decl.kind, decl.logical_id),
            ),
            Some(existing)
                if existing.declaration_hash != hash
                    || existing.status != ResourceStatus::Running =>
            {
                (
                    ActionType::Update,
                    format!("update {} {}", decl.kind, decl.logical_id),
                )
            }
            Some(_) => (
                ActionType::NoOp,
                format!("{} {} is up to date", decl.kind, decl.logical_id),
            ),
        };

        actions.push(Action {
            id: format!("{}-{}", action_type, decl.logical_id),
            action_type,
            resource_type: decl.kind.to_string(),
            resource_id: decl.logical_id.clone(),
            description,
            details: [
                (
                    "physical_name".to_string(),
                    serde_json::json!(graph.physical_name(&decl.logical_id)),
                ),
                (
                    "depends_on".to_string(),
                    serde_json::json!(decl.depends_on),
                ),
            ]
            .into_iter()
            .collect(),
        });
    }

    for (logical_id, resource) in current.teardown_order() {
        if graph.contains(logical_id) {
            continue;
        }
        actions.push(Action {
            id: format!("delete-{}", logical_id),
            action_type: ActionType::Delete,
            resource_type: resource.kind.to_string(),
            resource_id: logical_id.to_string(),
            description: format!("delete {} {}", resource.kind, logical_id),
            details: [("physical_id".to_string(), serde_json::json!(resource.id))]
                .into_iter()
                .collect(),
        });
    }

    let declared: BTreeSet<&str> = graph.outputs.iter().map(|o| o.name.as_str()).collect();
    let recorded: BTreeSet<&str> = current.outputs.keys().map(String::as_str).collect();
    let graph_changed =
        current.fingerprint.is_some() && current.fingerprint != graph.fingerprint().ok();

    Plan::new(actions).with_outputs_changed(declared != recorded || graph_changed)
}

/// Outcome of one resource during apply or destroy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResourceOutcome {
    /// Resource exists with these attributes
    Materialized { attributes: Attributes },
    /// Resource was removed
    Deleted,
    /// The engine reported an error for this resource
    Failed { error: String },
}

/// Result for a single logical id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceResult {
    pub logical_id: String,

    #[serde(flatten)]
    pub outcome: ResourceOutcome,
}

/// Result of submitting a graph (or destroying a stack)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplyResult {
    /// Per-resource results in the order the engine processed them
    pub resources: Vec<ResourceResult>,

    /// Total execution time in milliseconds
    pub duration_ms: u64,
}

impl ApplyResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_success(&self) -> bool {
        self.first_failure().is_none()
    }

    pub fn add_materialized(&mut self, logical_id: impl Into<String>, attributes: Attributes) {
        self.resources.push(ResourceResult {
            logical_id: logical_id.into(),
            outcome: ResourceOutcome::Materialized { attributes },
        });
    }

    pub fn add_deleted(&mut self, logical_id: impl Into<String>) {
        self.resources.push(ResourceResult {
            logical_id: logical_id.into(),
            outcome: ResourceOutcome::Deleted,
        });
    }

    pub fn add_failure(&mut self, logical_id: impl Into<String>, error: impl Into<String>) {
        self.resources.push(ResourceResult {
            logical_id: logical_id.into(),
            outcome: ResourceOutcome::Failed {
                error: error.into(),
            },
        });
    }

    /// Attributes of a materialized resource
    pub fn attributes(&self, logical_id: &str) -> Option<&Attributes> {
        self.resources.iter().find_map(|r| match &r.outcome {
            ResourceOutcome::Materialized { attributes } if r.logical_id == logical_id => {
                Some(attributes)
            }
            _ => None,
        })
    }

    /// Every materialized resource
    pub fn materialized(&self) -> BTreeMap<String, Attributes> {
        self.resources
            .iter()
            .filter_map(|r| match &r.outcome {
                ResourceOutcome::Materialized { attributes } => {
                    Some((r.logical_id.clone(), attributes.clone()))
                }
                _ => None,
            })
            .collect()
    }

    /// First failing logical id and its error
    pub fn first_failure(&self) -> Option<(&str, &str)> {
        self.resources.iter().find_map(|r| match &r.outcome {
            ResourceOutcome::Failed { error } => Some((r.logical_id.as_str(), error.as_str())),
            _ => None,
        })
    }

    /// Resolve the graph's outputs against this result.
    ///
    /// A failed apply is passed through unmodified as [`ApplyFailure`].
    pub fn into_outputs(self, graph: &ResourceGraph) -> Result<Vec<ResolvedOutput>> {
        if let Some(failure) = ApplyFailure::from_result(&self) {
            return Err(failure.into());
        }

        graph
            .outputs
            .iter()
            .map(|output| {
                let value = self
                    .attributes(&output.source.target)
                    .and_then(|attrs| attrs.get(&output.source.attribute))
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
            .collect()
    }
}

/// A failed apply: what succeeded before the first failing resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("apply failed at '{failed_logical_id}': {error} ({} resource(s) succeeded)", .succeeded.len())]
pub struct ApplyFailure {
    pub succeeded: BTreeMap<String, Attributes>,
    pub failed_logical_id: String,
    pub error: String,
}

impl ApplyFailure {
    pub fn from_result(result: &ApplyResult) -> Option<Self> {
        let (failed_logical_id, error) = result.first_failure()?;
        Some(Self {
            succeeded: result.materialized(),
            failed_logical_id: failed_logical_id.to_string(),
            error: error.to_string(),
        })
    }
}

/// Output value after apply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedOutput {
    pub name: String,
    pub value: serde_json::Value,
}
