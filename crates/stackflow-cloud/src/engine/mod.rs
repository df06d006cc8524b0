//! Provisioning engine trait definition

mod local;

pub use local::LocalEngine;

use crate::action::{ApplyResult, Plan, diff};
use crate::error::Result;
use crate::state::StackState;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use stackflow_core::ResourceGraph;

/// Provisioning engine abstraction trait
///
/// An engine receives a validated [`ResourceGraph`] and materializes it.
/// Failures are reported per logical id inside the [`ApplyResult`]; an
/// `Err` from `submit` means the engine could not run at all.
#[async_trait]
pub trait ProvisioningEngine: Send + Sync {
    /// Returns the engine name (e.g., "local")
    fn name(&self) -> &str;

    /// Returns the engine display name for UI
    fn display_name(&self) -> &str;

    /// Check if the engine is properly configured and authenticated
    async fn check_auth(&self) -> Result<AuthStatus>;

    /// Calculate the diff between the desired graph and recorded state
    fn plan(&self, graph: &ResourceGraph, current: &StackState) -> Plan {
        diff(graph, current)
    }

    /// Materialize every declaration in topological order
    async fn submit(&self, graph: &ResourceGraph) -> Result<ApplyResult>;

    /// Delete every recorded resource, dependents first
    async fn destroy(&self, current: &StackState) -> Result<ApplyResult>;
}

/// Authentication status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthStatus {
    /// Whether authentication is valid
    pub authenticated: bool,

    /// Account/user information if available
    pub account_info: Option<String>,

    /// Error message if not authenticated
    pub error: Option<String>,
}

impl AuthStatus {
    pub fn ok(account_info: impl Into<String>) -> Self {
        Self {
            authenticated: true,
            account_info: Some(account_info.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            authenticated: false,
            account_info: None,
            error: Some(error.into()),
        }
    }
}
