//! StackFlow provisioning boundary
//!
//! This crate takes validated resource graphs from `stackflow-core` and
//! hands them to a provisioning engine, keeping track of what was
//! materialized between runs.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  StackFlow CLI                   │
//! │              (stack plan/apply)                  │
//! └─────────────────┬───────────────────────────────┘
//!                   │ ResourceGraph
//! ┌─────────────────▼───────────────────────────────┐
//! │               stackflow-cloud                    │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │  trait ProvisioningEngine { submit, .. } │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────────┐  ┌──────────────┐            │
//! │  │  Plan/Diff   │  │  State Mgmt  │            │
//! │  └──────────────┘  └──────────────┘            │
//! └───────┬─────────────────┬───────────────────────┘
//!         │                 │
//! ┌───────▼───────┐ ┌───────▼────────┐
//! │ AccessManager │ │ AssetUploader  │  ImportResolver
//! └───────────────┘ └────────────────┘
//! ```

pub mod action;
pub mod collaborator;
pub mod engine;
pub mod error;
pub mod state;

// Re-exports
pub use action::{
    Action, ActionType, ApplyFailure, ApplyResult, Attributes, Plan, PlanSummary,
    ResolvedOutput, ResourceOutcome, ResourceResult, declaration_hash, diff,
};
pub use collaborator::{
    AccessManager, AssetUploader, FsAssetUploader, ImportResolver, LocalAccessManager,
    StaticImportResolver,
};
pub use engine::{AuthStatus, LocalEngine, ProvisioningEngine};
pub use error::{CloudError, Result};
pub use state::{ResourceState, ResourceStatus, StackState, StateLock, StateManager};
