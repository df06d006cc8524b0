//! Resource graph builder
//!
//! Collects declarations, outputs and grants, then validates them into a
//! [`ResourceGraph`] in one `build()` call.
//!
//! ```text
//!          build() ok
//!   Open ─────────────► Built
//!     │
//!     └───────────────► Failed
//!          build() err
//! ```
//!
//! Neither `Built` nor `Failed` accepts further calls; use a fresh builder.

use crate::error::GraphError;
use crate::model::{
    AssetUpload, Grant, Import, LogicalId, Output, PropertyValue, Reference, ResourceDeclaration,
    ResourceGraph, ResourceKind,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, warn};

type Result<T> = std::result::Result<T, GraphError>;

/// Lifecycle state of a [`GraphBuilder`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuilderState {
    /// Accepting declarations
    Open,
    /// Graph finalized
    Built,
    /// Validation failed
    Failed,
}

impl fmt::Display for BuilderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuilderState::Open => write!(f, "open"),
            BuilderState::Built => write!(f, "built"),
            BuilderState::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Builder for one deployment unit.
///
/// Not shared across threads: give each deployment its own builder.
#[derive(Debug)]
pub struct GraphBuilder {
    stack: String,
    state: BuilderState,
    declarations: Vec<ResourceDeclaration>,
    index: HashMap<String, usize>,
    duplicates: Vec<String>,
    outputs: Vec<Output>,
    grants: Vec<Grant>,
}

impl GraphBuilder {
    pub fn new(stack: impl Into<String>) -> Self {
        Self {
            stack: stack.into(),
            state: BuilderState::Open,
            declarations: Vec::new(),
            index: HashMap::new(),
            duplicates: Vec::new(),
            outputs: Vec::new(),
            grants: Vec::new(),
        }
    }

    pub fn stack_name(&self) -> &str {
        &self.stack
    }

    /// Rename the stack; only meaningful while the builder is open
    pub fn set_stack_name(&mut self, stack: impl Into<String>) -> Result<()> {
        self.ensure_open()?;
        self.stack = stack.into();
        Ok(())
    }

    pub fn state(&self) -> BuilderState {
        self.state
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    pub fn contains(&self, logical_id: &str) -> bool {
        self.index.contains_key(logical_id)
    }

    /// Register a declaration.
    ///
    /// Edges to every referenced logical id are recorded here; the targets
    /// themselves may be added later. A duplicate id is rejected and also
    /// remembered, so `build()` fails even if the error is ignored.
    pub fn add(&mut self, declaration: ResourceDeclaration) -> Result<LogicalId> {
        self.ensure_open()?;
        validate_identifier(&declaration.logical_id)?;

        let logical_id = declaration.logical_id.clone();
        if self.index.contains_key(&logical_id) {
            warn!(logical_id = %logical_id, "Duplicate logical id");
            self.duplicates.push(logical_id.clone());
            return Err(GraphError::DuplicateIdentifier(logical_id));
        }
        validate_properties(&declaration)?;

        let mut declaration = declaration;
        let referenced = declaration.referenced_ids();
        declaration.depends_on.extend(referenced);

        debug!(
            logical_id = %logical_id,
            kind = %declaration.kind,
            depends_on = declaration.depends_on.len(),
            "Added declaration"
        );
        self.index.insert(logical_id.clone(), self.declarations.len());
        self.declarations.push(declaration);
        Ok(logical_id)
    }

    /// Create a reference to `logical_id.attribute`; the target need not exist yet
    pub fn reference(&self, logical_id: impl Into<String>, attribute: impl Into<String>) -> Reference {
        Reference::new(logical_id, attribute)
    }

    /// Cross-stack import, resolved by the engine's import resolver
    pub fn import(&self, name: impl Into<String>) -> PropertyValue {
        PropertyValue::Import(Import::new(name))
    }

    /// Register a named output bound to `reference`
    pub fn output(&mut self, name: impl Into<String>, reference: Reference) -> Result<()> {
        self.ensure_open()?;
        let name = name.into();
        if self.outputs.iter().any(|o| o.name == name) {
            return Err(GraphError::DuplicateOutput(name));
        }
        self.outputs.push(Output {
            name,
            source: reference,
        });
        Ok(())
    }

    /// Attach a permission policy to a role declaration.
    ///
    /// The role must be declared by the time `build()` runs.
    pub fn grant(&mut self, role_logical_id: impl Into<String>, policy_name: impl Into<String>) -> Result<()> {
        self.ensure_open()?;
        let role = role_logical_id.into();
        let policy = policy_name.into();
        if policy.trim().is_empty() {
            return Err(GraphError::InvalidProperty {
                id: role,
                message: "grant requires a policy name".to_string(),
            });
        }
        if !self.grants.iter().any(|g| g.role == role && g.policy == policy) {
            self.grants.push(Grant { role, policy });
        }
        Ok(())
    }

    /// Declare a static asset deployment into `bucket_logical_id`
    pub fn upload_asset(
        &mut self,
        logical_id: impl Into<String>,
        bucket_logical_id: impl Into<String>,
        upload: AssetUpload,
    ) -> Result<LogicalId> {
        self.add(upload.into_declaration(logical_id, bucket_logical_id))
    }

    /// Validate and freeze the graph.
    ///
    /// Checks duplicates, then dangling references, then cycles.
    pub fn build(&mut self) -> Result<ResourceGraph> {
        self.ensure_open()?;
        match self.validate_and_sort() {
            Ok(graph) => {
                self.state = BuilderState::Built;
                debug!(
                    stack = %self.stack,
                    resources = graph.resources.len(),
                    outputs = graph.outputs.len(),
                    "Graph built"
                );
                Ok(graph)
            }
            Err(e) => {
                self.state = BuilderState::Failed;
                warn!(stack = %self.stack, error = %e, "Graph validation failed");
                Err(e)
            }
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.state == BuilderState::Open {
            Ok(())
        } else {
            Err(GraphError::BuilderClosed(self.state))
        }
    }

    fn validate_and_sort(&self) -> Result<ResourceGraph> {
        if let Some(duplicate) = self.duplicates.first() {
            return Err(GraphError::DuplicateIdentifier(duplicate.clone()));
        }

        self.check_dangling()?;
        self.check_grant_kinds()?;

        let order = self.topological_order()?;

        Ok(ResourceGraph {
            stack: self.stack.clone(),
            resources: order
                .into_iter()
                .map(|i| self.declarations[i].clone())
                .collect(),
            outputs: self.outputs.clone(),
            grants: self.grants.clone(),
        })
    }

    fn check_dangling(&self) -> Result<()> {
        for decl in &self.declarations {
            if let Some(target) = decl.depends_on.iter().find(|d| !self.index.contains_key(*d)) {
                return Err(GraphError::DanglingReference {
                    from: decl.logical_id.clone(),
                    target: target.clone(),
                });
            }
        }
        for output in &self.outputs {
            if !self.index.contains_key(&output.source.target) {
                return Err(GraphError::DanglingReference {
                    from: format!("output '{}'", output.name),
                    target: output.source.target.clone(),
                });
            }
        }
        for grant in &self.grants {
            if !self.index.contains_key(&grant.role) {
                return Err(GraphError::DanglingReference {
                    from: format!("grant '{}'", grant.policy),
                    target: grant.role.clone(),
                });
            }
        }
        Ok(())
    }

    fn check_grant_kinds(&self) -> Result<()> {
        for grant in &self.grants {
            let Some(decl) = self.lookup(&grant.role) else {
                continue;
            };
            if decl.kind != ResourceKind::Role {
                return Err(GraphError::KindMismatch {
                    id: grant.role.clone(),
                    expected: ResourceKind::Role.to_string(),
                    found: decl.kind.to_string(),
                });
            }
        }
        Ok(())
    }

    fn lookup(&self, logical_id: &str) -> Option<&ResourceDeclaration> {
        self.index.get(logical_id).map(|&i| &self.declarations[i])
    }

    /// DFS post-order with an explicit stack of `(node, next dependency)`
    /// frames. Roots and dependencies are visited in insertion order.
    fn topological_order(&self) -> Result<Vec<usize>> {
        let n = self.declarations.len();
        let deps: Vec<Vec<usize>> = self
            .declarations
            .iter()
            .map(|decl| {
                let mut deps: Vec<usize> = decl
                    .depends_on
                    .iter()
                    .filter_map(|d| self.index.get(d).copied())
                    .collect();
                deps.sort_unstable();
                deps
            })
            .collect();

        let mut marks = vec![Mark::Unvisited; n];
        let mut order = Vec::with_capacity(n);
        let mut stack: Vec<(usize, usize)> = Vec::new();

        for root in 0..n {
            if marks[root] != Mark::Unvisited {
                continue;
            }
            marks[root] = Mark::InProgress;
            stack.push((root, 0));

            while let Some(&(node, cursor)) = stack.last() {
                let Some(&dep) = deps[node].get(cursor) else {
                    stack.pop();
                    marks[node] = Mark::Done;
                    order.push(node);
                    continue;
                };
                let top = stack.len() - 1;
                stack[top].1 += 1;

                match marks[dep] {
                    Mark::Done => {}
                    Mark::Unvisited => {
                        marks[dep] = Mark::InProgress;
                        stack.push((dep, 0));
                    }
                    Mark::InProgress => {
                        let start = stack.iter().position(|&(p, _)| p == dep).unwrap_or(0);
                        let mut cycle: Vec<String> = stack[start..]
                            .iter()
                            .map(|&(p, _)| self.declarations[p].logical_id.clone())
                            .collect();
                        cycle.push(self.declarations[dep].logical_id.clone());
                        return Err(GraphError::CycleDetected(cycle));
                    }
                }
            }
        }

        Ok(order)
    }
}

fn validate_identifier(logical_id: &str) -> Result<()> {
    if logical_id.is_empty()
        || logical_id.contains('.')
        || logical_id.chars().any(char::is_whitespace)
    {
        return Err(GraphError::InvalidIdentifier(logical_id.to_string()));
    }
    Ok(())
}

fn validate_properties(decl: &ResourceDeclaration) -> Result<()> {
    if decl.properties.keys().any(|k| k.trim().is_empty()) {
        return Err(GraphError::InvalidProperty {
            id: decl.logical_id.clone(),
            message: "property names must not be empty".to_string(),
        });
    }
    for reference in decl.references() {
        if reference.attribute.trim().is_empty() {
            return Err(GraphError::InvalidProperty {
                id: decl.logical_id.clone(),
                message: format!("reference to '{}' has no attribute", reference.target),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sg_vm_builder() -> GraphBuilder {
        let mut builder = GraphBuilder::new("test");
        builder
            .add(ResourceDeclaration::new("sg", ResourceKind::SecurityGroup))
            .unwrap();
        let sg_id = builder.reference("sg", "id");
        builder
            .add(
                ResourceDeclaration::new("vm", ResourceKind::ComputeInstance)
                    .with_property("sg", sg_id),
            )
            .unwrap();
        builder
    }

    #[test]
    fn test_build_orders_dependencies_first() {
        let mut builder = sg_vm_builder();
        let graph = builder.build().unwrap();
        assert_eq!(graph.order(), vec!["sg", "vm"]);
        assert_eq!(builder.state(), BuilderState::Built);
    }

    #[test]
    fn test_forward_reference_is_legal_until_build() {
        let mut builder = GraphBuilder::new("test");
        let later = builder.reference("sg", "id");
        builder
            .add(ResourceDeclaration::new("vm", ResourceKind::ComputeInstance).with_property("sg", later))
            .unwrap();
        builder
            .add(ResourceDeclaration::new("sg", ResourceKind::SecurityGroup))
            .unwrap();

        let graph = builder.build().unwrap();
        assert_eq!(graph.order(), vec!["sg", "vm"]);
    }

    #[test]
    fn test_duplicate_identifier() {
        let mut builder = GraphBuilder::new("test");
        builder
            .add(ResourceDeclaration::new("a", ResourceKind::Bucket))
            .unwrap();
        let err = builder
            .add(ResourceDeclaration::new("a", ResourceKind::Role))
            .unwrap_err();
        assert_eq!(err, GraphError::DuplicateIdentifier("a".to_string()));

        // Still remembered at build time
        assert_eq!(
            builder.build().unwrap_err(),
            GraphError::DuplicateIdentifier("a".to_string())
        );
        assert_eq!(builder.state(), BuilderState::Failed);
    }

    #[test]
    fn test_dangling_reference_fails_at_build_only() {
        let mut builder = GraphBuilder::new("test");
        let missing = builder.reference("ghost", "id");
        assert!(
            builder
                .add(ResourceDeclaration::new("vm", ResourceKind::ComputeInstance).with_property("sg", missing))
                .is_ok()
        );

        let err = builder.build().unwrap_err();
        assert_eq!(
            err,
            GraphError::DanglingReference {
                from: "vm".to_string(),
                target: "ghost".to_string()
            }
        );
    }

    #[test]
    fn test_duplicate_wins_over_bad_properties() {
        let mut builder = GraphBuilder::new("test");
        builder
            .add(ResourceDeclaration::new("a", ResourceKind::Bucket))
            .unwrap();
        let err = builder
            .add(ResourceDeclaration::new("a", ResourceKind::Bucket).with_property("", "x"))
            .unwrap_err();
        assert_eq!(err, GraphError::DuplicateIdentifier("a".to_string()));
        assert_eq!(
            builder.build().unwrap_err(),
            GraphError::DuplicateIdentifier("a".to_string())
        );
    }

    #[test]
    fn test_malformed_reference_target_is_dangling_at_build() {
        let mut builder = GraphBuilder::new("test");
        builder
            .add(
                ResourceDeclaration::new("vm", ResourceKind::ComputeInstance)
                    .with_property("vpc", Reference::new("my vpc", "id"))
                    .with_dependency("not.an.id"),
            )
            .unwrap();

        assert_eq!(
            builder.build().unwrap_err(),
            GraphError::DanglingReference {
                from: "vm".to_string(),
                target: "my vpc".to_string()
            }
        );
    }

    #[test]
    fn test_deep_chain_builds_without_recursion() {
        const DEPTH: usize = 100_000;
        let mut builder = GraphBuilder::new("deep");
        for i in 0..DEPTH {
            let mut decl = ResourceDeclaration::new(format!("r{i}"), ResourceKind::Bucket);
            if i + 1 < DEPTH {
                decl = decl.with_property("next", builder.reference(format!("r{}", i + 1), "id"));
            }
            builder.add(decl).unwrap();
        }

        let graph = builder.build().unwrap();
        let order = graph.order();
        assert_eq!(order.len(), DEPTH);
        assert_eq!(order[0], format!("r{}", DEPTH - 1));
        assert_eq!(order[DEPTH - 1], "r0");
    }

    #[test]
    fn test_deep_cycle_reports_full_path() {
        const DEPTH: usize = 50_000;
        let mut builder = GraphBuilder::new("deep");
        for i in 0..DEPTH {
            let next = format!("r{}", (i + 1) % DEPTH);
            builder
                .add(
                    ResourceDeclaration::new(format!("r{i}"), ResourceKind::Role)
                        .with_property("next", builder.reference(next, "id")),
                )
                .unwrap();
        }

        match builder.build().unwrap_err() {
            GraphError::CycleDetected(path) => {
                assert_eq!(path.len(), DEPTH + 1);
                assert_eq!(path.first(), path.last());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_dangling_output() {
        let mut builder = sg_vm_builder();
        builder
            .output("Public DNS", builder.reference("web", "public_dns_name"))
            .unwrap();
        match builder.build().unwrap_err() {
            GraphError::DanglingReference { target, .. } => assert_eq!(target, "web"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_cycle_detected_with_path() {
        let mut builder = GraphBuilder::new("test");
        for (id, next) in [("a", "b"), ("b", "c"), ("c", "a")] {
            let r = builder.reference(next, "id");
            builder
                .add(ResourceDeclaration::new(id, ResourceKind::Role).with_property("next", r))
                .unwrap();
        }

        let err = builder.build().unwrap_err();
        assert_eq!(
            err,
            GraphError::CycleDetected(vec![
                "a".to_string(),
                "b".to_string(),
                "c".to_string(),
                "a".to_string()
            ])
        );
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let mut builder = GraphBuilder::new("test");
        let me = builder.reference("a", "id");
        builder
            .add(ResourceDeclaration::new("a", ResourceKind::Role).with_property("me", me))
            .unwrap();
        assert!(matches!(
            builder.build(),
            Err(GraphError::CycleDetected(_))
        ));
    }

    #[test]
    fn test_closed_builder_rejects_calls() {
        let mut builder = sg_vm_builder();
        builder.build().unwrap();

        let err = builder
            .add(ResourceDeclaration::new("late", ResourceKind::Bucket))
            .unwrap_err();
        assert_eq!(err, GraphError::BuilderClosed(BuilderState::Built));
        assert!(builder.build().is_err());
    }

    #[test]
    fn test_insertion_order_breaks_ties() {
        let mut builder = GraphBuilder::new("test");
        for id in ["zeta", "alpha", "mid"] {
            builder
                .add(ResourceDeclaration::new(id, ResourceKind::Bucket))
                .unwrap();
        }
        let graph = builder.build().unwrap();
        assert_eq!(graph.order(), vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_dependencies_visited_in_insertion_order() {
        let mut builder = GraphBuilder::new("test");
        let r_zeta = builder.reference("zeta", "id");
        let r_alpha = builder.reference("alpha", "id");
        builder
            .add(
                ResourceDeclaration::new("app", ResourceKind::FunctionResource)
                    .with_property("a", r_alpha)
                    .with_property("z", r_zeta),
            )
            .unwrap();
        builder
            .add(ResourceDeclaration::new("zeta", ResourceKind::Role))
            .unwrap();
        builder
            .add(ResourceDeclaration::new("alpha", ResourceKind::Role))
            .unwrap();

        let graph = builder.build().unwrap();
        assert_eq!(graph.order(), vec!["zeta", "alpha", "app"]);
    }

    #[test]
    fn test_grant_requires_role_kind() {
        let mut builder = GraphBuilder::new("test");
        builder
            .add(ResourceDeclaration::new("bucket", ResourceKind::Bucket))
            .unwrap();
        builder.grant("bucket", "ReadOnly").unwrap();

        assert!(matches!(
            builder.build(),
            Err(GraphError::KindMismatch { .. })
        ));
    }

    #[test]
    fn test_grant_on_missing_role_is_dangling() {
        let mut builder = GraphBuilder::new("test");
        builder.grant("lambda-role", "BasicExecution").unwrap();
        assert!(matches!(
            builder.build(),
            Err(GraphError::DanglingReference { .. })
        ));
    }

    #[test]
    fn test_upload_asset_depends_on_bucket() {
        let mut builder = GraphBuilder::new("test");
        builder
            .upload_asset("site", "bucket", AssetUpload::new("static"))
            .unwrap();
        builder
            .add(ResourceDeclaration::new("bucket", ResourceKind::Bucket))
            .unwrap();

        let graph = builder.build().unwrap();
        assert_eq!(graph.order(), vec!["bucket", "site"]);
    }

    #[test]
    fn test_duplicate_output_rejected() {
        let mut builder = sg_vm_builder();
        builder.output("id", builder.reference("vm", "id")).unwrap();
        assert_eq!(
            builder.output("id", builder.reference("sg", "id")).unwrap_err(),
            GraphError::DuplicateOutput("id".to_string())
        );
    }

    #[test]
    fn test_invalid_identifiers() {
        let mut builder = GraphBuilder::new("test");
        for bad in ["", "has space", "dotted.id"] {
            assert_eq!(
                builder
                    .add(ResourceDeclaration::new(bad, ResourceKind::Bucket))
                    .unwrap_err(),
                GraphError::InvalidIdentifier(bad.to_string())
            );
        }
        assert!(builder.is_empty());
    }

    #[test]
    fn test_reference_without_attribute_rejected() {
        let mut builder = GraphBuilder::new("test");
        let err = builder
            .add(
                ResourceDeclaration::new("vm", ResourceKind::ComputeInstance)
                    .with_property("sg", Reference::new("sg", "")),
            )
            .unwrap_err();
        assert!(matches!(err, GraphError::InvalidProperty { .. }));
    }

    #[test]
    fn test_explicit_dependency() {
        let mut builder = GraphBuilder::new("test");
        builder
            .add(ResourceDeclaration::new("api", ResourceKind::ApiGateway).with_dependency("fn"))
            .unwrap();
        builder
            .add(ResourceDeclaration::new("fn", ResourceKind::FunctionResource))
            .unwrap();
        assert_eq!(builder.build().unwrap().order(), vec!["fn", "api"]);
    }
}
