//! Local simulated engine
//!
//! Materializes declarations without talking to a cloud: attributes are
//! derived from physical names, so the same graph always yields the same
//! values. Grants, uploads and imports go through the real collaborator
//! traits.

use super::{AuthStatus, ProvisioningEngine};
use crate::action::{ApplyResult, Attributes};
use crate::collaborator::{
    AccessManager, AssetUploader, ImportResolver, LocalAccessManager, StaticImportResolver,
};
use crate::error::{CloudError, Result};
use crate::state::StackState;
use async_trait::async_trait;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use stackflow_core::{
    AssetUpload, PropertyValue, ResolveRequest, ResourceDeclaration, ResourceGraph, ResourceKind,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;

const DEFAULT_REGION: &str = "local-1";
const DEFAULT_STAGE: &str = "prod";

/// Engine that simulates provisioning in-process
pub struct LocalEngine {
    region: String,
    access: Arc<dyn AccessManager>,
    uploader: Option<Arc<dyn AssetUploader>>,
    imports: Arc<dyn ImportResolver>,
    fail_on: BTreeSet<String>,
}

impl LocalEngine {
    pub fn new() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            access: Arc::new(LocalAccessManager::new()),
            uploader: None,
            imports: Arc::new(StaticImportResolver::default()),
            fail_on: BTreeSet::new(),
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_access_manager(mut self, access: Arc<dyn AccessManager>) -> Self {
        self.access = access;
        self
    }

    pub fn with_uploader(mut self, uploader: Arc<dyn AssetUploader>) -> Self {
        self.uploader = Some(uploader);
        self
    }

    pub fn with_import_resolver(mut self, imports: Arc<dyn ImportResolver>) -> Self {
        self.imports = imports;
        self
    }

    /// Make the engine report a failure for `logical_id`
    pub fn fail_on(mut self, logical_id: impl Into<String>) -> Self {
        self.fail_on.insert(logical_id.into());
        self
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    fn resolve_properties(
        &self,
        decl: &ResourceDeclaration,
        materialized: &BTreeMap<String, Attributes>,
    ) -> Result<Attributes> {
        let mut resolver = |request: ResolveRequest<'_>| match request {
            ResolveRequest::Reference(r) => materialized
                .get(&r.target)
                .and_then(|attrs| attrs.get(&r.attribute))
                .cloned()
                .ok_or_else(|| format!("attribute {} is not available", r)),
            ResolveRequest::Import(i) => self
                .imports
                .resolve(&i.name)
                .ok_or_else(|| format!("import '{}' is not exported by any stack", i.name)),
        };

        let mut resolved = Attributes::new();
        for (key, value) in &decl.properties {
            let value = value.resolve(&mut resolver).map_err(|e| {
                CloudError::EngineError(format!("{}.{}: {}", decl.logical_id, key, e))
            })?;
            resolved.insert(key.clone(), value);
        }
        Ok(resolved)
    }

    #[tracing::instrument(skip_all, fields(logical_id = %decl.logical_id, kind = %decl.kind))]
    async fn materialize(
        &self,
        graph: &ResourceGraph,
        decl: &ResourceDeclaration,
        materialized: &BTreeMap<String, Attributes>,
    ) -> Result<Attributes> {
        if self.fail_on.contains(&decl.logical_id) {
            return Err(CloudError::EngineError(format!(
                "simulated failure for {}",
                decl.logical_id
            )));
        }

        let mut attrs = self.resolve_properties(decl, materialized)?;
        let physical = graph.physical_name(&decl.logical_id);
        let name = match decl.property("name").and_then(PropertyValue::as_str) {
            Some(explicit) => explicit.to_string(),
            None => physical.clone(),
        };
        let digest = hex::encode(Sha256::digest(physical.as_bytes()));

        attrs.insert("id".to_string(), json!(format!("{}-{}", id_prefix(decl.kind), &digest[..17])));
        attrs.insert(
            "arn".to_string(),
            json!(format!("arn:local:{}:{}:{}", decl.kind, self.region, name)),
        );
        attrs.insert("name".to_string(), json!(name));

        match decl.kind {
            ResourceKind::ComputeInstance => {
                let bytes = Sha256::digest(physical.as_bytes());
                let ip = format!("54.{}.{}.{}", bytes[0], bytes[1], bytes[2]);
                attrs.insert(
                    "public_dns_name".to_string(),
                    json!(format!(
                        "ec2-{}.{}.compute.local",
                        ip.replace('.', "-"),
                        self.region
                    )),
                );
                attrs.insert("public_ip".to_string(), json!(ip));
            }
            ResourceKind::ApiGateway => {
                let stage = decl
                    .property("stage")
                    .and_then(PropertyValue::as_str)
                    .unwrap_or(DEFAULT_STAGE);
                attrs.insert(
                    "url".to_string(),
                    json!(format!(
                        "https://{}.execute-api.{}.local/{}/",
                        &digest[..10],
                        self.region,
                        stage
                    )),
                );
            }
            ResourceKind::Bucket => {
                let website_url = format!(
                    "http://{}.s3-website.{}.local",
                    attrs.get("name").and_then(Value::as_str).unwrap_or_default(),
                    self.region
                );
                attrs.insert("website_url".to_string(), json!(website_url));
            }
            ResourceKind::Role => {
                for grant in graph.grants_for(&decl.logical_id) {
                    self.access
                        .grant(&grant.role, &grant.policy)
                        .await
                        .map_err(|e| CloudError::CollaboratorFailed(e.to_string()))?;
                }
            }
            ResourceKind::AssetDeployment => {
                let (_, upload) = AssetUpload::from_declaration(decl).ok_or_else(|| {
                    CloudError::EngineError(format!(
                        "{} is not a valid asset deployment",
                        decl.logical_id
                    ))
                })?;
                let bucket = attrs
                    .get("bucket")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| {
                        CloudError::EngineError(format!(
                            "{}: bucket name did not resolve to a string",
                            decl.logical_id
                        ))
                    })?;
                let keys = match &self.uploader {
                    Some(uploader) => uploader.upload_asset(&bucket, &upload).await?,
                    None => {
                        tracing::warn!("No asset uploader configured, skipping upload");
                        Vec::new()
                    }
                };
                attrs.insert("object_count".to_string(), json!(keys.len()));
            }
            ResourceKind::Network | ResourceKind::SecurityGroup | ResourceKind::FunctionResource => {}
        }

        tracing::debug!(physical_name = %physical, "Materialized");
        Ok(attrs)
    }
}

impl Default for LocalEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn id_prefix(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Network => "vpc",
        ResourceKind::SecurityGroup => "sg",
        ResourceKind::ComputeInstance => "i",
        ResourceKind::FunctionResource => "fn",
        ResourceKind::ApiGateway => "api",
        ResourceKind::Role => "role",
        ResourceKind::Bucket => "bucket",
        ResourceKind::AssetDeployment => "deploy",
    }
}

#[async_trait]
impl ProvisioningEngine for LocalEngine {
    fn name(&self) -> &str {
        "local"
    }

    fn display_name(&self) -> &str {
        "Local (simulated)"
    }

    async fn check_auth(&self) -> Result<AuthStatus> {
        Ok(AuthStatus::ok(format!("local engine in {}", self.region)))
    }

    #[tracing::instrument(skip_all, fields(stack = %graph.stack))]
    async fn submit(&self, graph: &ResourceGraph) -> Result<ApplyResult> {
        let start = Instant::now();
        let mut result = ApplyResult::new();
        let mut materialized: BTreeMap<String, Attributes> = BTreeMap::new();

        for decl in &graph.resources {
            match self.materialize(graph, decl, &materialized).await {
                Ok(attrs) => {
                    tracing::info!("Materialized {} {}", decl.kind, decl.logical_id);
                    materialized.insert(decl.logical_id.clone(), attrs.clone());
                    result.add_materialized(decl.logical_id.clone(), attrs);
                }
                Err(e) => {
                    tracing::error!("Failed to materialize {}: {}", decl.logical_id, e);
                    result.add_failure(decl.logical_id.clone(), e.to_string());
                    break;
                }
            }
        }

        result.duration_ms = start.elapsed().as_millis() as u64;
        Ok(result)
    }

    #[tracing::instrument(skip_all, fields(stack = %current.stack))]
    async fn destroy(&self, current: &StackState) -> Result<ApplyResult> {
        let start = Instant::now();
        let mut result = ApplyResult::new();

        for (logical_id, resource) in current.teardown_order() {
            if self.fail_on.contains(logical_id) {
                result.add_failure(logical_id, format!("simulated failure for {}", logical_id));
                break;
            }
            tracing::info!("Deleted {} {} ({})", resource.kind, logical_id, resource.id);
            result.add_deleted(logical_id);
        }

        result.duration_ms = start.elapsed().as_millis() as u64;
        Ok(result)
    }
}
