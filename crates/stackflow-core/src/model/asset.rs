//! Static asset deployments
//!
//! A deployment is an ordinary declaration of kind
//! [`ResourceKind::AssetDeployment`] whose `bucket` property references the
//! destination bucket. The upload itself is done by an external
//! collaborator at apply time.

use super::{PropertyValue, Reference, ResourceDeclaration, ResourceKind};
use serde::{Deserialize, Serialize};

/// Attribute of the bucket that the deployment references
pub const BUCKET_NAME_ATTRIBUTE: &str = "name";

/// Parameters of an asset upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetUpload {
    /// Local directory (or file) to upload
    pub source_path: String,

    /// Key prefix inside the bucket
    pub destination_prefix: String,

    /// Content type override; guessed per file when unset
    pub content_type: Option<String>,

    /// Cache-Control value applied to uploaded objects
    pub cache_policy: Option<String>,
}

impl AssetUpload {
    pub fn new(source_path: impl Into<String>) -> Self {
        Self {
            source_path: source_path.into(),
            destination_prefix: String::new(),
            content_type: None,
            cache_policy: None,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.destination_prefix = prefix.into();
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_cache_policy(mut self, cache_policy: impl Into<String>) -> Self {
        self.cache_policy = Some(cache_policy.into());
        self
    }

    /// Turn the upload into a declaration that depends on `bucket_logical_id`
    pub fn into_declaration(
        self,
        logical_id: impl Into<String>,
        bucket_logical_id: impl Into<String>,
    ) -> ResourceDeclaration {
        let mut decl = ResourceDeclaration::new(logical_id, ResourceKind::AssetDeployment)
            .with_property(
                "bucket",
                Reference::new(bucket_logical_id, BUCKET_NAME_ATTRIBUTE),
            )
            .with_property("source", self.source_path)
            .with_property("destination_prefix", self.destination_prefix);
        if let Some(content_type) = self.content_type {
            decl.set_property("content_type", content_type);
        }
        if let Some(cache_policy) = self.cache_policy {
            decl.set_property("cache_policy", cache_policy);
        }
        decl
    }

    /// Read the upload parameters back from a deployment declaration.
    ///
    /// Returns the bucket's logical id together with the upload, or `None`
    /// when the declaration is not a well-formed deployment.
    pub fn from_declaration(decl: &ResourceDeclaration) -> Option<(String, AssetUpload)> {
        if decl.kind != ResourceKind::AssetDeployment {
            return None;
        }
        let bucket = decl
            .property("bucket")
            .and_then(PropertyValue::as_reference)?
            .target
            .clone();
        let upload = AssetUpload {
            source_path: decl.property_str("source")?.to_string(),
            destination_prefix: decl
                .property_str("destination_prefix")
                .unwrap_or_default()
                .to_string(),
            content_type: decl.property_str("content_type").map(str::to_string),
            cache_policy: decl.property_str("cache_policy").map(str::to_string),
        };
        Some((bucket, upload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deployment_depends_on_bucket() {
        let decl = AssetUpload::new("static_web_hosting")
            .with_prefix("site/")
            .with_cache_policy("max-age=300")
            .into_declaration("site", "bucket");

        assert_eq!(decl.kind, ResourceKind::AssetDeployment);
        assert!(decl.referenced_ids().contains("bucket"));

        let (bucket, upload) = AssetUpload::from_declaration(&decl).unwrap();
        assert_eq!(bucket, "bucket");
        assert_eq!(upload.destination_prefix, "site/");
        assert_eq!(upload.cache_policy.as_deref(), Some("max-age=300"));
        assert!(upload.content_type.is_none());
    }

    #[test]
    fn test_from_declaration_ignores_other_kinds() {
        let decl = ResourceDeclaration::new("bucket", ResourceKind::Bucket);
        assert!(AssetUpload::from_declaration(&decl).is_none());
    }
}
