//! Finished resource graphs

use super::{Reference, ResourceDeclaration};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Length of the hash suffix appended to physical names
const PHYSICAL_NAME_HASH_LEN: usize = 8;

/// Physical names longer than this are truncated before the suffix
const PHYSICAL_NAME_MAX_LEN: usize = 63;

/// Named, user-facing value read from a materialized resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    pub name: String,
    pub source: Reference,
}

/// Permission policy attached to a role declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    /// Logical id of the role
    pub role: String,

    /// Policy name understood by the access manager
    pub policy: String,
}

/// Validated, immutable dependency graph.
///
/// `resources` is in topological order: every declaration appears after
/// all of the declarations it depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceGraph {
    /// Stack name, used as the physical name prefix
    pub stack: String,

    pub resources: Vec<ResourceDeclaration>,

    pub outputs: Vec<Output>,

    pub grants: Vec<Grant>,
}

impl ResourceGraph {
    pub fn get(&self, logical_id: &str) -> Option<&ResourceDeclaration> {
        self.resources.iter().find(|r| r.logical_id == logical_id)
    }

    pub fn contains(&self, logical_id: &str) -> bool {
        self.get(logical_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Logical ids in apply order
    pub fn order(&self) -> Vec<&str> {
        self.resources.iter().map(|r| r.logical_id.as_str()).collect()
    }

    /// Grants attached to a role
    pub fn grants_for(&self, role: &str) -> impl Iterator<Item = &Grant> {
        self.grants.iter().filter(move |g| g.role == role)
    }

    /// Deterministic provider-side name for a declaration.
    ///
    /// The same stack and logical id always yield the same name, so
    /// repeated applies address the same physical resource.
    pub fn physical_name(&self, logical_id: &str) -> String {
        physical_name(&self.stack, logical_id)
    }

    /// Canonical JSON form; byte-identical for identical builder input
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// SHA-256 of the canonical JSON form, hex encoded
    pub fn fingerprint(&self) -> serde_json::Result<String> {
        let json = serde_json::to_vec(self)?;
        Ok(hex::encode(Sha256::digest(&json)))
    }
}

/// Derive `{stack}-{logical_id}-{hash}` with characters outside
/// `[a-z0-9-]` replaced by `-`.
pub fn physical_name(stack: &str, logical_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(stack.as_bytes());
    hasher.update([0u8]);
    hasher.update(logical_id.as_bytes());
    let digest = hex::encode(hasher.finalize());
    let suffix = &digest[..PHYSICAL_NAME_HASH_LEN];

    let base = sanitize(&format!("{}-{}", stack, logical_id));
    let max_base = PHYSICAL_NAME_MAX_LEN - PHYSICAL_NAME_HASH_LEN - 1;
    let base = if base.len() > max_base {
        base[..max_base].trim_end_matches('-')
    } else {
        base.as_str()
    };
    format!("{}-{}", base, suffix)
}

fn sanitize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last_dash = false;
    for c in raw.chars() {
        let c = c.to_ascii_lowercase();
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            out.push(c);
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    out.trim_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_physical_name_is_stable() {
        let a = physical_name("cdk-101", "awsug_s3_bucket");
        let b = physical_name("cdk-101", "awsug_s3_bucket");
        assert_eq!(a, b);
        assert!(a.starts_with("cdk-101-awsug-s3-bucket-"));
        assert_eq!(a.len(), "cdk-101-awsug-s3-bucket-".len() + PHYSICAL_NAME_HASH_LEN);
    }

    #[test]
    fn test_physical_name_differs_per_stack() {
        assert_ne!(physical_name("a", "bucket"), physical_name("b", "bucket"));
    }

    #[test]
    fn test_physical_name_truncates_long_ids() {
        let long_id = "x".repeat(200);
        let name = physical_name("stack", &long_id);
        assert!(name.len() <= PHYSICAL_NAME_MAX_LEN);
    }

    #[test]
    fn test_sanitize_collapses_separators() {
        assert_eq!(sanitize("API Gateway__URL"), "api-gateway-url");
    }
}
