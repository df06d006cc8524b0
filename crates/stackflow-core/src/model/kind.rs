//! Resource kinds

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of infrastructure a declaration describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    /// Virtual network (usually looked up, not created)
    Network,
    /// Firewall rule set attached to a network
    SecurityGroup,
    /// Virtual machine
    ComputeInstance,
    /// Serverless function
    #[serde(rename = "function")]
    FunctionResource,
    /// HTTP API front door
    ApiGateway,
    /// Identity assumed by another resource
    Role,
    /// Object storage bucket
    Bucket,
    /// Static files copied into a bucket
    AssetDeployment,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 8] = [
        ResourceKind::Network,
        ResourceKind::SecurityGroup,
        ResourceKind::ComputeInstance,
        ResourceKind::FunctionResource,
        ResourceKind::ApiGateway,
        ResourceKind::Role,
        ResourceKind::Bucket,
        ResourceKind::AssetDeployment,
    ];

    /// Name used in stack files and serialized graphs
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Network => "network",
            ResourceKind::SecurityGroup => "security-group",
            ResourceKind::ComputeInstance => "compute-instance",
            ResourceKind::FunctionResource => "function",
            ResourceKind::ApiGateway => "api-gateway",
            ResourceKind::Role => "role",
            ResourceKind::Bucket => "bucket",
            ResourceKind::AssetDeployment => "asset-deployment",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "network" | "vpc" => Ok(ResourceKind::Network),
            "security-group" => Ok(ResourceKind::SecurityGroup),
            "compute-instance" | "instance" => Ok(ResourceKind::ComputeInstance),
            "function" | "function-resource" => Ok(ResourceKind::FunctionResource),
            "api-gateway" => Ok(ResourceKind::ApiGateway),
            "role" => Ok(ResourceKind::Role),
            "bucket" => Ok(ResourceKind::Bucket),
            "asset-deployment" => Ok(ResourceKind::AssetDeployment),
            other => Err(format!("unknown resource kind: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trips_through_its_name() {
        for kind in ResourceKind::ALL {
            assert_eq!(kind.as_str().parse::<ResourceKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_kind_aliases() {
        assert_eq!("VPC".parse::<ResourceKind>().unwrap(), ResourceKind::Network);
        assert_eq!(
            "security_group".parse::<ResourceKind>().unwrap(),
            ResourceKind::SecurityGroup
        );
        assert!("queue".parse::<ResourceKind>().is_err());
    }

    #[test]
    fn test_serde_name_matches_display() {
        for kind in ResourceKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind));
        }
    }
}
