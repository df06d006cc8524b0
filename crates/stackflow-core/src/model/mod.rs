//! Graph model
//!
//! Declarations, property values and the finished [`ResourceGraph`].

mod asset;
mod declaration;
mod graph;
mod kind;
mod property;

// Re-exports
pub use asset::*;
pub use declaration::*;
pub use graph::*;
pub use kind::*;
pub use property::*;

/// Caller-chosen name of a declaration, unique within one graph.
pub type LogicalId = String;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declaration_collects_nested_references() {
        let decl = ResourceDeclaration::new("vm", ResourceKind::ComputeInstance)
            .with_property("security_group", Reference::new("sg", "id"))
            .with_property(
                "network",
                PropertyValue::Map(
                    [("vpc".to_string(), Reference::new("vpc", "id").into())]
                        .into_iter()
                        .collect(),
                ),
            )
            .with_property(
                "extra",
                PropertyValue::List(vec![
                    "plain".into(),
                    Reference::new("sg", "arn").into(),
                ]),
            );

        let targets: Vec<&str> = decl.references().map(|r| r.target.as_str()).collect();
        assert_eq!(targets, vec!["sg", "vpc", "sg"]);
        assert_eq!(
            decl.referenced_ids().into_iter().collect::<Vec<_>>(),
            vec!["sg".to_string(), "vpc".to_string()]
        );
    }

    #[test]
    fn test_imports_do_not_count_as_references() {
        let decl = ResourceDeclaration::new("site", ResourceKind::AssetDeployment)
            .with_property("bucket", PropertyValue::Import(Import::new("shared:bucket")));

        assert_eq!(decl.references().count(), 0);
        assert_eq!(decl.imports().count(), 1);
    }

    #[test]
    fn test_declaration_serialization() {
        let decl = ResourceDeclaration::new("sg", ResourceKind::SecurityGroup)
            .with_property("description", "Allow HTTP")
            .with_property("allow_all_outbound", true);

        let json = serde_json::to_string(&decl).unwrap();
        assert!(json.contains("\"kind\":\"security-group\""));

        let back: ResourceDeclaration = serde_json::from_str(&json).unwrap();
        assert_eq!(back, decl);
    }
}
