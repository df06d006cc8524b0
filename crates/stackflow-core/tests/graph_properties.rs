//! Ordering and determinism properties of the graph builder

use proptest::prelude::*;
use stackflow_core::{GraphBuilder, GraphError, ResourceDeclaration, ResourceKind};

/// Random DAG: node i may only reference nodes with a smaller index, then
/// declarations are added in a shuffled order so references are often forward.
fn dag_strategy() -> impl Strategy<Value = (Vec<Vec<usize>>, Vec<usize>)> {
    (1usize..12)
        .prop_flat_map(|n| {
            let edges = (0..n)
                .map(|i| prop::collection::vec(0..i.max(1), 0..=i.min(3)))
                .collect::<Vec<_>>();
            (edges, Just((0..n).collect::<Vec<_>>()).prop_shuffle())
        })
        .prop_map(|(edges, order)| {
            let edges = edges
                .into_iter()
                .enumerate()
                .map(|(i, deps)| deps.into_iter().filter(|&d| d < i).collect())
                .collect();
            (edges, order)
        })
}

fn builder_for(edges: &[Vec<usize>], order: &[usize]) -> GraphBuilder {
    let mut builder = GraphBuilder::new("prop");
    for &i in order {
        let mut decl = ResourceDeclaration::new(format!("r{}", i), ResourceKind::Bucket);
        for (n, &dep) in edges[i].iter().enumerate() {
            decl = decl.with_property(format!("dep{}", n), builder.reference(format!("r{}", dep), "id"));
        }
        builder.add(decl).unwrap();
    }
    builder
}

proptest! {
    #[test]
    fn every_declaration_follows_its_dependencies((edges, order) in dag_strategy()) {
        let graph = builder_for(&edges, &order).build().unwrap();
        let ids = graph.order();
        prop_assert_eq!(ids.len(), edges.len());

        let position = |id: &str| ids.iter().position(|x| *x == id).unwrap();
        for decl in &graph.resources {
            for dep in &decl.depends_on {
                prop_assert!(position(dep.as_str()) < position(decl.logical_id.as_str()));
            }
        }
    }

    #[test]
    fn identical_inputs_serialize_identically((edges, order) in dag_strategy()) {
        let first = builder_for(&edges, &order).build().unwrap();
        let second = builder_for(&edges, &order).build().unwrap();
        prop_assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
        prop_assert_eq!(first.fingerprint().unwrap(), second.fingerprint().unwrap());
    }

    #[test]
    fn duplicate_ids_always_rejected(
        kind_a in 0usize..8,
        kind_b in 0usize..8,
        key in prop_oneof![Just(String::new()), Just("  ".to_string()), "[a-z]{1,8}"],
        target in prop_oneof![Just("my vpc".to_string()), Just(String::new()), "[a-z]{1,8}"],
        attribute in prop_oneof![Just(String::new()), "[a-z]{1,8}"],
        value in ".*",
    ) {
        let mut builder = GraphBuilder::new("prop");
        builder
            .add(ResourceDeclaration::new("a", ResourceKind::ALL[kind_a]))
            .unwrap();
        let reference = builder.reference(target, attribute);
        let err = builder
            .add(
                ResourceDeclaration::new("a", ResourceKind::ALL[kind_b])
                    .with_property(key, value)
                    .with_property("ref", reference),
            )
            .unwrap_err();
        prop_assert_eq!(err, GraphError::DuplicateIdentifier("a".to_string()));
        prop_assert_eq!(
            builder.build().unwrap_err(),
            GraphError::DuplicateIdentifier("a".to_string())
        );
    }
}

#[test]
fn serialized_graph_round_trips() {
    let mut builder = GraphBuilder::new("demo");
    builder
        .add(ResourceDeclaration::new("sg", ResourceKind::SecurityGroup))
        .unwrap();
    let sg = builder.reference("sg", "id");
    builder
        .add(ResourceDeclaration::new("vm", ResourceKind::ComputeInstance).with_property("sg", sg))
        .unwrap();
    builder
        .output("DNS", builder.reference("vm", "public_dns_name"))
        .unwrap();

    let graph = builder.build().unwrap();
    let json = graph.to_json().unwrap();
    let back: stackflow_core::ResourceGraph = serde_json::from_str(&json).unwrap();
    assert_eq!(back, graph);
    assert_eq!(back.to_json().unwrap(), json);
}
