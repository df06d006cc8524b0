use crate::context;
use colored::Colorize;
use stackflow_core::ResourceGraph;
use std::path::Path;

pub async fn handle(file: Option<&Path>, json: bool, dot: bool) -> anyhow::Result<()> {
    let loaded = context::load_stack(file)?;
    let graph = &loaded.graph;

    if json {
        println!("{}", graph.to_json()?);
    } else if dot {
        print!("{}", to_dot(graph));
    } else {
        println!("Apply order for {}:", graph.stack.cyan());
        for (i, decl) in graph.resources.iter().enumerate() {
            println!("  {:>2}. {} ({})", i + 1, decl.logical_id.bold(), decl.kind);
            if !decl.depends_on.is_empty() {
                let deps: Vec<&str> = decl.depends_on.iter().map(String::as_str).collect();
                println!("      depends on: {}", deps.join(", ").dimmed());
            }
        }
    }

    Ok(())
}

/// Graphviz rendering; edges point from dependency to dependent
fn to_dot(graph: &ResourceGraph) -> String {
    let mut out = format!("digraph \"{}\" {{\n", graph.stack);
    for decl in &graph.resources {
        out.push_str(&format!(
            "  \"{}\" [label=\"{}\\n{}\"];\n",
            decl.logical_id, decl.logical_id, decl.kind
        ));
    }
    for decl in &graph.resources {
        for dep in &decl.depends_on {
            out.push_str(&format!("  \"{}\" -> \"{}\";\n", dep, decl.logical_id));
        }
    }
    out.push_str("}\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackflow_core::{GraphBuilder, ResourceDeclaration, ResourceKind};

    #[test]
    fn test_to_dot_has_edges() {
        let mut builder = GraphBuilder::new("demo");
        builder
            .add(ResourceDeclaration::new("sg", ResourceKind::SecurityGroup))
            .unwrap();
        builder
            .add(ResourceDeclaration::new("vm", ResourceKind::ComputeInstance).with_dependency("sg"))
            .unwrap();
        let dot = to_dot(&builder.build().unwrap());
        assert!(dot.starts_with("digraph \"demo\""));
        assert!(dot.contains("\"sg\" -> \"vm\";"));
    }
}
