use crate::context;
use colored::Colorize;
use std::path::Path;

pub async fn handle(file: Option<&Path>) -> anyhow::Result<()> {
    println!("{}", "Validating stack...".blue());

    let loaded = match context::load_stack(file) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!();
            eprintln!("{}", "✗ Validation failed".red().bold());
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    };

    let graph = &loaded.graph;
    println!("{}", "✓ Stack is valid".green().bold());
    println!();
    println!("Stack: {}", graph.stack.cyan());
    println!("Summary:");
    println!("  Resources: {}", graph.len());
    for decl in &graph.resources {
        println!(
            "    - {} ({}) → {}",
            decl.logical_id.cyan(),
            decl.kind,
            graph.physical_name(&decl.logical_id).dimmed()
        );
    }
    if !graph.grants.is_empty() {
        println!("  Grants: {}", graph.grants.len());
        for grant in &graph.grants {
            println!("    - {} ← {}", grant.role.cyan(), grant.policy);
        }
    }
    println!("  Outputs: {}", graph.outputs.len());
    for output in &graph.outputs {
        println!("    - {} = {}", output.name.cyan(), output.source);
    }
    println!("  Fingerprint: {}", graph.fingerprint()?.dimmed());

    Ok(())
}
