use crate::context::StackContext;
use colored::Colorize;
use stackflow_cloud::ProvisioningEngine;
use stackflow_config::Settings;
use std::path::Path;

pub async fn handle(file: Option<&Path>, settings: Settings, yes: bool) -> anyhow::Result<()> {
    let ctx = StackContext::load(file, settings)?;
    ctx.print_header();
    println!();

    let lock = ctx.state.acquire_lock(ctx.stack_name()).await?;
    let mut state = ctx.state.load(ctx.stack_name()).await?;

    if state.is_empty() {
        println!("{}", "Nothing to destroy.".green());
        lock.release().await?;
        return Ok(());
    }

    for (logical_id, resource) in state.teardown_order() {
        println!("  {}", format!("- {} ({})", logical_id, resource.kind).red());
    }

    if !yes {
        println!();
        println!(
            "{}",
            "Warning: every resource above will be deleted.".yellow()
        );
        println!("Pass --yes to destroy the stack");
        lock.release().await?;
        return Ok(());
    }

    let engine = ctx.engine().await?;
    let result = engine.destroy(&state).await?;
    state.record_destroy(&result);
    ctx.state.save(&state).await?;
    lock.release().await?;

    if let Some((id, error)) = result.first_failure() {
        anyhow::bail!("failed to delete '{}': {}", id, error);
    }
    println!();
    println!("{}", "✓ Destroy complete".green().bold());
    Ok(())
}
