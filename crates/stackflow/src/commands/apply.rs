use super::{print_outputs, print_plan};
use crate::context::StackContext;
use colored::Colorize;
use stackflow_cloud::{ActionType, CloudError, ProvisioningEngine, StackState};
use stackflow_config::Settings;
use std::path::Path;

pub async fn handle(file: Option<&Path>, settings: Settings, yes: bool) -> anyhow::Result<()> {
    let ctx = StackContext::load(file, settings)?;
    ctx.print_header();
    println!();

    let lock = ctx.state.acquire_lock(ctx.stack_name()).await?;
    let mut state = ctx.state.load(ctx.stack_name()).await?;
    let engine = ctx.engine().await?;
    let graph = &ctx.loaded.graph;

    let plan = engine.plan(graph, &state);
    if !plan.has_changes {
        println!("{}", "No changes. Infrastructure is up to date.".green());
        lock.release().await?;
        return Ok(());
    }
    print_plan(&plan);

    if !yes {
        println!();
        println!("Pass --yes to apply these changes");
        lock.release().await?;
        return Ok(());
    }

    if !plan.has_resource_changes() {
        let outputs = state.refresh_outputs(graph)?;
        ctx.state.save(&state).await?;
        lock.release().await?;

        println!();
        println!("{}", "✓ Outputs updated".green().bold());
        print_outputs(&outputs);
        return Ok(());
    }

    println!();
    println!(
        "{}",
        format!("Applying with {} ({})...", engine.display_name(), engine.region()).blue()
    );

    // Resources no longer declared go first, dependents before dependencies
    let mut removed = StackState::new(ctx.stack_name());
    for action in plan.actions_by_type(ActionType::Delete) {
        if let Some(resource) = state.get_resource(&action.resource_id) {
            removed.set_resource(action.resource_id.clone(), resource.clone());
        }
    }
    if !removed.is_empty() {
        let destroyed = engine.destroy(&removed).await?;
        state.record_destroy(&destroyed);
        if let Some((id, error)) = destroyed.first_failure() {
            ctx.state.save(&state).await?;
            lock.release().await?;
            anyhow::bail!("failed to delete '{}': {}", id, error);
        }
    }

    let result = engine.submit(graph).await?;
    state.record_apply(graph, &result);
    let duration_ms = result.duration_ms;

    match result.into_outputs(graph) {
        Ok(outputs) => {
            state.record_outputs(&outputs);
            ctx.state.save(&state).await?;
            lock.release().await?;

            println!(
                "{}",
                format!("✓ Apply complete ({} ms)", duration_ms).green().bold()
            );
            print_outputs(&outputs);
            Ok(())
        }
        Err(CloudError::ApplyFailed(failure)) => {
            ctx.state.save(&state).await?;
            lock.release().await?;

            eprintln!();
            eprintln!("{}", "✗ Apply failed".red().bold());
            eprintln!("  {}: {}", failure.failed_logical_id.red(), failure.error);
            if !failure.succeeded.is_empty() {
                let done: Vec<&str> = failure.succeeded.keys().map(String::as_str).collect();
                eprintln!("  Materialized before the failure: {}", done.join(", "));
            }
            Err(failure.into())
        }
        Err(e) => {
            ctx.state.save(&state).await?;
            lock.release().await?;
            Err(e.into())
        }
    }
}
