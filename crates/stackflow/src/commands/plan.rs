use super::print_plan;
use crate::context::StackContext;
use colored::Colorize;
use stackflow_cloud::ProvisioningEngine;
use stackflow_config::Settings;
use std::path::Path;

pub async fn handle(file: Option<&Path>, settings: Settings, json: bool) -> anyhow::Result<()> {
    let ctx = StackContext::load(file, settings)?;
    let current = ctx.state.load(ctx.stack_name()).await?;
    let engine = ctx.engine().await?;
    let plan = engine.plan(&ctx.loaded.graph, &current);

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    ctx.print_header();
    println!();
    if !plan.has_changes {
        println!("{}", "No changes. Infrastructure is up to date.".green());
        return Ok(());
    }
    print_plan(&plan);
    Ok(())
}
