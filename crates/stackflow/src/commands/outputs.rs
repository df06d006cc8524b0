use super::display_value;
use crate::context::StackContext;
use colored::Colorize;
use stackflow_config::Settings;
use std::path::Path;

pub async fn handle(file: Option<&Path>, settings: Settings, json: bool) -> anyhow::Result<()> {
    let ctx = StackContext::load(file, settings)?;
    let state = ctx.state.load(ctx.stack_name()).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&state.outputs)?);
        return Ok(());
    }

    if state.outputs.is_empty() {
        println!(
            "{}",
            format!("No outputs recorded for {}. Run `stack apply` first.", ctx.stack_name())
                .yellow()
        );
        return Ok(());
    }

    // Declaration order, not alphabetical
    for output in &ctx.loaded.graph.outputs {
        if let Some(value) = state.outputs.get(&output.name) {
            println!("{} = {}", output.name.cyan(), display_value(value));
        }
    }
    Ok(())
}
