pub mod apply;
pub mod destroy;
pub mod graph;
pub mod outputs;
pub mod plan;
pub mod validate;

use colored::Colorize;
use stackflow_cloud::{Action, ActionType, Plan, ResolvedOutput};

/// Print plan actions with change markers
pub(crate) fn print_plan(plan: &Plan) {
    for action in &plan.actions {
        print_action(action);
    }
    if plan.outputs_changed {
        println!("  {}", "~ outputs".yellow());
    }
    println!();
    println!("Plan: {}", plan.summary().to_string().bold());
}

fn print_action(action: &Action) {
    let line = format!(
        "{} {} ({})",
        marker(action.action_type),
        action.resource_id,
        action.resource_type
    );
    match action.action_type {
        ActionType::Create => println!("  {}", line.green()),
        ActionType::Update => println!("  {}", line.yellow()),
        ActionType::Delete => println!("  {}", line.red()),
        ActionType::NoOp => println!("  {}", line.dimmed()),
    }
}

fn marker(action_type: ActionType) -> &'static str {
    match action_type {
        ActionType::Create => "+",
        ActionType::Update => "~",
        ActionType::Delete => "-",
        ActionType::NoOp => " ",
    }
}

pub(crate) fn print_outputs(outputs: &[ResolvedOutput]) {
    if outputs.is_empty() {
        return;
    }
    println!();
    println!("Outputs:");
    for output in outputs {
        println!("  {} = {}", output.name.cyan(), display_value(&output.value));
    }
}

/// Render an output value for humans: strings without quotes
pub(crate) fn display_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_value() {
        assert_eq!(display_value(&serde_json::json!("x")), "x");
        assert_eq!(display_value(&serde_json::json!(3)), "3");
    }

    #[test]
    fn test_markers_are_distinct() {
        let markers = [
            marker(ActionType::Create),
            marker(ActionType::Update),
            marker(ActionType::Delete),
        ];
        assert_eq!(markers, ["+", "~", "-"]);
    }
}
