use colored::Colorize;
use cytoskel_cloud::{ActionType, ApplyResult, Plan, StackIdentity};
use cytoskel_config::Settings;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// Load settings and apply the command-line overrides
pub fn load_settings(
    config: Option<&Path>,
    stack: Option<String>,
    environment: Option<String>,
) -> anyhow::Result<Settings> {
    let settings = cytoskel_config::load_settings(config)?;
    Ok(settings.with_overrides(stack, environment)?)
}

pub fn print_stack(identity: &StackIdentity) {
    println!("Stack: {}", identity.to_string().cyan());
}

fn symbol(action_type: ActionType) -> colored::ColoredString {
    match action_type {
        ActionType::Create => "+".green(),
        ActionType::Update => "~".yellow(),
        ActionType::Replace => "±".yellow(),
        ActionType::Delete => "-".red(),
        ActionType::NoOp => " ".normal(),
    }
}

/// Print the actions of a plan, then its summary
pub fn print_plan(plan: &Plan) {
    println!();
    for action in &plan.actions {
        let line = format!("  {} {}", symbol(action.action_type), action.description);
        if action.action_type == ActionType::NoOp {
            println!("{}", line.dimmed());
        } else {
            println!("{}", line);
        }
    }
    println!();
    println!("{}", plan.summary().to_string().bold());
}

/// Print what an apply did; compensation failures are always shown
pub fn print_apply_result(result: &ApplyResult) {
    for failure in &result.failed {
        println!(
            "  {} {}: {}",
            "✗".red(),
            failure.action_id,
            failure.error.as_deref().unwrap_or("failed")
        );
    }
    for key in &result.rolled_back {
        println!("  {} rolled back {}", "↺".yellow(), key);
    }
    for step in &result.uncompensated {
        println!("  {} left in place: {}", "⚠".yellow(), step);
    }
    println!(
        "{}",
        format!(
            "{} succeeded, {} failed in {} ms",
            result.succeeded.len(),
            result.failed.len(),
            result.duration_ms
        )
        .dimmed()
    );
}

pub fn print_outputs(outputs: &BTreeMap<String, Value>) {
    if outputs.is_empty() {
        return;
    }
    println!();
    println!("{}", "Outputs:".bold());
    for (name, value) in outputs {
        let text = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        println!("  {}: {}", name, text.cyan());
    }
}
