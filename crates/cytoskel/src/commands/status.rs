use crate::utils;
use colored::Colorize;
use cytoskel_cloud::{ResourceStatus, StackIdentity, StateManager};
use cytoskel_config::Settings;

/// Show the recorded state; does not contact AWS
pub async fn handle(settings: &Settings) -> anyhow::Result<()> {
    let identity = StackIdentity::new(&settings.project, &settings.stack, &settings.environment);
    utils::print_stack(&identity);

    let manager = StateManager::new(settings.state_dir(), identity);
    if !manager.exists() {
        println!(
            "{}",
            "The stack has not been created yet. Run `cytoskel up`.".yellow()
        );
        return Ok(());
    }

    let state = manager.load().await?;
    println!("State: {}", manager.state_path().display().to_string().dimmed());
    println!("Updated: {}", state.updated_at.to_rfc3339().dimmed());

    println!();
    println!(
        "{}",
        format!("Resources ({}):", state.resources.len()).bold()
    );
    for resource in &state.resources {
        let status = match resource.status {
            ResourceStatus::Ready => resource.status.to_string().green(),
            ResourceStatus::Error => resource.status.to_string().red(),
        };
        let protected = if resource.protect { " (protected)" } else { "" };
        println!(
            "  • {} {} [{}]{}",
            resource.key.cyan(),
            resource.id,
            status,
            protected.dimmed()
        );
    }

    utils::print_outputs(&state.outputs);
    Ok(())
}
