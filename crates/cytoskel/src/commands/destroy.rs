use crate::utils;
use colored::Colorize;
use cytoskel_cloud::{CloudError, DestroyOptions};
use cytoskel_cloud_aws::StagingStack;

pub async fn handle(
    staging: &StagingStack,
    exclude_protected: bool,
    yes: bool,
) -> anyhow::Result<()> {
    println!("{}", "Destroying staging infrastructure...".yellow());
    utils::print_stack(&staging.identity());

    let stack = staging.select_stack(Vec::new()).await?;
    let options = DestroyOptions { exclude_protected };

    let plan = match stack.preview_destroy(options).await {
        Err(CloudError::Protected(keys)) => anyhow::bail!(
            "protected resources block destroy: {} (use --exclude-protected to leave them in place)",
            keys
        ),
        other => other?,
    };
    utils::print_plan(&plan);

    if !plan.has_changes {
        println!("{}", "Nothing to delete".dimmed());
        return Ok(());
    }

    if !yes {
        println!();
        println!("{}", "Warning: the resources above will be deleted.".yellow());
        println!("Run again with --yes to proceed");
        return Ok(());
    }

    let result = stack.destroy(options).await?;
    utils::print_apply_result(&result);

    if !result.is_success() {
        anyhow::bail!("destroy failed for {}", stack.identity());
    }

    println!();
    println!("{}", "✓ Staging infrastructure deleted".green().bold());
    Ok(())
}
