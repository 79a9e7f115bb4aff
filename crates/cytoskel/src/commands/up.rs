use crate::utils;
use colored::Colorize;
use cytoskel_cloud::ApplyOptions;
use cytoskel_cloud_aws::StagingStack;

pub async fn handle(staging: &StagingStack) -> anyhow::Result<()> {
    println!("{}", "Provisioning staging infrastructure...".yellow());
    utils::print_stack(&staging.identity());

    let stack = staging.create_stack(Vec::new()).await?;
    let options = ApplyOptions {
        rollback_on_failure: staging.settings().rollback_on_failure,
    };
    let outcome = stack.up(options).await?;

    utils::print_plan(&outcome.plan);
    utils::print_apply_result(&outcome.result);

    if !outcome.result.is_success() {
        anyhow::bail!("up failed for {}", stack.identity());
    }

    utils::print_outputs(&outcome.outputs);
    println!();
    println!("{}", "✓ Staging infrastructure is up to date".green().bold());
    Ok(())
}

pub async fn preview(staging: &StagingStack) -> anyhow::Result<()> {
    println!("{}", "Previewing changes...".yellow());
    utils::print_stack(&staging.identity());

    let stack = staging.open_stack(Vec::new()).await?;
    let plan = stack.preview().await?;
    utils::print_plan(&plan);

    if plan.has_changes {
        println!();
        println!("{}", "Run `cytoskel up` to apply these changes".dimmed());
    }
    Ok(())
}
