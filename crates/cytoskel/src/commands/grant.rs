use colored::Colorize;
use cytoskel_cloud_aws::StagingStack;
use futures_util::TryStreamExt;

pub async fn create(
    staging: &StagingStack,
    grantee_arn: &str,
    location_id: &str,
    prefix: &str,
) -> anyhow::Result<()> {
    let grant = staging
        .grants()
        .create_grant(grantee_arn, location_id, prefix)
        .await?;

    println!(
        "Created grant with ARN: {}",
        grant.grant_arn.as_deref().unwrap_or("-").cyan()
    );
    println!("Grant ID: {}", grant.grant_id);
    Ok(())
}

pub async fn delete(staging: &StagingStack, grant_id: &str) -> anyhow::Result<()> {
    staging.grants().delete_grant(grant_id).await?;
    println!("Deleted grant with Id: {}", grant_id.cyan());
    Ok(())
}

/// Grant ID, grantee and sub-prefix, one grant per line
pub async fn list(staging: &StagingStack) -> anyhow::Result<()> {
    let grants = staging.grants();
    let mut stream = grants.list_grants();
    while let Some(grant) = stream.try_next().await? {
        println!(
            "{}\t{}\t{}",
            grant.grant_id,
            grant.grantee.as_deref().unwrap_or("-"),
            grant.sub_prefix.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}
