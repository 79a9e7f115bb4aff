use colored::Colorize;
use cytoskel_cloud_aws::StagingStack;
use futures_util::TryStreamExt;

pub async fn create(staging: &StagingStack, username: &str) -> anyhow::Result<()> {
    let created = staging.users().create_user(username).await?;

    println!("Created user Arn: {}", created.user.arn.cyan());
    println!("Access key ID: {}", created.access_key.access_key_id);
    println!("Secret access key: {}", created.access_key.secret_access_key);
    println!(
        "{}",
        "The secret access key cannot be retrieved again; store it now.".yellow()
    );
    Ok(())
}

pub async fn delete(staging: &StagingStack, username: &str) -> anyhow::Result<()> {
    staging.users().delete_user(username).await?;
    println!("User with username: {} is deleted", username.cyan());
    Ok(())
}

/// One ARN per line, streamed as pages arrive
pub async fn list(staging: &StagingStack) -> anyhow::Result<()> {
    let users = staging.users();
    let mut stream = users.list_users();
    while let Some(user) = stream.try_next().await? {
        println!("{}", user.arn);
    }
    Ok(())
}
