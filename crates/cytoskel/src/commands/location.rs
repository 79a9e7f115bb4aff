use cytoskel_cloud_aws::StagingStack;
use futures_util::TryStreamExt;

pub async fn list(staging: &StagingStack) -> anyhow::Result<()> {
    let grants = staging.grants();
    let mut stream = grants.list_locations();
    while let Some(location) = stream.try_next().await? {
        println!("{}", location);
    }
    Ok(())
}
