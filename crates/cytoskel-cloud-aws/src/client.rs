//! Shared AWS configuration and clients

use crate::error::{AwsError, AwsResult};
use aws_config::{BehaviorVersion, Region, SdkConfig};
use cytoskel_config::AwsSettings;
use tokio::sync::OnceCell;

/// AWS clients built from one SDK configuration, plus the caller's account
pub struct AwsContext {
    config: SdkConfig,
    iam: aws_sdk_iam::Client,
    s3: aws_sdk_s3::Client,
    s3control: aws_sdk_s3control::Client,
    sts: aws_sdk_sts::Client,
    caller: OnceCell<CallerIdentity>,
}

/// Result of STS `GetCallerIdentity`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub account_id: String,
    pub arn: String,
}

impl AwsContext {
    /// Load configuration through the standard credential provider chain
    pub async fn load(settings: &AwsSettings) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &settings.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(profile) = &settings.profile {
            loader = loader.profile_name(profile);
        }
        Self::from_config(loader.load().await)
    }

    pub fn from_config(config: SdkConfig) -> Self {
        Self {
            iam: aws_sdk_iam::Client::new(&config),
            s3: aws_sdk_s3::Client::new(&config),
            s3control: aws_sdk_s3control::Client::new(&config),
            sts: aws_sdk_sts::Client::new(&config),
            caller: OnceCell::new(),
            config,
        }
    }

    pub fn iam(&self) -> &aws_sdk_iam::Client {
        &self.iam
    }

    pub fn s3(&self) -> &aws_sdk_s3::Client {
        &self.s3
    }

    pub fn s3control(&self) -> &aws_sdk_s3control::Client {
        &self.s3control
    }

    pub fn region(&self) -> Option<&str> {
        self.config.region().map(|r| r.as_ref())
    }

    /// Region required by S3 and S3 Control calls
    pub fn require_region(&self) -> AwsResult<&str> {
        self.region().ok_or_else(|| {
            AwsError::Config(
                "no AWS region configured (set AWS_REGION or aws.region in cytoskel.yaml)"
                    .to_string(),
            )
        })
    }

    /// Identity of the calling credentials, fetched once per process
    pub async fn caller(&self) -> AwsResult<&CallerIdentity> {
        self.caller
            .get_or_try_init(|| async {
                let output = self
                    .sts
                    .get_caller_identity()
                    .send()
                    .await
                    .map_err(|e| AwsError::from_sdk("GetCallerIdentity", e))?;

                let identity = CallerIdentity {
                    account_id: output
                        .account()
                        .ok_or_else(|| AwsError::missing("GetCallerIdentity", "Account"))?
                        .to_string(),
                    arn: output.arn().unwrap_or_default().to_string(),
                };
                tracing::debug!("Caller identity: {}", identity.arn);
                Ok(identity)
            })
            .await
    }

    pub async fn account_id(&self) -> AwsResult<&str> {
        Ok(self.caller().await?.account_id.as_str())
    }
}
