//! AWS provider for cytoskel
//!
//! Provisions the S3 Access Grants staging infrastructure through the engine
//! in `cytoskel-cloud`, and runs the imperative operations on uploader users
//! and access grants directly against IAM and S3 Control.

pub mod client;
pub mod error;
pub mod grants;
pub mod iam;
pub mod paging;
pub mod policy;
pub mod provider;
pub mod resources;
pub mod s3control;
pub mod staging;
pub mod users;

#[cfg(test)]
mod testing;

pub use client::{AwsContext, CallerIdentity};
pub use error::{AwsError, AwsResult};
pub use grants::{ALL_OBJECTS, GrantManager};
pub use iam::{AccessKey, IamApi, IamUser, SdkIam};
pub use paging::{Page, paginate};
pub use policy::{AccessGrantsPolicies, PolicyDocument, Statement};
pub use provider::AccessGrantsProvider;
pub use s3control::{AccessGrant, AccessGrantsApi, GrantsLocation, NewGrant, SdkAccessGrants};
pub use staging::{STAGING_HOOK, StagingHook, StagingStack};
pub use users::{CreatedUser, UserManager};
