//! Resource types managed by the AWS provider and their configurations

use cytoskel_cloud::{CloudError, ResourceConfig, Result as CloudResult};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::collections::BTreeMap;

pub const PROVIDER_NAME: &str = "aws";

pub const S3_BUCKET: &str = "s3-bucket";
pub const GRANTS_INSTANCE: &str = "access-grants-instance";
pub const IAM_ROLE: &str = "iam-role";
pub const GRANTS_LOCATION: &str = "access-grants-location";
pub const IAM_GROUP: &str = "iam-group";
pub const IAM_POLICY: &str = "iam-policy";
pub const IAM_GROUP_POLICY_ATTACHMENT: &str = "iam-group-policy-attachment";

/// Types whose changes are applied in place
pub const UPDATABLE: [&str; 4] = [GRANTS_INSTANCE, IAM_ROLE, GRANTS_LOCATION, IAM_POLICY];

/// Typed configuration of one resource type
pub trait ResourceSpec: Serialize + DeserializeOwned {
    const TYPE: &'static str;

    /// Declare a resource of this type under a logical name
    fn declare(&self, name: &str) -> CloudResult<ResourceConfig> {
        let config = serde_json::to_value(self)?;
        Ok(ResourceConfig::new(Self::TYPE, name, PROVIDER_NAME, config))
    }

    fn from_config(resource: &ResourceConfig) -> CloudResult<Self> {
        resource.spec()
    }

    /// Parse the inputs a resource was last applied with
    fn from_inputs(key: &str, inputs: &Value) -> CloudResult<Self> {
        serde_json::from_value(inputs.clone())
            .map_err(|e| CloudError::StateError(format!("{key}: unreadable inputs: {e}")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketSpec {
    pub bucket: String,
}

impl ResourceSpec for BucketSpec {
    const TYPE: &'static str = S3_BUCKET;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantsInstanceSpec {
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl ResourceSpec for GrantsInstanceSpec {
    const TYPE: &'static str = GRANTS_INSTANCE;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlinePolicy {
    pub name: String,
    pub policy: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleSpec {
    pub role_name: String,
    pub max_session_duration: i32,
    pub assume_role_policy: Value,
    #[serde(default)]
    pub inline_policies: Vec<InlinePolicy>,
}

impl ResourceSpec for RoleSpec {
    const TYPE: &'static str = IAM_ROLE;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationSpec {
    pub location_scope: String,
    pub iam_role_arn: String,
}

impl ResourceSpec for LocationSpec {
    const TYPE: &'static str = GRANTS_LOCATION;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSpec {
    pub group_name: String,
}

impl ResourceSpec for GroupSpec {
    const TYPE: &'static str = IAM_GROUP;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicySpec {
    pub policy_name: String,
    pub path: String,
    pub description: String,
    pub policy: Value,
}

impl ResourceSpec for PolicySpec {
    const TYPE: &'static str = IAM_POLICY;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupPolicyAttachmentSpec {
    pub group_name: String,
    pub policy_arn: String,
}

impl ResourceSpec for GroupPolicyAttachmentSpec {
    const TYPE: &'static str = IAM_GROUP_POLICY_ATTACHMENT;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_declare_round_trip() {
        let spec = RoleSpec {
            role_name: "reader".into(),
            max_session_duration: 43200,
            assume_role_policy: json!({ "Version": "2012-10-17", "Statement": [] }),
            inline_policies: vec![InlinePolicy {
                name: "inline".into(),
                policy: json!({}),
            }],
        };
        let resource = spec.declare("role").unwrap();

        assert_eq!(resource.key(), "iam-role:role");
        assert_eq!(resource.provider, PROVIDER_NAME);
        assert_eq!(RoleSpec::from_config(&resource).unwrap(), spec);
    }

    #[test]
    fn test_wrong_shape_is_invalid_config() {
        let resource = ResourceConfig::new(S3_BUCKET, "b", PROVIDER_NAME, json!({ "name": 1 }));
        assert!(matches!(
            BucketSpec::from_config(&resource),
            Err(CloudError::InvalidConfig(_))
        ));
        assert!(matches!(
            BucketSpec::from_inputs("s3-bucket:b", &json!(null)),
            Err(CloudError::StateError(_))
        ));
    }
}
