//! IAM policy documents for S3 Access Grants
//!
//! Three documents are involved:
//! - the trust policy of the location role, letting only the Access Grants
//!   service assume it on behalf of one grants instance in one account
//! - the permissions of that role on the staging bucket
//! - the data-access policy of the uploader group (`s3:GetDataAccess`)

use crate::error::{AwsError, AwsResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const POLICY_VERSION: &str = "2012-10-17";
pub const ACCESS_GRANTS_SERVICE: &str = "access-grants.s3.amazonaws.com";
pub const IDENTITY_CENTER_PROVIDER: &str = "arn:aws:iam:::contextProvider/IdentityCenter";

/// A JSON value that IAM accepts either bare or as a list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        match self {
            OneOrMany::One(value) => std::slice::from_ref(value).iter(),
            OneOrMany::Many(values) => values.iter(),
        }
    }
}

impl From<&str> for OneOrMany<String> {
    fn from(value: &str) -> Self {
        OneOrMany::One(value.to_string())
    }
}

impl From<Vec<&str>> for OneOrMany<String> {
    fn from(values: Vec<&str>) -> Self {
        OneOrMany::Many(values.into_iter().map(str::to_string).collect())
    }
}

/// Condition block: operator -> key -> value(s)
pub type Condition = BTreeMap<String, BTreeMap<String, OneOrMany<String>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Allow,
    Deny,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Principal {
    pub service: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Statement {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,

    pub effect: Effect,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<Principal>,

    pub action: OneOrMany<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<OneOrMany<String>>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub condition: Condition,
}

impl Statement {
    pub fn allow(action: impl Into<OneOrMany<String>>) -> Self {
        Self {
            sid: None,
            effect: Effect::Allow,
            principal: None,
            action: action.into(),
            resource: None,
            condition: Condition::new(),
        }
    }

    pub fn sid(mut self, sid: &str) -> Self {
        self.sid = Some(sid.to_string());
        self
    }

    pub fn service_principal(mut self, service: &str) -> Self {
        self.principal = Some(Principal {
            service: service.to_string(),
        });
        self
    }

    pub fn resource(mut self, resource: impl Into<OneOrMany<String>>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn condition(
        mut self,
        operator: &str,
        key: &str,
        value: impl Into<OneOrMany<String>>,
    ) -> Self {
        self.condition
            .entry(operator.to_string())
            .or_default()
            .insert(key.to_string(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    pub version: String,
    pub statement: Vec<Statement>,
}

impl PolicyDocument {
    pub fn new(statement: Vec<Statement>) -> Self {
        Self {
            version: POLICY_VERSION.to_string(),
            statement,
        }
    }

    pub fn to_json(&self) -> AwsResult<String> {
        serde_json::to_string(self)
            .map_err(|e| AwsError::Policy(format!("Failed to serialize policy: {e}")))
    }

    pub fn to_value(&self) -> AwsResult<serde_json::Value> {
        serde_json::to_value(self)
            .map_err(|e| AwsError::Policy(format!("Failed to serialize policy: {e}")))
    }
}

/// Policies of an Access Grants location over one bucket
///
/// Every document references only the bucket ARN, account ID and grants
/// instance ARN given here. The values may be output reference tokens.
#[derive(Debug, Clone, Copy)]
pub struct AccessGrantsPolicies<'a> {
    pub bucket_arn: &'a str,
    pub account_id: &'a str,
    pub instance_arn: &'a str,
}

impl<'a> AccessGrantsPolicies<'a> {
    pub fn new(bucket_arn: &'a str, account_id: &'a str, instance_arn: &'a str) -> Self {
        Self {
            bucket_arn,
            account_id,
            instance_arn,
        }
    }

    /// Trust policy of the location role
    pub fn trust_policy(&self) -> PolicyDocument {
        let source = |statement: Statement| {
            statement
                .service_principal(ACCESS_GRANTS_SERVICE)
                .condition("StringEquals", "aws:SourceArn", self.instance_arn)
                .condition("StringEquals", "aws:SourceAccount", self.account_id)
        };

        PolicyDocument::new(vec![
            source(
                Statement::allow(vec!["sts:AssumeRole", "sts:SetSourceIdentity"])
                    .sid("AccessGrantsTrustPolicy"),
            ),
            source(Statement::allow("sts:SetContext").sid("AccessGrantsTrustPolicyWithIDCContext"))
                .condition(
                    "ForAnyValue:StringEquals",
                    "aws:RequestContextProvider",
                    IDENTITY_CENTER_PROVIDER,
                ),
        ])
    }

    /// Permissions of the location role on the bucket
    pub fn permissions_policy(&self) -> PolicyDocument {
        let objects = format!("{}*", self.bucket_arn);
        let scoped = |statement: Statement| {
            statement
                .condition("StringEquals", "aws:ResourceAccount", self.account_id)
                .condition(
                    "ArnEquals",
                    "s3:AccessGrantsInstanceArn",
                    vec![self.instance_arn],
                )
        };

        PolicyDocument::new(vec![
            scoped(
                Statement::allow(vec![
                    "s3:GetObject",
                    "s3:GetObjectVersion",
                    "s3:GetObjectAcl",
                    "s3:GetObjectVersionAcl",
                    "s3:ListMultipartUploadParts",
                ])
                .sid("ObjectLevelReadPermissions")
                .resource(vec![objects.as_str()]),
            ),
            scoped(
                Statement::allow(vec![
                    "s3:PutObject",
                    "s3:PutObjectAcl",
                    "s3:PutObjectVersionAcl",
                    "s3:DeleteObject",
                    "s3:DeleteObjectVersion",
                    "s3:AbortMultipartUpload",
                ])
                .sid("ObjectLevelWritePermissions")
                .resource(vec![objects.as_str()]),
            ),
            scoped(
                Statement::allow(vec!["s3:ListBucket"])
                    .sid("BucketLevelReadPermissions")
                    .resource(vec![self.bucket_arn]),
            ),
        ])
    }

    /// Policy letting its holders request credentials from the grants instance
    pub fn data_access_policy(&self) -> PolicyDocument {
        PolicyDocument::new(vec![
            Statement::allow(vec!["s3:GetDataAccess"]).resource(vec![self.instance_arn]),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn strings(value: &Value, out: &mut Vec<String>) {
        match value {
            Value::String(s) => out.push(s.clone()),
            Value::Array(items) => items.iter().for_each(|v| strings(v, out)),
            Value::Object(map) => {
                for (k, v) in map {
                    out.push(k.clone());
                    strings(v, out);
                }
            }
            _ => {}
        }
    }

    #[test]
    fn test_trust_policy_shape() {
        let policies = AccessGrantsPolicies::new(
            "arn:aws:s3:::bucket",
            "123456789012",
            "arn:aws:s3:us-east-1:123456789012:access-grants/default",
        );
        let trust = policies.trust_policy().to_value().unwrap();

        assert_eq!(trust["Version"], "2012-10-17");
        let first = &trust["Statement"][0];
        assert_eq!(first["Sid"], "AccessGrantsTrustPolicy");
        assert_eq!(first["Principal"]["Service"], ACCESS_GRANTS_SERVICE);
        assert_eq!(first["Action"], json!(["sts:AssumeRole", "sts:SetSourceIdentity"]));
        assert_eq!(
            first["Condition"]["StringEquals"]["aws:SourceAccount"],
            "123456789012"
        );

        let second = &trust["Statement"][1];
        assert_eq!(second["Action"], "sts:SetContext");
        assert_eq!(
            second["Condition"]["ForAnyValue:StringEquals"]["aws:RequestContextProvider"],
            IDENTITY_CENTER_PROVIDER
        );
        assert!(first.get("Resource").is_none());
    }

    #[test]
    fn test_permissions_policy_shape() {
        let policies = AccessGrantsPolicies::new("arn:aws:s3:::b", "1", "arn:instance");
        let doc = policies.permissions_policy();

        let sids: Vec<&str> = doc.statement.iter().filter_map(|s| s.sid.as_deref()).collect();
        assert_eq!(
            sids,
            vec![
                "ObjectLevelReadPermissions",
                "ObjectLevelWritePermissions",
                "BucketLevelReadPermissions"
            ]
        );
        assert_eq!(doc.statement[0].action.iter().count(), 5);
        assert_eq!(doc.statement[1].action.iter().count(), 6);

        let value = doc.to_value().unwrap();
        assert_eq!(value["Statement"][0]["Resource"], json!(["arn:aws:s3:::b*"]));
        assert_eq!(value["Statement"][2]["Resource"], json!(["arn:aws:s3:::b"]));
        assert_eq!(
            value["Statement"][2]["Condition"]["ArnEquals"]["s3:AccessGrantsInstanceArn"],
            json!(["arn:instance"])
        );
    }

    #[test]
    fn test_documents_reference_only_given_values() {
        let triples = [
            (
                "arn:aws:s3:::staging-cellpainting-gallery",
                "123456789012",
                "arn:aws:s3:us-east-1:123456789012:access-grants/default",
            ),
            (
                "arn:aws:s3:::other",
                "210987654321",
                "arn:aws:s3:eu-west-1:210987654321:access-grants/default",
            ),
            (
                "${output:s3-bucket:data.arn}",
                "000000000000",
                "${output:access-grants-instance:grant_instance.arn}",
            ),
        ];

        for (bucket_arn, account_id, instance_arn) in triples {
            let policies = AccessGrantsPolicies::new(bucket_arn, account_id, instance_arn);
            let allowed = [
                bucket_arn.to_string(),
                format!("{bucket_arn}*"),
                instance_arn.to_string(),
                IDENTITY_CENTER_PROVIDER.to_string(),
            ];

            for doc in [policies.trust_policy(), policies.permissions_policy()] {
                let mut values = Vec::new();
                strings(&doc.to_value().unwrap(), &mut values);

                for value in &values {
                    if value.starts_with("arn:") || value.starts_with("${output:") {
                        assert!(allowed.contains(value), "unexpected ARN {value}");
                    }
                    if value.chars().all(|c| c.is_ascii_digit()) {
                        assert_eq!(value, account_id);
                    }
                    assert_ne!(value, "*", "wildcard in {value}");
                }
                assert!(values.iter().any(|v| v == instance_arn));
                assert!(values.iter().any(|v| v == account_id));
            }
        }
    }
}
