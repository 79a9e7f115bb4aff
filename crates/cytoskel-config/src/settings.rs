//! Settings model and validation

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Bounds IAM accepts for a role's maximum session duration, in seconds
pub const SESSION_DURATION_RANGE: std::ops::RangeInclusive<i32> = 3600..=43200;

/// Top-level settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Project the stack belongs to
    pub project: String,

    /// Stack name
    pub stack: String,

    /// Environment tag of the stack
    pub environment: String,

    /// Where stack state is kept; defaults to the user's data directory
    pub state_dir: Option<PathBuf>,

    /// Delete resources created by a failed `up`
    pub rollback_on_failure: bool,

    /// Sub-prefix used when `grant create` is given none
    pub default_prefix: String,

    pub aws: AwsSettings,

    pub staging: StagingNames,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            project: "CPG-Staging".to_string(),
            stack: "S3GrantsAccess".to_string(),
            environment: "test".to_string(),
            state_dir: None,
            rollback_on_failure: true,
            default_prefix: "*".to_string(),
            aws: AwsSettings::default(),
            staging: StagingNames::default(),
        }
    }
}

/// AWS client options; unset values fall back to the SDK's default chain
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AwsSettings {
    pub region: Option<String>,
    pub profile: Option<String>,
}

/// Names of the provisioned staging infrastructure.
///
/// These identify already-provisioned resources: renaming one makes the next
/// `up` replace the resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StagingNames {
    pub bucket_name: String,
    pub protect_bucket: bool,
    pub grants_instance: String,
    pub location: String,
    pub role: String,
    pub role_name: String,
    pub role_policy_name: String,
    pub max_session_duration: i32,
    pub uploader_group: String,
    pub data_access_policy: String,
    pub group_policy_attachment: String,
}

impl Default for StagingNames {
    fn default() -> Self {
        Self {
            bucket_name: "staging-cellpainting-gallery".to_string(),
            protect_bucket: true,
            grants_instance: "grant_instance".to_string(),
            location: "demo-staging".to_string(),
            role: "cpg_staging_access_grant".to_string(),
            role_name: "cpg_staging_access_grant_location_role".to_string(),
            role_policy_name: "cpg_staging_access_grant_location_policy".to_string(),
            max_session_duration: 43200,
            uploader_group: "staging_cpg_uploaders".to_string(),
            data_access_policy: "staging_cpg_creds_data_access".to_string(),
            group_policy_attachment: "s3_access_grants_group_policy_attach".to_string(),
        }
    }
}

impl Settings {
    /// Parse settings from YAML; missing keys take their defaults
    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let settings: Settings = serde_yaml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read and parse a settings file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let settings: Settings =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Override stack and environment, e.g. from command-line flags
    pub fn with_overrides(
        mut self,
        stack: Option<String>,
        environment: Option<String>,
    ) -> Result<Self> {
        if let Some(stack) = stack {
            self.stack = stack;
        }
        if let Some(environment) = environment {
            self.environment = environment;
        }
        self.validate()?;
        Ok(self)
    }

    /// Directory holding stack state
    pub fn state_dir(&self) -> PathBuf {
        match &self.state_dir {
            Some(dir) => dir.clone(),
            None => dirs::data_local_dir()
                .map(|d| d.join("cytoskel").join("state"))
                .unwrap_or_else(|| PathBuf::from(".cytoskel").join("state")),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let s = &self.staging;
        let names = [
            ("project", &self.project),
            ("stack", &self.stack),
            ("environment", &self.environment),
            ("default_prefix", &self.default_prefix),
            ("staging.bucket_name", &s.bucket_name),
            ("staging.grants_instance", &s.grants_instance),
            ("staging.location", &s.location),
            ("staging.role", &s.role),
            ("staging.role_name", &s.role_name),
            ("staging.role_policy_name", &s.role_policy_name),
            ("staging.uploader_group", &s.uploader_group),
            ("staging.data_access_policy", &s.data_access_policy),
            ("staging.group_policy_attachment", &s.group_policy_attachment),
        ];

        for (field, value) in names {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{} must not be empty", field)));
            }
        }

        if !SESSION_DURATION_RANGE.contains(&s.max_session_duration) {
            return Err(ConfigError::Invalid(format!(
                "staging.max_session_duration must be between {} and {} seconds, got {}",
                SESSION_DURATION_RANGE.start(),
                SESSION_DURATION_RANGE.end(),
                s.max_session_duration
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.project, "CPG-Staging");
        assert_eq!(settings.stack, "S3GrantsAccess");
        assert_eq!(settings.environment, "test");
        assert_eq!(settings.staging.bucket_name, "staging-cellpainting-gallery");
        assert_eq!(settings.staging.uploader_group, "staging_cpg_uploaders");
        assert_eq!(settings.staging.max_session_duration, 43200);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
stack: Production
staging:
  bucket_name: cellpainting-gallery
aws:
  region: us-east-1
"#;
        let settings = Settings::from_yaml(yaml).unwrap();
        assert_eq!(settings.stack, "Production");
        assert_eq!(settings.project, "CPG-Staging");
        assert_eq!(settings.staging.bucket_name, "cellpainting-gallery");
        assert_eq!(settings.staging.location, "demo-staging");
        assert_eq!(settings.aws.region.as_deref(), Some("us-east-1"));
        assert!(settings.rollback_on_failure);
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(Settings::from_yaml("  \n").unwrap(), Settings::default());
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(Settings::from_yaml("stak: typo").is_err());
    }

    #[test]
    fn test_validation() {
        let empty_group = "staging:\n  uploader_group: \"\"\n";
        assert!(matches!(
            Settings::from_yaml(empty_group),
            Err(ConfigError::Invalid(msg)) if msg.contains("uploader_group")
        ));

        let short_session = "staging:\n  max_session_duration: 60\n";
        assert!(matches!(
            Settings::from_yaml(short_session),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_overrides() {
        let settings = Settings::default()
            .with_overrides(Some("Other".into()), None)
            .unwrap();
        assert_eq!(settings.stack, "Other");
        assert_eq!(settings.environment, "test");

        assert!(Settings::default().with_overrides(None, Some(String::new())).is_err());
    }

    #[test]
    fn test_explicit_state_dir() {
        let settings = Settings::from_yaml("state_dir: /tmp/cytoskel-state").unwrap();
        assert_eq!(settings.state_dir(), PathBuf::from("/tmp/cytoskel-state"));
        assert!(Settings::default().state_dir().ends_with("cytoskel/state"));
    }
}
