//! Resource declarations and output references
//!
//! A declaration names a resource (`type:name`), the provider that owns it and
//! its desired configuration as JSON. Configuration strings may embed
//! `${output:<type>:<name>.<attribute>}` tokens, which the engine replaces with
//! the recorded attribute of an already-applied resource right before the
//! provider sees the configuration.

use crate::error::{CloudError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Prefix of an output reference token inside a configuration string.
///
/// IAM policy variables such as `${aws:username}` do not carry this prefix and
/// pass through untouched.
pub const OUTPUT_PREFIX: &str = "${output:";

/// Build the `type:name` key of a resource
pub fn resource_key(resource_type: &str, name: &str) -> String {
    format!("{}:{}", resource_type, name)
}

/// Reference to an attribute of another declared resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutputRef {
    /// Key of the referenced resource (`type:name`)
    pub resource_key: String,

    /// Attribute recorded for that resource after it was applied
    pub attribute: String,
}

impl OutputRef {
    pub fn new(resource_type: &str, name: &str, attribute: impl Into<String>) -> Self {
        Self {
            resource_key: resource_key(resource_type, name),
            attribute: attribute.into(),
        }
    }

    /// Parse the body of a token, e.g. `s3-bucket:data.arn`
    pub fn parse(body: &str) -> Result<Self> {
        let (key, attribute) = body
            .rsplit_once('.')
            .ok_or_else(|| CloudError::InvalidReference(body.to_string()))?;

        let valid_key = key
            .split_once(':')
            .is_some_and(|(kind, name)| !kind.is_empty() && !name.is_empty());
        if !valid_key || attribute.is_empty() {
            return Err(CloudError::InvalidReference(body.to_string()));
        }

        Ok(Self {
            resource_key: key.to_string(),
            attribute: attribute.to_string(),
        })
    }
}

impl fmt::Display for OutputRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}.{}}}", OUTPUT_PREFIX, self.resource_key, self.attribute)
    }
}

/// Configuration for a cloud resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Resource type (e.g., "s3-bucket", "iam-role")
    pub resource_type: String,

    /// Logical name, unique per resource type within a stack
    pub name: String,

    /// Provider name
    pub provider: String,

    /// Protected resources are never deleted or replaced by the engine
    #[serde(default)]
    pub protect: bool,

    /// Resource-specific configuration
    pub config: Value,
}

impl ResourceConfig {
    pub fn new(
        resource_type: impl Into<String>,
        name: impl Into<String>,
        provider: impl Into<String>,
        config: Value,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
            provider: provider.into(),
            protect: false,
            config,
        }
    }

    /// Mark the resource as protected from deletion
    pub fn protected(mut self, protect: bool) -> Self {
        self.protect = protect;
        self
    }

    /// Get the full resource key (type:name)
    pub fn key(&self) -> String {
        resource_key(&self.resource_type, &self.name)
    }

    /// Reference to one of this resource's attributes
    pub fn output(&self, attribute: &str) -> OutputRef {
        OutputRef::new(&self.resource_type, &self.name, attribute)
    }

    /// Get a configuration value as a specific type
    pub fn get_config<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.config
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Deserialize the whole configuration into a typed spec
    pub fn spec<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.config.clone()).map_err(|e| {
            CloudError::InvalidConfig(format!("{}: {}", self.key(), e))
        })
    }

    /// Every output reference embedded in the configuration
    pub fn references(&self) -> Result<Vec<OutputRef>> {
        let mut refs = Vec::new();
        collect_references(&self.config, &mut refs)?;
        Ok(refs)
    }
}

/// Ordered set of resources to be managed
///
/// Declaration order is dependency order: a resource may only reference
/// resources declared before it, and each key may be declared once.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceSet {
    resources: Vec<ResourceConfig>,
}

impl ResourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, resource: ResourceConfig) -> Result<()> {
        let key = resource.key();
        if self.contains(&key) {
            return Err(CloudError::DuplicateResource(key));
        }

        for reference in resource.references()? {
            if !self.contains(&reference.resource_key) {
                return Err(CloudError::InvalidReference(format!(
                    "{} references {} which is not declared before it",
                    key, reference
                )));
            }
        }

        self.resources.push(resource);
        Ok(())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.resources.iter().any(|r| r.key() == key)
    }

    pub fn get(&self, resource_type: &str, name: &str) -> Option<&ResourceConfig> {
        self.get_by_key(&resource_key(resource_type, name))
    }

    pub fn get_by_key(&self, key: &str) -> Option<&ResourceConfig> {
        self.resources.iter().find(|r| r.key() == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceConfig> {
        self.resources.iter()
    }

    pub fn by_type(&self, resource_type: &str) -> Vec<&ResourceConfig> {
        self.resources
            .iter()
            .filter(|r| r.resource_type == resource_type)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

/// Collect the output references found anywhere inside `value`
pub fn collect_references(value: &Value, out: &mut Vec<OutputRef>) -> Result<()> {
    match value {
        Value::String(text) => {
            let mut rest = text.as_str();
            while let Some(start) = rest.find(OUTPUT_PREFIX) {
                let after = &rest[start + OUTPUT_PREFIX.len()..];
                let end = after
                    .find('}')
                    .ok_or_else(|| CloudError::InvalidReference(text.clone()))?;
                let reference = OutputRef::parse(&after[..end])?;
                if !out.contains(&reference) {
                    out.push(reference);
                }
                rest = &after[end + 1..];
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_references(item, out)?;
            }
        }
        Value::Object(map) => {
            for item in map.values() {
                collect_references(item, out)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Replace every output reference inside `value` using `lookup`
///
/// A string consisting of a single token takes the attribute's JSON value as
/// is; tokens embedded in longer strings are spliced in as text.
pub fn resolve_outputs<F>(value: &Value, lookup: &F) -> Result<Value>
where
    F: Fn(&OutputRef) -> Result<Value>,
{
    match value {
        Value::String(text) => interpolate(text, lookup),
        Value::Array(items) => items
            .iter()
            .map(|item| resolve_outputs(item, lookup))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        Value::Object(map) => {
            let mut resolved = serde_json::Map::with_capacity(map.len());
            for (key, item) in map {
                resolved.insert(key.clone(), resolve_outputs(item, lookup)?);
            }
            Ok(Value::Object(resolved))
        }
        other => Ok(other.clone()),
    }
}

fn interpolate<F>(text: &str, lookup: &F) -> Result<Value>
where
    F: Fn(&OutputRef) -> Result<Value>,
{
    if let Some(body) = text
        .strip_prefix(OUTPUT_PREFIX)
        .and_then(|rest| rest.strip_suffix('}'))
    {
        if !body.contains('}') {
            return lookup(&OutputRef::parse(body)?);
        }
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(OUTPUT_PREFIX) {
        out.push_str(&rest[..start]);
        let after = &rest[start + OUTPUT_PREFIX.len()..];
        let end = after
            .find('}')
            .ok_or_else(|| CloudError::InvalidReference(text.to_string()))?;
        match lookup(&OutputRef::parse(&after[..end])?)? {
            Value::String(s) => out.push_str(&s),
            other => out.push_str(&other.to_string()),
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(Value::String(out))
}
