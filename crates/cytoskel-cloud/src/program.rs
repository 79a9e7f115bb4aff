//! Programs: ordered hooks that declare a stack's desired state

use crate::error::{CloudError, Result};
use crate::resource::{OutputRef, ResourceConfig, ResourceSet, collect_references};
use serde_json::Value;
use std::collections::BTreeMap;

/// A unit of provisioning logic contributing declarations to a program
pub trait Hook: Send + Sync {
    fn name(&self) -> &str;

    fn declare(&self, declarations: &mut Declarations) -> Result<()>;
}

/// Hook backed by a closure
pub struct FnHook<F> {
    name: String,
    declare: F,
}

impl<F> Hook for FnHook<F>
where
    F: Fn(&mut Declarations) -> Result<()> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn declare(&self, declarations: &mut Declarations) -> Result<()> {
        (self.declare)(declarations)
    }
}

/// Wrap a closure as a hook
pub fn hook_fn<F>(name: impl Into<String>, declare: F) -> Box<dyn Hook>
where
    F: Fn(&mut Declarations) -> Result<()> + Send + Sync + 'static,
{
    Box::new(FnHook {
        name: name.into(),
        declare,
    })
}

/// Collector handed to each hook in turn
#[derive(Debug, Default)]
pub struct Declarations {
    resources: ResourceSet,
    exports: BTreeMap<String, Value>,
}

impl Declarations {
    /// Declare a resource and get a handle to reference its outputs
    pub fn resource(&mut self, resource: ResourceConfig) -> Result<DeclaredResource> {
        let handle = DeclaredResource {
            resource_type: resource.resource_type.clone(),
            name: resource.name.clone(),
        };
        self.resources.add(resource)?;
        Ok(handle)
    }

    /// Export a stack output; the value may contain output references
    pub fn export(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        let name = name.into();
        if self.exports.contains_key(&name) {
            return Err(CloudError::DuplicateResource(format!("export {}", name)));
        }

        let value = value.into();
        let mut refs = Vec::new();
        collect_references(&value, &mut refs)?;
        for reference in refs {
            if !self.resources.contains(&reference.resource_key) {
                return Err(CloudError::InvalidReference(format!(
                    "export {} references undeclared {}",
                    name, reference
                )));
            }
        }

        self.exports.insert(name, value);
        Ok(())
    }

    pub fn resources(&self) -> &ResourceSet {
        &self.resources
    }
}

/// Handle to a declared resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredResource {
    pub resource_type: String,
    pub name: String,
}

impl DeclaredResource {
    pub fn output(&self, attribute: &str) -> OutputRef {
        OutputRef::new(&self.resource_type, &self.name, attribute)
    }

    /// The `${output:...}` token for one of the resource's attributes
    pub fn output_token(&self, attribute: &str) -> String {
        self.output(attribute).to_string()
    }
}

/// Desired state of a stack, as declared by its hooks
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub hooks: Vec<String>,
    pub resources: ResourceSet,
    pub exports: BTreeMap<String, Value>,
}

/// Builds a program from hooks, strictly in the order they were added
#[derive(Default)]
pub struct ProgramBuilder {
    hooks: Vec<Box<dyn Hook>>,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hook(mut self, hook: Box<dyn Hook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn hooks(mut self, hooks: impl IntoIterator<Item = Box<dyn Hook>>) -> Self {
        self.hooks.extend(hooks);
        self
    }

    pub fn build(self) -> Result<Program> {
        let mut declarations = Declarations::default();
        let mut names = Vec::with_capacity(self.hooks.len());

        for hook in &self.hooks {
            tracing::debug!("Running hook {}", hook.name());
            hook.declare(&mut declarations)?;
            names.push(hook.name().to_string());
        }

        Ok(Program {
            hooks: names,
            resources: declarations.resources,
            exports: declarations.exports,
        })
    }
}
