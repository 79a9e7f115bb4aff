//! State management for stacks
//!
//! Each stack is tracked in `<state_dir>/<project>/<stack>.json`, next to a
//! backup of the previous state and a lock file held while the stack is being
//! changed.

use crate::error::{CloudError, Result};
use crate::provider::{ADOPTED_ATTRIBUTE, ResourceOutputs};
use crate::resource::ResourceConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

const STATE_VERSION: u32 = 1;
const STATE_EXT: &str = "json";
const BACKUP_EXT: &str = "json.backup";
const LOCK_EXT: &str = "lock.json";
const STALE_LOCK_HOURS: i64 = 1;

/// Identity of one declarative deployment unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackIdentity {
    pub project_name: String,
    pub stack_name: String,
    pub environment: String,
}

impl StackIdentity {
    pub fn new(
        project_name: impl Into<String>,
        stack_name: impl Into<String>,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            project_name: project_name.into(),
            stack_name: stack_name.into(),
            environment: environment.into(),
        }
    }
}

impl std::fmt::Display for StackIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} ({})",
            self.project_name, self.stack_name, self.environment
        )
    }
}

/// Recorded state of one stack
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackState {
    /// State file version
    pub version: u32,

    pub identity: StackIdentity,

    /// Last modified timestamp
    pub updated_at: DateTime<Utc>,

    /// Resources in the order they were created
    pub resources: Vec<ResourceState>,

    /// Exported stack outputs
    pub outputs: BTreeMap<String, serde_json::Value>,
}

impl StackState {
    pub fn new(identity: StackIdentity) -> Self {
        Self {
            version: STATE_VERSION,
            identity,
            updated_at: Utc::now(),
            resources: Vec::new(),
            outputs: BTreeMap::new(),
        }
    }

    /// Get a resource by key
    pub fn get_resource(&self, key: &str) -> Option<&ResourceState> {
        self.resources.iter().find(|r| r.key == key)
    }

    /// Add or update a resource; new resources go to the end
    pub fn set_resource(&mut self, state: ResourceState) {
        match self.resources.iter_mut().find(|r| r.key == state.key) {
            Some(existing) => *existing = state,
            None => self.resources.push(state),
        }
        self.updated_at = Utc::now();
    }

    /// Remove a resource
    pub fn remove_resource(&mut self, key: &str) -> Option<ResourceState> {
        let index = self.resources.iter().position(|r| r.key == key)?;
        self.updated_at = Utc::now();
        Some(self.resources.remove(index))
    }

    /// Look up a recorded attribute of a resource
    pub fn attribute(&self, key: &str, attribute: &str) -> Option<&serde_json::Value> {
        self.get_resource(key)
            .and_then(|r| r.attributes.get(attribute))
    }
}

/// State of a single resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceState {
    /// Resource key (type:name)
    pub key: String,

    /// Resource type
    pub resource_type: String,

    /// Logical name
    pub name: String,

    /// Provider-specific resource ID
    pub id: String,

    #[serde(default)]
    pub protect: bool,

    /// Current status
    pub status: ResourceStatus,

    /// Configuration the resource was last applied with, references resolved
    pub inputs: serde_json::Value,

    /// Resource attributes (arn, name, ...)
    pub attributes: HashMap<String, serde_json::Value>,

    /// When the resource was created
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl ResourceState {
    /// Record a freshly created resource
    pub fn created(resolved: &ResourceConfig, outputs: ResourceOutputs) -> Self {
        let now = Utc::now();
        Self {
            key: resolved.key(),
            resource_type: resolved.resource_type.clone(),
            name: resolved.name.clone(),
            id: outputs.id,
            protect: resolved.protect,
            status: ResourceStatus::Ready,
            inputs: resolved.config.clone(),
            attributes: outputs.attributes,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record an in-place update
    pub fn updated(mut self, resolved: &ResourceConfig, outputs: ResourceOutputs) -> Self {
        self.id = outputs.id;
        self.protect = resolved.protect;
        self.status = ResourceStatus::Ready;
        self.inputs = resolved.config.clone();
        self.attributes.extend(outputs.attributes);
        self.updated_at = Utc::now();
        self
    }

    pub fn get_attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Whether the resource existed before the stack recorded it
    pub fn is_adopted(&self) -> bool {
        self.get_attribute(ADOPTED_ATTRIBUTE).unwrap_or(false)
    }
}

/// Status of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    /// Resource exists and matches its recorded inputs
    Ready,
    /// Last change to the resource failed; its real state is unknown
    Error,
}

impl std::fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceStatus::Ready => write!(f, "ready"),
            ResourceStatus::Error => write!(f, "error"),
        }
    }
}

/// State manager for reading/writing one stack's state file
pub struct StateManager {
    state_dir: PathBuf,
    identity: StackIdentity,
}

impl StateManager {
    pub fn new(state_dir: impl AsRef<Path>, identity: StackIdentity) -> Self {
        Self {
            state_dir: state_dir.as_ref().to_path_buf(),
            identity,
        }
    }

    pub fn identity(&self) -> &StackIdentity {
        &self.identity
    }

    /// Directory holding all stacks of the project
    fn project_dir(&self) -> PathBuf {
        self.state_dir.join(&self.identity.project_name)
    }

    fn file(&self, ext: &str) -> PathBuf {
        self.project_dir()
            .join(format!("{}.{}", self.identity.stack_name, ext))
    }

    /// Get the state file path
    pub fn state_path(&self) -> PathBuf {
        self.file(STATE_EXT)
    }

    /// Get the backup file path
    fn backup_path(&self) -> PathBuf {
        self.file(BACKUP_EXT)
    }

    /// Get the lock file path
    fn lock_path(&self) -> PathBuf {
        self.file(LOCK_EXT)
    }

    /// Ensure the state directory exists
    async fn ensure_state_dir(&self) -> Result<()> {
        let dir = self.project_dir();
        if !dir.exists() {
            fs::create_dir_all(&dir).await?;
            tracing::debug!("Created state directory: {}", dir.display());
        }
        Ok(())
    }

    /// Whether the stack has been created
    pub fn exists(&self) -> bool {
        self.state_path().exists()
    }

    /// Load the current state, or an empty one if the stack was never saved
    pub async fn load(&self) -> Result<StackState> {
        let path = self.state_path();
        if !path.exists() {
            tracing::debug!("State file not found, returning empty state");
            return Ok(StackState::new(self.identity.clone()));
        }

        let content = fs::read_to_string(&path).await?;
        let state: StackState = serde_json::from_str(&content)?;

        // Version check
        if state.version > STATE_VERSION {
            return Err(CloudError::StateError(format!(
                "State file version {} is newer than supported version {}",
                state.version, STATE_VERSION
            )));
        }

        if state.identity.project_name != self.identity.project_name
            || state.identity.stack_name != self.identity.stack_name
        {
            return Err(CloudError::StateError(format!(
                "State file {} belongs to stack {}",
                path.display(),
                state.identity
            )));
        }

        tracing::debug!("Loaded state with {} resources", state.resources.len());
        Ok(state)
    }

    /// Save the state
    pub async fn save(&self, state: &StackState) -> Result<()> {
        self.ensure_state_dir().await?;

        let path = self.state_path();
        let backup = self.backup_path();

        // Create backup if state file exists
        if path.exists() {
            if backup.exists() {
                fs::remove_file(&backup).await?;
            }
            fs::rename(&path, &backup).await?;
            tracing::debug!("Created state backup");
        }

        // Write new state
        let content = serde_json::to_string_pretty(state)?;
        fs::write(&path, content).await?;

        tracing::debug!("Saved state with {} resources", state.resources.len());
        Ok(())
    }

    /// Remove the state files of the stack
    pub async fn remove(&self) -> Result<()> {
        for path in [self.state_path(), self.backup_path()] {
            if path.exists() {
                fs::remove_file(&path).await?;
            }
        }
        tracing::debug!("Removed state for {}", self.identity);
        Ok(())
    }

    /// Acquire a lock for exclusive access
    pub async fn acquire_lock(&self) -> Result<StateLock> {
        self.ensure_state_dir().await?;

        let lock_path = self.lock_path();
        let lock_info = LockInfo {
            holder: std::env::var("HOSTNAME")
                .or_else(|_| std::env::var("HOST"))
                .unwrap_or_else(|_| "unknown".to_string()),
            acquired_at: Utc::now(),
        };
        let content = serde_json::to_string_pretty(&lock_info)?;

        match create_new(&lock_path, &content).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                self.remove_stale_lock(&lock_path).await?;
                // another process may have won the race since
                create_new(&lock_path, &content).await.map_err(|e| {
                    if e.kind() == ErrorKind::AlreadyExists {
                        self.held_by_other()
                    } else {
                        e.into()
                    }
                })?;
            }
            Err(e) => return Err(e.into()),
        }

        tracing::debug!("Acquired state lock");
        Ok(StateLock {
            lock_path,
            released: false,
        })
    }

    fn held_by_other(&self) -> CloudError {
        CloudError::LockError(format!("Stack {} is locked by another process", self.identity))
    }

    /// Remove an existing lock if it is stale, fail if it is still held
    async fn remove_stale_lock(&self, lock_path: &Path) -> Result<()> {
        let content = match fs::read_to_string(lock_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        // a lock that is still being written is held
        let lock_info: LockInfo =
            serde_json::from_str(&content).map_err(|_| self.held_by_other())?;

        let age = Utc::now().signed_duration_since(lock_info.acquired_at);
        if age.num_hours() < STALE_LOCK_HOURS {
            return Err(CloudError::LockError(format!(
                "Stack {} is locked by {} since {}",
                self.identity, lock_info.holder, lock_info.acquired_at
            )));
        }

        tracing::warn!("Removing stale lock from {}", lock_info.holder);
        match fs::remove_file(lock_path).await {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// Create a file, failing if it already exists
async fn create_new(path: &Path, content: &str) -> std::io::Result<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    file.write_all(content.as_bytes()).await?;
    file.flush().await
}

/// Lock information
#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    holder: String,
    acquired_at: DateTime<Utc>,
}

/// RAII guard for state lock
#[derive(Debug)]
pub struct StateLock {
    lock_path: PathBuf,
    released: bool,
}

impl StateLock {
    /// Release the lock
    pub async fn release(mut self) -> Result<()> {
        if !self.released {
            if self.lock_path.exists() {
                fs::remove_file(&self.lock_path).await?;
                tracing::debug!("Released state lock");
            }
            self.released = true;
        }
        Ok(())
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if !self.released && self.lock_path.exists() {
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }
}
