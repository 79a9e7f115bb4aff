//! In-memory stand-ins for IAM and S3 Control

use crate::error::{AwsError, AwsResult};
use crate::iam::{AccessKey, IamApi, IamUser};
use crate::paging::Page;
use crate::s3control::{AccessGrant, AccessGrantsApi, GrantsLocation, NewGrant};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

pub const ACCOUNT: &str = "123";

fn not_found(operation: &str, what: &str) -> AwsError {
    AwsError::NotFound {
        operation: operation.to_string(),
        code: "NoSuchEntity".to_string(),
        message: format!("{what} not found"),
    }
}

/// Split `items` into pages of `size`, using the start index as token
fn page_of<T: Clone>(items: &[T], token: Option<String>, size: usize) -> Page<T> {
    let start: usize = token.and_then(|t| t.parse().ok()).unwrap_or(0);
    let end = (start + size).min(items.len());
    let next = (end < items.len()).then(|| end.to_string());
    Page::new(items[start..end].to_vec(), next)
}

#[derive(Default)]
struct IamState {
    users: BTreeMap<String, IamUser>,
    keys: BTreeMap<String, Vec<String>>,
    groups: BTreeMap<String, BTreeSet<String>>,
    key_counter: u32,
}

/// Fake IAM with a page size of two
pub struct FakeIam {
    state: Mutex<IamState>,
    pub fail_add_to_group: bool,
    pub fail_delete_user: bool,
    pub page_size: usize,
}

impl FakeIam {
    pub fn with_group(group: &str) -> Self {
        let mut state = IamState::default();
        state.groups.insert(group.to_string(), BTreeSet::new());
        Self {
            state: Mutex::new(state),
            fail_add_to_group: false,
            fail_delete_user: false,
            page_size: 2,
        }
    }

    pub fn user_names(&self) -> Vec<String> {
        self.state.lock().unwrap().users.keys().cloned().collect()
    }

    pub fn key_count(&self, user_name: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .keys
            .get(user_name)
            .map_or(0, Vec::len)
    }

    pub fn members(&self, group: &str) -> Vec<String> {
        self.state.lock().unwrap().groups[group].iter().cloned().collect()
    }

    /// Insert a user directly, without keys or memberships
    pub fn seed_user(&self, user_name: &str) {
        let mut state = self.state.lock().unwrap();
        state.users.insert(
            user_name.to_string(),
            IamUser {
                user_name: user_name.to_string(),
                user_id: format!("AID{}", user_name.to_uppercase()),
                arn: format!("arn:aws:iam::{ACCOUNT}:user/{user_name}"),
            },
        );
    }
}

#[async_trait]
impl IamApi for FakeIam {
    async fn create_user(&self, user_name: &str) -> AwsResult<IamUser> {
        if self.state.lock().unwrap().users.contains_key(user_name) {
            return Err(AwsError::Conflict {
                operation: "CreateUser".into(),
                code: "EntityAlreadyExists".into(),
                message: format!("User with name {user_name} already exists."),
            });
        }
        self.seed_user(user_name);
        Ok(self.state.lock().unwrap().users[user_name].clone())
    }

    async fn delete_user(&self, user_name: &str) -> AwsResult<()> {
        if self.fail_delete_user {
            return Err(AwsError::AccessDenied {
                operation: "DeleteUser".into(),
                code: "AccessDenied".into(),
                message: "not allowed".into(),
            });
        }
        let mut state = self.state.lock().unwrap();
        if state.keys.get(user_name).is_some_and(|k| !k.is_empty())
            || state.groups.values().any(|m| m.contains(user_name))
        {
            return Err(AwsError::Conflict {
                operation: "DeleteUser".into(),
                code: "DeleteConflict".into(),
                message: "user still has keys or groups".into(),
            });
        }
        state
            .users
            .remove(user_name)
            .map(|_| ())
            .ok_or_else(|| not_found("DeleteUser", user_name))
    }

    async fn create_access_key(&self, user_name: &str) -> AwsResult<AccessKey> {
        let mut state = self.state.lock().unwrap();
        if !state.users.contains_key(user_name) {
            return Err(not_found("CreateAccessKey", user_name));
        }
        state.key_counter += 1;
        let id = format!("AKIA{:04}", state.key_counter);
        state
            .keys
            .entry(user_name.to_string())
            .or_default()
            .push(id.clone());
        Ok(AccessKey {
            user_name: user_name.to_string(),
            access_key_id: id,
            secret_access_key: "secret".to_string(),
        })
    }

    async fn delete_access_key(&self, user_name: &str, access_key_id: &str) -> AwsResult<()> {
        let mut state = self.state.lock().unwrap();
        let keys = state
            .keys
            .get_mut(user_name)
            .ok_or_else(|| not_found("DeleteAccessKey", access_key_id))?;
        let before = keys.len();
        keys.retain(|k| k != access_key_id);
        if keys.len() == before {
            return Err(not_found("DeleteAccessKey", access_key_id));
        }
        Ok(())
    }

    async fn list_access_keys_page(
        &self,
        user_name: &str,
        marker: Option<String>,
    ) -> AwsResult<Page<String>> {
        let state = self.state.lock().unwrap();
        if !state.users.contains_key(user_name) {
            return Err(not_found("ListAccessKeys", user_name));
        }
        let keys = state.keys.get(user_name).cloned().unwrap_or_default();
        Ok(page_of(&keys, marker, self.page_size))
    }

    async fn add_user_to_group(&self, group_name: &str, user_name: &str) -> AwsResult<()> {
        if self.fail_add_to_group {
            return Err(AwsError::AccessDenied {
                operation: "AddUserToGroup".into(),
                code: "AccessDenied".into(),
                message: "not allowed".into(),
            });
        }
        let mut state = self.state.lock().unwrap();
        if !state.users.contains_key(user_name) {
            return Err(not_found("AddUserToGroup", user_name));
        }
        state
            .groups
            .get_mut(group_name)
            .ok_or_else(|| not_found("AddUserToGroup", group_name))?
            .insert(user_name.to_string());
        Ok(())
    }

    async fn remove_user_from_group(&self, group_name: &str, user_name: &str) -> AwsResult<()> {
        let mut state = self.state.lock().unwrap();
        let removed = state
            .groups
            .get_mut(group_name)
            .is_some_and(|members| members.remove(user_name));
        if !removed {
            return Err(not_found("RemoveUserFromGroup", user_name));
        }
        Ok(())
    }

    async fn list_users_page(&self, marker: Option<String>) -> AwsResult<Page<IamUser>> {
        let users: Vec<IamUser> = self.state.lock().unwrap().users.values().cloned().collect();
        Ok(page_of(&users, marker, self.page_size))
    }
}

/// Fake S3 Control with a page size of two
pub struct FakeAccessGrants {
    locations: Vec<GrantsLocation>,
    grants: Mutex<Vec<AccessGrant>>,
    counter: Mutex<u32>,
    pub page_size: usize,
}

impl FakeAccessGrants {
    pub fn with_locations(ids: &[&str]) -> Self {
        Self {
            locations: ids
                .iter()
                .map(|id| GrantsLocation {
                    location_id: id.to_string(),
                    location_scope: format!("s3://bucket-{id}/"),
                    iam_role_arn: Some(format!("arn:aws:iam::{ACCOUNT}:role/location")),
                })
                .collect(),
            grants: Mutex::new(Vec::new()),
            counter: Mutex::new(0),
            page_size: 2,
        }
    }
}

#[async_trait]
impl AccessGrantsApi for FakeAccessGrants {
    async fn create_access_grant(&self, grant: &NewGrant) -> AwsResult<AccessGrant> {
        if !self
            .locations
            .iter()
            .any(|l| l.location_id == grant.location_id)
        {
            return Err(AwsError::NotFound {
                operation: "CreateAccessGrant".into(),
                code: "AccessGrantsLocationNotFound".into(),
                message: format!("location {} does not exist", grant.location_id),
            });
        }

        let mut counter = self.counter.lock().unwrap();
        *counter += 1;
        let grant_id = format!("grant-{counter}");
        let created = AccessGrant {
            grant_arn: Some(format!(
                "arn:aws:s3:us-east-1:{ACCOUNT}:access-grants/default/grant/{grant_id}"
            )),
            grant_id,
            location_id: Some(grant.location_id.clone()),
            grantee: Some(grant.grantee_arn.clone()),
            sub_prefix: Some(grant.sub_prefix.clone()),
            permission: Some("READWRITE".to_string()),
        };
        self.grants.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn delete_access_grant(&self, grant_id: &str) -> AwsResult<()> {
        let mut grants = self.grants.lock().unwrap();
        let before = grants.len();
        grants.retain(|g| g.grant_id != grant_id);
        if grants.len() == before {
            return Err(AwsError::NotFound {
                operation: "DeleteAccessGrant".into(),
                code: "AccessGrantNotFound".into(),
                message: format!("grant {grant_id} does not exist"),
            });
        }
        Ok(())
    }

    async fn list_access_grants_page(
        &self,
        next_token: Option<String>,
    ) -> AwsResult<Page<AccessGrant>> {
        let grants = self.grants.lock().unwrap().clone();
        Ok(page_of(&grants, next_token, self.page_size))
    }

    async fn list_locations_page(
        &self,
        next_token: Option<String>,
    ) -> AwsResult<Page<GrantsLocation>> {
        Ok(page_of(&self.locations, next_token, self.page_size))
    }
}
