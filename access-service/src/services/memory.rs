//! Process-local store. Ids are assigned in insertion order, so id order is
//! creation order, matching the PostgreSQL sequences.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use super::store::{AuthRecordStore, IdentityStore};
use super::ServiceError;
use crate::models::{
    AuthRecord, Group, GroupChanges, NewUser, Permission, PermissionChanges, User, UserChanges,
    UserWithPermissions,
};

#[derive(Debug, Clone)]
struct UserRow {
    user: User,
    group_ids: Vec<i64>,
    permission_ids: Vec<i64>,
}

#[derive(Debug, Clone)]
struct GroupRow {
    id: i64,
    code_name: String,
    name: String,
    permission_ids: Vec<i64>,
}

#[derive(Default)]
struct Tables {
    next_id: i64,
    users: BTreeMap<i64, UserRow>,
    groups: BTreeMap<i64, GroupRow>,
    permissions: BTreeMap<i64, Permission>,
    records: BTreeMap<i64, AuthRecord>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn permissions_for(&self, ids: &[i64]) -> Vec<Permission> {
        ids.iter()
            .filter_map(|id| self.permissions.get(id).cloned())
            .collect()
    }

    fn group(&self, row: &GroupRow) -> Group {
        Group {
            id: row.id,
            code_name: row.code_name.clone(),
            name: row.name.clone(),
            permissions: self.permissions_for(&row.permission_ids),
        }
    }

    fn user(&self, row: &UserRow) -> UserWithPermissions {
        UserWithPermissions {
            user: row.user.clone(),
            groups: row
                .group_ids
                .iter()
                .filter_map(|id| self.groups.get(id))
                .map(|g| self.group(g))
                .collect(),
            user_permissions: self.permissions_for(&row.permission_ids),
        }
    }

    fn ensure_permissions_exist(&self, ids: &[i64]) -> Result<(), ServiceError> {
        if ids.iter().all(|id| self.permissions.contains_key(id)) {
            Ok(())
        } else {
            Err(ServiceError::NotFound("Permission"))
        }
    }

    fn ensure_groups_exist(&self, ids: &[i64]) -> Result<(), ServiceError> {
        if ids.iter().all(|id| self.groups.contains_key(id)) {
            Ok(())
        } else {
            Err(ServiceError::NotFound("Group"))
        }
    }

    fn email_taken(&self, email: &str, except: Option<i64>) -> bool {
        self.users
            .values()
            .any(|u| u.user.email == email && Some(u.user.id) != except)
    }
}

fn dedup(ids: &[i64]) -> Vec<i64> {
    let mut out: Vec<i64> = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(id) {
            out.push(*id);
        }
    }
    out
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, ServiceError> {
        self.tables
            .lock()
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Memory store mutex poisoned: {}", e)))
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn find_user_with_permissions(
        &self,
        id: i64,
    ) -> Result<Option<UserWithPermissions>, ServiceError> {
        let tables = self.lock()?;
        Ok(tables.users.get(&id).map(|row| tables.user(row)))
    }

    async fn find_user_by_email(
        &self,
        email: &str,
    ) -> Result<Option<UserWithPermissions>, ServiceError> {
        let tables = self.lock()?;
        Ok(tables
            .users
            .values()
            .find(|row| row.user.email == email)
            .map(|row| tables.user(row)))
    }

    async fn list_users(&self) -> Result<Vec<UserWithPermissions>, ServiceError> {
        let tables = self.lock()?;
        Ok(tables.users.values().map(|row| tables.user(row)).collect())
    }

    async fn insert_user(&self, user: NewUser) -> Result<UserWithPermissions, ServiceError> {
        let mut tables = self.lock()?;
        if tables.email_taken(&user.email, None) {
            return Err(ServiceError::Conflict("Email already registered".to_string()));
        }
        tables.ensure_groups_exist(&user.group_ids)?;
        tables.ensure_permissions_exist(&user.permission_ids)?;

        let id = tables.next_id();
        let row = UserRow {
            user: User {
                id,
                email: user.email,
                name: user.name,
                password_hash: user.password_hash,
                created_at: Utc::now(),
            },
            group_ids: dedup(&user.group_ids),
            permission_ids: dedup(&user.permission_ids),
        };
        let resolved = tables.user(&row);
        tables.users.insert(id, row);
        Ok(resolved)
    }

    async fn update_user(
        &self,
        id: i64,
        changes: UserChanges,
    ) -> Result<Option<UserWithPermissions>, ServiceError> {
        let mut tables = self.lock()?;
        if !tables.users.contains_key(&id) {
            return Ok(None);
        }
        if tables.email_taken(&changes.email, Some(id)) {
            return Err(ServiceError::Conflict("Email already registered".to_string()));
        }

        let Some(row) = tables.users.get_mut(&id) else {
            return Ok(None);
        };
        row.user.email = changes.email;
        row.user.name = changes.name;
        if let Some(hash) = changes.password_hash {
            row.user.password_hash = hash;
        }
        let row = row.clone();
        Ok(Some(tables.user(&row)))
    }

    async fn delete_user(&self, id: i64) -> Result<bool, ServiceError> {
        let mut tables = self.lock()?;
        let removed = tables.users.remove(&id).is_some();
        if removed {
            tables.records.retain(|_, r| r.owner_id != id);
        }
        Ok(removed)
    }

    async fn list_groups(&self) -> Result<Vec<Group>, ServiceError> {
        let tables = self.lock()?;
        Ok(tables.groups.values().map(|g| tables.group(g)).collect())
    }

    async fn find_group(&self, id: i64) -> Result<Option<Group>, ServiceError> {
        let tables = self.lock()?;
        Ok(tables.groups.get(&id).map(|g| tables.group(g)))
    }

    async fn find_group_by_code(&self, code_name: &str) -> Result<Option<Group>, ServiceError> {
        let tables = self.lock()?;
        Ok(tables
            .groups
            .values()
            .find(|g| g.code_name == code_name)
            .map(|g| tables.group(g)))
    }

    async fn insert_group(&self, group: GroupChanges) -> Result<Group, ServiceError> {
        let mut tables = self.lock()?;
        if tables.groups.values().any(|g| g.code_name == group.code_name) {
            return Err(ServiceError::Conflict(format!(
                "Group '{}' already exists",
                group.code_name
            )));
        }
        tables.ensure_permissions_exist(&group.permission_ids)?;

        let id = tables.next_id();
        let row = GroupRow {
            id,
            code_name: group.code_name,
            name: group.name,
            permission_ids: dedup(&group.permission_ids),
        };
        let resolved = tables.group(&row);
        tables.groups.insert(id, row);
        Ok(resolved)
    }

    async fn update_group(
        &self,
        id: i64,
        changes: GroupChanges,
    ) -> Result<Option<Group>, ServiceError> {
        let mut tables = self.lock()?;
        if !tables.groups.contains_key(&id) {
            return Ok(None);
        }
        tables.ensure_permissions_exist(&changes.permission_ids)?;

        let Some(row) = tables.groups.get_mut(&id) else {
            return Ok(None);
        };
        row.name = changes.name;
        row.permission_ids = dedup(&changes.permission_ids);
        let row = row.clone();
        Ok(Some(tables.group(&row)))
    }

    async fn delete_group(&self, id: i64) -> Result<bool, ServiceError> {
        let mut tables = self.lock()?;
        let removed = tables.groups.remove(&id).is_some();
        if removed {
            for row in tables.users.values_mut() {
                row.group_ids.retain(|g| *g != id);
            }
        }
        Ok(removed)
    }

    async fn list_permissions(&self) -> Result<Vec<Permission>, ServiceError> {
        let tables = self.lock()?;
        Ok(tables.permissions.values().cloned().collect())
    }

    async fn find_permission(&self, id: i64) -> Result<Option<Permission>, ServiceError> {
        let tables = self.lock()?;
        Ok(tables.permissions.get(&id).cloned())
    }

    async fn find_permission_by_code(
        &self,
        code_name: &str,
    ) -> Result<Option<Permission>, ServiceError> {
        let tables = self.lock()?;
        Ok(tables
            .permissions
            .values()
            .find(|p| p.code_name == code_name)
            .cloned())
    }

    async fn insert_permission(
        &self,
        permission: PermissionChanges,
    ) -> Result<Permission, ServiceError> {
        let mut tables = self.lock()?;
        if tables
            .permissions
            .values()
            .any(|p| p.code_name == permission.code_name)
        {
            return Err(ServiceError::Conflict(format!(
                "Permission '{}' already exists",
                permission.code_name
            )));
        }

        let id = tables.next_id();
        let permission = Permission {
            id,
            code_name: permission.code_name,
            name: permission.name,
        };
        tables.permissions.insert(id, permission.clone());
        Ok(permission)
    }

    async fn update_permission(
        &self,
        id: i64,
        changes: PermissionChanges,
    ) -> Result<Option<Permission>, ServiceError> {
        let mut tables = self.lock()?;
        Ok(tables.permissions.get_mut(&id).map(|p| {
            p.name = changes.name;
            p.clone()
        }))
    }

    async fn delete_permission(&self, id: i64) -> Result<bool, ServiceError> {
        let mut tables = self.lock()?;
        let removed = tables.permissions.remove(&id).is_some();
        if removed {
            for group in tables.groups.values_mut() {
                group.permission_ids.retain(|p| *p != id);
            }
            for user in tables.users.values_mut() {
                user.permission_ids.retain(|p| *p != id);
            }
        }
        Ok(removed)
    }

    async fn health_check(&self) -> Result<(), ServiceError> {
        self.lock().map(|_| ())
    }
}

#[async_trait]
impl AuthRecordStore for MemoryStore {
    async fn find_auth_record(&self, id: i64) -> Result<Option<AuthRecord>, ServiceError> {
        let tables = self.lock()?;
        Ok(tables.records.get(&id).cloned())
    }

    async fn list_auth_records_by_owner(
        &self,
        owner_id: i64,
        skip: i64,
        take: i64,
    ) -> Result<Vec<AuthRecord>, ServiceError> {
        let tables = self.lock()?;
        Ok(tables
            .records
            .values()
            .filter(|r| r.owner_id == owner_id)
            .skip(skip.max(0) as usize)
            .take(take.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn insert_auth_record(
        &self,
        owner_id: i64,
        text: &str,
    ) -> Result<AuthRecord, ServiceError> {
        let mut tables = self.lock()?;
        if !tables.users.contains_key(&owner_id) {
            return Err(ServiceError::NotFound("User"));
        }

        let id = tables.next_id();
        let record = AuthRecord {
            id,
            text: text.to_string(),
            owner_id,
            created_at: Utc::now(),
        };
        tables.records.insert(id, record.clone());
        Ok(record)
    }

    async fn update_auth_record(
        &self,
        id: i64,
        owner_id: i64,
        text: &str,
    ) -> Result<Option<AuthRecord>, ServiceError> {
        let mut tables = self.lock()?;
        Ok(tables
            .records
            .get_mut(&id)
            .filter(|r| r.owner_id == owner_id)
            .map(|r| {
                r.text = text.to_string();
                r.clone()
            }))
    }

    async fn delete_auth_record(&self, id: i64, owner_id: i64) -> Result<bool, ServiceError> {
        let mut tables = self.lock()?;
        let owned = tables
            .records
            .get(&id)
            .is_some_and(|r| r.owner_id == owner_id);
        if owned {
            tables.records.remove(&id);
        }
        Ok(owned)
    }
}
