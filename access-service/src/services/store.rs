//! Persistence seams. Handlers and services only ever see these traits;
//! [`PgStore`](super::PgStore) backs them in production and
//! [`MemoryStore`](super::MemoryStore) in tests and local runs.

use async_trait::async_trait;

use super::ServiceError;
use crate::models::{
    AuthRecord, Group, GroupChanges, NewUser, Permission, PermissionChanges, UserChanges,
    UserWithPermissions,
};

/// Users, groups and permissions.
///
/// Every user returned carries its groups (with their permissions) and its
/// direct permissions, so callers never need a second round trip to decide
/// authorization.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_user_with_permissions(
        &self,
        id: i64,
    ) -> Result<Option<UserWithPermissions>, ServiceError>;
    async fn find_user_by_email(
        &self,
        email: &str,
    ) -> Result<Option<UserWithPermissions>, ServiceError>;
    async fn list_users(&self) -> Result<Vec<UserWithPermissions>, ServiceError>;
    /// Fails with `Conflict` if the email is taken and `NotFound` if a
    /// referenced group or permission doesn't exist.
    async fn insert_user(&self, user: NewUser) -> Result<UserWithPermissions, ServiceError>;
    async fn update_user(
        &self,
        id: i64,
        changes: UserChanges,
    ) -> Result<Option<UserWithPermissions>, ServiceError>;
    async fn delete_user(&self, id: i64) -> Result<bool, ServiceError>;

    async fn list_groups(&self) -> Result<Vec<Group>, ServiceError>;
    async fn find_group(&self, id: i64) -> Result<Option<Group>, ServiceError>;
    async fn find_group_by_code(&self, code_name: &str) -> Result<Option<Group>, ServiceError>;
    async fn insert_group(&self, group: GroupChanges) -> Result<Group, ServiceError>;
    async fn update_group(
        &self,
        id: i64,
        changes: GroupChanges,
    ) -> Result<Option<Group>, ServiceError>;
    async fn delete_group(&self, id: i64) -> Result<bool, ServiceError>;

    async fn list_permissions(&self) -> Result<Vec<Permission>, ServiceError>;
    async fn find_permission(&self, id: i64) -> Result<Option<Permission>, ServiceError>;
    async fn find_permission_by_code(
        &self,
        code_name: &str,
    ) -> Result<Option<Permission>, ServiceError>;
    async fn insert_permission(
        &self,
        permission: PermissionChanges,
    ) -> Result<Permission, ServiceError>;
    async fn update_permission(
        &self,
        id: i64,
        changes: PermissionChanges,
    ) -> Result<Option<Permission>, ServiceError>;
    async fn delete_permission(&self, id: i64) -> Result<bool, ServiceError>;

    async fn health_check(&self) -> Result<(), ServiceError>;
}

/// Owner-scoped records. Mutations take the owner so a record can only be
/// changed through its owner's identity.
#[async_trait]
pub trait AuthRecordStore: Send + Sync {
    async fn find_auth_record(&self, id: i64) -> Result<Option<AuthRecord>, ServiceError>;
    /// Records of `owner_id`, ascending by id, after skipping `skip` and
    /// keeping at most `take`.
    async fn list_auth_records_by_owner(
        &self,
        owner_id: i64,
        skip: i64,
        take: i64,
    ) -> Result<Vec<AuthRecord>, ServiceError>;
    async fn insert_auth_record(
        &self,
        owner_id: i64,
        text: &str,
    ) -> Result<AuthRecord, ServiceError>;
    async fn update_auth_record(
        &self,
        id: i64,
        owner_id: i64,
        text: &str,
    ) -> Result<Option<AuthRecord>, ServiceError>;
    async fn delete_auth_record(&self, id: i64, owner_id: i64) -> Result<bool, ServiceError>;
}

pub trait Store: IdentityStore + AuthRecordStore {}

impl<T> Store for T where T: IdentityStore + AuthRecordStore {}
