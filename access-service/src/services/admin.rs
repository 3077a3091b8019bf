//! User, group and permission administration.
//!
//! Each operation is gated on the static operation table before anything is
//! looked up, so an unauthorized caller learns nothing about which ids exist.

use std::sync::Arc;

use super::authz::{authorize, Operation};
use super::{ServiceError, Store};
use crate::dtos::access::{GroupRequest, PermissionRequest};
use crate::dtos::users::{CreateUserRequest, UpdateUserRequest};
use crate::models::{
    Group, GroupChanges, NewUser, Permission, PermissionChanges, UserChanges, UserWithPermissions,
};
use crate::utils::{hash_password, Password};

#[derive(Clone)]
pub struct AdminService {
    store: Arc<dyn Store>,
}

impl AdminService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    // ==================== Users ====================

    pub async fn list_users(
        &self,
        caller: &UserWithPermissions,
    ) -> Result<Vec<UserWithPermissions>, ServiceError> {
        authorize(Some(caller), Operation::ListUsers)?;
        self.store.list_users().await
    }

    pub async fn show_user(
        &self,
        caller: &UserWithPermissions,
        id: i64,
    ) -> Result<UserWithPermissions, ServiceError> {
        authorize(Some(caller), Operation::ShowUser)?;
        self.store
            .find_user_with_permissions(id)
            .await?
            .ok_or(ServiceError::NotFound("User"))
    }

    pub async fn create_user(
        &self,
        caller: &UserWithPermissions,
        req: CreateUserRequest,
    ) -> Result<UserWithPermissions, ServiceError> {
        authorize(Some(caller), Operation::CreateUser)?;

        let password_hash = hash_password(&Password::new(req.password))?;
        let user = self
            .store
            .insert_user(NewUser {
                email: req.email,
                name: req.name,
                password_hash: password_hash.into_string(),
                group_ids: vec![],
                permission_ids: vec![],
            })
            .await?;

        tracing::info!(user_id = user.id(), created_by = caller.id(), "User created");
        Ok(user)
    }

    pub async fn update_user(
        &self,
        caller: &UserWithPermissions,
        id: i64,
        req: UpdateUserRequest,
    ) -> Result<UserWithPermissions, ServiceError> {
        authorize(Some(caller), Operation::UpdateUser)?;

        let password_hash = match req.password {
            Some(password) => Some(hash_password(&Password::new(password))?.into_string()),
            None => None,
        };

        self.store
            .update_user(
                id,
                UserChanges {
                    email: req.email,
                    name: req.name,
                    password_hash,
                },
            )
            .await?
            .ok_or(ServiceError::NotFound("User"))
    }

    pub async fn delete_user(&self, caller: &UserWithPermissions, id: i64) -> Result<(), ServiceError> {
        authorize(Some(caller), Operation::DeleteUser)?;

        if !self.store.delete_user(id).await? {
            return Err(ServiceError::NotFound("User"));
        }
        tracing::info!(user_id = id, deleted_by = caller.id(), "User deleted");
        Ok(())
    }

    // ==================== Groups ====================

    pub async fn list_groups(&self, caller: &UserWithPermissions) -> Result<Vec<Group>, ServiceError> {
        authorize(Some(caller), Operation::ListGroups)?;
        self.store.list_groups().await
    }

    pub async fn show_group(
        &self,
        caller: &UserWithPermissions,
        id: i64,
    ) -> Result<Group, ServiceError> {
        authorize(Some(caller), Operation::ShowGroup)?;
        self.store
            .find_group(id)
            .await?
            .ok_or(ServiceError::NotFound("Group"))
    }

    pub async fn create_group(
        &self,
        caller: &UserWithPermissions,
        req: GroupRequest,
    ) -> Result<Group, ServiceError> {
        authorize(Some(caller), Operation::CreateGroup)?;
        self.store
            .insert_group(GroupChanges {
                code_name: req.code_name,
                name: req.name,
                permission_ids: req.permission,
            })
            .await
    }

    /// Rename a group and replace its permission set. The code name is
    /// fixed at creation; a different one in the body is a conflict.
    pub async fn update_group(
        &self,
        caller: &UserWithPermissions,
        id: i64,
        req: GroupRequest,
    ) -> Result<Group, ServiceError> {
        authorize(Some(caller), Operation::UpdateGroup)?;

        let current = self
            .store
            .find_group(id)
            .await?
            .ok_or(ServiceError::NotFound("Group"))?;
        if current.code_name != req.code_name {
            return Err(ServiceError::Conflict(
                "Group code name cannot be changed".to_string(),
            ));
        }

        self.store
            .update_group(
                id,
                GroupChanges {
                    code_name: req.code_name,
                    name: req.name,
                    permission_ids: req.permission,
                },
            )
            .await?
            .ok_or(ServiceError::NotFound("Group"))
    }

    pub async fn delete_group(&self, caller: &UserWithPermissions, id: i64) -> Result<(), ServiceError> {
        authorize(Some(caller), Operation::DeleteGroup)?;

        if !self.store.delete_group(id).await? {
            return Err(ServiceError::NotFound("Group"));
        }
        Ok(())
    }

    // ==================== Permissions ====================

    pub async fn list_permissions(
        &self,
        caller: &UserWithPermissions,
    ) -> Result<Vec<Permission>, ServiceError> {
        authorize(Some(caller), Operation::ListPermissions)?;
        self.store.list_permissions().await
    }

    pub async fn show_permission(
        &self,
        caller: &UserWithPermissions,
        id: i64,
    ) -> Result<Permission, ServiceError> {
        authorize(Some(caller), Operation::ShowPermission)?;
        self.store
            .find_permission(id)
            .await?
            .ok_or(ServiceError::NotFound("Permission"))
    }

    pub async fn create_permission(
        &self,
        caller: &UserWithPermissions,
        req: PermissionRequest,
    ) -> Result<Permission, ServiceError> {
        authorize(Some(caller), Operation::CreatePermission)?;
        self.store
            .insert_permission(PermissionChanges {
                code_name: req.code_name,
                name: req.name,
            })
            .await
    }

    pub async fn update_permission(
        &self,
        caller: &UserWithPermissions,
        id: i64,
        req: PermissionRequest,
    ) -> Result<Permission, ServiceError> {
        authorize(Some(caller), Operation::UpdatePermission)?;

        let current = self
            .store
            .find_permission(id)
            .await?
            .ok_or(ServiceError::NotFound("Permission"))?;
        if current.code_name != req.code_name {
            return Err(ServiceError::Conflict(
                "Permission code name cannot be changed".to_string(),
            ));
        }

        self.store
            .update_permission(
                id,
                PermissionChanges {
                    code_name: req.code_name,
                    name: req.name,
                },
            )
            .await?
            .ok_or(ServiceError::NotFound("Permission"))
    }

    pub async fn delete_permission(
        &self,
        caller: &UserWithPermissions,
        id: i64,
    ) -> Result<(), ServiceError> {
        authorize(Some(caller), Operation::DeletePermission)?;

        if !self.store.delete_permission(id).await? {
            return Err(ServiceError::NotFound("Permission"));
        }
        Ok(())
    }
}
