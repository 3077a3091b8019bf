//! Startup provisioning: default permissions and groups, extra permissions,
//! and users created straight into groups.

use super::authz::{CREATE_USERS, DELETE_USERS, DETAIL_USERS, UPDATE_USERS, VIEW_USERS};
use super::{ServiceError, Store};
use crate::models::{GroupChanges, NewUser, Permission, PermissionChanges, UserWithPermissions};
use crate::utils::{hash_password, Password};

pub const ADMIN_GROUP: &str = "Admin";
pub const USER_GROUP: &str = "User";

const DEFAULT_PERMISSIONS: [(&str, &str); 5] = [
    (VIEW_USERS, "Permission to view users"),
    (DETAIL_USERS, "Permission to detail users"),
    (CREATE_USERS, "Permission to create users"),
    (UPDATE_USERS, "Permission to update users"),
    (DELETE_USERS, "Permission to delete users"),
];

const DEFAULT_GROUPS: [(&str, &str, &[&str]); 2] = [
    (
        ADMIN_GROUP,
        "Admin User",
        &[VIEW_USERS, CREATE_USERS, UPDATE_USERS, DELETE_USERS, DETAIL_USERS],
    ),
    (USER_GROUP, "Standard User", &[VIEW_USERS, DETAIL_USERS]),
];

/// Return the permission with `code_name`, creating it if it doesn't exist.
async fn ensure_permission(
    store: &dyn Store,
    code_name: &str,
    name: &str,
) -> Result<Permission, ServiceError> {
    if let Some(existing) = store.find_permission_by_code(code_name).await? {
        return Ok(existing);
    }
    create_permission(store, code_name, name).await
}

/// Create the built-in permissions and the `Admin` and `User` groups.
/// Existing entries are left untouched, so this can run on every start.
pub async fn seed_default_access(store: &dyn Store) -> Result<(), ServiceError> {
    let mut permissions = Vec::with_capacity(DEFAULT_PERMISSIONS.len());
    for (code_name, name) in DEFAULT_PERMISSIONS {
        permissions.push(ensure_permission(store, code_name, name).await?);
    }

    for (code_name, name, granted) in DEFAULT_GROUPS {
        if store.find_group_by_code(code_name).await?.is_some() {
            continue;
        }

        let permission_ids = permissions
            .iter()
            .filter(|p| granted.contains(&p.code_name.as_str()))
            .map(|p| p.id)
            .collect();

        store
            .insert_group(GroupChanges {
                code_name: code_name.to_string(),
                name: name.to_string(),
                permission_ids,
            })
            .await?;
        tracing::info!(group = code_name, "Seeded group");
    }

    Ok(())
}

pub async fn create_permission(
    store: &dyn Store,
    code_name: &str,
    name: &str,
) -> Result<Permission, ServiceError> {
    let permission = store
        .insert_permission(PermissionChanges {
            code_name: code_name.to_string(),
            name: name.to_string(),
        })
        .await?;
    tracing::info!(permission = code_name, "Created permission");
    Ok(permission)
}

/// Create a user in the given groups with the given direct permissions.
/// Every code must already exist; the first unknown one aborts the call
/// before anything is written.
pub async fn create_user(
    store: &dyn Store,
    email: &str,
    password: &str,
    name: &str,
    group_codes: &[&str],
    permission_codes: &[&str],
) -> Result<UserWithPermissions, ServiceError> {
    if password.is_empty() {
        return Err(ServiceError::Validation("Password is required".to_string()));
    }

    let mut permission_ids = Vec::with_capacity(permission_codes.len());
    for code in permission_codes {
        let permission = store
            .find_permission_by_code(code)
            .await?
            .ok_or_else(|| ServiceError::UnknownCode {
                kind: "permission",
                code: code.to_string(),
            })?;
        permission_ids.push(permission.id);
    }

    let mut group_ids = Vec::with_capacity(group_codes.len());
    for code in group_codes {
        let group = store
            .find_group_by_code(code)
            .await?
            .ok_or_else(|| ServiceError::UnknownCode {
                kind: "group",
                code: code.to_string(),
            })?;
        group_ids.push(group.id);
    }

    let password_hash = hash_password(&Password::new(password))?;
    let user = store
        .insert_user(NewUser {
            email: email.to_string(),
            name: name.to_string(),
            password_hash: password_hash.into_string(),
            group_ids,
            permission_ids,
        })
        .await?;

    tracing::info!(user_id = user.id(), "Provisioned user");
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{IdentityStore, MemoryStore};

    #[tokio::test]
    async fn seeding_twice_is_idempotent() {
        let store = MemoryStore::new();
        seed_default_access(&store).await.unwrap();
        seed_default_access(&store).await.unwrap();

        assert_eq!(store.list_permissions().await.unwrap().len(), 5);
        assert_eq!(store.list_groups().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn seeded_groups_carry_expected_permissions() {
        let store = MemoryStore::new();
        seed_default_access(&store).await.unwrap();

        let admin = store.find_group_by_code(ADMIN_GROUP).await.unwrap().unwrap();
        let user = store.find_group_by_code(USER_GROUP).await.unwrap().unwrap();

        assert_eq!(admin.permissions.len(), 5);
        assert!(user.grants(VIEW_USERS));
        assert!(user.grants(DETAIL_USERS));
        assert!(!user.grants(DELETE_USERS));
    }

    #[tokio::test]
    async fn create_user_joins_groups_by_code() {
        let store = MemoryStore::new();
        seed_default_access(&store).await.unwrap();

        let admin = create_user(
            &store,
            "root@example.com",
            "s3cret",
            "Root",
            &[ADMIN_GROUP],
            &[],
        )
        .await
        .unwrap();

        assert!(admin.groups.iter().any(|g| g.code_name == ADMIN_GROUP));
        assert!(admin.has_permission(DELETE_USERS));
    }

    #[tokio::test]
    async fn unknown_group_code_writes_nothing() {
        let store = MemoryStore::new();
        seed_default_access(&store).await.unwrap();

        let err = create_user(&store, "x@example.com", "pw", "X", &["Nope"], &[])
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Nope"));
        assert!(store.find_user_by_email("x@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn create_permission_rejects_duplicates() {
        let store = MemoryStore::new();
        create_permission(&store, "export-users", "Export").await.unwrap();

        assert!(matches!(
            create_permission(&store, "export-users", "Export").await,
            Err(ServiceError::Conflict(_))
        ));
    }
}
