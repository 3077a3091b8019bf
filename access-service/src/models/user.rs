//! User model - authenticated principals and their resolved permissions.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use super::{Group, Permission};

/// User row. Deliberately not `Serialize`: the password hash must only ever
/// leave through [`UserResponse`], which drops it.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// A user together with its groups (each with their permissions) and its
/// direct permissions. This is the identity the authorization gate consumes.
#[derive(Debug, Clone)]
pub struct UserWithPermissions {
    pub user: User,
    pub groups: Vec<Group>,
    pub user_permissions: Vec<Permission>,
}

impl UserWithPermissions {
    pub fn id(&self) -> i64 {
        self.user.id
    }

    /// True if `code` is granted directly or through any group.
    pub fn has_permission(&self, code: &str) -> bool {
        self.user_permissions.iter().any(|p| p.code_name == code)
            || self.groups.iter().any(|g| g.grants(code))
    }

}

/// Fields required to create a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub group_ids: Vec<i64>,
    pub permission_ids: Vec<i64>,
}

/// Profile update. `password_hash` is only replaced when present.
#[derive(Debug, Clone)]
pub struct UserChanges {
    pub email: String,
    pub name: String,
    pub password_hash: Option<String>,
}

/// User response for API (without sensitive fields).
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub groups: Vec<Group>,
    pub user_permissions: Vec<Permission>,
}

impl From<UserWithPermissions> for UserResponse {
    fn from(u: UserWithPermissions) -> Self {
        Self {
            id: u.user.id,
            email: u.user.email,
            name: u.user.name,
            created_at: u.user.created_at,
            groups: u.groups,
            user_permissions: u.user_permissions,
        }
    }
}
