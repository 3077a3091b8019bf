//! Group model - named bundles of permissions.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::Permission;

/// Group with its permission set resolved.
///
/// `code_name` is the lookup key used by registration and bootstrap and is
/// immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: i64,
    pub code_name: String,
    pub name: String,
    #[sqlx(skip)]
    pub permissions: Vec<Permission>,
}

impl Group {
    pub fn grants(&self, code: &str) -> bool {
        self.permissions.iter().any(|p| p.code_name == code)
    }
}

/// Fields written when creating or updating a group. The permission set is
/// replaced wholesale.
#[derive(Debug, Clone)]
pub struct GroupChanges {
    pub code_name: String,
    pub name: String,
    pub permission_ids: Vec<i64>,
}
