//! Permission model - atomic capabilities compared by code name.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A single capability. `code_name` is the only field authorization looks at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    pub id: i64,
    pub code_name: String,
    pub name: String,
}

/// Fields written when creating or updating a permission.
#[derive(Debug, Clone)]
pub struct PermissionChanges {
    pub code_name: String,
    pub name: String,
}
