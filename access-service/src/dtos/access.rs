//! Group and permission bodies. Field names are camelCase on the wire.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{Group, Permission};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GroupRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,

    #[validate(length(min = 1, max = 255, message = "Code name must be 1-255 characters"))]
    pub code_name: String,

    /// Permission ids. The group's permission set is replaced with these.
    #[serde(default)]
    pub permission: Vec<i64>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PermissionRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,

    #[validate(length(min = 1, max = 255, message = "Code name must be 1-255 characters"))]
    pub code_name: String,
}

#[derive(Debug, Serialize)]
pub struct GroupEnvelope {
    pub group: Group,
}

#[derive(Debug, Serialize)]
pub struct GroupsEnvelope {
    pub groups: Vec<Group>,
}

#[derive(Debug, Serialize)]
pub struct PermissionEnvelope {
    pub permission: Permission,
}
