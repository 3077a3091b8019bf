//! Authorization gate and the static operation → permission table.

use super::metrics::record_access_decision;
use super::ServiceError;
use crate::models::UserWithPermissions;

pub const VIEW_USERS: &str = "view-users";
pub const DETAIL_USERS: &str = "detail-users";
pub const CREATE_USERS: &str = "create-users";
pub const UPDATE_USERS: &str = "update-users";
pub const DELETE_USERS: &str = "delete-users";

/// Every protected operation the API exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ListUsers,
    ShowUser,
    CreateUser,
    UpdateUser,
    DeleteUser,
    ListGroups,
    ShowGroup,
    CreateGroup,
    UpdateGroup,
    DeleteGroup,
    ListPermissions,
    ShowPermission,
    CreatePermission,
    UpdatePermission,
    DeletePermission,
    ListAuthRecords,
    ShowAuthRecord,
    CreateAuthRecord,
    UpdateAuthRecord,
    DeleteAuthRecord,
    Logout,
}

impl Operation {
    /// Permission code the caller must hold, or `None` when authentication
    /// alone is enough.
    pub fn required_permission(self) -> Option<&'static str> {
        match self {
            Operation::ListUsers | Operation::ShowUser => Some(VIEW_USERS),
            Operation::CreateUser => Some(CREATE_USERS),
            Operation::UpdateUser => Some(UPDATE_USERS),
            Operation::DeleteUser => Some(DELETE_USERS),
            Operation::ListGroups
            | Operation::ShowGroup
            | Operation::CreateGroup
            | Operation::UpdateGroup
            | Operation::DeleteGroup
            | Operation::ListPermissions
            | Operation::ShowPermission
            | Operation::CreatePermission
            | Operation::UpdatePermission
            | Operation::DeletePermission
            | Operation::ListAuthRecords
            | Operation::ShowAuthRecord
            | Operation::CreateAuthRecord
            | Operation::UpdateAuthRecord
            | Operation::DeleteAuthRecord
            | Operation::Logout => None,
        }
    }
}

/// Set membership over direct and group permission codes. No identity means
/// no access.
pub fn is_authorized(identity: Option<&UserWithPermissions>, required: &str) -> bool {
    identity.is_some_and(|user| user.has_permission(required))
}

/// Gate `operation` for `identity`. Runs before any lookup so the outcome
/// never depends on whether the target exists.
pub fn authorize(
    identity: Option<&UserWithPermissions>,
    operation: Operation,
) -> Result<(), ServiceError> {
    let Some(user) = identity else {
        record_access_decision("authorization", false);
        return Err(ServiceError::TokenInvalid);
    };

    let Some(required) = operation.required_permission() else {
        return Ok(());
    };

    let allowed = is_authorized(Some(user), required);
    record_access_decision("authorization", allowed);

    if allowed {
        Ok(())
    } else {
        tracing::warn!(
            user_id = user.id(),
            operation = ?operation,
            required_permission = required,
            "Permission denied"
        );
        Err(ServiceError::PermissionDenied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Group, Permission, User};
    use chrono::Utc;

    fn permission(code: &str) -> Permission {
        Permission {
            id: 0,
            code_name: code.to_string(),
            name: code.to_string(),
        }
    }

    fn identity(direct: &[&str], via_group: &[&str]) -> UserWithPermissions {
        UserWithPermissions {
            user: User {
                id: 1,
                email: "u@example.com".to_string(),
                name: "U".to_string(),
                password_hash: String::new(),
                created_at: Utc::now(),
            },
            groups: vec![Group {
                id: 1,
                code_name: "G".to_string(),
                name: "G".to_string(),
                permissions: via_group.iter().map(|c| permission(c)).collect(),
            }],
            user_permissions: direct.iter().map(|c| permission(c)).collect(),
        }
    }

    #[test]
    fn direct_permission_grants() {
        assert!(is_authorized(Some(&identity(&["view-users"], &[])), "view-users"));
    }

    #[test]
    fn group_permission_grants() {
        assert!(is_authorized(Some(&identity(&[], &["view-users"])), "view-users"));
    }

    #[test]
    fn unrelated_permission_does_not_grant() {
        let user = identity(&["view-users"], &["detail-users"]);
        assert!(!is_authorized(Some(&user), "delete-users"));
    }

    #[test]
    fn no_wildcard_or_prefix_matching() {
        let user = identity(&["*", "view"], &["view-users-extra"]);
        assert!(!is_authorized(Some(&user), "view-users"));
    }

    #[test]
    fn missing_identity_is_denied() {
        assert!(!is_authorized(None, "view-users"));
        assert!(matches!(
            authorize(None, Operation::ListAuthRecords),
            Err(ServiceError::TokenInvalid)
        ));
    }

    #[test]
    fn user_administration_requires_matching_permission() {
        let viewer = identity(&[], &[VIEW_USERS, DETAIL_USERS]);

        assert!(authorize(Some(&viewer), Operation::ShowUser).is_ok());
        assert!(authorize(Some(&viewer), Operation::ListUsers).is_ok());
        assert!(matches!(
            authorize(Some(&viewer), Operation::DeleteUser),
            Err(ServiceError::PermissionDenied)
        ));
        assert!(matches!(
            authorize(Some(&viewer), Operation::CreateUser),
            Err(ServiceError::PermissionDenied)
        ));
    }

    #[test]
    fn authenticated_only_operations_need_no_permission() {
        let nobody = identity(&[], &[]);
        assert!(authorize(Some(&nobody), Operation::CreateGroup).is_ok());
        assert!(authorize(Some(&nobody), Operation::DeleteAuthRecord).is_ok());
        assert!(authorize(Some(&nobody), Operation::Logout).is_ok());
    }
}
