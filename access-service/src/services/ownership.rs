//! Per-record ownership check for owner-scoped resources.

use super::metrics::record_access_decision;
use super::ServiceError;
use crate::models::{AuthRecord, UserWithPermissions};

pub fn can_access(identity: &UserWithPermissions, record: &AuthRecord) -> bool {
    record.owner_id == identity.id()
}

/// Keep `record` only if `identity` owns it. Someone else's record comes back
/// as `NotFound`, same as a record that doesn't exist.
pub fn owned_or_not_found(
    identity: &UserWithPermissions,
    record: Option<AuthRecord>,
) -> Result<AuthRecord, ServiceError> {
    match record {
        Some(record) if can_access(identity, &record) => {
            record_access_decision("ownership", true);
            Ok(record)
        }
        Some(record) => {
            record_access_decision("ownership", false);
            tracing::warn!(
                user_id = identity.id(),
                record_id = record.id,
                "Access to record owned by another user denied"
            );
            Err(ServiceError::NotFound("Auth"))
        }
        None => Err(ServiceError::NotFound("Auth")),
    }
}
