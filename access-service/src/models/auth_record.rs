//! Owner-scoped "Auth" records.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// A record visible only to its owner. `owner_id` is fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct AuthRecord {
    pub id: i64,
    pub text: String,
    pub owner_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthRecordResponse {
    pub id: i64,
    pub text: String,
    pub owner_id: i64,
    pub created_at: DateTime<Utc>,
}

impl From<AuthRecord> for AuthRecordResponse {
    fn from(r: AuthRecord) -> Self {
        Self {
            id: r.id,
            text: r.text,
            owner_id: r.owner_id,
            created_at: r.created_at,
        }
    }
}
