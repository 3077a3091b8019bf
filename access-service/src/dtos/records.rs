use serde::Deserialize;
use validator::Validate;

pub const DEFAULT_TAKE: i64 = 50;
pub const MAX_TAKE: i64 = 1000;

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AuthRecordRequest {
    pub text: String,
}

/// PATCH body. Absent fields keep their stored value.
#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AuthRecordPatch {
    pub text: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct Pagination {
    #[validate(range(min = 0, message = "skip must not be negative"))]
    pub skip: Option<i64>,

    #[validate(range(min = 0, max = 1000, message = "take must be between 0 and 1000"))]
    pub take: Option<i64>,
}

impl Pagination {
    pub fn skip(&self) -> i64 {
        self.skip.unwrap_or(0)
    }

    pub fn take(&self) -> i64 {
        self.take.unwrap_or(DEFAULT_TAKE).min(MAX_TAKE)
    }
}
