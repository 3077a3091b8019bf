pub mod auth_record;
pub mod group;
pub mod permission;
pub mod user;

pub use auth_record::{AuthRecord, AuthRecordResponse};
pub use group::{Group, GroupChanges};
pub use permission::{Permission, PermissionChanges};
pub use user::{NewUser, User, UserChanges, UserResponse, UserWithPermissions};
