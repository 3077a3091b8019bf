//! Business logic: credential checks, token handling, identity resolution,
//! authorization, ownership filtering and persistence.

pub mod admin;
pub mod auth;
pub mod authz;
pub mod bootstrap;
mod database;
mod denylist;
pub mod error;
pub mod identity;
mod jwt;
mod memory;
pub mod metrics;
pub mod ownership;
pub mod records;
mod store;

pub use admin::AdminService;
pub use auth::AuthService;
pub use database::PgStore;
pub use denylist::{MemoryDenylist, RedisDenylist, TokenDenylist};
pub use error::ServiceError;
pub use identity::{AuthenticatedUser, IdentityResolver};
pub use jwt::{IssuedToken, JwtService, TokenClaims};
pub use memory::MemoryStore;
pub use records::RecordService;
pub use store::{AuthRecordStore, IdentityStore, Store};
