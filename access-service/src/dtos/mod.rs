pub mod access;
pub mod auth;
pub mod records;
pub mod users;
