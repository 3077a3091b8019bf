pub mod auth;
pub mod refresh;

pub use auth::{authenticate, bearer_token, CurrentUser};
pub use refresh::refresh_token;
