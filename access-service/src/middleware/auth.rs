use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use service_core::error::AppError;

use crate::{
    services::{metrics::record_access_decision, AuthenticatedUser, ServiceError},
    AppState,
};

/// Pull the token out of `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &header::HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Require a valid bearer token and attach the resolved identity to the
/// request.
pub async fn authenticate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(token) = bearer_token(req.headers()) else {
        record_access_decision("authentication", false);
        return Err(ServiceError::TokenInvalid.into());
    };

    let user = state.identity.resolve(token).await?;

    // Store the identity in request extensions so handlers can access it
    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}

/// Extractor for the caller resolved by [`authenticate`].
pub struct CurrentUser(pub AuthenticatedUser);

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Absent only on a route mounted without `authenticate`; no identity
        // means no access.
        let user = parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or(ServiceError::TokenInvalid)?;

        Ok(CurrentUser(user))
    }
}
