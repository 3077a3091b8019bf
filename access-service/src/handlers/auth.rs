use axum::{extract::State, response::IntoResponse, Json};
use service_core::error::AppError;

use crate::{
    dtos::auth::{LoginRequest, LogoutResponse, RegisterRequest},
    middleware::CurrentUser,
    services::authz::{authorize, Operation},
    utils::ValidatedJson,
    AppState,
};

#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let response = state.auth_service.register(req).await?;
    Ok(Json(response))
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let response = state.auth_service.login(req).await?;
    Ok(Json(response))
}

#[axum::debug_handler]
pub async fn logout(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    authorize(Some(&user.identity), Operation::Logout)?;
    state.auth_service.logout(&user.claims).await?;

    Ok(Json(LogoutResponse {
        message: "Logged out".to_string(),
    }))
}
