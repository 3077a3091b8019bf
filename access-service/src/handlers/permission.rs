use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use service_core::error::AppError;

use crate::{
    dtos::access::{PermissionEnvelope, PermissionRequest},
    middleware::CurrentUser,
    utils::{IdPath, ValidatedJson},
    AppState,
};

#[axum::debug_handler]
pub async fn list_permissions(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    let permissions = state.admin_service.list_permissions(&caller.identity).await?;
    Ok(Json(permissions))
}

#[axum::debug_handler]
pub async fn create_permission(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    ValidatedJson(req): ValidatedJson<PermissionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let permission = state
        .admin_service
        .create_permission(&caller.identity, req)
        .await?;
    Ok((StatusCode::CREATED, Json(PermissionEnvelope { permission })))
}

#[axum::debug_handler]
pub async fn show_permission(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    IdPath(id): IdPath,
) -> Result<impl IntoResponse, AppError> {
    let permission = state
        .admin_service
        .show_permission(&caller.identity, id)
        .await?;
    Ok(Json(permission))
}

#[axum::debug_handler]
pub async fn update_permission(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    IdPath(id): IdPath,
    ValidatedJson(req): ValidatedJson<PermissionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let permission = state
        .admin_service
        .update_permission(&caller.identity, id, req)
        .await?;
    Ok(Json(PermissionEnvelope { permission }))
}

#[axum::debug_handler]
pub async fn delete_permission(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    IdPath(id): IdPath,
) -> Result<impl IntoResponse, AppError> {
    state
        .admin_service
        .delete_permission(&caller.identity, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
