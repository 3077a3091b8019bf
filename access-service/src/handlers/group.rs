use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use service_core::error::AppError;

use crate::{
    dtos::access::{GroupEnvelope, GroupRequest, GroupsEnvelope},
    middleware::CurrentUser,
    utils::{IdPath, ValidatedJson},
    AppState,
};

#[axum::debug_handler]
pub async fn list_groups(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    let groups = state.admin_service.list_groups(&caller.identity).await?;
    Ok(Json(GroupsEnvelope { groups }))
}

#[axum::debug_handler]
pub async fn create_group(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    ValidatedJson(req): ValidatedJson<GroupRequest>,
) -> Result<impl IntoResponse, AppError> {
    let group = state.admin_service.create_group(&caller.identity, req).await?;
    Ok((StatusCode::CREATED, Json(GroupEnvelope { group })))
}

#[axum::debug_handler]
pub async fn show_group(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    IdPath(id): IdPath,
) -> Result<impl IntoResponse, AppError> {
    let group = state.admin_service.show_group(&caller.identity, id).await?;
    Ok(Json(GroupEnvelope { group }))
}

#[axum::debug_handler]
pub async fn update_group(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    IdPath(id): IdPath,
    ValidatedJson(req): ValidatedJson<GroupRequest>,
) -> Result<impl IntoResponse, AppError> {
    let group = state
        .admin_service
        .update_group(&caller.identity, id, req)
        .await?;
    Ok(Json(GroupEnvelope { group }))
}

#[axum::debug_handler]
pub async fn delete_group(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    IdPath(id): IdPath,
) -> Result<impl IntoResponse, AppError> {
    state.admin_service.delete_group(&caller.identity, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
