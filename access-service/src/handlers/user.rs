use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use service_core::error::AppError;

use crate::{
    dtos::users::{CreateUserRequest, UpdateUserRequest, UserEnvelope},
    middleware::CurrentUser,
    models::UserResponse,
    utils::{IdPath, ValidatedJson},
    AppState,
};

#[axum::debug_handler]
pub async fn list_users(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    let users: Vec<UserResponse> = state
        .admin_service
        .list_users(&caller.identity)
        .await?
        .into_iter()
        .map(UserResponse::from)
        .collect();
    Ok(Json(users))
}

#[axum::debug_handler]
pub async fn create_user(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    ValidatedJson(req): ValidatedJson<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state.admin_service.create_user(&caller.identity, req).await?;
    Ok((StatusCode::CREATED, Json(UserEnvelope { user: user.into() })))
}

#[axum::debug_handler]
pub async fn show_user(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    IdPath(id): IdPath,
) -> Result<impl IntoResponse, AppError> {
    let user = state.admin_service.show_user(&caller.identity, id).await?;
    Ok(Json(UserResponse::from(user)))
}

#[axum::debug_handler]
pub async fn update_user(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    IdPath(id): IdPath,
    ValidatedJson(req): ValidatedJson<UpdateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state
        .admin_service
        .update_user(&caller.identity, id, req)
        .await?;
    Ok(Json(UserResponse::from(user)))
}

#[axum::debug_handler]
pub async fn delete_user(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    IdPath(id): IdPath,
) -> Result<impl IntoResponse, AppError> {
    state.admin_service.delete_user(&caller.identity, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
