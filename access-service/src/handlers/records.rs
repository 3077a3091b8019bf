use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use service_core::error::AppError;

use crate::{
    dtos::records::{AuthRecordPatch, AuthRecordRequest, Pagination},
    middleware::CurrentUser,
    models::AuthRecordResponse,
    services::authz::{authorize, Operation},
    utils::{IdPath, ValidatedJson, ValidatedQuery},
    AppState,
};

#[axum::debug_handler]
pub async fn list_records(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    ValidatedQuery(page): ValidatedQuery<Pagination>,
) -> Result<impl IntoResponse, AppError> {
    authorize(Some(&caller.identity), Operation::ListAuthRecords)?;

    let records: Vec<AuthRecordResponse> = state
        .record_service
        .list(&caller.identity, page.skip(), page.take())
        .await?
        .into_iter()
        .map(AuthRecordResponse::from)
        .collect();
    Ok(Json(records))
}

#[axum::debug_handler]
pub async fn create_record(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    ValidatedJson(req): ValidatedJson<AuthRecordRequest>,
) -> Result<impl IntoResponse, AppError> {
    authorize(Some(&caller.identity), Operation::CreateAuthRecord)?;

    let record = state
        .record_service
        .create(&caller.identity, &req.text)
        .await?;
    Ok((StatusCode::CREATED, Json(AuthRecordResponse::from(record))))
}

#[axum::debug_handler]
pub async fn show_record(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    IdPath(id): IdPath,
) -> Result<impl IntoResponse, AppError> {
    authorize(Some(&caller.identity), Operation::ShowAuthRecord)?;

    let record = state.record_service.show(&caller.identity, id).await?;
    Ok(Json(AuthRecordResponse::from(record)))
}

#[axum::debug_handler]
pub async fn patch_record(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    IdPath(id): IdPath,
    ValidatedJson(req): ValidatedJson<AuthRecordPatch>,
) -> Result<impl IntoResponse, AppError> {
    authorize(Some(&caller.identity), Operation::UpdateAuthRecord)?;

    let record = state
        .record_service
        .patch(&caller.identity, id, req.text.as_deref())
        .await?;
    Ok(Json(AuthRecordResponse::from(record)))
}

#[axum::debug_handler]
pub async fn replace_record(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    IdPath(id): IdPath,
    ValidatedJson(req): ValidatedJson<AuthRecordRequest>,
) -> Result<impl IntoResponse, AppError> {
    authorize(Some(&caller.identity), Operation::UpdateAuthRecord)?;

    let record = state
        .record_service
        .replace(&caller.identity, id, &req.text)
        .await?;
    Ok(Json(AuthRecordResponse::from(record)))
}

#[axum::debug_handler]
pub async fn delete_record(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    IdPath(id): IdPath,
) -> Result<impl IntoResponse, AppError> {
    authorize(Some(&caller.identity), Operation::DeleteAuthRecord)?;

    state.record_service.delete(&caller.identity, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
