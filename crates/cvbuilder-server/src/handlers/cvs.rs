//! `/api/cvs/*` handlers. Every route sits behind the access-token gate.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use cvbuilder_core::{CreateCvRequest, Cv, CvData, CvSummary, CvUpdate, Page, PageRequest};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::MessageResponse;
use crate::error::{ApiResponse, ApiResult};
use crate::middleware::AuthUser;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CvResponse {
    pub cv: Cv,
}

#[derive(Debug, Default, Deserialize)]
pub struct AutosaveBody {
    #[serde(default)]
    pub data: CvData,
}

pub async fn list(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    query: Result<Query<PageRequest>, QueryRejection>,
) -> ApiResult<Json<ApiResponse<Page<CvSummary>>>> {
    let Query(page) = query?;
    let cvs = state.cvs.list(identity.user_id, page).await?;
    Ok(ApiResponse::ok(cvs))
}

pub async fn create(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    payload: Result<Json<CreateCvRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ApiResponse<CvResponse>>)> {
    let Json(request) = payload?;
    let cv = state.cvs.create(identity.user_id, request).await?;
    Ok((StatusCode::CREATED, ApiResponse::ok(CvResponse { cv })))
}

pub async fn get_one(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<ApiResponse<CvResponse>>> {
    let Path(cv_id) = path?;
    let cv = state.cvs.get(identity.user_id, cv_id).await?;
    Ok(ApiResponse::ok(CvResponse { cv }))
}

pub async fn update(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<CvUpdate>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<CvResponse>>> {
    let Path(cv_id) = path?;
    let Json(update) = payload?;
    let cv = state.cvs.update(identity.user_id, cv_id, update).await?;
    Ok(ApiResponse::ok(CvResponse { cv }))
}

pub async fn autosave(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<AutosaveBody>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<CvResponse>>> {
    let Path(cv_id) = path?;
    let Json(body) = payload?;
    let cv = state.cvs.autosave(identity.user_id, cv_id, body.data).await?;
    Ok(ApiResponse::ok(CvResponse { cv }))
}

pub async fn delete(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<ApiResponse<MessageResponse>>> {
    let Path(cv_id) = path?;
    state.cvs.delete(identity.user_id, cv_id).await?;
    Ok(ApiResponse::ok(MessageResponse {
        message: "CV deleted successfully",
    }))
}

pub async fn duplicate(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<(StatusCode, Json<ApiResponse<CvResponse>>)> {
    let Path(cv_id) = path?;
    let cv = state.cvs.duplicate(identity.user_id, cv_id).await?;
    Ok((StatusCode::CREATED, ApiResponse::ok(CvResponse { cv })))
}
