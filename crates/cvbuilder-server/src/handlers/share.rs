//! Share links. Issuing and emailing need the owner's access token;
//! `GET /api/share/:token` is public.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    Json,
};
use cvbuilder_core::IssuedShareLink;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::cvs::CvResponse;
use crate::error::{ApiResponse, ApiResult};
use crate::middleware::AuthUser;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateShareBody {
    pub expires_in_seconds: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct EmailShareBody {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct SentResponse {
    pub message: &'static str,
}

/// The body is optional; without one the link lives for the default seven days.
pub async fn create(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    path: Result<Path<Uuid>, PathRejection>,
    body: Option<Json<CreateShareBody>>,
) -> ApiResult<(StatusCode, Json<ApiResponse<IssuedShareLink>>)> {
    let Path(cv_id) = path?;
    let expires_in = body.and_then(|Json(b)| b.expires_in_seconds);
    let issued = state.shares.create_link(identity.user_id, cv_id, expires_in).await?;
    Ok((StatusCode::CREATED, ApiResponse::ok(issued)))
}

pub async fn resolve(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> ApiResult<Json<ApiResponse<CvResponse>>> {
    let cv = state.shares.resolve(&token).await?;
    Ok(ApiResponse::ok(CvResponse { cv }))
}

pub async fn email(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<EmailShareBody>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<SentResponse>>> {
    let Path(cv_id) = path?;
    let Json(body) = payload?;
    state
        .shares
        .send_by_email(identity.user_id, cv_id, &body.email)
        .await?;
    Ok(ApiResponse::ok(SentResponse {
        message: "CV sent successfully",
    }))
}
