use axum::{
    extract::{rejection::PathRejection, Path, State},
    http::StatusCode,
    Json,
};
use cvbuilder_core::PdfJob;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ApiResponse, ApiResult};
use crate::middleware::AuthUser;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratePdfBody {
    pub layout_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobCreated {
    pub job_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub job: PdfJob,
}

pub async fn generate(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    path: Result<Path<Uuid>, PathRejection>,
    body: Option<Json<GeneratePdfBody>>,
) -> ApiResult<(StatusCode, Json<ApiResponse<JobCreated>>)> {
    let Path(cv_id) = path?;
    let layout_id = body.and_then(|Json(b)| b.layout_id);
    let job = state.pdfs.generate(identity.user_id, cv_id, layout_id).await?;
    Ok((StatusCode::CREATED, ApiResponse::ok(JobCreated { job_id: job.id })))
}

pub async fn job_status(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<ApiResponse<JobResponse>>> {
    let Path(job_id) = path?;
    let job = state.pdfs.job_status(identity.user_id, job_id).await?;
    Ok(ApiResponse::ok(JobResponse { job }))
}
