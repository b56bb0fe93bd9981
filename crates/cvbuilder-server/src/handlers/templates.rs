//! `/api/templates/*` handlers. Public.

use axum::{
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use cvbuilder_core::{Page, PageRequest, Template};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{ApiResponse, ApiResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct TemplateResponse {
    pub template: Template,
}

pub async fn list(
    State(state): State<AppState>,
    query: Result<Query<PageRequest>, QueryRejection>,
) -> ApiResult<Json<ApiResponse<Page<Template>>>> {
    let Query(page) = query?;
    Ok(ApiResponse::ok(state.templates.list(page).await?))
}

pub async fn get_one(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<ApiResponse<TemplateResponse>>> {
    let Path(template_id) = path?;
    let template = state.templates.get(template_id).await?;
    Ok(ApiResponse::ok(TemplateResponse { template }))
}
