//! Request handlers, grouped by route prefix.

pub mod auth;
pub mod cvs;
pub mod payments;
pub mod pdf;
pub mod share;
pub mod templates;
pub mod users;

use axum::Json;
use chrono::Utc;
use cvbuilder_core::AppError;
use serde::Serialize;

use crate::error::{ApiError, ApiResponse};

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

pub async fn health() -> Json<ApiResponse<HealthStatus>> {
    ApiResponse::ok(HealthStatus {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now().to_rfc3339(),
    })
}

pub async fn not_found() -> ApiError {
    ApiError(AppError::NotFound("Route".into()))
}
