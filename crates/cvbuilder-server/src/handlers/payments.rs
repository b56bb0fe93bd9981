//! `/api/payments/*`. History and intents need a signed-in user; the
//! provider webhook is public.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    Json,
};
use cvbuilder_core::{Page, PageRequest, Payment, PaymentIntent, PaymentIntentRequest};
use serde_json::Value;

use super::MessageResponse;
use crate::error::{ApiResponse, ApiResult};
use crate::middleware::AuthUser;
use crate::state::AppState;

pub async fn history(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    query: Result<Query<PageRequest>, QueryRejection>,
) -> ApiResult<Json<ApiResponse<Page<Payment>>>> {
    let Query(page) = query?;
    Ok(ApiResponse::ok(state.payments.history(identity.user_id, page).await?))
}

pub async fn create_intent(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    payload: Result<Json<PaymentIntentRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ApiResponse<PaymentIntent>>)> {
    let Json(request) = payload?;
    let intent = state.payments.create_intent(identity.user_id, request).await?;
    Ok((StatusCode::CREATED, ApiResponse::ok(intent)))
}

pub async fn webhook(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<MessageResponse>>> {
    let Json(event) = payload?;
    state.payments.handle_webhook(&event).await?;
    Ok(ApiResponse::ok(MessageResponse {
        message: "Webhook processed",
    }))
}
