use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use cvbuilder_core::{ProfileUpdate, User};
use serde::Serialize;

use crate::error::{ApiResponse, ApiResult};
use crate::middleware::AuthUser;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user: User,
}

pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> ApiResult<Json<ApiResponse<UserResponse>>> {
    let user = state.users.get_profile(identity.user_id).await?;
    Ok(ApiResponse::ok(UserResponse { user }))
}

pub async fn update_me(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    payload: Result<Json<ProfileUpdate>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<UserResponse>>> {
    let Json(update) = payload?;
    let user = state.users.update_profile(identity.user_id, update).await?;
    Ok(ApiResponse::ok(UserResponse { user }))
}
