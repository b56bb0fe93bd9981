//! `/api/auth/*` handlers.
//!
//! The refresh token is set as an HttpOnly `refreshToken` cookie and is never
//! part of a JSON response. Non-browser clients may send it back in a
//! `{"refreshToken": ...}` body instead of the cookie.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use cvbuilder_core::{AppError, LoginRequest, RegisterRequest, User};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::MessageResponse;
use crate::error::{ApiError, ApiResponse, ApiResult};
use crate::middleware::identify;
use crate::state::AppState;

pub const REFRESH_COOKIE: &str = "refreshToken";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user: User,
    pub access_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessTokenResponse {
    pub access_token: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenBody {
    pub refresh_token: Option<String>,
}

fn refresh_cookie(state: &AppState, token: String) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE, token))
        .http_only(true)
        .secure(state.config.secure_cookies())
        .same_site(SameSite::Strict)
        .path("/")
        .max_age(time::Duration::seconds(state.config.refresh_ttl.num_seconds()))
        .build()
}

fn clear_refresh_cookie(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(REFRESH_COOKIE).path("/"))
}

/// Cookie first, then the JSON body.
fn presented_refresh_token(jar: &CookieJar, body: Option<Json<RefreshTokenBody>>) -> Option<String> {
    jar.get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .or_else(|| body.and_then(|Json(b)| b.refresh_token))
        .filter(|t| !t.is_empty())
}

pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, CookieJar, Json<ApiResponse<AuthResponse>>)> {
    let Json(request) = payload?;
    let session = state.sessions.register(request).await?;
    let jar = jar.add(refresh_cookie(&state, session.refresh_token));
    Ok((
        StatusCode::CREATED,
        jar,
        ApiResponse::ok(AuthResponse {
            user: session.user,
            access_token: session.access_token,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<(CookieJar, Json<ApiResponse<AuthResponse>>)> {
    let Json(request) = payload?;
    let session = state.sessions.login(request).await?;
    let jar = jar.add(refresh_cookie(&state, session.refresh_token));
    Ok((
        jar,
        ApiResponse::ok(AuthResponse {
            user: session.user,
            access_token: session.access_token,
        }),
    ))
}

/// Rotate the refresh token. A rejected token leaves the jar untouched, so a
/// request that lost a rotation race does not wipe the cookie its sibling just set.
pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Option<Json<RefreshTokenBody>>,
) -> ApiResult<(CookieJar, Json<ApiResponse<AccessTokenResponse>>)> {
    let presented = presented_refresh_token(&jar, body)
        .ok_or_else(|| ApiError(AppError::authentication("Refresh token required")))?;
    let pair = state.sessions.refresh(&presented).await?;
    let jar = jar.add(refresh_cookie(&state, pair.refresh_token));
    Ok((
        jar,
        ApiResponse::ok(AccessTokenResponse {
            access_token: pair.access_token,
        }),
    ))
}

/// Always succeeds and clears the cookie. The presented refresh token is
/// revoked when its owner can be determined, from the access token or from
/// the refresh token itself.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    body: Option<Json<RefreshTokenBody>>,
) -> (CookieJar, Json<ApiResponse<MessageResponse>>) {
    let presented = presented_refresh_token(&jar, body);
    let user_id = identify(&state, &headers)
        .map(|identity| identity.user_id)
        .or_else(|| presented.as_deref().and_then(|t| state.sessions.refresh_token_owner(t)));

    if let Some(user_id) = user_id {
        if let Err(err) = state.sessions.logout(user_id, presented.as_deref()).await {
            warn!(user_id = %user_id, error = %err, "Refresh token revocation failed during logout");
        }
    }

    (
        clear_refresh_cookie(jar),
        ApiResponse::ok(MessageResponse {
            message: "Logged out successfully",
        }),
    )
}
