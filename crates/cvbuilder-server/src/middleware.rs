//! Access-token gate for protected routes.
//!
//! The access token travels only in the `Authorization: Bearer <token>`
//! header; cookies are reserved for the refresh token. Every rejection
//! (missing header, wrong scheme, bad signature, expired, refresh token used
//! as access token) produces the same 401 body.

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use cvbuilder_core::Identity;

use crate::error::ApiError;
use crate::state::AppState;

const REJECTION: &str = "Invalid or expired token";

/// Identity of the caller, attached by `require_auth`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser(pub Identity);

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Resolve the caller from the bearer header, if a valid access token is
/// present.
pub fn identify(state: &AppState, headers: &HeaderMap) -> Option<Identity> {
    let token = bearer_token(headers)?;
    state.codec().verify_access(token).ok().map(|c| c.identity())
}

pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(identity) = identify(&state, request.headers()) else {
        tracing::debug!(path = %request.uri().path(), "Rejected unauthenticated request");
        return Err(ApiError::unauthorized(REJECTION));
    };
    request.extensions_mut().insert(AuthUser(identity));
    Ok(next.run(request).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized(REJECTION))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_extraction() {
        assert_eq!(bearer_token(&headers("Bearer abc.def.ghi")), Some("abc.def.ghi"));
        assert_eq!(bearer_token(&headers("Basic dXNlcjpwYXNz")), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}
