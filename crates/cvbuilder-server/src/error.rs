//! Mapping from domain errors to HTTP responses.
//!
//! This is the only place that turns an error kind into a status code. Internal
//! errors are logged in full and reported to the client with a generic
//! message. A development router adds `expose_internal_errors`, which puts the
//! real message back into the body; production routers never do.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Request,
    },
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use cvbuilder_core::AppError;
use serde::Serialize;
use thiserror::Error;

const GENERIC_INTERNAL_MESSAGE: &str = "An unexpected error occurred";

/// The unredacted internal error behind a 500, carried as a response
/// extension. Extensions never reach the wire.
#[derive(Debug, Clone)]
struct InternalErrorDetail(AppError);

#[derive(Error, Debug)]
#[error(transparent)]
pub struct ApiError(#[from] pub AppError);

impl ApiError {
    pub fn unauthorized(message: &str) -> Self {
        ApiError(AppError::authentication(message))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError(AppError::validation(rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError(AppError::validation(rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError(AppError::validation(rejection.body_text()))
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Standard response envelope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            status_code: None,
            data: Some(data),
            error: None,
        })
    }
}

/// Build the error envelope, hiding internal messages unless `expose_internal`.
pub fn error_envelope(err: &AppError, expose_internal: bool) -> ApiResponse<()> {
    let message = if err.is_internal() && !expose_internal {
        GENERIC_INTERNAL_MESSAGE.to_string()
    } else {
        err.to_string()
    };
    ApiResponse {
        success: false,
        status_code: Some(err.status()),
        data: None,
        error: Some(ErrorBody {
            code: err.code(),
            message,
            details: err.details().cloned(),
        }),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        if err.is_internal() {
            tracing::error!(error = %err, "Request failed with internal error");
        } else {
            tracing::debug!(code = err.code(), error = %err, "Request failed");
        }
        let status = StatusCode::from_u16(err.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = (status, Json(error_envelope(&err, false))).into_response();
        if err.is_internal() {
            response.extensions_mut().insert(InternalErrorDetail(err));
        }
        response
    }
}

/// Development-only layer: rewrite redacted 500 bodies with the real message.
pub async fn expose_internal_errors(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let Some(InternalErrorDetail(err)) = response.extensions_mut().remove::<InternalErrorDetail>() else {
        return response;
    };
    let (parts, _redacted) = response.into_parts();
    (parts, Json(error_envelope(&err, true))).into_response()
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_message_redacted() {
        let err = AppError::internal("connection string leaked");
        let hidden = serde_json::to_value(error_envelope(&err, false)).unwrap();
        assert_eq!(hidden["error"]["message"], GENERIC_INTERNAL_MESSAGE);
        assert_eq!(hidden["error"]["code"], "INTERNAL_ERROR");
        assert_eq!(hidden["statusCode"], 500);

        let shown = serde_json::to_value(error_envelope(&err, true)).unwrap();
        assert!(shown["error"]["message"].as_str().unwrap().contains("leaked"));
    }

    #[test]
    fn test_domain_errors_keep_message_and_details() {
        let err = AppError::validation_fields(vec![cvbuilder_core::FieldError {
            field: "email".into(),
            message: "Email is required".into(),
        }]);
        let body = serde_json::to_value(error_envelope(&err, false)).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["message"], "Email is required");
        assert_eq!(body["error"]["details"][0]["field"], "email");
        assert!(body.get("data").is_none());
    }

    #[tokio::test]
    async fn test_internal_detail_only_with_expose_layer() {
        use axum::{body::to_bytes, routing::get, Router};
        use tower::ServiceExt;

        async fn failing() -> ApiError {
            ApiError(AppError::internal("db password=hunter2"))
        }

        let redacted = Router::new().route("/", get(failing));
        let exposed = Router::new()
            .route("/", get(failing))
            .layer(axum::middleware::from_fn(expose_internal_errors));

        for (app, leaks) in [(redacted, false), (exposed, true)] {
            let response = app
                .oneshot(axum::http::Request::get("/").body(axum::body::Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let text = String::from_utf8(bytes.to_vec()).unwrap();
            assert_eq!(text.contains("hunter2"), leaks, "body: {text}");
        }
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AppError::authentication("x"), StatusCode::UNAUTHORIZED),
            (AppError::conflict("email", "x"), StatusCode::CONFLICT),
            (AppError::NotFound("User".into()), StatusCode::NOT_FOUND),
            (AppError::RateLimit("x".into()), StatusCode::TOO_MANY_REQUESTS),
            (AppError::Authorization("x".into()), StatusCode::FORBIDDEN),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError(err).into_response().status(), status);
        }
    }
}
