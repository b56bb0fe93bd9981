use serde::Serialize;
use thiserror::Error;

use crate::token::TokenError;

/// Domain errors shared by the store, the services and the HTTP boundary.
///
/// Every kind has a stable machine-readable code and an HTTP status. The
/// `details` payload is typed and optional on every kind that can carry one.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AppError {
    #[error("{message}")]
    Validation {
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("{0}")]
    Authentication(String),

    #[error("{0}")]
    Authorization(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{message}")]
    Conflict {
        field: &'static str,
        message: String,
    },

    #[error("{0}")]
    RateLimit(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// A single field-level validation failure, used as `details` on
/// `AppError::Validation`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            details: None,
        }
    }

    pub fn validation_fields(errors: Vec<FieldError>) -> Self {
        let message = errors
            .first()
            .map(|e| e.message.clone())
            .unwrap_or_else(|| "Validation failed".to_string());
        AppError::Validation {
            message,
            details: serde_json::to_value(errors).ok(),
        }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        AppError::Authentication(message.into())
    }

    pub fn conflict(field: &'static str, message: impl Into<String>) -> Self {
        AppError::Conflict {
            field,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        AppError::Internal(message.into())
    }

    /// Stable error code reported to API consumers.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation { .. } => "VALIDATION_ERROR",
            AppError::Authentication(_) => "AUTHENTICATION_ERROR",
            AppError::Authorization(_) => "AUTHORIZATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict { .. } => "CONFLICT",
            AppError::RateLimit(_) => "RATE_LIMIT_EXCEEDED",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> u16 {
        match self {
            AppError::Validation { .. } => 400,
            AppError::Authentication(_) => 401,
            AppError::Authorization(_) => 403,
            AppError::NotFound(_) => 404,
            AppError::Conflict { .. } => 409,
            AppError::RateLimit(_) => 429,
            AppError::Internal(_) => 500,
        }
    }

    pub fn details(&self) -> Option<&serde_json::Value> {
        match self {
            AppError::Validation { details, .. } => details.as_ref(),
            _ => None,
        }
    }

    /// Unexpected failures, as opposed to operational errors a client caused.
    pub fn is_internal(&self) -> bool {
        matches!(self, AppError::Internal(_))
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Invalid => AppError::authentication(err.to_string()),
            TokenError::Signing(_) | TokenError::InvalidTtl(_) => AppError::internal(err.to_string()),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_statuses() {
        assert_eq!(AppError::validation("bad").status(), 400);
        assert_eq!(AppError::authentication("no").code(), "AUTHENTICATION_ERROR");
        assert_eq!(AppError::NotFound("User".into()).to_string(), "User not found");
        assert_eq!(AppError::conflict("email", "Email already registered").status(), 409);
        assert_eq!(AppError::RateLimit("slow down".into()).code(), "RATE_LIMIT_EXCEEDED");
        assert!(AppError::internal("boom").is_internal());
        assert!(!AppError::authentication("no").is_internal());
    }

    #[test]
    fn test_validation_fields_carry_details() {
        let err = AppError::validation_fields(vec![FieldError {
            field: "email".into(),
            message: "Please provide a valid email address".into(),
        }]);
        assert_eq!(err.to_string(), "Please provide a valid email address");
        let details = err.details().expect("details present");
        assert_eq!(details[0]["field"], "email");
    }
}
