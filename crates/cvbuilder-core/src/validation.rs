//! Request validation for the account endpoints.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult, FieldError};

pub const USERNAME_MIN_LENGTH: usize = 3;
pub const USERNAME_MAX_LENGTH: usize = 30;
pub const PASSWORD_MIN_LENGTH: usize = 8;
pub const PASSWORD_MAX_LENGTH: usize = 128;
pub const EMAIL_MAX_LENGTH: usize = 255;

// Both patterns are constants; a failure here is a programming error.
static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$")
        .expect("EMAIL_REGEX is a valid regex pattern")
});

static PHONE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+]?[(]?[0-9]{1,4}[)]?[-\s.]?[(]?[0-9]{1,4}[)]?[-\s.]?[0-9]{1,9}$")
        .expect("PHONE_REGEX is a valid regex pattern")
});

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(default)]
    pub identifier: String,
    #[serde(default)]
    pub password: String,
}

/// Lowercase and trim an email so lookups and uniqueness are case-insensitive.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn is_valid_email(email: &str) -> bool {
    email.len() <= EMAIL_MAX_LENGTH && EMAIL_REGEX.is_match(email)
}

/// Trimmed phone number, or `None` when blank.
pub fn normalize_phone(phone: &str) -> Option<String> {
    let phone = phone.trim();
    (!phone.is_empty()).then(|| phone.to_string())
}

/// Empty phone numbers are treated as "not provided".
pub fn is_valid_phone(phone: &str) -> bool {
    phone.is_empty() || PHONE_REGEX.is_match(phone)
}

pub fn password_problem(password: &str) -> Option<String> {
    let len = password.chars().count();
    if len < PASSWORD_MIN_LENGTH {
        return Some(format!(
            "Password must be at least {} characters",
            PASSWORD_MIN_LENGTH
        ));
    }
    if len > PASSWORD_MAX_LENGTH {
        return Some(format!(
            "Password must be at most {} characters",
            PASSWORD_MAX_LENGTH
        ));
    }
    let has_upper = password.chars().any(|c| c.is_uppercase());
    let has_lower = password.chars().any(|c| c.is_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password
        .chars()
        .any(|c| !c.is_alphanumeric() && !c.is_whitespace());
    if has_upper && has_lower && has_digit && has_special {
        None
    } else {
        Some(
            "Password must contain at least one uppercase letter, one lowercase letter, \
             one number, and one special character"
                .to_string(),
        )
    }
}

fn push(errors: &mut Vec<FieldError>, field: &str, message: impl Into<String>) {
    errors.push(FieldError {
        field: field.to_string(),
        message: message.into(),
    });
}

impl RegisterRequest {
    /// Check every field and report all failures at once.
    pub fn validate(&self) -> AppResult<()> {
        let mut errors = Vec::new();

        let username = self.username.trim();
        if username.is_empty() {
            push(&mut errors, "username", "Username is required");
        } else if username.chars().count() < USERNAME_MIN_LENGTH {
            push(
                &mut errors,
                "username",
                format!("Username must be at least {} characters", USERNAME_MIN_LENGTH),
            );
        } else if username.chars().count() > USERNAME_MAX_LENGTH {
            push(
                &mut errors,
                "username",
                format!("Username must be at most {} characters", USERNAME_MAX_LENGTH),
            );
        }

        let email = self.email.trim();
        if email.is_empty() {
            push(&mut errors, "email", "Email is required");
        } else if !is_valid_email(email) {
            push(&mut errors, "email", "Please provide a valid email address");
        }

        if self.password.is_empty() {
            push(&mut errors, "password", "Password is required");
        } else if let Some(problem) = password_problem(&self.password) {
            push(&mut errors, "password", problem);
        }

        if let Some(ref phone) = self.phone {
            if !is_valid_phone(phone.trim()) {
                push(&mut errors, "phone", "Please provide a valid phone number");
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::validation_fields(errors))
        }
    }
}

impl LoginRequest {
    pub fn validate(&self) -> AppResult<()> {
        let mut errors = Vec::new();
        if self.identifier.trim().is_empty() {
            push(&mut errors, "identifier", "Email or username is required");
        }
        if self.password.is_empty() {
            push(&mut errors, "password", "Password is required");
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::validation_fields(errors))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(username: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.into(),
            email: email.into(),
            password: password.into(),
            phone: None,
        }
    }

    #[test]
    fn test_valid_registration() {
        assert!(register("alice", "alice@x.com", "Abcd1234!").validate().is_ok());
    }

    #[test]
    fn test_username_length_bounds() {
        assert!(register("al", "alice@x.com", "Abcd1234!").validate().is_err());
        assert!(register(&"a".repeat(31), "alice@x.com", "Abcd1234!")
            .validate()
            .is_err());
        assert!(register(&"a".repeat(30), "alice@x.com", "Abcd1234!")
            .validate()
            .is_ok());
    }

    #[test]
    fn test_email_format() {
        assert!(is_valid_email("alice@x.com"));
        assert!(is_valid_email("first.last+cv@example.co.uk"));
        assert!(!is_valid_email("alice"));
        assert!(!is_valid_email("alice@"));
        assert!(!is_valid_email("alice@localhost"));
        assert!(!is_valid_email("al ice@x.com"));
    }

    #[test]
    fn test_password_rules() {
        assert!(password_problem("Abcd1234!").is_none());
        assert!(password_problem("Ab1!").is_some()); // too short
        assert!(password_problem("abcd1234!").is_some()); // no uppercase
        assert!(password_problem("ABCD1234!").is_some()); // no lowercase
        assert!(password_problem("Abcdefgh!").is_some()); // no digit
        assert!(password_problem("Abcd12345").is_some()); // no special
    }

    #[test]
    fn test_phone_rules() {
        assert!(is_valid_phone(""));
        assert!(is_valid_phone("+1-555-1234567"));
        assert!(is_valid_phone("(555) 1234567"));
        assert!(is_valid_phone("0612345678"));
        assert!(!is_valid_phone("call me maybe"));
    }

    #[test]
    fn test_all_failures_reported() {
        let err = register("", "nope", "short").validate().unwrap_err();
        let details = err.details().expect("field details");
        assert_eq!(details.as_array().map(|a| a.len()), Some(3));
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_login_requires_both_fields() {
        let req = LoginRequest {
            identifier: "  ".into(),
            password: String::new(),
        };
        let err = req.validate().unwrap_err();
        assert_eq!(err.details().and_then(|d| d.as_array()).map(|a| a.len()), Some(2));
    }

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone("  +1-555-1234567 ").as_deref(), Some("+1-555-1234567"));
        assert_eq!(normalize_phone("   "), None);
        assert_eq!(normalize_phone(""), None);
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Alice@X.COM "), "alice@x.com");
    }
}
