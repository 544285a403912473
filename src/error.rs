use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use validator::ValidationErrors;

use crate::mail::MailError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid credentials")]
    Unauthorized,

    #[error("Account is not activated. Check your email for the activation link.")]
    InactiveAccount,

    #[error("Forbidden")]
    Forbidden,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Validation failed")]
    Fields(Vec<FieldError>),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Token is invalid or expired")]
    InvalidToken,

    #[error("Rate limited")]
    RateLimited,

    #[error("Email delivery failed: {0}")]
    Mail(#[from] MailError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// One entry in the itemized `fields` array of a validation error response.
#[derive(Debug, Clone, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        FieldError {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl AppError {
    /// Single-field validation failure.
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        AppError::Fields(vec![FieldError::new(field, message)])
    }
}

/// Flatten `validator` output into one entry per failed rule.
pub fn parse_validation_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    errors
        .field_errors()
        .iter()
        .flat_map(|(field, issues)| {
            issues.iter().map(move |issue| FieldError {
                field: field.to_string(),
                message: issue
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| issue.code.to_string()),
            })
        })
        .collect()
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        AppError::Fields(parse_validation_errors(&errors))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            AppError::InactiveAccount => (StatusCode::FORBIDDEN, self.to_string()),
            AppError::Forbidden => (StatusCode::FORBIDDEN, self.to_string()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            AppError::Fields(_) => (StatusCode::UNPROCESSABLE_ENTITY, "Validation failed".into()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::InvalidToken => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, self.to_string()),
            AppError::Mail(e) => {
                tracing::error!(error = %e, "Email delivery error");
                (StatusCode::BAD_GATEWAY, "Failed to send email".into())
            }
            AppError::Database(e) => {
                tracing::error!(error = %e, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".into(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!(error = %e, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".into(),
                )
            }
        };

        let mut body = json!({
            "error": {
                "message": message,
                "code": status.as_u16(),
            }
        });
        if let AppError::Fields(fields) = &self {
            body["error"]["fields"] = serde_json::to_value(fields).unwrap_or_default();
        }

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Probe {
        #[validate(length(min = 3, message = "Name too short"))]
        name: String,
        #[validate(email(message = "Invalid email format"))]
        email: String,
    }

    #[test]
    fn validation_errors_are_itemized_per_field() {
        let probe = Probe {
            name: "ab".into(),
            email: "not-an-email".into(),
        };
        let err: AppError = probe.validate().unwrap_err().into();

        let AppError::Fields(fields) = err else {
            panic!("expected Fields variant");
        };
        assert_eq!(fields.len(), 2);
        assert!(fields
            .iter()
            .any(|f| f.field == "name" && f.message == "Name too short"));
        assert!(fields
            .iter()
            .any(|f| f.field == "email" && f.message == "Invalid email format"));
    }

    #[test]
    fn field_helper_builds_single_entry() {
        let err = AppError::field("old_password", "Old password is incorrect.");
        let AppError::Fields(fields) = err else {
            panic!("expected Fields variant");
        };
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].field, "old_password");
    }
}
