use service_core::error::AppError;
use thiserror::Error;

use crate::services::metrics::ERRORS_TOTAL;

/// Failures of the invoicing domain operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    InvalidInput(#[from] validator::ValidationErrors),

    #[error("invalid date format, expected YYYY-MM-DD")]
    InvalidDateFormat,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("invoice item with ID {0} not found")]
    ItemNotFound(i64),

    #[error("{0}")]
    Conflict(String),

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("{0}")]
    Unauthorized(String),

    #[error("persistence failure: {0}")]
    Persistence(anyhow::Error),

    #[error("render failure: {0}")]
    Render(anyhow::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn persistence(context: &str, err: impl std::fmt::Display) -> Self {
        ServiceError::Persistence(anyhow::anyhow!("Failed to {}: {}", context, err))
    }

    fn error_type(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) | ServiceError::InvalidInput(_) => "validation",
            ServiceError::InvalidDateFormat => "invalid_date_format",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::ItemNotFound(_) => "item_not_found",
            ServiceError::Conflict(_) => "conflict",
            ServiceError::InvalidCredentials | ServiceError::Unauthorized(_) => "unauthorized",
            ServiceError::Persistence(_) => "persistence",
            ServiceError::Render(_) => "render",
            ServiceError::Internal(_) => "internal",
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        ERRORS_TOTAL.with_label_values(&[err.error_type()]).inc();

        match err {
            ServiceError::Validation(msg) => {
                let mut errors = validator::ValidationErrors::new();
                let mut error = validator::ValidationError::new("invalid");
                error.message = Some(msg.into());
                errors.add("request", error);
                AppError::ValidationError(errors)
            }
            ServiceError::InvalidInput(errors) => AppError::ValidationError(errors),
            e @ ServiceError::InvalidDateFormat => AppError::BadRequest(anyhow::anyhow!("{}", e)),
            e @ ServiceError::ItemNotFound(_) => AppError::BadRequest(anyhow::anyhow!("{}", e)),
            e @ ServiceError::NotFound(_) => AppError::NotFound(anyhow::anyhow!("{}", e)),
            ServiceError::Conflict(msg) => AppError::Conflict(anyhow::anyhow!(msg)),
            e @ ServiceError::InvalidCredentials => {
                AppError::Unauthorized(anyhow::anyhow!("{}", e))
            }
            ServiceError::Unauthorized(msg) => AppError::Unauthorized(anyhow::anyhow!(msg)),
            ServiceError::Persistence(e) => AppError::DatabaseError(e),
            ServiceError::Render(e) => AppError::RenderError(e),
            ServiceError::Internal(e) => AppError::InternalError(e),
        }
    }
}
