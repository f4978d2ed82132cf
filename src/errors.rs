use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::{error::DbErr, TransactionError};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Error body returned by every failing endpoint.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetails {
    /// Machine-readable error code
    #[schema(example = "insufficient_stock")]
    pub code: String,
    /// Human-readable error description
    #[schema(example = "Insufficient stock for material 7: requested 12, available 11")]
    pub message: String,
    /// HTTP status code
    #[schema(example = 422)]
    pub status: u16,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Storage error: {0}")]
    StorageError(#[from] DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Insufficient stock for material {material_id}: requested {requested}, available {available}")]
    InsufficientStock {
        material_id: i64,
        requested: i32,
        available: i32,
    },

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Concurrent modification: {0}")]
    ConcurrencyConflict(String),

    #[error("Notification failure: {0}")]
    NotificationFailure(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl From<TransactionError<ServiceError>> for ServiceError {
    fn from(err: TransactionError<ServiceError>) -> Self {
        match err {
            TransactionError::Connection(db_err) => ServiceError::StorageError(db_err),
            TransactionError::Transaction(service_err) => service_err,
        }
    }
}

impl ServiceError {
    pub fn db_error(err: DbErr) -> Self {
        ServiceError::StorageError(err)
    }

    pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        ServiceError::NotFound(format!("{} {} not found", entity, id))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::InsufficientStock { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::InvalidTransition(_) | ServiceError::ConcurrencyConflict(_) => {
                StatusCode::CONFLICT
            }
            ServiceError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotificationFailure(_) => StatusCode::BAD_GATEWAY,
            ServiceError::StorageError(_)
            | ServiceError::SerializationError(_)
            | ServiceError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ServiceError::NotFound(_) => "not_found",
            ServiceError::InsufficientStock { .. } => "insufficient_stock",
            // a lost race is reported to callers like any other stale transition
            ServiceError::InvalidTransition(_) | ServiceError::ConcurrencyConflict(_) => {
                "invalid_transition"
            }
            ServiceError::ValidationError(_) => "validation_error",
            ServiceError::NotificationFailure(_) => "notification_failure",
            ServiceError::StorageError(_) => "storage_error",
            ServiceError::SerializationError(_) | ServiceError::InternalError(_) => {
                "internal_error"
            }
        }
    }

    /// Message safe to hand to API clients; storage details stay in the logs.
    pub fn response_message(&self) -> String {
        match self {
            ServiceError::StorageError(_) => "A storage error occurred".to_string(),
            ServiceError::SerializationError(_) | ServiceError::InternalError(_) => {
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }

        let body = ErrorResponse {
            error: ErrorDetails {
                code: self.error_code().to_string(),
                message: self.response_message(),
                status: status.as_u16(),
            },
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_stock_maps_to_unprocessable_entity() {
        let err = ServiceError::InsufficientStock {
            material_id: 3,
            requested: 12,
            available: 11,
        };
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.error_code(), "insufficient_stock");
        assert!(err.response_message().contains("available 11"));
    }

    #[test]
    fn concurrency_conflict_is_reported_as_invalid_transition() {
        let err = ServiceError::ConcurrencyConflict("lot 4 changed".into());
        assert_eq!(err.error_code(), "invalid_transition");
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn storage_errors_hide_details() {
        let err = ServiceError::StorageError(DbErr::Custom("disk full".into()));
        assert_eq!(err.response_message(), "A storage error occurred");
    }

    #[test]
    fn transaction_errors_unwrap_to_service_errors() {
        let err: ServiceError =
            TransactionError::Transaction(ServiceError::NotFound("task 9".into())).into();
        assert!(matches!(err, ServiceError::NotFound(_)));

        let err: ServiceError =
            TransactionError::<ServiceError>::Connection(DbErr::Custom("gone".into())).into();
        assert!(matches!(err, ServiceError::StorageError(_)));
    }
}
