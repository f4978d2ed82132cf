use crate::errors::ServiceError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// Standard success response
pub fn success_response<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(data)).into_response()
}

/// Standard created response
pub fn created_response<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(data)).into_response()
}

/// Validate request input
pub fn validate_input<T: Validate>(input: &T) -> Result<(), ServiceError> {
    input
        .validate()
        .map_err(|e| ServiceError::ValidationError(format!("Validation failed: {}", e)))
}

/// Body of every batch endpoint that acts on a list of record ids.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct IdsRequest {
    #[validate(length(min = 1, max = 500))]
    pub ids: Vec<i64>,
}

pub fn default_limit() -> u64 {
    100
}

/// Clamp client supplied limits to something the store can answer quickly.
pub fn clamp_limit(limit: u64) -> u64 {
    limit.clamp(1, 500)
}
