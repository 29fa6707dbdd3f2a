pub mod contracts;
pub mod health;
pub mod whatsapp;

use axum::{http::StatusCode, Json};
use duebell_core::DuebellError;
use serde_json::{json, Value};
use tracing::warn;

pub type ApiError = (StatusCode, Json<Value>);

/// Map a domain error to an HTTP status and `{"error", "code"}` body.
pub fn api_error(err: impl Into<DuebellError>) -> ApiError {
    let err = err.into();
    let status = match &err {
        DuebellError::InvalidContract(_) => StatusCode::UNPROCESSABLE_ENTITY,
        DuebellError::Channel { .. } => StatusCode::BAD_GATEWAY,
        DuebellError::Database(_) => StatusCode::SERVICE_UNAVAILABLE,
        DuebellError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    warn!(code = err.code(), error = %err, "request failed");
    (
        status,
        Json(json!({"error": err.to_string(), "code": err.code()})),
    )
}
