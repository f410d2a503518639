//! Route handlers.
//!
//! Every tenant-scoped handler runs the guard first and acts only on
//! success. Path ids and JSON bodies are parsed by hand so that malformed
//! input is reported in the same error shape as everything else.

pub mod csrf;
pub mod invitations;
pub mod members;
pub mod system;

use axum::extract::rejection::JsonRejection;
use axum::Json;
use uuid::Uuid;

use crate::http::error::ApiError;

/// Parse a path segment as a UUID-backed id.
pub(crate) fn parse_id<T: From<Uuid>>(raw: &str, what: &str) -> Result<T, ApiError> {
    Uuid::parse_str(raw)
        .map(T::from)
        .map_err(|_| ApiError::BadRequest(format!("Invalid {}", what)))
}

/// Unwrap a JSON body or turn the rejection into a 400.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| ApiError::BadRequest(e.body_text()))
}
