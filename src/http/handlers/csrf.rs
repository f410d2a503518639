//! CSRF token issuance.

use axum::{
    extract::State,
    http::HeaderValue,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::http::error::ApiError;
use crate::http::server::AppState;
use crate::security::CSRF_HEADER;

#[derive(Debug, Serialize)]
pub struct CsrfTokenResponse {
    pub token: String,
    /// Seconds until the token stops verifying.
    pub expires_in: u64,
}

/// Issue a fresh token. Clients echo it in `X-CSRF-Token` on every
/// mutating request.
pub async fn issue_token(State(state): State<AppState>) -> Result<Response, ApiError> {
    let token = state.csrf.issue();
    let header = HeaderValue::from_str(&token)
        .map_err(|e| ApiError::Internal(format!("unencodable CSRF token: {}", e)))?;

    let mut response = Json(CsrfTokenResponse {
        token,
        expires_in: state.csrf.max_age().as_secs(),
    })
    .into_response();
    response.headers_mut().insert(CSRF_HEADER, header);
    Ok(response)
}
