//! Stateless CSRF tokens.
//!
//! A token is `nonce.issued_at.signature`: 16 random bytes in hex, unix
//! seconds, and hex HMAC-SHA256 over `nonce.issued_at`. Nothing is stored;
//! verification recomputes the signature with the process secret, so a
//! restart with a generated secret invalidates every outstanding token.
//!
//! Only mutating verbs (POST, PUT, PATCH, DELETE) are checked.

use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderName, Method, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use rand::Rng;
use ring::hmac;
use thiserror::Error;

use crate::backend::unix_now;
use crate::config::CsrfConfig;
use crate::http::error::ApiError;
use crate::http::server::AppState;
use crate::observability::metrics;

/// Header carrying the token on mutating requests.
pub const CSRF_HEADER: HeaderName = HeaderName::from_static("x-csrf-token");

const NONCE_LEN: usize = 16;
const GENERATED_SECRET_LEN: usize = 32;
/// Tolerated clock skew for tokens stamped in the future.
const MAX_FUTURE_SKEW_SECS: u64 = 60;

/// Reasons a token fails verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CsrfError {
    #[error("CSRF token missing")]
    Missing,
    #[error("CSRF token malformed")]
    Malformed,
    #[error("CSRF token signature invalid")]
    BadSignature,
    #[error("CSRF token expired")]
    Expired,
    #[error("CSRF token issued in the future")]
    FromFuture,
}

impl CsrfError {
    fn reason(self) -> &'static str {
        match self {
            CsrfError::Missing => "missing",
            CsrfError::Malformed => "malformed",
            CsrfError::BadSignature => "bad_signature",
            CsrfError::Expired => "expired",
            CsrfError::FromFuture => "from_future",
        }
    }
}

impl From<CsrfError> for ApiError {
    fn from(e: CsrfError) -> Self {
        ApiError::CsrfInvalid(e.to_string())
    }
}

/// Issues and verifies signed CSRF tokens.
pub struct CsrfSigner {
    key: hmac::Key,
    max_age: Duration,
}

impl CsrfSigner {
    pub fn new(secret: &[u8], max_age: Duration) -> Self {
        Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, secret),
            max_age,
        }
    }

    /// Use the configured secret, or a random one scoped to this process.
    pub fn from_config(config: &CsrfConfig) -> Self {
        let max_age = Duration::from_secs(config.max_age_secs);
        if config.secret.is_empty() {
            let mut secret = [0u8; GENERATED_SECRET_LEN];
            rand::thread_rng().fill(&mut secret);
            tracing::info!("No CSRF secret configured, generated a per-process secret");
            Self::new(&secret, max_age)
        } else {
            Self::new(config.secret.as_bytes(), max_age)
        }
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    pub fn issue(&self) -> String {
        self.issue_at(unix_now())
    }

    pub fn issue_at(&self, now: u64) -> String {
        let nonce: [u8; NONCE_LEN] = rand::thread_rng().gen();
        let payload = format!("{}.{}", hex::encode(nonce), now);
        let tag = hmac::sign(&self.key, payload.as_bytes());
        format!("{}.{}", payload, hex::encode(tag.as_ref()))
    }

    pub fn verify(&self, token: &str) -> Result<(), CsrfError> {
        self.verify_at(token, unix_now())
    }

    pub fn verify_at(&self, token: &str, now: u64) -> Result<(), CsrfError> {
        let (payload, signature) = token.rsplit_once('.').ok_or(CsrfError::Malformed)?;
        let (nonce, issued_at) = payload.split_once('.').ok_or(CsrfError::Malformed)?;

        if nonce.len() != NONCE_LEN * 2 || hex::decode(nonce).is_err() {
            return Err(CsrfError::Malformed);
        }
        let issued_at: u64 = issued_at.parse().map_err(|_| CsrfError::Malformed)?;
        let signature = hex::decode(signature).map_err(|_| CsrfError::Malformed)?;

        hmac::verify(&self.key, payload.as_bytes(), &signature)
            .map_err(|_| CsrfError::BadSignature)?;

        if issued_at > now.saturating_add(MAX_FUTURE_SKEW_SECS) {
            return Err(CsrfError::FromFuture);
        }
        if now.saturating_sub(issued_at) > self.max_age.as_secs() {
            return Err(CsrfError::Expired);
        }
        Ok(())
    }
}

/// Whether `method` changes state and therefore needs a token.
pub fn requires_token(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

/// Whether `path` lies under one of `prefixes`, matching whole segments:
/// `/api/webhooks` covers `/api/webhooks/stripe` but not `/api/webhooksX`.
pub fn is_exempt(path: &str, prefixes: &[String]) -> bool {
    prefixes.iter().any(|prefix| {
        let prefix = prefix.trim_end_matches('/');
        path.strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    })
}

/// Check a request's headers against the signer.
pub fn check_request(signer: &CsrfSigner, request: &Request<Body>) -> Result<(), CsrfError> {
    let token = request
        .headers()
        .get(&CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(CsrfError::Missing)?;
    signer.verify(token)
}

/// Middleware rejecting mutating requests without a valid token.
pub async fn csrf_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let config = state.config.load_full();
    let path = request.uri().path();
    let exempt = is_exempt(path, &config.csrf.exempt_prefixes);

    if !config.csrf.enabled || exempt || !requires_token(request.method()) {
        return next.run(request).await;
    }

    match check_request(&state.csrf, &request) {
        Ok(()) => next.run(request).await,
        Err(e) => {
            tracing::warn!(
                method = %request.method(),
                path = %path,
                reason = e.reason(),
                "CSRF check failed"
            );
            metrics::record_csrf_rejection(e.reason());
            ApiError::from(e).into_response()
        }
    }
}
