use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use smsr_crypto::utils::constant_time_compare;
use std::sync::Arc;
use tracing::warn;

use crate::api::AppState;

pub const AUTH_HEADER: &str = "x-auth-key";

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("missing auth key")]
    MissingKey,
    #[error("invalid auth key")]
    InvalidKey,
}

/// Single shared secret checked against the `X-Auth-Key` header.
#[derive(Clone)]
pub struct SharedKeyAuth {
    key: Arc<str>,
}

impl std::fmt::Debug for SharedKeyAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedKeyAuth").finish_non_exhaustive()
    }
}

impl SharedKeyAuth {
    pub fn new(key: impl Into<Arc<str>>) -> Self {
        Self { key: key.into() }
    }

    pub fn validate(&self, presented: Option<&HeaderValue>) -> Result<(), AuthError> {
        let presented = presented.ok_or(AuthError::MissingKey)?;
        if !self.key.is_empty() && constant_time_compare(presented.as_bytes(), self.key.as_bytes())
        {
            Ok(())
        } else {
            Err(AuthError::InvalidKey)
        }
    }

    pub fn validate_headers(&self, headers: &HeaderMap) -> Result<(), AuthError> {
        self.validate(headers.get(AUTH_HEADER))
    }
}

pub fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": "Invalid auth key" })),
    )
        .into_response()
}

/// Rejects the request before its body is read when the key does not match.
pub async fn require_auth_key(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if let Err(e) = state.auth.validate_headers(req.headers()) {
        state.metrics.auth_failures.inc();
        warn!("rejected {} {}: {}", req.method(), req.uri().path(), e);
        return unauthorized();
    }

    next.run(req).await
}
