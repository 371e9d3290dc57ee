//! Bearer-token gate for the JSON variant.
//!
//! A single static secret is configured at process start and compared by
//! exact string equality against the token in `Authorization: Bearer <token>`.

use crate::errors::AppError;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

const BEARER_PREFIX: &str = "Bearer ";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Authorization header missing")]
    MissingCredential,
    #[error("Authorization header must use the Bearer scheme")]
    MalformedCredential,
    #[error("Invalid bearer token")]
    InvalidToken,
}

impl AuthError {
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingCredential | AuthError::InvalidToken => "UNAUTHENTICATED",
            AuthError::MalformedCredential => "MALFORMED_CREDENTIAL",
        }
    }
}

#[derive(Clone)]
pub struct BearerGate {
    token: Arc<str>,
}

impl BearerGate {
    pub fn new(token: impl Into<Arc<str>>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// Check a raw `Authorization` header value.
    pub fn verify(&self, header: Option<&str>) -> Result<(), AuthError> {
        let header = header.ok_or(AuthError::MissingCredential)?;
        let provided = header
            .strip_prefix(BEARER_PREFIX)
            .ok_or(AuthError::MalformedCredential)?;
        if provided != &*self.token {
            return Err(AuthError::InvalidToken);
        }
        Ok(())
    }
}

impl std::fmt::Debug for BearerGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerGate").finish_non_exhaustive()
    }
}

/// Middleware rejecting requests that do not carry the configured token.
pub async fn require_bearer(
    State(gate): State<BearerGate>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let verdict = match request.headers().get(header::AUTHORIZATION) {
        None => gate.verify(None),
        Some(value) => match value.to_str() {
            Ok(value) => gate.verify(Some(value)),
            Err(_) => Err(AuthError::MalformedCredential),
        },
    };

    if let Err(err) = verdict {
        warn!(
            method = %request.method(),
            path = %request.uri().path(),
            reason = %err,
            "rejected unauthenticated request"
        );
        return Err(err.into());
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> BearerGate {
        BearerGate::new("s3cret")
    }

    #[test]
    fn accepts_matching_token() {
        assert_eq!(gate().verify(Some("Bearer s3cret")), Ok(()));
    }

    #[test]
    fn missing_header_is_unauthenticated() {
        let err = gate().verify(None).unwrap_err();
        assert_eq!(err, AuthError::MissingCredential);
        assert_eq!(err.code(), "UNAUTHENTICATED");
    }

    #[test]
    fn wrong_scheme_is_malformed() {
        for header in ["Basic s3cret", "bearer s3cret", "Bearers3cret", "s3cret"] {
            let err = gate().verify(Some(header)).unwrap_err();
            assert_eq!(err, AuthError::MalformedCredential, "header {header:?}");
            assert_eq!(err.code(), "MALFORMED_CREDENTIAL");
        }
    }

    #[test]
    fn wrong_token_is_unauthenticated() {
        for header in ["Bearer wrongtoken", "Bearer ", "Bearer s3cret ", "Bearer S3CRET"] {
            let err = gate().verify(Some(header)).unwrap_err();
            assert_eq!(err, AuthError::InvalidToken, "header {header:?}");
            assert_eq!(err.code(), "UNAUTHENTICATED");
        }
    }

    #[test]
    fn debug_does_not_print_the_secret() {
        assert!(!format!("{:?}", gate()).contains("s3cret"));
    }
}
