//! Axum middleware that authenticates requests and exposes the caller.

use std::sync::Arc;

use axum::extract::{FromRequestParts, Request, State};
use axum::http::HeaderMap;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::debug;

use super::{CredentialVerifier, Principal};
use crate::error::{ApiError, AuthError};

/// Header that forces reads against the primary database.
pub const FORCE_PRIMARY_HEADER: &str = "x-force-primary";

/// Per-request caller context, derived by [`authenticate`].
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub principal: Principal,
    /// Read from the primary even when a replica is configured.
    pub force_primary: bool,
}

impl RequestContext {
    pub fn user_id(&self) -> &str {
        &self.principal.user_id
    }

    pub fn require_scope(&self, scope: &str) -> Result<(), ApiError> {
        self.principal.require_scope(scope).map_err(ApiError::from)
    }
}

impl<S: Send + Sync> FromRequestParts<S> for RequestContext {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .ok_or_else(|| ApiError::from(AuthError::MissingCredentials))
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then(|| token.to_string())
}

fn force_primary(headers: &HeaderMap) -> bool {
    headers
        .get(FORCE_PRIMARY_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == "true")
}

/// Resolve the bearer token; reject with 401 when absent or unknown.
pub async fn authenticate(
    State(verifier): State<Arc<dyn CredentialVerifier>>,
    mut req: Request,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(req.headers()) else {
        return ApiError::from(AuthError::MissingCredentials).into_response();
    };

    let principal = match verifier.verify(&token).await {
        Ok(principal) => principal,
        Err(e) => {
            debug!(error = %e, "Rejected credentials");
            return ApiError::from(e).into_response();
        }
    };

    let context = RequestContext {
        principal,
        force_primary: force_primary(req.headers()),
    };
    req.extensions_mut().insert(context);
    next.run(req).await
}
