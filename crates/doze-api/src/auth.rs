//! Static bearer-token gate for the non-public routes.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::Next;
use axum::response::Response;
use tracing::warn;

/// The configured token, shared with the middleware.
#[derive(Clone)]
pub struct AuthState {
    token: Arc<str>,
}

impl AuthState {
    pub fn new(token: String) -> Self {
        Self {
            token: token.into(),
        }
    }
}

/// Reject requests whose `Authorization: Bearer <token>` header does not
/// match the configured token.
pub async fn require_bearer(
    State(auth): State<AuthState>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token == auth.token.as_ref());

    match presented {
        Some(true) => Ok(next.run(request).await),
        Some(false) => {
            warn!(path = %request.uri().path(), "rejected request with wrong bearer token");
            Err(StatusCode::FORBIDDEN)
        }
        None => {
            warn!(path = %request.uri().path(), "rejected request without bearer token");
            Err(StatusCode::FORBIDDEN)
        }
    }
}
