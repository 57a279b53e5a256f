use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::Method;
use axum::middleware::Next;
use axum::response::Response;

use crate::error::AppError;
use crate::state::AppState;

/// Authentication configuration for the admin surface.
#[derive(Clone)]
pub struct AuthConfig {
    /// Shared bearer token. None = every mutating request is rejected.
    pub admin_token: Option<String>,
}

/// Axum middleware gating mutating methods behind the admin bearer token.
/// Reads pass through untouched; preflight is handled by the CORS layer
/// before this runs.
pub async fn admin_gate(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    if matches!(
        *request.method(),
        Method::GET | Method::HEAD | Method::OPTIONS
    ) {
        return Ok(next.run(request).await);
    }

    let provided = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    if !token_matches(provided, state.auth.admin_token.as_deref()) {
        let message = if provided.is_none() {
            "Authentication required"
        } else {
            tracing::warn!("admin auth failed: invalid credentials provided");
            "Invalid authentication credentials"
        };
        return Err(AppError::Unauthorized(message.to_string()));
    }

    Ok(next.run(request).await)
}

fn token_matches(provided: Option<&str>, expected: Option<&str>) -> bool {
    matches!((provided, expected), (Some(p), Some(e)) if p == e)
}
