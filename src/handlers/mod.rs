//! HTTP transport: thin glue between axum and the catalog mutation core.

pub mod health;
pub mod jobs;
pub mod products;

use axum::{extract::Request, extract::State, middleware::Next, response::Response};

use crate::errors::ApiError;
use crate::AppState;

pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Require the configured admin token on mutation routes.
///
/// The job read path stays open: job ids are opaque and short-lived.
pub async fn require_admin_token(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let provided = req
        .headers()
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok());

    if provided != Some(state.config.admin_token.as_str()) {
        return Err(ApiError::Unauthorized);
    }
    Ok(next.run(req).await)
}
