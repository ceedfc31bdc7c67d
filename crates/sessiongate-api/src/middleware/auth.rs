//! Access Token Authentication Middleware
//!
//! Reads the access token from the `token` header (falling back to
//! `Authorization`), validates it through the authentication gate and makes
//! the resulting [`IdentityContext`] available to handlers via Axum's
//! Extension.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::handlers::{error_response, ApiError};
use crate::AppState;

/// Header checked before `Authorization`
pub const TOKEN_HEADER: &str = "token";

/// Raw token header value, `token` first, then `Authorization`
fn raw_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .or_else(|| {
            headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
        })
}

/// Authentication middleware for protected routes
///
/// # Errors
/// Returns 401 Unauthorized with code:
/// - `MISSING_TOKEN` when neither header carries a token
/// - `MALFORMED_TOKEN` when the token is not a valid access token
/// - `EXPIRED_TOKEN` when the token has expired
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx = state
        .service
        .authenticate(raw_token(request.headers()))
        .map_err(error_response)?;

    request.extensions_mut().insert(ctx);

    Ok(next.run(request).await)
}
