//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;

use crate::web::state::{AppState, CurrentSession};

/// Reads the session id from the `session` cookie.
pub fn session_cookie(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())?
        .split(';')
        .find_map(|c| c.trim().strip_prefix("session="))
        .filter(|id| !id.is_empty())
}

/// Middleware that resolves the session cookie to a signed-in session.
///
/// If valid, inserts a `CurrentSession` into request extensions for handlers to use.
/// If invalid, expired, or missing, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let id = session_cookie(req.headers())
        .ok_or(StatusCode::UNAUTHORIZED)?
        .to_string();

    let context = state.sessions.get(&id).ok_or_else(|| {
        debug!(session = %id, "Unknown or expired session");
        StatusCode::UNAUTHORIZED
    })?;
    if !context.lock().await.is_authenticated() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    req.extensions_mut().insert(CurrentSession { id, context });
    Ok(next.run(req).await)
}
