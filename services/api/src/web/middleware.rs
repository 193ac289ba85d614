//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use storefront_core::domain::AuthUser;
use storefront_core::ports::PortError;
use tracing::debug;

use crate::error::ApiError;
use crate::web::state::AppState;

/// Name of the cookie that carries the auth session id.
pub const SESSION_COOKIE: &str = "session";

/// Reads the auth session id out of the `Cookie` header, if there is one.
pub fn session_id(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())?
        .split(';')
        .find_map(|c| {
            c.trim()
                .strip_prefix(SESSION_COOKIE)
                .and_then(|rest| rest.strip_prefix('='))
        })
        .filter(|id| !id.is_empty())
}

/// Middleware that validates the auth session cookie and resolves the caller.
///
/// If valid, inserts the [`AuthUser`] into request extensions for handlers to use.
/// If invalid or missing, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_session_id = session_id(req.headers()).ok_or(PortError::Unauthenticated)?;

    let user = state
        .users
        .validate_auth_session(auth_session_id)
        .await
        .map_err(|e| {
            debug!("Rejected auth session: {}", e);
            match e {
                PortError::Unexpected(_) => ApiError::Port(e),
                _ => ApiError::Port(PortError::Unauthenticated),
            }
        })?;

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// Middleware for admin-only routes. Must run after [`require_auth`].
pub async fn require_admin(req: Request, next: Next) -> Result<Response, ApiError> {
    let is_admin = req
        .extensions()
        .get::<AuthUser>()
        .ok_or(PortError::Unauthenticated)?
        .is_admin();
    if !is_admin {
        return Err(PortError::Unauthorized.into());
    }
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(cookie: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(cookie).unwrap());
        headers
    }

    #[test]
    fn finds_the_session_among_other_cookies() {
        assert_eq!(session_id(&headers("theme=dark; session=abc123")), Some("abc123"));
        assert_eq!(session_id(&headers("session=abc123")), Some("abc123"));
        assert_eq!(session_id(&headers("sessionx=abc; theme=dark")), None);
        assert_eq!(session_id(&headers("session=")), None);
        assert_eq!(session_id(&HeaderMap::new()), None);
    }
}
