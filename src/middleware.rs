//! Request gatekeeping
//!
//! Authentication itself is handled upstream. This service only checks an
//! optional shared secret and reads the caller identity the upstream provider
//! attaches to each request.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::error::AppError;
use crate::model::Actor;
use crate::state::AppState;

/// Header carrying the authenticated user's id
pub const USER_ID_HEADER: &str = "x-user-id";

/// Header carrying the user's role; `admin` grants catalog write access
pub const USER_ROLE_HEADER: &str = "x-user-role";

const ADMIN_ROLE: &str = "admin";

/// Middleware to check for Authorization header
///
/// When `Config::authorization` is set, the request must carry an
/// `Authorization` header with exactly that value. Otherwise the check is
/// skipped.
pub async fn auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(secret) = state.config.authorization.as_deref() {
        let presented = headers
            .get("Authorization")
            .and_then(|value| value.to_str().ok());

        if presented != Some(secret) {
            return Err(AppError::Unauthenticated);
        }
    }

    Ok(next.run(request).await)
}

impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or(AppError::Unauthenticated)?;

        let is_admin = parts
            .headers
            .get(USER_ROLE_HEADER)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|role| role.trim().eq_ignore_ascii_case(ADMIN_ROLE));

        Ok(Actor {
            user_id: user_id.to_string(),
            is_admin,
        })
    }
}
