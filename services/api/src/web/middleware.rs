//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
    Extension,
};
use onboarding_core::domain::Role;
use onboarding_core::ports::PortError;
use std::sync::Arc;
use tracing::{error, warn};

use crate::web::state::{AppState, CurrentUser};

/// Reads the auth token from the `session` cookie.
pub fn session_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())?
        .split(';')
        .find_map(|c| c.trim().strip_prefix("session="))
        .filter(|token| !token.is_empty())
}

/// Middleware that validates the auth session cookie and loads the caller's profile.
///
/// If valid, inserts a `CurrentUser` into request extensions for handlers to use.
/// A token whose identity has no profile is treated the same as no token.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = session_token(req.headers())
        .ok_or(StatusCode::UNAUTHORIZED)?
        .to_string();

    let identity = state
        .auth
        .identity_for_token(&token)
        .await
        .map_err(|e| match e {
            PortError::Unauthorized => StatusCode::UNAUTHORIZED,
            e => {
                error!("Failed to validate auth session: {:?}", e);
                StatusCode::UNAUTHORIZED
            }
        })?;

    let profile = state
        .store
        .get_profile(identity.id)
        .await
        .map_err(|e| {
            warn!("No usable profile for identity {}: {:?}", identity.id, e);
            StatusCode::UNAUTHORIZED
        })?;

    req.extensions_mut().insert(CurrentUser { token, profile });
    Ok(next.run(req).await)
}

/// Runs after `require_auth`; rejects callers that are not students.
pub async fn require_student(
    Extension(user): Extension<CurrentUser>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    require_role(Role::Student, &user)?;
    Ok(next.run(req).await)
}

/// Runs after `require_auth`; rejects callers that are not admins.
pub async fn require_admin(
    Extension(user): Extension<CurrentUser>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    require_role(Role::Admin, &user)?;
    Ok(next.run(req).await)
}

fn require_role(role: Role, user: &CurrentUser) -> Result<(), StatusCode> {
    if user.profile.role == role {
        Ok(())
    } else {
        Err(StatusCode::FORBIDDEN)
    }
}
