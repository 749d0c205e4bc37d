//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for user signup, login, and logout.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use onboarding_core::access::{validate_login, validate_signup};
use onboarding_core::domain::{AuthSession, Profile};
use onboarding_core::ports::PortError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::middleware::session_token;
use crate::web::state::AppState;
use crate::web::HandlerError;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    pub role: String,
    /// The dashboard the client should navigate to.
    pub redirect: String,
}

impl AuthResponse {
    fn new(state: &AppState, profile: &Profile) -> Self {
        Self {
            user_id: profile.id,
            email: profile.email.clone(),
            name: profile.name.clone(),
            role: profile.role.as_str().to_string(),
            redirect: state.guard.href(profile.role.dashboard_path()),
        }
    }
}

fn session_cookie(token: &str, expires_at: DateTime<Utc>) -> String {
    let max_age = (expires_at - Utc::now()).num_seconds().max(0);
    format!(
        "session={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        token, max_age
    )
}

const CLEARED_COOKIE: &str = "session=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0";

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/signup - Create a new account and its profile, then sign in.
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "User created successfully", body = AuthResponse),
        (status = 400, description = "Email outside the allowed domain or missing field"),
        (status = 409, description = "Email already registered"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    // 1. Validate before touching the backend
    let email = validate_signup(&state.policy, &req.name, &req.email, &req.password)
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    // 2. Create the identity
    let identity = state
        .auth
        .sign_up(&email, &req.password)
        .await
        .map_err(|e| match e {
            PortError::Conflict(_) => (
                StatusCode::CONFLICT,
                "An account with this email already exists.".to_string(),
            ),
            e => {
                error!("Failed to create user: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create user".to_string())
            }
        })?;

    // 3. Record the profile with its one and only role
    let role = state.policy.role_for(&email);
    let profile = state
        .store
        .create_profile(&identity, req.name.trim(), role)
        .await
        .map_err(|e| {
            error!("Failed to create profile for {}: {:?}", identity.id, e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create user".to_string())
        })?;

    // 4. Sign the new user in
    let session = sign_in(&state, &email, &req.password).await?;
    info!("Signed up {} as {}", profile.id, profile.role);

    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, session_cookie(&session.token, session.expires_at))],
        Json(AuthResponse::new(&state, &profile)),
    ))
}

/// POST /auth/login - Login with existing account
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 400, description = "Email outside the allowed domain or missing field"),
        (status = 401, description = "Invalid credentials"),
        (status = 404, description = "User data not found"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    // 1. Validate before touching the backend
    let email = validate_login(&state.policy, &req.email, &req.password)
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    // 2. Sign in
    let session = sign_in(&state, &email, &req.password).await?;

    // 3. Fetch the profile; an identity without one never gets a session
    let profile = match state.store.get_profile(session.identity.id).await {
        Ok(profile) => profile,
        Err(e) => {
            warn!("Signed-in identity {} has no profile: {:?}", session.identity.id, e);
            if let Err(e) = state.auth.sign_out(&session.token).await {
                error!("Failed to revoke profile-less session: {:?}", e);
            }
            return Err((StatusCode::NOT_FOUND, "User data not found.".to_string()));
        }
    };

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, session_cookie(&session.token, session.expires_at))],
        Json(AuthResponse::new(&state, &profile)),
    ))
}

/// POST /auth/logout - Logout and invalidate session
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "No active session")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, HandlerError> {
    let token = session_token(&headers)
        .ok_or((StatusCode::UNAUTHORIZED, "No session found".to_string()))?;

    state.auth.sign_out(token).await.map_err(|e| {
        error!("Failed to delete auth session: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to logout".to_string())
    })?;

    Ok((StatusCode::OK, [(header::SET_COOKIE, CLEARED_COOKIE.to_string())]))
}

async fn sign_in(state: &AppState, email: &str, password: &str) -> Result<AuthSession, HandlerError> {
    state.auth.sign_in(email, password).await.map_err(|e| match e {
        PortError::Unauthorized => (
            StatusCode::UNAUTHORIZED,
            "Invalid email or password".to_string(),
        ),
        e => {
            error!("Failed to sign in: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to sign in".to_string())
        }
    })
}
