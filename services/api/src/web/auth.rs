//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for signup, login, logout, and the current user.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use festival_stories_core::{Registration, SessionUser};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;

use crate::web::state::{AppState, CurrentSession, SessionRegistry};
use crate::web::{identity_rejection, Rejection};

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub preferred_language: String,
    #[serde(default)]
    pub state: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

/// The signed-in user. Never includes the password hash.
#[derive(Serialize, ToSchema)]
pub struct UserResponse {
    pub name: String,
    pub email: String,
    pub preferred_language: String,
    pub state: String,
}

impl From<SessionUser> for UserResponse {
    fn from(user: SessionUser) -> Self {
        Self {
            name: user.name,
            email: user.email,
            preferred_language: user.preferred_language,
            state: user.state,
        }
    }
}

fn session_cookie(id: &str, max_age_secs: i64) -> String {
    format!(
        "session={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        id, max_age_secs
    )
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/signup - Create a new user account
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "User created successfully", body = MessageResponse),
        (status = 400, description = "Invalid email, weak password, or empty name"),
        (status = 409, description = "User with this email already exists"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, Rejection> {
    state
        .identity
        .register(Registration {
            name: req.name,
            email: req.email,
            password: req.password,
            preferred_language: req.preferred_language,
            state: req.state,
        })
        .await
        .map_err(identity_rejection)?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "Account created successfully! Please login.".to_string(),
        }),
    ))
}

/// POST /auth/login - Login with existing account
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = UserResponse),
        (status = 401, description = "User not found or incorrect password"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, Rejection> {
    let mut context = SessionRegistry::new_context();
    let user = state
        .identity
        .login(&mut context, &req.email, &req.password)
        .await
        .map_err(identity_rejection)?;

    let session_id = state.sessions.insert(context);
    info!(email = %user.email, "User logged in");
    let cookie = session_cookie(&session_id, state.sessions.ttl().num_seconds());

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(UserResponse::from(user)),
    ))
}

/// POST /auth/logout - Logout and discard the session and any draft
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
    Extension(session): Extension<CurrentSession>,
) -> impl IntoResponse {
    {
        let mut context = session.context.lock().await;
        state.identity.logout(&mut context);
    }
    state.sessions.remove(&session.id);

    (StatusCode::OK, [(header::SET_COOKIE, session_cookie("", 0))])
}

/// GET /auth/me - The signed-in user
#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "The current user", body = UserResponse),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn me_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<CurrentSession>,
) -> Result<Json<UserResponse>, Rejection> {
    let context = session.context.lock().await;
    state
        .identity
        .current_user(&context)
        .cloned()
        .map(|user| Json(UserResponse::from(user)))
        .ok_or((StatusCode::UNAUTHORIZED, "Not signed in".to_string()))
}
