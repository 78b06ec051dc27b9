pub mod auth;
pub mod middleware;
pub mod rest;
pub mod state;
pub mod stories;
pub mod upload;

pub use middleware::require_auth;

use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use festival_stories_core::{IdentityError, PortError, WizardError};
use state::AppState;
use std::sync::Arc;
use tracing::error;

/// The error half of every handler result.
pub type Rejection = (StatusCode, String);

pub fn port_rejection(e: PortError) -> Rejection {
    let status = match &e {
        PortError::NotFound(_) => StatusCode::NOT_FOUND,
        PortError::Invalid(_) => StatusCode::BAD_REQUEST,
        PortError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
        PortError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        PortError::StorageInit(_) | PortError::Storage(_) | PortError::Unexpected(_) => {
            error!("Request failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, e.to_string())
}

pub fn identity_rejection(e: IdentityError) -> Rejection {
    let status = match &e {
        IdentityError::DuplicateUser => StatusCode::CONFLICT,
        IdentityError::InvalidEmail | IdentityError::WeakPassword | IdentityError::EmptyName => {
            StatusCode::BAD_REQUEST
        }
        IdentityError::UserNotFound | IdentityError::IncorrectPassword => StatusCode::UNAUTHORIZED,
        IdentityError::Port(_) => {
            error!("Identity request failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, e.to_string())
}

pub fn wizard_rejection(e: WizardError) -> Rejection {
    let status = match &e {
        WizardError::WrongStep { .. } => StatusCode::CONFLICT,
        WizardError::Storage(_) => {
            error!("Upload commit failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
        _ => StatusCode::BAD_REQUEST,
    };
    (status, e.to_string())
}

/// Builds every route with its middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let max_upload = state.config.max_upload_bytes;

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(rest::health_handler))
        .route("/auth/signup", post(auth::signup_handler))
        .route("/auth/login", post(auth::login_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/auth/logout", post(auth::logout_handler))
        .route("/auth/me", get(auth::me_handler))
        .route(
            "/upload",
            get(upload::wizard_handler).delete(upload::abandon_handler),
        )
        .route("/upload/setup", post(upload::setup_handler))
        .route("/upload/method", post(upload::method_handler))
        .route("/upload/sections", post(upload::sections_handler))
        .route("/upload/images", post(upload::images_handler))
        .route("/upload/back", post(upload::back_handler))
        .route("/upload/commit", post(upload::commit_handler))
        .route("/upload/organize", post(upload::organize_handler))
        .route("/upload/transcribe", post(upload::transcribe_handler))
        .route("/enhancement/status", get(upload::enhancement_status_handler))
        .route("/stories", get(stories::list_stories_handler))
        .route("/me/stories", get(stories::my_stories_handler))
        .route(
            "/stories/{id}",
            get(stories::get_story_handler)
                .patch(stories::update_story_handler)
                .delete(stories::delete_story_handler),
        )
        .route("/stories/{id}/pages/{page}", get(stories::book_page_handler))
        .route("/stats", get(stories::stats_handler))
        .route("/sample-data", post(stories::sample_data_handler))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(max_upload))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refused_story_changes_are_bad_requests() {
        let (status, message) = port_rejection(PortError::Invalid(
            "Section 1 needs a title and either content or audio".into(),
        ));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(message.contains("Section 1"));
        assert_eq!(
            port_rejection(PortError::NotFound("story".into())).0,
            StatusCode::NOT_FOUND
        );
    }
}
