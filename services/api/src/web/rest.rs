//! services/api/src/web/rest.rs
//!
//! Contains the health endpoint and the master definition for the OpenAPI
//! specification.

use crate::web::{auth, stories, upload};
use axum::response::Json;
use serde::Serialize;
use utoipa::{OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        auth::signup_handler,
        auth::login_handler,
        auth::logout_handler,
        auth::me_handler,
        upload::wizard_handler,
        upload::abandon_handler,
        upload::setup_handler,
        upload::method_handler,
        upload::sections_handler,
        upload::images_handler,
        upload::back_handler,
        upload::commit_handler,
        upload::organize_handler,
        upload::transcribe_handler,
        upload::enhancement_status_handler,
        stories::list_stories_handler,
        stories::my_stories_handler,
        stories::get_story_handler,
        stories::update_story_handler,
        stories::delete_story_handler,
        stories::book_page_handler,
        stories::stats_handler,
        stories::sample_data_handler,
    ),
    components(
        schemas(
            HealthResponse,
            auth::SignupRequest,
            auth::LoginRequest,
            auth::MessageResponse,
            auth::UserResponse,
            upload::WizardView,
            upload::SetupRequest,
            upload::MethodRequest,
            upload::ImagesResponse,
            upload::CommitResponse,
            upload::OrganizeTextRequest,
            upload::TranscriptionResponse,
            upload::EnhancementStatusResponse,
        )
    ),
    tags(
        (name = "Festival Stories API", description = "Collect, enhance and browse festival stories as illustrated books.")
    )
)]
pub struct ApiDoc;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

/// Liveness check.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is running", body = HealthResponse))
)]
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}
