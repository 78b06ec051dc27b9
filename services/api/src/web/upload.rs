//! services/api/src/web/upload.rs
//!
//! The five-step upload wizard over HTTP. Every handler works on the draft held
//! in the caller's session and answers with the wizard's new position.

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use festival_stories_core::wizard::sections_from_organized;
use festival_stories_core::{
    InputMethod, KeyStatus, Section, SectionImages, SessionContext, StoryDraft, StorySetup,
    UploadWizard,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::state::{AppState, CurrentSession};
use crate::web::{port_rejection, wizard_rejection, Rejection};

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct WizardView {
    /// 1 (setup) through 5 (review and commit).
    pub step: u8,
    pub step_name: String,
    #[schema(value_type = Object)]
    pub draft: StoryDraft,
}

impl WizardView {
    fn of(wizard: &UploadWizard) -> Self {
        Self {
            step: wizard.step().number(),
            step_name: format!("{:?}", wizard.step()),
            draft: wizard.draft().clone(),
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct SetupRequest {
    pub title: String,
    pub festival: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub story_type: String,
    pub description: String,
    pub num_sections: usize,
}

#[derive(Deserialize, ToSchema)]
pub struct MethodRequest {
    /// `text` or `voice`.
    pub input_method: String,
}

fn enhance_by_default() -> bool {
    true
}

#[derive(Deserialize)]
pub struct SectionsRequest {
    pub sections: Vec<Section>,
    /// Run the sections through AI enhancement when it is available.
    #[serde(default = "enhance_by_default")]
    pub enhance: bool,
}

#[derive(Serialize, ToSchema)]
pub struct ImagesResponse {
    #[serde(flatten)]
    pub wizard: WizardView,
    /// Sections with a single image; two are recommended.
    pub sections_with_one_image: Vec<usize>,
}

#[derive(Serialize, ToSchema)]
pub struct CommitResponse {
    pub story_id: Uuid,
    pub message: String,
}

#[derive(Deserialize, ToSchema)]
pub struct OrganizeTextRequest {
    pub text: String,
}

#[derive(Serialize)]
pub struct OrganizeResponse {
    pub sections: Vec<Section>,
    pub story_title: String,
    pub story_summary: String,
}

#[derive(Serialize, ToSchema)]
pub struct TranscriptionResponse {
    pub text: String,
}

#[derive(Serialize, ToSchema)]
pub struct EnhancementStatusResponse {
    pub available: bool,
    #[schema(value_type = Vec<Object>)]
    pub keys: Vec<KeyStatus>,
}

fn owner_email(context: &SessionContext) -> Result<String, Rejection> {
    context
        .current_user()
        .map(|user| user.email.clone())
        .ok_or((StatusCode::UNAUTHORIZED, "Not signed in".to_string()))
}

fn bad_request(message: impl Into<String>) -> Rejection {
    (StatusCode::BAD_REQUEST, message.into())
}

//=========================================================================================
// Wizard Handlers
//=========================================================================================

/// GET /upload - Current step and draft
#[utoipa::path(
    get,
    path = "/upload",
    responses((status = 200, description = "Current wizard state", body = WizardView))
)]
pub async fn wizard_handler(Extension(session): Extension<CurrentSession>) -> Json<WizardView> {
    let context = session.context.lock().await;
    Json(WizardView::of(&context.wizard))
}

/// DELETE /upload - Discard the draft and start over
#[utoipa::path(
    delete,
    path = "/upload",
    responses((status = 200, description = "Draft discarded", body = WizardView))
)]
pub async fn abandon_handler(Extension(session): Extension<CurrentSession>) -> Json<WizardView> {
    let mut context = session.context.lock().await;
    context.wizard.abandon();
    Json(WizardView::of(&context.wizard))
}

/// POST /upload/setup - Step 1: story details and section count
#[utoipa::path(
    post,
    path = "/upload/setup",
    request_body = SetupRequest,
    responses(
        (status = 200, description = "Moved to method selection", body = WizardView),
        (status = 400, description = "Missing fields or section count outside 2..=6"),
        (status = 409, description = "Wizard is not at step 1")
    )
)]
pub async fn setup_handler(
    Extension(session): Extension<CurrentSession>,
    Json(req): Json<SetupRequest>,
) -> Result<Json<WizardView>, Rejection> {
    let mut context = session.context.lock().await;
    context
        .wizard
        .submit_setup(StorySetup {
            title: req.title,
            festival: req.festival,
            language: req.language,
            story_type: req.story_type,
            description: req.description,
            num_sections: req.num_sections,
        })
        .map_err(wizard_rejection)?;
    Ok(Json(WizardView::of(&context.wizard)))
}

/// POST /upload/method - Step 2: text or voice
#[utoipa::path(
    post,
    path = "/upload/method",
    request_body = MethodRequest,
    responses(
        (status = 200, description = "Moved to section input", body = WizardView),
        (status = 400, description = "Unknown input method"),
        (status = 409, description = "Wizard is not at step 2")
    )
)]
pub async fn method_handler(
    Extension(session): Extension<CurrentSession>,
    Json(req): Json<MethodRequest>,
) -> Result<Json<WizardView>, Rejection> {
    let method: InputMethod = req.input_method.parse().map_err(bad_request)?;
    let mut context = session.context.lock().await;
    context
        .wizard
        .choose_input_method(method)
        .map_err(wizard_rejection)?;
    Ok(Json(WizardView::of(&context.wizard)))
}

/// POST /upload/sections - Step 3: section content, optionally AI enhanced
#[utoipa::path(
    post,
    path = "/upload/sections",
    request_body(content_type = "application/json", description = "`sections` (title, content, image_description, audio_data, narrator_gender) and an optional `enhance` flag."),
    responses(
        (status = 200, description = "Moved to image upload", body = WizardView),
        (status = 400, description = "Wrong section count or incomplete section"),
        (status = 409, description = "Wizard is not at step 3")
    )
)]
pub async fn sections_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<CurrentSession>,
    Json(req): Json<SectionsRequest>,
) -> Result<Json<WizardView>, Rejection> {
    let gateway = (req.enhance && state.enhancement.is_available())
        .then_some(state.enhancement.as_ref());

    let mut context = session.context.lock().await;
    context
        .wizard
        .submit_sections(req.sections, gateway)
        .await
        .map_err(wizard_rejection)?;
    Ok(Json(WizardView::of(&context.wizard)))
}

/// POST /upload/images - Step 4: up to two images per section
///
/// Multipart fields are named `section_<n>`; repeat a field for a second image.
#[utoipa::path(
    post,
    path = "/upload/images",
    request_body(content_type = "multipart/form-data", description = "Image files in fields named `section_<n>`."),
    responses(
        (status = 200, description = "Moved to review", body = ImagesResponse),
        (status = 400, description = "A section has no image or an image could not be read"),
        (status = 409, description = "Wizard is not at step 4")
    )
)]
pub async fn images_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<CurrentSession>,
    mut multipart: Multipart,
) -> Result<Json<ImagesResponse>, Rejection> {
    let mut files: BTreeMap<usize, Vec<Vec<u8>>> = BTreeMap::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("Failed to read multipart data: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let section = name
            .strip_prefix("section_")
            .and_then(|n| n.parse::<usize>().ok())
            .ok_or_else(|| bad_request(format!("Unexpected form field '{}'", name)))?;
        let data = field
            .bytes()
            .await
            .map_err(|e| bad_request(format!("Failed to read file bytes: {}", e)))?;
        files.entry(section).or_default().push(data.to_vec());
    }

    let uploads = files
        .into_iter()
        .map(|(section, files)| SectionImages { section, files })
        .collect();

    let mut context = session.context.lock().await;
    let single = context
        .wizard
        .submit_images(uploads, state.images.as_ref())
        .map_err(wizard_rejection)?;
    Ok(Json(ImagesResponse {
        wizard: WizardView::of(&context.wizard),
        sections_with_one_image: single,
    }))
}

/// POST /upload/back - Return to the previous step, keeping the draft
#[utoipa::path(
    post,
    path = "/upload/back",
    responses((status = 200, description = "Moved back one step", body = WizardView))
)]
pub async fn back_handler(Extension(session): Extension<CurrentSession>) -> Json<WizardView> {
    let mut context = session.context.lock().await;
    context.wizard.back();
    Json(WizardView::of(&context.wizard))
}

/// POST /upload/commit - Step 5: save the story
#[utoipa::path(
    post,
    path = "/upload/commit",
    responses(
        (status = 201, description = "Story saved", body = CommitResponse),
        (status = 409, description = "Wizard is not at step 5"),
        (status = 500, description = "Story could not be saved; the draft is kept")
    )
)]
pub async fn commit_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<CurrentSession>,
) -> Result<impl IntoResponse, Rejection> {
    let mut context = session.context.lock().await;
    let email = owner_email(&context)?;
    let story_id = context
        .wizard
        .commit(&email, state.store.as_ref())
        .await
        .map_err(wizard_rejection)?;

    Ok((
        StatusCode::CREATED,
        Json(CommitResponse {
            story_id,
            message: "Story saved successfully!".to_string(),
        }),
    ))
}

//=========================================================================================
// AI Helpers
//=========================================================================================

/// POST /upload/organize - Split free text into the draft's number of sections
///
/// The draft is not changed; the proposed sections are returned for editing.
#[utoipa::path(
    post,
    path = "/upload/organize",
    request_body = OrganizeTextRequest,
    responses(
        (status = 200, description = "Proposed sections"),
        (status = 429, description = "Every API key has reached its rate limit"),
        (status = 503, description = "AI features are not configured")
    )
)]
pub async fn organize_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<CurrentSession>,
    Json(req): Json<OrganizeTextRequest>,
) -> Result<Json<OrganizeResponse>, Rejection> {
    let request = {
        let context = session.context.lock().await;
        context
            .wizard
            .organize_request(&req.text)
            .map_err(wizard_rejection)?
    };

    let organized = state
        .enhancement
        .organize_sections(&request)
        .await
        .map_err(port_rejection)?;
    let story_title = organized.story_title.clone();
    let story_summary = organized.story_summary.clone();
    Ok(Json(OrganizeResponse {
        sections: sections_from_organized(organized),
        story_title,
        story_summary,
    }))
}

/// POST /upload/transcribe - Turn a recording into text
#[utoipa::path(
    post,
    path = "/upload/transcribe",
    request_body(content_type = "multipart/form-data", description = "An `audio` file (wav, mp3 or m4a) and an optional `language` field."),
    responses(
        (status = 200, description = "Transcribed text", body = TranscriptionResponse),
        (status = 400, description = "No audio file in the form"),
        (status = 503, description = "Transcription is not configured")
    )
)]
pub async fn transcribe_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<CurrentSession>,
    mut multipart: Multipart,
) -> Result<Json<TranscriptionResponse>, Rejection> {
    let sst = state.sst.clone().ok_or((
        StatusCode::SERVICE_UNAVAILABLE,
        "Transcription is not available: no API key is configured".to_string(),
    ))?;

    let mut audio: Option<(String, Vec<u8>)> = None;
    let mut language: Option<String> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("Failed to read multipart data: {}", e)))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("audio") => {
                let file_name = field.file_name().unwrap_or("recording.wav").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| bad_request(format!("Failed to read file bytes: {}", e)))?;
                audio = Some((file_name, data.to_vec()));
            }
            Some("language") => {
                language = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| bad_request(format!("Invalid language field: {}", e)))?,
                );
            }
            _ => {}
        }
    }
    let (file_name, data) = audio.ok_or_else(|| bad_request("Multipart form must include an audio file"))?;

    let language = match language.filter(|l| !l.trim().is_empty()) {
        Some(language) => language,
        None => {
            let context = session.context.lock().await;
            let draft_language = context.wizard.draft().language.clone();
            if draft_language.is_empty() {
                context
                    .current_user()
                    .map(|u| u.preferred_language.clone())
                    .unwrap_or_default()
            } else {
                draft_language
            }
        }
    };

    match sst.transcribe_audio(&data, &file_name, &language).await {
        Ok(text) => {
            info!(file = %file_name, %language, "Audio transcribed");
            Ok(Json(TranscriptionResponse { text }))
        }
        Err(e) => {
            warn!(file = %file_name, error = %e, "Transcription failed");
            Err(port_rejection(e))
        }
    }
}

/// GET /enhancement/status - Today's usage of every configured API key
#[utoipa::path(
    get,
    path = "/enhancement/status",
    responses((status = 200, description = "Per-key usage; key material is never included", body = EnhancementStatusResponse))
)]
pub async fn enhancement_status_handler(
    State(state): State<Arc<AppState>>,
) -> Json<EnhancementStatusResponse> {
    Json(EnhancementStatusResponse {
        available: state.enhancement.is_available(),
        keys: state.enhancement.usage_status(),
    })
}
