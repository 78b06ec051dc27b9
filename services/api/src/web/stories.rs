//! services/api/src/web/stories.rs
//!
//! Browsing the shared library: search and pagination, the caller's own
//! stories, the virtual book view, owner-only edits, and aggregate stats.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use festival_stories_core::library::{
    book_page, page_count, paginate, BookPage, Page, StoryFilter, DEFAULT_PER_PAGE,
};
use festival_stories_core::{
    seed_sample_data, DatabaseStats, InputMethod, SeedReport, Story, StoryListing, StoryUpdate,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::IntoParams;
use uuid::Uuid;

use crate::web::state::{AppState, CurrentSession};
use crate::web::{port_rejection, Rejection};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
#[serde(default)]
pub struct StoriesQuery {
    /// Free-text search over titles, festival, language, author and section text.
    pub q: Option<String>,
    pub festival: Option<String>,
    pub language: Option<String>,
    /// Author's state.
    pub state: Option<String>,
    pub author: Option<String>,
    /// `text`, or `voice` for audio books.
    pub input_method: Option<String>,
    pub page: Option<usize>,
    pub per_page: Option<usize>,
}

impl StoriesQuery {
    fn filter(&self) -> Result<StoryFilter, Rejection> {
        let input_method = self
            .input_method
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .map(str::parse::<InputMethod>)
            .transpose()
            .map_err(|e| (StatusCode::BAD_REQUEST, e))?;
        Ok(StoryFilter {
            q: self.q.clone(),
            festival: self.festival.clone(),
            language: self.language.clone(),
            state: self.state.clone(),
            author: self.author.clone(),
            input_method,
        })
    }
}

fn not_found(story_id: Uuid) -> Rejection {
    (StatusCode::NOT_FOUND, format!("Story {} not found", story_id))
}

async fn caller_email(session: &CurrentSession) -> Result<String, Rejection> {
    session
        .context
        .lock()
        .await
        .current_user()
        .map(|user| user.email.clone())
        .ok_or((StatusCode::UNAUTHORIZED, "Not signed in".to_string()))
}

async fn listing(state: &AppState, story_id: Uuid) -> Result<StoryListing, Rejection> {
    let story = state
        .store
        .load_story(story_id)
        .await
        .ok_or_else(|| not_found(story_id))?;
    let users = state.store.load_users().await;
    Ok(StoryListing::join(story, &users))
}

/// Loads a story and checks that `email` owns it.
async fn owned_story(state: &AppState, story_id: Uuid, email: &str) -> Result<Story, Rejection> {
    let story = state
        .store
        .load_story(story_id)
        .await
        .ok_or_else(|| not_found(story_id))?;
    if story.user_email != email {
        warn!(%story_id, caller = %email, "Rejected change to another user's story");
        return Err((
            StatusCode::FORBIDDEN,
            "Only the author can change this story".to_string(),
        ));
    }
    Ok(story)
}

/// GET /stories - Every story, newest first, with search and filters
#[utoipa::path(
    get,
    path = "/stories",
    params(StoriesQuery),
    responses(
        (status = 200, description = "One page of stories joined with their authors"),
        (status = 400, description = "Unknown input method filter")
    )
)]
pub async fn list_stories_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StoriesQuery>,
) -> Result<Json<Page<StoryListing>>, Rejection> {
    let filter = query.filter()?;
    let stories = filter.apply(state.store.all_stories().await);
    Ok(Json(paginate(
        stories,
        query.page.unwrap_or(1),
        query.per_page.unwrap_or(DEFAULT_PER_PAGE),
    )))
}

/// GET /me/stories - The caller's stories in the order they were added
#[utoipa::path(
    get,
    path = "/me/stories",
    responses((status = 200, description = "The caller's stories"))
)]
pub async fn my_stories_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<CurrentSession>,
) -> Result<Json<Vec<Story>>, Rejection> {
    let email = caller_email(&session).await?;
    Ok(Json(state.store.user_stories(&email).await))
}

/// GET /stories/{id} - One story with its author
#[utoipa::path(
    get,
    path = "/stories/{id}",
    params(("id" = Uuid, Path, description = "Story id")),
    responses(
        (status = 200, description = "The story"),
        (status = 404, description = "No such story")
    )
)]
pub async fn get_story_handler(
    State(state): State<Arc<AppState>>,
    Path(story_id): Path<Uuid>,
) -> Result<Json<StoryListing>, Rejection> {
    listing(&state, story_id).await.map(Json)
}

/// PATCH /stories/{id} - Update fields of the caller's story
#[utoipa::path(
    patch,
    path = "/stories/{id}",
    params(("id" = Uuid, Path, description = "Story id")),
    request_body(content_type = "application/json", description = "Any of title, festival, language, story_type, description, sections, images, ai_enhanced."),
    responses(
        (status = 200, description = "The updated story"),
        (status = 400, description = "A section would be left incomplete or an image key is invalid"),
        (status = 403, description = "The caller is not the author"),
        (status = 404, description = "No such story")
    )
)]
pub async fn update_story_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<CurrentSession>,
    Path(story_id): Path<Uuid>,
    Json(update): Json<StoryUpdate>,
) -> Result<Json<Story>, Rejection> {
    let email = caller_email(&session).await?;
    let current = owned_story(&state, story_id, &email).await?;
    update
        .validate(&current)
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    let story = state
        .store
        .update_story(story_id, update)
        .await
        .map_err(port_rejection)?;
    info!(%story_id, "Story updated");
    Ok(Json(story))
}

/// DELETE /stories/{id} - Delete the caller's story
#[utoipa::path(
    delete,
    path = "/stories/{id}",
    params(("id" = Uuid, Path, description = "Story id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "The caller is not the author"),
        (status = 404, description = "No such story")
    )
)]
pub async fn delete_story_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<CurrentSession>,
    Path(story_id): Path<Uuid>,
) -> Result<StatusCode, Rejection> {
    let email = caller_email(&session).await?;
    owned_story(&state, story_id, &email).await?;
    state
        .store
        .delete_story(story_id, &email)
        .await
        .map_err(port_rejection)?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /stories/{id}/pages/{page} - One page of the virtual book
///
/// Page 0 is the cover; page n shows section n.
#[utoipa::path(
    get,
    path = "/stories/{id}/pages/{page}",
    params(
        ("id" = Uuid, Path, description = "Story id"),
        ("page" = usize, Path, description = "0 for the cover, n for section n")
    ),
    responses(
        (status = 200, description = "The page"),
        (status = 404, description = "No such story or page")
    )
)]
pub async fn book_page_handler(
    State(state): State<Arc<AppState>>,
    Path((story_id, page)): Path<(Uuid, usize)>,
) -> Result<Json<BookPage>, Rejection> {
    let listing = listing(&state, story_id).await?;
    book_page(&listing, page).map(Json).ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            format!(
                "Page {} does not exist; this book has {} pages",
                page,
                page_count(&listing.story)
            ),
        )
    })
}

/// GET /stats - Totals by language and festival
#[utoipa::path(
    get,
    path = "/stats",
    responses((status = 200, description = "Library statistics"))
)]
pub async fn stats_handler(State(state): State<Arc<AppState>>) -> Json<DatabaseStats> {
    Json(state.store.database_stats().await)
}

/// POST /sample-data - Add the demo storytellers and their stories
///
/// Existing accounts and stories are left alone, so repeating the call adds nothing.
#[utoipa::path(
    post,
    path = "/sample-data",
    responses(
        (status = 200, description = "How many users and stories were added"),
        (status = 500, description = "The records could not be written")
    )
)]
pub async fn sample_data_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SeedReport>, Rejection> {
    seed_sample_data(state.store.as_ref())
        .await
        .map(Json)
        .map_err(port_rejection)
}
