//! crates/festival_stories_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of concrete storage, hashing, imaging, or AI providers.

use crate::domain::{DatabaseStats, NewStory, Story, StoryListing, StoryUpdate, User, UserIndex};
use crate::key_rotation::ApiCredential;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., filesystem, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// The request would leave a record in a shape it must never have.
    #[error("Invalid change: {0}")]
    Invalid(String),
    #[error("Storage could not be initialized: {0}")]
    StorageInit(String),
    #[error("Storage write failed: {0}")]
    Storage(String),
    /// The external service rejected the call for exceeding its rate limit.
    #[error("Rate limit reached: {0}")]
    RateLimited(String),
    /// The external service cannot be used at all (e.g., no credentials configured).
    #[error("Service unavailable: {0}")]
    Unavailable(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Record Store
//=========================================================================================

/// Durable mapping from identifiers to users and stories.
///
/// Reads fail soft: a missing or unreadable record yields an empty result that
/// callers treat as "nothing there yet". Writes fail loud with an error.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Ensures the storage location exists and holds a user index. Idempotent.
    async fn initialize(&self) -> PortResult<()>;

    async fn load_users(&self) -> UserIndex;

    async fn save_users(&self, users: &UserIndex) -> PortResult<()>;

    /// Adds `user` to the index unless the email is taken. Returns false
    /// when it was. The check and the write happen under one index update.
    async fn insert_user(&self, user: User) -> PortResult<bool>;

    /// Persists a new story for `owner_email` and appends its id to the
    /// owner's list. Returns the assigned story id.
    async fn save_story(&self, owner_email: &str, story: NewStory) -> PortResult<Uuid>;

    async fn load_story(&self, story_id: Uuid) -> Option<Story>;

    /// The owner's stories in the order they were added. Ids whose record
    /// is missing are skipped.
    async fn user_stories(&self, email: &str) -> Vec<Story>;

    /// Merges `update` into the stored story. An update that fails
    /// `StoryUpdate::validate` is refused with `PortError::Invalid`.
    async fn update_story(&self, story_id: Uuid, update: StoryUpdate) -> PortResult<Story>;

    async fn delete_story(&self, story_id: Uuid, owner_email: &str) -> PortResult<()>;

    /// Every story joined with its author, newest first.
    async fn all_stories(&self) -> Vec<StoryListing>;

    async fn database_stats(&self) -> DatabaseStats {
        let users = self.load_users().await;
        let stories = self.all_stories().await;
        DatabaseStats::from_records(users.len(), &stories)
    }
}

//=========================================================================================
// Credentials and Images
//=========================================================================================

/// One-way password hashing.
pub trait CredentialHasher: Send + Sync {
    fn hash_password(&self, password: &str) -> PortResult<String>;

    fn verify_password(&self, password: &str, stored_hash: &str) -> bool;
}

/// Downscales an uploaded picture to fit the page and re-encodes it.
pub trait ImageNormalizer: Send + Sync {
    fn normalize(&self, image_bytes: &[u8]) -> PortResult<Vec<u8>>;
}

//=========================================================================================
// External AI Collaborators
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnhancementRequest {
    pub text: String,
    pub language: String,
    pub context: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancedText {
    pub cleaned_text: String,
    #[serde(default)]
    pub improvements_made: Vec<String>,
    #[serde(default)]
    pub confidence_score: f32,
    #[serde(default)]
    pub cultural_notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrganizeRequest {
    pub text: String,
    pub num_sections: usize,
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizedSection {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub image_description: String,
    #[serde(default)]
    pub page_number: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizedStory {
    #[serde(default)]
    pub sections: Vec<OrganizedSection>,
    #[serde(default)]
    pub story_title: String,
    #[serde(default)]
    pub story_summary: String,
}

/// Cleans and corrects story text. Each call is made with one credential
/// chosen by the rotation manager.
#[async_trait]
pub trait TextEnhancementService: Send + Sync {
    async fn enhance_text(
        &self,
        credential: &ApiCredential,
        request: &EnhancementRequest,
    ) -> PortResult<EnhancedText>;
}

/// Splits free text into a fixed number of book sections.
#[async_trait]
pub trait SectionOrganizerService: Send + Sync {
    async fn organize_sections(
        &self,
        credential: &ApiCredential,
        request: &OrganizeRequest,
    ) -> PortResult<OrganizedStory>;
}

#[async_trait]
pub trait SpeechToTextService: Send + Sync {
    /// Transcribes an uploaded audio file into text in the hinted language.
    async fn transcribe_audio(
        &self,
        audio_data: &[u8],
        file_name: &str,
        language: &str,
    ) -> PortResult<String>;
}
