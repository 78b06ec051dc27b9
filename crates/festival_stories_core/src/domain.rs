//! crates/festival_stories_core/src/domain.rs
//!
//! Defines the core data structures for the application: users, stories, their
//! sections, and the read-side views derived from them.
//!
//! Every persisted field declares its serde default, so a record written by an
//! older deployment has exactly one meaning for a field it does not carry.

use chrono::{Local, NaiveDateTime};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use uuid::Uuid;

/// The user index, keyed by email.
pub type UserIndex = BTreeMap<String, User>;

/// Current local wall-clock time, the format every record timestamp uses.
pub fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Reads an optional timestamp. Empty or unparseable values become `None`
/// instead of failing the whole record.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|value| value.trim().parse().ok()))
}

//=========================================================================================
// Enumerations
//=========================================================================================

/// How the narrative of a story was captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputMethod {
    #[default]
    Text,
    Voice,
}

impl InputMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputMethod::Text => "text",
            InputMethod::Voice => "voice",
        }
    }
}

impl FromStr for InputMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(InputMethod::Text),
            "voice" => Ok(InputMethod::Voice),
            other => Err(format!("'{}' is not an input method (expected text or voice)", other)),
        }
    }
}

/// Voice of the animated narrator shown next to an audio section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NarratorGender {
    Male,
    Female,
}

//=========================================================================================
// Story and Section
//=========================================================================================

/// One titled, ordered chunk of a story. Not addressable on its own.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Section {
    pub title: String,
    pub content: String,
    pub image_description: String,
    /// Base64 encoded audio, present for voice stories.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub narrator_gender: Option<NarratorGender>,
    /// Notes returned by the enhancement service, empty when not enhanced.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ai_improvements: Vec<String>,
}

impl Section {
    pub fn has_title(&self) -> bool {
        !self.title.trim().is_empty()
    }

    pub fn has_content(&self) -> bool {
        !self.content.trim().is_empty()
    }

    pub fn has_audio(&self) -> bool {
        self.audio_data.as_deref().is_some_and(|a| !a.is_empty())
    }
}

/// Identifies one illustration slot of one section, rendered as
/// `section_{n}_image_{k}` with a 1-based section index and slot 1 or 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ImageKey {
    pub section: usize,
    pub slot: usize,
}

impl ImageKey {
    pub const SLOTS_PER_SECTION: usize = 2;

    pub fn new(section: usize, slot: usize) -> Self {
        Self { section, slot }
    }

    /// Parses a stored image key, rejecting anything outside the keying scheme.
    pub fn parse(key: &str) -> Option<Self> {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let pattern = PATTERN.get_or_init(|| {
            Regex::new(r"^section_([1-9][0-9]*)_image_([12])$").expect("image key pattern is valid")
        });
        let caps = pattern.captures(key)?;
        let section = caps.get(1)?.as_str().parse().ok()?;
        let slot = caps.get(2)?.as_str().parse().ok()?;
        Some(Self { section, slot })
    }
}

impl fmt::Display for ImageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "section_{}_image_{}", self.section, self.slot)
    }
}

/// A persisted festival story. `story_id` never changes once assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    pub story_id: Uuid,
    #[serde(default)]
    pub user_email: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub festival: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub story_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub input_method: InputMethod,
    #[serde(default)]
    pub sections: Vec<Section>,
    /// Base64 JPEG data keyed by `ImageKey`.
    #[serde(default)]
    pub images: BTreeMap<String, String>,
    #[serde(default)]
    pub ai_enhanced: bool,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub updated_at: Option<NaiveDateTime>,
}

impl Story {
    /// The images of one section (1-based), in slot order.
    pub fn section_images(&self, section: usize) -> Vec<&str> {
        (1..=ImageKey::SLOTS_PER_SECTION)
            .filter_map(|slot| self.images.get(&ImageKey::new(section, slot).to_string()))
            .map(String::as_str)
            .collect()
    }

    pub fn is_audio_book(&self) -> bool {
        self.input_method == InputMethod::Voice
    }
}

/// Content of a story before the store assigns its identity and timestamps.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewStory {
    pub title: String,
    pub festival: String,
    pub language: String,
    pub story_type: String,
    pub description: String,
    pub input_method: InputMethod,
    pub sections: Vec<Section>,
    pub images: BTreeMap<String, String>,
    pub ai_enhanced: bool,
}

impl NewStory {
    pub fn into_story(self, story_id: Uuid, owner_email: &str, at: NaiveDateTime) -> Story {
        Story {
            story_id,
            user_email: owner_email.to_string(),
            title: self.title,
            festival: self.festival,
            language: self.language,
            story_type: self.story_type,
            description: self.description,
            input_method: self.input_method,
            sections: self.sections,
            images: self.images,
            ai_enhanced: self.ai_enhanced,
            created_at: Some(at),
            updated_at: Some(at),
        }
    }
}

/// A partial update. `None` leaves the stored value untouched; identity,
/// ownership and creation time cannot be changed.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct StoryUpdate {
    pub title: Option<String>,
    pub festival: Option<String>,
    pub language: Option<String>,
    pub story_type: Option<String>,
    pub description: Option<String>,
    pub sections: Option<Vec<Section>>,
    pub images: Option<BTreeMap<String, String>>,
    pub ai_enhanced: Option<bool>,
}

/// Why a partial update was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoryUpdateError {
    #[error("A story needs at least one section")]
    NoSections,
    #[error("Section {0} needs a title and either content or audio")]
    IncompleteSection(usize),
    #[error("'{0}' is not a valid image key; expected section_<n>_image_<1|2>")]
    InvalidImageKey(String),
    #[error("Image '{key}' points past the last section ({sections})")]
    ImageBeyondSections { key: String, sections: usize },
}

impl StoryUpdate {
    /// Checks the update against the story it will be applied to. Sections
    /// must stay complete and every image key must name an existing section.
    pub fn validate(&self, story: &Story) -> Result<(), StoryUpdateError> {
        let sections = self.sections.as_ref().unwrap_or(&story.sections);
        if let Some(new_sections) = &self.sections {
            if new_sections.is_empty() {
                return Err(StoryUpdateError::NoSections);
            }
            for (i, section) in new_sections.iter().enumerate() {
                if !section.has_title() || !(section.has_content() || section.has_audio()) {
                    return Err(StoryUpdateError::IncompleteSection(i + 1));
                }
            }
        }
        if let Some(images) = &self.images {
            for key in images.keys() {
                let parsed =
                    ImageKey::parse(key).ok_or_else(|| StoryUpdateError::InvalidImageKey(key.clone()))?;
                if parsed.section > sections.len() {
                    return Err(StoryUpdateError::ImageBeyondSections {
                        key: key.clone(),
                        sections: sections.len(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Validates, then merges into `story`. Images of sections that no
    /// longer exist are dropped.
    pub fn apply_to(self, story: &mut Story) -> Result<(), StoryUpdateError> {
        self.validate(story)?;

        if let Some(title) = self.title {
            story.title = title;
        }
        if let Some(festival) = self.festival {
            story.festival = festival;
        }
        if let Some(language) = self.language {
            story.language = language;
        }
        if let Some(story_type) = self.story_type {
            story.story_type = story_type;
        }
        if let Some(description) = self.description {
            story.description = description;
        }
        if let Some(sections) = self.sections {
            story.sections = sections;
        }
        if let Some(images) = self.images {
            story.images = images;
        }
        if let Some(ai_enhanced) = self.ai_enhanced {
            story.ai_enhanced = ai_enhanced;
        }

        let count = story.sections.len();
        story
            .images
            .retain(|key, _| ImageKey::parse(key).is_some_and(|k| k.section <= count));
        Ok(())
    }
}

//=========================================================================================
// Users
//=========================================================================================

/// A registered storyteller. Only ever mutated to append story references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    /// Older indexes stored the digest under `password`.
    #[serde(default, alias = "password")]
    pub password_hash: String,
    #[serde(default)]
    pub preferred_language: String,
    #[serde(default)]
    pub state: String,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub stories: Vec<Uuid>,
}

/// The session-bound view of a logged-in user. Never carries the hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionUser {
    pub name: String,
    pub email: String,
    pub preferred_language: String,
    pub state: String,
}

impl From<&User> for SessionUser {
    fn from(user: &User) -> Self {
        Self {
            name: user.name.clone(),
            email: user.email.clone(),
            preferred_language: user.preferred_language.clone(),
            state: user.state.clone(),
        }
    }
}

//=========================================================================================
// Read-side Views
//=========================================================================================

const ANONYMOUS: &str = "Anonymous";
const UNKNOWN: &str = "Unknown";

/// A story joined with the public details of its author.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoryListing {
    #[serde(flatten)]
    pub story: Story,
    pub author_name: String,
    pub author_state: String,
    pub author_language: String,
}

impl StoryListing {
    /// Joins a story with its owner, falling back to placeholder author
    /// details when the owner is missing from the index.
    pub fn join(story: Story, users: &UserIndex) -> Self {
        match users.get(&story.user_email) {
            Some(user) => Self {
                author_name: or_placeholder(&user.name, ANONYMOUS),
                author_state: or_placeholder(&user.state, UNKNOWN),
                author_language: or_placeholder(&user.preferred_language, UNKNOWN),
                story,
            },
            None => Self {
                story,
                author_name: ANONYMOUS.to_string(),
                author_state: UNKNOWN.to_string(),
                author_language: UNKNOWN.to_string(),
            },
        }
    }
}

fn or_placeholder(value: &str, placeholder: &str) -> String {
    if value.trim().is_empty() {
        placeholder.to_string()
    } else {
        value.to_string()
    }
}

/// Sorts newest first. Records without `created_at` go last.
pub fn sort_newest_first(listings: &mut [StoryListing]) {
    // `None < Some(_)`, so a descending comparison leaves undated records at the end.
    listings.sort_by(|a, b| b.story.created_at.cmp(&a.story.created_at));
}

/// Aggregate counts over the whole library.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DatabaseStats {
    pub total_users: usize,
    pub total_stories: usize,
    pub languages: BTreeMap<String, usize>,
    pub festivals: BTreeMap<String, usize>,
}

impl DatabaseStats {
    pub fn from_records(total_users: usize, stories: &[StoryListing]) -> Self {
        let mut stats = DatabaseStats {
            total_users,
            total_stories: stories.len(),
            ..Default::default()
        };
        for listing in stories {
            let language = or_placeholder(&listing.story.language, UNKNOWN);
            *stats.languages.entry(language).or_default() += 1;
            let festival = or_placeholder(&listing.story.festival, UNKNOWN);
            *stats.festivals.entry(festival).or_default() += 1;
        }
        stats
    }
}
