//! In-memory stand-ins for the ports, shared by the unit tests of this crate.

use crate::domain::{now, sort_newest_first, NewStory, Story, StoryListing, StoryUpdate, User, UserIndex};
use crate::ports::{CredentialHasher, ImageNormalizer, PortError, PortResult, RecordStore};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryStore {
    users: Mutex<UserIndex>,
    stories: Mutex<BTreeMap<Uuid, Story>>,
    /// Makes every write fail with a storage error.
    pub fail_writes: AtomicBool,
}

impl InMemoryStore {
    pub fn with_user(email: &str) -> Self {
        let store = Self::default();
        store.users.lock().unwrap().insert(
            email.to_string(),
            User {
                email: email.to_string(),
                name: "Test User".into(),
                password_hash: "plain:secret1".into(),
                preferred_language: "Hindi".into(),
                state: "Delhi".into(),
                created_at: Some(now()),
                stories: Vec::new(),
            },
        );
        store
    }

    fn check_writable(&self) -> PortResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PortError::Storage("disk full".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn initialize(&self) -> PortResult<()> {
        Ok(())
    }

    async fn load_users(&self) -> UserIndex {
        self.users.lock().unwrap().clone()
    }

    async fn save_users(&self, users: &UserIndex) -> PortResult<()> {
        self.check_writable()?;
        *self.users.lock().unwrap() = users.clone();
        Ok(())
    }

    async fn insert_user(&self, user: User) -> PortResult<bool> {
        self.check_writable()?;
        let mut users = self.users.lock().unwrap();
        if users.contains_key(&user.email) {
            return Ok(false);
        }
        users.insert(user.email.clone(), user);
        Ok(true)
    }

    async fn save_story(&self, owner_email: &str, story: NewStory) -> PortResult<Uuid> {
        self.check_writable()?;
        let story_id = Uuid::new_v4();
        let story = story.into_story(story_id, owner_email, now());
        self.stories.lock().unwrap().insert(story_id, story);
        if let Some(user) = self.users.lock().unwrap().get_mut(owner_email) {
            user.stories.push(story_id);
        }
        Ok(story_id)
    }

    async fn load_story(&self, story_id: Uuid) -> Option<Story> {
        self.stories.lock().unwrap().get(&story_id).cloned()
    }

    async fn user_stories(&self, email: &str) -> Vec<Story> {
        let ids = self
            .users
            .lock()
            .unwrap()
            .get(email)
            .map(|u| u.stories.clone())
            .unwrap_or_default();
        let stories = self.stories.lock().unwrap();
        ids.iter().filter_map(|id| stories.get(id).cloned()).collect()
    }

    async fn update_story(&self, story_id: Uuid, update: StoryUpdate) -> PortResult<Story> {
        self.check_writable()?;
        let mut stories = self.stories.lock().unwrap();
        let story = stories
            .get_mut(&story_id)
            .ok_or_else(|| PortError::NotFound(story_id.to_string()))?;
        update
            .apply_to(story)
            .map_err(|e| PortError::Invalid(e.to_string()))?;
        story.updated_at = Some(now());
        Ok(story.clone())
    }

    async fn delete_story(&self, story_id: Uuid, owner_email: &str) -> PortResult<()> {
        self.check_writable()?;
        let removed = self.stories.lock().unwrap().remove(&story_id).is_some();
        let unlinked = self
            .users
            .lock()
            .unwrap()
            .get_mut(owner_email)
            .map(|u| {
                let before = u.stories.len();
                u.stories.retain(|id| *id != story_id);
                before != u.stories.len()
            })
            .unwrap_or(false);
        if removed || unlinked {
            Ok(())
        } else {
            Err(PortError::NotFound(story_id.to_string()))
        }
    }

    async fn all_stories(&self) -> Vec<StoryListing> {
        let users = self.load_users().await;
        let mut listings: Vec<StoryListing> = self
            .stories
            .lock()
            .unwrap()
            .values()
            .cloned()
            .map(|s| StoryListing::join(s, &users))
            .collect();
        sort_newest_first(&mut listings);
        listings
    }
}

/// Stores `plain:<password>`. Never use outside tests.
pub struct PlainHasher;

impl CredentialHasher for PlainHasher {
    fn hash_password(&self, password: &str) -> PortResult<String> {
        Ok(format!("plain:{}", password))
    }

    fn verify_password(&self, password: &str, stored_hash: &str) -> bool {
        stored_hash.strip_prefix("plain:") == Some(password)
    }
}

/// Prefixes the input with a marker; rejects `NOT_AN_IMAGE`.
pub struct TaggingNormalizer;

impl TaggingNormalizer {
    pub const NOT_AN_IMAGE: &'static [u8] = b"%PDF";

    pub fn tag(bytes: &[u8]) -> Vec<u8> {
        let mut out = b"JPEG".to_vec();
        out.extend_from_slice(bytes);
        out
    }
}

impl ImageNormalizer for TaggingNormalizer {
    fn normalize(&self, image_bytes: &[u8]) -> PortResult<Vec<u8>> {
        if image_bytes == Self::NOT_AN_IMAGE {
            return Err(PortError::Unexpected("not an image".into()));
        }
        Ok(Self::tag(image_bytes))
    }
}
