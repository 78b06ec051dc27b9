//! services/api/src/adapters/json_store.rs
//!
//! This module contains the file-backed record store, the concrete implementation
//! of the `RecordStore` port from the `core` crate. Users live in a single index
//! file (`users.json`, keyed by email) and every story in its own
//! `stories/{story_id}.json` file.
//!
//! Writes go to a temporary sibling first and are renamed into place, so a
//! reader never observes a half-written record.

use async_trait::async_trait;
use festival_stories_core::domain::{
    now, sort_newest_first, NewStory, Story, StoryListing, StoryUpdate, User, UserIndex,
};
use festival_stories_core::ports::{PortError, PortResult, RecordStore};
use serde::{de::DeserializeOwned, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

pub struct JsonFileStore {
    users_file: PathBuf,
    stories_dir: PathBuf,
    /// Held by every read-modify-write of the user index: `insert_user`,
    /// owner linking and unlinking. `save_users` overwrites without it.
    index_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            users_file: data_dir.join("users.json"),
            stories_dir: data_dir.join("stories"),
            index_lock: Mutex::new(()),
        }
    }

    fn story_path(&self, story_id: Uuid) -> PathBuf {
        self.stories_dir.join(format!("{}.json", story_id))
    }

    /// Appends `story_id` to the owner's list. Returns false when the story
    /// is left orphaned.
    async fn link_to_owner(&self, owner_email: &str, story_id: Uuid) -> bool {
        let _guard = self.index_lock.lock().await;
        let mut users = self.load_users().await;
        let Some(owner) = users.get_mut(owner_email) else {
            warn!(%story_id, owner = %owner_email, "Orphaned story: owner is not in the user index");
            return false;
        };
        owner.stories.push(story_id);

        match self.save_users(&users).await {
            Ok(()) => true,
            Err(e) => {
                warn!(%story_id, owner = %owner_email, error = %e, "Orphaned story: owner index was not updated");
                false
            }
        }
    }
}

//=========================================================================================
// File Helpers
//=========================================================================================

/// Reads and parses a JSON file. Missing and unreadable files both yield `None`.
async fn read_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "Record file not present");
            return None;
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read record file");
            return None;
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Malformed record file ignored");
            None
        }
    }
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> PortResult<()> {
    let bytes = serde_json::to_vec_pretty(value)
        .map_err(|e| PortError::Storage(format!("Failed to encode {}: {}", path.display(), e)))?;
    let tmp = path.with_extension("json.tmp");

    fs::write(&tmp, bytes)
        .await
        .map_err(|e| PortError::Storage(format!("Failed to write {}: {}", tmp.display(), e)))?;
    fs::rename(&tmp, path)
        .await
        .map_err(|e| PortError::Storage(format!("Failed to replace {}: {}", path.display(), e)))
}

//=========================================================================================
// `RecordStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl RecordStore for JsonFileStore {
    async fn initialize(&self) -> PortResult<()> {
        fs::create_dir_all(&self.stories_dir).await.map_err(|e| {
            PortError::StorageInit(format!(
                "Failed to create {}: {}",
                self.stories_dir.display(),
                e
            ))
        })?;

        if fs::try_exists(&self.users_file).await.unwrap_or(false) {
            return Ok(());
        }
        write_json(&self.users_file, &UserIndex::new())
            .await
            .map_err(|e| PortError::StorageInit(e.to_string()))?;
        info!(path = %self.users_file.display(), "Created empty user index");
        Ok(())
    }

    async fn load_users(&self) -> UserIndex {
        let mut users: UserIndex = read_json(&self.users_file).await.unwrap_or_default();
        // Older indexes only carry the email as the map key.
        for (email, user) in users.iter_mut() {
            if user.email.is_empty() {
                user.email = email.clone();
            }
        }
        users
    }

    async fn save_users(&self, users: &UserIndex) -> PortResult<()> {
        write_json(&self.users_file, users).await.map_err(|e| {
            error!(error = %e, "Failed to save user index");
            e
        })
    }

    async fn insert_user(&self, user: User) -> PortResult<bool> {
        let _guard = self.index_lock.lock().await;
        let mut users = self.load_users().await;
        if users.contains_key(&user.email) {
            return Ok(false);
        }
        users.insert(user.email.clone(), user);
        self.save_users(&users).await?;
        Ok(true)
    }

    async fn save_story(&self, owner_email: &str, story: NewStory) -> PortResult<Uuid> {
        let story_id = Uuid::new_v4();
        let story = story.into_story(story_id, owner_email, now());

        if let Err(e) = write_json(&self.story_path(story_id), &story).await {
            error!(%story_id, owner = %owner_email, error = %e, "Failed to save story");
            return Err(e);
        }
        if self.link_to_owner(owner_email, story_id).await {
            info!(%story_id, owner = %owner_email, "Saved story");
        }
        Ok(story_id)
    }

    async fn load_story(&self, story_id: Uuid) -> Option<Story> {
        read_json(&self.story_path(story_id)).await
    }

    async fn user_stories(&self, email: &str) -> Vec<Story> {
        let ids = match self.load_users().await.remove(email) {
            Some(user) => user.stories,
            None => return Vec::new(),
        };
        let mut stories = Vec::with_capacity(ids.len());
        for story_id in ids {
            match self.load_story(story_id).await {
                Some(story) => stories.push(story),
                None => debug!(%story_id, owner = %email, "Skipping missing story record"),
            }
        }
        stories
    }

    async fn update_story(&self, story_id: Uuid, update: StoryUpdate) -> PortResult<Story> {
        let mut story = self
            .load_story(story_id)
            .await
            .ok_or_else(|| PortError::NotFound(format!("story {}", story_id)))?;

        update.apply_to(&mut story).map_err(|e| {
            warn!(%story_id, error = %e, "Rejected story update");
            PortError::Invalid(e.to_string())
        })?;
        story.updated_at = Some(now());
        write_json(&self.story_path(story_id), &story).await?;
        Ok(story)
    }

    async fn delete_story(&self, story_id: Uuid, owner_email: &str) -> PortResult<()> {
        let mut failures = Vec::new();

        let removed_file = match fs::remove_file(self.story_path(story_id)).await {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => {
                failures.push(format!("record file: {}", e));
                false
            }
        };

        let unlinked = {
            let _guard = self.index_lock.lock().await;
            let mut users = self.load_users().await;
            let changed = users.get_mut(owner_email).is_some_and(|owner| {
                let before = owner.stories.len();
                owner.stories.retain(|id| *id != story_id);
                owner.stories.len() != before
            });
            if changed {
                if let Err(e) = self.save_users(&users).await {
                    failures.push(format!("owner index: {}", e));
                }
            }
            changed
        };

        if !failures.is_empty() {
            error!(%story_id, owner = %owner_email, ?failures, "Story deletion incomplete");
            return Err(PortError::Storage(failures.join("; ")));
        }
        if !removed_file && !unlinked {
            return Err(PortError::NotFound(format!("story {}", story_id)));
        }
        info!(%story_id, owner = %owner_email, "Deleted story");
        Ok(())
    }

    async fn all_stories(&self) -> Vec<StoryListing> {
        let users = self.load_users().await;
        let mut listings = Vec::new();

        let mut entries = match fs::read_dir(&self.stories_dir).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %self.stories_dir.display(), error = %e, "Failed to list stories");
                return listings;
            }
        };
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "Stopped listing stories early");
                    break;
                }
            };
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let Some(story_id) = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| Uuid::parse_str(stem).ok())
            else {
                continue;
            };
            if let Some(story) = self.load_story(story_id).await {
                listings.push(StoryListing::join(story, &users));
            }
        }

        sort_newest_first(&mut listings);
        listings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use festival_stories_core::domain::{InputMethod, NarratorGender, Section};
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn user(email: &str, name: &str) -> User {
        User {
            email: email.into(),
            name: name.into(),
            password_hash: "hash".into(),
            preferred_language: "Tamil".into(),
            state: "Tamil Nadu".into(),
            created_at: Some(now()),
            stories: Vec::new(),
        }
    }

    fn new_story(title: &str) -> NewStory {
        NewStory {
            title: title.into(),
            festival: "Pongal".into(),
            language: "Tamil".into(),
            sections: vec![Section {
                title: "Harvest".into(),
                content: "Rice boils over.".into(),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    async fn store_with_user(dir: &Path) -> JsonFileStore {
        let store = JsonFileStore::new(dir);
        store.initialize().await.unwrap();
        let mut users = UserIndex::new();
        users.insert("a@x.com".into(), user("a@x.com", "Kavya"));
        store.save_users(&users).await.unwrap();
        store
    }

    #[tokio::test]
    async fn initialize_is_idempotent_and_keeps_existing_users() {
        let dir = tempdir().unwrap();
        let store = store_with_user(dir.path()).await;

        store.initialize().await.unwrap();

        assert!(dir.path().join("stories").is_dir());
        assert_eq!(store.load_users().await.len(), 1);
    }

    #[tokio::test]
    async fn missing_or_malformed_files_read_as_empty() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        assert!(store.load_users().await.is_empty());

        std::fs::write(dir.path().join("users.json"), b"{not json").unwrap();
        assert!(store.load_users().await.is_empty());
        assert!(store.load_story(Uuid::new_v4()).await.is_none());
    }

    #[tokio::test]
    async fn saved_story_is_linked_to_its_owner() {
        let dir = tempdir().unwrap();
        let store = store_with_user(dir.path()).await;

        let first = store.save_story("a@x.com", new_story("One")).await.unwrap();
        let second = store.save_story("a@x.com", new_story("Two")).await.unwrap();

        let loaded = store.load_story(first).await.unwrap();
        assert_eq!(loaded.user_email, "a@x.com");
        assert!(loaded.created_at.is_some());
        let titles: Vec<String> = store
            .user_stories("a@x.com")
            .await
            .into_iter()
            .map(|s| s.title)
            .collect();
        assert_eq!(titles, vec!["One", "Two"]);
        assert_eq!(store.load_users().await["a@x.com"].stories, vec![first, second]);
    }

    #[tokio::test]
    async fn story_for_unknown_owner_is_saved_but_orphaned() {
        let dir = tempdir().unwrap();
        let store = store_with_user(dir.path()).await;

        let story_id = store.save_story("ghost@x.com", new_story("Lost")).await.unwrap();

        assert!(store.load_story(story_id).await.is_some());
        assert!(store.user_stories("ghost@x.com").await.is_empty());
        let listing = &store.all_stories().await[0];
        assert_eq!(listing.author_name, "Anonymous");
    }

    #[tokio::test]
    async fn user_stories_skip_missing_records() {
        let dir = tempdir().unwrap();
        let store = store_with_user(dir.path()).await;
        let kept = store.save_story("a@x.com", new_story("Kept")).await.unwrap();
        let gone = store.save_story("a@x.com", new_story("Gone")).await.unwrap();
        std::fs::remove_file(dir.path().join("stories").join(format!("{}.json", gone))).unwrap();

        let stories = store.user_stories("a@x.com").await;
        assert_eq!(stories.len(), 1);
        assert_eq!(stories[0].story_id, kept);
    }

    #[tokio::test]
    async fn update_merges_fields_and_bumps_updated_at() {
        let dir = tempdir().unwrap();
        let store = store_with_user(dir.path()).await;
        let story_id = store.save_story("a@x.com", new_story("Draft")).await.unwrap();
        let before = store.load_story(story_id).await.unwrap();

        let updated = store
            .update_story(
                story_id,
                StoryUpdate {
                    title: Some("Final".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.title, "Final");
        assert_eq!(updated.festival, "Pongal");
        assert_eq!(updated.created_at, before.created_at);
        assert!(updated.updated_at >= before.updated_at);
        assert!(matches!(
            store.update_story(Uuid::new_v4(), StoryUpdate::default()).await,
            Err(PortError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn update_refuses_incomplete_sections_and_unknown_image_keys() {
        let dir = tempdir().unwrap();
        let store = store_with_user(dir.path()).await;
        let story_id = store.save_story("a@x.com", new_story("Pongal")).await.unwrap();

        let blank_section = store
            .update_story(
                story_id,
                StoryUpdate {
                    sections: Some(vec![Section::default()]),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(blank_section, Err(PortError::Invalid(_))));

        let cover_image = store
            .update_story(
                story_id,
                StoryUpdate {
                    images: Some(BTreeMap::from([("cover".to_string(), "xx".to_string())])),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(cover_image, Err(PortError::Invalid(_))));

        let stored = store.load_story(story_id).await.unwrap();
        assert_eq!(stored.sections[0].title, "Harvest");
        assert!(stored.images.is_empty());
    }

    #[tokio::test]
    async fn shortened_story_loses_images_of_removed_sections() {
        let dir = tempdir().unwrap();
        let store = store_with_user(dir.path()).await;
        let mut story = new_story("Kolam");
        story.sections.push(Section {
            title: "Morning".into(),
            content: "Chalk patterns at dawn.".into(),
            ..Default::default()
        });
        story.images = BTreeMap::from([
            ("section_1_image_1".to_string(), "AAA".to_string()),
            ("section_2_image_1".to_string(), "BBB".to_string()),
            ("section_2_image_2".to_string(), "CCC".to_string()),
        ]);
        let story_id = store.save_story("a@x.com", story).await.unwrap();

        let updated = store
            .update_story(
                story_id,
                StoryUpdate {
                    sections: Some(vec![Section {
                        title: "Harvest".into(),
                        content: "Rice boils over.".into(),
                        ..Default::default()
                    }]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let keys: Vec<&str> = updated.images.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["section_1_image_1"]);
        assert_eq!(store.load_story(story_id).await.unwrap(), updated);
    }

    #[tokio::test]
    async fn voice_story_round_trips_through_its_file() {
        let dir = tempdir().unwrap();
        let store = store_with_user(dir.path()).await;
        let story = NewStory {
            title: "Onam Songs".into(),
            festival: "Onam".into(),
            language: "Malayalam".into(),
            story_type: "Childhood Memory".into(),
            description: "Grandfather sang while we built the pookalam.".into(),
            input_method: InputMethod::Voice,
            sections: vec![
                Section {
                    title: "Flowers".into(),
                    content: String::new(),
                    image_description: "A flower carpet".into(),
                    audio_data: Some("UklGRiQAAABXQVZF".into()),
                    narrator_gender: Some(NarratorGender::Female),
                    ai_improvements: Vec::new(),
                },
                Section {
                    title: "Feast".into(),
                    content: "Twenty-six dishes on a banana leaf.".into(),
                    image_description: "Sadhya".into(),
                    audio_data: Some("SUQzBAAAAAAA".into()),
                    narrator_gender: Some(NarratorGender::Male),
                    ai_improvements: vec!["punctuation".into()],
                },
            ],
            images: BTreeMap::from([
                ("section_1_image_1".to_string(), "/9j/AAA".to_string()),
                ("section_1_image_2".to_string(), "/9j/BBB".to_string()),
                ("section_2_image_1".to_string(), "/9j/CCC".to_string()),
            ]),
            ai_enhanced: true,
        };

        let story_id = store.save_story("a@x.com", story.clone()).await.unwrap();
        let loaded = store.load_story(story_id).await.unwrap();

        assert_eq!(loaded.story_id, story_id);
        assert_eq!(loaded.user_email, "a@x.com");
        assert!(loaded.created_at.is_some());
        assert_eq!(loaded.created_at, loaded.updated_at);
        let content = NewStory {
            title: loaded.title,
            festival: loaded.festival,
            language: loaded.language,
            story_type: loaded.story_type,
            description: loaded.description,
            input_method: loaded.input_method,
            sections: loaded.sections,
            images: loaded.images,
            ai_enhanced: loaded.ai_enhanced,
        };
        assert_eq!(content, story);
    }

    #[tokio::test]
    async fn deleting_one_story_leaves_the_others_in_order() {
        let dir = tempdir().unwrap();
        let store = store_with_user(dir.path()).await;
        let first = store.save_story("a@x.com", new_story("First")).await.unwrap();
        let middle = store.save_story("a@x.com", new_story("Middle")).await.unwrap();
        let last = store.save_story("a@x.com", new_story("Last")).await.unwrap();

        store.delete_story(middle, "a@x.com").await.unwrap();

        let remaining: Vec<Uuid> = store
            .user_stories("a@x.com")
            .await
            .into_iter()
            .map(|s| s.story_id)
            .collect();
        assert_eq!(remaining, vec![first, last]);
        assert_eq!(store.all_stories().await.len(), 2);
    }

    #[tokio::test]
    async fn concurrent_signups_and_story_links_are_all_kept() {
        let dir = tempdir().unwrap();
        let store = store_with_user(dir.path()).await;

        for n in 0..10 {
            let email = format!("guest{}@x.com", n);
            let (inserted, saved) = tokio::join!(
                store.insert_user(user(&email, "Guest")),
                store.save_story("a@x.com", new_story("Lamps")),
            );
            assert!(inserted.unwrap());
            saved.unwrap();
        }

        let users = store.load_users().await;
        assert_eq!(users.len(), 11);
        assert_eq!(users["a@x.com"].stories.len(), 10);
        assert!(!store.insert_user(user("guest0@x.com", "Again")).await.unwrap());
    }

    #[tokio::test]
    async fn delete_removes_file_and_reference() {
        let dir = tempdir().unwrap();
        let store = store_with_user(dir.path()).await;
        let story_id = store.save_story("a@x.com", new_story("Bye")).await.unwrap();

        store.delete_story(story_id, "a@x.com").await.unwrap();

        assert!(store.load_story(story_id).await.is_none());
        assert!(store.load_users().await["a@x.com"].stories.is_empty());
        assert!(matches!(
            store.delete_story(story_id, "a@x.com").await,
            Err(PortError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn all_stories_are_joined_and_newest_first() {
        let dir = tempdir().unwrap();
        let store = store_with_user(dir.path()).await;
        let old = store.save_story("a@x.com", new_story("Old")).await.unwrap();
        store.save_story("a@x.com", new_story("New")).await.unwrap();
        // Give the old story an earlier creation time.
        let mut record = store.load_story(old).await.unwrap();
        record.created_at = record.created_at.map(|t| t - chrono::Duration::days(1));
        write_json(&store.story_path(old), &record).await.unwrap();
        std::fs::write(dir.path().join("stories").join("notes.txt"), b"ignored").unwrap();

        let listings = store.all_stories().await;

        let titles: Vec<&str> = listings.iter().map(|l| l.story.title.as_str()).collect();
        assert_eq!(titles, vec!["New", "Old"]);
        assert_eq!(listings[0].author_name, "Kavya");
        assert_eq!(listings[0].author_language, "Tamil");

        let stats = store.database_stats().await;
        assert_eq!((stats.total_users, stats.total_stories), (1, 2));
        assert_eq!(stats.festivals["Pongal"], 2);
    }

    #[tokio::test]
    async fn legacy_index_without_email_field_is_keyed_by_map_key() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("users.json"),
            br#"{"old@x.com": {"name": "Old", "password": "abc", "stories": []}}"#,
        )
        .unwrap();
        let store = JsonFileStore::new(dir.path());

        let users = store.load_users().await;
        assert_eq!(users["old@x.com"].email, "old@x.com");
        assert_eq!(users["old@x.com"].password_hash, "abc");
    }
}
