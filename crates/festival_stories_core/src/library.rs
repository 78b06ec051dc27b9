//! crates/festival_stories_core/src/library.rs
//!
//! Read-side browsing of the shared library: search and filters over joined
//! listings, pagination, and the virtual book view of a single story.

use crate::domain::{InputMethod, NarratorGender, Story, StoryListing};
use serde::{Deserialize, Serialize};

pub const MAX_PER_PAGE: usize = 50;
pub const DEFAULT_PER_PAGE: usize = 12;

/// Search and exact-match filters. Empty fields match everything.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoryFilter {
    /// Case-insensitive text search.
    pub q: Option<String>,
    pub festival: Option<String>,
    pub language: Option<String>,
    /// Author's state.
    pub state: Option<String>,
    pub author: Option<String>,
    pub input_method: Option<InputMethod>,
}

fn exact(filter: &Option<String>, value: &str) -> bool {
    match filter.as_deref().map(str::trim) {
        None | Some("") => true,
        Some(wanted) => wanted.eq_ignore_ascii_case(value.trim()),
    }
}

impl StoryFilter {
    pub fn matches(&self, listing: &StoryListing) -> bool {
        let story = &listing.story;
        exact(&self.festival, &story.festival)
            && exact(&self.language, &story.language)
            && exact(&self.state, &listing.author_state)
            && exact(&self.author, &listing.author_name)
            && self.input_method.map_or(true, |m| m == story.input_method)
            && self.matches_query(listing)
    }

    fn matches_query(&self, listing: &StoryListing) -> bool {
        let query = match self.q.as_deref().map(str::trim) {
            None | Some("") => return true,
            Some(q) => q.to_lowercase(),
        };
        let story = &listing.story;
        let contains = |text: &str| text.to_lowercase().contains(&query);

        [
            story.title.as_str(),
            &story.festival,
            &story.language,
            &listing.author_name,
        ]
        .into_iter()
        .any(contains)
            || story
                .sections
                .iter()
                .any(|s| contains(&s.title) || contains(&s.content))
    }

    /// Keeps the matching listings, preserving their order.
    pub fn apply(&self, listings: Vec<StoryListing>) -> Vec<StoryListing> {
        listings.into_iter().filter(|l| self.matches(l)).collect()
    }
}

/// One page of results. `page` is 1-based.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
    pub total_pages: usize,
}

/// Slices `items` into pages. `per_page` is clamped to 1..=50 and `page` to
/// the available range, so the result is always a real page.
pub fn paginate<T>(items: Vec<T>, page: usize, per_page: usize) -> Page<T> {
    let per_page = per_page.clamp(1, MAX_PER_PAGE);
    let total = items.len();
    let total_pages = total.div_ceil(per_page).max(1);
    let page = page.clamp(1, total_pages);

    let items = items
        .into_iter()
        .skip((page - 1) * per_page)
        .take(per_page)
        .collect();
    Page {
        items,
        page,
        per_page,
        total,
        total_pages,
    }
}

/// A page of the book view. Page 0 is the cover; page n shows section n.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BookPage {
    Cover {
        title: String,
        festival: String,
        language: String,
        story_type: String,
        description: String,
        author_name: String,
        total_pages: usize,
    },
    Section {
        number: usize,
        title: String,
        content: String,
        image_description: String,
        /// Base64 JPEG data in slot order, at most two.
        images: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        audio_data: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        narrator_gender: Option<NarratorGender>,
        total_pages: usize,
    },
}

pub fn page_count(story: &Story) -> usize {
    story.sections.len() + 1
}

/// Renders one page, or `None` past the last page.
pub fn book_page(listing: &StoryListing, page: usize) -> Option<BookPage> {
    let story = &listing.story;
    let total_pages = page_count(story);

    if page == 0 {
        return Some(BookPage::Cover {
            title: story.title.clone(),
            festival: story.festival.clone(),
            language: story.language.clone(),
            story_type: story.story_type.clone(),
            description: story.description.clone(),
            author_name: listing.author_name.clone(),
            total_pages,
        });
    }

    let section = story.sections.get(page - 1)?;
    let (audio_data, narrator_gender) = if story.is_audio_book() {
        (section.audio_data.clone(), section.narrator_gender)
    } else {
        (None, None)
    };
    Some(BookPage::Section {
        number: page,
        title: section.title.clone(),
        content: section.content.clone(),
        image_description: section.image_description.clone(),
        images: story
            .section_images(page)
            .into_iter()
            .map(str::to_string)
            .collect(),
        audio_data,
        narrator_gender,
        total_pages,
    })
}
