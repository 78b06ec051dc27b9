//! crates/festival_stories_core/src/wizard.rs
//!
//! The five-step upload flow. A draft accumulates across steps and is only
//! written to the record store when step 5 commits successfully.
//!
//! Every rejected transition leaves the wizard on the step where the problem
//! was found, with the values already entered still in the draft.

use crate::domain::{ImageKey, InputMethod, NarratorGender, NewStory, Section};
use crate::enhancement::EnhancementGateway;
use crate::ports::{EnhancementRequest, ImageNormalizer, OrganizeRequest, OrganizedStory, PortError, RecordStore};
use crate::validation::require;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{error, info, warn};
use uuid::Uuid;

pub const MIN_SECTIONS: usize = 2;
pub const MAX_SECTIONS: usize = 6;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum WizardStep {
    #[default]
    Setup = 1,
    MethodSelect = 2,
    SectionInput = 3,
    ImageUpload = 4,
    ReviewCommit = 5,
}

impl WizardStep {
    pub fn number(self) -> u8 {
        self as u8
    }

    fn previous(self) -> Self {
        match self {
            WizardStep::Setup | WizardStep::MethodSelect => WizardStep::Setup,
            WizardStep::SectionInput => WizardStep::MethodSelect,
            WizardStep::ImageUpload => WizardStep::SectionInput,
            WizardStep::ReviewCommit => WizardStep::ImageUpload,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WizardError {
    #[error("{action} is not available at step {}", .current.number())]
    WrongStep {
        action: &'static str,
        current: WizardStep,
    },
    #[error("Please fill in all required fields ({})", .0.join(", "))]
    MissingFields(Vec<&'static str>),
    #[error("A story must have between 2 and 6 sections, not {0}")]
    InvalidSectionCount(usize),
    #[error("Expected {expected} sections but received {actual}")]
    SectionCountMismatch { expected: usize, actual: usize },
    #[error("Section {0} needs a title and either text or audio content")]
    IncompleteSection(usize),
    #[error("Audio for Section {0} is not valid base64 data")]
    InvalidAudio(usize),
    #[error("Section {0} does not exist")]
    UnknownSection(usize),
    #[error("An image for Section {section} could not be processed: {reason}")]
    ImageRejected { section: usize, reason: String },
    #[error("Please upload at least one image for sections: {}", join(.0))]
    MissingImages(Vec<usize>),
    #[error("Error saving story: {0}")]
    Storage(#[source] PortError),
}

fn join(sections: &[usize]) -> String {
    sections
        .iter()
        .map(usize::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Step 1 form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorySetup {
    pub title: String,
    pub festival: String,
    pub language: String,
    pub story_type: String,
    pub description: String,
    pub num_sections: usize,
}

/// Raw uploads for one section (1-based). Only the first two files are kept.
#[derive(Debug, Clone)]
pub struct SectionImages {
    pub section: usize,
    pub files: Vec<Vec<u8>>,
}

/// The story under construction.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoryDraft {
    pub title: String,
    pub festival: String,
    pub language: String,
    pub story_type: String,
    pub description: String,
    pub num_sections: usize,
    pub input_method: Option<InputMethod>,
    pub sections: Vec<Section>,
    pub images: BTreeMap<String, String>,
    pub ai_enhanced: bool,
}

impl StoryDraft {
    fn to_new_story(&self) -> NewStory {
        NewStory {
            title: self.title.clone(),
            festival: self.festival.clone(),
            language: self.language.clone(),
            story_type: self.story_type.clone(),
            description: self.description.clone(),
            input_method: self.input_method.unwrap_or_default(),
            sections: self.sections.clone(),
            images: self.images.clone(),
            ai_enhanced: self.ai_enhanced,
        }
    }

    fn image_count(&self, section: usize) -> usize {
        self.images
            .keys()
            .filter_map(|key| ImageKey::parse(key))
            .filter(|key| key.section == section)
            .count()
    }
}

#[derive(Debug, Default)]
pub struct UploadWizard {
    step: WizardStep,
    draft: StoryDraft,
}

impl UploadWizard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn draft(&self) -> &StoryDraft {
        &self.draft
    }

    fn expect_step(&self, expected: WizardStep, action: &'static str) -> Result<(), WizardError> {
        if self.step == expected {
            Ok(())
        } else {
            Err(WizardError::WrongStep {
                action,
                current: self.step,
            })
        }
    }

    /// SETUP -> METHOD_SELECT.
    pub fn submit_setup(&mut self, setup: StorySetup) -> Result<(), WizardError> {
        self.expect_step(WizardStep::Setup, "Story setup")?;

        let missing: Vec<&'static str> = [
            ("Title", &setup.title),
            ("Festival", &setup.festival),
            ("Description", &setup.description),
        ]
        .into_iter()
        .filter(|(field, value)| require(field, value).is_err())
        .map(|(field, _)| field)
        .collect();
        if !missing.is_empty() {
            return Err(WizardError::MissingFields(missing));
        }
        if !(MIN_SECTIONS..=MAX_SECTIONS).contains(&setup.num_sections) {
            return Err(WizardError::InvalidSectionCount(setup.num_sections));
        }

        // Sections and images survive so that back-then-forward keeps them.
        let draft = &mut self.draft;
        draft.title = setup.title.trim().to_string();
        draft.festival = setup.festival.trim().to_string();
        draft.language = setup.language;
        draft.story_type = setup.story_type;
        draft.description = setup.description.trim().to_string();
        draft.num_sections = setup.num_sections;

        self.step = WizardStep::MethodSelect;
        Ok(())
    }

    /// METHOD_SELECT -> SECTION_INPUT.
    pub fn choose_input_method(&mut self, method: InputMethod) -> Result<(), WizardError> {
        self.expect_step(WizardStep::MethodSelect, "Choosing an input method")?;
        self.draft.input_method = Some(method);
        self.step = WizardStep::SectionInput;
        Ok(())
    }

    /// Builds the organizer request for free text typed at step 3.
    pub fn organize_request(&self, text: &str) -> Result<OrganizeRequest, WizardError> {
        self.expect_step(WizardStep::SectionInput, "Organizing sections")?;
        require("Story text", text).map_err(|_| WizardError::MissingFields(vec!["Story text"]))?;
        Ok(OrganizeRequest {
            text: text.to_string(),
            num_sections: self.draft.num_sections,
            language: self.draft.language.clone(),
        })
    }

    /// SECTION_INPUT -> IMAGE_UPLOAD.
    ///
    /// With `enhancer`, section text goes through the enhancement service
    /// first. Any enhancement failure keeps the original sections and the
    /// transition still succeeds.
    pub async fn submit_sections(
        &mut self,
        sections: Vec<Section>,
        enhancer: Option<&EnhancementGateway>,
    ) -> Result<(), WizardError> {
        self.expect_step(WizardStep::SectionInput, "Submitting sections")?;
        let method = self.draft.input_method.unwrap_or_default();

        let sections: Vec<Section> = sections
            .into_iter()
            .map(|section| shape_for(method, section))
            .collect();
        // Keep what was typed even when it is rejected below.
        self.draft.sections = sections.clone();

        if sections.len() != self.draft.num_sections {
            return Err(WizardError::SectionCountMismatch {
                expected: self.draft.num_sections,
                actual: sections.len(),
            });
        }
        for (i, section) in sections.iter().enumerate() {
            let complete = match method {
                InputMethod::Text => section.has_content(),
                InputMethod::Voice => section.has_content() || section.has_audio(),
            };
            if !section.has_title() || !complete {
                return Err(WizardError::IncompleteSection(i + 1));
            }
            if let Some(audio) = section.audio_data.as_deref() {
                if STANDARD.decode(audio).is_err() {
                    return Err(WizardError::InvalidAudio(i + 1));
                }
            }
        }

        let (sections, enhanced) = match enhancer {
            Some(gateway) => match self.enhance(&sections, gateway).await {
                Ok(enhanced) => (enhanced, true),
                Err(e) => {
                    warn!(error = %e, "AI enhancement failed, using original content");
                    (sections, false)
                }
            },
            None => (sections, false),
        };

        self.draft.sections = sections;
        self.draft.ai_enhanced = enhanced;
        self.step = WizardStep::ImageUpload;
        Ok(())
    }

    async fn enhance(
        &self,
        sections: &[Section],
        gateway: &EnhancementGateway,
    ) -> Result<Vec<Section>, PortError> {
        let mut enhanced = Vec::with_capacity(sections.len());
        for section in sections {
            let mut section = section.clone();
            if section.has_content() {
                let request = EnhancementRequest {
                    text: section.content.clone(),
                    language: self.draft.language.clone(),
                    context: format!(
                        "This is a section titled '{}' from a festival story.",
                        section.title
                    ),
                };
                let result = gateway.enhance_text(&request).await?;
                if !result.cleaned_text.trim().is_empty() {
                    section.content = result.cleaned_text;
                }
                section.ai_improvements = result.improvements_made;
            }
            enhanced.push(section);
        }
        Ok(enhanced)
    }

    /// IMAGE_UPLOAD -> REVIEW_COMMIT.
    ///
    /// Sections without new uploads keep their earlier images; zero-length
    /// files (an unselected file input) count as no upload. Returns the
    /// sections that have only one image (two are recommended).
    pub fn submit_images(
        &mut self,
        uploads: Vec<SectionImages>,
        normalizer: &dyn ImageNormalizer,
    ) -> Result<Vec<usize>, WizardError> {
        self.expect_step(WizardStep::ImageUpload, "Uploading images")?;
        let section_count = self.draft.sections.len();

        for mut upload in uploads {
            if upload.section == 0 || upload.section > section_count {
                return Err(WizardError::UnknownSection(upload.section));
            }
            upload.files.retain(|file| !file.is_empty());
            if upload.files.is_empty() {
                continue;
            }

            let mut encoded = Vec::new();
            for file in upload.files.iter().take(ImageKey::SLOTS_PER_SECTION) {
                let jpeg = normalizer.normalize(file).map_err(|e| WizardError::ImageRejected {
                    section: upload.section,
                    reason: e.to_string(),
                })?;
                encoded.push(STANDARD.encode(jpeg));
            }

            self.draft
                .images
                .retain(|key, _| ImageKey::parse(key).is_some_and(|k| k.section != upload.section));
            for (slot, data) in encoded.into_iter().enumerate() {
                let key = ImageKey::new(upload.section, slot + 1);
                self.draft.images.insert(key.to_string(), data);
            }
        }

        self.draft
            .images
            .retain(|key, _| ImageKey::parse(key).is_some_and(|k| k.section <= section_count));

        let missing: Vec<usize> = (1..=section_count)
            .filter(|&n| self.draft.image_count(n) == 0)
            .collect();
        if !missing.is_empty() {
            return Err(WizardError::MissingImages(missing));
        }

        self.step = WizardStep::ReviewCommit;
        Ok((1..=section_count)
            .filter(|&n| self.draft.image_count(n) < ImageKey::SLOTS_PER_SECTION)
            .collect())
    }

    /// REVIEW_COMMIT -> saved story. On success the wizard starts over at
    /// step 1; on failure the draft is kept so the commit can be retried.
    pub async fn commit(
        &mut self,
        owner_email: &str,
        store: &dyn RecordStore,
    ) -> Result<Uuid, WizardError> {
        self.expect_step(WizardStep::ReviewCommit, "Saving the story")?;

        match store.save_story(owner_email, self.draft.to_new_story()).await {
            Ok(story_id) => {
                info!(%story_id, owner = %owner_email, title = %self.draft.title, "Story committed");
                self.abandon();
                Ok(story_id)
            }
            Err(e) => {
                error!(owner = %owner_email, error = %e, "Story commit failed, draft kept");
                Err(WizardError::Storage(e))
            }
        }
    }

    /// Moves to the previous step without losing anything entered.
    pub fn back(&mut self) -> WizardStep {
        self.step = self.step.previous();
        self.step
    }

    /// Discards the draft and starts over. Has no other side effects.
    pub fn abandon(&mut self) {
        self.step = WizardStep::Setup;
        self.draft = StoryDraft::default();
    }
}

/// Drops fields that do not belong to the chosen input method.
fn shape_for(method: InputMethod, mut section: Section) -> Section {
    match method {
        InputMethod::Text => {
            section.audio_data = None;
            section.narrator_gender = None;
        }
        InputMethod::Voice => {
            if section.audio_data.as_deref().is_some_and(str::is_empty) {
                section.audio_data = None;
            }
            section.narrator_gender.get_or_insert(NarratorGender::Male);
        }
    }
    section.ai_improvements.clear();
    section
}

/// Turns an organizer answer into editable sections, in page order.
pub fn sections_from_organized(mut organized: OrganizedStory) -> Vec<Section> {
    organized.sections.sort_by_key(|s| s.page_number);
    organized
        .sections
        .into_iter()
        .map(|s| Section {
            title: s.title,
            content: s.content,
            image_description: s.image_description,
            ..Default::default()
        })
        .collect()
}
