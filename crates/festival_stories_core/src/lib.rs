pub mod domain;
pub mod enhancement;
pub mod identity;
pub mod key_rotation;
pub mod library;
pub mod ports;
pub mod sample_data;
pub mod session;
pub mod validation;
pub mod wizard;

#[cfg(test)]
mod testing;

pub use domain::{
    DatabaseStats, ImageKey, InputMethod, NarratorGender, NewStory, Section, SessionUser, Story,
    StoryListing, StoryUpdate, StoryUpdateError, User, UserIndex,
};
pub use enhancement::EnhancementGateway;
pub use identity::{IdentityError, IdentityService, Registration};
pub use key_rotation::{ApiCredential, KeyRotationManager, KeyStatus, RotationEvent, UsageLedger};
pub use library::{book_page, paginate, BookPage, Page, StoryFilter};
pub use ports::{
    CredentialHasher, ImageNormalizer, PortError, PortResult, RecordStore, SectionOrganizerService,
    SpeechToTextService, TextEnhancementService,
};
pub use sample_data::{seed_sample_data, SeedReport};
pub use session::SessionContext;
pub use wizard::{SectionImages, StoryDraft, StorySetup, UploadWizard, WizardError, WizardStep};
