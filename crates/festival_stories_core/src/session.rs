//! crates/festival_stories_core/src/session.rs
//!
//! Per-visitor state: who is signed in and the upload in progress. A context
//! is created when a session starts and torn down at logout or expiry.

use crate::domain::SessionUser;
use crate::wizard::UploadWizard;

#[derive(Debug)]
pub struct SessionContext {
    id: String,
    user: Option<SessionUser>,
    pub wizard: UploadWizard,
}

impl SessionContext {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            user: None,
            wizard: UploadWizard::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn current_user(&self) -> Option<&SessionUser> {
        self.user.as_ref()
    }

    pub(crate) fn sign_in(&mut self, user: SessionUser) {
        self.user = Some(user);
    }

    /// Forgets the identity and discards any draft.
    pub(crate) fn clear(&mut self) {
        self.user = None;
        self.wizard.abandon();
    }
}
