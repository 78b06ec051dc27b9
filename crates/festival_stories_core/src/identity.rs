//! crates/festival_stories_core/src/identity.rs
//!
//! Account creation, credential checks, and the signed-in identity of a session.

use crate::domain::{now, SessionUser, User};
use crate::ports::{CredentialHasher, PortError, RecordStore};
use crate::session::SessionContext;
use crate::validation::{self, ValidationError};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("User with this email already exists")]
    DuplicateUser,
    #[error("Please enter a valid email address")]
    InvalidEmail,
    #[error("Password must be at least 6 characters long")]
    WeakPassword,
    #[error("Name cannot be empty")]
    EmptyName,
    #[error("User not found")]
    UserNotFound,
    #[error("Incorrect password")]
    IncorrectPassword,
    #[error("Failed to save user data: {0}")]
    Port(#[from] PortError),
}

impl From<ValidationError> for IdentityError {
    fn from(e: ValidationError) -> Self {
        match e {
            ValidationError::InvalidEmail => IdentityError::InvalidEmail,
            ValidationError::WeakPassword => IdentityError::WeakPassword,
            ValidationError::Empty(_) => IdentityError::EmptyName,
        }
    }
}

/// Everything a visitor supplies to create an account.
#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub preferred_language: String,
    pub state: String,
}

pub struct IdentityService {
    store: Arc<dyn RecordStore>,
    hasher: Arc<dyn CredentialHasher>,
}

impl IdentityService {
    pub fn new(store: Arc<dyn RecordStore>, hasher: Arc<dyn CredentialHasher>) -> Self {
        Self { store, hasher }
    }

    /// Creates an account with an empty story list. Checks run in a fixed
    /// order: duplicate email, email shape, password length, name.
    pub async fn register(&self, registration: Registration) -> Result<(), IdentityError> {
        let email = registration.email.trim().to_string();

        if self.store.load_users().await.contains_key(&email) {
            return Err(IdentityError::DuplicateUser);
        }
        validation::validate_email(&email)?;
        validation::validate_password(&registration.password)?;
        validation::require("Name", &registration.name)?;

        let password_hash = self.hasher.hash_password(&registration.password)?;
        let user = User {
            email: email.clone(),
            name: registration.name.trim().to_string(),
            password_hash,
            preferred_language: registration.preferred_language,
            state: registration.state,
            created_at: Some(now()),
            stories: Vec::new(),
        };

        // A concurrent signup for the same email may have won since the check above.
        if !self.store.insert_user(user).await? {
            return Err(IdentityError::DuplicateUser);
        }
        info!(%email, "Registered new user");
        Ok(())
    }

    /// Verifies the credentials and binds the user to `session`.
    pub async fn login(
        &self,
        session: &mut SessionContext,
        email: &str,
        password: &str,
    ) -> Result<SessionUser, IdentityError> {
        let users = self.store.load_users().await;
        let user = users.get(email.trim()).ok_or(IdentityError::UserNotFound)?;

        if !self.hasher.verify_password(password, &user.password_hash) {
            warn!(email = %user.email, "Login rejected: incorrect password");
            return Err(IdentityError::IncorrectPassword);
        }

        let session_user = SessionUser::from(user);
        session.sign_in(session_user.clone());
        Ok(session_user)
    }

    pub fn logout(&self, session: &mut SessionContext) {
        session.clear();
    }

    pub fn is_authenticated(&self, session: &SessionContext) -> bool {
        session.is_authenticated()
    }

    pub fn current_user<'a>(&self, session: &'a SessionContext) -> Option<&'a SessionUser> {
        session.current_user()
    }
}
