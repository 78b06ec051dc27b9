//! Input validation for registration and story fields.

/// Minimum password length, counted in characters.
pub const MIN_PASSWORD_LENGTH: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Please enter a valid email address")]
    InvalidEmail,
    #[error("Password must be at least 6 characters long")]
    WeakPassword,
    #[error("{0} cannot be empty")]
    Empty(&'static str),
}

/// Accepts `local@domain` where the part after the `@` contains a dot.
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    match email.split('@').nth(1) {
        Some(domain) if domain.contains('.') => Ok(()),
        _ => Err(ValidationError::InvalidEmail),
    }
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::WeakPassword);
    }
    Ok(())
}

/// Rejects values that are blank after trimming.
pub fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Empty(field));
    }
    Ok(())
}
