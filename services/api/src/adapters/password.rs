//! services/api/src/adapters/password.rs
//!
//! Implements the `CredentialHasher` port. New hashes are argon2 PHC strings;
//! unsalted SHA-256 hex digests written by earlier deployments still verify.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use festival_stories_core::ports::{CredentialHasher, PortError, PortResult};
use sha2::{Digest, Sha256};
use tracing::error;

#[derive(Clone, Default)]
pub struct Argon2Hasher {
    argon2: Argon2<'static>,
}

impl Argon2Hasher {
    pub fn new() -> Self {
        Self::default()
    }
}

fn is_legacy_digest(stored: &str) -> bool {
    stored.len() == 64 && stored.bytes().all(|b| b.is_ascii_hexdigit())
}

fn legacy_digest(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

impl CredentialHasher for Argon2Hasher {
    fn hash_password(&self, password: &str) -> PortResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| {
                error!("Failed to hash password: {:?}", e);
                PortError::Unexpected("Failed to hash password".to_string())
            })
    }

    fn verify_password(&self, password: &str, stored_hash: &str) -> bool {
        if is_legacy_digest(stored_hash) {
            return legacy_digest(password).eq_ignore_ascii_case(stored_hash);
        }
        match PasswordHash::new(stored_hash) {
            Ok(parsed) => self
                .argon2
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(e) => {
                error!("Failed to parse password hash: {:?}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argon2_hashes_verify_and_are_salted() {
        let hasher = Argon2Hasher::new();
        let first = hasher.hash_password("secret1").unwrap();
        let second = hasher.hash_password("secret1").unwrap();

        assert!(first.starts_with("$argon2"));
        assert_ne!(first, second);
        assert!(hasher.verify_password("secret1", &first));
        assert!(!hasher.verify_password("secret2", &first));
    }

    #[test]
    fn legacy_sha256_digests_still_verify() {
        let hasher = Argon2Hasher::new();
        // sha256("password123")
        let stored = "ef92b778bafe771e89245b89ecbc08a44a4e166c06659911881f383d4473e94f";

        assert!(hasher.verify_password("password123", stored));
        assert!(!hasher.verify_password("password124", stored));
    }

    #[test]
    fn garbage_hash_never_verifies() {
        assert!(!Argon2Hasher::new().verify_password("anything", "not-a-hash"));
    }
}
