use argon2::Config;
use mongodb::bson::Bson;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Passwords shorter than this are rejected whenever a new password is set.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// A salted argon2 hash of a password, in the encoded PHC string format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// Hash the given plaintext password with a fresh random salt.
    pub fn new(password: &str) -> Result<Self, argon2::Error> {
        // 16 bytes is recommended for password hashing:
        //  https://en.wikipedia.org/wiki/Argon2
        let mut salt = [0_u8; 16];
        rand::thread_rng().fill(&mut salt);
        let encoded = argon2::hash_encoded(password.as_bytes(), &salt, &Config::default())?;
        Ok(Self(encoded))
    }

    /// Check whether the given password is correct.
    pub fn verify(&self, password: &str) -> bool {
        argon2::verify_encoded(&self.0, password.as_bytes()).unwrap_or(false)
    }
}

impl From<PasswordHash> for Bson {
    fn from(hash: PasswordHash) -> Self {
        Bson::String(hash.0)
    }
}

/// Check that a new password is acceptable.
pub fn is_acceptable(password: &str) -> bool {
    password.len() >= MIN_PASSWORD_LENGTH
}
