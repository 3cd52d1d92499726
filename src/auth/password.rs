use serde::{Deserialize, Serialize};

/// A bcrypt hash as stored in `users.password_hash`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordHash(pub String);

impl PasswordHash {
    pub fn new(plaintext: &str, cost: u32) -> Result<Self, bcrypt::BcryptError> {
        bcrypt::hash(plaintext, cost).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Constant-time via bcrypt. A malformed stored hash never verifies.
    pub fn verify(&self, plaintext: &str) -> bool {
        bcrypt::verify(plaintext, &self.0).unwrap_or(false)
    }
}
