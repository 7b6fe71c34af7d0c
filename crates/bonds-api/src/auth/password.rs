//! Argon2id password hashing (PHC string format).

use crate::domain::config::Argon2Config;
use crate::domain::BondsError;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;

const SALT_LEN: usize = 16;

/// Hashes and verifies passwords with fixed cost parameters.
///
/// Verification reads the parameters embedded in the stored hash, so raising
/// the cost only affects new hashes.
pub struct CredentialHasher {
    argon2: Argon2<'static>,
    /// Verified against when the account does not exist, so unknown emails
    /// cost as much as wrong passwords.
    dummy_hash: String,
}

impl CredentialHasher {
    pub fn new(config: &Argon2Config) -> Result<Self, BondsError> {
        let params = Params::new(config.memory_kib, config.iterations, config.parallelism, None)
            .map_err(|e| BondsError::internal(format!("argon2 params: {e}")))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut hasher = Self {
            argon2,
            dummy_hash: String::new(),
        };
        hasher.dummy_hash = hasher.hash("dummy-password-for-timing")?;
        Ok(hasher)
    }

    pub fn hash(&self, password: &str) -> Result<String, BondsError> {
        let mut salt_bytes = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt_bytes);
        let salt = SaltString::encode_b64(&salt_bytes)
            .map_err(|e| BondsError::internal(format!("salt encoding: {e}")))?;

        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| BondsError::internal(format!("password hashing: {e}")))
    }

    /// `false` for a wrong password or an unparseable stored hash.
    pub fn verify(&self, password: &str, stored: &str) -> bool {
        match PasswordHash::new(stored) {
            Ok(parsed) => self
                .argon2
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }

    /// Burn the same work as a real verification. Always `false`.
    pub fn verify_dummy(&self, password: &str) -> bool {
        let _ = self.verify(password, &self.dummy_hash);
        false
    }
}
