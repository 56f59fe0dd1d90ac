//! Credential hashing.
//!
//! Passwords are hashed with Argon2id under a per-credential random salt and
//! stored as PHC strings (`$argon2id$v=19$...`), which carry their own
//! parameters. Verification is constant-time inside `argon2`.

use std::fmt;
use std::sync::OnceLock;

use argon2::password_hash::{self, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::RngCore;

use crate::error::CoreError;

/// A stored password hash in PHC string form.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordHash {
    phc: String,
}

impl PasswordHash {
    /// Hash `password` under a fresh random salt.
    pub fn new(password: &str) -> Result<Self, CoreError> {
        let salt = SaltString::generate(&mut rand::rngs::OsRng);
        let phc = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| CoreError::PasswordHashing(e.to_string()))?
            .to_string();
        Ok(Self { phc })
    }

    /// A real Argon2id hash of a random secret, computed once.
    ///
    /// Verified against when a username is unknown, so a miss costs the same
    /// work as a wrong password.
    pub fn dummy() -> &'static PasswordHash {
        static DUMMY: OnceLock<PasswordHash> = OnceLock::new();
        DUMMY.get_or_init(|| {
            let mut secret = [0u8; 32];
            rand::thread_rng().fill_bytes(&mut secret);
            let secret = hex::encode(secret);
            PasswordHash::new(&secret).unwrap_or(PasswordHash { phc: String::new() })
        })
    }

    /// Check `password` against this hash.
    pub fn verify(&self, password: &str) -> bool {
        let Ok(parsed) = password_hash::PasswordHash::new(&self.phc) else {
            return false;
        };
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }

    /// The PHC string for storage.
    pub fn encode(&self) -> String {
        self.phc.clone()
    }

    /// Parse a stored PHC string.
    pub fn decode(encoded: &str) -> Result<Self, CoreError> {
        let parsed = password_hash::PasswordHash::new(encoded)
            .map_err(|e| CoreError::InvalidPasswordHash(e.to_string()))?;
        if parsed.algorithm.as_str() != "argon2id" {
            return Err(CoreError::InvalidPasswordHash(format!(
                "unsupported algorithm: {}",
                parsed.algorithm
            )));
        }
        Ok(Self {
            phc: encoded.to_string(),
        })
    }
}

impl fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordHash").finish_non_exhaustive()
    }
}
