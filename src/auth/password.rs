use crate::utils::toml_config::PasswordConfig;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use base64::Engine;
use sha2::{Digest, Sha256};
use std::sync::OnceLock;
use subtle::ConstantTimeEq;

/// Errors raised while producing a password record.
///
/// Verification never errors: a malformed stored record is simply a mismatch.
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("Invalid Argon2 parameters: {0}")]
    InvalidParams(String),

    #[error("Failed to hash password: {0}")]
    Hash(String),
}

/// Outcome of checking a plaintext against a stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordCheck {
    /// Matches an Argon2 record.
    Valid,
    /// Matches a legacy salted SHA-256 record; the caller should re-hash.
    ValidLegacy,
    Invalid,
}

impl PasswordCheck {
    pub fn is_valid(self) -> bool {
        !matches!(self, PasswordCheck::Invalid)
    }
}

/// Password hashing and verification service.
///
/// New records are Argon2id PHC strings (`$argon2id$v=19$m=..,t=..,p=..$<salt>$<digest>`),
/// which embed the random salt next to the digest. Records written by the
/// previous scheme (`base64(sha256(password || salt)):salt`) still verify so
/// that accounts can be migrated on their next successful login.
pub struct PasswordService {
    argon2: Argon2<'static>,
    decoy: OnceLock<String>,
}

impl PasswordService {
    /// Creates a service using the configured Argon2id cost parameters.
    pub fn new(config: &PasswordConfig) -> Result<Self, PasswordError> {
        let params = Params::new(
            config.memory_kib,
            config.iterations,
            config.parallelism,
            None,
        )
        .map_err(|e| PasswordError::InvalidParams(e.to_string()))?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
            decoy: OnceLock::new(),
        })
    }

    /// Hashes a password using Argon2id with a fresh 16-byte salt from the OS RNG.
    pub fn hash(&self, plaintext: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);

        self.argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| PasswordError::Hash(e.to_string()))
    }

    /// Returns true if `plaintext` matches the stored record under either scheme.
    pub fn verify(&self, plaintext: &str, stored: &str) -> bool {
        self.check(plaintext, stored).is_valid()
    }

    /// Like [`verify`](Self::verify) but reports which scheme matched.
    pub fn check(&self, plaintext: &str, stored: &str) -> PasswordCheck {
        if stored.starts_with('$') {
            let Ok(parsed) = PasswordHash::new(stored) else {
                return PasswordCheck::Invalid;
            };
            return if self
                .argon2
                .verify_password(plaintext.as_bytes(), &parsed)
                .is_ok()
            {
                PasswordCheck::Valid
            } else {
                PasswordCheck::Invalid
            };
        }

        match stored.split_once(':') {
            Some((digest, salt)) if verify_legacy(plaintext, digest, salt) => {
                PasswordCheck::ValidLegacy
            }
            _ => PasswordCheck::Invalid,
        }
    }

    /// Burns one verification's worth of work against a throwaway record.
    ///
    /// Called when the account does not exist so the response time does not
    /// reveal whether an email is registered.
    pub fn verify_decoy(&self, plaintext: &str) {
        let decoy = self
            .decoy
            .get_or_init(|| self.hash("decoy-password").unwrap_or_default());
        let _ = self.check(plaintext, decoy);
    }
}

fn verify_legacy(plaintext: &str, digest_b64: &str, salt: &str) -> bool {
    if salt.is_empty() {
        return false;
    }

    let Ok(expected) = base64::engine::general_purpose::STANDARD.decode(digest_b64) else {
        return false;
    };

    let mut hasher = Sha256::new();
    hasher.update(plaintext.as_bytes());
    hasher.update(salt.as_bytes());
    let computed = hasher.finalize();

    computed.as_slice().ct_eq(&expected).into()
}
