use argon2::{
    Argon2,
    password_hash::{
        PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString,
    },
};
use rand::thread_rng;

use super::AuthError;

pub trait PasswordHasher: Send + Sync {
    fn hash(&self, password: &str) -> Result<String, AuthError>;

    /// Never fails: an unparseable stored hash simply does not verify.
    fn verify(&self, password: &str, hash: &str) -> bool;
}

/// Argon2id with the crate defaults and a fresh salt per call.
#[derive(Clone, Default)]
pub struct Argon2Hasher {
    argon2: Argon2<'static>,
}

impl Argon2Hasher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut thread_rng());
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|err| AuthError::Hashing(err.to_string()))?
            .to_string();
        Ok(hash)
    }

    fn verify(&self, password: &str, hash: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(hash) else {
            tracing::warn!("stored password hash is not a valid PHC string");
            return false;
        };

        self.argon2
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::{Argon2Hasher, PasswordHasher};

    #[test]
    fn verifies_hash_of_same_password() {
        let hasher = Argon2Hasher::new();
        let hash = hasher.hash("correct-horse").expect("hash should succeed");

        assert!(hasher.verify("correct-horse", &hash));
        assert!(!hasher.verify("battery-staple", &hash));
    }

    #[test]
    fn salts_every_hash() {
        let hasher = Argon2Hasher::new();
        let first = hasher.hash("correct-horse").expect("hash should succeed");
        let second = hasher.hash("correct-horse").expect("hash should succeed");

        assert_ne!(first, second);
        assert!(hasher.verify("correct-horse", &first));
        assert!(hasher.verify("correct-horse", &second));
    }

    #[test]
    fn malformed_hash_does_not_verify() {
        let hasher = Argon2Hasher::new();

        assert!(!hasher.verify("correct-horse", "not-a-valid-hash"));
        assert!(!hasher.verify("correct-horse", ""));
    }
}
