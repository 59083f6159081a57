//! Password hashing and verification using bcrypt
//!
//! - Algorithm: bcrypt (`$2b$`), adaptive cost
//! - Default cost: 10
//! - Salt: 16 bytes random, fresh for every hash
//! - Maximum input: 72 bytes; longer passwords are refused, never truncated
//!
//! The encoded hash embeds cost and salt, so no separate storage is needed.
//! Hashing is CPU-bound; async callers should go through
//! [`CredentialHasher::hash_blocking_task`] and
//! [`CredentialHasher::verify_blocking_task`].

use thiserror::Error;

/// Work factor used when none is configured
pub const DEFAULT_COST: u32 = 10;

/// bcrypt only reads this many bytes of input
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Password hashing and verification errors
#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    HashingFailed(String),

    #[error("Password does not match")]
    HashMismatch,
}

/// Salted one-way password hashing
#[derive(Debug, Clone, Copy)]
pub struct CredentialHasher {
    cost: u32,
}

impl Default for CredentialHasher {
    fn default() -> Self {
        Self::with_cost(DEFAULT_COST)
    }
}

impl CredentialHasher {
    /// Hasher using the given bcrypt cost
    ///
    /// The cost is not checked here; an out-of-range cost makes [`hash`]
    /// fail with `HashingFailed`.
    ///
    /// [`hash`]: CredentialHasher::hash
    pub fn with_cost(cost: u32) -> Self {
        Self { cost }
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Hash a plaintext password
    ///
    /// # Returns
    ///
    /// * `Ok(String)` - bcrypt string, e.g. `$2b$10$...`
    /// * `Err(PasswordError::HashingFailed)` - input longer than 72 bytes or invalid cost
    ///
    /// # Example
    ///
    /// ```no_run
    /// use devbook_api::auth::password::CredentialHasher;
    ///
    /// let hasher = CredentialHasher::default();
    /// let hash = hasher.hash("SecureP@ssw0rd!").expect("Failed to hash password");
    /// assert!(hasher.verify("SecureP@ssw0rd!", &hash).is_ok());
    /// ```
    pub fn hash(&self, plaintext: &str) -> Result<String, PasswordError> {
        if plaintext.len() > MAX_PASSWORD_BYTES {
            return Err(PasswordError::HashingFailed(format!(
                "password exceeds {MAX_PASSWORD_BYTES} bytes"
            )));
        }

        bcrypt::hash(plaintext, self.cost).map_err(|e| PasswordError::HashingFailed(e.to_string()))
    }

    /// Verify a plaintext password against a stored hash
    ///
    /// Cost and salt are read from `encoded`. The digest comparison is
    /// constant-time. A wrong password, a malformed hash and an over-long
    /// candidate all produce the same `HashMismatch`.
    pub fn verify(&self, plaintext: &str, encoded: &str) -> Result<(), PasswordError> {
        if plaintext.len() > MAX_PASSWORD_BYTES {
            return Err(PasswordError::HashMismatch);
        }

        match bcrypt::verify(plaintext, encoded) {
            Ok(true) => Ok(()),
            Ok(false) | Err(_) => Err(PasswordError::HashMismatch),
        }
    }

    /// [`hash`](CredentialHasher::hash) on the blocking thread pool
    pub async fn hash_blocking_task(&self, plaintext: String) -> Result<String, PasswordError> {
        let hasher = *self;
        tokio::task::spawn_blocking(move || hasher.hash(&plaintext))
            .await
            .map_err(|e| PasswordError::HashingFailed(format!("hashing task failed: {e}")))?
    }

    /// [`verify`](CredentialHasher::verify) on the blocking thread pool
    pub async fn verify_blocking_task(
        &self,
        plaintext: String,
        encoded: String,
    ) -> Result<(), PasswordError> {
        let hasher = *self;
        tokio::task::spawn_blocking(move || hasher.verify(&plaintext, &encoded))
            .await
            .map_err(|e| PasswordError::HashingFailed(format!("verification task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // Lowest cost bcrypt accepts; keeps the suite fast
    fn hasher() -> CredentialHasher {
        CredentialHasher::with_cost(4)
    }

    #[test]
    fn test_hash_and_verify_password() {
        let password = "SecureP@ssw0rd!";
        let hash = hasher().hash(password).expect("Failed to hash password");

        assert!(hash.starts_with("$2"));
        assert!(hasher().verify(password, &hash).is_ok());
        assert!(matches!(
            hasher().verify("WrongPassword", &hash),
            Err(PasswordError::HashMismatch)
        ));
    }

    #[test]
    fn test_same_password_produces_different_hashes() {
        // Due to random salt, same password should produce different hashes
        let password = "SamePassword123!";

        let hash1 = hasher().hash(password).unwrap();
        let hash2 = hasher().hash(password).unwrap();

        assert_ne!(hash1, hash2);

        // But both should verify correctly
        assert!(hasher().verify(password, &hash1).is_ok());
        assert!(hasher().verify(password, &hash2).is_ok());
    }

    #[test]
    fn test_cost_is_embedded() {
        let hash = CredentialHasher::with_cost(5).hash("pw").unwrap();
        assert!(hash.contains("$05$"));

        // Verification reads the cost from the hash, not from the hasher
        assert!(CredentialHasher::default().verify("pw", &hash).is_ok());
    }

    #[test]
    fn test_malformed_hash_is_a_plain_mismatch() {
        for stored in ["", "invalid-hash-format", "$2b$10$short", "$argon2id$v=19$m=65536"] {
            assert!(matches!(
                hasher().verify("password", stored),
                Err(PasswordError::HashMismatch)
            ));
        }
    }

    #[test]
    fn test_password_length_limit() {
        let at_limit = "a".repeat(MAX_PASSWORD_BYTES);
        let over_limit = "a".repeat(MAX_PASSWORD_BYTES + 1);

        let hash = hasher().hash(&at_limit).unwrap();
        assert!(hasher().verify(&at_limit, &hash).is_ok());

        assert!(matches!(
            hasher().hash(&over_limit),
            Err(PasswordError::HashingFailed(_))
        ));
        // A longer candidate must not match by truncation
        assert!(matches!(
            hasher().verify(&over_limit, &hash),
            Err(PasswordError::HashMismatch)
        ));
    }

    #[test]
    fn test_invalid_cost() {
        for cost in [0, 3, 32] {
            assert!(matches!(
                CredentialHasher::with_cost(cost).hash("password"),
                Err(PasswordError::HashingFailed(_))
            ));
        }
    }

    #[test]
    fn test_empty_password_roundtrip() {
        let hash = hasher().hash("").unwrap();
        assert!(hasher().verify("", &hash).is_ok());
        assert!(hasher().verify(" ", &hash).is_err());
    }

    #[tokio::test]
    async fn test_blocking_task_helpers() {
        let hash = hasher()
            .hash_blocking_task("offloaded".to_string())
            .await
            .unwrap();

        assert!(hasher()
            .verify_blocking_task("offloaded".to_string(), hash.clone())
            .await
            .is_ok());
        assert!(hasher()
            .verify_blocking_task("other".to_string(), hash)
            .await
            .is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(8))]

        #[test]
        fn prop_verify_only_accepts_original(p in "[ -~]{0,40}", q in "[ -~]{0,40}") {
            let hash = hasher().hash(&p).unwrap();
            prop_assert!(hasher().verify(&p, &hash).is_ok());
            if p != q {
                prop_assert!(hasher().verify(&q, &hash).is_err());
            }
        }
    }
}
