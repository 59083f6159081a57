//! Application state management
//!
//! Author: hephaex@gmail.com

use crate::auth::jwt::TokenService;
use crate::auth::password::{CredentialHasher, PasswordError};
use devbook_core::config::AppConfig;
use devbook_core::UserStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Semaphore, SemaphorePermit};

/// Plaintext behind the stand-in hash used when a login names no known user
const DUMMY_PASSWORD: &str = "devbook-unknown-user";

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Session token issuer/validator
    pub tokens: TokenService,
    /// Password hasher
    pub hasher: CredentialHasher,
    /// User storage backend
    pub users: Arc<dyn UserStore>,
    /// Bounds the number of bcrypt computations in flight
    hash_permits: Semaphore,
    /// Hash at the configured cost, verified against when there is no stored hash
    dummy_hash: String,
    /// Server start time
    pub start_time: Instant,
    /// Ready status
    pub is_ready: AtomicBool,
}

impl AppState {
    /// Create new application state
    ///
    /// The configuration is expected to be validated already; an empty
    /// signing key is the caller's startup error. The state starts out not
    /// ready; the server flips it once it is listening.
    pub fn new(config: AppConfig, users: Arc<dyn UserStore>) -> Self {
        let tokens = TokenService::new(&config.auth);
        let hasher = CredentialHasher::with_cost(config.auth.bcrypt_cost);
        let hash_permits = Semaphore::new(config.auth.max_concurrent_hashes.max(1));
        // An invalid cost fails every hash anyway; verification then fails fast
        let dummy_hash = hasher.hash(DUMMY_PASSWORD).unwrap_or_default();

        Self {
            config,
            tokens,
            hasher,
            users,
            hash_permits,
            dummy_hash,
            start_time: Instant::now(),
            is_ready: AtomicBool::new(false),
        }
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Check if service is ready
    pub fn is_ready(&self) -> bool {
        self.is_ready.load(Ordering::SeqCst)
    }

    /// Set ready status
    pub fn set_ready(&self, ready: bool) {
        self.is_ready.store(ready, Ordering::SeqCst);
    }

    /// Wait for one of the bcrypt slots
    pub(crate) async fn acquire_hash_slot(&self) -> Result<SemaphorePermit<'_>, PasswordError> {
        self.hash_permits
            .acquire()
            .await
            .map_err(|_| PasswordError::HashingFailed("hash queue closed".to_string()))
    }

    /// Hash a password off the async workers, waiting for a free slot first
    pub async fn hash_password(&self, plaintext: String) -> Result<String, PasswordError> {
        let _permit = self.acquire_hash_slot().await?;
        self.hasher.hash_blocking_task(plaintext).await
    }

    /// Verify a password off the async workers, waiting for a free slot first
    pub async fn verify_password(
        &self,
        plaintext: String,
        encoded: String,
    ) -> Result<(), PasswordError> {
        let _permit = self.acquire_hash_slot().await?;
        self.hasher.verify_blocking_task(plaintext, encoded).await
    }

    /// Spend the work of one verification without a stored hash
    ///
    /// Always ends in `HashMismatch`, after the same bcrypt cost a real
    /// mismatch pays.
    pub async fn verify_unknown_user(&self, plaintext: String) -> PasswordError {
        match self.verify_password(plaintext, self.dummy_hash.clone()).await {
            Err(e) => e,
            Ok(()) => PasswordError::HashMismatch,
        }
    }

    /// Number of hash slots currently free
    pub fn available_hash_permits(&self) -> usize {
        self.hash_permits.available_permits()
    }

    /// State with a fixed signing key, the cheapest bcrypt cost and an empty
    /// in-memory store
    #[cfg(any(test, feature = "test-utils"))]
    pub fn for_testing() -> Self {
        let mut config = AppConfig::default();
        config.auth.secret_key = "test-secret-key".to_string();
        config.auth.bcrypt_cost = 4;

        let state = Self::new(config, Arc::new(devbook_core::InMemoryUserStore::new()));
        state.set_ready(true);
        state
    }
}
