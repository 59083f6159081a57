//! DevBook Core - Domain models, configuration and storage traits
//!
//! This crate defines the pieces shared by the API server and the CLI:
//! - Application configuration (server, auth, logging)
//! - Common error types
//! - The `User` entity and the `UserStore` trait with an in-memory backend

pub mod config;
pub mod store;

pub use config::{AppConfig, AuthConfig, ConfigError, LoggingConfig, ServerConfig};
pub use store::{InMemoryUserStore, UserStore};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for DevBook operations
#[derive(Error, Debug)]
pub enum DevbookError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, DevbookError>;

// ============================================================================
// Users
// ============================================================================

/// Identifier of a user; also the subject carried by session tokens
pub type UserId = u64;

/// Registered user
///
/// The password hash is kept next to the profile but is never serialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub nick: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Data needed to create a user; the password must already be hashed
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub nick: String,
    pub email: String,
    pub password_hash: String,
}

/// Editable profile fields
#[derive(Debug, Clone)]
pub struct UserChanges {
    pub name: String,
    pub nick: String,
    pub email: String,
}
