//! Authentication and authorization module
//!
//! This module provides bearer-token authentication with the following components:
//! - Session token issuing and validation (HMAC-signed JWT)
//! - Password hashing with bcrypt
//! - Middleware for request authentication and ownership checks

pub mod jwt;
pub mod middleware;
pub mod password;

pub use jwt::{Claims, TokenError, TokenService};
pub use middleware::{auth_middleware, AuthError, AuthenticatedUser};
pub use password::{CredentialHasher, PasswordError};
