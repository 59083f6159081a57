//! Security audit logging for authentication events
//!
//! Every login, registration, password change, account deletion and
//! authorization failure is written at INFO under the `audit` target, so it can
//! be routed apart from application logs. Events never carry tokens, signing
//! keys or passwords.
//!
//! Author: hephaex@gmail.com

use axum::http::{header, HeaderMap};
use chrono::Utc;
use devbook_core::UserId;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Security audit events for authentication and authorization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AuditEvent {
    /// Successful user login
    LoginSuccess {
        user_id: UserId,
        email: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Failed login attempt
    LoginFailure {
        email: String,
        reason: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Successful user registration
    RegistrationSuccess {
        user_id: UserId,
        email: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Failed registration attempt
    RegistrationFailure {
        email: String,
        reason: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Password change
    PasswordChange {
        user_id: UserId,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Account removed by its owner
    AccountDeleted {
        user_id: UserId,
        ip_address: Option<String>,
    },

    /// Authenticated user tried to act on a resource it does not own
    AccessDenied {
        user_id: Option<UserId>,
        resource: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Missing, invalid or expired token
    InvalidToken {
        ip_address: Option<String>,
        user_agent: Option<String>,
        reason: String,
    },
}

impl AuditEvent {
    fn message(&self) -> &'static str {
        match self {
            AuditEvent::LoginSuccess { .. } => "Login successful",
            AuditEvent::LoginFailure { .. } => "Login failed",
            AuditEvent::RegistrationSuccess { .. } => "Registration successful",
            AuditEvent::RegistrationFailure { .. } => "Registration failed",
            AuditEvent::PasswordChange { .. } => "Password changed",
            AuditEvent::AccountDeleted { .. } => "Account deleted",
            AuditEvent::AccessDenied { .. } => "Access denied",
            AuditEvent::InvalidToken { .. } => "Invalid token",
        }
    }

    /// User the event is about, when one is known
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            AuditEvent::LoginSuccess { user_id, .. }
            | AuditEvent::RegistrationSuccess { user_id, .. }
            | AuditEvent::PasswordChange { user_id, .. }
            | AuditEvent::AccountDeleted { user_id, .. } => Some(*user_id),
            AuditEvent::AccessDenied { user_id, .. } => *user_id,
            AuditEvent::LoginFailure { .. }
            | AuditEvent::RegistrationFailure { .. }
            | AuditEvent::InvalidToken { .. } => None,
        }
    }

    pub fn ip_address(&self) -> Option<&str> {
        let ip = match self {
            AuditEvent::LoginSuccess { ip_address, .. }
            | AuditEvent::LoginFailure { ip_address, .. }
            | AuditEvent::RegistrationSuccess { ip_address, .. }
            | AuditEvent::RegistrationFailure { ip_address, .. }
            | AuditEvent::PasswordChange { ip_address, .. }
            | AuditEvent::AccountDeleted { ip_address, .. }
            | AuditEvent::AccessDenied { ip_address, .. }
            | AuditEvent::InvalidToken { ip_address, .. } => ip_address,
        };
        ip.as_deref()
    }
}

/// Log a security audit event with structured fields
///
/// `user_id` and `ip_address` are lifted into their own fields for filtering;
/// the whole event also goes out as JSON, e.g.:
///
/// ```json
/// {"event_type":"login_failure","email":"user@example.com","reason":"unknown email","ip_address":"192.168.1.1","user_agent":null}
/// ```
pub fn audit_log(event: &AuditEvent) {
    let event_json = serde_json::to_string(event)
        .unwrap_or_else(|e| format!("{{\"error\":\"unserializable audit event: {e}\"}}"));

    info!(
        target: "audit",
        timestamp = %Utc::now(),
        user_id = ?event.user_id(),
        ip_address = ?event.ip_address(),
        event = %event_json,
        "{}",
        event.message()
    );
}

/// Client address as reported by a proxy
///
/// The first hop of `X-Forwarded-For` wins over `X-Real-IP`.
pub fn extract_ip_address(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|chain| chain.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());

    forwarded
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .map(str::to_string)
}

pub fn extract_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::USER_AGENT)
        .and_then(|ua| ua.to_str().ok())
        .map(str::to_string)
}
