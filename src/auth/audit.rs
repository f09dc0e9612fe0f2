//! Audit logging for authentication events.
//!
//! Every event is emitted via `tracing::info!` with a serialized `audit`
//! field, so the trail can be filtered out of the regular log stream.
//!
//! # Events
//!
//! | Event | When |
//! |-------|------|
//! | `auth.granted` | A request passed token validation |
//! | `auth.denied` | Token extraction, validation or introspection failed |
//! | `auth.forbidden` | A role gate rejected an authenticated user |
//! | `user.provisioned` | A local user was created for a new subject |
//! | `user.created` | An administrator created a user at the provider |

use serde::Serialize;

use course_core::{Id, User};

use super::Claims;

/// Structured audit record.
#[derive(Debug, Serialize)]
pub struct AuditEvent {
    /// Event type string (e.g., `"auth.granted"`).
    pub event: &'static str,
    /// Provider subject, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Login name, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Local user id, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Id>,
    /// Request path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Reason for denial events, or the role involved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AuditEvent {
    fn new(event: &'static str) -> Self {
        Self {
            event,
            subject: None,
            username: None,
            user_id: None,
            path: None,
            reason: None,
        }
    }

    /// Construct an `auth.granted` event.
    #[must_use]
    pub fn granted(claims: &Claims, user: Option<&User>, path: &str) -> Self {
        Self {
            subject: Some(claims.sub.clone()),
            username: Some(claims.preferred_username.clone()),
            user_id: user.map(|u| u.id),
            path: Some(path.to_string()),
            ..Self::new("auth.granted")
        }
    }

    /// Construct an `auth.denied` event.
    #[must_use]
    pub fn denied(reason: impl Into<String>, path: &str) -> Self {
        Self {
            path: Some(path.to_string()),
            reason: Some(reason.into()),
            ..Self::new("auth.denied")
        }
    }

    /// Construct an `auth.forbidden` event for a missing role.
    #[must_use]
    pub fn forbidden(claims: &Claims, required: &str, path: &str) -> Self {
        Self {
            subject: Some(claims.sub.clone()),
            username: Some(claims.preferred_username.clone()),
            path: Some(path.to_string()),
            reason: Some(format!("missing role {required}")),
            ..Self::new("auth.forbidden")
        }
    }

    /// Construct a `user.provisioned` event.
    #[must_use]
    pub fn provisioned(user: &User) -> Self {
        Self {
            subject: user.sub.clone(),
            username: Some(user.username.clone()),
            user_id: Some(user.id),
            ..Self::new("user.provisioned")
        }
    }

    /// Construct a `user.created` event.
    #[must_use]
    pub fn created(user: &User, by: &str) -> Self {
        Self {
            subject: user.sub.clone(),
            username: Some(user.username.clone()),
            user_id: Some(user.id),
            reason: Some(format!("created by {by}")),
            ..Self::new("user.created")
        }
    }

    /// Emit via `tracing::info!`.
    pub fn emit(&self) {
        match serde_json::to_string(self) {
            Ok(json) => tracing::info!(audit = %json, event = self.event, "audit"),
            Err(e) => tracing::warn!(error = %e, event = self.event, "Failed to serialize audit event"),
        }
    }
}
