//! Request bodies accepted by the API and their validation rules.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Minimum accepted length for a new password.
pub const MIN_PASSWORD_LEN: usize = 8;

/// A request body failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError(pub String);

impl ValidationError {
    fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ValidationError {}

fn require(value: &str, message: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::new(message))
    } else {
        Ok(())
    }
}

fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.trim().is_empty())
}

/// Body of `POST /api/v1/courses`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateCourseRequest {
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: String,
}

impl CreateCourseRequest {
    /// Check required fields.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require(&self.name, "course name is required")?;
        require(&self.description, "course description is required")
    }
}

/// Body of `PUT /api/v1/courses/{id}`. Absent or blank fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCourseRequest {
    /// New display name.
    #[serde(default)]
    pub name: Option<String>,
    /// New description.
    #[serde(default)]
    pub description: Option<String>,
}

impl UpdateCourseRequest {
    /// Non-blank new name, if any.
    pub fn name(&self) -> Option<&str> {
        non_blank(self.name.as_ref())
    }

    /// Non-blank new description, if any.
    pub fn description(&self) -> Option<&str> {
        non_blank(self.description.as_ref())
    }
}

/// Body of `POST /api/v1/courses/{id}/chapters`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateChapterRequest {
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Position within the course, starting at 1.
    #[serde(default)]
    pub order: u32,
}

impl CreateChapterRequest {
    /// Check required fields.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require(&self.name, "chapter name is required")?;
        require(&self.description, "chapter description is required")?;
        if self.order == 0 {
            return Err(ValidationError::new("chapter order is required"));
        }
        Ok(())
    }
}

/// Body of `PUT .../chapters/{chapter_id}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateChapterRequest {
    /// New display name.
    #[serde(default)]
    pub name: Option<String>,
    /// New description.
    #[serde(default)]
    pub description: Option<String>,
    /// New position.
    #[serde(default)]
    pub order: Option<u32>,
}

impl UpdateChapterRequest {
    /// Reject an explicit zero order.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.order == Some(0) {
            return Err(ValidationError::new("chapter order must be at least 1"));
        }
        Ok(())
    }

    /// Non-blank new name, if any.
    pub fn name(&self) -> Option<&str> {
        non_blank(self.name.as_ref())
    }

    /// Non-blank new description, if any.
    pub fn description(&self) -> Option<&str> {
        non_blank(self.description.as_ref())
    }
}

/// Body of `POST .../chapters/{chapter_id}/lessons`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateLessonRequest {
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Short description.
    #[serde(default)]
    pub description: String,
    /// Lesson body.
    #[serde(default)]
    pub content: String,
    /// Position within the chapter, starting at 1.
    #[serde(default)]
    pub order: u32,
}

impl CreateLessonRequest {
    /// Check required fields.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require(&self.name, "lesson name is required")?;
        require(&self.description, "lesson description is required")?;
        require(&self.content, "lesson content is required")?;
        if self.order == 0 {
            return Err(ValidationError::new("lesson order is required"));
        }
        Ok(())
    }
}

/// Body of `PUT .../lessons/{lesson_id}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateLessonRequest {
    /// New display name.
    #[serde(default)]
    pub name: Option<String>,
    /// New description.
    #[serde(default)]
    pub description: Option<String>,
    /// New body.
    #[serde(default)]
    pub content: Option<String>,
    /// New position.
    #[serde(default)]
    pub order: Option<u32>,
}

impl UpdateLessonRequest {
    /// Reject an explicit zero order.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.order == Some(0) {
            return Err(ValidationError::new("lesson order must be at least 1"));
        }
        Ok(())
    }

    /// Non-blank new name, if any.
    pub fn name(&self) -> Option<&str> {
        non_blank(self.name.as_ref())
    }

    /// Non-blank new description, if any.
    pub fn description(&self) -> Option<&str> {
        non_blank(self.description.as_ref())
    }

    /// Non-blank new content, if any.
    pub fn content(&self) -> Option<&str> {
        non_blank(self.content.as_ref())
    }
}

/// Body of `POST /api/v1/auth/login`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginRequest {
    /// Identity provider username.
    #[serde(default)]
    pub username: String,
    /// Identity provider password.
    #[serde(default)]
    pub password: String,
}

impl LoginRequest {
    /// Check required fields.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require(&self.username, "username is required")?;
        if self.password.is_empty() {
            return Err(ValidationError::new("password is required"));
        }
        Ok(())
    }
}

/// Body of `POST /api/v1/auth/refresh`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefreshRequest {
    /// Refresh token from a previous login.
    #[serde(default)]
    pub refresh_token: String,
}

impl RefreshRequest {
    /// Check required fields.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require(&self.refresh_token, "refresh token is required")
    }
}

/// Token set returned by login and refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Bearer access token.
    pub access_token: String,
    /// Refresh token.
    #[serde(default)]
    pub refresh_token: String,
    /// Token type, normally `Bearer`.
    #[serde(default)]
    pub token_type: String,
    /// Access token lifetime in seconds.
    #[serde(default)]
    pub expires_in: u64,
}

/// Body of `PUT /api/v1/users/update`. Blank fields are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateUserRequest {
    /// New username.
    #[serde(default)]
    pub username: Option<String>,
    /// New email.
    #[serde(default)]
    pub email: Option<String>,
}

impl UpdateUserRequest {
    /// Non-blank new username, if any.
    pub fn username(&self) -> Option<&str> {
        non_blank(self.username.as_ref())
    }

    /// Non-blank new email, if any.
    pub fn email(&self) -> Option<&str> {
        non_blank(self.email.as_ref())
    }
}

/// Body of `PUT /api/v1/users/change-password`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangePasswordRequest {
    /// Password currently on record.
    #[serde(default)]
    pub current_password: String,
    /// Replacement password.
    #[serde(default)]
    pub new_password: String,
}

impl ChangePasswordRequest {
    /// Check required fields and the minimum length.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.current_password.is_empty() {
            return Err(ValidationError::new("current password is required"));
        }
        if self.new_password.is_empty() {
            return Err(ValidationError::new("new password is required"));
        }
        if self.new_password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ValidationError::new(
                "new password must be at least 8 characters",
            ));
        }
        Ok(())
    }
}

/// Body of `POST /api/v1/users/admin/create`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminCreateUserRequest {
    /// Username in both the identity provider and the local store.
    #[serde(default)]
    pub username: String,
    /// Email address.
    #[serde(default)]
    pub email: String,
    /// Initial password.
    #[serde(default)]
    pub password: String,
    /// Given name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    /// Family name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    /// Realm roles to grant.
    #[serde(default)]
    pub roles: Vec<String>,
}

impl AdminCreateUserRequest {
    /// Check required fields and the minimum password length.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require(&self.username, "username is required")?;
        require(&self.email, "email is required")?;
        if !self.email.contains('@') {
            return Err(ValidationError::new("email is invalid"));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ValidationError::new("password must be at least 8 characters"));
        }
        if self.roles.iter().any(|r| r.trim().is_empty()) {
            return Err(ValidationError::new("role names must not be empty"));
        }
        Ok(())
    }
}
