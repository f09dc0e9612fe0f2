//! Persistent entities and the response envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Numeric row identifier.
pub type Id = u64;

/// Role assigned to users whose token carries no realm roles.
pub const DEFAULT_ROLE: &str = "ROLE_USER";

/// A local user record.
///
/// Users authenticated by the identity provider are linked through `sub`;
/// their `password_hash` holds a hash of random filler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Local identifier.
    pub id: Id,
    /// Unique login name.
    pub username: String,
    /// Unique email address.
    pub email: String,
    /// PHC-formatted password hash. Never serialized.
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    /// Comma-joined role names.
    pub roles: String,
    /// Identity provider subject, unique when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Iterate the individual role names of the comma-joined role string.
    pub fn role_names(&self) -> impl Iterator<Item = &str> {
        self.roles
            .split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
    }
}

/// Fields needed to insert a [`User`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    /// Login name.
    pub username: String,
    /// Email address.
    pub email: String,
    /// PHC-formatted password hash.
    pub password_hash: String,
    /// Comma-joined role names.
    pub roles: String,
    /// Identity provider subject.
    pub sub: Option<String>,
}

/// A course, the root of the catalogue hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    /// Identifier.
    pub id: Id,
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Local user who created the course, if still known.
    pub created_by: Option<Id>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

/// A course together with its chapter count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseSummary {
    /// The course row.
    #[serde(flatten)]
    pub course: Course,
    /// Number of chapters in the course.
    pub chapters_count: usize,
}

/// A chapter inside a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    /// Identifier.
    pub id: Id,
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Position within the course, starting at 1.
    pub order: u32,
    /// Owning course.
    pub course_id: Id,
    /// Local user who created the chapter, if still known.
    pub created_by: Option<Id>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

/// A chapter together with its lesson count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterSummary {
    /// The chapter row.
    #[serde(flatten)]
    pub chapter: Chapter,
    /// Number of lessons in the chapter.
    pub lessons_count: usize,
}

/// A lesson inside a chapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    /// Identifier.
    pub id: Id,
    /// Display name.
    pub name: String,
    /// Short description.
    pub description: String,
    /// Lesson body.
    pub content: String,
    /// Position within the chapter, starting at 1.
    pub order: u32,
    /// Owning chapter.
    pub chapter_id: Id,
    /// Local user who created the lesson, if still known.
    pub created_by: Option<Id>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

/// Metadata for a file attached to a lesson.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Identifier.
    pub id: Id,
    /// Original file name.
    pub filename: String,
    /// MIME type reported at upload.
    pub file_type: String,
    /// Size in bytes.
    pub file_size: u64,
    /// Key of the object in the object store.
    pub object_name: String,
    /// Owning lesson.
    pub lesson_id: Id,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

/// JSON envelope wrapping every API response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// `true` when the request failed.
    pub error: bool,
    /// Human-readable outcome.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Response payload.
    #[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    /// A successful envelope carrying `data`.
    pub fn success(data: T, message: impl Into<String>) -> Self {
        Self {
            error: false,
            message: Some(message.into()),
            data: Some(data),
        }
    }
}

impl Envelope<()> {
    /// A successful envelope without payload.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            error: false,
            message: Some(message.into()),
            data: None,
        }
    }

    /// A failure envelope.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            error: true,
            message: Some(message.into()),
            data: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(roles: &str) -> User {
        User {
            id: 1,
            username: "ada".to_string(),
            email: "ada@example.com".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            roles: roles.to_string(),
            sub: Some("abc-123".to_string()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn role_names_splits_and_trims() {
        let u = user("teacher, admin,,");
        assert_eq!(u.role_names().collect::<Vec<_>>(), vec!["teacher", "admin"]);
    }

    #[test]
    fn user_serialization_hides_password_hash() {
        let json = serde_json::to_value(user("ROLE_USER")).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["sub"], "abc-123");
    }

    #[test]
    fn failure_envelope_omits_data() {
        let json = serde_json::to_value(Envelope::failure("course not found")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"error": true, "message": "course not found"})
        );
    }

    #[test]
    fn course_summary_flattens_course_fields() {
        let now = Utc::now();
        let summary = CourseSummary {
            course: Course {
                id: 7,
                name: "Rust".to_string(),
                description: "Ownership".to_string(),
                created_by: None,
                created_at: now,
                updated_at: now,
            },
            chapters_count: 3,
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["chapters_count"], 3);
        assert!(json["created_by"].is_null());
    }
}
