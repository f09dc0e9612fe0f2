//! Persistence seams.
//!
//! The auth core depends only on [`UserStore`]; catalogue services use
//! [`CatalogStore`]. Both are object-safe async traits so a relational
//! backend can replace [`MemoryStore`] without touching callers.

mod memory;

pub use memory::MemoryStore;

use course_core::{
    Attachment, Chapter, ChapterSummary, Course, CourseSummary, Id, Lesson, NewUser, User,
    request::{
        CreateChapterRequest, CreateCourseRequest, CreateLessonRequest, UpdateChapterRequest,
        UpdateCourseRequest, UpdateLessonRequest,
    },
};

/// Persistence failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The addressed row does not exist (or not under the given parent).
    #[error("{0}")]
    NotFound(&'static str),

    /// A uniqueness constraint was violated.
    #[error("{0}")]
    Conflict(String),

    /// The backend failed.
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Conflict message for a second attachment with the same file name in a lesson.
pub(crate) const ATTACHMENT_EXISTS: &str = "attachment with this file name already exists";

/// Result alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Local user records. `sub`, `username` and `email` are unique.
#[async_trait::async_trait]
pub trait UserStore: Send + Sync + 'static {
    /// User linked to provider subject `sub`.
    async fn find_by_sub(&self, sub: &str) -> StoreResult<Option<User>>;

    /// User by local id.
    async fn find_by_id(&self, id: Id) -> StoreResult<Option<User>>;

    /// User by username.
    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>>;

    /// User by email.
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Insert a user; [`StoreError::Conflict`] on a duplicate `sub`, username or email.
    async fn create(&self, user: NewUser) -> StoreResult<User>;

    /// Change username and/or email.
    async fn update_profile(
        &self,
        id: Id,
        username: Option<&str>,
        email: Option<&str>,
    ) -> StoreResult<User>;

    /// Replace the password hash.
    async fn update_password(&self, id: Id, password_hash: String) -> StoreResult<()>;
}

/// Courses, chapters, lessons and attachment records.
///
/// Every child lookup matches the full parent path: a chapter is found
/// only under its own course, a lesson only under its own chapter and
/// course. Deletes cascade down the hierarchy and return the attachment
/// records removed so their objects can be deleted too.
#[async_trait::async_trait]
pub trait CatalogStore: Send + Sync + 'static {
    /// All courses with chapter counts, by id.
    async fn list_courses(&self) -> StoreResult<Vec<CourseSummary>>;
    /// One course with its chapter count.
    async fn get_course(&self, id: Id) -> StoreResult<CourseSummary>;
    /// Insert a course.
    async fn create_course(
        &self,
        req: &CreateCourseRequest,
        created_by: Option<Id>,
    ) -> StoreResult<Course>;
    /// Apply non-blank fields.
    async fn update_course(&self, id: Id, req: &UpdateCourseRequest) -> StoreResult<Course>;
    /// Remove a course and everything below it.
    async fn delete_course(&self, id: Id) -> StoreResult<Vec<Attachment>>;

    /// Chapters of a course with lesson counts, by `order`.
    async fn list_chapters(&self, course_id: Id) -> StoreResult<Vec<ChapterSummary>>;
    /// One chapter of a course.
    async fn get_chapter(&self, course_id: Id, chapter_id: Id) -> StoreResult<ChapterSummary>;
    /// Insert a chapter under an existing course.
    async fn create_chapter(
        &self,
        course_id: Id,
        req: &CreateChapterRequest,
        created_by: Option<Id>,
    ) -> StoreResult<Chapter>;
    /// Apply non-blank fields.
    async fn update_chapter(
        &self,
        course_id: Id,
        chapter_id: Id,
        req: &UpdateChapterRequest,
    ) -> StoreResult<Chapter>;
    /// Remove a chapter and everything below it.
    async fn delete_chapter(&self, course_id: Id, chapter_id: Id) -> StoreResult<Vec<Attachment>>;

    /// Lessons of a chapter, by `order`.
    async fn list_lessons(&self, course_id: Id, chapter_id: Id) -> StoreResult<Vec<Lesson>>;
    /// One lesson.
    async fn get_lesson(&self, course_id: Id, chapter_id: Id, lesson_id: Id)
    -> StoreResult<Lesson>;
    /// Insert a lesson under an existing chapter.
    async fn create_lesson(
        &self,
        course_id: Id,
        chapter_id: Id,
        req: &CreateLessonRequest,
        created_by: Option<Id>,
    ) -> StoreResult<Lesson>;
    /// Apply non-blank fields.
    async fn update_lesson(
        &self,
        course_id: Id,
        chapter_id: Id,
        lesson_id: Id,
        req: &UpdateLessonRequest,
    ) -> StoreResult<Lesson>;
    /// Remove a lesson and its attachment records.
    async fn delete_lesson(
        &self,
        course_id: Id,
        chapter_id: Id,
        lesson_id: Id,
    ) -> StoreResult<Vec<Attachment>>;

    /// Attachment records of a lesson, by id.
    async fn list_attachments(&self, lesson: LessonPath) -> StoreResult<Vec<Attachment>>;
    /// One attachment record.
    async fn get_attachment(&self, lesson: LessonPath, attachment_id: Id)
    -> StoreResult<Attachment>;
    /// Insert an attachment record; [`StoreError::Conflict`] if the lesson
    /// already has one with the same file name.
    async fn create_attachment(
        &self,
        lesson: LessonPath,
        attachment: NewAttachment,
    ) -> StoreResult<Attachment>;
    /// Remove an attachment record and return it.
    async fn delete_attachment(
        &self,
        lesson: LessonPath,
        attachment_id: Id,
    ) -> StoreResult<Attachment>;
}

/// Full path to a lesson.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LessonPath {
    /// Course id.
    pub course_id: Id,
    /// Chapter id.
    pub chapter_id: Id,
    /// Lesson id.
    pub lesson_id: Id,
}

/// Fields for a new attachment record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAttachment {
    /// Original file name.
    pub filename: String,
    /// MIME type.
    pub file_type: String,
    /// Size in bytes.
    pub file_size: u64,
    /// Object store key.
    pub object_name: String,
}
