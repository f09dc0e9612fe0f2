//! In-memory store.
//!
//! All tables sit behind one lock, so uniqueness checks and cascading
//! deletes are atomic with respect to each other.

use std::collections::BTreeMap;

use chrono::Utc;
use course_core::{
    Attachment, Chapter, ChapterSummary, Course, CourseSummary, Id, Lesson, NewUser, User,
    request::{
        CreateChapterRequest, CreateCourseRequest, CreateLessonRequest, UpdateChapterRequest,
        UpdateCourseRequest, UpdateLessonRequest,
    },
};
use parking_lot::RwLock;

use super::{
    ATTACHMENT_EXISTS, CatalogStore, LessonPath, NewAttachment, StoreError, StoreResult, UserStore,
};

const COURSE_NOT_FOUND: StoreError = StoreError::NotFound("course not found");
const CHAPTER_NOT_FOUND: StoreError = StoreError::NotFound("chapter not found");
const LESSON_NOT_FOUND: StoreError = StoreError::NotFound("lesson not found");
const ATTACHMENT_NOT_FOUND: StoreError = StoreError::NotFound("attachment not found");
const USER_NOT_FOUND: StoreError = StoreError::NotFound("user not found");

#[derive(Default)]
struct Tables {
    next_id: Id,
    users: BTreeMap<Id, User>,
    courses: BTreeMap<Id, Course>,
    chapters: BTreeMap<Id, Chapter>,
    lessons: BTreeMap<Id, Lesson>,
    attachments: BTreeMap<Id, Attachment>,
}

impl Tables {
    fn allocate_id(&mut self) -> Id {
        self.next_id += 1;
        self.next_id
    }

    fn check_user_unique(
        &self,
        except: Option<Id>,
        username: Option<&str>,
        email: Option<&str>,
        sub: Option<&str>,
    ) -> StoreResult<()> {
        for user in self.users.values().filter(|u| Some(u.id) != except) {
            if sub.is_some() && user.sub.as_deref() == sub {
                return Err(StoreError::Conflict("subject already linked".to_string()));
            }
            if username == Some(user.username.as_str()) {
                return Err(StoreError::Conflict("username already exists".to_string()));
            }
            if email == Some(user.email.as_str()) {
                return Err(StoreError::Conflict("email already exists".to_string()));
            }
        }
        Ok(())
    }

    fn course(&self, course_id: Id) -> StoreResult<&Course> {
        self.courses.get(&course_id).ok_or(COURSE_NOT_FOUND)
    }

    fn chapter(&self, course_id: Id, chapter_id: Id) -> StoreResult<&Chapter> {
        self.chapters
            .get(&chapter_id)
            .filter(|c| c.course_id == course_id)
            .ok_or(CHAPTER_NOT_FOUND)
    }

    fn lesson(&self, course_id: Id, chapter_id: Id, lesson_id: Id) -> StoreResult<&Lesson> {
        self.chapter(course_id, chapter_id).map_err(|_| LESSON_NOT_FOUND)?;
        self.lessons
            .get(&lesson_id)
            .filter(|l| l.chapter_id == chapter_id)
            .ok_or(LESSON_NOT_FOUND)
    }

    fn attachment(&self, path: LessonPath, attachment_id: Id) -> StoreResult<&Attachment> {
        self.lesson(path.course_id, path.chapter_id, path.lesson_id)
            .map_err(|_| ATTACHMENT_NOT_FOUND)?;
        self.attachments
            .get(&attachment_id)
            .filter(|a| a.lesson_id == path.lesson_id)
            .ok_or(ATTACHMENT_NOT_FOUND)
    }

    fn chapters_count(&self, course_id: Id) -> usize {
        self.chapters.values().filter(|c| c.course_id == course_id).count()
    }

    fn lessons_count(&self, chapter_id: Id) -> usize {
        self.lessons.values().filter(|l| l.chapter_id == chapter_id).count()
    }

    fn remove_lessons(&mut self, lesson_ids: &[Id]) -> Vec<Attachment> {
        for id in lesson_ids {
            self.lessons.remove(id);
        }
        let attachment_ids: Vec<Id> = self
            .attachments
            .values()
            .filter(|a| lesson_ids.contains(&a.lesson_id))
            .map(|a| a.id)
            .collect();
        attachment_ids
            .iter()
            .filter_map(|id| self.attachments.remove(id))
            .collect()
    }

    fn remove_chapters(&mut self, chapter_ids: &[Id]) -> Vec<Attachment> {
        for id in chapter_ids {
            self.chapters.remove(id);
        }
        let lesson_ids: Vec<Id> = self
            .lessons
            .values()
            .filter(|l| chapter_ids.contains(&l.chapter_id))
            .map(|l| l.id)
            .collect();
        self.remove_lessons(&lesson_ids)
    }
}

/// Store keeping every table in process memory.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of local users.
    #[must_use]
    pub fn user_count(&self) -> usize {
        self.tables.read().users.len()
    }
}

#[async_trait::async_trait]
impl UserStore for MemoryStore {
    async fn find_by_sub(&self, sub: &str) -> StoreResult<Option<User>> {
        Ok(self
            .tables
            .read()
            .users
            .values()
            .find(|u| u.sub.as_deref() == Some(sub))
            .cloned())
    }

    async fn find_by_id(&self, id: Id) -> StoreResult<Option<User>> {
        Ok(self.tables.read().users.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(self
            .tables
            .read()
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self
            .tables
            .read()
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn create(&self, user: NewUser) -> StoreResult<User> {
        let mut tables = self.tables.write();
        tables.check_user_unique(
            None,
            Some(&user.username),
            Some(&user.email),
            user.sub.as_deref(),
        )?;

        let now = Utc::now();
        let id = tables.allocate_id();
        let row = User {
            id,
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            roles: user.roles,
            sub: user.sub,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(id, row.clone());
        Ok(row)
    }

    async fn update_profile(
        &self,
        id: Id,
        username: Option<&str>,
        email: Option<&str>,
    ) -> StoreResult<User> {
        let mut tables = self.tables.write();
        if !tables.users.contains_key(&id) {
            return Err(USER_NOT_FOUND);
        }
        tables.check_user_unique(Some(id), username, email, None)?;

        let user = tables.users.get_mut(&id).ok_or(USER_NOT_FOUND)?;
        if let Some(username) = username {
            user.username = username.to_string();
        }
        if let Some(email) = email {
            user.email = email.to_string();
        }
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn update_password(&self, id: Id, password_hash: String) -> StoreResult<()> {
        let mut tables = self.tables.write();
        let user = tables.users.get_mut(&id).ok_or(USER_NOT_FOUND)?;
        user.password_hash = password_hash;
        user.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait::async_trait]
impl CatalogStore for MemoryStore {
    async fn list_courses(&self) -> StoreResult<Vec<CourseSummary>> {
        let tables = self.tables.read();
        Ok(tables
            .courses
            .values()
            .map(|course| CourseSummary {
                course: course.clone(),
                chapters_count: tables.chapters_count(course.id),
            })
            .collect())
    }

    async fn get_course(&self, id: Id) -> StoreResult<CourseSummary> {
        let tables = self.tables.read();
        let course = tables.course(id)?.clone();
        Ok(CourseSummary {
            chapters_count: tables.chapters_count(id),
            course,
        })
    }

    async fn create_course(
        &self,
        req: &CreateCourseRequest,
        created_by: Option<Id>,
    ) -> StoreResult<Course> {
        let mut tables = self.tables.write();
        let now = Utc::now();
        let id = tables.allocate_id();
        let course = Course {
            id,
            name: req.name.trim().to_string(),
            description: req.description.trim().to_string(),
            created_by,
            created_at: now,
            updated_at: now,
        };
        tables.courses.insert(id, course.clone());
        Ok(course)
    }

    async fn update_course(&self, id: Id, req: &UpdateCourseRequest) -> StoreResult<Course> {
        let mut tables = self.tables.write();
        let course = tables.courses.get_mut(&id).ok_or(COURSE_NOT_FOUND)?;
        if let Some(name) = req.name() {
            course.name = name.trim().to_string();
        }
        if let Some(description) = req.description() {
            course.description = description.trim().to_string();
        }
        course.updated_at = Utc::now();
        Ok(course.clone())
    }

    async fn delete_course(&self, id: Id) -> StoreResult<Vec<Attachment>> {
        let mut tables = self.tables.write();
        tables.courses.remove(&id).ok_or(COURSE_NOT_FOUND)?;
        let chapter_ids: Vec<Id> = tables
            .chapters
            .values()
            .filter(|c| c.course_id == id)
            .map(|c| c.id)
            .collect();
        Ok(tables.remove_chapters(&chapter_ids))
    }

    async fn list_chapters(&self, course_id: Id) -> StoreResult<Vec<ChapterSummary>> {
        let tables = self.tables.read();
        tables.course(course_id)?;
        let mut chapters: Vec<ChapterSummary> = tables
            .chapters
            .values()
            .filter(|c| c.course_id == course_id)
            .map(|chapter| ChapterSummary {
                lessons_count: tables.lessons_count(chapter.id),
                chapter: chapter.clone(),
            })
            .collect();
        chapters.sort_by_key(|c| (c.chapter.order, c.chapter.id));
        Ok(chapters)
    }

    async fn get_chapter(&self, course_id: Id, chapter_id: Id) -> StoreResult<ChapterSummary> {
        let tables = self.tables.read();
        let chapter = tables.chapter(course_id, chapter_id)?.clone();
        Ok(ChapterSummary {
            lessons_count: tables.lessons_count(chapter_id),
            chapter,
        })
    }

    async fn create_chapter(
        &self,
        course_id: Id,
        req: &CreateChapterRequest,
        created_by: Option<Id>,
    ) -> StoreResult<Chapter> {
        let mut tables = self.tables.write();
        tables.course(course_id)?;
        let now = Utc::now();
        let id = tables.allocate_id();
        let chapter = Chapter {
            id,
            name: req.name.trim().to_string(),
            description: req.description.trim().to_string(),
            order: req.order,
            course_id,
            created_by,
            created_at: now,
            updated_at: now,
        };
        tables.chapters.insert(id, chapter.clone());
        Ok(chapter)
    }

    async fn update_chapter(
        &self,
        course_id: Id,
        chapter_id: Id,
        req: &UpdateChapterRequest,
    ) -> StoreResult<Chapter> {
        let mut tables = self.tables.write();
        tables.chapter(course_id, chapter_id)?;
        let chapter = tables.chapters.get_mut(&chapter_id).ok_or(CHAPTER_NOT_FOUND)?;
        if let Some(name) = req.name() {
            chapter.name = name.trim().to_string();
        }
        if let Some(description) = req.description() {
            chapter.description = description.trim().to_string();
        }
        if let Some(order) = req.order {
            chapter.order = order;
        }
        chapter.updated_at = Utc::now();
        Ok(chapter.clone())
    }

    async fn delete_chapter(&self, course_id: Id, chapter_id: Id) -> StoreResult<Vec<Attachment>> {
        let mut tables = self.tables.write();
        tables.chapter(course_id, chapter_id)?;
        Ok(tables.remove_chapters(&[chapter_id]))
    }

    async fn list_lessons(&self, course_id: Id, chapter_id: Id) -> StoreResult<Vec<Lesson>> {
        let tables = self.tables.read();
        tables.chapter(course_id, chapter_id)?;
        let mut lessons: Vec<Lesson> = tables
            .lessons
            .values()
            .filter(|l| l.chapter_id == chapter_id)
            .cloned()
            .collect();
        lessons.sort_by_key(|l| (l.order, l.id));
        Ok(lessons)
    }

    async fn get_lesson(
        &self,
        course_id: Id,
        chapter_id: Id,
        lesson_id: Id,
    ) -> StoreResult<Lesson> {
        self.tables
            .read()
            .lesson(course_id, chapter_id, lesson_id)
            .cloned()
    }

    async fn create_lesson(
        &self,
        course_id: Id,
        chapter_id: Id,
        req: &CreateLessonRequest,
        created_by: Option<Id>,
    ) -> StoreResult<Lesson> {
        let mut tables = self.tables.write();
        tables.chapter(course_id, chapter_id)?;
        let now = Utc::now();
        let id = tables.allocate_id();
        let lesson = Lesson {
            id,
            name: req.name.trim().to_string(),
            description: req.description.trim().to_string(),
            content: req.content.clone(),
            order: req.order,
            chapter_id,
            created_by,
            created_at: now,
            updated_at: now,
        };
        tables.lessons.insert(id, lesson.clone());
        Ok(lesson)
    }

    async fn update_lesson(
        &self,
        course_id: Id,
        chapter_id: Id,
        lesson_id: Id,
        req: &UpdateLessonRequest,
    ) -> StoreResult<Lesson> {
        let mut tables = self.tables.write();
        tables.lesson(course_id, chapter_id, lesson_id)?;
        let lesson = tables.lessons.get_mut(&lesson_id).ok_or(LESSON_NOT_FOUND)?;
        if let Some(name) = req.name() {
            lesson.name = name.trim().to_string();
        }
        if let Some(description) = req.description() {
            lesson.description = description.trim().to_string();
        }
        if let Some(content) = req.content() {
            lesson.content = content.to_string();
        }
        if let Some(order) = req.order {
            lesson.order = order;
        }
        lesson.updated_at = Utc::now();
        Ok(lesson.clone())
    }

    async fn delete_lesson(
        &self,
        course_id: Id,
        chapter_id: Id,
        lesson_id: Id,
    ) -> StoreResult<Vec<Attachment>> {
        let mut tables = self.tables.write();
        tables.lesson(course_id, chapter_id, lesson_id)?;
        Ok(tables.remove_lessons(&[lesson_id]))
    }

    async fn list_attachments(&self, lesson: LessonPath) -> StoreResult<Vec<Attachment>> {
        let tables = self.tables.read();
        tables.lesson(lesson.course_id, lesson.chapter_id, lesson.lesson_id)?;
        Ok(tables
            .attachments
            .values()
            .filter(|a| a.lesson_id == lesson.lesson_id)
            .cloned()
            .collect())
    }

    async fn get_attachment(
        &self,
        lesson: LessonPath,
        attachment_id: Id,
    ) -> StoreResult<Attachment> {
        self.tables.read().attachment(lesson, attachment_id).cloned()
    }

    async fn create_attachment(
        &self,
        lesson: LessonPath,
        attachment: NewAttachment,
    ) -> StoreResult<Attachment> {
        let mut tables = self.tables.write();
        tables.lesson(lesson.course_id, lesson.chapter_id, lesson.lesson_id)?;
        if tables
            .attachments
            .values()
            .any(|a| a.lesson_id == lesson.lesson_id && a.filename == attachment.filename)
        {
            return Err(StoreError::Conflict(ATTACHMENT_EXISTS.to_string()));
        }
        let now = Utc::now();
        let id = tables.allocate_id();
        let row = Attachment {
            id,
            filename: attachment.filename,
            file_type: attachment.file_type,
            file_size: attachment.file_size,
            object_name: attachment.object_name,
            lesson_id: lesson.lesson_id,
            created_at: now,
            updated_at: now,
        };
        tables.attachments.insert(id, row.clone());
        Ok(row)
    }

    async fn delete_attachment(
        &self,
        lesson: LessonPath,
        attachment_id: Id,
    ) -> StoreResult<Attachment> {
        let mut tables = self.tables.write();
        tables.attachment(lesson, attachment_id)?;
        tables
            .attachments
            .remove(&attachment_id)
            .ok_or(ATTACHMENT_NOT_FOUND)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn new_user(username: &str, sub: Option<&str>) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            password_hash: "$argon2id$placeholder".to_string(),
            roles: "ROLE_USER".to_string(),
            sub: sub.map(ToString::to_string),
        }
    }

    fn course_req(name: &str) -> CreateCourseRequest {
        CreateCourseRequest {
            name: name.to_string(),
            description: "desc".to_string(),
        }
    }

    fn chapter_req(order: u32) -> CreateChapterRequest {
        CreateChapterRequest {
            name: format!("Chapter {order}"),
            description: "desc".to_string(),
            order,
        }
    }

    fn lesson_req(order: u32) -> CreateLessonRequest {
        CreateLessonRequest {
            name: format!("Lesson {order}"),
            description: "desc".to_string(),
            content: "body".to_string(),
            order,
        }
    }

    fn attachment(name: &str) -> NewAttachment {
        NewAttachment {
            filename: name.to_string(),
            file_type: "text/plain".to_string(),
            file_size: 4,
            object_name: format!("lesson-x/{name}"),
        }
    }

    #[tokio::test]
    async fn duplicate_sub_is_conflict() {
        // GIVEN: a user linked to "abc-123"
        let store = MemoryStore::new();
        store.create(new_user("ada", Some("abc-123"))).await.unwrap();

        // WHEN: another user claims the same subject
        let err = store
            .create(new_user("grace", Some("abc-123")))
            .await
            .unwrap_err();

        // THEN: conflict, and only one row exists
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.user_count(), 1);
    }

    #[tokio::test]
    async fn duplicate_username_and_email_are_conflicts() {
        let store = MemoryStore::new();
        store.create(new_user("ada", None)).await.unwrap();

        let err = store.create(new_user("ada", None)).await.unwrap_err();
        assert_eq!(err, StoreError::Conflict("username already exists".to_string()));

        let mut other = new_user("grace", None);
        other.email = "ada@example.com".to_string();
        let err = store.create(other).await.unwrap_err();
        assert_eq!(err, StoreError::Conflict("email already exists".to_string()));
    }

    #[tokio::test]
    async fn users_without_sub_do_not_collide() {
        let store = MemoryStore::new();
        store.create(new_user("ada", None)).await.unwrap();
        store.create(new_user("grace", None)).await.unwrap();
        assert_eq!(store.user_count(), 2);
    }

    #[tokio::test]
    async fn update_profile_checks_uniqueness_against_others_only() {
        let store = MemoryStore::new();
        let ada = store.create(new_user("ada", None)).await.unwrap();
        store.create(new_user("grace", None)).await.unwrap();

        // Re-saving one's own username is fine
        let same = store.update_profile(ada.id, Some("ada"), None).await.unwrap();
        assert_eq!(same.username, "ada");

        let err = store
            .update_profile(ada.id, Some("grace"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn chapter_lookup_requires_matching_course() {
        // GIVEN: two courses, a chapter under the first
        let store = MemoryStore::new();
        let first = store.create_course(&course_req("A"), None).await.unwrap();
        let second = store.create_course(&course_req("B"), None).await.unwrap();
        let chapter = store
            .create_chapter(first.id, &chapter_req(1), None)
            .await
            .unwrap();

        // WHEN/THEN: the chapter is not reachable under the second course
        let err = store.get_chapter(second.id, chapter.id).await.unwrap_err();
        assert_eq!(err.to_string(), "chapter not found");
        assert!(store.get_chapter(first.id, chapter.id).await.is_ok());
    }

    #[tokio::test]
    async fn lesson_lookup_requires_full_path() {
        let store = MemoryStore::new();
        let course = store.create_course(&course_req("A"), None).await.unwrap();
        let ch1 = store.create_chapter(course.id, &chapter_req(1), None).await.unwrap();
        let ch2 = store.create_chapter(course.id, &chapter_req(2), None).await.unwrap();
        let lesson = store
            .create_lesson(course.id, ch1.id, &lesson_req(1), None)
            .await
            .unwrap();

        let err = store.get_lesson(course.id, ch2.id, lesson.id).await.unwrap_err();
        assert_eq!(err.to_string(), "lesson not found");
        assert!(store.get_lesson(course.id, ch1.id, lesson.id).await.is_ok());
    }

    #[tokio::test]
    async fn chapters_are_ordered_and_counted() {
        let store = MemoryStore::new();
        let course = store.create_course(&course_req("A"), None).await.unwrap();
        let late = store.create_chapter(course.id, &chapter_req(2), None).await.unwrap();
        let early = store.create_chapter(course.id, &chapter_req(1), None).await.unwrap();
        store
            .create_lesson(course.id, late.id, &lesson_req(1), None)
            .await
            .unwrap();

        let chapters = store.list_chapters(course.id).await.unwrap();

        let ids: Vec<Id> = chapters.iter().map(|c| c.chapter.id).collect();
        assert_eq!(ids, vec![early.id, late.id]);
        assert_eq!(chapters[1].lessons_count, 1);
        assert_eq!(store.get_course(course.id).await.unwrap().chapters_count, 2);
    }

    #[tokio::test]
    async fn create_chapter_under_missing_course_fails() {
        let store = MemoryStore::new();
        let err = store.create_chapter(99, &chapter_req(1), None).await.unwrap_err();
        assert_eq!(err.to_string(), "course not found");
    }

    #[tokio::test]
    async fn delete_course_cascades_and_returns_attachments() {
        // GIVEN: course → chapter → lesson → attachment
        let store = MemoryStore::new();
        let course = store.create_course(&course_req("A"), None).await.unwrap();
        let chapter = store.create_chapter(course.id, &chapter_req(1), None).await.unwrap();
        let lesson = store
            .create_lesson(course.id, chapter.id, &lesson_req(1), None)
            .await
            .unwrap();
        let path = LessonPath {
            course_id: course.id,
            chapter_id: chapter.id,
            lesson_id: lesson.id,
        };
        let file = store.create_attachment(path, attachment("notes.txt")).await.unwrap();

        // WHEN: deleting the course
        let removed = store.delete_course(course.id).await.unwrap();

        // THEN: the whole subtree is gone and the attachment is reported
        assert_eq!(removed, vec![file]);
        assert!(store.get_chapter(course.id, chapter.id).await.is_err());
        assert!(store.list_courses().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn attachment_lookup_requires_owning_lesson() {
        let store = MemoryStore::new();
        let course = store.create_course(&course_req("A"), None).await.unwrap();
        let chapter = store.create_chapter(course.id, &chapter_req(1), None).await.unwrap();
        let l1 = store
            .create_lesson(course.id, chapter.id, &lesson_req(1), None)
            .await
            .unwrap();
        let l2 = store
            .create_lesson(course.id, chapter.id, &lesson_req(2), None)
            .await
            .unwrap();
        let path = |lesson_id| LessonPath {
            course_id: course.id,
            chapter_id: chapter.id,
            lesson_id,
        };
        let file = store.create_attachment(path(l1.id), attachment("a.pdf")).await.unwrap();

        let err = store.get_attachment(path(l2.id), file.id).await.unwrap_err();
        assert_eq!(err.to_string(), "attachment not found");

        // Same file name is fine in another lesson but not twice in one
        assert!(store.create_attachment(path(l2.id), attachment("a.pdf")).await.is_ok());
        let err = store
            .create_attachment(path(l1.id), attachment("a.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let deleted = store.delete_attachment(path(l1.id), file.id).await.unwrap();
        assert_eq!(deleted.id, file.id);
        assert!(store.list_attachments(path(l1.id)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_course_ignores_blank_fields() {
        let store = MemoryStore::new();
        let course = store.create_course(&course_req("Rust"), None).await.unwrap();

        let updated = store
            .update_course(
                course.id,
                &UpdateCourseRequest {
                    name: Some("  ".to_string()),
                    description: Some("Advanced".to_string()),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "Rust");
        assert_eq!(updated.description, "Advanced");
    }
}
