use std::sync::Arc;

use course_core::{
    Attachment, Chapter, ChapterSummary, Course, CourseSummary, Id, Lesson,
    request::{
        CreateChapterRequest, CreateCourseRequest, CreateLessonRequest, UpdateChapterRequest,
        UpdateCourseRequest, UpdateLessonRequest,
    },
};
use futures::future::join_all;
use tracing::{info, warn};

use super::ServiceError;
use crate::{storage::ObjectStore, store::CatalogStore};

/// Courses, chapters, lessons and their attachments.
#[derive(Clone)]
pub struct CatalogService {
    pub(super) store: Arc<dyn CatalogStore>,
    pub(super) objects: Arc<dyn ObjectStore>,
}

impl CatalogService {
    /// Service over a catalogue store and the attachment object store.
    pub fn new(store: Arc<dyn CatalogStore>, objects: Arc<dyn ObjectStore>) -> Self {
        Self { store, objects }
    }

    /// All courses with chapter counts.
    pub async fn list_courses(&self) -> Result<Vec<CourseSummary>, ServiceError> {
        Ok(self.store.list_courses().await?)
    }

    /// One course.
    pub async fn get_course(&self, id: Id) -> Result<CourseSummary, ServiceError> {
        Ok(self.store.get_course(id).await?)
    }

    /// Validate and insert a course.
    pub async fn create_course(
        &self,
        req: &CreateCourseRequest,
        created_by: Option<Id>,
    ) -> Result<Course, ServiceError> {
        req.validate()?;
        let course = self.store.create_course(req, created_by).await?;
        info!(course_id = course.id, "Created course");
        Ok(course)
    }

    /// Apply the non-blank fields of `req`.
    pub async fn update_course(
        &self,
        id: Id,
        req: &UpdateCourseRequest,
    ) -> Result<Course, ServiceError> {
        Ok(self.store.update_course(id, req).await?)
    }

    /// Delete a course, its chapters, lessons and attachment objects.
    pub async fn delete_course(&self, id: Id) -> Result<(), ServiceError> {
        let removed = self.store.delete_course(id).await?;
        info!(course_id = id, attachments = removed.len(), "Deleted course");
        self.remove_objects(&removed).await;
        Ok(())
    }

    /// Chapters of a course.
    pub async fn list_chapters(&self, course_id: Id) -> Result<Vec<ChapterSummary>, ServiceError> {
        Ok(self.store.list_chapters(course_id).await?)
    }

    /// One chapter.
    pub async fn get_chapter(
        &self,
        course_id: Id,
        chapter_id: Id,
    ) -> Result<ChapterSummary, ServiceError> {
        Ok(self.store.get_chapter(course_id, chapter_id).await?)
    }

    /// Validate and insert a chapter.
    pub async fn create_chapter(
        &self,
        course_id: Id,
        req: &CreateChapterRequest,
        created_by: Option<Id>,
    ) -> Result<Chapter, ServiceError> {
        req.validate()?;
        Ok(self.store.create_chapter(course_id, req, created_by).await?)
    }

    /// Apply the non-blank fields of `req`.
    pub async fn update_chapter(
        &self,
        course_id: Id,
        chapter_id: Id,
        req: &UpdateChapterRequest,
    ) -> Result<Chapter, ServiceError> {
        req.validate()?;
        Ok(self.store.update_chapter(course_id, chapter_id, req).await?)
    }

    /// Delete a chapter and everything below it.
    pub async fn delete_chapter(&self, course_id: Id, chapter_id: Id) -> Result<(), ServiceError> {
        let removed = self.store.delete_chapter(course_id, chapter_id).await?;
        self.remove_objects(&removed).await;
        Ok(())
    }

    /// Lessons of a chapter.
    pub async fn list_lessons(&self, course_id: Id, chapter_id: Id) -> Result<Vec<Lesson>, ServiceError> {
        Ok(self.store.list_lessons(course_id, chapter_id).await?)
    }

    /// One lesson.
    pub async fn get_lesson(
        &self,
        course_id: Id,
        chapter_id: Id,
        lesson_id: Id,
    ) -> Result<Lesson, ServiceError> {
        Ok(self.store.get_lesson(course_id, chapter_id, lesson_id).await?)
    }

    /// Validate and insert a lesson.
    pub async fn create_lesson(
        &self,
        course_id: Id,
        chapter_id: Id,
        req: &CreateLessonRequest,
        created_by: Option<Id>,
    ) -> Result<Lesson, ServiceError> {
        req.validate()?;
        Ok(self
            .store
            .create_lesson(course_id, chapter_id, req, created_by)
            .await?)
    }

    /// Apply the non-blank fields of `req`.
    pub async fn update_lesson(
        &self,
        course_id: Id,
        chapter_id: Id,
        lesson_id: Id,
        req: &UpdateLessonRequest,
    ) -> Result<Lesson, ServiceError> {
        req.validate()?;
        Ok(self
            .store
            .update_lesson(course_id, chapter_id, lesson_id, req)
            .await?)
    }

    /// Delete a lesson and its attachments.
    pub async fn delete_lesson(
        &self,
        course_id: Id,
        chapter_id: Id,
        lesson_id: Id,
    ) -> Result<(), ServiceError> {
        let removed = self.store.delete_lesson(course_id, chapter_id, lesson_id).await?;
        self.remove_objects(&removed).await;
        Ok(())
    }

    /// Best-effort removal of objects whose records are already gone.
    async fn remove_objects(&self, attachments: &[Attachment]) {
        let results = join_all(
            attachments
                .iter()
                .map(|a| self.objects.delete(&a.object_name)),
        )
        .await;
        for (attachment, result) in attachments.iter().zip(results) {
            if let Err(e) = result {
                warn!(object = %attachment.object_name, error = %e, "Failed to delete attachment object");
            }
        }
    }
}
