//! Course, chapter and lesson handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use course_core::request::{
    CreateChapterRequest, CreateCourseRequest, CreateLessonRequest, UpdateChapterRequest,
    UpdateCourseRequest, UpdateLessonRequest,
};

use super::{ApiResult, AppState, JsonBody, created, done, ok, parse_id};
use crate::auth::AuthContext;

// ── Courses ────────────────────────────────────────────────────────────────

pub(super) async fn list_courses(State(state): State<Arc<AppState>>) -> ApiResult {
    ok(state.catalog.list_courses().await?, "Courses retrieved successfully")
}

pub(super) async fn get_course(
    State(state): State<Arc<AppState>>,
    Path(course_id): Path<String>,
) -> ApiResult {
    let id = parse_id(&course_id, "course")?;
    ok(state.catalog.get_course(id).await?, "Course retrieved successfully")
}

pub(super) async fn create_course(
    State(state): State<Arc<AppState>>,
    ctx: AuthContext,
    JsonBody(req): JsonBody<CreateCourseRequest>,
) -> ApiResult {
    let course = state.catalog.create_course(&req, ctx.user_id()).await?;
    created(course, "Course created successfully")
}

pub(super) async fn update_course(
    State(state): State<Arc<AppState>>,
    Path(course_id): Path<String>,
    JsonBody(req): JsonBody<UpdateCourseRequest>,
) -> ApiResult {
    let id = parse_id(&course_id, "course")?;
    ok(state.catalog.update_course(id, &req).await?, "Course updated successfully")
}

pub(super) async fn delete_course(
    State(state): State<Arc<AppState>>,
    Path(course_id): Path<String>,
) -> ApiResult {
    let id = parse_id(&course_id, "course")?;
    state.catalog.delete_course(id).await?;
    done("Course deleted successfully")
}

// ── Chapters ───────────────────────────────────────────────────────────────

pub(super) async fn list_chapters(
    State(state): State<Arc<AppState>>,
    Path(course_id): Path<String>,
) -> ApiResult {
    let course_id = parse_id(&course_id, "course")?;
    ok(
        state.catalog.list_chapters(course_id).await?,
        "Chapters retrieved successfully",
    )
}

pub(super) async fn get_chapter(
    State(state): State<Arc<AppState>>,
    Path((course_id, chapter_id)): Path<(String, String)>,
) -> ApiResult {
    let course_id = parse_id(&course_id, "course")?;
    let chapter_id = parse_id(&chapter_id, "chapter")?;
    ok(
        state.catalog.get_chapter(course_id, chapter_id).await?,
        "Chapter retrieved successfully",
    )
}

pub(super) async fn create_chapter(
    State(state): State<Arc<AppState>>,
    ctx: AuthContext,
    Path(course_id): Path<String>,
    JsonBody(req): JsonBody<CreateChapterRequest>,
) -> ApiResult {
    let course_id = parse_id(&course_id, "course")?;
    let chapter = state
        .catalog
        .create_chapter(course_id, &req, ctx.user_id())
        .await?;
    created(chapter, "Chapter created successfully")
}

pub(super) async fn update_chapter(
    State(state): State<Arc<AppState>>,
    Path((course_id, chapter_id)): Path<(String, String)>,
    JsonBody(req): JsonBody<UpdateChapterRequest>,
) -> ApiResult {
    let course_id = parse_id(&course_id, "course")?;
    let chapter_id = parse_id(&chapter_id, "chapter")?;
    ok(
        state.catalog.update_chapter(course_id, chapter_id, &req).await?,
        "Chapter updated successfully",
    )
}

pub(super) async fn delete_chapter(
    State(state): State<Arc<AppState>>,
    Path((course_id, chapter_id)): Path<(String, String)>,
) -> ApiResult {
    let course_id = parse_id(&course_id, "course")?;
    let chapter_id = parse_id(&chapter_id, "chapter")?;
    state.catalog.delete_chapter(course_id, chapter_id).await?;
    done("Chapter deleted successfully")
}

// ── Lessons ────────────────────────────────────────────────────────────────

pub(super) async fn list_lessons(
    State(state): State<Arc<AppState>>,
    Path((course_id, chapter_id)): Path<(String, String)>,
) -> ApiResult {
    let course_id = parse_id(&course_id, "course")?;
    let chapter_id = parse_id(&chapter_id, "chapter")?;
    ok(
        state.catalog.list_lessons(course_id, chapter_id).await?,
        "Lessons retrieved successfully",
    )
}

pub(super) async fn get_lesson(
    State(state): State<Arc<AppState>>,
    Path((course_id, chapter_id, lesson_id)): Path<(String, String, String)>,
) -> ApiResult {
    let course_id = parse_id(&course_id, "course")?;
    let chapter_id = parse_id(&chapter_id, "chapter")?;
    let lesson_id = parse_id(&lesson_id, "lesson")?;
    ok(
        state
            .catalog
            .get_lesson(course_id, chapter_id, lesson_id)
            .await?,
        "Lesson retrieved successfully",
    )
}

pub(super) async fn create_lesson(
    State(state): State<Arc<AppState>>,
    ctx: AuthContext,
    Path((course_id, chapter_id)): Path<(String, String)>,
    JsonBody(req): JsonBody<CreateLessonRequest>,
) -> ApiResult {
    let course_id = parse_id(&course_id, "course")?;
    let chapter_id = parse_id(&chapter_id, "chapter")?;
    let lesson = state
        .catalog
        .create_lesson(course_id, chapter_id, &req, ctx.user_id())
        .await?;
    created(lesson, "Lesson created successfully")
}

pub(super) async fn update_lesson(
    State(state): State<Arc<AppState>>,
    Path((course_id, chapter_id, lesson_id)): Path<(String, String, String)>,
    JsonBody(req): JsonBody<UpdateLessonRequest>,
) -> ApiResult {
    let course_id = parse_id(&course_id, "course")?;
    let chapter_id = parse_id(&chapter_id, "chapter")?;
    let lesson_id = parse_id(&lesson_id, "lesson")?;
    ok(
        state
            .catalog
            .update_lesson(course_id, chapter_id, lesson_id, &req)
            .await?,
        "Lesson updated successfully",
    )
}

pub(super) async fn delete_lesson(
    State(state): State<Arc<AppState>>,
    Path((course_id, chapter_id, lesson_id)): Path<(String, String, String)>,
) -> ApiResult {
    let course_id = parse_id(&course_id, "course")?;
    let chapter_id = parse_id(&chapter_id, "chapter")?;
    let lesson_id = parse_id(&lesson_id, "lesson")?;
    state
        .catalog
        .delete_lesson(course_id, chapter_id, lesson_id)
        .await?;
    done("Lesson deleted successfully")
}
