//! Lesson attachment handlers.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Multipart, Path, State},
    http::{HeaderValue, header},
    response::IntoResponse,
};
use course_core::Id;
use tokio_util::io::ReaderStream;

use super::{ApiResult, AppState, created, done, ok, parse_id};
use crate::{
    service::{ServiceError, Upload},
    storage::ObjectBody,
    store::LessonPath,
};

const FILE_FIELD: &str = "file";

fn lesson_path(course_id: &str, chapter_id: &str, lesson_id: &str) -> Result<LessonPath, ServiceError> {
    Ok(LessonPath {
        course_id: parse_id(course_id, "course")?,
        chapter_id: parse_id(chapter_id, "chapter")?,
        lesson_id: parse_id(lesson_id, "lesson")?,
    })
}

pub(super) async fn list(
    State(state): State<Arc<AppState>>,
    Path((course_id, chapter_id, lesson_id)): Path<(String, String, String)>,
) -> ApiResult {
    let lesson = lesson_path(&course_id, &chapter_id, &lesson_id)?;
    ok(
        state.catalog.list_attachments(lesson).await?,
        "Attachments retrieved successfully",
    )
}

pub(super) async fn upload(
    State(state): State<Arc<AppState>>,
    Path((course_id, chapter_id, lesson_id)): Path<(String, String, String)>,
    mut multipart: Multipart,
) -> ApiResult {
    let lesson = lesson_path(&course_id, &chapter_id, &lesson_id)?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServiceError::Validation(format!("Invalid multipart body: {}", e.body_text())))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| ServiceError::Validation(format!("Failed to read file: {}", e.body_text())))?;
        upload = Some(Upload {
            filename,
            content_type,
            data,
        });
        break;
    }

    let upload = upload.ok_or_else(|| ServiceError::Validation("File is required".to_string()))?;
    if upload.data.len() > state.max_upload_size {
        return Err(ServiceError::Validation(format!(
            "File exceeds the maximum upload size of {} bytes",
            state.max_upload_size
        )));
    }

    let attachment = state.catalog.upload_attachment(lesson, upload).await?;
    created(attachment, "Attachment uploaded successfully")
}

fn content_route(lesson: LessonPath, attachment_id: Id) -> String {
    format!(
        "/api/v1/courses/{}/chapters/{}/lessons/{}/attachments/{attachment_id}/content",
        lesson.course_id, lesson.chapter_id, lesson.lesson_id
    )
}

pub(super) async fn get(
    State(state): State<Arc<AppState>>,
    Path((course_id, chapter_id, lesson_id, attachment_id)): Path<(String, String, String, String)>,
) -> ApiResult {
    let lesson = lesson_path(&course_id, &chapter_id, &lesson_id)?;
    let attachment_id = parse_id(&attachment_id, "attachment")?;
    let link = state
        .catalog
        .attachment_link(
            lesson,
            attachment_id,
            content_route(lesson, attachment_id),
            state.download_url_ttl,
        )
        .await?;
    ok(link, "Attachment retrieved successfully")
}

pub(super) async fn content(
    State(state): State<Arc<AppState>>,
    Path((course_id, chapter_id, lesson_id, attachment_id)): Path<(String, String, String, String)>,
) -> ApiResult {
    let lesson = lesson_path(&course_id, &chapter_id, &lesson_id)?;
    let attachment_id = parse_id(&attachment_id, "attachment")?;
    let (attachment, object) = state.catalog.open_attachment(lesson, attachment_id).await?;

    let length = object.len();
    let body = match object {
        ObjectBody::Bytes(bytes) => Body::from(bytes),
        ObjectBody::File(file, _) => Body::from_stream(ReaderStream::new(file)),
    };

    let content_type = HeaderValue::from_str(&attachment.file_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"",
        attachment.filename.replace(['"', '\\'], "_")
    ))
    .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
            (header::CONTENT_LENGTH, HeaderValue::from(length)),
        ],
        body,
    )
        .into_response())
}

pub(super) async fn delete(
    State(state): State<Arc<AppState>>,
    Path((course_id, chapter_id, lesson_id, attachment_id)): Path<(String, String, String, String)>,
) -> ApiResult {
    let lesson = lesson_path(&course_id, &chapter_id, &lesson_id)?;
    let attachment_id = parse_id(&attachment_id, "attachment")?;
    state.catalog.delete_attachment(lesson, attachment_id).await?;
    done("Attachment deleted successfully")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_route_addresses_the_attachment() {
        let lesson = LessonPath {
            course_id: 1,
            chapter_id: 2,
            lesson_id: 3,
        };
        assert_eq!(
            content_route(lesson, 4),
            "/api/v1/courses/1/chapters/2/lessons/3/attachments/4/content"
        );
    }

    #[test]
    fn lesson_path_names_the_bad_segment() {
        let err = lesson_path("1", "x", "3").unwrap_err();
        assert_eq!(err.to_string(), "Invalid chapter ID");
    }
}
