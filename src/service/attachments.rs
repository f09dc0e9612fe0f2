use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use course_core::{Attachment, Id};
use serde::Serialize;
use tracing::{info, warn};

use super::{CatalogService, ServiceError};
use crate::{
    storage::ObjectBody,
    store::{ATTACHMENT_EXISTS, LessonPath, NewAttachment, StoreError},
};

/// A file received for upload.
#[derive(Debug, Clone)]
pub struct Upload {
    /// Name supplied by the client.
    pub filename: String,
    /// MIME type supplied by the client.
    pub content_type: String,
    /// File content.
    pub data: Bytes,
}

/// Attachment record with a time-limited download link.
#[derive(Debug, Clone, Serialize)]
pub struct AttachmentLink {
    /// The record.
    #[serde(flatten)]
    pub attachment: Attachment,
    /// Where to fetch the content.
    pub download_url: String,
    /// When `download_url` stops being valid.
    pub expires_at: DateTime<Utc>,
}

/// Last path component of a client-supplied file name.
fn base_name(filename: &str) -> Option<&str> {
    let name = filename.rsplit(['/', '\\']).next()?.trim();
    (!name.is_empty() && name != "." && name != "..").then_some(name)
}

impl CatalogService {
    /// Attachments of a lesson.
    pub async fn list_attachments(&self, lesson: LessonPath) -> Result<Vec<Attachment>, ServiceError> {
        Ok(self.store.list_attachments(lesson).await?)
    }

    /// Store `upload` as `lesson-{lesson_id}/{filename}` and record it.
    pub async fn upload_attachment(
        &self,
        lesson: LessonPath,
        upload: Upload,
    ) -> Result<Attachment, ServiceError> {
        let filename = base_name(&upload.filename)
            .ok_or_else(|| ServiceError::Validation("file name is required".to_string()))?
            .to_string();

        // Fail on a bad path or a taken name before writing any bytes
        self.store
            .get_lesson(lesson.course_id, lesson.chapter_id, lesson.lesson_id)
            .await?;
        let existing = self.store.list_attachments(lesson).await?;
        if existing.iter().any(|a| a.filename == filename) {
            return Err(ServiceError::Validation(ATTACHMENT_EXISTS.to_string()));
        }

        let object_name = format!("lesson-{}/{filename}", lesson.lesson_id);
        let file_size = upload.data.len() as u64;
        self.objects.put(&object_name, upload.data).await?;

        let record = NewAttachment {
            filename,
            file_type: upload.content_type,
            file_size,
            object_name: object_name.clone(),
        };
        match self.store.create_attachment(lesson, record).await {
            Ok(attachment) => {
                info!(
                    attachment_id = attachment.id,
                    lesson_id = lesson.lesson_id,
                    bytes = file_size,
                    "Uploaded attachment"
                );
                Ok(attachment)
            }
            // A concurrent upload of the same name owns both the record and the object
            Err(StoreError::Conflict(_)) => {
                warn!(object = %object_name, "Concurrent upload of the same file name");
                Err(ServiceError::Validation(ATTACHMENT_EXISTS.to_string()))
            }
            Err(e) => {
                if let Err(cleanup) = self.objects.delete(&object_name).await {
                    warn!(object = %object_name, error = %cleanup, "Failed to remove orphaned object");
                }
                Err(e.into())
            }
        }
    }

    /// Attachment record plus a download link valid for `ttl`.
    ///
    /// Backends without direct links get `{content_route}`, the API route
    /// that streams the bytes.
    pub async fn attachment_link(
        &self,
        lesson: LessonPath,
        attachment_id: Id,
        content_route: String,
        ttl: Duration,
    ) -> Result<AttachmentLink, ServiceError> {
        let attachment = self.store.get_attachment(lesson, attachment_id).await?;
        let download_url = self
            .objects
            .download_url(&attachment.object_name, ttl)
            .unwrap_or(content_route);
        let expires_at = Utc::now()
            + chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::hours(24));
        Ok(AttachmentLink {
            attachment,
            download_url,
            expires_at,
        })
    }

    /// Attachment record and its stored bytes.
    pub async fn open_attachment(
        &self,
        lesson: LessonPath,
        attachment_id: Id,
    ) -> Result<(Attachment, ObjectBody), ServiceError> {
        let attachment = self.store.get_attachment(lesson, attachment_id).await?;
        let body = self.objects.get(&attachment.object_name).await?;
        Ok((attachment, body))
    }

    /// Delete the stored object, then the record.
    pub async fn delete_attachment(
        &self,
        lesson: LessonPath,
        attachment_id: Id,
    ) -> Result<(), ServiceError> {
        let attachment = self.store.get_attachment(lesson, attachment_id).await?;
        self.objects.delete(&attachment.object_name).await?;
        self.store.delete_attachment(lesson, attachment_id).await?;
        info!(attachment_id, "Deleted attachment");
        Ok(())
    }
}
