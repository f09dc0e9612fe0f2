//! Core types for the course API.
//!
//! Shared between the server and its clients: catalogue entities
//! (courses, chapters, lessons, attachments), local user records, the
//! JSON response envelope and the request schemas with their validation
//! rules. This crate has no I/O.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod model;
pub mod request;

pub use model::{
    Attachment, Chapter, ChapterSummary, Course, CourseSummary, Envelope, Id, Lesson, NewUser,
    User, DEFAULT_ROLE,
};
pub use request::ValidationError;
