// src/models/content.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'content_files' table: one uploaded training document
/// within a week. The extracted text is stored at upload time; document
/// parsing happens upstream of this service.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ContentFile {
    pub id: i64,
    pub week_id: i64,
    pub position: i64,
    pub title: String,
    pub filename: String,
    pub mime_type: String,
    #[serde(skip)]
    pub extracted_text: String,
    /// Storage location of the raw document, if the caller supplied one.
    pub source_url: Option<String>,
    pub uploaded_by: Option<i64>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// File listing entry with the calling teacher's progress status and the
/// current quiz generation id (if one exists for them).
#[derive(Debug, Serialize, FromRow)]
pub struct FileWithProgress {
    pub id: i64,
    pub week_id: i64,
    pub position: i64,
    pub title: String,
    pub filename: String,
    pub mime_type: String,
    /// 'locked' | 'available' | 'viewed' | 'completed'
    pub status: String,
}

/// DTO for uploading a content file. Text extraction is a non-goal here;
/// callers send the already-extracted text alongside the metadata.
#[derive(Debug, Deserialize, Validate)]
pub struct UploadFileRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 255))]
    pub filename: String,
    #[validate(length(max = 100))]
    pub mime_type: Option<String>,
    #[validate(length(min = 1))]
    pub extracted_text: String,
    /// Optional storage location for the raw document.
    pub source_url: Option<String>,
}

/// DTO for an admin force-unlocking a file for a teacher.
#[derive(Debug, Deserialize)]
pub struct GrantProgressRequest {
    pub teacher_id: i64,
    pub file_id: i64,
}
