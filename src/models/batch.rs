// src/models/batch.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'batches' table: a cohort of teachers going through the
/// program together.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Batch {
    pub id: i64,
    pub name: String,
    pub starts_on: Option<chrono::NaiveDate>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Represents the 'certificates' table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Certificate {
    pub id: i64,
    pub teacher_id: i64,
    pub batch_id: i64,
    pub title: String,
    pub issued_by: Option<i64>,
    pub issued_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Certificate row joined with teacher and batch names for listings.
#[derive(Debug, Serialize, FromRow)]
pub struct CertificateView {
    pub id: i64,
    pub title: String,
    pub teacher_username: String,
    pub batch_name: String,
    pub issued_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateBatchRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub starts_on: Option<chrono::NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateBatchRequest {
    pub name: Option<String>,
    pub starts_on: Option<chrono::NaiveDate>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct IssueCertificateRequest {
    pub teacher_id: i64,
    pub batch_id: i64,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
}
