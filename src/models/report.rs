// src/models/report.rs

use serde::Serialize;
use sqlx::FromRow;

/// Represents the 'report_cards' table: the rolling per-teacher aggregate,
/// upserted on every attempt.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ReportCard {
    pub id: i64,
    pub teacher_id: i64,
    pub total_taken: i64,
    pub total_passed: i64,
    pub average_score: f64,
    /// 'Beginner' | 'Intermediate' | 'Advanced'
    pub level: String,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Report card joined with teacher identity for staff batch views.
#[derive(Debug, Serialize, FromRow)]
pub struct BatchReportRow {
    pub teacher_id: i64,
    pub username: String,
    pub full_name: String,
    pub total_taken: i64,
    pub total_passed: i64,
    pub average_score: f64,
    pub level: String,
}
