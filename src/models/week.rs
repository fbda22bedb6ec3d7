// src/models/week.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::models::content::FileWithProgress;

/// Represents the 'weeks' table: one curriculum week of the training program.
/// week_number is kept contiguous (1..=n) by the reorder operation.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Week {
    pub id: i64,
    pub week_number: i64,
    pub name: String,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Week plus its files and the calling teacher's progress on each.
#[derive(Debug, Serialize)]
pub struct WeekWithFiles {
    pub id: i64,
    pub week_number: i64,
    pub name: String,
    pub files: Vec<FileWithProgress>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateWeekRequest {
    #[validate(length(min = 1, max = 200, message = "Week name cannot be empty."))]
    pub name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RenameWeekRequest {
    #[validate(length(min = 1, max = 200, message = "Week name cannot be empty."))]
    pub name: String,
}

/// DTO for moving a week to a new position. Both values are 1-based
/// week numbers; every week is renumbered sequentially afterwards.
#[derive(Debug, Deserialize)]
pub struct ReorderWeeksRequest {
    pub week_number: i64,
    pub new_position: i64,
}
