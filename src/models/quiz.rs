// src/models/quiz.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use std::collections::HashMap;

/// One generated multiple-choice question, stored inside the
/// quiz_generations.questions JSONB array.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuizQuestion {
    /// The text content of the question.
    pub prompt: String,

    /// List of options (e.g., ["Option A", "Option B"]).
    pub options: Vec<String>,

    /// The correct option text.
    pub answer: String,

    /// Explanation shown after a completed attempt.
    pub analysis: Option<String>,
}

/// Question DTO sent to teachers (excludes answer and analysis).
#[derive(Debug, Serialize)]
pub struct PublicQuestion {
    pub prompt: String,
    pub options: Vec<String>,
}

impl From<&QuizQuestion> for PublicQuestion {
    fn from(q: &QuizQuestion) -> Self {
        PublicQuestion {
            prompt: q.prompt.clone(),
            options: q.options.clone(),
        }
    }
}

/// Represents the 'quiz_generations' table: one immutable versioned question
/// set. Checkpoint generations have no file_id; per-teacher regenerated sets
/// carry teacher_id.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct QuizGeneration {
    pub id: i64,
    pub file_id: Option<i64>,
    pub week_id: i64,
    pub batch_id: Option<i64>,
    pub teacher_id: Option<i64>,
    /// 'content' or 'checkpoint'.
    pub kind: String,
    pub questions: Json<Vec<QuizQuestion>>,
    pub version: i64,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Represents an 'attempts' row. Append-only.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Attempt {
    pub id: i64,
    pub teacher_id: i64,
    pub generation_id: i64,
    pub attempt_number: i64,
    pub score: f64,
    pub passed: bool,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Represents a 'regenerations' row linking an exhausted generation to its
/// replacement for one teacher.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Regeneration {
    pub id: i64,
    pub teacher_id: i64,
    pub previous_generation_id: i64,
    pub new_generation_id: i64,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Quiz as presented to a teacher: public questions plus gate state.
#[derive(Debug, Serialize)]
pub struct QuizView {
    pub generation_id: i64,
    pub kind: String,
    pub version: i64,
    pub questions: Vec<PublicQuestion>,
    pub attempts_used: i64,
    pub attempts_remaining: i64,
    pub passed: bool,
    pub can_regenerate: bool,
}

/// DTO for submitting an attempt.
/// Keys are question indexes into the generation's question array,
/// values are the selected option text.
#[derive(Debug, Deserialize)]
pub struct SubmitAttemptRequest {
    pub answers: HashMap<usize, String>,
}
