// src/services/gating.rs
//
// Pure decision logic for the attempt gate, the content-progress ladder and
// the rolling report card. Handlers load the current state from the database,
// run it through these functions inside a transaction, and persist the result.

use std::collections::HashMap;

use crate::config::{
    ADVANCED_PASS_THRESHOLD, INTERMEDIATE_PASS_THRESHOLD, MAX_ATTEMPTS, PASSING_SCORE,
};
use crate::models::quiz::QuizQuestion;

/// Outcome of asking "may this teacher take another attempt?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// A new attempt may be recorded with this attempt_number.
    Allowed { attempt_number: i64 },
    /// A prior attempt already passed; resubmission is a no-op.
    AlreadyPassed,
    /// All attempts used without a pass; only regeneration remains.
    Exhausted,
}

/// Evaluates the attempt gate for one (teacher, generation) pair.
///
/// attempt_number is strictly increasing and capped at MAX_ATTEMPTS.
pub fn evaluate_gate(attempts_used: i64, has_passed: bool) -> GateDecision {
    if has_passed {
        return GateDecision::AlreadyPassed;
    }
    if attempts_used >= MAX_ATTEMPTS {
        return GateDecision::Exhausted;
    }
    GateDecision::Allowed {
        attempt_number: attempts_used + 1,
    }
}

/// Regeneration is reachable only once the gate is exhausted: exactly
/// MAX_ATTEMPTS attempts, none passing.
pub fn can_regenerate(attempts_used: i64, has_passed: bool) -> bool {
    attempts_used >= MAX_ATTEMPTS && !has_passed
}

/// Scores a submitted answer sheet against the generation's questions.
/// Keys are question indexes; unanswered questions count as wrong.
/// Returns (correct_count, score_percentage).
pub fn calculate_score(
    user_answers: &HashMap<usize, String>,
    questions: &[QuizQuestion],
) -> (usize, f64) {
    let total = questions.len();
    if total == 0 {
        return (0, 0.0);
    }

    let mut correct_count = 0;
    for (idx, question) in questions.iter().enumerate() {
        if let Some(user_ans) = user_answers.get(&idx) {
            // Strict string matching against the stored answer text.
            if user_ans == &question.answer {
                correct_count += 1;
            }
        }
    }

    let score = (correct_count as f64 / total as f64) * 100.0;
    (correct_count, score)
}

pub fn is_passing(score: f64) -> bool {
    score >= PASSING_SCORE
}

/// Content-progress ladder. Transitions only ever move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ProgressStatus {
    Locked,
    Available,
    Viewed,
    Completed,
}

impl ProgressStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ProgressStatus::Locked => "locked",
            ProgressStatus::Available => "available",
            ProgressStatus::Viewed => "viewed",
            ProgressStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> ProgressStatus {
        match s {
            "available" => ProgressStatus::Available,
            "viewed" => ProgressStatus::Viewed,
            "completed" => ProgressStatus::Completed,
            _ => ProgressStatus::Locked,
        }
    }
}

/// Applies a forward-only transition. Returns the status to persist, or
/// None when the write would regress (caller skips the update).
pub fn advance_progress(current: ProgressStatus, target: ProgressStatus) -> Option<ProgressStatus> {
    if target > current { Some(target) } else { None }
}

/// Rolling report-card aggregate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportCardState {
    pub total_taken: i64,
    pub total_passed: i64,
    pub average_score: f64,
}

impl ReportCardState {
    pub fn new() -> Self {
        ReportCardState {
            total_taken: 0,
            total_passed: 0,
            average_score: 0.0,
        }
    }

    /// Folds one attempt into the aggregate: running mean over all attempt
    /// scores, pass counter, taken counter.
    pub fn record(self, score: f64, passed: bool) -> ReportCardState {
        let total_taken = self.total_taken + 1;
        let total_passed = self.total_passed + if passed { 1 } else { 0 };
        let average_score =
            (self.average_score * (total_taken - 1) as f64 + score) / total_taken as f64;
        ReportCardState {
            total_taken,
            total_passed,
            average_score,
        }
    }

    pub fn level(&self) -> &'static str {
        level_for(self.total_passed)
    }
}

impl Default for ReportCardState {
    fn default() -> Self {
        Self::new()
    }
}

/// Maps cumulative pass count to the three-tier level.
pub fn level_for(total_passed: i64) -> &'static str {
    if total_passed >= ADVANCED_PASS_THRESHOLD {
        "Advanced"
    } else if total_passed >= INTERMEDIATE_PASS_THRESHOLD {
        "Intermediate"
    } else {
        "Beginner"
    }
}
