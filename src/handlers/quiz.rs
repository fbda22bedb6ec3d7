// src/handlers/quiz.rs
//
// The attempt-gating state machine over HTTP: fetch the effective quiz for a
// file, submit scored attempts (max 3 per generation), regenerate after three
// failures, and read attempt history across a regeneration chain.

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::PgPool;

use crate::{
    config::{MAX_ATTEMPTS, QUIZ_QUESTION_COUNT},
    error::AppError,
    models::quiz::{
        Attempt, PublicQuestion, QuizGeneration, QuizView, Regeneration, SubmitAttemptRequest,
    },
    services::{
        gating::{
            GateDecision, ProgressStatus, ReportCardState, calculate_score, can_regenerate,
            evaluate_gate, is_passing,
        },
        generator::QuizGenerator,
    },
    utils::jwt::Claims,
};

use super::content::{effective_status, upsert_progress_forward};

/// Follows the teacher's regeneration chain from a base generation to its
/// current end. The chain is short (one hop per exhausted set), so a loop of
/// point lookups is fine.
async fn resolve_effective_generation(
    conn: &mut sqlx::PgConnection,
    teacher_id: i64,
    base_generation_id: i64,
) -> Result<i64, AppError> {
    let mut current = base_generation_id;
    loop {
        let next = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT new_generation_id FROM regenerations
            WHERE teacher_id = $1 AND previous_generation_id = $2
            "#,
        )
        .bind(teacher_id)
        .bind(current)
        .fetch_optional(&mut *conn)
        .await?;

        match next {
            Some(id) => current = id,
            None => return Ok(current),
        }
    }
}

async fn load_generation(
    conn: &mut sqlx::PgConnection,
    generation_id: i64,
) -> Result<QuizGeneration, AppError> {
    sqlx::query_as::<_, QuizGeneration>(
        r#"
        SELECT id, file_id, week_id, batch_id, teacher_id, kind,
               questions, version, created_at
        FROM quiz_generations
        WHERE id = $1
        "#,
    )
    .bind(generation_id)
    .fetch_optional(conn)
    .await?
    .ok_or(AppError::NotFound("Quiz not found".to_string()))
}

/// Writer-side variant: locks the generation row so concurrent submissions
/// or regenerations against the same quiz serialize instead of racing the
/// attempt counter.
async fn load_generation_for_update(
    conn: &mut sqlx::PgConnection,
    generation_id: i64,
) -> Result<QuizGeneration, AppError> {
    sqlx::query_as::<_, QuizGeneration>(
        r#"
        SELECT id, file_id, week_id, batch_id, teacher_id, kind,
               questions, version, created_at
        FROM quiz_generations
        WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(generation_id)
    .fetch_optional(conn)
    .await?
    .ok_or(AppError::NotFound("Quiz not found".to_string()))
}

/// Gate state for (teacher, generation): attempts used and whether any
/// passed. Writers take the generation row lock first, so this count is
/// stable for the rest of the transaction.
async fn load_gate_state(
    conn: &mut sqlx::PgConnection,
    teacher_id: i64,
    generation_id: i64,
) -> Result<(Vec<Attempt>, bool), AppError> {
    let attempts = sqlx::query_as::<_, Attempt>(
        r#"
        SELECT id, teacher_id, generation_id, attempt_number, score, passed, created_at
        FROM attempts
        WHERE teacher_id = $1 AND generation_id = $2
        ORDER BY attempt_number
        FOR UPDATE
        "#,
    )
    .bind(teacher_id)
    .bind(generation_id)
    .fetch_all(conn)
    .await?;

    let has_passed = attempts.iter().any(|a| a.passed);
    Ok((attempts, has_passed))
}

/// A generation minted for one teacher must not be served to another.
fn check_generation_owner(generation: &QuizGeneration, teacher_id: i64) -> Result<(), AppError> {
    if let Some(owner) = generation.teacher_id {
        if owner != teacher_id {
            return Err(AppError::Forbidden(
                "This quiz belongs to another teacher".to_string(),
            ));
        }
    }
    Ok(())
}

/// Returns the effective quiz for a content file: the end of the caller's
/// regeneration chain, with answers stripped and the gate state attached.
pub async fn get_file_quiz(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(file_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let teacher_id = claims.user_id();
    let mut conn = pool.acquire().await?;

    let status = effective_status(&mut conn, teacher_id, file_id).await?;
    if status == ProgressStatus::Locked {
        return Err(AppError::Conflict(
            "Content is locked; pass the preceding quiz first".to_string(),
        ));
    }

    let base_id = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT id FROM quiz_generations
        WHERE file_id = $1 AND kind = 'content' AND teacher_id IS NULL
        ORDER BY version DESC
        LIMIT 1
        "#,
    )
    .bind(file_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(AppError::NotFound("No quiz generated for this file".to_string()))?;

    let effective_id = resolve_effective_generation(&mut conn, teacher_id, base_id).await?;
    let generation = load_generation(&mut conn, effective_id).await?;

    let (attempts, has_passed) = load_gate_state(&mut conn, teacher_id, effective_id).await?;
    let attempts_used = attempts.len() as i64;

    Ok(Json(QuizView {
        generation_id: generation.id,
        kind: generation.kind,
        version: generation.version,
        questions: generation.questions.0.iter().map(PublicQuestion::from).collect(),
        attempts_used,
        attempts_remaining: (MAX_ATTEMPTS - attempts_used).max(0),
        passed: has_passed,
        can_regenerate: can_regenerate(attempts_used, has_passed),
    }))
}

/// Returns the current checkpoint quiz for a week.
pub async fn get_checkpoint_quiz(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(week_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let teacher_id = claims.user_id();
    let mut conn = pool.acquire().await?;

    let base_id = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT id FROM quiz_generations
        WHERE week_id = $1 AND kind = 'checkpoint' AND teacher_id IS NULL
        ORDER BY version DESC
        LIMIT 1
        "#,
    )
    .bind(week_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(AppError::NotFound("No checkpoint quiz for this week".to_string()))?;

    let effective_id = resolve_effective_generation(&mut conn, teacher_id, base_id).await?;
    let generation = load_generation(&mut conn, effective_id).await?;
    let (attempts, has_passed) = load_gate_state(&mut conn, teacher_id, effective_id).await?;
    let attempts_used = attempts.len() as i64;

    Ok(Json(QuizView {
        generation_id: generation.id,
        kind: generation.kind,
        version: generation.version,
        questions: generation.questions.0.iter().map(PublicQuestion::from).collect(),
        attempts_used,
        attempts_remaining: (MAX_ATTEMPTS - attempts_used).max(0),
        passed: has_passed,
        can_regenerate: can_regenerate(attempts_used, has_passed),
    }))
}

/// Submits a scored attempt against a generation.
///
/// Runs the whole state machine in one transaction:
/// * gate check (max 3 attempts, idempotent after a pass),
/// * score + append-only attempt row,
/// * report-card upsert (running mean, pass counter, level),
/// * on a pass: mark the file completed and unlock the next file in
///   week order.
pub async fn submit_attempt(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(generation_id): Path<i64>,
    Json(req): Json<SubmitAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.answers.is_empty() {
        return Err(AppError::BadRequest("No answers submitted".to_string()));
    }

    let teacher_id = claims.user_id();
    let mut tx = pool.begin().await?;

    let generation = load_generation_for_update(&mut tx, generation_id).await?;
    check_generation_owner(&generation, teacher_id)?;

    let (attempts, has_passed) = load_gate_state(&mut tx, teacher_id, generation_id).await?;

    match evaluate_gate(attempts.len() as i64, has_passed) {
        GateDecision::AlreadyPassed => {
            // Idempotent: no new row, echo the recorded passing result.
            let passing = attempts
                .iter()
                .find(|a| a.passed)
                .ok_or_else(|| {
                    AppError::InternalServerError("passed gate without passing attempt".to_string())
                })?;
            let response = serde_json::json!({
                "already_passed": true,
                "score": passing.score,
                "passed": true,
                "attempt_number": passing.attempt_number,
            });
            tx.commit().await?;
            return Ok((StatusCode::OK, Json(response)));
        }
        GateDecision::Exhausted => {
            return Err(AppError::Conflict(
                "Attempts exhausted for this quiz; request a regeneration".to_string(),
            ));
        }
        GateDecision::Allowed { attempt_number } => {
            let questions = &generation.questions.0;
            let (correct_count, score) = calculate_score(&req.answers, questions);
            let passed = is_passing(score);

            sqlx::query(
                r#"
                INSERT INTO attempts
                    (teacher_id, generation_id, attempt_number, score, passed, answers)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(teacher_id)
            .bind(generation_id)
            .bind(attempt_number)
            .bind(score)
            .bind(passed)
            .bind(sqlx::types::Json(&req.answers))
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if e.to_string().contains("unique constraint") || e.to_string().contains("23505") {
                    AppError::Conflict(
                        "Another submission for this quiz was recorded first".to_string(),
                    )
                } else {
                    tracing::error!("Failed to insert attempt: {:?}", e);
                    AppError::InternalServerError(e.to_string())
                }
            })?;

            let report = roll_report_card(&mut tx, teacher_id, score, passed).await?;

            if passed {
                if let Some(file_id) = generation.file_id {
                    upsert_progress_forward(&mut tx, teacher_id, file_id, ProgressStatus::Completed)
                        .await?;
                    unlock_next_file(&mut tx, teacher_id, file_id).await?;
                }
            }

            tx.commit().await?;

            tracing::info!(
                teacher_id,
                generation_id,
                attempt_number,
                score,
                passed,
                "attempt recorded"
            );

            Ok((
                StatusCode::OK,
                Json(serde_json::json!({
                    "already_passed": false,
                    "score": score,
                    "correct_count": correct_count,
                    "total_questions": generation.questions.0.len(),
                    "passed": passed,
                    "attempt_number": attempt_number,
                    "attempts_remaining": MAX_ATTEMPTS - attempt_number,
                    "report_card": {
                        "total_taken": report.total_taken,
                        "total_passed": report.total_passed,
                        "average_score": report.average_score,
                        "level": report.level(),
                    }
                })),
            ))
        }
    }
}

/// Upserts the rolling report card for one recorded attempt.
/// The row is locked for the duration of the surrounding transaction.
async fn roll_report_card(
    tx: &mut sqlx::PgConnection,
    teacher_id: i64,
    score: f64,
    passed: bool,
) -> Result<ReportCardState, AppError> {
    let existing = sqlx::query_as::<_, (i64, i64, f64)>(
        r#"
        SELECT total_taken, total_passed, average_score
        FROM report_cards
        WHERE teacher_id = $1
        FOR UPDATE
        "#,
    )
    .bind(teacher_id)
    .fetch_optional(&mut *tx)
    .await?;

    let state = existing
        .map(|(total_taken, total_passed, average_score)| ReportCardState {
            total_taken,
            total_passed,
            average_score,
        })
        .unwrap_or_default()
        .record(score, passed);

    sqlx::query(
        r#"
        INSERT INTO report_cards (teacher_id, total_taken, total_passed, average_score, level)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (teacher_id) DO UPDATE
        SET total_taken = EXCLUDED.total_taken,
            total_passed = EXCLUDED.total_passed,
            average_score = EXCLUDED.average_score,
            level = EXCLUDED.level,
            updated_at = NOW()
        "#,
    )
    .bind(teacher_id)
    .bind(state.total_taken)
    .bind(state.total_passed)
    .bind(state.average_score)
    .bind(state.level())
    .execute(&mut *tx)
    .await?;

    Ok(state)
}

/// Unlocks the next file in week order: the next position in the same week,
/// else the first file of the next week. No-op when the passed file was the
/// last of the program.
async fn unlock_next_file(
    tx: &mut sqlx::PgConnection,
    teacher_id: i64,
    file_id: i64,
) -> Result<(), AppError> {
    let next = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT f.id
        FROM content_files f
        JOIN weeks w ON f.week_id = w.id
        JOIN content_files cur ON cur.id = $1
        JOIN weeks cur_w ON cur.week_id = cur_w.id
        WHERE (w.week_number, f.position) > (cur_w.week_number, cur.position)
        ORDER BY w.week_number, f.position
        LIMIT 1
        "#,
    )
    .bind(file_id)
    .fetch_optional(&mut *tx)
    .await?;

    if let Some(next_file_id) = next {
        upsert_progress_forward(tx, teacher_id, next_file_id, ProgressStatus::Available).await?;
    }

    Ok(())
}

/// Mints a fresh generation for the caller after three failed attempts.
///
/// The new generation starts its own attempt counter at zero; history under
/// the exhausted generation stays intact for audit views.
pub async fn regenerate(
    State(pool): State<PgPool>,
    State(generator): State<Arc<dyn QuizGenerator>>,
    Extension(claims): Extension<Claims>,
    Path(generation_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let teacher_id = claims.user_id();
    let mut tx = pool.begin().await?;

    let generation = load_generation_for_update(&mut tx, generation_id).await?;
    check_generation_owner(&generation, teacher_id)?;

    let (attempts, has_passed) = load_gate_state(&mut tx, teacher_id, generation_id).await?;

    if !can_regenerate(attempts.len() as i64, has_passed) {
        return Err(AppError::Conflict(
            "Regeneration requires three failed attempts on this quiz".to_string(),
        ));
    }

    // UNIQUE(teacher_id, previous_generation_id) also backs this check.
    let already = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT new_generation_id FROM regenerations
        WHERE teacher_id = $1 AND previous_generation_id = $2
        "#,
    )
    .bind(teacher_id)
    .bind(generation_id)
    .fetch_optional(&mut *tx)
    .await?;
    if already.is_some() {
        return Err(AppError::Conflict(
            "This quiz has already been regenerated".to_string(),
        ));
    }

    // Regenerate from the original source material.
    let (title, text) = match generation.file_id {
        Some(file_id) => sqlx::query_as::<_, (String, String)>(
            "SELECT title, extracted_text FROM content_files WHERE id = $1",
        )
        .bind(file_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound("Source file no longer exists".to_string()))?,
        None => {
            // Checkpoint quiz: draw on every file of the week.
            let rows = sqlx::query_as::<_, (String, String)>(
                "SELECT title, extracted_text FROM content_files WHERE week_id = $1 ORDER BY position",
            )
            .bind(generation.week_id)
            .fetch_all(&mut *tx)
            .await?;
            if rows.is_empty() {
                return Err(AppError::NotFound(
                    "Source files no longer exist".to_string(),
                ));
            }
            let title = format!("Week checkpoint ({} files)", rows.len());
            let text = rows
                .iter()
                .map(|(_, t)| t.as_str())
                .collect::<Vec<_>>()
                .join("\n");
            (title, text)
        }
    };

    let question_count = generation.questions.0.len().max(QUIZ_QUESTION_COUNT);
    let questions = generator.generate(&title, &text, question_count).await?;

    let new_generation = sqlx::query_as::<_, QuizGeneration>(
        r#"
        INSERT INTO quiz_generations
            (file_id, week_id, batch_id, teacher_id, kind, questions, version)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id, file_id, week_id, batch_id, teacher_id, kind,
                  questions, version, created_at
        "#,
    )
    .bind(generation.file_id)
    .bind(generation.week_id)
    .bind(generation.batch_id)
    .bind(teacher_id)
    .bind(&generation.kind)
    .bind(sqlx::types::Json(&questions))
    .bind(generation.version + 1)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO regenerations (teacher_id, previous_generation_id, new_generation_id)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(teacher_id)
    .bind(generation_id)
    .bind(new_generation.id)
    .execute(&mut *tx)
    .await
    .map_err(|e| {
        if e.to_string().contains("unique constraint") || e.to_string().contains("23505") {
            AppError::Conflict("This quiz has already been regenerated".to_string())
        } else {
            tracing::error!("Failed to record regeneration: {:?}", e);
            AppError::InternalServerError(e.to_string())
        }
    })?;

    tx.commit().await?;

    tracing::info!(
        teacher_id,
        previous = generation_id,
        new = new_generation.id,
        "quiz regenerated"
    );

    Ok((
        StatusCode::CREATED,
        Json(QuizView {
            generation_id: new_generation.id,
            kind: new_generation.kind,
            version: new_generation.version,
            questions: new_generation
                .questions
                .0
                .iter()
                .map(PublicQuestion::from)
                .collect(),
            attempts_used: 0,
            attempts_remaining: MAX_ATTEMPTS,
            passed: false,
            can_regenerate: false,
        }),
    ))
}

/// Returns the caller's attempt history for a generation, including attempts
/// made under earlier generations in the same regeneration chain.
pub async fn attempt_history(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(generation_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let teacher_id = claims.user_id();
    let mut conn = pool.acquire().await?;

    let generation = load_generation(&mut conn, generation_id).await?;
    check_generation_owner(&generation, teacher_id)?;

    // Walk the chain backwards to collect every generation this one
    // supersedes for the caller.
    let mut chain = vec![generation_id];
    let mut current = generation_id;
    loop {
        let previous = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT previous_generation_id FROM regenerations
            WHERE teacher_id = $1 AND new_generation_id = $2
            "#,
        )
        .bind(teacher_id)
        .bind(current)
        .fetch_optional(&mut *conn)
        .await?;

        match previous {
            Some(id) => {
                chain.push(id);
                current = id;
            }
            None => break,
        }
    }

    let attempts = sqlx::query_as::<_, Attempt>(
        r#"
        SELECT a.id, a.teacher_id, a.generation_id, a.attempt_number,
               a.score, a.passed, a.created_at
        FROM attempts a
        WHERE a.teacher_id = $1 AND a.generation_id = ANY($2)
        ORDER BY a.created_at
        "#,
    )
    .bind(teacher_id)
    .bind(&chain)
    .fetch_all(&mut *conn)
    .await?;

    let regenerations = sqlx::query_as::<_, Regeneration>(
        r#"
        SELECT id, teacher_id, previous_generation_id, new_generation_id, created_at
        FROM regenerations
        WHERE teacher_id = $1 AND new_generation_id = ANY($2)
        ORDER BY created_at
        "#,
    )
    .bind(teacher_id)
    .bind(&chain)
    .fetch_all(&mut *conn)
    .await?;

    Ok(Json(serde_json::json!({
        "generation_chain": chain,
        "attempts": attempts,
        "regenerations": regenerations,
    })))
}
