// src/handlers/content.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::PgPool;
use url::Url;
use validator::Validate;

use crate::{
    config::{CHECKPOINT_QUESTIONS_PER_FILE, QUIZ_QUESTION_COUNT},
    error::AppError,
    models::{
        content::{ContentFile, GrantProgressRequest, UploadFileRequest},
        quiz::QuizGeneration,
    },
    services::{
        gating::{ProgressStatus, advance_progress},
        generator::QuizGenerator,
    },
    utils::{html::clean_html, jwt::Claims},
};

/// Uploads a content file into a week and generates its quizzes.
/// Admin only.
///
/// This is the slow, one-time path: the content quiz is generated and cached
/// here so teacher-side retrieval is a plain indexed read. The week's
/// checkpoint quiz also grows by a couple of questions; since generations
/// are immutable, that mints a new checkpoint version instead of editing the
/// old one.
pub async fn upload_file(
    State(pool): State<PgPool>,
    State(generator): State<Arc<dyn QuizGenerator>>,
    Extension(claims): Extension<Claims>,
    Path(week_id): Path<i64>,
    Json(payload): Json<UploadFileRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    if let Some(source_url) = &payload.source_url {
        Url::parse(source_url)
            .map_err(|_| AppError::BadRequest("source_url is not a valid URL".to_string()))?;
    }

    let week_exists = sqlx::query_scalar::<_, i64>("SELECT id FROM weeks WHERE id = $1")
        .bind(week_id)
        .fetch_optional(&pool)
        .await?;
    if week_exists.is_none() {
        return Err(AppError::NotFound("Week not found".to_string()));
    }

    // Stored XSS fail-safe: extracted text is rendered in the study view.
    let extracted_text = clean_html(&payload.extracted_text);
    let mime_type = payload
        .mime_type
        .unwrap_or_else(|| "application/pdf".to_string());

    // Generate both question sets before touching the database so a
    // generation failure leaves no half-uploaded file behind.
    let content_questions = generator
        .generate(&payload.title, &extracted_text, QUIZ_QUESTION_COUNT)
        .await?;
    let checkpoint_questions = generator
        .generate(&payload.title, &extracted_text, CHECKPOINT_QUESTIONS_PER_FILE)
        .await?;

    let mut tx = pool.begin().await?;

    let file = sqlx::query_as::<_, ContentFile>(
        r#"
        INSERT INTO content_files
            (week_id, position, title, filename, mime_type, extracted_text,
             source_url, uploaded_by)
        VALUES
            ($1,
             (SELECT COALESCE(MAX(position), 0) + 1 FROM content_files WHERE week_id = $1),
             $2, $3, $4, $5, $6, $7)
        RETURNING id, week_id, position, title, filename, mime_type,
                  extracted_text, source_url, uploaded_by, created_at
        "#,
    )
    .bind(week_id)
    .bind(payload.title.trim())
    .bind(&payload.filename)
    .bind(&mime_type)
    .bind(&extracted_text)
    .bind(&payload.source_url)
    .bind(claims.user_id())
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!("Failed to insert content file: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    let content_generation = sqlx::query_as::<_, QuizGeneration>(
        r#"
        INSERT INTO quiz_generations (file_id, week_id, kind, questions, version)
        VALUES ($1, $2, 'content', $3, 1)
        RETURNING id, file_id, week_id, batch_id, teacher_id, kind,
                  questions, version, created_at
        "#,
    )
    .bind(file.id)
    .bind(week_id)
    .bind(sqlx::types::Json(&content_questions))
    .fetch_one(&mut *tx)
    .await?;

    // Accumulate the weekly checkpoint quiz: previous version's questions
    // plus the new ones, written as a fresh immutable generation.
    let previous_checkpoint = sqlx::query_as::<_, QuizGeneration>(
        r#"
        SELECT id, file_id, week_id, batch_id, teacher_id, kind,
               questions, version, created_at
        FROM quiz_generations
        WHERE week_id = $1 AND kind = 'checkpoint' AND teacher_id IS NULL
        ORDER BY version DESC
        LIMIT 1
        "#,
    )
    .bind(week_id)
    .fetch_optional(&mut *tx)
    .await?;

    let (mut accumulated, next_version) = match previous_checkpoint {
        Some(generation) => (generation.questions.0.clone(), generation.version + 1),
        None => (Vec::new(), 1),
    };
    accumulated.extend(checkpoint_questions);

    let checkpoint_generation = sqlx::query_as::<_, QuizGeneration>(
        r#"
        INSERT INTO quiz_generations (week_id, kind, questions, version)
        VALUES ($1, 'checkpoint', $2, $3)
        RETURNING id, file_id, week_id, batch_id, teacher_id, kind,
                  questions, version, created_at
        "#,
    )
    .bind(week_id)
    .bind(sqlx::types::Json(&accumulated))
    .bind(next_version)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(
        file_id = file.id,
        week_id,
        content_generation = content_generation.id,
        checkpoint_generation = checkpoint_generation.id,
        "content uploaded and quizzes generated"
    );

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "file": file,
            "content_generation_id": content_generation.id,
            "checkpoint_generation_id": checkpoint_generation.id,
        })),
    ))
}

/// Deletes a content file and closes the position gap within its week.
/// Admin only.
pub async fn delete_file(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = pool.begin().await?;

    let week_id = sqlx::query_scalar::<_, i64>(
        "DELETE FROM content_files WHERE id = $1 RETURNING week_id",
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!("Failed to delete content file: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?
    .ok_or(AppError::NotFound("File not found".to_string()))?;

    sqlx::query(
        r#"
        UPDATE content_files SET position = renumbered.new_position + 1000000
        FROM (
            SELECT id, ROW_NUMBER() OVER (ORDER BY position) AS new_position
            FROM content_files
            WHERE week_id = $1
        ) AS renumbered
        WHERE content_files.id = renumbered.id
        "#,
    )
    .bind(week_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query("UPDATE content_files SET position = position - 1000000 WHERE week_id = $1")
        .bind(week_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Returns true when this file is the very first of the program, which is
/// implicitly available to every teacher.
async fn is_program_first_file<'e, E>(executor: E, file_id: i64) -> Result<bool, AppError>
where
    E: sqlx::PgExecutor<'e>,
{
    let first_id = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT f.id
        FROM content_files f
        JOIN weeks w ON f.week_id = w.id
        ORDER BY w.week_number, f.position
        LIMIT 1
        "#,
    )
    .fetch_optional(executor)
    .await?;

    Ok(first_id == Some(file_id))
}

/// Loads the effective progress status for (teacher, file), accounting for
/// the implicit availability of the program's first file.
/// Takes a connection so callers can run it inside a transaction.
pub async fn effective_status(
    conn: &mut sqlx::PgConnection,
    teacher_id: i64,
    file_id: i64,
) -> Result<ProgressStatus, AppError> {
    let status = sqlx::query_scalar::<_, String>(
        "SELECT status FROM content_progress WHERE teacher_id = $1 AND file_id = $2",
    )
    .bind(teacher_id)
    .bind(file_id)
    .fetch_optional(&mut *conn)
    .await?;

    let status = status
        .map(|s| ProgressStatus::parse(&s))
        .unwrap_or(ProgressStatus::Locked);

    if status == ProgressStatus::Locked && is_program_first_file(&mut *conn, file_id).await? {
        return Ok(ProgressStatus::Available);
    }

    Ok(status)
}

/// Persists a forward-only progress transition. A write that would regress
/// is a silent no-op, keeping the status monotonic.
pub async fn upsert_progress_forward(
    conn: &mut sqlx::PgConnection,
    teacher_id: i64,
    file_id: i64,
    target: ProgressStatus,
) -> Result<ProgressStatus, AppError> {
    let current = effective_status(&mut *conn, teacher_id, file_id).await?;

    let Some(next) = advance_progress(current, target) else {
        return Ok(current);
    };

    sqlx::query(
        r#"
        INSERT INTO content_progress (teacher_id, file_id, status)
        VALUES ($1, $2, $3)
        ON CONFLICT (teacher_id, file_id) DO UPDATE
        SET status = EXCLUDED.status, updated_at = NOW()
        "#,
    )
    .bind(teacher_id)
    .bind(file_id)
    .bind(next.as_str())
    .execute(&mut *conn)
    .await?;

    Ok(next)
}

/// Marks a content file as viewed by the calling teacher.
/// Locked content cannot be viewed; completed content stays completed.
pub async fn mark_viewed(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(file_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let teacher_id = claims.user_id();

    let exists = sqlx::query_scalar::<_, i64>("SELECT id FROM content_files WHERE id = $1")
        .bind(file_id)
        .fetch_optional(&pool)
        .await?;
    if exists.is_none() {
        return Err(AppError::NotFound("File not found".to_string()));
    }

    let mut conn = pool.acquire().await?;

    let current = effective_status(&mut conn, teacher_id, file_id).await?;
    if current == ProgressStatus::Locked {
        return Err(AppError::Conflict(
            "Content is locked; pass the preceding quiz first".to_string(),
        ));
    }

    let status =
        upsert_progress_forward(&mut conn, teacher_id, file_id, ProgressStatus::Viewed).await?;

    Ok(Json(serde_json::json!({ "status": status.as_str() })))
}

/// Force-unlocks a file for a teacher (forward-only).
/// Admin only.
pub async fn grant_progress(
    State(pool): State<PgPool>,
    Json(payload): Json<GrantProgressRequest>,
) -> Result<impl IntoResponse, AppError> {
    let teacher = sqlx::query_scalar::<_, String>("SELECT role FROM users WHERE id = $1")
        .bind(payload.teacher_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Teacher not found".to_string()))?;
    if teacher != "teacher" {
        return Err(AppError::BadRequest(
            "Progress can only be granted to teacher accounts".to_string(),
        ));
    }

    let exists = sqlx::query_scalar::<_, i64>("SELECT id FROM content_files WHERE id = $1")
        .bind(payload.file_id)
        .fetch_optional(&pool)
        .await?;
    if exists.is_none() {
        return Err(AppError::NotFound("File not found".to_string()));
    }

    let mut conn = pool.acquire().await?;
    let status = upsert_progress_forward(
        &mut conn,
        payload.teacher_id,
        payload.file_id,
        ProgressStatus::Available,
    )
    .await?;

    Ok(Json(serde_json::json!({ "status": status.as_str() })))
}
