// src/handlers/weeks.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        content::FileWithProgress,
        week::{CreateWeekRequest, RenameWeekRequest, ReorderWeeksRequest, Week, WeekWithFiles},
    },
    services::gating::ProgressStatus,
    utils::jwt::Claims,
};

/// Lists the training program: weeks in order, each with its files and the
/// calling teacher's progress status per file.
///
/// The very first file of the program is surfaced as 'available' even before
/// a progress row exists, so a fresh teacher has an entry point.
pub async fn list_weeks(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let teacher_id = claims.user_id();

    let weeks = sqlx::query_as::<_, Week>(
        "SELECT id, week_number, name, created_at FROM weeks ORDER BY week_number",
    )
    .fetch_all(&pool)
    .await?;

    let files = sqlx::query_as::<_, FileWithProgress>(
        r#"
        SELECT
            f.id, f.week_id, f.position, f.title, f.filename, f.mime_type,
            COALESCE(cp.status, 'locked') AS status
        FROM content_files f
        JOIN weeks w ON f.week_id = w.id
        LEFT JOIN content_progress cp
            ON cp.file_id = f.id AND cp.teacher_id = $1
        ORDER BY w.week_number, f.position
        "#,
    )
    .bind(teacher_id)
    .fetch_all(&pool)
    .await?;

    let mut files = files;
    if let Some(first) = files.first_mut() {
        if ProgressStatus::parse(&first.status) == ProgressStatus::Locked {
            first.status = ProgressStatus::Available.as_str().to_string();
        }
    }

    let mut result: Vec<WeekWithFiles> = weeks
        .into_iter()
        .map(|w| WeekWithFiles {
            id: w.id,
            week_number: w.week_number,
            name: w.name,
            files: Vec::new(),
        })
        .collect();

    for file in files {
        if let Some(week) = result.iter_mut().find(|w| w.id == file.week_id) {
            week.files.push(file);
        }
    }

    Ok(Json(result))
}

/// Creates a new week at the end of the program.
/// Admin only.
pub async fn create_week(
    State(pool): State<PgPool>,
    Json(payload): Json<CreateWeekRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let week = sqlx::query_as::<_, Week>(
        r#"
        INSERT INTO weeks (week_number, name)
        VALUES ((SELECT COALESCE(MAX(week_number), 0) + 1 FROM weeks), $1)
        RETURNING id, week_number, name, created_at
        "#,
    )
    .bind(payload.name.trim())
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create week: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok((StatusCode::CREATED, Json(week)))
}

/// Renames a week.
/// Admin only.
pub async fn rename_week(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<RenameWeekRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let result = sqlx::query("UPDATE weeks SET name = $1 WHERE id = $2")
        .bind(payload.name.trim())
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to rename week: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Week not found".to_string()));
    }

    Ok(StatusCode::OK)
}

/// Moves a week to a new position and renumbers all weeks to a contiguous
/// 1..=n sequence, in one transaction.
/// Admin only.
pub async fn reorder_weeks(
    State(pool): State<PgPool>,
    Json(payload): Json<ReorderWeeksRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = pool.begin().await?;

    let mut ids: Vec<i64> =
        sqlx::query_scalar::<_, i64>("SELECT id FROM weeks ORDER BY week_number FOR UPDATE")
            .fetch_all(&mut *tx)
            .await?;

    let count = ids.len() as i64;
    if count < 2 {
        return Err(AppError::BadRequest(
            "Need at least 2 weeks to reorder".to_string(),
        ));
    }
    if payload.week_number < 1 || payload.week_number > count {
        return Err(AppError::BadRequest(format!(
            "week_number must be between 1 and {}",
            count
        )));
    }
    if payload.new_position < 1 || payload.new_position > count {
        return Err(AppError::BadRequest(format!(
            "new_position must be between 1 and {}",
            count
        )));
    }

    if payload.week_number != payload.new_position {
        let moved = ids.remove((payload.week_number - 1) as usize);
        ids.insert((payload.new_position - 1) as usize, moved);

        // Two-phase renumber so the UNIQUE(week_number) constraint never
        // sees a transient duplicate.
        sqlx::query("UPDATE weeks SET week_number = week_number + 1000000")
            .execute(&mut *tx)
            .await?;

        for (index, week_id) in ids.iter().enumerate() {
            sqlx::query("UPDATE weeks SET week_number = $1 WHERE id = $2")
                .bind(index as i64 + 1)
                .bind(week_id)
                .execute(&mut *tx)
                .await?;
        }
    }

    tx.commit().await?;

    let weeks = sqlx::query_as::<_, Week>(
        "SELECT id, week_number, name, created_at FROM weeks ORDER BY week_number",
    )
    .fetch_all(&pool)
    .await?;

    Ok(Json(weeks))
}

/// Deletes a week. Files, generations and progress cascade away.
/// Admin only.
pub async fn delete_week(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = pool.begin().await?;

    let result = sqlx::query("DELETE FROM weeks WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete week: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Week not found".to_string()));
    }

    // Close the gap left by the deleted week.
    sqlx::query(
        r#"
        UPDATE weeks SET week_number = renumbered.new_number + 1000000
        FROM (
            SELECT id, ROW_NUMBER() OVER (ORDER BY week_number) AS new_number
            FROM weeks
        ) AS renumbered
        WHERE weeks.id = renumbered.id
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query("UPDATE weeks SET week_number = week_number - 1000000")
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}
