// src/handlers/reports.rs

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
        batch::{Certificate, CertificateView, IssueCertificateRequest},
        report::{BatchReportRow, ReportCard},
        user::MeResponse,
    },
    utils::{html::clean_html, jwt::Claims},
};

/// Get current user's profile with the report-card summary folded in.
pub async fn get_me(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id();

    let me = sqlx::query_as::<_, MeResponse>(
        r#"
        SELECT
            u.id, u.username, u.full_name, u.role, u.batch_id, u.created_at,
            COALESCE(rc.total_taken, 0) AS total_quizzes_taken,
            COALESCE(rc.total_passed, 0) AS total_quizzes_passed,
            COALESCE(rc.average_score, 0) AS average_score,
            COALESCE(rc.level, 'Beginner') AS level
        FROM users u
        LEFT JOIN report_cards rc ON rc.teacher_id = u.id
        WHERE u.id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("User not found".to_string()))?;

    Ok(Json(me))
}

/// The caller's report card. A teacher who has not attempted anything yet
/// gets the zeroed default rather than a 404.
pub async fn get_report_card(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let teacher_id = claims.user_id();

    let card = sqlx::query_as::<_, ReportCard>(
        r#"
        SELECT id, teacher_id, total_taken, total_passed, average_score, level, updated_at
        FROM report_cards
        WHERE teacher_id = $1
        "#,
    )
    .bind(teacher_id)
    .fetch_optional(&pool)
    .await?;

    match card {
        Some(card) => Ok(Json(card)),
        None => Ok(Json(ReportCard {
            id: 0,
            teacher_id,
            total_taken: 0,
            total_passed: 0,
            average_score: 0.0,
            level: "Beginner".to_string(),
            updated_at: None,
        })),
    }
}

/// Report cards for every teacher of a batch.
/// Staff only.
pub async fn batch_report_cards(
    State(pool): State<PgPool>,
    Path(batch_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let exists = sqlx::query_scalar::<_, i64>("SELECT id FROM batches WHERE id = $1")
        .bind(batch_id)
        .fetch_optional(&pool)
        .await?;
    if exists.is_none() {
        return Err(AppError::NotFound("Batch not found".to_string()));
    }

    let rows = sqlx::query_as::<_, BatchReportRow>(
        r#"
        SELECT
            u.id AS teacher_id, u.username, u.full_name,
            COALESCE(rc.total_taken, 0) AS total_taken,
            COALESCE(rc.total_passed, 0) AS total_passed,
            COALESCE(rc.average_score, 0) AS average_score,
            COALESCE(rc.level, 'Beginner') AS level
        FROM users u
        LEFT JOIN report_cards rc ON rc.teacher_id = u.id
        WHERE u.batch_id = $1 AND u.role = 'teacher'
        ORDER BY u.username
        "#,
    )
    .bind(batch_id)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch batch report cards: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(rows))
}

/// Issues a certificate to a teacher of a batch.
/// Staff only.
pub async fn issue_certificate(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<IssueCertificateRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let teacher_batch = sqlx::query_as::<_, (String, Option<i64>)>(
        "SELECT role, batch_id FROM users WHERE id = $1",
    )
    .bind(payload.teacher_id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Teacher not found".to_string()))?;

    if teacher_batch.0 != "teacher" {
        return Err(AppError::BadRequest(
            "Certificates can only be issued to teacher accounts".to_string(),
        ));
    }
    if teacher_batch.1 != Some(payload.batch_id) {
        return Err(AppError::BadRequest(
            "Teacher does not belong to that batch".to_string(),
        ));
    }

    let title = clean_html(payload.title.trim());

    let certificate = sqlx::query_as::<_, Certificate>(
        r#"
        INSERT INTO certificates (teacher_id, batch_id, title, issued_by)
        VALUES ($1, $2, $3, $4)
        RETURNING id, teacher_id, batch_id, title, issued_by, issued_at
        "#,
    )
    .bind(payload.teacher_id)
    .bind(payload.batch_id)
    .bind(&title)
    .bind(claims.user_id())
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        if e.to_string().contains("unique constraint") || e.to_string().contains("23505") {
            AppError::Conflict(format!(
                "Certificate '{}' already issued to this teacher",
                title
            ))
        } else {
            tracing::error!("Failed to issue certificate: {:?}", e);
            AppError::InternalServerError(e.to_string())
        }
    })?;

    Ok((StatusCode::CREATED, Json(certificate)))
}

/// The caller's own certificates.
pub async fn my_certificates(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let certificates = sqlx::query_as::<_, CertificateView>(
        r#"
        SELECT c.id, c.title, u.username AS teacher_username,
               b.name AS batch_name, c.issued_at
        FROM certificates c
        JOIN users u ON c.teacher_id = u.id
        JOIN batches b ON c.batch_id = b.id
        WHERE c.teacher_id = $1
        ORDER BY c.issued_at DESC
        "#,
    )
    .bind(claims.user_id())
    .fetch_all(&pool)
    .await?;

    Ok(Json(certificates))
}

/// Every certificate issued within a batch.
/// Staff only.
pub async fn batch_certificates(
    State(pool): State<PgPool>,
    Path(batch_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let certificates = sqlx::query_as::<_, CertificateView>(
        r#"
        SELECT c.id, c.title, u.username AS teacher_username,
               b.name AS batch_name, c.issued_at
        FROM certificates c
        JOIN users u ON c.teacher_id = u.id
        JOIN batches b ON c.batch_id = b.id
        WHERE c.batch_id = $1
        ORDER BY c.issued_at DESC
        "#,
    )
    .bind(batch_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(certificates))
}
