use crate::{
    auth::{AdminSession, DbAdminSession},
    error::AppError,
};
use chrono::{DateTime, Utc};
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::models::{DbSubmission, DeliveryStatus, NewSubmission, Submission, SubmissionFields};

const SUBMISSION_COLUMNS: &str = "id, grade, student_name, parent_name, wa_number, email, signature, delivery_status, created_at";

/// Returns the stored row as written, including its id and `created_at`.
#[instrument(skip_all, fields(grade = %submission.fields.grade, has_signature = submission.signature.is_some()))]
pub async fn insert_submission(
    pool: &Pool<Sqlite>,
    submission: &NewSubmission,
) -> Result<Submission, AppError> {
    info!("Inserting submission");
    let now = Utc::now();
    let fields = &submission.fields;

    let query = format!(
        "INSERT INTO submissions
         (grade, student_name, parent_name, wa_number, email, signature, delivery_status, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)
         RETURNING {}",
        SUBMISSION_COLUMNS
    );

    let row = sqlx::query_as::<_, DbSubmission>(&query)
        .bind(fields.grade.as_str())
        .bind(&fields.student_name)
        .bind(&fields.parent_name)
        .bind(&fields.wa_number)
        .bind(&fields.email)
        .bind(submission.signature.as_deref())
        .bind(DeliveryStatus::Pending.as_str())
        .bind(now)
        .fetch_one(pool)
        .await?;

    Submission::try_from(row)
}

#[instrument(skip(pool))]
pub async fn get_submission(pool: &Pool<Sqlite>, id: i64) -> Result<Submission, AppError> {
    info!("Fetching submission by ID");
    let query = format!("SELECT {} FROM submissions WHERE id = ?", SUBMISSION_COLUMNS);
    let row = sqlx::query_as::<_, DbSubmission>(&query)
        .bind(id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(submission) => Submission::try_from(submission),
        _ => Err(AppError::NotFound(format!(
            "Submission with id {} not found in database",
            id
        ))),
    }
}

#[instrument(skip(pool))]
pub async fn list_submissions(pool: &Pool<Sqlite>) -> Result<Vec<Submission>, AppError> {
    info!("Listing submissions");
    let query = format!("SELECT {} FROM submissions ORDER BY id", SUBMISSION_COLUMNS);
    let rows = sqlx::query_as::<_, DbSubmission>(&query)
        .fetch_all(pool)
        .await?;

    rows.into_iter().map(Submission::try_from).collect()
}

/// Replaces the user-entered fields. Signature, status and timestamp stay.
#[instrument(skip(pool, fields))]
pub async fn update_submission(
    pool: &Pool<Sqlite>,
    id: i64,
    fields: &SubmissionFields,
) -> Result<(), AppError> {
    info!("Updating submission");
    let result = sqlx::query(
        "UPDATE submissions
         SET grade = ?, student_name = ?, parent_name = ?, wa_number = ?, email = ?
         WHERE id = ?",
    )
    .bind(fields.grade.as_str())
    .bind(&fields.student_name)
    .bind(&fields.parent_name)
    .bind(&fields.wa_number)
    .bind(&fields.email)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "Submission with id {} not found in database",
            id
        )));
    }

    Ok(())
}

#[instrument(skip(pool))]
pub async fn delete_submission(pool: &Pool<Sqlite>, id: i64) -> Result<(), AppError> {
    info!("Deleting submission");
    let result = sqlx::query("DELETE FROM submissions WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "Submission with id {} not found in database",
            id
        )));
    }

    Ok(())
}

#[instrument(skip(pool))]
pub async fn set_delivery_status(
    pool: &Pool<Sqlite>,
    id: i64,
    status: DeliveryStatus,
) -> Result<(), AppError> {
    info!(status = %status, "Recording delivery status");
    sqlx::query("UPDATE submissions SET delivery_status = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument(skip(pool, token))]
pub async fn create_admin_session(
    pool: &Pool<Sqlite>,
    token: &str,
    expires_at: DateTime<Utc>,
) -> Result<i64, AppError> {
    info!("Creating admin session");

    let res = sqlx::query(
        "INSERT INTO admin_sessions (token, created_at, expires_at) VALUES (?, ?, ?)",
    )
    .bind(token)
    .bind(Utc::now())
    .bind(expires_at)
    .execute(pool)
    .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool, token))]
pub async fn get_admin_session(pool: &Pool<Sqlite>, token: &str) -> Result<AdminSession, AppError> {
    info!("Getting admin session by token");

    let session = sqlx::query_as::<_, DbAdminSession>(
        "SELECT id, token, created_at, expires_at FROM admin_sessions WHERE token = ?",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;

    match session {
        Some(session) => Ok(AdminSession::from(session)),
        _ => Err(AppError::Authentication(
            "Invalid session token".to_string(),
        )),
    }
}

#[instrument(skip(pool, token))]
pub async fn invalidate_admin_session(pool: &Pool<Sqlite>, token: &str) -> Result<(), AppError> {
    info!("Invalidating admin session");

    sqlx::query("DELETE FROM admin_sessions WHERE token = ?")
        .bind(token)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument(skip(pool))]
pub async fn clean_expired_admin_sessions(pool: &Pool<Sqlite>) -> Result<u64, AppError> {
    info!("Cleaning expired admin sessions");

    let result = sqlx::query("DELETE FROM admin_sessions WHERE expires_at < ?")
        .bind(Utc::now())
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}
