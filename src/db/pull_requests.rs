//! Pull request and reviewer assignment queries.

use crate::db::pool::DbPool;
use crate::error::{is_unique_violation, AppError};
use crate::models::pull_request::PullRequestRow;
use crate::models::{PullRequest, PullRequestShort, PullRequestStatus};
use sqlx::SqliteConnection;

/// Insert a new OPEN pull request.
///
/// A duplicate id fails with `PullRequestExists`.
pub async fn insert_pull_request(
    conn: &mut SqliteConnection,
    pull_request_id: &str,
    name: &str,
    author_id: &str,
    created_at: i64,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO pull_requests (pull_request_id, pull_request_name, author_id, status, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(pull_request_id)
    .bind(name)
    .bind(author_id)
    .bind(PullRequestStatus::Open)
    .bind(created_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::pull_request_exists(pull_request_id)
        } else {
            AppError::from(e)
        }
    })?;

    Ok(())
}

/// Append reviewer assignments in the given order.
pub async fn add_reviewers(
    conn: &mut SqliteConnection,
    pull_request_id: &str,
    reviewer_ids: &[String],
    assigned_at: i64,
) -> Result<(), AppError> {
    for reviewer_id in reviewer_ids {
        sqlx::query(
            "INSERT INTO pr_reviewers (pull_request_id, reviewer_id, assigned_at) VALUES (?, ?, ?)",
        )
        .bind(pull_request_id)
        .bind(reviewer_id)
        .bind(assigned_at)
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::internal(format!(
                    "reviewer {} already assigned to {}",
                    reviewer_id, pull_request_id
                ))
            } else {
                AppError::from(e)
            }
        })?;
    }

    Ok(())
}

/// Delete one reviewer assignment, returning the number of rows removed.
pub async fn remove_reviewer(
    conn: &mut SqliteConnection,
    pull_request_id: &str,
    reviewer_id: &str,
) -> Result<u64, AppError> {
    let result = sqlx::query("DELETE FROM pr_reviewers WHERE pull_request_id = ? AND reviewer_id = ?")
        .bind(pull_request_id)
        .bind(reviewer_id)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected())
}

/// Reviewer ids of a pull request in assignment order.
pub async fn list_reviewers(
    conn: &mut SqliteConnection,
    pull_request_id: &str,
) -> Result<Vec<String>, AppError> {
    let reviewers = sqlx::query_scalar(
        "SELECT reviewer_id FROM pr_reviewers WHERE pull_request_id = ? ORDER BY id",
    )
    .bind(pull_request_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(reviewers)
}

/// Load a pull request with its reviewers.
pub async fn get_pull_request(
    conn: &mut SqliteConnection,
    pull_request_id: &str,
) -> Result<PullRequest, AppError> {
    let row: Option<PullRequestRow> = sqlx::query_as(
        r#"
        SELECT pull_request_id AS id, pull_request_name AS name, author_id,
               status, created_at, merged_at
        FROM pull_requests
        WHERE pull_request_id = ?
        "#,
    )
    .bind(pull_request_id)
    .fetch_optional(&mut *conn)
    .await?;

    let row = row.ok_or_else(|| AppError::pull_request_not_found(pull_request_id))?;
    let reviewers = list_reviewers(conn, pull_request_id).await?;

    Ok(row.with_reviewers(reviewers))
}

/// Mark a pull request merged, keeping an existing merge timestamp.
///
/// Returns the number of rows updated; zero means the row is gone.
pub async fn mark_merged(
    conn: &mut SqliteConnection,
    pull_request_id: &str,
    merged_at: i64,
) -> Result<u64, AppError> {
    let result = sqlx::query(
        r#"
        UPDATE pull_requests
        SET status = ?,
            merged_at = COALESCE(merged_at, ?)
        WHERE pull_request_id = ?
        "#,
    )
    .bind(PullRequestStatus::Merged)
    .bind(merged_at)
    .bind(pull_request_id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

/// Pull requests the user currently reviews, newest first.
pub async fn list_for_reviewer(
    pool: &DbPool,
    reviewer_id: &str,
) -> Result<Vec<PullRequestShort>, AppError> {
    let prs = sqlx::query_as::<_, PullRequestShort>(
        r#"
        SELECT pr.pull_request_id AS id, pr.pull_request_name AS name,
               pr.author_id, pr.status
        FROM pr_reviewers rr
        JOIN pull_requests pr ON pr.pull_request_id = rr.pull_request_id
        WHERE rr.reviewer_id = ?
        ORDER BY pr.created_at DESC, pr.rowid DESC
        "#,
    )
    .bind(reviewer_id)
    .fetch_all(pool)
    .await?;

    Ok(prs)
}
