//! User queries.

use crate::error::AppError;
use crate::models::user::UserRow;
use crate::models::{TeamMember, User};
use sqlx::{Executor, Sqlite, SqliteConnection};

/// Insert the user or refresh username and active flag.
pub async fn upsert_user(conn: &mut SqliteConnection, member: &TeamMember) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO users (user_id, username, is_active, updated_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT (user_id)
        DO UPDATE SET username = excluded.username,
                      is_active = excluded.is_active,
                      updated_at = excluded.updated_at
        "#,
    )
    .bind(&member.user_id)
    .bind(&member.username)
    .bind(member.is_active)
    .bind(super::now())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Load a user together with its team affiliation, if any.
pub async fn get_user<'e, E>(executor: E, user_id: &str) -> Result<User, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row: Option<UserRow> = sqlx::query_as(
        r#"
        SELECT u.user_id, u.username, u.is_active, tm.team_id, t.team_name
        FROM users u
        LEFT JOIN team_memberships tm ON tm.user_id = u.user_id
        LEFT JOIN teams t ON t.team_id = tm.team_id
        WHERE u.user_id = ?
        "#,
    )
    .bind(user_id)
    .fetch_optional(executor)
    .await?;

    row.map(User::from)
        .ok_or_else(|| AppError::user_not_found(user_id))
}

/// Set the active flag of an existing user.
///
/// Fails with `UserNotFound` when no row was updated.
pub async fn set_user_active(
    conn: &mut SqliteConnection,
    user_id: &str,
    is_active: bool,
) -> Result<(), AppError> {
    let result = sqlx::query("UPDATE users SET is_active = ?, updated_at = ? WHERE user_id = ?")
        .bind(is_active)
        .bind(super::now())
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::user_not_found(user_id));
    }

    Ok(())
}
