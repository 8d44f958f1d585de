//! Team and membership queries.

use crate::db::pool::DbPool;
use crate::error::{is_unique_violation, AppError};
use crate::models::{Team, TeamMember};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

/// Insert the team if its name is new, returning its id either way.
///
/// Must run inside a transaction: this is the first write of `create_team`.
pub async fn insert_or_get_team(conn: &mut SqliteConnection, team_name: &str) -> Result<i64, AppError> {
    sqlx::query("INSERT INTO teams (team_name) VALUES (?) ON CONFLICT (team_name) DO NOTHING")
        .bind(team_name)
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::team_exists(team_name)
            } else {
                AppError::from(e)
            }
        })?;

    let team_id: Option<i64> = sqlx::query_scalar("SELECT team_id FROM teams WHERE team_name = ?")
        .bind(team_name)
        .fetch_optional(&mut *conn)
        .await?;

    team_id.ok_or_else(|| AppError::team_not_found(team_name))
}

/// Point the user's single membership row at `team_id`, detaching any
/// previous team.
pub async fn upsert_membership(
    conn: &mut SqliteConnection,
    team_id: i64,
    user_id: &str,
    joined_at: i64,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO team_memberships (user_id, team_id, joined_at)
        VALUES (?, ?, ?)
        ON CONFLICT (user_id)
        DO UPDATE SET team_id = excluded.team_id,
                      joined_at = excluded.joined_at
        "#,
    )
    .bind(user_id)
    .bind(team_id)
    .bind(joined_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Load a team and its members ordered by username.
pub async fn get_team_by_name(pool: &DbPool, team_name: &str) -> Result<Team, AppError> {
    let row: Option<(i64, String)> =
        sqlx::query_as("SELECT team_id, team_name FROM teams WHERE team_name = ?")
            .bind(team_name)
            .fetch_optional(pool)
            .await?;

    let (id, name) = row.ok_or_else(|| AppError::team_not_found(team_name))?;

    let members: Vec<TeamMember> = sqlx::query_as(
        r#"
        SELECT u.user_id, u.username, u.is_active
        FROM team_memberships tm
        JOIN users u ON u.user_id = tm.user_id
        WHERE tm.team_id = ?
        ORDER BY u.username, u.user_id
        "#,
    )
    .bind(id)
    .fetch_all(pool)
    .await?;

    Ok(Team { id, name, members })
}

/// Active members of a team outside `exclude`, ordered by user id.
///
/// The stable order keeps seeded reviewer picks reproducible; randomness is
/// applied by the caller's picker.
pub async fn list_eligible_reviewers(
    conn: &mut SqliteConnection,
    team_id: i64,
    exclude: &[String],
) -> Result<Vec<String>, AppError> {
    let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
        r#"
        SELECT u.user_id
        FROM team_memberships tm
        JOIN users u ON u.user_id = tm.user_id
        WHERE tm.team_id = "#,
    );
    query.push_bind(team_id);
    query.push(" AND u.is_active = 1");

    if !exclude.is_empty() {
        query.push(" AND u.user_id NOT IN (");
        let mut separated = query.separated(", ");
        for user_id in exclude {
            separated.push_bind(user_id.clone());
        }
        separated.push_unseparated(")");
    }

    query.push(" ORDER BY u.user_id");

    let candidates: Vec<String> = query
        .build_query_scalar::<String>()
        .fetch_all(&mut *conn)
        .await?;

    Ok(candidates)
}
