//! User model and team affiliation.

use serde::Serialize;
use sqlx::FromRow;

/// Reference to the team a user belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeamRef {
    pub id: i64,
    pub name: String,
}

/// A user belongs to zero or one team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "team", rename_all = "snake_case")]
pub enum Affiliation {
    Unaffiliated,
    AffiliatedWith(TeamRef),
}

impl Affiliation {
    pub fn team(&self) -> Option<&TeamRef> {
        match self {
            Self::Unaffiliated => None,
            Self::AffiliatedWith(team) => Some(team),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub is_active: bool,
    pub affiliation: Affiliation,
}

impl User {
    pub fn team_name(&self) -> Option<&str> {
        self.affiliation.team().map(|t| t.name.as_str())
    }
}

/// Flat row produced by joining `users` with its optional membership.
#[derive(Debug, FromRow)]
pub(crate) struct UserRow {
    pub user_id: String,
    pub username: String,
    pub is_active: bool,
    pub team_id: Option<i64>,
    pub team_name: Option<String>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        let affiliation = match (row.team_id, row.team_name) {
            (Some(id), Some(name)) => Affiliation::AffiliatedWith(TeamRef { id, name }),
            _ => Affiliation::Unaffiliated,
        };

        Self {
            id: row.user_id,
            username: row.username,
            is_active: row.is_active,
            affiliation,
        }
    }
}
