//! Pull request model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Lifecycle state of a pull request. `Merged` is absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "UPPERCASE")]
pub enum PullRequestStatus {
    Open,
    Merged,
}

impl PullRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Merged => "MERGED",
        }
    }
}

impl std::fmt::Display for PullRequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pull request with its reviewers in assignment order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullRequest {
    pub id: String,
    pub name: String,
    pub author_id: String,
    pub status: PullRequestStatus,
    /// Creation timestamp (Unix).
    pub created_at: i64,
    /// Merge timestamp (Unix), set once when first merged.
    pub merged_at: Option<i64>,
    pub reviewers: Vec<String>,
}

impl PullRequest {
    pub fn is_merged(&self) -> bool {
        self.status == PullRequestStatus::Merged
    }

    pub fn has_reviewer(&self, user_id: &str) -> bool {
        self.reviewers.iter().any(|r| r == user_id)
    }
}

/// Short listing form used by the reviewer inbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct PullRequestShort {
    pub id: String,
    pub name: String,
    pub author_id: String,
    pub status: PullRequestStatus,
}

/// `pull_requests` row before reviewers are attached.
#[derive(Debug, FromRow)]
pub(crate) struct PullRequestRow {
    pub id: String,
    pub name: String,
    pub author_id: String,
    pub status: PullRequestStatus,
    pub created_at: i64,
    pub merged_at: Option<i64>,
}

impl PullRequestRow {
    pub fn with_reviewers(self, reviewers: Vec<String>) -> PullRequest {
        PullRequest {
            id: self.id,
            name: self.name,
            author_id: self.author_id,
            status: self.status,
            created_at: self.created_at,
            merged_at: self.merged_at,
            reviewers,
        }
    }
}
