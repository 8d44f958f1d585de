//! Application error types.
//!
//! Every failure the assignment engine can report is a variant of
//! [`AppError`]. The HTTP boundary maps each variant to a status code and a
//! stable machine-readable code; storage failures collapse into `Internal`.

use thiserror::Error;

/// Application-level errors returned by the assignment engine.
#[derive(Debug, Error)]
pub enum AppError {
    /// A concurrent create claimed the team name first.
    #[error("team already exists: {team_name}")]
    TeamExists { team_name: String },

    /// Team is absent, or the user has no team to draw reviewers from.
    #[error("team not found: {lookup}")]
    TeamNotFound { lookup: String },

    #[error("user not found: {user_id}")]
    UserNotFound { user_id: String },

    #[error("pull request already exists: {pull_request_id}")]
    PullRequestExists { pull_request_id: String },

    #[error("pull request not found: {pull_request_id}")]
    PullRequestNotFound { pull_request_id: String },

    /// Reviewer sets are frozen once a pull request is merged.
    #[error("pull request already merged: {pull_request_id}")]
    PullRequestMerged { pull_request_id: String },

    #[error("reviewer {reviewer_id} is not assigned to {pull_request_id}")]
    ReviewerNotAssigned {
        pull_request_id: String,
        reviewer_id: String,
    },

    /// No active teammate is eligible to take over the review.
    #[error("no active replacement candidate for {pull_request_id}")]
    NoCandidate { pull_request_id: String },

    /// Malformed request, rejected before the engine is called.
    #[error("invalid input: {message}")]
    InvalidInput {
        message: String,
        field: Option<String>,
    },

    /// Storage or transport failure.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl AppError {
    pub fn team_exists(team_name: impl Into<String>) -> Self {
        Self::TeamExists {
            team_name: team_name.into(),
        }
    }

    pub fn team_not_found(team_name: impl Into<String>) -> Self {
        Self::TeamNotFound {
            lookup: team_name.into(),
        }
    }

    /// The user exists but is not a member of any team.
    pub fn team_not_found_for_user(user_id: &str) -> Self {
        Self::TeamNotFound {
            lookup: format!("user {} has no team", user_id),
        }
    }

    pub fn user_not_found(user_id: impl Into<String>) -> Self {
        Self::UserNotFound {
            user_id: user_id.into(),
        }
    }

    pub fn pull_request_exists(pull_request_id: impl Into<String>) -> Self {
        Self::PullRequestExists {
            pull_request_id: pull_request_id.into(),
        }
    }

    pub fn pull_request_not_found(pull_request_id: impl Into<String>) -> Self {
        Self::PullRequestNotFound {
            pull_request_id: pull_request_id.into(),
        }
    }

    pub fn pull_request_merged(pull_request_id: impl Into<String>) -> Self {
        Self::PullRequestMerged {
            pull_request_id: pull_request_id.into(),
        }
    }

    pub fn reviewer_not_assigned(
        pull_request_id: impl Into<String>,
        reviewer_id: impl Into<String>,
    ) -> Self {
        Self::ReviewerNotAssigned {
            pull_request_id: pull_request_id.into(),
            reviewer_id: reviewer_id.into(),
        }
    }

    pub fn no_candidate(pull_request_id: impl Into<String>) -> Self {
        Self::NoCandidate {
            pull_request_id: pull_request_id.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            field: None,
        }
    }

    /// Create an invalid input error with field name.
    pub fn invalid_input_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Stable machine-readable code exposed to API callers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::TeamExists { .. } => "TEAM_EXISTS",
            Self::TeamNotFound { .. }
            | Self::UserNotFound { .. }
            | Self::PullRequestNotFound { .. } => "NOT_FOUND",
            Self::PullRequestExists { .. } => "PR_EXISTS",
            Self::PullRequestMerged { .. } => "PR_MERGED",
            Self::ReviewerNotAssigned { .. } => "NOT_ASSIGNED",
            Self::NoCandidate { .. } => "NO_CANDIDATE",
            Self::InvalidInput { .. } => "INVALID_INPUT",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    /// True when a well-formed request was refused by a business rule,
    /// as opposed to bad input or an internal failure.
    pub fn is_domain_rule(&self) -> bool {
        !matches!(self, Self::InvalidInput { .. } | Self::Internal { .. })
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }
}

// Conversions from common error types

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::internal(format!("database: {}", err))
    }
}

impl From<crate::db::DbError> for AppError {
    fn from(err: crate::db::DbError) -> Self {
        Self::internal(err.to_string())
    }
}

/// Whether a sqlx error is a UNIQUE / PRIMARY KEY constraint violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}
