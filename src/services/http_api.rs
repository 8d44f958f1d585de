//! REST API routes.
//!
//! Thin translation layer: decode and validate JSON, call the assignment
//! engine, and map its errors to status codes and stable error codes.

use crate::error::AppError;
use crate::models::{PullRequest, PullRequestShort, Team, TeamMember, User};
use crate::services::assignment::{AssignmentService, Reassignment};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Shared state for the API routes.
#[derive(Clone)]
pub struct ApiState {
    pub service: AssignmentService,
}

// ── Error handling ───────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

/// Wrapper to make AppError usable as an axum error response.
pub struct ApiErr(AppError);

impl ApiErr {
    fn status(&self) -> StatusCode {
        match &self.0 {
            AppError::TeamExists { .. } | AppError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            AppError::TeamNotFound { .. }
            | AppError::UserNotFound { .. }
            | AppError::PullRequestNotFound { .. } => StatusCode::NOT_FOUND,
            AppError::PullRequestExists { .. }
            | AppError::PullRequestMerged { .. }
            | AppError::ReviewerNotAssigned { .. }
            | AppError::NoCandidate { .. } => StatusCode::CONFLICT,
            AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiErr {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if self.0.is_internal() {
            log::error!("[http] {}", self.0);
            "internal server error".to_string()
        } else if self.0.is_domain_rule() {
            log::debug!("[http] {} {}", status.as_u16(), self.0);
            self.0.to_string()
        } else {
            log::info!("[http] Rejected request: {}", self.0);
            self.0.to_string()
        };

        error_response(status, self.0.code(), message)
    }
}

/// Build the `{error:{code,message}}` body shared by handlers and middleware.
pub(crate) fn error_response(status: StatusCode, code: &'static str, message: String) -> Response {
    (
        status,
        Json(ErrorBody {
            error: ErrorDetail { code, message },
        }),
    )
        .into_response()
}

impl From<AppError> for ApiErr {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiErr {
    fn from(rejection: JsonRejection) -> Self {
        Self(AppError::invalid_input(rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiErr {
    fn from(rejection: QueryRejection) -> Self {
        Self(AppError::invalid_input(rejection.body_text()))
    }
}

/// Reject a missing body field. Values are passed on verbatim.
fn required<'a>(value: &'a str, field: &str) -> Result<&'a str, ApiErr> {
    if value.is_empty() {
        return Err(AppError::invalid_input_field(format!("{} is required", field), field).into());
    }
    Ok(value)
}

/// Reject a missing query parameter, ignoring surrounding whitespace.
fn required_param<'a>(value: &'a str, field: &str) -> Result<&'a str, ApiErr> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::invalid_input_field(
            format!("{} query parameter is required", field),
            field,
        )
        .into());
    }
    Ok(trimmed)
}

// ── Request types ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct MemberRequest {
    #[serde(default)]
    user_id: String,
    #[serde(default)]
    username: String,
    #[serde(default)]
    is_active: bool,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CreateTeamRequest {
    #[serde(default)]
    team_name: String,
    #[serde(default)]
    members: Vec<MemberRequest>,
}

#[derive(Deserialize)]
struct TeamQuery {
    #[serde(default)]
    team_name: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SetActiveRequest {
    #[serde(default)]
    user_id: String,
    #[serde(default)]
    is_active: bool,
}

#[derive(Deserialize)]
struct UserQuery {
    #[serde(default)]
    user_id: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CreatePullRequestRequest {
    #[serde(default)]
    pull_request_id: String,
    #[serde(default)]
    pull_request_name: String,
    #[serde(default)]
    author_id: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct MergePullRequestRequest {
    #[serde(default)]
    pull_request_id: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ReassignRequest {
    #[serde(default)]
    pull_request_id: String,
    old_user_id: Option<String>,
    /// Older clients send this name.
    old_reviewer_id: Option<String>,
}

// ── Response types ───────────────────────────────────────────────────────────

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: String,
}

#[derive(Serialize)]
struct TeamResponse {
    team_name: String,
    members: Vec<TeamMember>,
}

impl From<Team> for TeamResponse {
    fn from(team: Team) -> Self {
        Self {
            team_name: team.name,
            members: team.members,
        }
    }
}

#[derive(Serialize)]
struct TeamEnvelope {
    team: TeamResponse,
}

#[derive(Serialize)]
struct UserResponse {
    user_id: String,
    username: String,
    /// Empty when the user has no team.
    team_name: String,
    is_active: bool,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            team_name: user.team_name().unwrap_or_default().to_string(),
            user_id: user.id,
            username: user.username,
            is_active: user.is_active,
        }
    }
}

#[derive(Serialize)]
struct UserEnvelope {
    user: UserResponse,
}

#[derive(Serialize)]
struct PullRequestResponse {
    pull_request_id: String,
    pull_request_name: String,
    author_id: String,
    status: &'static str,
    assigned_reviewers: Vec<String>,
    #[serde(rename = "createdAt")]
    created_at: Option<String>,
    #[serde(rename = "mergedAt", skip_serializing_if = "Option::is_none")]
    merged_at: Option<String>,
}

impl From<PullRequest> for PullRequestResponse {
    fn from(pr: PullRequest) -> Self {
        Self {
            status: pr.status.as_str(),
            created_at: format_timestamp(pr.created_at),
            merged_at: pr.merged_at.and_then(format_timestamp),
            pull_request_id: pr.id,
            pull_request_name: pr.name,
            author_id: pr.author_id,
            assigned_reviewers: pr.reviewers,
        }
    }
}

#[derive(Serialize)]
struct PullRequestEnvelope {
    pr: PullRequestResponse,
}

#[derive(Serialize)]
struct ReassignResponse {
    pr: PullRequestResponse,
    replaced_by: String,
}

impl From<Reassignment> for ReassignResponse {
    fn from(r: Reassignment) -> Self {
        Self {
            pr: r.pull_request.into(),
            replaced_by: r.replaced_by,
        }
    }
}

#[derive(Serialize)]
struct PullRequestShortResponse {
    pull_request_id: String,
    pull_request_name: String,
    author_id: String,
    status: &'static str,
}

impl From<PullRequestShort> for PullRequestShortResponse {
    fn from(pr: PullRequestShort) -> Self {
        Self {
            status: pr.status.as_str(),
            pull_request_id: pr.id,
            pull_request_name: pr.name,
            author_id: pr.author_id,
        }
    }
}

#[derive(Serialize)]
struct ReviewListResponse {
    user_id: String,
    pull_requests: Vec<PullRequestShortResponse>,
}

/// Unix seconds as RFC 3339 UTC.
fn format_timestamp(secs: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp(secs, 0).map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
}

// ── Route builder ────────────────────────────────────────────────────────────

/// Build the API routes.
pub fn api_routes() -> Router<ApiState> {
    Router::new()
        .route("/health", get(health))
        .route("/team/add", post(add_team))
        .route("/team/get", get(get_team))
        .route("/users/setIsActive", post(set_user_active))
        .route("/users/getReview", get(get_review))
        .route("/pullRequest/create", post(create_pull_request))
        .route("/pullRequest/merge", post(merge_pull_request))
        .route("/pullRequest/reassign", post(reassign_reviewer))
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    })
}

/// POST /team/add: create a team or re-apply its membership.
async fn add_team(
    State(state): State<ApiState>,
    payload: Result<Json<CreateTeamRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TeamEnvelope>), ApiErr> {
    let Json(req) = payload?;
    let team_name = required(&req.team_name, "team_name")?;

    let mut members = Vec::with_capacity(req.members.len());
    for m in &req.members {
        let user_id = required(&m.user_id, "members.user_id")?;
        let username = required(&m.username, "members.username")?;
        members.push(TeamMember::new(user_id, username, m.is_active));
    }

    let team = state.service.create_team(team_name, &members).await?;

    Ok((
        StatusCode::CREATED,
        Json(TeamEnvelope { team: team.into() }),
    ))
}

/// GET /team/get?team_name=X
async fn get_team(
    State(state): State<ApiState>,
    query: Result<Query<TeamQuery>, QueryRejection>,
) -> Result<Json<TeamResponse>, ApiErr> {
    let Query(params) = query?;
    let team_name = required_param(&params.team_name, "team_name")?;

    let team = state.service.get_team(team_name).await?;
    Ok(Json(team.into()))
}

/// POST /users/setIsActive
async fn set_user_active(
    State(state): State<ApiState>,
    payload: Result<Json<SetActiveRequest>, JsonRejection>,
) -> Result<Json<UserEnvelope>, ApiErr> {
    let Json(req) = payload?;
    let user_id = required(&req.user_id, "user_id")?;

    let user = state.service.set_user_activity(user_id, req.is_active).await?;
    Ok(Json(UserEnvelope { user: user.into() }))
}

/// GET /users/getReview?user_id=X: pull requests the user reviews.
async fn get_review(
    State(state): State<ApiState>,
    query: Result<Query<UserQuery>, QueryRejection>,
) -> Result<Json<ReviewListResponse>, ApiErr> {
    let Query(params) = query?;
    let user_id = required_param(&params.user_id, "user_id")?;

    let prs = state.service.list_reviewer_pull_requests(user_id).await?;
    Ok(Json(ReviewListResponse {
        user_id: user_id.to_string(),
        pull_requests: prs.into_iter().map(Into::into).collect(),
    }))
}

/// POST /pullRequest/create
async fn create_pull_request(
    State(state): State<ApiState>,
    payload: Result<Json<CreatePullRequestRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PullRequestEnvelope>), ApiErr> {
    let Json(req) = payload?;
    let pull_request_id = required(&req.pull_request_id, "pull_request_id")?;
    let name = required(&req.pull_request_name, "pull_request_name")?;
    let author_id = required(&req.author_id, "author_id")?;

    let pr = state
        .service
        .create_pull_request(pull_request_id, name, author_id)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(PullRequestEnvelope { pr: pr.into() }),
    ))
}

/// POST /pullRequest/merge
async fn merge_pull_request(
    State(state): State<ApiState>,
    payload: Result<Json<MergePullRequestRequest>, JsonRejection>,
) -> Result<Json<PullRequestEnvelope>, ApiErr> {
    let Json(req) = payload?;
    let pull_request_id = required(&req.pull_request_id, "pull_request_id")?;

    let pr = state.service.merge_pull_request(pull_request_id).await?;
    Ok(Json(PullRequestEnvelope { pr: pr.into() }))
}

/// POST /pullRequest/reassign
async fn reassign_reviewer(
    State(state): State<ApiState>,
    payload: Result<Json<ReassignRequest>, JsonRejection>,
) -> Result<Json<ReassignResponse>, ApiErr> {
    let Json(req) = payload?;
    let pull_request_id = required(&req.pull_request_id, "pull_request_id")?;
    let old_reviewer = req
        .old_user_id
        .as_deref()
        .filter(|s| !s.is_empty())
        .or(req.old_reviewer_id.as_deref())
        .unwrap_or_default();
    let old_reviewer = required(old_reviewer, "old_user_id")?;

    let reassignment = state
        .service
        .reassign_reviewer(pull_request_id, old_reviewer)
        .await?;

    Ok(Json(reassignment.into()))
}
