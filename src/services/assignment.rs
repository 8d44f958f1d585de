//! Reviewer assignment engine.
//!
//! Owns the business rules: idempotent team upsert, reviewer selection on
//! pull request creation, reassignment and merge. The engine keeps no
//! mutable state of its own. Every multi-row mutation runs in one SQLite
//! transaction that opens with a write, so the writer lock is held before
//! any precondition is re-checked; the re-check then decides whether the
//! mutation commits.

use crate::db::pool::DbPool;
use crate::db::{now, pull_requests, teams, users};
use crate::error::AppError;
use crate::models::{Affiliation, PullRequest, PullRequestShort, Team, TeamMember, User};
use crate::services::reviewer_picker::{ReviewerPicker, ThreadRngPicker};
use serde::Serialize;
use sqlx::{Sqlite, Transaction};
use std::sync::Arc;

/// Reviewers drawn when a pull request is opened.
pub const REVIEWERS_PER_PULL_REQUEST: usize = 2;

/// Outcome of a successful reassignment.
#[derive(Debug, Clone, Serialize)]
pub struct Reassignment {
    pub pull_request: PullRequest,
    pub replaced_by: String,
}

/// Entry point for every reviewer-assignment operation.
#[derive(Clone)]
pub struct AssignmentService {
    pool: DbPool,
    picker: Arc<dyn ReviewerPicker>,
}

impl AssignmentService {
    /// Create a service drawing reviewers with the thread-local RNG.
    pub fn new(pool: DbPool) -> Self {
        Self::with_picker(pool, Arc::new(ThreadRngPicker))
    }

    /// Create a service with an injected picker (e.g. a seeded one in tests).
    pub fn with_picker(pool: DbPool, picker: Arc<dyn ReviewerPicker>) -> Self {
        Self { pool, picker }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Create the team if needed and (re)bind every listed member to it.
    ///
    /// Members moved in from another team are detached from it. The team
    /// row and all member upserts commit together or not at all.
    pub async fn create_team(&self, team_name: &str, members: &[TeamMember]) -> Result<Team, AppError> {
        let mut tx = self.pool.begin().await?;

        let team_id = teams::insert_or_get_team(&mut tx, team_name).await?;
        let joined_at = now();
        for member in members {
            users::upsert_user(&mut tx, member).await?;
            teams::upsert_membership(&mut tx, team_id, &member.user_id, joined_at).await?;
        }

        tx.commit().await?;
        log::info!(
            "[assign] Team {} saved with {} listed members",
            team_name,
            members.len()
        );

        teams::get_team_by_name(&self.pool, team_name).await
    }

    pub async fn get_team(&self, team_name: &str) -> Result<Team, AppError> {
        teams::get_team_by_name(&self.pool, team_name).await
    }

    /// Flip a user's active flag and return the refreshed user.
    pub async fn set_user_activity(&self, user_id: &str, is_active: bool) -> Result<User, AppError> {
        let mut tx = self.pool.begin().await?;

        users::set_user_active(&mut tx, user_id, is_active).await?;
        let user = users::get_user(&mut *tx, user_id).await?;

        tx.commit().await?;
        log::info!("[assign] User {} active={}", user_id, is_active);

        Ok(user)
    }

    /// Open a pull request and assign up to two active teammates of the author.
    ///
    /// Fewer eligible teammates means fewer reviewers, down to none.
    pub async fn create_pull_request(
        &self,
        pull_request_id: &str,
        name: &str,
        author_id: &str,
    ) -> Result<PullRequest, AppError> {
        let author = users::get_user(&self.pool, author_id).await?;
        if author.affiliation == Affiliation::Unaffiliated {
            return Err(AppError::team_not_found_for_user(author_id));
        }

        let mut tx = self.pool.begin().await?;
        let created_at = now();

        pull_requests::insert_pull_request(&mut tx, pull_request_id, name, author_id, created_at)
            .await?;

        // Membership may have moved since the pre-check.
        let author = users::get_user(&mut *tx, author_id).await?;
        let team = match author.affiliation {
            Affiliation::AffiliatedWith(team) => team,
            Affiliation::Unaffiliated => {
                return abort(tx, AppError::team_not_found_for_user(author_id)).await;
            }
        };

        let eligible =
            teams::list_eligible_reviewers(&mut tx, team.id, &[author_id.to_string()]).await?;
        let reviewers = self.picker.pick(eligible, REVIEWERS_PER_PULL_REQUEST);

        pull_requests::add_reviewers(&mut tx, pull_request_id, &reviewers, created_at).await?;
        tx.commit().await?;

        log::info!(
            "[assign] Pull request {} opened by {} in team {} with reviewers {:?}",
            pull_request_id,
            author_id,
            team.name,
            reviewers
        );

        self.load_pull_request(pull_request_id).await
    }

    /// Replace one reviewer with a random active teammate of that reviewer.
    ///
    /// The replacement is never the author, the reviewer being replaced, or
    /// anyone already reviewing. Both the removal and the insertion commit
    /// together; a concurrent removal of the same reviewer makes this call
    /// fail with `ReviewerNotAssigned` and change nothing.
    pub async fn reassign_reviewer(
        &self,
        pull_request_id: &str,
        old_reviewer_id: &str,
    ) -> Result<Reassignment, AppError> {
        let pr = self.load_pull_request(pull_request_id).await?;
        if pr.is_merged() {
            return Err(AppError::pull_request_merged(pull_request_id));
        }
        if !pr.has_reviewer(old_reviewer_id) {
            return Err(AppError::reviewer_not_assigned(
                pull_request_id,
                old_reviewer_id,
            ));
        }

        let old_reviewer = users::get_user(&self.pool, old_reviewer_id).await?;
        if old_reviewer.affiliation == Affiliation::Unaffiliated {
            return Err(AppError::no_candidate(pull_request_id));
        }

        let mut tx = self.pool.begin().await?;

        // The delete must hit a row, otherwise someone else already freed the slot.
        let removed = pull_requests::remove_reviewer(&mut tx, pull_request_id, old_reviewer_id).await?;
        if removed == 0 {
            return abort(
                tx,
                AppError::reviewer_not_assigned(pull_request_id, old_reviewer_id),
            )
            .await;
        }

        let current = pull_requests::get_pull_request(&mut tx, pull_request_id).await?;
        if current.is_merged() {
            return abort(tx, AppError::pull_request_merged(pull_request_id)).await;
        }

        // The old reviewer may have changed teams since the pre-check.
        let old_reviewer = users::get_user(&mut *tx, old_reviewer_id).await?;
        let team = match old_reviewer.affiliation {
            Affiliation::AffiliatedWith(team) => team,
            Affiliation::Unaffiliated => {
                return abort(tx, AppError::no_candidate(pull_request_id)).await;
            }
        };

        let mut exclude = Vec::with_capacity(current.reviewers.len() + 2);
        exclude.push(current.author_id.clone());
        exclude.push(old_reviewer_id.to_string());
        exclude.extend(current.reviewers.iter().cloned());

        let eligible = teams::list_eligible_reviewers(&mut tx, team.id, &exclude).await?;
        let replacement = match self.picker.pick(eligible, 1).pop() {
            Some(user_id) => user_id,
            None => return abort(tx, AppError::no_candidate(pull_request_id)).await,
        };

        pull_requests::add_reviewers(
            &mut tx,
            pull_request_id,
            std::slice::from_ref(&replacement),
            now(),
        )
        .await?;
        tx.commit().await?;

        log::info!(
            "[assign] Pull request {}: reviewer {} replaced by {}",
            pull_request_id,
            old_reviewer_id,
            replacement
        );

        let pull_request = self.load_pull_request(pull_request_id).await?;
        Ok(Reassignment {
            pull_request,
            replaced_by: replacement,
        })
    }

    /// Mark a pull request merged. Merging twice returns the unchanged state.
    pub async fn merge_pull_request(&self, pull_request_id: &str) -> Result<PullRequest, AppError> {
        let pr = self.load_pull_request(pull_request_id).await?;
        if pr.is_merged() {
            log::debug!("[assign] Pull request {} already merged", pull_request_id);
            return Ok(pr);
        }

        let mut tx = self.pool.begin().await?;

        let updated = pull_requests::mark_merged(&mut tx, pull_request_id, now()).await?;
        if updated == 0 {
            return abort(tx, AppError::pull_request_not_found(pull_request_id)).await;
        }

        tx.commit().await?;
        log::info!("[assign] Pull request {} merged", pull_request_id);

        self.load_pull_request(pull_request_id).await
    }

    /// Pull requests the user currently reviews, newest first.
    pub async fn list_reviewer_pull_requests(
        &self,
        user_id: &str,
    ) -> Result<Vec<PullRequestShort>, AppError> {
        pull_requests::list_for_reviewer(&self.pool, user_id).await
    }

    async fn load_pull_request(&self, pull_request_id: &str) -> Result<PullRequest, AppError> {
        let mut conn = self.pool.acquire().await?;
        pull_requests::get_pull_request(&mut conn, pull_request_id).await
    }
}

/// Roll back and surface `err`.
async fn abort<T>(tx: Transaction<'_, Sqlite>, err: AppError) -> Result<T, AppError> {
    if let Err(e) = tx.rollback().await {
        log::warn!("[assign] Rollback failed after {}: {}", err, e);
    }
    log::debug!("[assign] Transaction aborted: {}", err);
    Err(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PullRequestStatus;
    use crate::services::reviewer_picker::SeededPicker;
    use tempfile::tempdir;

    async fn setup_service() -> AssignmentService {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        std::mem::forget(dir);

        let pool = crate::db::initialize(&db_path, 2).await.unwrap();
        AssignmentService::with_picker(pool, Arc::new(SeededPicker::new(1)))
    }

    fn member(id: &str, name: &str) -> TeamMember {
        TeamMember::new(id, name, true)
    }

    #[tokio::test]
    async fn test_create_pull_request_unknown_author() {
        let svc = setup_service().await;
        let err = svc.create_pull_request("pr-1", "x", "ghost").await.unwrap_err();
        assert!(matches!(err, AppError::UserNotFound { .. }));
    }

    #[tokio::test]
    async fn test_create_pull_request_duplicate_id_rolls_back() {
        let svc = setup_service().await;
        svc.create_team("backend", &[member("u1", "alice"), member("u2", "bob")])
            .await
            .unwrap();

        let first = svc.create_pull_request("pr-1", "first", "u1").await.unwrap();
        let err = svc.create_pull_request("pr-1", "second", "u2").await.unwrap_err();
        assert!(matches!(err, AppError::PullRequestExists { .. }));

        let after = svc.load_pull_request("pr-1").await.unwrap();
        assert_eq!(after.name, "first");
        assert_eq!(after.reviewers, first.reviewers);
    }

    #[tokio::test]
    async fn test_reassign_unaffiliated_reviewer_has_no_candidate() {
        let svc = setup_service().await;
        svc.create_team("backend", &[member("u1", "alice"), member("u2", "bob")])
            .await
            .unwrap();
        svc.create_pull_request("pr-1", "x", "u1").await.unwrap();

        // Detach bob from every team behind the engine's back.
        sqlx::query("DELETE FROM team_memberships WHERE user_id = 'u2'")
            .execute(svc.pool())
            .await
            .unwrap();

        let err = svc.reassign_reviewer("pr-1", "u2").await.unwrap_err();
        assert!(matches!(err, AppError::NoCandidate { .. }));
    }

    #[tokio::test]
    async fn test_merge_missing_pull_request() {
        let svc = setup_service().await;
        let err = svc.merge_pull_request("nope").await.unwrap_err();
        assert!(matches!(err, AppError::PullRequestNotFound { .. }));
    }

    #[tokio::test]
    async fn test_merge_sets_timestamp_once() {
        let svc = setup_service().await;
        svc.create_team("backend", &[member("u1", "alice")]).await.unwrap();
        svc.create_pull_request("pr-1", "x", "u1").await.unwrap();

        let merged = svc.merge_pull_request("pr-1").await.unwrap();
        assert_eq!(merged.status, PullRequestStatus::Merged);
        assert!(merged.merged_at.is_some());

        let again = svc.merge_pull_request("pr-1").await.unwrap();
        assert_eq!(again, merged);
    }
}
