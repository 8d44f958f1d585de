//! Domain models.
//!
//! These types are what the assignment engine returns to its callers. Row
//! types used only for decoding SQLite results live next to the models they
//! convert into.

pub mod pull_request;
pub mod team;
pub mod user;

// Re-exports for convenient access
pub use pull_request::{PullRequest, PullRequestShort, PullRequestStatus};
pub use team::{Team, TeamMember};
pub use user::{Affiliation, TeamRef, User};
