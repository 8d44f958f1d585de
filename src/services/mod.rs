//! Business logic services.
//!
//! - `assignment`: the reviewer-assignment engine
//! - `reviewer_picker`: injectable random selection
//! - `http_api` / `http_server`: the HTTP boundary in front of the engine

pub mod assignment;
pub mod http_api;
pub mod http_server;
pub mod reviewer_picker;

pub use assignment::{AssignmentService, Reassignment, REVIEWERS_PER_PULL_REQUEST};
pub use reviewer_picker::{ReviewerPicker, SeededPicker, ThreadRngPicker};
