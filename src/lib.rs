//! Reviewer Service - assigns and rotates pull request reviewers within teams.
//!
//! The assignment engine (`services::assignment`) owns the rules; the
//! storage layer (`db`) persists teams, users and reviewer assignments in
//! SQLite; `services::http_api` exposes the engine over HTTP.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use error::AppError;
pub use services::AssignmentService;
