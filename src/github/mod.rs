//! # Issue-Tracking API
//!
//! The batch talks to GitHub through the [`IssueTracker`] trait.
//!
//! | Implementation | Used by |
//! |----------------|---------|
//! | [`GitHubClient`] | `issue-batch run` (REST API v3) |
//! | [`InMemoryTracker`] | `issue-batch plan` and tests |
//!
//! All calls are scoped to one repository, fixed when the tracker is built.

mod client;
mod error;
mod memory;
mod models;

use async_trait::async_trait;

pub use client::{GitHubClient, GITHUB_API_BASE};
pub use error::{ApiError, ApiSubError, ALREADY_EXISTS};
pub use memory::{InMemoryTracker, StoredIssue};
pub use models::{
    title_search_query, InvalidRepoRef, Issue, Milestone, NewIssue, NewLabel, RepoRef, SearchState,
};

/// Operations the batch needs from an issue tracker
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Lists every milestone in the repository, open or closed
    async fn list_milestones(&self) -> Result<Vec<Milestone>, ApiError>;

    async fn create_milestone(&self, title: &str, description: &str) -> Result<Milestone, ApiError>;

    async fn create_issue(&self, issue: &NewIssue) -> Result<Issue, ApiError>;

    /// Finds issues whose title contains `title` (not necessarily exactly)
    async fn search_issues(&self, title: &str, state: SearchState) -> Result<Vec<Issue>, ApiError>;

    /// Replaces the body of an existing issue
    async fn update_issue_body(&self, number: u64, body: &str) -> Result<Issue, ApiError>;

    async fn create_label(&self, label: &NewLabel) -> Result<(), ApiError>;
}
