//! issue-batch - Bulk-create GitHub issues in dependency order
//!
//! Reads a document of milestones and issues, orders the issues so every
//! prerequisite exists before its dependents, and creates them through the
//! GitHub REST API. Dependent issues get a `Prerequisites: #N` line and the
//! `blocked` label.

pub mod batch;
pub mod cli;
pub mod config;
pub mod domain;
pub mod github;
pub mod render;

pub use batch::{BatchError, BatchOptions, BatchReport, BatchRunner};
pub use domain::{BatchSpec, IssueSpec, MilestoneSpec};
pub use github::{GitHubClient, InMemoryTracker, IssueTracker, RepoRef};
