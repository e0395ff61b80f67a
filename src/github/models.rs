//! GitHub REST API request and response models
//!
//! These structs map to the GitHub REST API v3 JSON payloads used by the
//! batch: milestones, issues, labels and issue search.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
#[error("Invalid repository {0:?}: expected 'owner/repo'")]
pub struct InvalidRepoRef(pub String);

/// Repository coordinates (`owner/repo`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
        }
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

impl FromStr for RepoRef {
    type Err = InvalidRepoRef;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().split_once('/') {
            Some((owner, repo))
                if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') =>
            {
                Ok(Self::new(owner, repo))
            }
            _ => Err(InvalidRepoRef(s.to_string())),
        }
    }
}

/// A milestone returned by the GitHub API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    /// Milestone number within the repository
    pub number: u64,
    /// Milestone title
    pub title: String,
    /// "open" or "closed"
    #[serde(default)]
    pub state: Option<String>,
}

/// An issue returned by the create, update and search endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Sequential number within the repository (e.g., 42 → "#42")
    pub number: u64,
    /// Issue title
    pub title: String,
    /// URL to view the issue in the GitHub UI
    pub html_url: String,
}

/// Request body for creating a new issue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewIssue {
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
    pub assignees: Vec<String>,
    /// Omitted from the payload when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub milestone: Option<u64>,
}

/// Request body for creating a label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLabel {
    pub name: String,
    /// Hex colour without the leading `#`
    pub color: String,
    #[serde(default)]
    pub description: String,
}

/// Request body for creating a milestone
#[derive(Debug, Clone, Serialize)]
pub(crate) struct NewMilestone<'a> {
    pub title: &'a str,
    pub description: &'a str,
}

/// Request body for replacing an issue's body
#[derive(Debug, Clone, Serialize)]
pub(crate) struct IssueBodyUpdate<'a> {
    pub body: &'a str,
}

/// Response of the issue search endpoint
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(default)]
    pub items: Vec<Issue>,
}

/// Which issues an existing-issue search looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchState {
    #[default]
    Open,
    Closed,
    All,
}

impl SearchState {
    /// The `is:` qualifier for the search query, if any
    pub fn qualifier(&self) -> Option<&'static str> {
        match self {
            SearchState::Open => Some("is:open"),
            SearchState::Closed => Some("is:closed"),
            SearchState::All => None,
        }
    }

    pub fn matches(&self, open: bool) -> bool {
        match self {
            SearchState::Open => open,
            SearchState::Closed => !open,
            SearchState::All => true,
        }
    }
}

impl FromStr for SearchState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "open" => Ok(SearchState::Open),
            "closed" => Ok(SearchState::Closed),
            "all" => Ok(SearchState::All),
            other => Err(format!(
                "Invalid value search_existing={other}, must be one of open, closed or all"
            )),
        }
    }
}

/// Builds the search query for issues titled `title` in `repo`
pub fn title_search_query(repo: &RepoRef, title: &str, state: SearchState) -> String {
    let mut parts = Vec::with_capacity(5);
    if let Some(qualifier) = state.qualifier() {
        parts.push(qualifier.to_string());
    }
    parts.push("is:issue".to_string());
    parts.push(format!("repo:{repo}"));
    parts.push("in:title".to_string());
    parts.push(title.to_string());
    parts.join(" ")
}
