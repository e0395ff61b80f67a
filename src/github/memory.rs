//! In-memory issue tracker
//!
//! Behaves like a fresh GitHub repository: issue numbers start at 1,
//! duplicate labels and milestones are rejected with `already_exists`.
//! Used by `plan` to preview a batch without network access, and by tests.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde::Serialize;

use super::error::{ApiError, ApiSubError, ALREADY_EXISTS};
use super::models::{Issue, Milestone, NewIssue, NewLabel, RepoRef, SearchState};
use super::IssueTracker;

/// An issue as stored by [`InMemoryTracker`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredIssue {
    pub number: u64,
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
    pub assignees: Vec<String>,
    pub milestone: Option<u64>,
    pub open: bool,
}

#[derive(Debug, Default)]
struct State {
    milestones: Vec<Milestone>,
    issues: Vec<StoredIssue>,
    labels: Vec<NewLabel>,
    /// Mutating calls in the order they were made
    calls: Vec<String>,
    /// Titles whose creation is rejected
    rejected_titles: HashSet<String>,
    /// Status every label creation fails with
    label_status: Option<u16>,
}

/// Issue tracker backed by process memory
#[derive(Debug)]
pub struct InMemoryTracker {
    repo: RepoRef,
    state: Mutex<State>,
}

impl InMemoryTracker {
    pub fn new(repo: RepoRef) -> Self {
        Self {
            repo,
            state: Mutex::new(State::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn html_url(&self, number: u64) -> String {
        format!("https://github.com/{}/issues/{}", self.repo, number)
    }

    /// Adds a milestone as if it existed before the run
    pub fn seed_milestone(&self, title: &str) -> u64 {
        let mut state = self.state();
        let number = state.milestones.len() as u64 + 1;
        state.milestones.push(Milestone {
            number,
            title: title.to_string(),
            state: Some("open".to_string()),
        });
        number
    }

    /// Adds an issue as if it existed before the run
    pub fn seed_issue(&self, title: &str, body: &str, open: bool) -> u64 {
        let mut state = self.state();
        let number = state.issues.len() as u64 + 1;
        state.issues.push(StoredIssue {
            number,
            title: title.to_string(),
            body: body.to_string(),
            labels: Vec::new(),
            assignees: Vec::new(),
            milestone: None,
            open,
        });
        number
    }

    /// Makes `create_issue` fail for issues with this title
    pub fn reject_issue(&self, title: &str) {
        self.state().rejected_titles.insert(title.to_string());
    }

    /// Makes every `create_label` fail with `status`
    pub fn reject_labels(&self, status: u16) {
        self.state().label_status = Some(status);
    }

    /// All issues, in creation order
    pub fn issues(&self) -> Vec<StoredIssue> {
        self.state().issues.clone()
    }

    pub fn issue(&self, title: &str) -> Option<StoredIssue> {
        self.state().issues.iter().find(|i| i.title == title).cloned()
    }

    pub fn milestones(&self) -> Vec<Milestone> {
        self.state().milestones.clone()
    }

    pub fn labels(&self) -> Vec<NewLabel> {
        self.state().labels.clone()
    }

    /// Mutating calls made so far, e.g. `create_issue:Title`
    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }
}

fn already_exists(operation: &'static str, resource: &str, field: &str) -> ApiError {
    ApiError::Rejected {
        operation,
        status: 422,
        message: "Validation Failed".to_string(),
        errors: vec![ApiSubError::with_code(resource, field, ALREADY_EXISTS)],
    }
}

#[async_trait]
impl IssueTracker for InMemoryTracker {
    async fn list_milestones(&self) -> Result<Vec<Milestone>, ApiError> {
        Ok(self.milestones())
    }

    async fn create_milestone(&self, title: &str, _description: &str) -> Result<Milestone, ApiError> {
        let mut state = self.state();
        if state.milestones.iter().any(|m| m.title == title) {
            return Err(already_exists("create_milestone", "Milestone", "title"));
        }

        let milestone = Milestone {
            number: state.milestones.len() as u64 + 1,
            title: title.to_string(),
            state: Some("open".to_string()),
        };
        state.milestones.push(milestone.clone());
        state.calls.push(format!("create_milestone:{title}"));
        Ok(milestone)
    }

    async fn create_issue(&self, issue: &NewIssue) -> Result<Issue, ApiError> {
        let mut state = self.state();
        if state.rejected_titles.contains(&issue.title) {
            return Err(ApiError::Rejected {
                operation: "create_issue",
                status: 422,
                message: "Validation Failed".to_string(),
                errors: vec![ApiSubError::with_code("Issue", "title", "invalid")],
            });
        }

        let number = state.issues.len() as u64 + 1;
        state.issues.push(StoredIssue {
            number,
            title: issue.title.clone(),
            body: issue.body.clone(),
            labels: issue.labels.clone(),
            assignees: issue.assignees.clone(),
            milestone: issue.milestone,
            open: true,
        });
        state.calls.push(format!("create_issue:{}", issue.title));
        drop(state);

        Ok(Issue {
            number,
            title: issue.title.clone(),
            html_url: self.html_url(number),
        })
    }

    async fn search_issues(&self, title: &str, state: SearchState) -> Result<Vec<Issue>, ApiError> {
        let needle = title.to_lowercase();
        let issues = self
            .state()
            .issues
            .iter()
            .filter(|i| state.matches(i.open) && i.title.to_lowercase().contains(&needle))
            .map(|i| Issue {
                number: i.number,
                title: i.title.clone(),
                html_url: self.html_url(i.number),
            })
            .collect();
        Ok(issues)
    }

    async fn update_issue_body(&self, number: u64, body: &str) -> Result<Issue, ApiError> {
        let mut state = self.state();
        let issue = state
            .issues
            .iter_mut()
            .find(|i| i.number == number)
            .ok_or_else(|| ApiError::Rejected {
                operation: "update_issue",
                status: 404,
                message: "Not Found".to_string(),
                errors: Vec::new(),
            })?;

        issue.body = body.to_string();
        let title = issue.title.clone();
        state.calls.push(format!("update_issue:{title}"));
        drop(state);

        Ok(Issue {
            number,
            title,
            html_url: self.html_url(number),
        })
    }

    async fn create_label(&self, label: &NewLabel) -> Result<(), ApiError> {
        let mut state = self.state();
        if let Some(status) = state.label_status {
            return Err(ApiError::Rejected {
                operation: "create_label",
                status,
                message: "Label creation rejected".to_string(),
                errors: Vec::new(),
            });
        }
        if state
            .labels
            .iter()
            .any(|l| l.name.eq_ignore_ascii_case(&label.name))
        {
            return Err(already_exists("create_label", "Label", "name"));
        }

        state.labels.push(label.clone());
        state.calls.push(format!("create_label:{}", label.name));
        Ok(())
    }
}
