//! # Batch Execution
//!
//! Drives one issue document from load to the last created issue.
//!
//! ## Phases
//!
//! | Phase | Work | Mutates the repository |
//! |-------|------|------------------------|
//! | Loading | Parse document, check titles and milestone references | no |
//! | Scheduling | Build dependency graph, topological order, cycle check | no |
//! | BootstrappingLabels | Create `blocked` and configured labels | yes |
//! | ResolvingMilestones | Reuse or create every milestone | yes |
//! | Materializing | Render and create each issue in order | yes |
//!
//! Any error ends the run (fail-fast). Everything detectable without the API
//! is checked before the first mutating call.

mod labels;
mod materialize;
mod milestones;
mod orchestrator;

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

use crate::domain::{GraphError, ResolveError, SpecError};
use crate::github::{ApiError, NewLabel, SearchState};
use crate::render::RenderError;

pub use labels::bootstrap_labels;
pub use materialize::{
    prerequisite_line, read_fragment, IssueMaterializer, MaterializedIssue, Outcome,
};
pub use milestones::resolve_milestones;
pub use orchestrator::{BatchReport, BatchRunner};

/// Label added to issues with unresolved prerequisites
pub const BLOCKED_LABEL: &str = "blocked";

/// What to do when an issue with the same title already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdatePolicy {
    /// Always create a new issue
    #[default]
    CreateOnly,
    /// Leave the existing issue untouched and reuse its number
    SkipExisting,
    /// Replace the existing issue's body and reuse its number
    UpdateExisting,
}

impl FromStr for UpdatePolicy {
    type Err = String;

    /// Parses the `update_existing` action input
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "true" => Ok(UpdatePolicy::UpdateExisting),
            "false" => Ok(UpdatePolicy::SkipExisting),
            other => Err(format!(
                "Invalid value update_existing={other}, must be one of true or false"
            )),
        }
    }
}

/// Settings shared by every issue in a batch
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub update: UpdatePolicy,
    pub search: SearchState,

    /// Replaces every issue's assignees when set
    pub assignees: Option<BTreeSet<String>>,

    /// Replaces every issue's milestone when set
    pub milestone: Option<u64>,

    /// Base directory for body fragment files
    pub workspace: PathBuf,

    /// Label added to blocked issues (bootstrapped when any issue has deps)
    pub blocked_label: NewLabel,

    /// Extra labels to bootstrap before any issue is created
    pub labels: Vec<NewLabel>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            update: UpdatePolicy::default(),
            search: SearchState::default(),
            assignees: None,
            milestone: None,
            workspace: PathBuf::from("."),
            blocked_label: NewLabel {
                name: BLOCKED_LABEL.to_string(),
                color: "000000".to_string(),
                description: "This topic has unresolved dependencies.".to_string(),
            },
            labels: Vec::new(),
        }
    }
}

/// Where a batch run is, or where it stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchPhase {
    Loading,
    Scheduling,
    BootstrappingLabels,
    ResolvingMilestones,
    Materializing,
    Done,
}

impl fmt::Display for BatchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BatchPhase::Loading => "loading",
            BatchPhase::Scheduling => "scheduling",
            BatchPhase::BootstrappingLabels => "bootstrapping labels",
            BatchPhase::ResolvingMilestones => "resolving milestones",
            BatchPhase::Materializing => "materializing",
            BatchPhase::Done => "done",
        };
        f.write_str(name)
    }
}

/// The API call an issue failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueAction {
    Searching,
    Creating,
    Updating,
}

impl fmt::Display for IssueAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IssueAction::Searching => "searching for",
            IssueAction::Creating => "creating",
            IssueAction::Updating => "updating",
        })
    }
}

/// The human-readable summary logged when an issue call fails
pub fn issue_failure_message(action: IssueAction, title: &str) -> String {
    format!(
        "An error occurred while {action} the issue {title:?}. This might be caused by a malformed issue title, or a typo in the labels or assignees!"
    )
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error(transparent)]
    Spec(#[from] SpecError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("Failed to create label {label:?}")]
    Label {
        label: String,
        #[source]
        source: ApiError,
    },

    #[error("Failed to resolve milestones")]
    Milestones(#[source] ApiError),

    #[error("Failed to render issue {title:?}")]
    Render {
        title: String,
        #[source]
        source: RenderError,
    },

    #[error("{}", issue_failure_message(*.action, .title))]
    Issue {
        action: IssueAction,
        title: String,
        #[source]
        source: ApiError,
    },
}

impl BatchError {
    /// The phase the run failed in
    pub fn phase(&self) -> BatchPhase {
        match self {
            BatchError::Spec(_) => BatchPhase::Loading,
            BatchError::Graph(_) => BatchPhase::Scheduling,
            BatchError::Label { .. } => BatchPhase::BootstrappingLabels,
            BatchError::Milestones(_) => BatchPhase::ResolvingMilestones,
            BatchError::Resolve(_) | BatchError::Render { .. } | BatchError::Issue { .. } => {
                BatchPhase::Materializing
            }
        }
    }

    /// The API error behind this failure, if any
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            BatchError::Label { source, .. }
            | BatchError::Milestones(source)
            | BatchError::Issue { source, .. } => Some(source),
            _ => None,
        }
    }
}
