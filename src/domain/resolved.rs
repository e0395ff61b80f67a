//! Values resolved while a batch runs
//!
//! The parsed [`IssueSpec`] stays untouched; the orchestrator pairs it with
//! the numbers it has learned so far in a [`ResolvedIssue`].

use std::collections::{BTreeMap, HashMap};

use thiserror::Error;

use super::spec::IssueSpec;

#[derive(Debug, Error, PartialEq)]
pub enum ResolveError {
    #[error("Issue {dependent:?} depends on {prerequisite:?}, which has no issue number yet")]
    UndefinedNumber {
        prerequisite: String,
        dependent: String,
    },

    #[error("Issue {issue:?} references milestone {milestone:?}, which was not resolved")]
    UnresolvedMilestone { issue: String, milestone: String },

    #[error("Scheduled issue {0:?} is not in the document")]
    UnknownIssue(String),
}

/// Milestone title to milestone number, built once per batch
pub type MilestoneMap = BTreeMap<String, u64>;

/// Issue title to issue number, filled as issues are materialized
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueNumberMap(HashMap<String, u64>);

impl IssueNumberMap {
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    /// Records the number of a materialized issue
    pub fn record(&mut self, title: impl Into<String>, number: u64) {
        self.0.insert(title.into(), number);
    }

    pub fn get(&self, title: &str) -> Option<u64> {
        self.0.get(title).copied()
    }

    /// Numbers of every prerequisite of `issue`, in `deps` order
    pub fn prerequisites_of(&self, issue: &IssueSpec) -> Result<Vec<u64>, ResolveError> {
        issue
            .deps
            .iter()
            .map(|dep| {
                self.get(dep).ok_or_else(|| ResolveError::UndefinedNumber {
                    prerequisite: dep.clone(),
                    dependent: issue.title.clone(),
                })
            })
            .collect()
    }
}

/// An issue spec together with everything the materializer needs to know
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIssue<'a> {
    pub spec: &'a IssueSpec,

    /// Issue numbers of the prerequisites, in `deps` order
    pub prerequisites: Vec<u64>,

    /// Milestone number, if the issue has one
    pub milestone: Option<u64>,
}

impl<'a> ResolvedIssue<'a> {
    /// Resolves an issue against the numbers known so far
    ///
    /// `milestone_override` replaces the issue's own milestone when set.
    pub fn resolve(
        spec: &'a IssueSpec,
        numbers: &IssueNumberMap,
        milestones: &MilestoneMap,
        milestone_override: Option<u64>,
    ) -> Result<Self, ResolveError> {
        let prerequisites = numbers.prerequisites_of(spec)?;

        let milestone = match (milestone_override, &spec.milestone) {
            (Some(number), _) => Some(number),
            (None, Some(title)) => Some(milestones.get(title).copied().ok_or_else(|| {
                ResolveError::UnresolvedMilestone {
                    issue: spec.title.clone(),
                    milestone: title.clone(),
                }
            })?),
            (None, None) => None,
        };

        Ok(Self {
            spec,
            prerequisites,
            milestone,
        })
    }

    /// Resolved view with no prerequisites and no milestone
    pub fn standalone(spec: &'a IssueSpec) -> Self {
        Self {
            spec,
            prerequisites: Vec::new(),
            milestone: None,
        }
    }

    pub fn is_blocked(&self) -> bool {
        !self.prerequisites.is_empty()
    }
}
