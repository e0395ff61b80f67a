//! Batch orchestration
//!
//! `Loading → Scheduling → BootstrappingLabels → ResolvingMilestones →
//! Materializing(i) → Done`, stopping at the first error.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::Serialize;
use tracing::Instrument;

use crate::domain::{
    schedule, BatchSpec, IssueNumberMap, IssueSpec, MilestoneMap, ResolveError, ResolvedIssue,
};
use crate::github::IssueTracker;
use crate::render::{TemplateContext, TemplateRenderer};

use super::materialize::MaterializedIssue;
use super::{
    bootstrap_labels, resolve_milestones, BatchError, BatchOptions, BatchPhase, IssueMaterializer,
};

/// Result of a successful run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Milestone title → number
    pub milestones: MilestoneMap,

    /// Issues in the order they were materialized
    pub issues: Vec<MaterializedIssue>,
}

impl BatchReport {
    /// Declared issue title → issue number
    pub fn numbers(&self) -> BTreeMap<String, u64> {
        self.issues
            .iter()
            .map(|issue| (issue.title.clone(), issue.number))
            .collect()
    }

    /// The issue materialized last
    pub fn last(&self) -> Option<&MaterializedIssue> {
        self.issues.last()
    }
}

/// Runs issue documents against one tracker
pub struct BatchRunner<'a, T: IssueTracker + ?Sized> {
    tracker: &'a T,
    renderer: TemplateRenderer,
    context: TemplateContext,
    options: BatchOptions,
}

impl<'a, T: IssueTracker + ?Sized> BatchRunner<'a, T> {
    pub fn new(tracker: &'a T, context: TemplateContext, options: BatchOptions) -> Self {
        Self {
            tracker,
            renderer: TemplateRenderer::new(),
            context,
            options,
        }
    }

    /// Loads the document at `path` and runs it
    pub async fn run_file(&self, path: Option<&Path>) -> Result<BatchReport, BatchError> {
        tracing::info!(phase = %BatchPhase::Loading, path = ?path, "Loading issue document");
        let spec = BatchSpec::load(path).await?;
        self.run(&spec).await
    }

    /// Validates the document and returns the creation order
    ///
    /// Makes no API calls, so every configuration error and dependency cycle
    /// surfaces before the repository is touched.
    pub fn plan(&self, spec: &BatchSpec) -> Result<Vec<String>, BatchError> {
        spec.check_unique_titles()?;
        if self.options.milestone.is_none() {
            spec.check_milestone_references()?;
        }

        tracing::info!(phase = %BatchPhase::Scheduling, issues = spec.issues.len(), "Ordering issues by dependency");
        let order = schedule(&spec.issues)?;
        tracing::debug!(order = ?order, "Creation order");
        Ok(order)
    }

    /// Runs a parsed document end to end
    pub async fn run(&self, spec: &BatchSpec) -> Result<BatchReport, BatchError> {
        let order = self.plan(spec)?;

        tracing::info!(phase = %BatchPhase::BootstrappingLabels, "Creating labels");
        let mut labels = Vec::with_capacity(self.options.labels.len() + 1);
        if spec.issues.iter().any(|issue| !issue.deps.is_empty()) {
            labels.push(self.options.blocked_label.clone());
        }
        labels.extend(self.options.labels.iter().cloned());
        bootstrap_labels(self.tracker, &labels).await?;

        tracing::info!(phase = %BatchPhase::ResolvingMilestones, count = spec.milestones.len(), "Resolving milestones");
        let milestones = resolve_milestones(self.tracker, &spec.milestones)
            .await
            .map_err(BatchError::Milestones)?;

        tracing::info!(phase = %BatchPhase::Materializing, count = order.len(), "Materializing issues");
        let index: HashMap<&str, &IssueSpec> = spec
            .issues
            .iter()
            .map(|issue| (issue.title.as_str(), issue))
            .collect();
        let materializer =
            IssueMaterializer::new(self.tracker, &self.renderer, &self.context, &self.options);

        let mut numbers = IssueNumberMap::new();
        let mut materialized = Vec::with_capacity(order.len());

        for (position, title) in order.iter().enumerate() {
            let issue = scheduled_issue(&index, title)?;

            let resolved =
                ResolvedIssue::resolve(issue, &numbers, &milestones, self.options.milestone)?;
            let span = tracing::info_span!("issue", position, title = %title);
            let done = materializer.materialize(&resolved).instrument(span).await?;

            numbers.record(title.clone(), done.number);
            materialized.push(done);
        }

        tracing::info!(phase = %BatchPhase::Done, issues = materialized.len(), "Batch complete");
        Ok(BatchReport {
            milestones,
            issues: materialized,
        })
    }
}

fn scheduled_issue<'s>(
    index: &HashMap<&str, &'s IssueSpec>,
    title: &str,
) -> Result<&'s IssueSpec, ResolveError> {
    index
        .get(title)
        .copied()
        .ok_or_else(|| ResolveError::UnknownIssue(title.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::materialize::Outcome;
    use crate::batch::UpdatePolicy;
    use crate::domain::{GraphError, SpecError};
    use crate::github::{InMemoryTracker, RepoRef};
    use chrono::Utc;

    fn tracker() -> InMemoryTracker {
        InMemoryTracker::new(RepoRef::new("octo", "widgets"))
    }

    fn runner(tracker: &InMemoryTracker, options: BatchOptions) -> BatchRunner<'_, InMemoryTracker> {
        let context = TemplateContext::new(RepoRef::new("octo", "widgets"), BTreeMap::new(), Utc::now());
        BatchRunner::new(tracker, context, options)
    }

    fn created_titles(tracker: &InMemoryTracker) -> Vec<String> {
        tracker.issues().into_iter().map(|i| i.title).collect()
    }

    #[tokio::test]
    async fn end_to_end_creates_prerequisites_first() {
        let tracker = tracker();
        let spec = BatchSpec::from_json(
            r#"{"milestones":[{"title":"M1","description":"d"}],
                "issues":[{"title":"B","body":"b","deps":["A"]},{"title":"A","body":"a"}]}"#,
        )
        .unwrap();

        let report = runner(&tracker, BatchOptions::default()).run(&spec).await.unwrap();

        assert_eq!(created_titles(&tracker), vec!["A", "B"]);
        let a = tracker.issue("A").unwrap();
        let b = tracker.issue("B").unwrap();
        assert!(b.body.starts_with(&format!("Prerequisites: #{}", a.number)));
        assert!(b.labels.contains(&"blocked".to_string()));
        assert!(!a.labels.contains(&"blocked".to_string()));

        assert_eq!(report.milestones.get("M1"), Some(&1));
        assert_eq!(report.numbers().get("B"), Some(&b.number));
        assert_eq!(report.last().map(|i| i.title.as_str()), Some("B"));
    }

    #[tokio::test]
    async fn milestone_numbers_reach_issues() {
        let tracker = tracker();
        tracker.seed_milestone("Existing");
        let spec = BatchSpec::from_json(
            r#"{"milestones":[{"title":"Existing"},{"title":"New"}],
                "issues":[{"title":"A","milestone":"New"},{"title":"B","milestone":"Existing"},{"title":"C"}]}"#,
        )
        .unwrap();

        runner(&tracker, BatchOptions::default()).run(&spec).await.unwrap();

        assert_eq!(tracker.issue("A").unwrap().milestone, Some(2));
        assert_eq!(tracker.issue("B").unwrap().milestone, Some(1));
        assert_eq!(tracker.issue("C").unwrap().milestone, None);
    }

    #[tokio::test]
    async fn cycle_creates_nothing() {
        let tracker = tracker();
        let spec = BatchSpec::from_json(
            r#"{"milestones":[{"title":"M1"}],
                "issues":[{"title":"A","deps":["B"]},{"title":"B","deps":["A"]},{"title":"C"}]}"#,
        )
        .unwrap();

        let err = runner(&tracker, BatchOptions::default()).run(&spec).await.unwrap_err();

        assert!(matches!(err, BatchError::Graph(GraphError::CycleDetected(ref titles)) if titles == &["A", "B"]));
        assert_eq!(err.phase(), BatchPhase::Scheduling);
        assert!(tracker.calls().is_empty());
    }

    #[tokio::test]
    async fn unknown_milestone_fails_before_any_call() {
        let tracker = tracker();
        let spec = BatchSpec::from_json(r#"{"issues":[{"title":"A","milestone":"Nope"}]}"#).unwrap();

        let err = runner(&tracker, BatchOptions::default()).run(&spec).await.unwrap_err();
        assert!(matches!(err, BatchError::Spec(SpecError::UnknownMilestone { .. })));
        assert!(tracker.calls().is_empty());
    }

    #[tokio::test]
    async fn milestone_override_skips_reference_check() {
        let tracker = tracker();
        let spec = BatchSpec::from_json(r#"{"issues":[{"title":"A","milestone":"Nope"}]}"#).unwrap();
        let options = BatchOptions {
            milestone: Some(5),
            ..BatchOptions::default()
        };

        runner(&tracker, options).run(&spec).await.unwrap();
        assert_eq!(tracker.issue("A").unwrap().milestone, Some(5));
    }

    #[tokio::test]
    async fn first_failure_stops_the_batch() {
        let tracker = tracker();
        tracker.reject_issue("B");
        let spec = BatchSpec::from_json(
            r#"{"issues":[{"title":"C","deps":["B"]},{"title":"B","deps":["A"]},{"title":"A"}]}"#,
        )
        .unwrap();

        let err = runner(&tracker, BatchOptions::default()).run(&spec).await.unwrap_err();

        assert!(matches!(err, BatchError::Issue { ref title, .. } if title == "B"));
        assert_eq!(created_titles(&tracker), vec!["A"]);
    }

    #[tokio::test]
    async fn blocked_label_only_bootstrapped_when_needed() {
        let independent = tracker();
        let spec = BatchSpec::from_json(r#"{"issues":[{"title":"A"}]}"#).unwrap();
        runner(&independent, BatchOptions::default()).run(&spec).await.unwrap();
        assert!(independent.labels().is_empty());

        let chained = tracker();
        let spec =
            BatchSpec::from_json(r#"{"issues":[{"title":"A"},{"title":"B","deps":["A"]}]}"#).unwrap();
        runner(&chained, BatchOptions::default()).run(&spec).await.unwrap();
        let names: Vec<_> = chained.labels().into_iter().map(|l| l.name).collect();
        assert_eq!(names, vec!["blocked"]);
    }

    #[tokio::test]
    async fn rerun_with_update_reuses_issues_and_milestones() {
        let tracker = tracker();
        let spec = BatchSpec::from_json(
            r#"{"milestones":[{"title":"M1"}],
                "issues":[{"title":"A","body":"a","milestone":"M1"},{"title":"B","body":"b","deps":["A"]}]}"#,
        )
        .unwrap();

        runner(&tracker, BatchOptions::default()).run(&spec).await.unwrap();

        let options = BatchOptions {
            update: UpdatePolicy::UpdateExisting,
            ..BatchOptions::default()
        };
        let report = runner(&tracker, options).run(&spec).await.unwrap();

        assert_eq!(tracker.issues().len(), 2);
        assert_eq!(tracker.milestones().len(), 1);
        assert!(report.issues.iter().all(|i| i.outcome == Outcome::Updated));
        assert!(tracker.issue("B").unwrap().body.starts_with("Prerequisites: #1"));
    }

    #[test]
    fn scheduled_title_missing_from_document_is_an_error() {
        let a = IssueSpec::new("A");
        let index: HashMap<&str, &IssueSpec> = HashMap::from([("A", &a)]);

        assert_eq!(scheduled_issue(&index, "A").unwrap().title, "A");
        assert_eq!(
            scheduled_issue(&index, "Ghost"),
            Err(ResolveError::UnknownIssue("Ghost".to_string()))
        );
    }
}
