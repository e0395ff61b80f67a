//! Issue materialization
//!
//! Turns one [`ResolvedIssue`] into an issue in the repository: render the
//! title and body, prepend the prerequisite line, then create the issue (or
//! find and update an existing one, depending on [`UpdatePolicy`]).

use std::path::Path;

use serde::Serialize;

use crate::domain::{BodyFragment, IssueBody, ResolvedIssue};
use crate::github::{ApiError, Issue, IssueTracker, NewIssue};
use crate::render::{TemplateContext, TemplateRenderer};

use super::{issue_failure_message, BatchError, BatchOptions, IssueAction, UpdatePolicy};

/// Separator between rendered body fragments
const FRAGMENT_SEPARATOR: &str = "\n\n";

/// What happened to an issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Created,
    Updated,
    Skipped,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Outcome::Created => "created",
            Outcome::Updated => "updated",
            Outcome::Skipped => "skipped",
        })
    }
}

/// An issue that exists in the repository after materialization
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaterializedIssue {
    /// Title as declared in the document (the dependency key)
    pub title: String,
    pub number: u64,
    pub html_url: String,
    pub outcome: Outcome,
}

/// `Prerequisites: #1, #2`
pub fn prerequisite_line(numbers: &[u64]) -> String {
    let refs: Vec<String> = numbers.iter().map(|n| format!("#{n}")).collect();
    format!("Prerequisites: {}", refs.join(", "))
}

/// Reads a body fragment file; failures yield an empty fragment
pub async fn read_fragment(path: &Path) -> String {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Could not read body fragment, using empty text");
            String::new()
        }
    }
}

/// Renders and creates issues one at a time
pub struct IssueMaterializer<'a, T: IssueTracker + ?Sized> {
    tracker: &'a T,
    renderer: &'a TemplateRenderer,
    context: &'a TemplateContext,
    options: &'a BatchOptions,
}

impl<'a, T: IssueTracker + ?Sized> IssueMaterializer<'a, T> {
    pub fn new(
        tracker: &'a T,
        renderer: &'a TemplateRenderer,
        context: &'a TemplateContext,
        options: &'a BatchOptions,
    ) -> Self {
        Self {
            tracker,
            renderer,
            context,
            options,
        }
    }

    fn render_text(&self, title: &str, template: &str) -> Result<String, BatchError> {
        self.renderer
            .render(template, self.context)
            .map_err(|source| BatchError::Render {
                title: title.to_string(),
                source,
            })
    }

    /// Renders the body: a single template, or fragments joined by a blank line
    async fn render_body(&self, issue: &ResolvedIssue<'_>) -> Result<String, BatchError> {
        let title = &issue.spec.title;

        let fragments = match &issue.spec.body {
            IssueBody::Text(template) => return self.render_text(title, template),
            IssueBody::Fragments(fragments) => fragments,
        };

        let mut rendered = Vec::with_capacity(fragments.len());
        for fragment in fragments {
            let source = match fragment {
                BodyFragment::Text(text) => text.clone(),
                BodyFragment::Markdown { markdown: path }
                | BodyFragment::Template { template: path } => {
                    read_fragment(&self.options.workspace.join(path)).await
                }
            };
            rendered.push(self.render_text(title, &source)?);
        }

        Ok(rendered.join(FRAGMENT_SEPARATOR))
    }

    /// Produces the create-issue payload without calling the tracker
    pub async fn render(&self, issue: &ResolvedIssue<'_>) -> Result<NewIssue, BatchError> {
        let mut body = self.render_body(issue).await?;
        let title = self.render_text(&issue.spec.title, &issue.spec.title)?;

        let mut labels = issue.spec.labels.clone();
        if issue.is_blocked() {
            body = format!(
                "{}{}{}",
                prerequisite_line(&issue.prerequisites),
                FRAGMENT_SEPARATOR,
                body
            );
            labels.insert(self.options.blocked_label.name.clone());
        }

        let assignees = self
            .options
            .assignees
            .as_ref()
            .unwrap_or(&issue.spec.assignees);

        tracing::debug!(title = %title, body_len = body.len(), "Templates rendered");

        Ok(NewIssue {
            title,
            body,
            labels: labels.into_iter().collect(),
            assignees: assignees.iter().cloned().collect(),
            milestone: issue.milestone,
        })
    }

    /// Renders the issue and makes it exist in the repository
    pub async fn materialize(&self, issue: &ResolvedIssue<'_>) -> Result<MaterializedIssue, BatchError> {
        let payload = self.render(issue).await?;
        let declared = issue.spec.title.clone();

        if let Some(existing) = self.find_existing(&payload.title).await? {
            return match self.options.update {
                UpdatePolicy::SkipExisting => {
                    tracing::info!(
                        title = %existing.title,
                        number = existing.number,
                        url = %existing.html_url,
                        "Existing issue found but not updated"
                    );
                    Ok(materialized(declared, existing, Outcome::Skipped))
                }
                _ => {
                    tracing::info!(
                        title = %existing.title,
                        number = existing.number,
                        url = %existing.html_url,
                        "Updating existing issue"
                    );
                    let updated = self
                        .tracker
                        .update_issue_body(existing.number, &payload.body)
                        .await
                        .map_err(|e| failure(IssueAction::Updating, &payload.title, e))?;
                    tracing::info!(
                        title = %updated.title,
                        number = updated.number,
                        url = %updated.html_url,
                        "Updated issue"
                    );
                    Ok(materialized(declared, updated, Outcome::Updated))
                }
            };
        }

        tracing::info!(title = %payload.title, "Creating new issue");
        let created = self
            .tracker
            .create_issue(&payload)
            .await
            .map_err(|e| failure(IssueAction::Creating, &payload.title, e))?;

        tracing::info!(
            title = %created.title,
            number = created.number,
            url = %created.html_url,
            "Created issue"
        );
        Ok(materialized(declared, created, Outcome::Created))
    }

    /// Looks for an issue with exactly this title, when the policy asks for it
    async fn find_existing(&self, title: &str) -> Result<Option<Issue>, BatchError> {
        if self.options.update == UpdatePolicy::CreateOnly {
            return Ok(None);
        }

        tracing::info!(title = %title, "Fetching issues with title");
        let found = self
            .tracker
            .search_issues(title, self.options.search)
            .await
            .map_err(|e| failure(IssueAction::Searching, title, e))?;

        let existing = found.into_iter().find(|issue| issue.title == title);
        if existing.is_none() {
            tracing::info!(title = %title, "No existing issue found to update");
        }
        Ok(existing)
    }
}

fn materialized(title: String, issue: Issue, outcome: Outcome) -> MaterializedIssue {
    MaterializedIssue {
        title,
        number: issue.number,
        html_url: issue.html_url,
        outcome,
    }
}

/// Logs an API failure with all its detail and wraps it for the batch
fn failure(action: IssueAction, title: &str, source: ApiError) -> BatchError {
    tracing::error!("{}", issue_failure_message(action, title));
    tracing::error!(error = %source, "API call failed");
    for detail in source.sub_errors() {
        tracing::error!(detail = %detail, "API reported");
    }

    BatchError::Issue {
        action,
        title: title.to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::IssueSpec;
    use crate::github::{InMemoryTracker, RepoRef};
    use chrono::Utc;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    struct Fixture {
        tracker: InMemoryTracker,
        renderer: TemplateRenderer,
        context: TemplateContext,
        options: BatchOptions,
    }

    impl Fixture {
        fn new() -> Self {
            let repo = RepoRef::new("octo", "widgets");
            Self {
                tracker: InMemoryTracker::new(repo.clone()),
                renderer: TemplateRenderer::new(),
                context: TemplateContext::new(repo, BTreeMap::new(), Utc::now()),
                options: BatchOptions::default(),
            }
        }

        fn materializer(&self) -> IssueMaterializer<'_, InMemoryTracker> {
            IssueMaterializer::new(&self.tracker, &self.renderer, &self.context, &self.options)
        }
    }

    #[test]
    fn prerequisite_line_format() {
        assert_eq!(prerequisite_line(&[7]), "Prerequisites: #7");
        assert_eq!(prerequisite_line(&[3, 12]), "Prerequisites: #3, #12");
    }

    #[tokio::test]
    async fn blocked_issue_gets_prerequisites_and_label() {
        let fixture = Fixture::new();
        let spec = IssueSpec::new("B").with_body("b body").depends_on("A");
        let issue = ResolvedIssue {
            spec: &spec,
            prerequisites: vec![7],
            milestone: None,
        };

        let payload = fixture.materializer().render(&issue).await.unwrap();
        assert!(payload.body.starts_with("Prerequisites: #7"));
        assert_eq!(payload.body, "Prerequisites: #7\n\nb body");
        assert!(payload.labels.contains(&"blocked".to_string()));
    }

    #[tokio::test]
    async fn unblocked_issue_is_left_alone() {
        let fixture = Fixture::new();
        let spec = IssueSpec::new("A").with_body("a body").with_label("docs");
        let issue = ResolvedIssue::standalone(&spec);

        let payload = fixture.materializer().render(&issue).await.unwrap();
        assert_eq!(payload.body, "a body");
        assert!(!payload.body.contains("Prerequisites"));
        assert_eq!(payload.labels, vec!["docs".to_string()]);
    }

    #[tokio::test]
    async fn missing_fragment_file_renders_empty() {
        let mut fixture = Fixture::new();
        let dir = tempfile::TempDir::new().unwrap();
        fixture.options.workspace = dir.path().to_path_buf();

        let spec = IssueSpec::new("T").with_body(IssueBody::Fragments(vec![
            BodyFragment::Markdown {
                markdown: PathBuf::from("missing.md"),
            },
            BodyFragment::Text("literal".to_string()),
        ]));

        let payload = fixture
            .materializer()
            .render(&ResolvedIssue::standalone(&spec))
            .await
            .unwrap();
        assert_eq!(payload.body, "\n\nliteral");
    }

    #[tokio::test]
    async fn fragment_files_are_rendered_as_templates() {
        let mut fixture = Fixture::new();
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("intro.md"), "Repo: {{ repo.repo }}").unwrap();
        std::fs::write(dir.path().join("outro.md"), "Owner: {{ repo.owner }}").unwrap();
        fixture.options.workspace = dir.path().to_path_buf();

        let spec = IssueSpec::new("T").with_body(IssueBody::Fragments(vec![
            BodyFragment::Markdown {
                markdown: PathBuf::from("intro.md"),
            },
            BodyFragment::Text("middle".to_string()),
            BodyFragment::Template {
                template: PathBuf::from("outro.md"),
            },
        ]));

        let payload = fixture
            .materializer()
            .render(&ResolvedIssue::standalone(&spec))
            .await
            .unwrap();
        assert_eq!(payload.body, "Repo: widgets\n\nmiddle\n\nOwner: octo");
    }

    #[tokio::test]
    async fn title_is_rendered() {
        let fixture = Fixture::new();
        let spec = IssueSpec::new("Release for {{ repo.repo }}");

        let payload = fixture
            .materializer()
            .render(&ResolvedIssue::standalone(&spec))
            .await
            .unwrap();
        assert_eq!(payload.title, "Release for widgets");
    }

    #[tokio::test]
    async fn assignee_override_replaces_issue_assignees() {
        let mut fixture = Fixture::new();
        fixture.options.assignees = Some(["lead".to_string()].into_iter().collect());

        let mut spec = IssueSpec::new("T");
        spec.assignees.insert("someone".to_string());

        let payload = fixture
            .materializer()
            .render(&ResolvedIssue::standalone(&spec))
            .await
            .unwrap();
        assert_eq!(payload.assignees, vec!["lead".to_string()]);
    }

    #[tokio::test]
    async fn creates_issue_and_returns_number() {
        let fixture = Fixture::new();
        let spec = IssueSpec::new("A").with_body("a");

        let issue = fixture
            .materializer()
            .materialize(&ResolvedIssue::standalone(&spec))
            .await
            .unwrap();
        assert_eq!(issue.number, 1);
        assert_eq!(issue.outcome, Outcome::Created);
        assert_eq!(fixture.tracker.issue("A").unwrap().body, "a");
    }

    #[tokio::test]
    async fn api_failure_is_fatal() {
        let fixture = Fixture::new();
        fixture.tracker.reject_issue("Bad");
        let spec = IssueSpec::new("Bad");

        let err = fixture
            .materializer()
            .materialize(&ResolvedIssue::standalone(&spec))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BatchError::Issue { action: IssueAction::Creating, ref title, .. } if title == "Bad"
        ));
    }

    #[tokio::test]
    async fn update_policy_rewrites_existing_body() {
        let mut fixture = Fixture::new();
        fixture.options.update = UpdatePolicy::UpdateExisting;
        let number = fixture.tracker.seed_issue("A", "old", true);

        let spec = IssueSpec::new("A").with_body("new");
        let issue = fixture
            .materializer()
            .materialize(&ResolvedIssue::standalone(&spec))
            .await
            .unwrap();

        assert_eq!(issue.number, number);
        assert_eq!(issue.outcome, Outcome::Updated);
        assert_eq!(fixture.tracker.issues().len(), 1);
        assert_eq!(fixture.tracker.issue("A").unwrap().body, "new");
    }

    #[tokio::test]
    async fn skip_policy_keeps_existing_issue() {
        let mut fixture = Fixture::new();
        fixture.options.update = UpdatePolicy::SkipExisting;
        let number = fixture.tracker.seed_issue("A", "old", true);

        let spec = IssueSpec::new("A").with_body("new");
        let issue = fixture
            .materializer()
            .materialize(&ResolvedIssue::standalone(&spec))
            .await
            .unwrap();

        assert_eq!(issue.number, number);
        assert_eq!(issue.outcome, Outcome::Skipped);
        assert_eq!(fixture.tracker.issue("A").unwrap().body, "old");
    }

    #[tokio::test]
    async fn search_requires_exact_title() {
        let mut fixture = Fixture::new();
        fixture.options.update = UpdatePolicy::UpdateExisting;
        fixture.tracker.seed_issue("A longer title", "old", true);

        let spec = IssueSpec::new("A");
        let issue = fixture
            .materializer()
            .materialize(&ResolvedIssue::standalone(&spec))
            .await
            .unwrap();

        assert_eq!(issue.outcome, Outcome::Created);
        assert_eq!(fixture.tracker.issues().len(), 2);
    }
}
