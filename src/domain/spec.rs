//! Batch document model
//!
//! The document is parsed once and never mutated afterwards. Values resolved
//! during a run (prerequisite numbers, milestone numbers) live in
//! [`ResolvedIssue`](super::ResolvedIssue) instead.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpecError {
    #[error("No json file of issues provided")]
    MissingInput,

    #[error("Failed to read issue document {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse issue document {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Issue title appears more than once: {0:?}")]
    DuplicateIssue(String),

    #[error("Milestone title appears more than once: {0:?}")]
    DuplicateMilestone(String),

    #[error("Issue {issue:?} references milestone {milestone:?}, which is not listed in milestones")]
    UnknownMilestone { issue: String, milestone: String },
}

/// Serialization format of a batch document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DocumentFormat {
    #[default]
    Json,
    Yaml,
}

impl DocumentFormat {
    /// Picks the format from the file extension (`.yml`/`.yaml` are YAML)
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yml") || ext.eq_ignore_ascii_case("yaml") => {
                DocumentFormat::Yaml
            }
            _ => DocumentFormat::Json,
        }
    }
}

/// One piece of a multi-part issue body
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum BodyFragment {
    /// Markdown file whose raw contents are used as template source
    Markdown { markdown: PathBuf },
    /// Template file whose raw contents are used as template source
    Template { template: PathBuf },
    /// Inline template text
    Text(String),
}

/// Issue body: a single template, or fragments joined by a blank line
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum IssueBody {
    Text(String),
    Fragments(Vec<BodyFragment>),
}

impl Default for IssueBody {
    fn default() -> Self {
        IssueBody::Text(String::new())
    }
}

impl From<&str> for IssueBody {
    fn from(text: &str) -> Self {
        IssueBody::Text(text.to_string())
    }
}

/// A milestone the batch needs to exist
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MilestoneSpec {
    pub title: String,

    #[serde(default)]
    pub description: String,
}

impl MilestoneSpec {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }
}

/// A single issue to create
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IssueSpec {
    /// Title template, unique within the batch
    pub title: String,

    #[serde(default)]
    pub body: IssueBody,

    #[serde(default, deserialize_with = "string_set")]
    pub labels: BTreeSet<String>,

    #[serde(default, deserialize_with = "string_set")]
    pub assignees: BTreeSet<String>,

    /// Milestone title, resolved against the batch's milestones
    #[serde(default)]
    pub milestone: Option<String>,

    /// Titles of issues that must be created first
    #[serde(default)]
    pub deps: Vec<String>,
}

impl IssueSpec {
    /// Creates an issue with an empty body and no dependencies
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: IssueBody::default(),
            labels: BTreeSet::new(),
            assignees: BTreeSet::new(),
            milestone: None,
            deps: Vec::new(),
        }
    }

    pub fn with_body(mut self, body: impl Into<IssueBody>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.insert(label.into());
        self
    }

    pub fn with_milestone(mut self, milestone: impl Into<String>) -> Self {
        self.milestone = Some(milestone.into());
        self
    }

    /// Adds a prerequisite title
    pub fn depends_on(mut self, title: impl Into<String>) -> Self {
        self.deps.push(title.into());
        self
    }
}

/// The whole batch document
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BatchSpec {
    #[serde(default)]
    pub milestones: Vec<MilestoneSpec>,

    #[serde(default)]
    pub issues: Vec<IssueSpec>,
}

impl BatchSpec {
    /// Reads and parses a batch document
    pub async fn load(path: Option<&Path>) -> Result<Self, SpecError> {
        let path = path.ok_or(SpecError::MissingInput)?;

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| SpecError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        Self::parse(&content, DocumentFormat::from_path(path), path)
    }

    /// Parses a document and checks that titles are unique
    pub fn parse(content: &str, format: DocumentFormat, origin: &Path) -> Result<Self, SpecError> {
        let parse_error = |message: String| SpecError::Parse {
            path: origin.to_path_buf(),
            message,
        };

        let spec: BatchSpec = match format {
            DocumentFormat::Json => {
                serde_json::from_str(content).map_err(|e| parse_error(e.to_string()))?
            }
            DocumentFormat::Yaml => {
                serde_yaml::from_str(content).map_err(|e| parse_error(e.to_string()))?
            }
        };

        spec.check_unique_titles()?;
        Ok(spec)
    }

    /// Parses an inline JSON document
    pub fn from_json(content: &str) -> Result<Self, SpecError> {
        Self::parse(content, DocumentFormat::Json, Path::new("<inline>"))
    }

    /// Fails on the first title that appears twice
    pub fn check_unique_titles(&self) -> Result<(), SpecError> {
        let mut seen = HashSet::new();
        for issue in &self.issues {
            if !seen.insert(issue.title.as_str()) {
                return Err(SpecError::DuplicateIssue(issue.title.clone()));
            }
        }

        let mut seen = HashSet::new();
        for milestone in &self.milestones {
            if !seen.insert(milestone.title.as_str()) {
                return Err(SpecError::DuplicateMilestone(milestone.title.clone()));
            }
        }

        Ok(())
    }

    /// Fails if an issue names a milestone the document does not declare
    pub fn check_milestone_references(&self) -> Result<(), SpecError> {
        let declared: HashSet<&str> = self.milestones.iter().map(|m| m.title.as_str()).collect();

        for issue in &self.issues {
            if let Some(milestone) = &issue.milestone {
                if !declared.contains(milestone.as_str()) {
                    return Err(SpecError::UnknownMilestone {
                        issue: issue.title.clone(),
                        milestone: milestone.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Looks up an issue by title
    pub fn issue(&self, title: &str) -> Option<&IssueSpec> {
        self.issues.iter().find(|issue| issue.title == title)
    }
}

/// Splits a comma-separated list, dropping empty entries
pub fn split_list(list: &str) -> BTreeSet<String> {
    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Accepts either `["a", "b"]` or `"a, b"`
fn string_set<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::{SeqAccess, Visitor};

    struct StringSetVisitor;

    impl<'de> Visitor<'de> for StringSetVisitor {
        type Value = BTreeSet<String>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a list of strings or a comma-separated string")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(split_list(value))
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(BTreeSet::new())
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: SeqAccess<'de>,
        {
            let mut items = BTreeSet::new();
            while let Some(item) = seq.next_element::<String>()? {
                items.insert(item);
            }
            Ok(items)
        }
    }

    deserializer.deserialize_any(StringSetVisitor)
}
