//! Configuration handling for issue-batch
//!
//! Settings come from action inputs (`INPUT_*`), the runner environment
//! (`GITHUB_*`) and an optional TOML file named by the `config` input.
//! Actions passes unset inputs as empty strings, so empty values count as
//! absent throughout.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Args;
use serde::Deserialize;
use thiserror::Error;

use crate::batch::{BatchOptions, UpdatePolicy};
use crate::domain::split_list;
use crate::github::{InvalidRepoRef, NewLabel, RepoRef, SearchState, GITHUB_API_BASE};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to parse configuration {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Failed to read configuration {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error(transparent)]
    Repo(#[from] InvalidRepoRef),
}

/// Raw action inputs, as flags or environment variables
#[derive(Debug, Clone, Default, Args)]
pub struct ActionInputs {
    /// Issue document (JSON, or YAML by extension)
    #[arg(long, env = "INPUT_JSON")]
    pub json: Option<String>,

    /// TOML file with labels to bootstrap
    #[arg(long, env = "INPUT_CONFIG")]
    pub config: Option<String>,

    /// `true` updates existing issues, `false` leaves them untouched
    #[arg(long, env = "INPUT_UPDATE_EXISTING")]
    pub update_existing: Option<String>,

    /// Issue state to search for existing issues (open, closed, all)
    #[arg(long, env = "INPUT_SEARCH_EXISTING")]
    pub search_existing: Option<String>,

    /// Comma-separated assignees for every issue
    #[arg(long, env = "INPUT_ASSIGNEES")]
    pub assignees: Option<String>,

    /// Milestone number for every issue
    #[arg(long, env = "INPUT_MILESTONE")]
    pub milestone: Option<String>,

    /// Target repository as owner/repo
    #[arg(long, env = "GITHUB_REPOSITORY")]
    pub repository: Option<String>,

    /// API token
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// REST API base URL
    #[arg(long, env = "GITHUB_API_URL")]
    pub api_url: Option<String>,

    /// Base directory for body fragment files
    #[arg(long, env = "GITHUB_WORKSPACE")]
    pub workspace: Option<String>,

    /// Step outputs file
    #[arg(long, env = "GITHUB_OUTPUT", hide = true)]
    pub output_file: Option<String>,
}

/// A label entry in the config file
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LabelConfig {
    pub name: String,

    #[serde(default = "default_label_color")]
    pub color: String,

    #[serde(default)]
    pub description: String,
}

fn default_label_color() -> String {
    "ededed".to_string()
}

impl From<LabelConfig> for NewLabel {
    fn from(label: LabelConfig) -> Self {
        NewLabel {
            name: label.name,
            color: label.color.trim_start_matches('#').to_string(),
            description: label.description,
        }
    }
}

/// Contents of the `config` input file
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ConfigFile {
    /// Labels created before any issue
    pub labels: Vec<LabelConfig>,

    /// Replaces the label put on blocked issues
    pub blocked_label: Option<LabelConfig>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

/// Resolved configuration for one run
#[derive(Debug, Clone)]
pub struct Config {
    pub document: Option<PathBuf>,
    pub repo: Option<RepoRef>,
    pub token: Option<String>,
    pub api_url: String,
    pub output_file: Option<PathBuf>,
    pub batch: BatchOptions,
}

/// `Some(value)` unless the value is missing or blank
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl Config {
    /// Resolves inputs, reading the config file when one is named
    pub fn from_inputs(inputs: &ActionInputs) -> Result<Self, ConfigError> {
        let file = match present(&inputs.config) {
            Some(path) => ConfigFile::load(Path::new(path))?,
            None => ConfigFile::default(),
        };

        Self::resolve(inputs, file)
    }

    /// Resolves inputs against an already loaded config file
    pub fn resolve(inputs: &ActionInputs, file: ConfigFile) -> Result<Self, ConfigError> {
        let update = present(&inputs.update_existing)
            .map(str::parse::<UpdatePolicy>)
            .transpose()
            .map_err(ConfigError::Invalid)?
            .unwrap_or_default();

        let search = present(&inputs.search_existing)
            .map(str::parse::<SearchState>)
            .transpose()
            .map_err(ConfigError::Invalid)?
            .unwrap_or_default();

        let milestone = present(&inputs.milestone)
            .map(|value| {
                value.parse::<u64>().map_err(|_| {
                    ConfigError::Invalid(format!(
                        "Invalid value milestone={value}, must be a milestone number"
                    ))
                })
            })
            .transpose()?;

        let repo = present(&inputs.repository)
            .map(str::parse::<RepoRef>)
            .transpose()?;

        let mut batch = BatchOptions {
            update,
            search,
            assignees: present(&inputs.assignees).map(split_list),
            milestone,
            workspace: present(&inputs.workspace)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
            labels: file.labels.into_iter().map(NewLabel::from).collect(),
            ..BatchOptions::default()
        };
        if let Some(blocked) = file.blocked_label {
            batch.blocked_label = blocked.into();
        }

        Ok(Self {
            document: present(&inputs.json).map(PathBuf::from),
            repo,
            token: present(&inputs.token).map(str::to_string),
            api_url: present(&inputs.api_url)
                .unwrap_or(GITHUB_API_BASE)
                .to_string(),
            output_file: present(&inputs.output_file).map(PathBuf::from),
            batch,
        })
    }

    /// The target repository, which `run` cannot do without
    pub fn require_repo(&self) -> Result<&RepoRef, ConfigError> {
        self.repo
            .as_ref()
            .ok_or(ConfigError::Missing("GITHUB_REPOSITORY"))
    }
}
