//! Template variables
//!
//! Everything a template can see is captured once, up front, into an
//! immutable [`TemplateContext`]. Rendering never consults the process
//! environment directly.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::github::RepoRef;

/// GitHub Actions run information, as exposed by the runner's environment
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunContext {
    pub event_name: String,
    pub sha: String,
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub workflow: String,
    pub action: String,
    pub actor: String,
    pub job: String,
    pub run_number: u64,
    pub run_id: u64,

    /// Webhook payload of the triggering event (`null` outside Actions)
    pub payload: serde_json::Value,
}

impl RunContext {
    /// Reads the run context from an environment snapshot
    ///
    /// The event payload is loaded from `GITHUB_EVENT_PATH`; an unreadable
    /// or malformed payload file leaves `payload` as `null`.
    pub async fn from_env(env: &BTreeMap<String, String>) -> Self {
        let var = |name: &str| env.get(name).cloned().unwrap_or_default();
        let number = |name: &str| env.get(name).and_then(|v| v.parse().ok()).unwrap_or(0);

        let payload = match env.get("GITHUB_EVENT_PATH") {
            Some(path) if !path.is_empty() => read_payload(Path::new(path)).await,
            _ => serde_json::Value::Null,
        };

        Self {
            event_name: var("GITHUB_EVENT_NAME"),
            sha: var("GITHUB_SHA"),
            git_ref: var("GITHUB_REF"),
            workflow: var("GITHUB_WORKFLOW"),
            action: var("GITHUB_ACTION"),
            actor: var("GITHUB_ACTOR"),
            job: var("GITHUB_JOB"),
            run_number: number("GITHUB_RUN_NUMBER"),
            run_id: number("GITHUB_RUN_ID"),
            payload,
        }
    }
}

async fn read_payload(path: &Path) -> serde_json::Value {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Could not read event payload");
            return serde_json::Value::Null;
        }
    };

    serde_json::from_str(&content).unwrap_or_else(|e| {
        tracing::warn!(path = %path.display(), error = %e, "Event payload is not valid JSON");
        serde_json::Value::Null
    })
}

/// Variables available to every issue template
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateContext {
    /// Target repository (`{{ repo.owner }}`, `{{ repo.repo }}`)
    pub repo: RepoRef,

    /// Environment snapshot (`{{ env.NAME }}`)
    pub env: BTreeMap<String, String>,

    /// Run timestamp in milliseconds since the epoch (`{{ date | date }}`)
    pub date: i64,

    #[serde(flatten)]
    pub run: RunContext,
}

impl TemplateContext {
    pub fn new(repo: RepoRef, env: BTreeMap<String, String>, now: DateTime<Utc>) -> Self {
        Self {
            repo,
            env,
            date: now.timestamp_millis(),
            run: RunContext::default(),
        }
    }

    pub fn with_run(mut self, run: RunContext) -> Self {
        self.run = run;
        self
    }

    /// Captures the current process environment and time
    pub async fn capture(repo: RepoRef) -> Self {
        let env = env_snapshot(std::env::vars_os());
        let run = RunContext::from_env(&env).await;
        Self::new(repo, env, Utc::now()).with_run(run)
    }
}

/// Environment as strings; non-UTF-8 names and values are converted lossily
fn env_snapshot<I>(vars: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    vars.into_iter()
        .map(|(name, value)| {
            (
                name.to_string_lossy().into_owned(),
                value.to_string_lossy().into_owned(),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn env(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn run_context_from_env() {
        let run = RunContext::from_env(&env(&[
            ("GITHUB_EVENT_NAME", "push"),
            ("GITHUB_SHA", "abc123"),
            ("GITHUB_REF", "refs/heads/main"),
            ("GITHUB_RUN_NUMBER", "42"),
            ("GITHUB_RUN_ID", "not-a-number"),
        ]))
        .await;

        assert_eq!(run.event_name, "push");
        assert_eq!(run.sha, "abc123");
        assert_eq!(run.git_ref, "refs/heads/main");
        assert_eq!(run.run_number, 42);
        assert_eq!(run.run_id, 0);
        assert_eq!(run.payload, serde_json::Value::Null);
    }

    #[tokio::test]
    async fn payload_is_loaded_from_event_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("event.json");
        std::fs::write(&path, r#"{"sender": {"login": "octocat"}}"#).unwrap();

        let run = RunContext::from_env(&env(&[("GITHUB_EVENT_PATH", path.to_str().unwrap())])).await;
        assert_eq!(run.payload["sender"]["login"], "octocat");
    }

    #[cfg(unix)]
    #[test]
    fn env_snapshot_keeps_non_utf8_values() {
        use std::os::unix::ffi::OsStringExt;

        let snapshot = env_snapshot(vec![
            (OsString::from("PLAIN"), OsString::from("value")),
            (OsString::from("BAD"), OsString::from_vec(vec![0x66, 0xff, 0x6f])),
        ]);

        assert_eq!(snapshot["PLAIN"], "value");
        assert_eq!(snapshot["BAD"], "f\u{fffd}o");
    }

    #[test]
    fn serializes_with_action_names() {
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let context = TemplateContext::new(
            RepoRef::new("octo", "hello"),
            env(&[("FOO", "bar")]),
            now,
        )
        .with_run(RunContext {
            event_name: "push".to_string(),
            git_ref: "refs/heads/main".to_string(),
            ..RunContext::default()
        });

        let value = serde_json::to_value(&context).unwrap();
        assert_eq!(value["repo"]["owner"], "octo");
        assert_eq!(value["repo"]["repo"], "hello");
        assert_eq!(value["env"]["FOO"], "bar");
        assert_eq!(value["date"], now.timestamp_millis());
        assert_eq!(value["eventName"], "push");
        assert_eq!(value["ref"], "refs/heads/main");
    }
}
