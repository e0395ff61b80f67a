//! GitHub HTTP client
//!
//! Wraps the GitHub REST API v3 for the handful of operations a batch
//! needs. The base URL is configurable so the client works against GitHub
//! Enterprise Server (`GITHUB_API_URL`) and against mock servers in tests.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;

use super::error::ApiError;
use super::models::{
    title_search_query, Issue, IssueBodyUpdate, Milestone, NewIssue, NewLabel, NewMilestone,
    RepoRef, SearchResponse, SearchState,
};
use super::IssueTracker;

/// Base URL for the public GitHub REST API v3
pub const GITHUB_API_BASE: &str = "https://api.github.com";

/// Page size used for paginated listings (GitHub's maximum)
const PER_PAGE: usize = 100;

/// HTTP client for one repository's issues and milestones
#[derive(Debug, Clone)]
pub struct GitHubClient {
    /// The underlying HTTP client
    http: Client,
    /// API base URL without a trailing slash
    base_url: String,
    /// Token sent as a bearer credential, if any
    token: Option<String>,
    /// Repository all calls operate on
    repo: RepoRef,
}

impl GitHubClient {
    /// Create a client for `repo` against `base_url`
    pub fn new(base_url: impl Into<String>, token: Option<String>, repo: RepoRef) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http: Client::new(),
            base_url,
            token,
            repo,
        }
    }

    fn repo_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.base_url, self.repo.owner, self.repo.repo, path
        )
    }

    /// Build a request with the GitHub headers and credentials
    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let request = self
            .http
            .request(method, url)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .header("User-Agent", concat!("issue-batch/", env!("CARGO_PKG_VERSION")));

        match &self.token {
            Some(token) => request.header("Authorization", format!("Bearer {token}")),
            None => request,
        }
    }

    /// Send a request and decode a successful JSON response
    async fn send<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<T, ApiError> {
        let resp = request.send().await.map_err(|e| ApiError::Transport {
            operation,
            message: e.to_string(),
        })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::from_response(operation, status.as_u16(), &body));
        }

        resp.json::<T>().await.map_err(|e| ApiError::Decode {
            operation,
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl IssueTracker for GitHubClient {
    async fn list_milestones(&self) -> Result<Vec<Milestone>, ApiError> {
        let url = self.repo_url("milestones");
        let mut milestones = Vec::new();
        let mut page = 1usize;

        loop {
            let request = self.request(Method::GET, &url).query(&[
                ("state", "all".to_string()),
                ("per_page", PER_PAGE.to_string()),
                ("page", page.to_string()),
            ]);
            let batch: Vec<Milestone> = self.send("list_milestones", request).await?;
            let done = batch.len() < PER_PAGE;
            milestones.extend(batch);

            if done {
                break;
            }
            page += 1;
        }

        tracing::debug!(count = milestones.len(), "Listed existing milestones");
        Ok(milestones)
    }

    async fn create_milestone(&self, title: &str, description: &str) -> Result<Milestone, ApiError> {
        let request = self
            .request(Method::POST, &self.repo_url("milestones"))
            .json(&NewMilestone { title, description });
        self.send("create_milestone", request).await
    }

    async fn create_issue(&self, issue: &NewIssue) -> Result<Issue, ApiError> {
        let request = self
            .request(Method::POST, &self.repo_url("issues"))
            .json(issue);
        self.send("create_issue", request).await
    }

    async fn search_issues(&self, title: &str, state: SearchState) -> Result<Vec<Issue>, ApiError> {
        let url = format!("{}/search/issues", self.base_url);
        let query = title_search_query(&self.repo, title, state);
        let request = self
            .request(Method::GET, &url)
            .query(&[("q", query), ("per_page", PER_PAGE.to_string())]);

        let response: SearchResponse = self.send("search_issues", request).await?;
        Ok(response.items)
    }

    async fn update_issue_body(&self, number: u64, body: &str) -> Result<Issue, ApiError> {
        let request = self
            .request(Method::PATCH, &self.repo_url(&format!("issues/{number}")))
            .json(&IssueBodyUpdate { body });
        self.send("update_issue", request).await
    }

    async fn create_label(&self, label: &NewLabel) -> Result<(), ApiError> {
        let request = self
            .request(Method::POST, &self.repo_url("labels"))
            .json(label);
        let _: serde_json::Value = self.send("create_label", request).await?;
        Ok(())
    }
}
