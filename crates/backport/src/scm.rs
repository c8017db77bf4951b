//! Forge REST API client.
//!
//! [`ScmClient`] is the seam the publisher and orchestrator talk to;
//! [`GitHubClient`] implements it against the GitHub v3 API. Clients are
//! authenticated per event with the credentials resolved for the forge
//! host, so they are built through a [`ScmConnector`].

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Method, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::credentials::Credentials;
use crate::error::ScmError;

/// Default GitHub REST API base URL.
pub const GITHUB_API_URL: &str = "https://api.github.com";

const PER_PAGE: usize = 100;

/// Request body for a new repository label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewLabel {
    pub name: String,
    pub color: String,
    pub description: String,
}

/// Request body for a new pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewPullRequest {
    pub title: String,
    pub head: String,
    pub base: String,
    pub body: String,
}

/// A pull request as returned on creation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PullRequestRef {
    pub number: u64,
    pub html_url: String,
}

/// Forge operations scoped to `owner/repo`.
#[async_trait]
pub trait ScmClient: Send + Sync {
    /// Commit SHAs of a pull request, in the order the forge returns them.
    async fn list_commits(&self, owner: &str, repo: &str, pr: u64) -> Result<Vec<String>, ScmError>;

    /// Names of the labels currently attached to a pull request.
    async fn pull_request_labels(
        &self,
        owner: &str,
        repo: &str,
        pr: u64,
    ) -> Result<Vec<String>, ScmError>;

    /// Names of every label defined on the repository.
    async fn list_labels(&self, owner: &str, repo: &str) -> Result<Vec<String>, ScmError>;

    async fn create_label(&self, owner: &str, repo: &str, label: &NewLabel) -> Result<(), ScmError>;

    /// Attach an existing label to an issue or pull request.
    async fn add_label(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        label: &str,
    ) -> Result<(), ScmError>;

    /// Post a comment on an issue or pull request.
    async fn create_comment(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        body: &str,
    ) -> Result<(), ScmError>;

    async fn create_pull_request(
        &self,
        owner: &str,
        repo: &str,
        input: &NewPullRequest,
    ) -> Result<PullRequestRef, ScmError>;

    /// Names of every branch in the repository.
    async fn list_branches(&self, owner: &str, repo: &str) -> Result<Vec<String>, ScmError>;
}

/// Builds an authenticated [`ScmClient`].
pub trait ScmConnector: Send + Sync {
    fn connect(&self, credentials: &Credentials) -> Result<Arc<dyn ScmClient>, ScmError>;
}

/// Connects [`GitHubClient`]s to a fixed API base URL.
#[derive(Debug, Clone)]
pub struct GitHubConnector {
    api_url: String,
}

impl GitHubConnector {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
        }
    }
}

impl Default for GitHubConnector {
    fn default() -> Self {
        Self::new(GITHUB_API_URL)
    }
}

impl ScmConnector for GitHubConnector {
    fn connect(&self, credentials: &Credentials) -> Result<Arc<dyn ScmClient>, ScmError> {
        Ok(Arc::new(GitHubClient::new(&self.api_url, &credentials.token)?))
    }
}

#[derive(Deserialize)]
struct CommitEntry {
    sha: String,
}

#[derive(Deserialize)]
struct Named {
    name: String,
}

#[derive(Deserialize)]
struct PullRequestLabels {
    #[serde(default)]
    labels: Vec<Named>,
}

#[derive(Deserialize)]
struct ApiMessage {
    message: String,
}

/// GitHub REST API client.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl GitHubClient {
    /// Create a client for `base_url` authenticating with `token`.
    pub fn new(base_url: &str, token: &str) -> Result<Self, ScmError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static("backport-bot/1.0"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<serde_json::Value>,
    ) -> Result<Response, ScmError> {
        let url = format!("{}{path}", self.base_url);
        let mut request = self
            .client
            .request(method, &url)
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .query(query);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiMessage>(&text)
            .map(|m| m.message)
            .unwrap_or(text);
        Err(ScmError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ScmError> {
        let bytes = self.send(Method::GET, path, query, None).await?.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Follow `page` until a short page is returned.
    async fn get_all<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, ScmError> {
        let mut items = Vec::new();
        for page in 1.. {
            let batch: Vec<T> = self
                .get_json(
                    path,
                    &[("per_page", PER_PAGE.to_string()), ("page", page.to_string())],
                )
                .await?;
            let done = batch.len() < PER_PAGE;
            items.extend(batch);
            if done {
                break;
            }
        }
        debug!(path = %path, count = items.len(), "Fetched all pages");
        Ok(items)
    }
}

#[async_trait]
impl ScmClient for GitHubClient {
    #[instrument(skip(self))]
    async fn list_commits(&self, owner: &str, repo: &str, pr: u64) -> Result<Vec<String>, ScmError> {
        let commits: Vec<CommitEntry> = self
            .get_all(&format!("/repos/{owner}/{repo}/pulls/{pr}/commits"))
            .await?;
        Ok(commits.into_iter().map(|c| c.sha).collect())
    }

    #[instrument(skip(self))]
    async fn pull_request_labels(
        &self,
        owner: &str,
        repo: &str,
        pr: u64,
    ) -> Result<Vec<String>, ScmError> {
        let pull: PullRequestLabels = self
            .get_json(&format!("/repos/{owner}/{repo}/pulls/{pr}"), &[])
            .await?;
        Ok(pull.labels.into_iter().map(|l| l.name).collect())
    }

    #[instrument(skip(self))]
    async fn list_labels(&self, owner: &str, repo: &str) -> Result<Vec<String>, ScmError> {
        let labels: Vec<Named> = self.get_all(&format!("/repos/{owner}/{repo}/labels")).await?;
        Ok(labels.into_iter().map(|l| l.name).collect())
    }

    #[instrument(skip(self), fields(label = %label.name))]
    async fn create_label(&self, owner: &str, repo: &str, label: &NewLabel) -> Result<(), ScmError> {
        self.send(
            Method::POST,
            &format!("/repos/{owner}/{repo}/labels"),
            &[],
            Some(serde_json::to_value(label)?),
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn add_label(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        label: &str,
    ) -> Result<(), ScmError> {
        self.send(
            Method::POST,
            &format!("/repos/{owner}/{repo}/issues/{number}/labels"),
            &[],
            Some(serde_json::json!({ "labels": [label] })),
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self, body))]
    async fn create_comment(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        body: &str,
    ) -> Result<(), ScmError> {
        self.send(
            Method::POST,
            &format!("/repos/{owner}/{repo}/issues/{number}/comments"),
            &[],
            Some(serde_json::json!({ "body": body })),
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(head = %input.head, base = %input.base))]
    async fn create_pull_request(
        &self,
        owner: &str,
        repo: &str,
        input: &NewPullRequest,
    ) -> Result<PullRequestRef, ScmError> {
        let bytes = self
            .send(
                Method::POST,
                &format!("/repos/{owner}/{repo}/pulls"),
                &[],
                Some(serde_json::to_value(input)?),
            )
            .await?
            .bytes()
            .await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    #[instrument(skip(self))]
    async fn list_branches(&self, owner: &str, repo: &str) -> Result<Vec<String>, ScmError> {
        let branches: Vec<Named> = self
            .get_all(&format!("/repos/{owner}/{repo}/branches"))
            .await?;
        Ok(branches.into_iter().map(|b| b.name).collect())
    }
}
