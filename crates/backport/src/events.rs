//! GitHub webhook events.
//!
//! Deliveries are decoded from the `X-GitHub-Event` header and the JSON body
//! into [`WebhookEvent`], a closed set of kinds with an explicit
//! [`WebhookEvent::Unknown`] for everything else.

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::WebhookError;

/// GitHub user or organization.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubUser {
    pub login: String,
}

/// GitHub label
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubLabel {
    pub name: String,
}

/// GitHub repository
#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    /// Repository name
    pub name: String,
    /// Owning user or organization
    pub owner: GitHubUser,
    /// Full name (org/repo)
    #[serde(default)]
    pub full_name: String,
}

/// GitHub pull request
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    /// PR number
    pub number: u64,
    /// PR state (open, closed)
    #[serde(default)]
    pub state: String,
    /// Whether PR was merged
    #[serde(default)]
    pub merged: bool,
    /// Labels on the PR
    #[serde(default)]
    pub labels: Vec<GitHubLabel>,
}

/// `pull_request` event payload (simplified)
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestEvent {
    /// Action type (opened, closed, labeled, ...)
    pub action: String,
    pub pull_request: PullRequest,
    pub repository: Repository,
}

impl PullRequestEvent {
    /// The event reports a merge: closed, with the merged flag set.
    #[must_use]
    pub fn is_merged(&self) -> bool {
        self.action == "closed" && self.pull_request.merged
    }
}

#[derive(Debug, Clone, Deserialize)]
struct Comment {
    #[serde(default)]
    body: String,
}

#[derive(Debug, Clone, Deserialize)]
struct Issue {
    number: u64,
    /// Present only when the issue is a pull request.
    #[serde(default)]
    pull_request: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
struct IssueCommentPayload {
    action: String,
    issue: Issue,
    comment: Comment,
    repository: Repository,
}

#[derive(Debug, Clone, Deserialize)]
struct ReviewCommentPayload {
    action: String,
    pull_request: PullRequest,
    comment: Comment,
    repository: Repository,
}

#[derive(Debug, Clone, Deserialize)]
struct RefPayload {
    ref_type: String,
}

/// A comment on an issue or pull request.
#[derive(Debug, Clone)]
pub struct CommentEvent {
    /// created, edited or deleted
    pub action: String,
    /// Issue or pull request number the comment belongs to
    pub number: u64,
    pub body: String,
    pub repository: Repository,
}

/// Webhook delivery, one variant per event kind.
#[derive(Debug, Clone)]
pub enum WebhookEvent {
    Ping,
    Push,
    PullRequest(PullRequestEvent),
    /// Comment on a pull request, either in the conversation or on a diff.
    PullRequestComment(CommentEvent),
    /// Comment on a plain issue.
    IssueComment(CommentEvent),
    Review,
    Branch,
    Tag,
    Unknown(String),
}

impl WebhookEvent {
    /// Short kind name used in logs and responses.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::Ping => "ping",
            Self::Push => "push",
            Self::PullRequest(_) => "pull_request",
            Self::PullRequestComment(_) => "pull_request_comment",
            Self::IssueComment(_) => "issue_comment",
            Self::Review => "review",
            Self::Branch => "branch",
            Self::Tag => "tag",
            Self::Unknown(kind) => kind.as_str(),
        }
    }
}

fn parse<T: DeserializeOwned>(kind: &str, body: &[u8]) -> Result<T, WebhookError> {
    serde_json::from_slice(body).map_err(|source| WebhookError::Payload {
        kind: kind.to_string(),
        source,
    })
}

/// Decode a delivery given its `X-GitHub-Event` header and raw body.
///
/// Only the kinds the bot acts on are parsed in full; the rest are
/// identified by header alone.
pub fn decode(event_type: &str, body: &[u8]) -> Result<WebhookEvent, WebhookError> {
    let event = match event_type {
        "ping" => WebhookEvent::Ping,
        "push" => WebhookEvent::Push,
        "pull_request" => WebhookEvent::PullRequest(parse(event_type, body)?),
        "issue_comment" => {
            let payload: IssueCommentPayload = parse(event_type, body)?;
            let on_pull_request = payload.issue.pull_request.is_some();
            let comment = CommentEvent {
                action: payload.action,
                number: payload.issue.number,
                body: payload.comment.body,
                repository: payload.repository,
            };
            if on_pull_request {
                WebhookEvent::PullRequestComment(comment)
            } else {
                WebhookEvent::IssueComment(comment)
            }
        }
        "pull_request_review_comment" => {
            let payload: ReviewCommentPayload = parse(event_type, body)?;
            WebhookEvent::PullRequestComment(CommentEvent {
                action: payload.action,
                number: payload.pull_request.number,
                body: payload.comment.body,
                repository: payload.repository,
            })
        }
        "pull_request_review" => WebhookEvent::Review,
        "create" | "delete" => {
            let payload: RefPayload = parse(event_type, body)?;
            if payload.ref_type == "tag" {
                WebhookEvent::Tag
            } else {
                WebhookEvent::Branch
            }
        }
        other => WebhookEvent::Unknown(other.to_string()),
    };
    Ok(event)
}
