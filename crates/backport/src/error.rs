//! Error types for the backport service.

use std::time::Duration;

use axum::http::StatusCode;
use thiserror::Error;

/// Errors raised while replaying commits onto a target branch.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// The isolated working directory could not be created.
    #[error("failed to create working directory: {0}")]
    Workspace(#[source] std::io::Error),

    /// The git executable could not be started.
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// A git command ran but exited unsuccessfully.
    #[error("`{command}` failed with exit code {}", exit_code(.code))]
    CommandFailed { command: String, code: Option<i32> },

    /// A git command exceeded the per-step deadline and was killed.
    #[error("`{command}` timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },
}

fn exit_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "unknown".to_string(), |c| c.to_string())
}

/// Errors returned by the SCM API client.
#[derive(Debug, Error)]
pub enum ScmError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The forge answered with a non-success status
    #[error("GitHub API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Response body could not be decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised while resolving forge credentials.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// Kubernetes API call failed
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// The service account namespace file could not be read
    #[error("failed to read namespace from {path}: {source}")]
    Namespace {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// No secret matches the requested host
    #[error("no credentials found for host {0}")]
    NotFound(String),
}

/// Errors raised while accepting a webhook delivery.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// The event-type header is absent
    #[error("missing X-GitHub-Event header")]
    MissingEventType,

    /// The signature header is absent while a secret is configured
    #[error("missing X-Hub-Signature-256 header")]
    MissingSignature,

    /// The signature does not match the payload
    #[error("invalid webhook signature")]
    InvalidSignature,

    /// The payload could not be decoded for its event type
    #[error("failed to parse {kind} payload: {source}")]
    Payload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

impl WebhookError {
    /// HTTP status reported to the forge for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::MissingEventType
            | Self::MissingSignature
            | Self::InvalidSignature
            | Self::Payload { .. } => StatusCode::BAD_REQUEST,
        }
    }
}
