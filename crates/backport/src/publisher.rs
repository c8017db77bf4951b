//! Surfaces replay outcomes on the forge.

use std::sync::Arc;

use tracing::{debug, info};

use crate::directive::LABEL_PREFIX;
use crate::error::ScmError;
use crate::replay::transcript::Transcript;
use crate::scm::{NewLabel, NewPullRequest, PullRequestRef, ScmClient};

/// Opens backport pull requests, posts transcripts and applies labels.
#[derive(Clone)]
pub struct Publisher {
    scm: Arc<dyn ScmClient>,
    origin: String,
    label_color: String,
}

impl Publisher {
    /// `origin` is the forge's HTTPS origin, used to link back to the source
    /// pull request.
    pub fn new(
        scm: Arc<dyn ScmClient>,
        origin: impl Into<String>,
        label_color: impl Into<String>,
    ) -> Self {
        Self {
            scm,
            origin: origin.into(),
            label_color: label_color.into(),
        }
    }

    /// Open `Backporting PR-<n> to <branch>` from `working_branch` into
    /// `target_branch`.
    pub async fn publish_backport_pr(
        &self,
        owner: &str,
        repo: &str,
        source_pr: u64,
        target_branch: &str,
        working_branch: &str,
    ) -> Result<PullRequestRef, ScmError> {
        let input = NewPullRequest {
            title: format!("Backporting PR-{source_pr} to {target_branch}"),
            head: working_branch.to_string(),
            base: target_branch.to_string(),
            body: format!(
                "Backport from {}/{owner}/{repo}/pull/{source_pr}",
                self.origin.trim_end_matches('/')
            ),
        };
        let created = self.scm.create_pull_request(owner, repo, &input).await?;
        info!(
            owner = %owner,
            repo = %repo,
            pr_number = source_pr,
            backport_pr = created.number,
            url = %created.html_url,
            "Opened backport pull request"
        );
        Ok(created)
    }

    /// Post `transcript` as a single fenced comment.
    pub async fn notify(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        transcript: &Transcript,
    ) -> Result<(), ScmError> {
        self.scm
            .create_comment(owner, repo, number, &transcript.render())
            .await
    }

    /// Attach `label` to `number`, creating it on the repository first if
    /// it does not exist yet.
    pub async fn apply_label(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        label: &str,
    ) -> Result<(), ScmError> {
        let existing = self.scm.list_labels(owner, repo).await?;
        if existing.iter().any(|name| name == label) {
            debug!(label = %label, "Label already exists");
        } else {
            let branch = label.strip_prefix(LABEL_PREFIX).unwrap_or(label);
            let new_label = NewLabel {
                name: label.to_string(),
                color: self.label_color.clone(),
                description: format!("Backport changes to {branch}"),
            };
            info!(owner = %owner, repo = %repo, label = %label, "Creating label");
            self.scm.create_label(owner, repo, &new_label).await?;
        }

        info!(owner = %owner, repo = %repo, pr_number = number, label = %label, "Applying label");
        self.scm.add_label(owner, repo, number, label).await
    }

    /// Post all unresolved-directive diagnostics as one comment.
    pub async fn report_diagnostics(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        diagnostics: &[String],
    ) -> Result<(), ScmError> {
        if diagnostics.is_empty() {
            return Ok(());
        }
        self.scm
            .create_comment(owner, repo, number, &diagnostics.join("\n"))
            .await
    }
}
